//! Loopback round trips: a real client against a real server with the
//! software device.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::json;
use std::net::SocketAddr;

use vantage::config::SessionConfig;
use vantage::{EventEnvelope, LoadImageRequest, ViewerError};
use vantage_client::VantageConnection;
use vantage_server::{ManagementCommand, ManagementResponse, VantageServer};

async fn start_server(config: SessionConfig) -> SocketAddr {
    let address: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = VantageServer::new(address, config).await.unwrap();
    let bound = server.local_addr().unwrap();
    tokio::spawn(server.run());
    bound
}

async fn connected_client(config: SessionConfig) -> VantageConnection {
    let address = start_server(config).await;
    let mut client = VantageConnection::new(address);
    client.connect().await.unwrap();
    client
}

#[test_log::test(tokio::test)]
async fn setup_update_render_round_trip() {
    let mut client = connected_client(SessionConfig::default()).await;

    let response = client
        .request(ManagementCommand::Setup {
            width: 64,
            height: 64,
        })
        .await
        .unwrap();
    assert!(matches!(response, ManagementResponse::SetupComplete));

    let response = client
        .request(ManagementCommand::UpdateRenderer {
            events: vec![
                EventEnvelope::new("unknownTag", json!({})),
                EventEnvelope::new("renderIterations", json!(4)),
            ],
        })
        .await
        .unwrap();
    match response {
        ManagementResponse::Dispatched { report } => {
            assert_eq!(report.applied, 1);
            assert_eq!(report.warnings.len(), 1);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    let response = client.request(ManagementCommand::Render).await.unwrap();
    match response {
        ManagementResponse::Rendered {
            frame,
            render_time_seconds,
        } => {
            let decoded = BASE64.decode(frame).unwrap();
            assert_eq!(&decoded[..8], b"\x89PNG\r\n\x1a\n");
            assert!(render_time_seconds >= 0.0);
        }
        other => panic!("unexpected response: {:?}", other),
    }

    // Render time is stable without an intervening render.
    let first = match client.request(ManagementCommand::GetRenderTime).await.unwrap() {
        ManagementResponse::RenderTime { seconds } => seconds,
        other => panic!("unexpected response: {:?}", other),
    };
    let second = match client.request(ManagementCommand::GetRenderTime).await.unwrap() {
        ManagementResponse::RenderTime { seconds } => seconds,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(first, second);
}

#[tokio::test]
async fn shutdown_then_render_reports_not_ready() {
    let mut client = connected_client(SessionConfig::default()).await;

    client
        .request(ManagementCommand::Setup {
            width: 32,
            height: 32,
        })
        .await
        .unwrap();

    let response = client.request(ManagementCommand::Shutdown).await.unwrap();
    assert!(matches!(response, ManagementResponse::ShutdownComplete));

    let response = client.request(ManagementCommand::Render).await.unwrap();
    match response {
        ManagementResponse::Error { error } => {
            assert!(matches!(error, ViewerError::ActorNotReady { .. }))
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn stream_delivers_sequenced_frames() {
    let mut client = connected_client(SessionConfig::default()).await;

    client
        .request(ManagementCommand::Setup {
            width: 32,
            height: 32,
        })
        .await
        .unwrap();

    let response = client
        .request(ManagementCommand::StartStream { fps: Some(60) })
        .await
        .unwrap();
    assert!(matches!(
        response,
        ManagementResponse::StreamStarted { fps: 60 }
    ));

    let first = client.next_stream_frame().await.unwrap();
    let second = client.next_stream_frame().await.unwrap();
    assert_eq!((first.width, first.height), (32, 32));
    assert_eq!(first.data.len(), 32 * 32 * 4);
    assert_eq!(first.time_base, 90_000);
    assert!(second.pts > first.pts);

    let response = client.request(ManagementCommand::StopStream).await.unwrap();
    assert!(matches!(response, ManagementResponse::StreamStopped));
}

#[tokio::test]
async fn store_operations_map_paths_under_the_data_root() {
    let data_root = tempfile::tempdir().unwrap();
    let zarr = data_root.path().join("brain.zarr");
    std::fs::create_dir_all(zarr.join("0")).unwrap();
    std::fs::write(zarr.join("0/.zarray"), b"{}").unwrap();

    let config = SessionConfig {
        data_root: Some(data_root.path().to_path_buf()),
        ..SessionConfig::default()
    };
    let mut client = connected_client(config).await;

    let response = client
        .request(ManagementCommand::GetStore {
            path: "brain.zarr".to_string(),
        })
        .await
        .unwrap();
    match response {
        ManagementResponse::Store { image } => assert_eq!(image.scale_levels, 1),
        other => panic!("unexpected response: {:?}", other),
    }

    let response = client
        .request(ManagementCommand::StoreContains {
            path: "brain.zarr".to_string(),
            key: "0/.zarray".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(
        response,
        ManagementResponse::StoreHas { present: true }
    ));

    let response = client
        .request(ManagementCommand::StoreGet {
            path: "brain.zarr".to_string(),
            key: "0/.zarray".to_string(),
        })
        .await
        .unwrap();
    match response {
        ManagementResponse::StoreValue { value } => {
            assert_eq!(BASE64.decode(value).unwrap(), b"{}")
        }
        other => panic!("unexpected response: {:?}", other),
    }

    let response = client
        .request(ManagementCommand::StoreSet {
            path: "brain.zarr".to_string(),
            key: ".zattrs".to_string(),
            value: BASE64.encode(b"{\"multiscales\": []}"),
        })
        .await
        .unwrap();
    assert!(matches!(response, ManagementResponse::StoreWritten));
    assert!(zarr.join(".zattrs").exists());

    // A path that is not there is "not found", not "unreachable".
    let response = client
        .request(ManagementCommand::GetStore {
            path: "missing.zarr".to_string(),
        })
        .await
        .unwrap();
    match response {
        ManagementResponse::Error { error } => {
            assert!(matches!(error, ViewerError::StoreNotFound(_)))
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn load_image_checks_the_store_before_the_device() {
    let data_root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(data_root.path().join("brain.zarr")).unwrap();

    let config = SessionConfig {
        data_root: Some(data_root.path().to_path_buf()),
        ..SessionConfig::default()
    };
    let mut client = connected_client(config).await;

    client
        .request(ManagementCommand::Setup {
            width: 32,
            height: 32,
        })
        .await
        .unwrap();

    let response = client
        .request(ManagementCommand::LoadImage {
            request: LoadImageRequest {
                path: "brain.zarr".to_string(),
                resolution_level: 0,
                channels: vec![0],
                region: vec![],
            },
        })
        .await
        .unwrap();
    assert!(matches!(response, ManagementResponse::ImageLoaded));

    let response = client
        .request(ManagementCommand::LoadImage {
            request: LoadImageRequest {
                path: "missing.zarr".to_string(),
                resolution_level: 0,
                channels: vec![],
                region: vec![],
            },
        })
        .await
        .unwrap();
    match response {
        ManagementResponse::Error { error } => {
            assert!(matches!(error, ViewerError::StoreNotFound(_)))
        }
        other => panic!("unexpected response: {:?}", other),
    }
}

#[tokio::test]
async fn config_snapshot_and_reset() {
    let mut client = connected_client(SessionConfig::default()).await;

    client
        .request(ManagementCommand::Setup {
            width: 32,
            height: 32,
        })
        .await
        .unwrap();

    client
        .request(ManagementCommand::Batch {
            events: vec![EventEnvelope::new(
                "setImage",
                json!({"image": {"store": {"type": "Directory", "path": "/data/a.zarr"}}}),
            )],
        })
        .await
        .unwrap();

    let config = match client.request(ManagementCommand::GetConfig).await.unwrap() {
        ManagementResponse::Config { config } => config,
        other => panic!("unexpected response: {:?}", other),
    };
    assert_eq!(config.data_manager.images.len(), 1);

    let response = client
        .request(ManagementCommand::SetConfig {
            config: vantage::ViewerConfig::default(),
        })
        .await
        .unwrap();
    assert!(matches!(response, ManagementResponse::ConfigSet));

    let config = match client.request(ManagementCommand::GetConfig).await.unwrap() {
        ManagementResponse::Config { config } => config,
        other => panic!("unexpected response: {:?}", other),
    };
    assert!(config.data_manager.images.is_empty());
}
