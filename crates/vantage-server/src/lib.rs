//! # Vantage Server
//!
//! The service boundary: a TCP management socket carrying length-delimited
//! JSON commands. Each connection gets its own viewer session — actor tree,
//! render session, device handle — and optionally a push-track stream that
//! delivers raw frames at its own cadence over the same connection. Closing
//! the connection shuts the session down.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

use vantage::actor::runtime::DeviceFactory;
use vantage::config::{DeviceBackend, SessionConfig};
use vantage::store::ImageStore;
use vantage::transport::push::DEFAULT_TRACK_FPS;
use vantage::{
    DirectoryStore, DispatchReport, EventEnvelope, FrameTrack, LoadImageRequest, MultiscaleImage,
    QuantizingPngCodec, RemoteDevice, RenderDevice, RenderSession, ShutdownController,
    SoftwareDevice, Viewer, ViewerConfig, ViewerError, ViewerHandle, ViewerRuntime,
};

/// Maximum frame size on the management socket (32MB)
const MAX_FRAME_LENGTH: usize = 32 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub enum ManagementCommand {
    /// Drive the session to `running` and install a device at the given
    /// resolution.
    Setup { width: i64, height: i64 },
    /// Viewer-level event batch (`setImage`, `render`), applied in order.
    Batch { events: Vec<EventEnvelope> },
    /// Renderer-bound event batch, applied in order.
    UpdateRenderer { events: Vec<EventEnvelope> },
    /// Pull delivery: one draw, one encoded frame back.
    Render,
    GetRenderTime,
    /// Resolve an image path into the rendering device.
    LoadImage { request: LoadImageRequest },
    /// Open a backing store and describe its scale pyramid.
    GetStore { path: String },
    StoreGet { path: String, key: String },
    /// Write one key into a backing store; `value` is base64.
    StoreSet { path: String, key: String, value: String },
    StoreContains { path: String, key: String },
    GetConfig,
    SetConfig { config: ViewerConfig },
    Shutdown,
    /// Register the push track; frames start flowing over this connection.
    StartStream { fps: Option<u32> },
    StopStream,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ManagementResponse {
    SetupComplete,
    Dispatched {
        report: DispatchReport,
    },
    Rendered {
        /// Codec-compressed frame, base64-encoded for the JSON wire.
        frame: String,
        render_time_seconds: f64,
    },
    RenderTime {
        seconds: f64,
    },
    ImageLoaded,
    Store {
        image: MultiscaleImage,
    },
    StoreValue {
        value: String,
    },
    StoreWritten,
    StoreHas {
        present: bool,
    },
    Config {
        config: ViewerConfig,
    },
    ConfigSet,
    ShutdownComplete,
    StreamStarted {
        fps: u32,
    },
    StreamStopped,
    /// One push-track frame: raw RGBA8, base64-encoded.
    StreamFrame {
        width: u32,
        height: u32,
        pts: u64,
        time_base: u32,
        data: String,
    },
    Error {
        error: ViewerError,
    },
}

pub struct VantageServer {
    management_socket: TcpListener,
    session_config: SessionConfig,
}

impl VantageServer {
    pub async fn new(address: SocketAddr, session_config: SessionConfig) -> Result<Self> {
        let management_socket = TcpListener::bind(address).await?;
        Ok(Self {
            management_socket,
            session_config,
        })
    }

    /// The bound address — useful when listening on port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.management_socket.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        info!(
            "Vantage server starting on {:?}",
            self.management_socket.local_addr()?
        );

        while let Ok((socket, addr)) = self.management_socket.accept().await {
            info!("New session connection from {}", addr);
            let config = self.session_config.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, config).await {
                    error!("Error handling session connection from {}: {}", addr, e);
                }
            });
        }
        Ok(())
    }
}

fn device_factory(backend: DeviceBackend) -> DeviceFactory {
    Box::new(move || {
        Ok(match &backend {
            DeviceBackend::Software => Box::new(SoftwareDevice::new()) as Box<dyn RenderDevice>,
            DeviceBackend::Remote { address } => Box::new(RemoteDevice::new(address.clone())),
        })
    })
}

async fn handle_connection(socket: TcpStream, config: SessionConfig) -> Result<()> {
    // One viewer tree, render session, and device handle per connection.
    let viewer = Viewer::new(config.viewer.clone())?;
    let render_session = viewer.renderer().map(|renderer| renderer.session());

    let mut controller = ShutdownController::new();
    let shutdown_rx = controller.subscribe();
    let (handle, runtime_task) = ViewerRuntime::spawn(
        viewer,
        device_factory(config.device.clone()),
        Arc::new(QuantizingPngCodec::default()),
        shutdown_rx,
    );

    let mut codec = LengthDelimitedCodec::new();
    codec.set_max_frame_length(MAX_FRAME_LENGTH);
    let framed = Framed::new(socket, codec);
    let (mut sink, mut incoming) = framed.split();

    // Stream frames are produced by a separate task; this channel merges
    // them into the single connection writer. The bound plus skipped ticks
    // is the backpressure: a slow client drops frames instead of queueing.
    let (out_tx, mut out_rx) = mpsc::channel::<ManagementResponse>(32);
    let mut session = SessionState {
        handle,
        config,
        render_session,
        stream_task: None,
        out_tx,
    };

    loop {
        tokio::select! {
            Some(frame) = out_rx.recv() => {
                send_response(&mut sink, &frame).await?;
            }
            message = incoming.next() => {
                let Some(message) = message else { break };
                let message = message?;
                let command: ManagementCommand = serde_json::from_slice(&message)?;
                debug!("Received management command: {:?}", command);

                let response = session.handle_command(command).await;
                send_response(&mut sink, &response).await?;
            }
        }
    }

    debug!("Session connection closed, shutting down");
    session.stop_stream();
    controller.signal_shutdown().await;
    runtime_task.await?;
    Ok(())
}

async fn send_response(
    sink: &mut SplitSink<Framed<TcpStream, LengthDelimitedCodec>, Bytes>,
    response: &ManagementResponse,
) -> Result<()> {
    sink.send(Bytes::from(serde_json::to_vec(response)?)).await?;
    Ok(())
}

struct SessionState {
    handle: ViewerHandle,
    config: SessionConfig,
    render_session: Option<RenderSession>,
    stream_task: Option<JoinHandle<()>>,
    out_tx: mpsc::Sender<ManagementResponse>,
}

impl SessionState {
    async fn handle_command(&mut self, command: ManagementCommand) -> ManagementResponse {
        match command {
            ManagementCommand::Setup { width, height } => {
                respond(self.handle.setup(width, height).await.map(|_| ManagementResponse::SetupComplete))
            }
            ManagementCommand::Batch { events } => respond(
                self.handle
                    .dispatch(events)
                    .await
                    .map(|report| ManagementResponse::Dispatched { report }),
            ),
            ManagementCommand::UpdateRenderer { events } => respond(
                self.handle
                    .update_renderer(events)
                    .await
                    .map(|report| ManagementResponse::Dispatched { report }),
            ),
            ManagementCommand::Render => respond(self.handle.render().await.map(|response| {
                ManagementResponse::Rendered {
                    frame: BASE64.encode(response.frame),
                    render_time_seconds: response.render_time_seconds,
                }
            })),
            ManagementCommand::GetRenderTime => respond(
                self.handle
                    .render_time()
                    .await
                    .map(|seconds| ManagementResponse::RenderTime { seconds }),
            ),
            ManagementCommand::LoadImage { request } => respond(self.load_image(request).await),
            ManagementCommand::GetStore { path } => respond(self.open_store(&path).map(
                |(_, image)| ManagementResponse::Store { image },
            )),
            ManagementCommand::StoreGet { path, key } => {
                respond(self.open_store(&path).and_then(|(store, _)| {
                    let value = store.get(&key)?;
                    Ok(ManagementResponse::StoreValue {
                        value: BASE64.encode(value),
                    })
                }))
            }
            ManagementCommand::StoreSet { path, key, value } => {
                respond(self.open_store(&path).and_then(|(store, _)| {
                    let decoded = BASE64.decode(value).map_err(|e| {
                        ViewerError::InvalidEventPayload {
                            kind: "storeSet".to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    store.set(&key, &decoded)?;
                    Ok(ManagementResponse::StoreWritten)
                }))
            }
            ManagementCommand::StoreContains { path, key } => {
                respond(self.open_store(&path).and_then(|(store, _)| {
                    Ok(ManagementResponse::StoreHas {
                        present: store.contains(&key)?,
                    })
                }))
            }
            ManagementCommand::GetConfig => respond(
                self.handle
                    .config()
                    .await
                    .map(|config| ManagementResponse::Config { config }),
            ),
            ManagementCommand::SetConfig { config } => respond(
                self.handle
                    .set_config(config)
                    .await
                    .map(|_| ManagementResponse::ConfigSet),
            ),
            ManagementCommand::Shutdown => {
                self.stop_stream();
                respond(
                    self.handle
                        .shutdown()
                        .await
                        .map(|_| ManagementResponse::ShutdownComplete),
                )
            }
            ManagementCommand::StartStream { fps } => self.start_stream(fps),
            ManagementCommand::StopStream => {
                self.stop_stream();
                ManagementResponse::StreamStopped
            }
        }
    }

    async fn load_image(&self, request: LoadImageRequest) -> Result<ManagementResponse, ViewerError> {
        let mapped = self.config.map_path(&request.path);
        let mapped_path = mapped.to_string_lossy().to_string();

        // Local paths are checked against the store before they reach the
        // device, so "file not found" beats an opaque engine error.
        if !mapped_path.contains("://") {
            DirectoryStore::open(&mapped)?;
        }

        self.handle
            .load_image(LoadImageRequest {
                path: mapped_path,
                ..request
            })
            .await?;
        Ok(ManagementResponse::ImageLoaded)
    }

    fn open_store(&self, path: &str) -> Result<(DirectoryStore, MultiscaleImage), ViewerError> {
        let mapped = self.config.map_path(path);
        let store = DirectoryStore::open(mapped)?;
        let image = MultiscaleImage::detect(store.store_ref(), &store)?;
        Ok((store, image))
    }

    fn start_stream(&mut self, fps: Option<u32>) -> ManagementResponse {
        let Some(render_session) = self.render_session.clone() else {
            return ManagementResponse::Error {
                error: ViewerError::NotSetUp,
            };
        };

        // Restart semantics: a second start replaces the running track.
        self.stop_stream();

        let fps = fps.unwrap_or(DEFAULT_TRACK_FPS).max(1);
        let mut track = FrameTrack::new(render_session, fps);
        let out = self.out_tx.clone();
        self.stream_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(track.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let frame = track.next_frame().await;
                let response = ManagementResponse::StreamFrame {
                    width: frame.width,
                    height: frame.height,
                    pts: frame.pts,
                    time_base: frame.time_base,
                    data: BASE64.encode(&frame.data),
                };
                if out.send(response).await.is_err() {
                    warn!("stream consumer gone, stopping track");
                    break;
                }
            }
        }));
        ManagementResponse::StreamStarted { fps }
    }

    fn stop_stream(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
    }
}

fn respond(result: Result<ManagementResponse, ViewerError>) -> ManagementResponse {
    result.unwrap_or_else(|error| ManagementResponse::Error { error })
}
