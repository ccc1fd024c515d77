//! # Remote Device Client
//!
//! Drives an external rendering engine over TCP. The wire is a 4-byte
//! big-endian length prefix followed by one JSON value, in both directions;
//! draw replies carry the raw RGBA buffer base64-encoded. The connection is
//! established at `setup`, which is where an unreachable engine surfaces as
//! `DeviceUnavailable`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::TcpStream;
use tracing::debug;

use crate::errors::ViewerError;
use crate::events::LoadImageRequest;
use crate::render::device::RenderDevice;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum DeviceCommand<'a> {
    Setup {
        width: u32,
        height: u32,
    },
    SetParameter {
        name: &'a str,
        values: &'a [f64],
    },
    SetSize {
        width: u32,
        height: u32,
    },
    LoadImage {
        #[serde(flatten)]
        request: &'a LoadImageRequest,
    },
    Draw,
}

#[derive(Debug, Deserialize)]
struct DeviceReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    frame: Option<String>,
}

/// TCP client for an external rendering engine.
pub struct RemoteDevice {
    address: String,
    stream: Option<TcpStream>,
}

impl RemoteDevice {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stream: None,
        }
    }

    fn roundtrip(&mut self, command: &DeviceCommand<'_>) -> Result<DeviceReply, ViewerError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ViewerError::DeviceFailure("device not set up".to_string()))?;

        let body = serde_json::to_vec(command)
            .map_err(|e| ViewerError::DeviceFailure(format!("encode command: {}", e)))?;
        let failure = |e: std::io::Error| ViewerError::DeviceFailure(format!("device io: {}", e));

        stream
            .write_all(&(body.len() as u32).to_be_bytes())
            .and_then(|_| stream.write_all(&body))
            .map_err(failure)?;

        let mut length = [0u8; 4];
        stream.read_exact(&mut length).map_err(failure)?;
        let mut reply = vec![0u8; u32::from_be_bytes(length) as usize];
        stream.read_exact(&mut reply).map_err(failure)?;

        let reply: DeviceReply = serde_json::from_slice(&reply)
            .map_err(|e| ViewerError::DeviceFailure(format!("decode reply: {}", e)))?;
        if reply.ok {
            Ok(reply)
        } else {
            Err(ViewerError::DeviceFailure(
                reply.error.unwrap_or_else(|| "unknown device error".to_string()),
            ))
        }
    }
}

impl RenderDevice for RemoteDevice {
    fn setup(&mut self, width: u32, height: u32) -> Result<(), ViewerError> {
        let stream = TcpStream::connect(&self.address).map_err(|e| {
            ViewerError::DeviceUnavailable(format!("{}: {}", self.address, e))
        })?;
        stream
            .set_nodelay(true)
            .map_err(|e| ViewerError::DeviceUnavailable(format!("{}: {}", self.address, e)))?;
        debug!(address = %self.address, "connected to rendering engine");
        self.stream = Some(stream);

        self.roundtrip(&DeviceCommand::Setup { width, height })?;
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, values: &[f64]) -> Result<(), ViewerError> {
        self.roundtrip(&DeviceCommand::SetParameter { name, values })?;
        Ok(())
    }

    fn set_size(&mut self, width: u32, height: u32) -> Result<(), ViewerError> {
        self.roundtrip(&DeviceCommand::SetSize { width, height })?;
        Ok(())
    }

    fn load_image(&mut self, request: &LoadImageRequest) -> Result<(), ViewerError> {
        self.roundtrip(&DeviceCommand::LoadImage { request })?;
        Ok(())
    }

    fn issue_draw(&mut self) -> Result<Vec<u8>, ViewerError> {
        let reply = self.roundtrip(&DeviceCommand::Draw)?;
        let frame = reply
            .frame
            .ok_or_else(|| ViewerError::DeviceFailure("draw reply without frame".to_string()))?;
        BASE64
            .decode(frame)
            .map_err(|e| ViewerError::DeviceFailure(format!("bad frame payload: {}", e)))
    }
}
