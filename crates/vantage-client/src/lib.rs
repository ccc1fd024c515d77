//! # TCP Connection for Vantage
//!
//! Provides a low-level TCP connection to a Vantage server with simple
//! send and receive methods that can be used with tokio::select!, plus
//! request/response helpers that tolerate push-track frames interleaved on
//! the same connection.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info};

pub use vantage::{EventEnvelope, LoadImageRequest, ViewerConfig, ViewerError};
pub use vantage_server::{ManagementCommand, ManagementResponse};

/// Maximum frame size on the management socket (32MB)
const MAX_FRAME_LENGTH: usize = 32 * 1024 * 1024;

/// A decoded push-track frame.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    pub width: u32,
    pub height: u32,
    pub pts: u64,
    pub time_base: u32,
    pub data: Vec<u8>,
}

/// A client connection to a Vantage server
///
/// This provides a thin wrapper around the TCP connection with simple
/// send and receive methods that can be used with tokio::select!
pub struct VantageConnection {
    /// Server address
    address: SocketAddr,
    /// The TCP connection
    connection: Option<Framed<TcpStream, LengthDelimitedCodec>>,
}

impl VantageConnection {
    /// Create a new connection instance (not yet connected)
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connection: None,
        }
    }

    /// Connect to the Vantage server
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        info!("Connecting to Vantage server at {}", self.address);
        let socket = TcpStream::connect(self.address).await?;

        let mut codec = LengthDelimitedCodec::new();
        codec.set_max_frame_length(MAX_FRAME_LENGTH);
        self.connection = Some(Framed::new(socket, codec));
        info!("Connected to Vantage server");

        Ok(())
    }

    /// Send a command to the server
    pub async fn send(&mut self, command: ManagementCommand) -> Result<()> {
        if self.connection.is_none() {
            self.connect().await?;
        }

        debug!("Sending command: {:?}", command);
        let command_bytes = serde_json::to_vec(&command)?;

        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("Connection lost"))?;

        connection.send(Bytes::from(command_bytes)).await?;
        debug!("Command sent");

        Ok(())
    }

    /// Receive the next response from the server.
    ///
    /// This can be used with tokio::select! to handle multiple operations;
    /// note that it yields push-track frames too once a stream is running.
    pub async fn receive(&mut self) -> Result<ManagementResponse> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("Not connected"))?;

        let message = connection
            .next()
            .await
            .ok_or_else(|| anyhow!("Connection closed"))??;
        let response: ManagementResponse = serde_json::from_slice(&message)?;
        debug!("Received response: {:?}", response);
        Ok(response)
    }

    /// Send a command and wait for its response, skipping any push-track
    /// frames that arrive in between.
    pub async fn request(&mut self, command: ManagementCommand) -> Result<ManagementResponse> {
        self.send(command).await?;
        loop {
            match self.receive().await? {
                ManagementResponse::StreamFrame { .. } => continue,
                response => return Ok(response),
            }
        }
    }

    /// Wait for the next push-track frame, skipping other responses.
    pub async fn next_stream_frame(&mut self) -> Result<StreamFrame> {
        loop {
            if let ManagementResponse::StreamFrame {
                width,
                height,
                pts,
                time_base,
                data,
            } = self.receive().await?
            {
                return Ok(StreamFrame {
                    width,
                    height,
                    pts,
                    time_base,
                    data: BASE64.decode(data)?,
                });
            }
        }
    }
}
