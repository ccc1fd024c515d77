//! # Render Session
//!
//! Owns the render loop for one Renderer: the device handle, the most recent
//! frame, and the last-render-time bookkeeping. The device is not reentrant,
//! so the session serializes draws and event application behind one lock;
//! the blocking device call itself runs on a worker thread. Readers of the
//! current frame get a copy (cheap — the pixel buffer is refcounted), never
//! a reference into a buffer a draw might overwrite.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::ViewerError;
use crate::events::{LoadImageRequest, RendererEvent};
use crate::render::device::{params, RenderDevice, SceneDefaults};

/// Reported render time before the first draw: one nominal 30 fps frame.
pub const DEFAULT_RENDER_SECONDS: f64 = 0.033;

/// One rendered output: raw RGBA8 pixels plus capture metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    pub captured_at: DateTime<Utc>,
    pub render_seconds: f64,
}

impl Frame {
    pub fn pixel_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Caller-supplied hook that loads image data into the device.
///
/// `loadImage` is the one renderer event whose handling belongs to the
/// embedding application (it knows how paths map onto engine inputs); the
/// default delegates straight to the device.
pub type LoadImageFn =
    Arc<dyn Fn(&mut dyn RenderDevice, &LoadImageRequest) -> Result<(), ViewerError> + Send + Sync>;

struct SessionInner {
    device: Mutex<Option<Box<dyn RenderDevice>>>,
    frame: RwLock<Option<Frame>>,
    last_render_seconds: RwLock<f64>,
    size: RwLock<(u32, u32)>,
    load_image: LoadImageFn,
}

/// Handle to one renderer's render loop. Clones share the same session.
#[derive(Clone)]
pub struct RenderSession {
    inner: Arc<SessionInner>,
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSession {
    pub fn new() -> Self {
        Self::with_load_image(Arc::new(|device, request| device.load_image(request)))
    }

    pub fn with_load_image(load_image: LoadImageFn) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                device: Mutex::new(None),
                frame: RwLock::new(None),
                last_render_seconds: RwLock::new(DEFAULT_RENDER_SECONDS),
                size: RwLock::new((0, 0)),
                load_image,
            }),
        }
    }

    /// Install a device at the given resolution and apply the default scene.
    ///
    /// Must run before any draw produces pixels. Device handshake failures
    /// (`DeviceUnavailable`) propagate untouched.
    pub async fn setup(
        &self,
        mut device: Box<dyn RenderDevice>,
        width: i64,
        height: i64,
    ) -> Result<(), ViewerError> {
        let (width, height) = validated(width, height)?;
        device.setup(width, height)?;
        SceneDefaults::default().apply(device.as_mut())?;

        let mut slot = self.inner.device.lock().await;
        *self.inner.size.write().expect("size lock poisoned") = (width, height);
        *slot = Some(device);
        Ok(())
    }

    /// Update the output resolution on the live device; effective next draw.
    pub async fn set_render_size(&self, width: i64, height: i64) -> Result<(), ViewerError> {
        let (width, height) = validated(width, height)?;
        let mut slot = self.inner.device.lock().await;
        if let Some(device) = slot.as_mut() {
            device.set_size(width, height)?;
        }
        *self.inner.size.write().expect("size lock poisoned") = (width, height);
        Ok(())
    }

    /// Route typed renderer events to device parameter mutators, in order.
    ///
    /// `render` is a no-op here — issuing the draw is the caller's decision.
    pub async fn apply_events(&self, events: &[RendererEvent]) -> Result<(), ViewerError> {
        let mut slot = self.inner.device.lock().await;
        let device = slot.as_mut().ok_or(ViewerError::NotSetUp)?;

        for event in events {
            match event {
                RendererEvent::CameraPose(pose) => {
                    device.set_parameter(params::CAMERA_EYE, &pose.eye)?;
                    device.set_parameter(params::CAMERA_UP, &pose.up)?;
                    device.set_parameter(params::CAMERA_TARGET, &pose.target)?;
                }
                RendererEvent::Density(density) => {
                    device.set_parameter(params::DENSITY, &[*density])?;
                }
                RendererEvent::RenderIterations(iterations) => {
                    device.set_parameter(params::RENDER_ITERATIONS, &[f64::from(*iterations)])?;
                }
                RendererEvent::NormalizedClipBounds(bounds) => {
                    device.set_parameter(params::CLIP_REGION, bounds)?;
                }
                RendererEvent::LoadImage(request) => {
                    (self.inner.load_image)(device.as_mut(), request)?;
                }
                RendererEvent::RenderSize { width, height } => {
                    let (width, height) = validated(*width, *height)?;
                    device.set_size(width, height)?;
                    *self.inner.size.write().expect("size lock poisoned") = (width, height);
                }
                RendererEvent::Render => {}
            }
        }
        Ok(())
    }

    /// Issue one draw and capture the result as the current frame.
    ///
    /// Returns `Ok(None)` when no device has been set up — callers, the push
    /// track especially, must tolerate "no frame yet". The blocking device
    /// call runs on a worker thread while holding the device lock, so draws
    /// are serialized and never interleave with event application.
    pub async fn draw(&self) -> Result<Option<Frame>, ViewerError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.draw_blocking())
            .await
            .map_err(|_| ViewerError::ChannelClosed)?
    }

    /// Non-blocking draw for the push track: if a draw is already in flight
    /// the track reuses the current frame instead of queueing behind it.
    pub async fn try_draw(&self) -> Option<Frame> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.try_draw_blocking())
            .await
            .ok()
            .flatten()
    }

    /// Copy-on-read access to the most recent frame.
    pub fn current_frame(&self) -> Option<Frame> {
        self.inner
            .frame
            .read()
            .expect("frame lock poisoned")
            .clone()
    }

    /// Duration of the most recent draw, in seconds. Stable between draws.
    pub fn last_render_seconds(&self) -> f64 {
        *self
            .inner
            .last_render_seconds
            .read()
            .expect("render time lock poisoned")
    }

    pub fn render_size(&self) -> (u32, u32) {
        *self.inner.size.read().expect("size lock poisoned")
    }

    /// Drop the device. Later draws yield `None`; the in-flight one, if any,
    /// finishes on its worker and its result is discarded with it.
    pub async fn teardown(&self) {
        let mut slot = self.inner.device.lock().await;
        *slot = None;
    }
}

impl SessionInner {
    fn draw_blocking(&self) -> Result<Option<Frame>, ViewerError> {
        let mut slot = self.device.blocking_lock();
        let Some(device) = slot.as_mut() else {
            return Ok(None);
        };
        Ok(Some(self.capture(device.as_mut())?))
    }

    fn try_draw_blocking(&self) -> Option<Frame> {
        let mut slot = match self.device.try_lock() {
            Ok(slot) => slot,
            // Draw in flight; the track falls back to the current frame.
            Err(_) => return None,
        };
        let device = slot.as_mut()?;
        match self.capture(device.as_mut()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("track draw failed: {}", e);
                None
            }
        }
    }

    fn capture(&self, device: &mut dyn RenderDevice) -> Result<Frame, ViewerError> {
        let (width, height) = *self.size.read().expect("size lock poisoned");
        let started = Instant::now();
        let data = device.issue_draw()?;
        let render_seconds = started.elapsed().as_secs_f64();

        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(ViewerError::DeviceFailure(format!(
                "device returned {} bytes for a {}x{} frame (expected {})",
                data.len(),
                width,
                height,
                expected
            )));
        }

        let frame = Frame {
            width,
            height,
            data: Bytes::from(data),
            captured_at: Utc::now(),
            render_seconds,
        };
        *self.frame.write().expect("frame lock poisoned") = Some(frame.clone());
        *self
            .last_render_seconds
            .write()
            .expect("render time lock poisoned") = render_seconds;
        Ok(frame)
    }
}

fn validated(width: i64, height: i64) -> Result<(u32, u32), ViewerError> {
    if width <= 0 || height <= 0 {
        return Err(ViewerError::InvalidDimensions { width, height });
    }
    Ok((width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::SoftwareDevice;

    #[tokio::test]
    async fn draw_before_setup_yields_no_frame() {
        let session = RenderSession::new();
        assert!(session.draw().await.unwrap().is_none());
        assert!(session.current_frame().is_none());
    }

    #[tokio::test]
    async fn draw_after_setup_fills_the_viewport() {
        let session = RenderSession::new();
        session
            .setup(Box::new(SoftwareDevice::new()), 64, 64)
            .await
            .unwrap();

        let frame = session.draw().await.unwrap().unwrap();
        assert_eq!(frame.data.len(), 64 * 64 * 4);
        assert_eq!(frame.pixel_len(), frame.data.len());
        assert!(frame.render_seconds >= 0.0);
    }

    #[tokio::test]
    async fn render_size_is_validated_and_applied() {
        let session = RenderSession::new();
        session
            .setup(Box::new(SoftwareDevice::new()), 64, 64)
            .await
            .unwrap();

        assert_eq!(
            session.set_render_size(0, 10).await.unwrap_err(),
            ViewerError::InvalidDimensions {
                width: 0,
                height: 10
            }
        );

        session.set_render_size(100, 100).await.unwrap();
        let frame = session.draw().await.unwrap().unwrap();
        assert_eq!(frame.data.len(), 100 * 100 * 4);
    }

    #[tokio::test]
    async fn last_render_seconds_is_stable_between_draws() {
        let session = RenderSession::new();
        assert_eq!(session.last_render_seconds(), DEFAULT_RENDER_SECONDS);

        session
            .setup(Box::new(SoftwareDevice::new()), 32, 32)
            .await
            .unwrap();
        session.draw().await.unwrap();

        let first = session.last_render_seconds();
        let second = session.last_render_seconds();
        assert_eq!(first, second);
        assert!(first >= 0.0);
    }

    #[tokio::test]
    async fn apply_events_requires_a_device() {
        let session = RenderSession::new();
        assert_eq!(
            session
                .apply_events(&[RendererEvent::Density(30.0)])
                .await
                .unwrap_err(),
            ViewerError::NotSetUp
        );
    }

    #[tokio::test]
    async fn teardown_stops_producing_frames() {
        let session = RenderSession::new();
        session
            .setup(Box::new(SoftwareDevice::new()), 16, 16)
            .await
            .unwrap();
        assert!(session.draw().await.unwrap().is_some());

        session.teardown().await;
        assert!(session.draw().await.unwrap().is_none());
    }
}
