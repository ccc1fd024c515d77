//! # Push Delivery
//!
//! A continuously pulled track: the streaming transport invokes
//! [`FrameTrack::next_frame`] at its own cadence and always gets a frame
//! back immediately — the freshly drawn one when the device is free, the
//! current frame when a draw is in flight, a one-pixel filler when nothing
//! has rendered yet. Pacing and backpressure live in the transport; the
//! render session never sleeps or rate-limits.

use bytes::Bytes;
use std::time::Duration;

use crate::render::session::RenderSession;

/// Presentation clock rate shared by all tracks (the standard video clock).
pub const VIDEO_TIME_BASE: u32 = 90_000;

/// Nominal track rate when the stream does not ask for one.
pub const DEFAULT_TRACK_FPS: u32 = 30;

/// One frame handed to the media pipeline.
#[derive(Debug, Clone)]
pub struct TrackFrame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA8 pixels — push delivery does not re-encode through the
    /// still-image codec.
    pub data: Bytes,
    /// Monotonic presentation timestamp in `VIDEO_TIME_BASE` units.
    pub pts: u64,
    pub time_base: u32,
}

/// The push side of frame delivery for one render session.
pub struct FrameTrack {
    session: RenderSession,
    fps: u32,
    pts: u64,
}

impl FrameTrack {
    pub fn new(session: RenderSession, fps: u32) -> Self {
        Self {
            session,
            fps: fps.max(1),
            pts: 0,
        }
    }

    /// Tick interval matching the track's nominal rate.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps))
    }

    /// Produce the next frame. Never fails and never waits longer than one
    /// tick on a render: a draw failure, a busy device, or a draw that
    /// outlives the tick all degrade to the current frame, and "no frame
    /// yet" degrades to the filler.
    pub async fn next_frame(&mut self) -> TrackFrame {
        let drawn = tokio::time::timeout(self.interval(), self.session.try_draw())
            .await
            .ok()
            .flatten();
        let frame = drawn.or_else(|| self.session.current_frame());

        let (width, height, data) = match frame {
            Some(frame) => (frame.width, frame.height, frame.data),
            None => filler(),
        };

        let pts = self.pts;
        self.pts += u64::from(VIDEO_TIME_BASE / self.fps);
        TrackFrame {
            width,
            height,
            data,
            pts,
            time_base: VIDEO_TIME_BASE,
        }
    }
}

// One opaque black pixel keeps the media pipeline fed before the first draw.
fn filler() -> (u32, u32, Bytes) {
    (1, 1, Bytes::from_static(&[0, 0, 0, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ViewerError;
    use crate::events::LoadImageRequest;
    use crate::render::device::{RenderDevice, SoftwareDevice};

    struct FailingDevice;

    impl RenderDevice for FailingDevice {
        fn setup(&mut self, _width: u32, _height: u32) -> Result<(), ViewerError> {
            Ok(())
        }
        fn set_parameter(&mut self, _name: &str, _values: &[f64]) -> Result<(), ViewerError> {
            Ok(())
        }
        fn set_size(&mut self, _width: u32, _height: u32) -> Result<(), ViewerError> {
            Ok(())
        }
        fn load_image(&mut self, _request: &LoadImageRequest) -> Result<(), ViewerError> {
            Ok(())
        }
        fn issue_draw(&mut self) -> Result<Vec<u8>, ViewerError> {
            Err(ViewerError::DeviceFailure("flaky engine".to_string()))
        }
    }

    #[tokio::test]
    async fn draw_failures_degrade_to_filler_frames() {
        let session = RenderSession::new();
        session
            .setup(Box::new(FailingDevice), 32, 32)
            .await
            .unwrap();

        let mut track = FrameTrack::new(session, 30);
        let frame = track.next_frame().await;
        assert_eq!((frame.width, frame.height), (1, 1));

        // The stream keeps going, pts still monotonic.
        let next = track.next_frame().await;
        assert!(next.pts > frame.pts);
    }

    #[tokio::test]
    async fn filler_frames_before_setup_keep_pts_advancing() {
        let session = RenderSession::new();
        let mut track = FrameTrack::new(session, 30);

        let first = track.next_frame().await;
        assert_eq!((first.width, first.height), (1, 1));
        assert_eq!(first.data.len(), 4);
        assert_eq!(first.pts, 0);
        assert_eq!(first.time_base, VIDEO_TIME_BASE);

        let second = track.next_frame().await;
        assert_eq!(second.pts, u64::from(VIDEO_TIME_BASE / 30));
    }

    #[tokio::test]
    async fn real_frames_after_setup() {
        let session = RenderSession::new();
        session
            .setup(Box::new(SoftwareDevice::new()), 32, 32)
            .await
            .unwrap();

        let mut track = FrameTrack::new(session, 30);
        let frame = track.next_frame().await;
        assert_eq!((frame.width, frame.height), (32, 32));
        assert_eq!(frame.data.len(), 32 * 32 * 4);
    }

    #[tokio::test]
    async fn track_and_pull_share_the_current_frame() {
        let session = RenderSession::new();
        session
            .setup(Box::new(SoftwareDevice::new()), 16, 16)
            .await
            .unwrap();

        // A pull-side draw retains the frame the track then observes.
        session.draw().await.unwrap().unwrap();
        let mut track = FrameTrack::new(session.clone(), 30);
        let frame = track.next_frame().await;
        assert_eq!(frame.data.len(), 16 * 16 * 4);
        assert_eq!(
            session.current_frame().unwrap().data.len(),
            16 * 16 * 4
        );
    }
}
