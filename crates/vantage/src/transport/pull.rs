//! # Pull Delivery
//!
//! One explicit render request yields one encoded frame, synchronously:
//! draw, compress through the still-image codec, return the bytes with the
//! draw duration.

use serde::{Deserialize, Serialize};

use crate::errors::ViewerError;
use crate::render::codec::FrameCodec;
use crate::viewer::Viewer;

/// Response to a pull `render` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    /// Codec-compressed frame bytes.
    pub frame: Vec<u8>,
    /// Duration of the draw that produced it, in seconds.
    pub render_time_seconds: f64,
}

/// Draw one frame through the viewer's renderer and encode it.
///
/// Fails with `NotSetUp` when no device was ever installed — pull delivery
/// has no filler-frame fallback.
pub async fn render(
    viewer: &mut Viewer,
    codec: &dyn FrameCodec,
) -> Result<RenderResponse, ViewerError> {
    let frame = viewer.render().await?.ok_or(ViewerError::NotSetUp)?;
    let encoded = codec.encode(&frame)?;
    Ok(RenderResponse {
        frame: encoded,
        render_time_seconds: frame.render_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::render::codec::QuantizingPngCodec;
    use crate::render::device::SoftwareDevice;

    #[tokio::test]
    async fn render_returns_encoded_frame_and_time() {
        let mut viewer = Viewer::new(ViewerConfig::default()).unwrap();
        viewer.load().unwrap();
        viewer.run().unwrap();
        viewer
            .setup_renderer(Box::new(SoftwareDevice::new()), 64, 64)
            .await
            .unwrap();

        let codec = QuantizingPngCodec::default();
        let response = render(&mut viewer, &codec).await.unwrap();
        assert_eq!(&response.frame[..8], b"\x89PNG\r\n\x1a\n");
        assert!(response.render_time_seconds >= 0.0);
    }

    #[tokio::test]
    async fn render_without_device_is_not_set_up() {
        let mut viewer = Viewer::new(ViewerConfig::default()).unwrap();
        viewer.load().unwrap();
        viewer.run().unwrap();

        let codec = QuantizingPngCodec::default();
        assert_eq!(
            render(&mut viewer, &codec).await.unwrap_err(),
            ViewerError::NotSetUp
        );
    }
}
