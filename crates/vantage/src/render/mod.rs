//! # Rendering
//!
//! The render session, the opaque device boundary, and the still-image
//! codec used by pull delivery.

pub mod codec;
pub mod device;
pub mod remote;
pub mod session;

pub use codec::{FrameCodec, QuantizingPngCodec, DEFAULT_QUANTIZATION_STEP};
pub use device::{RenderDevice, SceneDefaults, SoftwareDevice};
pub use remote::RemoteDevice;
pub use session::{Frame, LoadImageFn, RenderSession, DEFAULT_RENDER_SECONDS};
