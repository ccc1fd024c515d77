//! # Frame Transports
//!
//! Two delivery strategies over one render session: [`pull`] (one encoded
//! frame per explicit request) and [`push`] (a continuously pulled track
//! with filler frames). They interleave safely — both observe the single
//! current frame and neither waits on the other.

pub mod pull;
pub mod push;

pub use pull::RenderResponse;
pub use push::{FrameTrack, TrackFrame, DEFAULT_TRACK_FPS, VIDEO_TIME_BASE};
