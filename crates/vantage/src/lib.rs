//! # Vantage
//!
//! Vantage coordinates remote, interactive scientific-image visualization.
//! A client issues typed events against a tree of stateful actors
//! (Viewer → DataManager, Viewer → Renderer → Viewport); the renderer drives
//! an opaque rendering device and delivers frames back either on demand
//! (pull) or continuously (push).
//!
//! ## Architecture
//!
//! * `ViewerRuntime`: per-session task that owns the actor tree and
//!   serializes every operation on it
//! * `ViewerHandle`: clonable interface for sending commands to a session
//! * `RenderSession`: the render loop — device handle, current frame,
//!   last-render-time bookkeeping
//! * `FrameTrack` / pull `render`: the two frame delivery strategies
//!
//! Each connected client gets its own actor tree, render session, and device
//! handle; nothing rendering-related is shared across sessions.

pub mod actor;
pub mod config;
pub mod data_manager;
pub mod errors;
pub mod events;
pub mod id;
pub mod logging;
pub mod messages;
pub mod render;
pub mod renderer;
pub mod shutdown;
pub mod store;
pub mod transport;
pub mod viewer;

pub use actor::{
    ActorCore, DeviceFactory, DispatchReport, Lifecycle, LifecycleCommand, LifecycleState,
    ViewerHandle, ViewerRuntime,
};
pub use config::{
    DataManagerConfig, DeviceBackend, RendererConfig, SessionConfig, ViewerConfig, ViewportConfig,
};
pub use data_manager::DataManager;
pub use errors::ViewerError;
pub use events::{
    CameraPose, DataManagerEvent, EventEnvelope, LoadImageRequest, RendererEvent, SetImageRequest,
    UnknownEventAction, ViewerEvent,
};
pub use id::ActorId;
pub use messages::ViewerCommand;
pub use render::{
    Frame, FrameCodec, QuantizingPngCodec, RemoteDevice, RenderDevice, RenderSession,
    SceneDefaults, SoftwareDevice,
};
pub use renderer::{Renderer, Viewport};
pub use shutdown::{ShutdownController, ShutdownReceiver, ShutdownSignal};
pub use store::{DirectoryStore, ImageData, ImageStore, MemoryStore, MultiscaleImage, StoreRef};
pub use transport::{FrameTrack, RenderResponse, TrackFrame};
pub use viewer::Viewer;
