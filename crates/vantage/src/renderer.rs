//! # Renderer Actor
//!
//! Drives a rendering device for its exclusively owned viewport. Renderer
//! events mutate device scene parameters through the render session; the
//! `render` event issues a draw. Frame dimensions always match the viewport,
//! which `renderSize` events are the only way to change.

use crate::actor::core::{ActorCore, DispatchReport};
use crate::actor::machine::{Lifecycle, LifecycleCommand, LifecycleState};
use crate::config::{RendererConfig, ViewportConfig};
use crate::errors::ViewerError;
use crate::events::{EventEnvelope, RendererEvent};
use crate::render::device::RenderDevice;
use crate::render::session::{Frame, RenderSession};

/// Rectangular display target. Resizing is the only mutation.
pub struct Viewport {
    core: ActorCore,
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Result<Self, ViewerError> {
        if config.width == 0 || config.height == 0 {
            return Err(ViewerError::InvalidDimensions {
                width: i64::from(config.width),
                height: i64::from(config.height),
            });
        }
        Ok(Self {
            core: ActorCore::new(config.unknown_event_action),
            width: config.width,
            height: config.height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resize(&mut self, width: i64, height: i64) -> Result<(), ViewerError> {
        if width <= 0 || height <= 0 {
            return Err(ViewerError::InvalidDimensions { width, height });
        }
        self.width = width as u32;
        self.height = height as u32;
        Ok(())
    }

    pub fn config(&self) -> ViewportConfig {
        ViewportConfig {
            width: self.width,
            height: self.height,
            unknown_event_action: self.core.unknown_event_action(),
        }
    }
}

pub struct Renderer {
    core: ActorCore,
    lifecycle: Lifecycle,
    viewport: Viewport,
    session: RenderSession,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Result<Self, ViewerError> {
        Self::with_session(config, RenderSession::new())
    }

    /// Build a renderer around an existing session — the seam the embedding
    /// application uses to install its `loadImage` callback.
    pub fn with_session(config: RendererConfig, session: RenderSession) -> Result<Self, ViewerError> {
        Ok(Self {
            core: ActorCore::new(config.unknown_event_action),
            lifecycle: Lifecycle::new(),
            viewport: Viewport::new(config.viewport)?,
            session,
        })
    }

    pub fn core(&self) -> &ActorCore {
        &self.core
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Clone of the session handle, for the push track and read-side callers.
    pub fn session(&self) -> RenderSession {
        self.session.clone()
    }

    pub fn last_render_seconds(&self) -> f64 {
        self.session.last_render_seconds()
    }

    pub fn transition(&mut self, command: LifecycleCommand) -> Result<LifecycleState, ViewerError> {
        self.lifecycle.apply(command)
    }

    pub(crate) fn revert_to(&mut self, prior: LifecycleState) {
        self.lifecycle.revert_to(prior);
    }

    /// Lifecycle side effect, run once the shutdown cascade has committed.
    pub(crate) async fn finalize_shutdown(&mut self) {
        self.session.teardown().await;
    }

    /// Convenience for a standalone renderer (no owning viewer).
    pub async fn shutdown(&mut self) -> Result<LifecycleState, ViewerError> {
        let next = self.transition(LifecycleCommand::Shutdown)?;
        self.finalize_shutdown().await;
        Ok(next)
    }

    /// Install a device at the given resolution and sync the viewport to it.
    pub async fn setup_device(
        &mut self,
        device: Box<dyn RenderDevice>,
        width: i64,
        height: i64,
    ) -> Result<(), ViewerError> {
        if self.lifecycle.state() == LifecycleState::ShuttingDown {
            return Err(ViewerError::ActorNotReady {
                state: self.lifecycle.state(),
            });
        }
        self.viewport.resize(width, height)?;
        self.session.setup(device, width, height).await
    }

    /// Update the output resolution on viewport and live device together.
    pub async fn set_render_size(&mut self, width: i64, height: i64) -> Result<(), ViewerError> {
        self.viewport.resize(width, height)?;
        self.session.set_render_size(width, height).await
    }

    /// Issue one draw. `None` until a device has been set up.
    pub async fn render(&mut self) -> Result<Option<Frame>, ViewerError> {
        self.lifecycle.ensure_running()?;
        self.session.draw().await
    }

    /// Dispatch a batch of renderer events, in array order.
    ///
    /// Each event is applied before the next is examined, so a failure
    /// leaves earlier mutations in place (best-effort, not transactional).
    pub async fn dispatch(&mut self, batch: &[EventEnvelope]) -> Result<DispatchReport, ViewerError> {
        self.lifecycle.ensure_running()?;

        let mut report = DispatchReport::new();
        for envelope in batch {
            match RendererEvent::parse(envelope)? {
                Some(RendererEvent::Render) => {
                    self.session.draw().await?;
                    report.record_applied();
                }
                Some(RendererEvent::RenderSize { width, height }) => {
                    self.viewport.resize(width, height)?;
                    self.session
                        .apply_events(std::slice::from_ref(&RendererEvent::RenderSize {
                            width,
                            height,
                        }))
                        .await?;
                    report.record_applied();
                }
                Some(event) => {
                    self.session.apply_events(std::slice::from_ref(&event)).await?;
                    report.record_applied();
                }
                None => self.core.handle_unknown_event(envelope.kind(), &mut report)?,
            }
        }
        Ok(report)
    }

    pub fn config(&self) -> RendererConfig {
        RendererConfig {
            viewport: self.viewport.config(),
            unknown_event_action: self.core.unknown_event_action(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UnknownEventAction;
    use crate::render::device::SoftwareDevice;
    use serde_json::json;

    async fn running_renderer(action: UnknownEventAction) -> Renderer {
        let mut renderer = Renderer::new(RendererConfig {
            viewport: ViewportConfig::default(),
            unknown_event_action: action,
        })
        .unwrap();
        renderer.transition(LifecycleCommand::Load).unwrap();
        renderer.transition(LifecycleCommand::Run).unwrap();
        renderer
            .setup_device(Box::new(SoftwareDevice::new()), 64, 64)
            .await
            .unwrap();
        renderer
    }

    #[test]
    fn viewport_rejects_degenerate_sizes() {
        assert!(Viewport::new(ViewportConfig {
            width: 0,
            height: 480,
            unknown_event_action: UnknownEventAction::Warn,
        })
        .is_err());

        let mut viewport = Viewport::new(ViewportConfig::default()).unwrap();
        assert_eq!(
            viewport.resize(-1, 10).unwrap_err(),
            ViewerError::InvalidDimensions {
                width: -1,
                height: 10
            }
        );
        assert_eq!(viewport.width(), 640);
    }

    #[tokio::test]
    async fn render_size_event_resizes_viewport_and_frame() {
        let mut renderer = running_renderer(UnknownEventAction::Warn).await;
        renderer
            .dispatch(&[EventEnvelope::new("renderSize", json!([100, 100]))])
            .await
            .unwrap();
        assert_eq!(renderer.viewport().width(), 100);
        assert_eq!(renderer.viewport().height(), 100);

        let frame = renderer.render().await.unwrap().unwrap();
        assert_eq!(frame.data.len(), 100 * 100 * 4);
    }

    #[tokio::test]
    async fn warn_policy_applies_rest_of_batch() {
        let mut renderer = running_renderer(UnknownEventAction::Warn).await;
        let report = renderer
            .dispatch(&[
                EventEnvelope::new("unknownTag", json!({})),
                EventEnvelope::new("renderIterations", json!(4)),
            ])
            .await
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_outside_running_is_rejected() {
        let mut renderer = Renderer::new(RendererConfig::default()).unwrap();
        let err = renderer
            .dispatch(&[EventEnvelope::new("density", json!(30.0))])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ViewerError::ActorNotReady {
                state: LifecycleState::Idle
            }
        );
    }

    #[tokio::test]
    async fn render_after_shutdown_is_rejected() {
        let mut renderer = running_renderer(UnknownEventAction::Warn).await;
        renderer.shutdown().await.unwrap();
        assert_eq!(
            renderer.render().await.unwrap_err(),
            ViewerError::ActorNotReady {
                state: LifecycleState::ShuttingDown
            }
        );
    }
}
