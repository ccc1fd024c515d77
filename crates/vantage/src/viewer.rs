//! # Viewer Actor
//!
//! The root of a session's actor tree. A viewer owns exactly one DataManager
//! and, unless the session is headless, one Renderer. Lifecycle transitions
//! cascade to the children first; if any child refuses, children that
//! already moved are reverted and the viewer's own state is untouched.

use std::sync::Arc;

use crate::actor::core::{ActorCore, DispatchReport};
use crate::actor::machine::{Lifecycle, LifecycleCommand, LifecycleState};
use crate::config::ViewerConfig;
use crate::data_manager::DataManager;
use crate::errors::ViewerError;
use crate::events::{EventEnvelope, ViewerEvent};
use crate::render::device::RenderDevice;
use crate::render::session::{Frame, LoadImageFn, RenderSession};
use crate::renderer::Renderer;

pub struct Viewer {
    core: ActorCore,
    lifecycle: Lifecycle,
    title: String,
    data_manager: DataManager,
    renderer: Option<Renderer>,
    // Kept so set_config can rebuild the renderer with the same hook.
    load_image: LoadImageFn,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Result<Self, ViewerError> {
        Self::with_load_image(config, Arc::new(|device, request| device.load_image(request)))
    }

    /// Build a viewer whose renderer resolves `loadImage` events through the
    /// supplied hook.
    pub fn with_load_image(config: ViewerConfig, load_image: LoadImageFn) -> Result<Self, ViewerError> {
        let renderer = config
            .renderer
            .map(|renderer_config| {
                Renderer::with_session(
                    renderer_config,
                    RenderSession::with_load_image(Arc::clone(&load_image)),
                )
            })
            .transpose()?;

        Ok(Self {
            core: ActorCore::new(config.unknown_event_action),
            lifecycle: Lifecycle::new(),
            title: config.title,
            data_manager: DataManager::new(config.data_manager),
            renderer,
            load_image,
        })
    }

    pub fn core(&self) -> &ActorCore {
        &self.core
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data_manager
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderer.as_mut()
    }

    /// Apply a lifecycle command to the children, then to the viewer itself.
    ///
    /// Children move first (DataManager, then Renderer). Any failure reverts
    /// the children already moved and leaves the viewer's state untouched,
    /// so a failed cascade is observationally a no-op.
    fn cascade(&mut self, command: LifecycleCommand) -> Result<LifecycleState, ViewerError> {
        let manager_prior = self.data_manager.state();
        self.data_manager.transition(command)?;

        if let Some(renderer) = self.renderer.as_mut() {
            let renderer_prior = renderer.state();
            if let Err(e) = renderer.transition(command) {
                self.data_manager.revert_to(manager_prior);
                return Err(e);
            }
            if let Err(e) = self.lifecycle.apply(command) {
                renderer.revert_to(renderer_prior);
                self.data_manager.revert_to(manager_prior);
                return Err(e);
            }
        } else if let Err(e) = self.lifecycle.apply(command) {
            self.data_manager.revert_to(manager_prior);
            return Err(e);
        }
        Ok(self.lifecycle.state())
    }

    pub fn load(&mut self) -> Result<LifecycleState, ViewerError> {
        self.cascade(LifecycleCommand::Load)
    }

    pub fn run(&mut self) -> Result<LifecycleState, ViewerError> {
        self.cascade(LifecycleCommand::Run)
    }

    /// Shut the tree down. Side effects (clearing images, dropping the
    /// device) run only after the whole cascade has committed, so a refused
    /// shutdown leaves the tree fully intact.
    pub async fn shutdown(&mut self) -> Result<LifecycleState, ViewerError> {
        let next = self.cascade(LifecycleCommand::Shutdown)?;
        self.data_manager.finalize_shutdown();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.finalize_shutdown().await;
        }
        Ok(next)
    }

    /// Install a rendering device on the owned renderer.
    pub async fn setup_renderer(
        &mut self,
        device: Box<dyn RenderDevice>,
        width: i64,
        height: i64,
    ) -> Result<(), ViewerError> {
        let renderer = self.renderer.as_mut().ok_or(ViewerError::NotSetUp)?;
        renderer.setup_device(device, width, height).await
    }

    /// Dispatch a batch of viewer events, in array order.
    ///
    /// `setImage` forwards to the DataManager; `render` forwards to the
    /// Renderer. Unknown tags go through this viewer's policy, not the
    /// children's.
    pub async fn dispatch(&mut self, batch: &[EventEnvelope]) -> Result<DispatchReport, ViewerError> {
        self.lifecycle.ensure_running()?;

        let mut report = DispatchReport::new();
        for envelope in batch {
            match ViewerEvent::parse(envelope)? {
                Some(ViewerEvent::SetImage(_)) => {
                    let forwarded = self.data_manager.dispatch(std::slice::from_ref(envelope))?;
                    report.absorb(forwarded);
                }
                Some(ViewerEvent::Render) => {
                    let renderer = self.renderer.as_mut().ok_or(ViewerError::NotSetUp)?;
                    renderer.render().await?;
                    report.record_applied();
                }
                None => self.core.handle_unknown_event(envelope.kind(), &mut report)?,
            }
        }
        Ok(report)
    }

    /// Forward a renderer-bound batch to the owned renderer.
    pub async fn update_renderer(
        &mut self,
        batch: &[EventEnvelope],
    ) -> Result<DispatchReport, ViewerError> {
        self.lifecycle.ensure_running()?;
        let renderer = self.renderer.as_mut().ok_or(ViewerError::NotSetUp)?;
        renderer.dispatch(batch).await
    }

    /// Issue one draw through the owned renderer.
    pub async fn render(&mut self) -> Result<Option<Frame>, ViewerError> {
        self.lifecycle.ensure_running()?;
        let renderer = self.renderer.as_mut().ok_or(ViewerError::NotSetUp)?;
        renderer.render().await
    }

    /// Snapshot reflecting current child state.
    pub fn config(&self) -> ViewerConfig {
        ViewerConfig {
            title: self.title.clone(),
            unknown_event_action: self.core.unknown_event_action(),
            data_manager: self.data_manager.config(),
            renderer: self.renderer.as_ref().map(Renderer::config),
        }
    }

    /// Re-initialize the viewer and its children from a snapshot —
    /// equivalent to destroy-and-recreate, never a partial merge.
    pub fn set_config(&mut self, config: ViewerConfig) -> Result<(), ViewerError> {
        *self = Self::with_load_image(config, Arc::clone(&self.load_image))?;
        Ok(())
    }
}
