//! # DataManager Actor
//!
//! Tracks the images loaded for rendering. Images arrive through `setImage`
//! (inline or store-backed data) and `loadImage` (a store path) events;
//! insertion order is significant and preserved. The collection is cleared
//! when the actor shuts down.

use tracing::debug;

use crate::actor::core::{ActorCore, DispatchReport};
use crate::actor::machine::{Lifecycle, LifecycleCommand, LifecycleState};
use crate::config::DataManagerConfig;
use crate::errors::ViewerError;
use crate::events::{DataManagerEvent, EventEnvelope};
use crate::store::{ImageData, StoreRef};

pub struct DataManager {
    core: ActorCore,
    lifecycle: Lifecycle,
    images: Vec<ImageData>,
}

impl DataManager {
    pub fn new(config: DataManagerConfig) -> Self {
        Self {
            core: ActorCore::new(config.unknown_event_action),
            lifecycle: Lifecycle::new(),
            images: config.images,
        }
    }

    pub fn core(&self) -> &ActorCore {
        &self.core
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn images(&self) -> &[ImageData] {
        &self.images
    }

    pub fn transition(&mut self, command: LifecycleCommand) -> Result<LifecycleState, ViewerError> {
        self.lifecycle.apply(command)
    }

    pub(crate) fn revert_to(&mut self, prior: LifecycleState) {
        self.lifecycle.revert_to(prior);
    }

    /// Lifecycle side effect, run once the shutdown cascade has committed.
    pub(crate) fn finalize_shutdown(&mut self) {
        self.images.clear();
    }

    /// Convenience for a standalone data manager (no owning viewer).
    pub fn shutdown(&mut self) -> Result<LifecycleState, ViewerError> {
        let next = self.transition(LifecycleCommand::Shutdown)?;
        self.finalize_shutdown();
        Ok(next)
    }

    /// Dispatch a batch of events, in array order.
    pub fn dispatch(&mut self, batch: &[EventEnvelope]) -> Result<DispatchReport, ViewerError> {
        self.lifecycle.ensure_running()?;

        let mut report = DispatchReport::new();
        for envelope in batch {
            match DataManagerEvent::parse(envelope)? {
                Some(DataManagerEvent::SetImage(request)) => {
                    debug!(name = ?request.name, "image set");
                    self.images.push(request.image);
                    report.record_applied();
                }
                Some(DataManagerEvent::LoadImage { name, path }) => {
                    debug!(name = ?name, path = %path, "image loaded from store");
                    self.images.push(ImageData::from_store(StoreRef::Directory {
                        path: path.into(),
                    }));
                    report.record_applied();
                }
                None => self.core.handle_unknown_event(envelope.kind(), &mut report)?,
            }
        }
        Ok(report)
    }

    pub fn config(&self) -> DataManagerConfig {
        DataManagerConfig {
            images: self.images.clone(),
            unknown_event_action: self.core.unknown_event_action(),
        }
    }

    /// Re-initialize from a snapshot: destroy-and-recreate, never a merge.
    pub fn set_config(&mut self, config: DataManagerConfig) {
        *self = Self::new(config);
    }
}
