//! # Actor Core
//!
//! The capability every actor embeds, whatever its concrete kind: an
//! identity, the configured unknown-event policy, and the bookkeeping for a
//! batch dispatch. Concrete actors compose an [`ActorCore`] value rather than
//! inheriting from a base type.

use tracing::warn;

use crate::errors::ViewerError;
use crate::events::UnknownEventAction;
use crate::id::ActorId;

/// Outcome of dispatching one batch of events to an actor.
///
/// `applied` counts events that reached a handler; `warnings` carries the
/// advisories produced by skipped events under the `Warn` policy so remote
/// callers observe them without a log channel.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DispatchReport {
    pub applied: usize,
    pub warnings: Vec<String>,
}

impl DispatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&mut self) {
        self.applied += 1;
    }

    /// Fold another report into this one (used when forwarding to children).
    pub fn absorb(&mut self, other: DispatchReport) {
        self.applied += other.applied;
        self.warnings.extend(other.warnings);
    }
}

/// Shared actor capability: identity plus unknown-event policy.
#[derive(Debug, Clone)]
pub struct ActorCore {
    id: ActorId,
    unknown_event_action: UnknownEventAction,
}

impl ActorCore {
    pub fn new(unknown_event_action: UnknownEventAction) -> Self {
        Self {
            id: ActorId::generate(),
            unknown_event_action,
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn unknown_event_action(&self) -> UnknownEventAction {
        self.unknown_event_action
    }

    /// Replace the policy. Only reachable through explicit reconfiguration
    /// (`set_config`); never flipped mid-dispatch.
    pub fn set_unknown_event_action(&mut self, action: UnknownEventAction) {
        self.unknown_event_action = action;
    }

    /// Apply the unknown-event policy to an unrecognized tag.
    ///
    /// `Error` fails the dispatch; `Warn` records one advisory and lets the
    /// batch continue; `Ignore` lets the batch continue silently.
    pub fn handle_unknown_event(
        &self,
        kind: &str,
        report: &mut DispatchReport,
    ) -> Result<(), ViewerError> {
        match self.unknown_event_action {
            UnknownEventAction::Error => Err(ViewerError::UnknownEventKind(kind.to_string())),
            UnknownEventAction::Warn => {
                warn!(actor = %self.id, event = kind, "unknown event kind, skipping");
                report.warnings.push(format!("Unknown event kind: {}", kind));
                Ok(())
            }
            UnknownEventAction::Ignore => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_policy_fails_dispatch() {
        let core = ActorCore::new(UnknownEventAction::Error);
        let mut report = DispatchReport::new();
        assert_eq!(
            core.handle_unknown_event("bogus", &mut report).unwrap_err(),
            ViewerError::UnknownEventKind("bogus".to_string())
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn warn_policy_records_one_advisory() {
        let core = ActorCore::new(UnknownEventAction::Warn);
        let mut report = DispatchReport::new();
        core.handle_unknown_event("bogus", &mut report).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("bogus"));
    }

    #[test]
    fn ignore_policy_is_silent() {
        let core = ActorCore::new(UnknownEventAction::Ignore);
        let mut report = DispatchReport::new();
        core.handle_unknown_event("bogus", &mut report).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(report.applied, 0);
    }
}
