//! The check-in cycle
//!
//! One cycle polls the server, classifies the pending action, and either
//! installs an advertised deployment, acknowledges a cancellation, or does
//! nothing. [`agent::UpdateAgent`] orchestrates; [`install`] handles the
//! per-artifact download/verify/install pipeline.

pub mod agent;
pub mod install;

pub use agent::UpdateAgent;

/// Server-declared pending work, classified from one check-in reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Nothing to do until the next tick
    None,

    /// An update is pending; the deployment detail lives behind `href`
    Update { href: String },

    /// The server wants action `action_id` stopped
    Cancel { action_id: String },
}

/// Terminal result of one completed check-in cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No pending action
    NoAction,

    /// A deployment was downloaded, installed and reported
    Updated,

    /// A surviving pre-reboot outcome was re-reported instead of reinstalling
    Confirmed,

    /// A cancellation was acknowledged
    Canceled,
}
