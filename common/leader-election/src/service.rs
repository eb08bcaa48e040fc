use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Session id handed out by services that have no real election, e.g. the
/// standalone services.
pub const DEFAULT_LEADER_ID: Uuid = Uuid::nil();

/// What retrieval listeners learn about the current leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderInformation {
    pub session_id: Uuid,
    pub address: String,
}

/// A component competing for leadership of a role.
///
/// Callbacks are delivered outside of any internal lock, so implementations
/// may call back into the election service.
pub trait LeaderContender: Send + Sync {
    /// The contender was chosen as leader for `session_id`. It becomes the
    /// visible leader once it calls
    /// [`LeaderElectionService::confirm_leadership`].
    fn grant_leadership(&self, session_id: Uuid);

    fn revoke_leadership(&self);

    fn handle_error(&self, error: &Error);

    /// Human readable name used in logs.
    fn description(&self) -> String;
}

/// Observer of the current leader of a role.
pub trait LeaderRetrievalListener: Send + Sync {
    /// `None` means there is currently no confirmed leader.
    fn notify_leader_address(&self, leader: Option<LeaderInformation>);

    fn handle_error(&self, error: &Error);
}

/// Handle a contender uses to take part in the election of one role.
pub trait LeaderElectionService: Send + Sync {
    fn start(&self, contender: Arc<dyn LeaderContender>) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn confirm_leadership(&self, session_id: Uuid, address: &str);

    fn has_leadership(&self, session_id: Uuid) -> bool;
}

/// Handle an observer uses to follow the leader of one role.
pub trait LeaderRetrievalService: Send + Sync {
    fn start(&self, listener: Arc<dyn LeaderRetrievalListener>) -> Result<()>;

    fn stop(&self) -> Result<()>;
}
