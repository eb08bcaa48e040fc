//! In-process leader election.
//!
//! An [`EmbeddedLeaderService`] arbitrates a single role among the contenders
//! that live in the same process. Contenders are queued in arrival order; the
//! head of the queue is proposed as leader and becomes visible to retrieval
//! listeners once it confirms its session. All callbacks are delivered in
//! order by a dispatcher task running on the executor the service was built
//! with, never while the internal lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::service::{
    LeaderContender, LeaderElectionService, LeaderInformation, LeaderRetrievalListener,
    LeaderRetrievalService,
};

enum Notification {
    Grant {
        contender: Arc<dyn LeaderContender>,
        session_id: Uuid,
    },
    Revoke {
        contender: Arc<dyn LeaderContender>,
    },
    ContenderError {
        contender: Arc<dyn LeaderContender>,
        error: Error,
    },
    LeaderChanged {
        listener: Arc<dyn LeaderRetrievalListener>,
        leader: Option<LeaderInformation>,
    },
    ListenerError {
        listener: Arc<dyn LeaderRetrievalListener>,
        error: Error,
    },
}

impl Notification {
    fn deliver(self) {
        match self {
            Notification::Grant {
                contender,
                session_id,
            } => contender.grant_leadership(session_id),
            Notification::Revoke { contender } => contender.revoke_leadership(),
            Notification::ContenderError { contender, error } => contender.handle_error(&error),
            Notification::LeaderChanged { listener, leader } => {
                listener.notify_leader_address(leader)
            }
            Notification::ListenerError { listener, error } => listener.handle_error(&error),
        }
    }
}

async fn dispatch_notifications(mut rx: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        notification.deliver();
    }
}

struct ProposedLeader {
    handle_id: u64,
    session_id: Uuid,
}

#[derive(Default)]
struct State {
    shutdown: bool,
    next_handle_id: u64,
    /// Started contenders in arrival order.
    contenders: Vec<(u64, Arc<dyn LeaderContender>)>,
    listeners: HashMap<u64, Arc<dyn LeaderRetrievalListener>>,
    proposed: Option<ProposedLeader>,
    confirmed: Option<LeaderInformation>,
}

struct Shared {
    state: Mutex<State>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl Shared {
    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::debug!("leader notification dispatcher is gone, notification dropped");
        }
    }

    fn notify_listeners(&self, state: &State, leader: Option<LeaderInformation>) {
        for listener in state.listeners.values() {
            self.notify(Notification::LeaderChanged {
                listener: Arc::clone(listener),
                leader: leader.clone(),
            });
        }
    }

    fn next_handle_id(&self) -> u64 {
        let mut state = self.state.lock();
        state.next_handle_id += 1;
        state.next_handle_id
    }

    fn propose_next(&self, state: &mut State) {
        let Some((handle_id, contender)) = state.contenders.first().cloned() else {
            return;
        };
        let session_id = Uuid::new_v4();
        tracing::debug!(
            contender = %contender.description(),
            %session_id,
            "proposing leader"
        );
        state.proposed = Some(ProposedLeader {
            handle_id,
            session_id,
        });
        self.notify(Notification::Grant {
            contender,
            session_id,
        });
    }

    fn add_contender(&self, handle_id: u64, contender: Arc<dyn LeaderContender>) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(Error::ServiceShutDown);
        }
        if state.contenders.iter().any(|(id, _)| *id == handle_id) {
            return Err(Error::AlreadyStarted);
        }

        state.contenders.push((handle_id, contender));
        if state.proposed.is_none() {
            self.propose_next(&mut state);
        }
        Ok(())
    }

    fn remove_contender(&self, handle_id: u64) {
        let mut state = self.state.lock();
        let Some(pos) = state.contenders.iter().position(|(id, _)| *id == handle_id) else {
            return;
        };
        let (_, contender) = state.contenders.remove(pos);

        let was_leader = state
            .proposed
            .as_ref()
            .is_some_and(|p| p.handle_id == handle_id);
        if !was_leader {
            return;
        }

        tracing::info!(contender = %contender.description(), "leader stopped, revoking leadership");
        state.proposed = None;
        self.notify(Notification::Revoke { contender });
        if state.confirmed.take().is_some() {
            self.notify_listeners(&state, None);
        }
        self.propose_next(&mut state);
    }

    fn confirm(&self, handle_id: u64, session_id: Uuid, address: &str) {
        let mut state = self.state.lock();
        let is_current = state
            .proposed
            .as_ref()
            .is_some_and(|p| p.handle_id == handle_id && p.session_id == session_id);
        if !is_current {
            tracing::debug!(%session_id, "ignoring leadership confirmation for a stale session");
            return;
        }

        let leader = LeaderInformation {
            session_id,
            address: address.to_string(),
        };
        if state.confirmed.as_ref() == Some(&leader) {
            return;
        }

        tracing::info!(address, %session_id, "leader confirmed");
        state.confirmed = Some(leader.clone());
        self.notify_listeners(&state, Some(leader));
    }

    fn has_leadership(&self, handle_id: u64, session_id: Uuid) -> bool {
        self.state
            .lock()
            .proposed
            .as_ref()
            .is_some_and(|p| p.handle_id == handle_id && p.session_id == session_id)
    }

    fn add_listener(&self, handle_id: u64, listener: Arc<dyn LeaderRetrievalListener>) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(Error::ServiceShutDown);
        }
        if state.listeners.contains_key(&handle_id) {
            return Err(Error::AlreadyStarted);
        }

        if let Some(leader) = state.confirmed.clone() {
            self.notify(Notification::LeaderChanged {
                listener: Arc::clone(&listener),
                leader: Some(leader),
            });
        }
        state.listeners.insert(handle_id, listener);
        Ok(())
    }

    fn remove_listener(&self, handle_id: u64) {
        self.state.lock().listeners.remove(&handle_id);
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;

        let leader_id = state.proposed.take().map(|p| p.handle_id);
        state.confirmed = None;

        for (handle_id, contender) in state.contenders.drain(..) {
            if Some(handle_id) == leader_id {
                self.notify(Notification::Revoke {
                    contender: Arc::clone(&contender),
                });
            }
            self.notify(Notification::ContenderError {
                contender,
                error: Error::ServiceShutDown,
            });
        }
        for (_, listener) in state.listeners.drain() {
            self.notify(Notification::ListenerError {
                listener,
                error: Error::ServiceShutDown,
            });
        }
    }
}

/// In-process arbiter for the leadership of one role.
pub struct EmbeddedLeaderService {
    shared: Arc<Shared>,
}

impl EmbeddedLeaderService {
    /// Must be called with a handle to a running runtime; the notification
    /// dispatcher is spawned on it right away.
    pub fn new(executor: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        executor.spawn(dispatch_notifications(rx));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                notifications: tx,
            }),
        }
    }

    pub fn create_leader_election_service(&self) -> EmbeddedLeaderElectionService {
        EmbeddedLeaderElectionService {
            handle_id: self.shared.next_handle_id(),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn create_leader_retrieval_service(&self) -> EmbeddedLeaderRetrievalService {
        EmbeddedLeaderRetrievalService {
            handle_id: self.shared.next_handle_id(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// The confirmed leader, if any.
    pub fn current_leader(&self) -> Option<LeaderInformation> {
        self.shared.state.lock().confirmed.clone()
    }

    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }
}

pub struct EmbeddedLeaderElectionService {
    handle_id: u64,
    shared: Arc<Shared>,
}

impl LeaderElectionService for EmbeddedLeaderElectionService {
    fn start(&self, contender: Arc<dyn LeaderContender>) -> Result<()> {
        self.shared.add_contender(self.handle_id, contender)
    }

    fn stop(&self) -> Result<()> {
        self.shared.remove_contender(self.handle_id);
        Ok(())
    }

    fn confirm_leadership(&self, session_id: Uuid, address: &str) {
        self.shared.confirm(self.handle_id, session_id, address);
    }

    fn has_leadership(&self, session_id: Uuid) -> bool {
        self.shared.has_leadership(self.handle_id, session_id)
    }
}

pub struct EmbeddedLeaderRetrievalService {
    handle_id: u64,
    shared: Arc<Shared>,
}

impl LeaderRetrievalService for EmbeddedLeaderRetrievalService {
    fn start(&self, listener: Arc<dyn LeaderRetrievalListener>) -> Result<()> {
        self.shared.add_listener(self.handle_id, listener)
    }

    fn stop(&self) -> Result<()> {
        self.shared.remove_listener(self.handle_id);
        Ok(())
    }
}
