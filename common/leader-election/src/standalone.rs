//! Leader services for deployments where every role has one fixed address.
//!
//! There is no election: a started contender is leader right away under
//! [`DEFAULT_LEADER_ID`], and retrieval always reports the configured address.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::service::{
    LeaderContender, LeaderElectionService, LeaderInformation, LeaderRetrievalListener,
    LeaderRetrievalService, DEFAULT_LEADER_ID,
};

pub struct StandaloneLeaderElectionService {
    address: String,
    contender: Mutex<Option<Arc<dyn LeaderContender>>>,
}

impl StandaloneLeaderElectionService {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            contender: Mutex::new(None),
        }
    }

    /// The fixed address this role is served from.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl LeaderElectionService for StandaloneLeaderElectionService {
    fn start(&self, contender: Arc<dyn LeaderContender>) -> Result<()> {
        {
            let mut current = self.contender.lock();
            if current.is_some() {
                return Err(Error::AlreadyStarted);
            }
            *current = Some(Arc::clone(&contender));
        }
        contender.grant_leadership(DEFAULT_LEADER_ID);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let stopped = self.contender.lock().take();
        if let Some(contender) = stopped {
            contender.revoke_leadership();
        }
        Ok(())
    }

    fn confirm_leadership(&self, session_id: Uuid, address: &str) {
        if address != self.address {
            tracing::warn!(
                configured = %self.address,
                confirmed = address,
                %session_id,
                "leader confirmed an address that differs from the configured one"
            );
        }
    }

    fn has_leadership(&self, session_id: Uuid) -> bool {
        session_id == DEFAULT_LEADER_ID && self.contender.lock().is_some()
    }
}

pub struct StandaloneLeaderRetrievalService {
    address: String,
    started: Mutex<bool>,
}

impl StandaloneLeaderRetrievalService {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            started: Mutex::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl LeaderRetrievalService for StandaloneLeaderRetrievalService {
    fn start(&self, listener: Arc<dyn LeaderRetrievalListener>) -> Result<()> {
        {
            let mut started = self.started.lock();
            if *started {
                return Err(Error::AlreadyStarted);
            }
            *started = true;
        }
        listener.notify_leader_address(Some(LeaderInformation {
            session_id: DEFAULT_LEADER_ID,
            address: self.address.clone(),
        }));
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        *self.started.lock() = false;
        Ok(())
    }
}
