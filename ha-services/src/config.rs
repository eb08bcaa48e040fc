use envconfig::Envconfig;

use crate::error::{Error, Result};
use crate::routing::{ClusterAddresses, DeploymentMode};
use crate::storage::HaStorage;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "HA_DEPLOYMENT_MODE", default = "local")]
    pub deployment_mode: String,

    #[envconfig(from = "HA_STORAGE_DIR", default = "./ha")]
    pub storage_dir: String,

    // ── Cluster mode role addresses ─────────────────────────────────
    #[envconfig(from = "HA_RESOURCE_MANAGER_ADDRESS")]
    pub resource_manager_address: Option<String>,

    #[envconfig(from = "HA_DISPATCHER_ADDRESS")]
    pub dispatcher_address: Option<String>,

    #[envconfig(from = "HA_JOB_MANAGER_ADDRESS")]
    pub job_manager_address: Option<String>,

    #[envconfig(from = "HA_WEB_MONITOR_ADDRESS")]
    pub web_monitor_address: Option<String>,
}

/// Validated deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Cluster(ClusterAddresses),
}

impl Config {
    pub fn storage(&self) -> HaStorage {
        HaStorage::new(&self.storage_dir)
    }

    /// Local mode must not be given fixed addresses; cluster mode needs all four.
    pub fn deployment(&self) -> Result<Deployment> {
        let addresses = [
            ("HA_RESOURCE_MANAGER_ADDRESS", &self.resource_manager_address),
            ("HA_DISPATCHER_ADDRESS", &self.dispatcher_address),
            ("HA_JOB_MANAGER_ADDRESS", &self.job_manager_address),
            ("HA_WEB_MONITOR_ADDRESS", &self.web_monitor_address),
        ];

        match self.deployment_mode.parse::<DeploymentMode>()? {
            DeploymentMode::Local => {
                let configured: Vec<&str> = addresses
                    .iter()
                    .filter(|(_, value)| value.is_some())
                    .map(|(name, _)| *name)
                    .collect();
                if !configured.is_empty() {
                    return Err(Error::invalid_config(format!(
                        "local deployment does not use fixed addresses, but got {}",
                        configured.join(", ")
                    )));
                }
                Ok(Deployment::Local)
            }
            DeploymentMode::Cluster => {
                let missing: Vec<&str> = addresses
                    .iter()
                    .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
                    .map(|(name, _)| *name)
                    .collect();
                if !missing.is_empty() {
                    return Err(Error::invalid_config(format!(
                        "cluster deployment requires {}",
                        missing.join(", ")
                    )));
                }
                Ok(Deployment::Cluster(ClusterAddresses {
                    resource_manager: required(&self.resource_manager_address),
                    dispatcher: required(&self.dispatcher_address),
                    job_manager: required(&self.job_manager_address),
                    web_monitor: required(&self.web_monitor_address),
                }))
            }
        }
    }
}

fn required(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_string()
}
