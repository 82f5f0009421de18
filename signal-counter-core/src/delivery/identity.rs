//! Device identity sent alongside every batch

use std::path::PathBuf;

use crate::config::DeliveryConfig;

/// Source of a stable identifier for this device
pub trait DeviceIdentity: Send + Sync {
    /// The identifier, or an empty string when it cannot be determined.
    fn device_id(&self) -> String;
}

/// Reads the identifier from a file such as `/sys/class/net/eth0/address`
#[derive(Debug, Clone)]
pub struct FileIdentity {
    path: PathBuf,
}

impl FileIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DeviceIdentity for FileIdentity {
    fn device_id(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw.trim().to_string(),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Could not read device identifier; sending empty id"
                );
                String::new()
            }
        }
    }
}

/// A fixed identifier from configuration
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub String);

impl DeviceIdentity for StaticIdentity {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}

/// Pick the identity source described by `config`.
pub fn from_config(config: &DeliveryConfig) -> Box<dyn DeviceIdentity> {
    match &config.device_id {
        Some(id) => Box::new(StaticIdentity(id.clone())),
        None => Box::new(FileIdentity::new(&config.identity_path)),
    }
}
