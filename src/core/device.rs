//! Static device snapshot attached to every error record.

use serde::{Deserialize, Serialize};

/// Platform and app version captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceContext {
    pub platform: String,
    pub app_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

impl DeviceContext {
    /// Snapshot of the running host.
    pub fn detect() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            os_version: None,
        }
    }

    /// Build a context with explicit values.
    pub fn new<P: Into<String>, V: Into<String>>(platform: P, app_version: V) -> Self {
        Self {
            platform: platform.into(),
            app_version: app_version.into(),
            os_version: None,
        }
    }

    /// Set the OS version.
    pub fn with_os_version<S: Into<String>>(mut self, version: S) -> Self {
        self.os_version = Some(version.into());
        self
    }
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_uses_host() {
        let device = DeviceContext::detect();
        assert_eq!(device.platform, std::env::consts::OS);
        assert_eq!(device.app_version, env!("CARGO_PKG_VERSION"));
    }
}
