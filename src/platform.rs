//! Runtime platform detection

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable forcing the detected platform
pub const PLATFORM_ENV: &str = "CHAT_STORAGE_PLATFORM";

/// Platform family the client is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Desktop app with a host process
    Desktop,
    /// Mobile app
    Mobile,
    /// Plain web build
    Web,
}

impl Platform {
    /// Platform implied by the compilation target
    pub const fn from_target() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Platform::Mobile
        } else if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else {
            Platform::Desktop
        }
    }

    /// Detect the platform.
    ///
    /// `explicit` wins, then [`PLATFORM_ENV`], then the compilation target.
    /// An unparseable environment value is ignored with a warning.
    pub fn detect(explicit: Option<Platform>) -> Self {
        if let Some(platform) = explicit {
            return platform;
        }
        if let Ok(name) = std::env::var(PLATFORM_ENV) {
            match name.parse() {
                Ok(platform) => return platform,
                Err(e) => tracing::warn!(error = %e, "ignoring {}", PLATFORM_ENV),
            }
        }
        Self::from_target()
    }

    /// Lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Desktop => "desktop",
            Platform::Mobile => "mobile",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Platform::Desktop),
            "mobile" => Ok(Platform::Mobile),
            "web" => Ok(Platform::Web),
            _ => Err(ConfigError::UnknownPlatform {
                name: s.to_string(),
            }),
        }
    }
}
