//! Configuration for the hub and its backend connection

use serde::{Deserialize, Serialize};
use log::{debug, error};

/// Default backend location when nothing else is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Environment variable overriding the backend location
pub const API_URL_ENV: &str = "MMHUB_API_URL";

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig
{   /// API base URL, without trailing slash
    pub api_base: String
  , /// Request timeout in seconds
    pub timeout_secs: Option<u64>
  , /// Enable detailed logging of request bodies
    pub verbose: Option<bool>
}

impl BackendConfig
{   /// Request timeout, if configured
    pub fn timeout(&self) -> Option<std::time::Duration>
    {   self.timeout_secs.map(std::time::Duration::from_secs)
    }
}

impl Default for BackendConfig
{   fn default() -> Self
    {   BackendConfig
        {   api_base: DEFAULT_API_BASE.to_string()
          , timeout_secs: None
          , verbose: None
        }
    }
}

/// MMHUB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig
{   /// Backend connection
    #[serde(default)]
    pub backend: BackendConfig
  , /// Providers requested for every turn, in display order
    #[serde(default = "default_providers")]
    pub providers: Vec<crate::Provider>
}

fn default_providers() -> Vec<crate::Provider>
{   crate::Provider::DEFAULT_SET.to_vec()
}

impl Default for HubConfig
{   fn default() -> Self
    {   HubConfig
        {   backend: BackendConfig::default()
          , providers: default_providers()
        }
    }
}

impl HubConfig
{   /// Defaults, with the api base taken from `MMHUB_API_URL` if set
    pub fn from_env() -> Self
    {   let mut config = HubConfig::default();
        if let Ok(url) = std::env::var(API_URL_ENV)
        {   debug!("Using {} = {}", API_URL_ENV, url);
            config.backend.api_base
              = url.trim_end_matches('/').to_string();
        }
        config
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>)
      -> Result<Self, crate::error::Error>
    {   let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path)
          .map_err(|e| {
            error!("Failed to read config: {}", e);
            crate::error::Error::InvalidConfiguration(
              format!("{}: {}", path.display(), e)
            )
          })?;
        let config: HubConfig = serde_json::from_str(&raw)
          .map_err(|e| {
            error!("Failed to parse config: {}", e);
            crate::error::Error::InvalidConfiguration(e.to_string())
          })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the hub cannot run with
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   if self.backend.api_base.trim().is_empty()
        {   return Err(crate::error::Error::InvalidConfiguration(
              "api_base is empty".to_string()
            ));
        }
        crate::turn::check_providers(&self.providers)
    }
}
