//! Wire types exchanged with the comparison backend

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest
{   /// The prompt text
    pub prompt: String
  , /// Ask the backend to rank providers from rating history
    pub optimized: bool
  , /// Conversation to continue; serialized as null when unset
    pub conversation_id: Option<i64>
}

/// How the backend chose the providers for a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode
{   /// Providers were ranked from rating history
    Rated
  , /// Anything else the backend may report
    #[serde(other)]
    Default
}

/// Body returned by `POST /generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse
{   /// Provider name -> response body, usually text
    pub responses: HashMap<String, serde_json::Value>
  , #[serde(default)]
    pub conversation_id: Option<i64>
  , #[serde(default)]
    pub prompt_id: Option<i64>
  , #[serde(default)]
    pub domain: Option<String>
  , #[serde(default)]
    pub mode: Option<Mode>
  , /// Only meaningful when `mode` is `Rated`; may be null otherwise
    #[serde(default)]
    pub providers_used: Option<Vec<String>>
}

impl GenerateResponse
{   /// Human-readable provider list, present only in rated mode
    pub fn optimized_providers(&self) -> Option<String>
    {   match self.mode
        {   Some(Mode::Rated) => Some(
              self.providers_used
                .as_deref()
                .unwrap_or_default()
                .join(", ")
            )
          , _ => None
        }
    }

    /// Response bodies as display text: strings as-is, null as empty,
    /// anything else as its JSON text
    pub fn response_texts(self) -> HashMap<String, String>
    {   self.responses
          .into_iter()
          .map(|(name, value)| (name, value_text(value)))
          .collect()
    }
}

/// Body of `POST /feedback`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest
{   /// Backend prompt id from a previous `GenerateResponse`
    pub prompt_id: i64
  , /// Provider wire name
    pub provider: String
  , /// Stars, 1..=5
    pub rating: u8
}

fn value_text(value: serde_json::Value) -> String
{   match value
    {   serde_json::Value::String(text) => text
      , serde_json::Value::Null => String::new()
      , other => other.to_string()
    }
}
