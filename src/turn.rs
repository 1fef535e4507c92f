//! Conversation turns and their per-provider response slots

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Message left in every slot of a turn whose backend call failed
pub const SLOT_ERROR_MESSAGE: &str = "Error fetching response";

/// Session-unique turn identity, never reused after a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   write!(f, "{}", self.0)
    }
}

/// Lifecycle of one slot: Pending -> Ready | Failed, nothing else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus
{   Pending
  , Ready
  , Failed
}

/// One provider's answer to one prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSlot
{   turn_id: TurnId
  , provider: crate::Provider
  , content: String
  , error: Option<String>
  , status: SlotStatus
  , rating: Option<u8>
  , created_at: DateTime<Utc>
}

impl ResponseSlot
{   fn pending(turn_id: TurnId, provider: crate::Provider) -> Self
    {   ResponseSlot
        {   turn_id
          , provider
          , content: String::new()
          , error: None
          , status: SlotStatus::Pending
          , rating: None
          , created_at: Utc::now()
        }
    }

    /// Stable key, `<turn>-<provider>`
    pub fn key(&self) -> String
    {   format!("{}-{}", self.turn_id, self.provider.wire_name())
    }

    pub fn turn_id(&self) -> TurnId { self.turn_id }
    pub fn provider(&self) -> crate::Provider { self.provider }
    pub fn content(&self) -> &str { &self.content }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn status(&self) -> SlotStatus { self.status }
    pub fn rating(&self) -> Option<u8> { self.rating }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn is_pending(&self) -> bool
    {   self.status == SlotStatus::Pending
    }

    fn mark_ready(&mut self, content: String)
    {   if self.is_pending()
        {   self.content = content;
            self.status = SlotStatus::Ready;
        }
    }

    fn mark_failed(&mut self, message: &str)
    {   if self.is_pending()
        {   self.error = Some(message.to_string());
            self.status = SlotStatus::Failed;
        }
    }

    /// Last write wins; only ready slots accept a rating
    fn set_rating(&mut self, stars: u8) -> bool
    {   if self.status != SlotStatus::Ready
        {   return false;
        }
        self.rating = Some(stars);
        true
    }
}

/// One prompt plus its fixed set of response slots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn
{   id: TurnId
  , prompt: String
  , slots: Vec<ResponseSlot>
  , domain: Option<String>
  , optimized_providers: Option<String>
  , server_prompt_id: Option<i64>
  , created_at: DateTime<Utc>
}

impl ConversationTurn
{   /// New turn with one pending slot per provider, in the given order.
    /// Callers check the provider list first.
    pub(crate) fn new(
      id: TurnId
    , prompt: String
    , providers: &[crate::Provider]
    ) -> Self
    {   ConversationTurn
        {   id
          , prompt
          , slots: providers
              .iter()
              .map(|p| ResponseSlot::pending(id, *p))
              .collect()
          , domain: None
          , optimized_providers: None
          , server_prompt_id: None
          , created_at: Utc::now()
        }
    }

    pub fn id(&self) -> TurnId { self.id }
    pub fn prompt(&self) -> &str { &self.prompt }
    pub fn slots(&self) -> &[ResponseSlot] { &self.slots }
    pub fn domain(&self) -> Option<&str> { self.domain.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn optimized_providers(&self) -> Option<&str>
    {   self.optimized_providers.as_deref()
    }

    pub fn server_prompt_id(&self) -> Option<i64>
    {   self.server_prompt_id
    }

    pub fn slot(&self, provider: crate::Provider)
      -> Option<&ResponseSlot>
    {   self.slots.iter().find(|s| s.provider == provider)
    }

    /// True while any slot still waits for the backend
    pub fn is_pending(&self) -> bool
    {   self.slots.iter().any(|s| s.is_pending())
    }

    /// Move every pending slot at once; resolved slots are left alone
    pub(crate) fn apply(&mut self, outcome: TurnOutcome)
    {   match outcome
        {   TurnOutcome::Success(mut payload) => {
              let id = self.id;
              for slot in self.slots.iter_mut()
              {   let content = payload.responses
                    .remove(&slot.provider)
                    .unwrap_or_else(|| {
                      warn!(
                        "Turn {}: no response for {}",
                        id, slot.provider
                      );
                      String::new()
                    });
                  slot.mark_ready(content);
              }
              for provider in payload.responses.keys()
              {   debug!(
                    "Turn {}: ignoring unrequested provider {}",
                    self.id, provider
                  );
              }
              self.domain = payload.domain;
              self.optimized_providers = payload.optimized_providers;
              self.server_prompt_id = payload.server_prompt_id;
            }
          , TurnOutcome::Failure(message) => {
              for slot in self.slots.iter_mut()
              {   slot.mark_failed(&message);
              }
            }
        }
    }

    pub(crate) fn rate(
      &mut self
    , provider: crate::Provider
    , stars: u8
    ) -> bool
    {   self.slots
          .iter_mut()
          .find(|s| s.provider == provider)
          .map(|s| s.set_rating(stars))
          .unwrap_or(false)
    }
}

/// Turn-level data attached on a successful backend reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnPayload
{   pub responses: HashMap<crate::Provider, String>
  , pub domain: Option<String>
  , pub server_prompt_id: Option<i64>
  , pub optimized_providers: Option<String>
}

impl From<crate::request::GenerateResponse> for TurnPayload
{   fn from(response: crate::request::GenerateResponse) -> Self
    {   let optimized_providers = response.optimized_providers();
        let domain = response.domain.clone();
        let server_prompt_id = response.prompt_id;
        let responses = response.response_texts()
          .into_iter()
          .filter_map(|(name, content)| {
            match name.parse::<crate::Provider>()
            {   Ok(provider) => Some((provider, content))
              , Err(_) => {
                  debug!("Skipping unknown provider {:?}", name);
                  None
                }
            }
          })
          .collect();
        TurnPayload
        {   responses
          , domain
          , server_prompt_id
          , optimized_providers
        }
    }
}

/// How a turn's backend call ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome
{   Success(TurnPayload)
  , /// Message stored in every slot
    Failure(String)
}

impl TurnOutcome
{   /// Generic failure used for any transport problem
    pub fn failed() -> Self
    {   TurnOutcome::Failure(SLOT_ERROR_MESSAGE.to_string())
    }
}

/// Provider lists must be non-empty and duplicate-free
pub fn check_providers(providers: &[crate::Provider])
  -> Result<(), crate::error::Error>
{   if providers.is_empty()
    {   return Err(crate::error::Error::InvalidConfiguration(
          "provider list is empty".to_string()
        ));
    }
    for (i, provider) in providers.iter().enumerate()
    {   if providers[..i].contains(provider)
        {   return Err(crate::error::Error::InvalidConfiguration(
              format!("duplicate provider {}", provider)
            ));
        }
    }
    Ok(())
}
