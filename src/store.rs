//! Session-owned conversation state
//!
//! Every mutation is one synchronous call, so readers holding a
//! snapshot never see a turn with only some slots updated.

use log::{debug, trace};
use serde::Serialize;

use crate::turn::{ConversationTurn, TurnId, TurnOutcome};

/// Ordered turns plus the backend conversation id
#[derive(Debug, Default)]
pub struct ConversationStore
{   turns: Vec<ConversationTurn>
  , conversation_id: Option<i64>
  , next_turn: u64
}

impl ConversationStore
{   pub fn new() -> Self
    {   ConversationStore::default()
    }

    /// Append a turn with one pending slot per provider
    pub fn start_turn(
      &mut self
    , prompt: &str
    , providers: &[crate::Provider]
    ) -> Result<TurnId, crate::error::Error>
    {   if prompt.trim().is_empty()
        {   debug!("Rejecting empty prompt");
            return Err(crate::error::Error::EmptyPrompt);
        }
        crate::turn::check_providers(providers)?;

        // ids keep counting across resets so a stale reply never matches
        self.next_turn += 1;
        let id = TurnId(self.next_turn);
        self.turns.push(
          ConversationTurn::new(id, prompt.to_string(), providers)
        );
        debug!("Started turn {} with {} slots", id, providers.len());
        Ok(id)
    }

    /// Apply a backend outcome to every pending slot of a turn.
    /// Returns false when the turn is gone (discarded by a reset).
    pub fn resolve_turn(
      &mut self
    , turn_id: TurnId
    , outcome: TurnOutcome
    ) -> bool
    {   match self.turns.iter_mut().find(|t| t.id() == turn_id)
        {   Some(turn) => {
              trace!("Resolving turn {}: {:?}", turn_id, outcome);
              turn.apply(outcome);
              true
            }
          , None => {
              debug!("Dropping resolution for unknown turn {}", turn_id);
              false
            }
        }
    }

    /// Rate a ready slot; anything else is an invalid target
    pub fn rate_slot(
      &mut self
    , turn_id: TurnId
    , provider: crate::Provider
    , stars: u8
    ) -> Result<(), crate::error::Error>
    {   if !(1..=5).contains(&stars)
        {   return Err(crate::error::Error::InvalidRating(stars));
        }
        let rated = self.turns
          .iter_mut()
          .find(|t| t.id() == turn_id)
          .map(|t| t.rate(provider, stars))
          .unwrap_or(false);
        if !rated
        {   debug!("Cannot rate {} in turn {}", provider, turn_id);
            return Err(crate::error::Error::InvalidTarget
            {   turn_id
              , provider
            });
        }
        Ok(())
    }

    /// Drop all turns and the conversation id in one step
    pub fn reset(&mut self)
    {   debug!("Resetting store ({} turns)", self.turns.len());
        self.turns.clear();
        self.conversation_id = None;
    }

    /// First writer wins for the lifetime of the session
    pub fn set_conversation_id(&mut self, id: i64)
    {   if self.conversation_id.is_none()
        {   debug!("Conversation id set to {}", id);
            self.conversation_id = Some(id);
        }
    }

    pub fn conversation_id(&self) -> Option<i64>
    {   self.conversation_id
    }

    pub fn turns(&self) -> &[ConversationTurn]
    {   &self.turns
    }

    pub fn turn(&self, turn_id: TurnId) -> Option<&ConversationTurn>
    {   self.turns.iter().find(|t| t.id() == turn_id)
    }

    /// Turns still waiting for the backend
    pub fn pending_turns(&self) -> usize
    {   self.turns.iter().filter(|t| t.is_pending()).count()
    }
}

/// Atomic copy of the session handed to readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot
{   pub conversation_id: Option<i64>
  , pub turns: Vec<ConversationTurn>
  , pub explicit_optimized: bool
  , pub has_rated: bool
  , pub in_flight: usize
}
