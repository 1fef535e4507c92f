//! Drives one turn from prompt to reconciled slots

use tokio::sync::mpsc;
use log::{debug, error, warn};

use crate::backend::{BackendCommand, GenerateReply};
use crate::client::HubState;
use crate::request::GenerateRequest;
use crate::turn::{TurnId, TurnOutcome};
use crate::HubEvent;

/// Backend reply routed back to the hub task by turn identity
#[derive(Debug)]
pub struct Resolution
{   pub turn_id: TurnId
  , pub result: GenerateReply
}

/// Create the turn, then hand the request to the backend without
/// waiting for it. Empty prompts are rejected before anything changes.
pub fn submit(
  state: &mut HubState
, prompt: String
) -> Result<TurnId, crate::error::Error>
{   let turn_id = state.store.start_turn(&prompt, &state.providers)?;
    state.notify(HubEvent::TurnStarted { turn_id });

    let request = GenerateRequest
    {   prompt
      , optimized: crate::optimized::resolve(
          state.explicit_optimized,
          state.has_rated
        )
      , conversation_id: state.store.conversation_id()
    };
    debug!(
      "Turn {}: generate (optimized: {}, conversation: {:?})",
      turn_id, request.optimized, request.conversation_id
    );

    let (reply_tx, mut reply_rx)
      = mpsc::unbounded_channel();

    let sent = state.backend.send(BackendCommand::Generate {
      request,
      reply: reply_tx,
    });
    if sent.is_err()
    {   error!("Backend disconnected, failing turn {}", turn_id);
        resolve(state, Resolution
        {   turn_id
          , result: Err(crate::error::Error::Other(
              "Backend disconnected".to_string()
            ))
        });
        return Ok(turn_id);
    }

    let resolve_tx = state.resolve_tx.clone();
    tokio::spawn(async move {
      let result = reply_rx.recv().await.unwrap_or_else(|| {
        Err(crate::error::Error::Other(
          "Backend dropped request".to_string()
        ))
      });
      let _ = resolve_tx.send(Resolution { turn_id, result });
    });

    Ok(turn_id)
}

/// Apply a backend reply to its turn. Turns discarded by a reset
/// are left alone, including the conversation id they carried, and
/// raise no notification.
pub fn resolve(state: &mut HubState, resolution: Resolution)
{   let Resolution { turn_id, result } = resolution;

    let applied = match result
    {   Ok(response) => {
          let conversation_id = response.conversation_id;
          let applied = state.store.resolve_turn(
            turn_id,
            TurnOutcome::Success(response.into())
          );
          if applied
          {   if let Some(id) = conversation_id
              {   state.store.set_conversation_id(id);
              }
          }
          applied
        }
      , Err(e) => {
          if e.is_transport()
          {   warn!("Turn {} failed: {}", turn_id, e);
          } else
          {   error!("Turn {} failed: {}", turn_id, e);
          }
          let applied = state.store
            .resolve_turn(turn_id, TurnOutcome::failed());
          if applied
          {   state.notify(HubEvent::SubmissionFailed
              {   turn_id
                , message: crate::SUBMISSION_FAILED_MESSAGE.to_string()
              });
          }
          applied
        }
    };

    if applied
    {   if let Some(turn) = state.store.turn(turn_id)
        {   state.notify(HubEvent::TurnResolved { turn: turn.clone() });
        }
    }
}
