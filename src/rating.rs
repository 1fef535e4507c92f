//! Star ratings: stored locally first, forwarded to the backend after

use tokio::sync::mpsc;
use log::{debug, warn};

use crate::backend::{BackendCommand, BackendSender};
use crate::client::HubState;
use crate::request::FeedbackRequest;
use crate::turn::TurnId;
use crate::HubEvent;

/// Record a rating and flip the session's has-rated flag before
/// returning. The backend copy is sent in the background and only
/// when the turn has a backend prompt id.
pub fn rate(
  state: &mut HubState
, turn_id: TurnId
, provider: crate::Provider
, stars: u8
) -> Result<(), crate::error::Error>
{   state.store.rate_slot(turn_id, provider, stars)?;
    state.has_rated = true;
    state.notify(HubEvent::RatingSaved { turn_id, provider, stars });

    match state.store.turn(turn_id).and_then(|t| t.server_prompt_id())
    {   Some(prompt_id) => {
          forward(&state.backend, FeedbackRequest
          {   prompt_id
            , provider: provider.wire_name().to_string()
            , rating: stars
          });
        }
      , None => {
          debug!("Turn {} has no prompt id, rating kept locally", turn_id);
        }
    }
    Ok(())
}

/// Failures are logged and dropped; the local rating stands
fn forward(backend: &BackendSender, request: FeedbackRequest)
{   debug!(
      "Forwarding rating {} for prompt {} / {}",
      request.rating, request.prompt_id, request.provider
    );
    let (reply_tx, mut reply_rx)
      = mpsc::unbounded_channel();

    if backend
      .send(BackendCommand::Feedback { request, reply: reply_tx })
      .is_err()
    {   warn!("Rating not forwarded: backend disconnected");
        return;
    }

    tokio::spawn(async move {
      match reply_rx.recv().await
      {   Some(Ok(())) => debug!("Rating forwarded")
        , Some(Err(e)) => warn!("Failed to forward rating: {}", e)
        , None => warn!("Rating forward dropped by backend")
      }
    });
}
