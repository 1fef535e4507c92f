use tokio::sync::mpsc;
use log::{debug, trace, error, info};

use crate::backend::{BackendSender, HttpBackend};
use crate::orchestrator::Resolution;
use crate::store::{ConversationStore, SessionSnapshot};
use crate::{HubCommand, HubEvent, HubFoot};

/// Session state owned by the hub task
pub struct HubState
{   pub store: ConversationStore
  , pub explicit_optimized: bool
  , pub has_rated: bool
  , pub providers: Vec<crate::Provider>
  , pub backend: BackendSender
  , pub events: Option<mpsc::UnboundedSender<HubEvent>>
  , pub resolve_tx: mpsc::UnboundedSender<Resolution>
}

impl HubState
{   pub fn new(
      providers: Vec<crate::Provider>
    , backend: BackendSender
    , events: Option<mpsc::UnboundedSender<HubEvent>>
    , resolve_tx: mpsc::UnboundedSender<Resolution>
    ) -> Self
    {   debug!("Initializing HubState with {} providers", providers.len());
        HubState
        {   store: ConversationStore::new()
          , explicit_optimized: false
          , has_rated: false
          , providers
          , backend
          , events
          , resolve_tx
        }
    }

    /// Fire-and-forget; a dropped receiver is fine
    pub fn notify(&self, event: HubEvent)
    {   if let Some(events) = &self.events
        {   let _ = events.send(event);
        }
    }

    /// Start over: turns, conversation id and rating history go,
    /// the explicit toggle stays
    pub fn new_conversation(&mut self)
    {   self.store.reset();
        self.has_rated = false;
        self.notify(HubEvent::ConversationReset);
    }

    pub fn snapshot(&self) -> SessionSnapshot
    {   SessionSnapshot
        {   conversation_id: self.store.conversation_id()
          , turns: self.store.turns().to_vec()
          , explicit_optimized: self.explicit_optimized
          , has_rated: self.has_rated
          , in_flight: self.store.pending_turns()
        }
    }
}

/// Public API for the MMHUB session - owns the task
pub struct HubBackend
{   hand: crate::HubHand
  , http: Option<HttpBackend>
  , _task_handle: tokio::task::JoinHandle<()>
}

fn disconnected() -> crate::error::Error
{   error!("Hub channel closed");
    crate::error::Error::Other("Hub disconnected".to_string())
}

impl HubBackend
{   fn send(&self, cmd: HubCommand)
      -> Result<(), crate::error::Error>
    {   self.hand.command_tx
          .send(cmd)
          .map_err(|_| disconnected())
    }

    /// Create a hub talking to the HTTP backend from `config`.
    /// Returns immediately - spawns background tasks
    pub fn new(
      config: crate::config::HubConfig
    , event_tx: Option<mpsc::UnboundedSender<HubEvent>>
    ) -> Result<Self, crate::error::Error>
    {   config.validate()?;
        let http = HttpBackend::new(&config.backend)?;
        let mut hub = HubBackend::with_backend(
          config.providers,
          http.sender(),
          event_tx
        )?;
        hub.http = Some(http);
        Ok(hub)
    }

    /// Create a hub on top of any backend actor
    pub fn with_backend(
      providers: Vec<crate::Provider>
    , backend: BackendSender
    , event_tx: Option<mpsc::UnboundedSender<HubEvent>>
    ) -> Result<Self, crate::error::Error>
    {   debug!("Creating HubBackend with task ownership");
        crate::turn::check_providers(&providers)?;

        let (command_tx, command_rx)
          = mpsc::unbounded_channel();

        let hand = crate::HubHand { command_tx };
        let foot = crate::HubFoot { command_rx };

        let _task_handle = tokio::spawn(async move {
          run_hub_loop(foot, providers, backend, event_tx).await
        });

        Ok(HubBackend
        {   hand
          , http: None
          , _task_handle
        })
    }

    /// Submit a prompt - replies as soon as the turn exists,
    /// the backend answer arrives later as `HubEvent`s
    pub async fn submit(
      &self
    , prompt: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::SubmitReply>,
        crate::error::Error
      >
    {   debug!("submit queuing prompt ({} chars)", prompt.len());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.send(HubCommand::Submit(
          crate::SubmitArgs { prompt, reply: reply_tx }
        ))?;

        Ok(reply_rx)
    }

    /// Rate one response - replies once the local rating is stored
    pub async fn rate(
      &self
    , turn_id: crate::TurnId
    , provider: crate::Provider
    , stars: u8
    ) -> Result<
        mpsc::UnboundedReceiver<crate::RateReply>,
        crate::error::Error
      >
    {   debug!("rate queuing {} stars for {}/{}", stars, turn_id, provider);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::RateArgs
        {   turn_id
          , provider
          , stars
          , reply: reply_tx
        };

        self.send(HubCommand::Rate(cmd))?;

        Ok(reply_rx)
    }

    /// Discard the conversation - returns almost immediately
    pub async fn new_conversation(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::NewConversationReply>,
        crate::error::Error
      >
    {   debug!("new_conversation queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.send(HubCommand::NewConversation(
          crate::NewConversationArgs { reply: reply_tx }
        ))?;

        Ok(reply_rx)
    }

    /// Set the explicit optimized toggle - returns almost immediately
    pub async fn set_optimized(
      &self
    , enabled: bool
    ) -> Result<
        mpsc::UnboundedReceiver<crate::SetOptimizedReply>,
        crate::error::Error
      >
    {   debug!("set_optimized queuing {}", enabled);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.send(HubCommand::SetOptimized(
          crate::SetOptimizedArgs { enabled, reply: reply_tx }
        ))?;

        Ok(reply_rx)
    }

    /// Copy of the whole session
    pub async fn snapshot(
      &self
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GetSnapshotReply>,
        crate::error::Error
      >
    {   trace!("snapshot queuing command");
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.send(HubCommand::GetSnapshot(
          crate::GetSnapshotArgs { reply: reply_tx }
        ))?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the hub and its HTTP backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down HubBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        self.hand.command_tx
          .send(HubCommand::KillProcess(
            crate::KillProcessArgs { reply: reply_tx }
          ))
          .map_err(|_| {
            error!("Hub channel already closed");
            crate::error::Error::Other(
              "Hub already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        let result = if let Some(result) = reply_rx.recv().await
        {   debug!("Hub shutdown confirmed");
            result
        } else
        {   error!("Hub shutdown timeout");
            Err(crate::error::Error::Timeout)
        };

        if let Some(http) = self.http
        {   http.shutdown()?;
        }
        result
    }
}

/// Main hub event loop
///
/// Caller commands share one channel and are handled in send order.
/// Every arm runs to completion without awaiting backend work;
/// backend replies come back through `resolve_rx`.
async fn run_hub_loop(
  foot: crate::HubFoot
, providers: Vec<crate::Provider>
, backend: BackendSender
, event_tx: Option<mpsc::UnboundedSender<HubEvent>>
)
{   debug!("Starting HubBackend event loop");
    let (resolve_tx, mut resolve_rx)
      = mpsc::unbounded_channel();
    let mut state
      = HubState::new(providers, backend, event_tx, resolve_tx);
    let HubFoot { mut command_rx } = foot;

    loop
    { tokio::select!
      { cmd = command_rx.recv() => {
          match cmd
          {   Some(HubCommand::Submit(cmd)) => {
                debug!("Received Submit");
                let result
                  = crate::orchestrator::submit(&mut state, cmd.prompt);
                let _ = cmd.reply.send(result);
              }
            , Some(HubCommand::Rate(cmd)) => {
                debug!("Received Rate");
                let result = crate::rating::rate(
                  &mut state,
                  cmd.turn_id,
                  cmd.provider,
                  cmd.stars
                );
                let _ = cmd.reply.send(result);
              }
            , Some(HubCommand::NewConversation(cmd)) => {
                debug!("Received NewConversation");
                state.new_conversation();
                let _ = cmd.reply.send(Ok(()));
              }
            , Some(HubCommand::SetOptimized(cmd)) => {
                debug!("Received SetOptimized({})", cmd.enabled);
                state.explicit_optimized = cmd.enabled;
                let _ = cmd.reply.send(Ok(()));
              }
            , Some(HubCommand::GetSnapshot(cmd)) => {
                let _ = cmd.reply.send(Ok(state.snapshot()));
              }
            , Some(HubCommand::KillProcess(cmd)) => {
                debug!("Received KillProcess");
                let _ = cmd.reply.send(Ok(()));
                info!("HubBackend shutting down");
                break;
              }
            , None => {
                debug!("Hub handle dropped");
                break;
              }
          }
        }
      , Some(resolution) = resolve_rx.recv() => {
          debug!("Received resolution for turn {}", resolution.turn_id);
          crate::orchestrator::resolve(&mut state, resolution);
        }
      }
    }
}
