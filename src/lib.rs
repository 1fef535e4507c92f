pub mod error;
pub mod config;
pub mod request;
pub mod turn;
pub mod store;
pub mod optimized;
pub mod backend;
pub mod orchestrator;
pub mod rating;
pub mod client;

pub use client::HubBackend;
pub use store::{ConversationStore, SessionSnapshot};
pub use turn::{
  ConversationTurn, ResponseSlot, SlotStatus, TurnId, TurnOutcome,
  TurnPayload,
};

use serde::{Deserialize, Serialize};

/*

mmhub (Multi-Model Hub) sends one prompt to a comparison backend that
fans it out to several LLM providers, keeps the answers side by side
as conversation turns, and feeds star ratings back so later turns can
run in "optimized" (rated) mode.

mmhub/
├── Cargo.toml
├── src/
│   ├── lib.rs           # Hub API interface and shared structures
│   ├── error.rs         # Error type sent through reply channels
│   ├── config.rs        # Hub and backend configuration
│   ├── request.rs       # Wire types for /generate and /feedback
│   ├── turn.rs          # Turns, response slots, outcomes
│   ├── store.rs         # ConversationStore and snapshots
│   ├── optimized.rs     # Effective optimized flag
│   ├── orchestrator.rs  # Submit a turn, reconcile its reply
│   ├── rating.rs        # Local rating + async forward
│   ├── client.rs        # HubBackend actor owning the session
│   └── backend/
│       ├── mod.rs       # BackendCommand seam
│       └── http.rs      # reqwest backend actor
└── tests/

*/

/// MMHUB API INTERFACE:

// ===== Submit =====

pub type SubmitReply = Result<TurnId, crate::error::Error>;
pub type SubmitReplySender
  = tokio::sync::mpsc::UnboundedSender<SubmitReply>;

pub struct SubmitArgs
{   pub prompt: String
  , pub reply: SubmitReplySender
}

// ===== Rate =====

pub type RateReply = Result<(), crate::error::Error>;
pub type RateReplySender
  = tokio::sync::mpsc::UnboundedSender<RateReply>;

pub struct RateArgs
{   pub turn_id: TurnId
  , pub provider: Provider
  , pub stars: u8
  , pub reply: RateReplySender
}

// ===== NewConversation =====

pub type NewConversationReply = Result<(), crate::error::Error>;
pub type NewConversationReplySender
  = tokio::sync::mpsc::UnboundedSender<NewConversationReply>;

pub struct NewConversationArgs
{   pub reply: NewConversationReplySender
}

// ===== SetOptimized =====

pub type SetOptimizedReply = Result<(), crate::error::Error>;
pub type SetOptimizedReplySender
  = tokio::sync::mpsc::UnboundedSender<SetOptimizedReply>;

pub struct SetOptimizedArgs
{   pub enabled: bool
  , pub reply: SetOptimizedReplySender
}

// ===== GetSnapshot =====

pub type GetSnapshotReply
  = Result<SessionSnapshot, crate::error::Error>;
pub type GetSnapshotReplySender
  = tokio::sync::mpsc::UnboundedSender<GetSnapshotReply>;

pub struct GetSnapshotArgs
{   pub reply: GetSnapshotReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== HubCommand =====

/// Union of all caller commands. One channel carries them all so the
/// hub handles them in the order they were sent.
pub enum HubCommand
{   Submit(SubmitArgs)
  , Rate(RateArgs)
  , NewConversation(NewConversationArgs)
  , SetOptimized(SetOptimizedArgs)
  , GetSnapshot(GetSnapshotArgs)
  , KillProcess(KillProcessArgs)
}

// ===== HubHand (sender side) =====

pub struct HubHand
{   pub command_tx
      : tokio::sync::mpsc::UnboundedSender<HubCommand>
}

// ===== HubFoot (receiver side) =====

pub struct HubFoot
{   pub command_rx
      : tokio::sync::mpsc::UnboundedReceiver<HubCommand>
}

// ===== Notifications =====

/// Shown to the user when a submission fails
pub const SUBMISSION_FAILED_MESSAGE: &str
  = "Failed to fetch AI responses.";

/// Notifications pushed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent
{   /// Placeholder slots exist for this turn
    TurnStarted { turn_id: TurnId }
  , /// Every slot of the turn left pending
    TurnResolved { turn: ConversationTurn }
  , /// Raised once per failed submission
    SubmissionFailed
    {   turn_id: TurnId
      , message: String
    }
  , RatingSaved
    {   turn_id: TurnId
      , provider: Provider
      , stars: u8
    }
  , ConversationReset
}

/// MMHUB STRUCTURES:

/// Providers the backend can answer with.
/// Serialized as the backend's lowercase wire names.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash,
  PartialOrd, Ord,
)]
pub enum Provider
{
  /// OpenAI (GPT-4)
  #[serde(rename = "openai")]
  OpenAi
  ,
  /// Google Gemini
  #[serde(rename = "gemini")]
  Gemini
  ,
  /// xAI Grok
  #[serde(rename = "grok")]
  Grok
  ,
  /// Anthropic Claude
  #[serde(rename = "claude")]
  Claude
  ,
  /// GitHub Copilot
  #[serde(rename = "github")]
  GithubCopilot
}

impl Provider
{   /// Providers queried for every turn unless configured otherwise
    pub const DEFAULT_SET: [Provider; 3] = [
      Provider::OpenAi
    , Provider::Gemini
    , Provider::Grok
    ];

    pub const ALL: [Provider; 5] = [
      Provider::OpenAi
    , Provider::Gemini
    , Provider::Grok
    , Provider::Claude
    , Provider::GithubCopilot
    ];

    /// Name used in backend requests and responses
    pub fn wire_name(&self) -> &'static str
    {   match self
        {   Provider::OpenAi => "openai"
          , Provider::Gemini => "gemini"
          , Provider::Grok => "grok"
          , Provider::Claude => "claude"
          , Provider::GithubCopilot => "github"
        }
    }

    pub fn display_name(&self) -> &'static str
    {   match self
        {   Provider::OpenAi => "OpenAI GPT-4"
          , Provider::Gemini => "Google Gemini"
          , Provider::Grok => "Grok"
          , Provider::Claude => "Claude 3"
          , Provider::GithubCopilot => "GitHub Copilot"
        }
    }
}

impl std::fmt::Display for Provider
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {   f.write_str(self.wire_name())
    }
}

impl std::str::FromStr for Provider
{   type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   Provider::ALL
          .iter()
          .find(|p| p.wire_name() == s)
          .copied()
          .ok_or_else(|| crate::error::Error::InvalidConfiguration(
            format!("unknown provider: {}", s)
          ))
    }
}
