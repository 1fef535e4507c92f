//! Comparison backend seam
//!
//! The hub only ever talks to a backend through a
//! `BackendSender`; whatever drains that channel is the backend.

pub mod http;

// Re-export for convenience
pub use http::HttpBackend;

pub type GenerateReply = Result<
    crate::request::GenerateResponse,
    crate::error::Error
  >;
pub type FeedbackReply = Result<(), crate::error::Error>;

/// Commands accepted by a backend actor
#[derive(Debug)]
pub enum BackendCommand
{   Generate
    {   request: crate::request::GenerateRequest
      , reply: tokio::sync::mpsc::UnboundedSender<GenerateReply>
    }
  , Feedback
    {   request: crate::request::FeedbackRequest
      , reply: tokio::sync::mpsc::UnboundedSender<FeedbackReply>
    }
  , Shutdown
}

pub type BackendSender
  = tokio::sync::mpsc::UnboundedSender<BackendCommand>;
