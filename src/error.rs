use std::fmt;

/// Custom error type for MMHUB operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Prompt was empty or whitespace only
    EmptyPrompt
  , /// Star rating outside 1..=5
    InvalidRating(u8)
  , /// Rating addressed a missing turn/provider or a slot that is not ready
    InvalidTarget
    {   turn_id: crate::TurnId
      , provider: crate::Provider
    }
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// HTTP request error
    HttpError(String)
  , /// Backend returned a non-success status
    ApiError(String)
  , /// Failed to parse backend response
    ParseError(String)
  , /// Timeout error
    Timeout
  , /// Generic error
    Other(String)
}

impl Error
{   /// Backend call failures, all handled the same way by callers
    pub fn is_transport(&self) -> bool
    {   matches!(
          self,
          Error::HttpError(_)
            | Error::ApiError(_)
            | Error::ParseError(_)
            | Error::Timeout
        )
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::EmptyPrompt => {
              write!(f, "Prompt is empty")
            }
          , Error::InvalidRating(stars) => {
              write!(f, "Rating must be 1-5, got {}", stars)
            }
          , Error::InvalidTarget { turn_id, provider } => {
              write!(f,
                "No ready response for {} in turn {}",
                provider, turn_id
              )
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
