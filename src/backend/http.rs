use tokio::sync::mpsc;
use log::{debug, trace, error, info};

use super::{BackendCommand, BackendSender, FeedbackReply, GenerateReply};
use crate::request::{FeedbackRequest, GenerateRequest, GenerateResponse};

// ===== HTTP Backend Actor =====

/// HTTP backend state, cloned into each request task
#[derive(Clone)]
pub struct HttpBackendState
{   api_base: String
  , verbose: bool
  , http_client: reqwest::Client
}

impl HttpBackendState
{   pub fn new(
      config: &crate::config::BackendConfig
    ) -> Result<Self, crate::error::Error>
    {   debug!("Creating HttpBackendState for {}", config.api_base);
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout()
        {   builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
          error!("Failed to build HTTP client: {}", e);
          crate::error::Error::InvalidConfiguration(e.to_string())
        })?;
        Ok(HttpBackendState
        {   api_base: config.api_base
              .trim_end_matches('/')
              .to_string()
          , verbose: config.verbose.unwrap_or(false)
          , http_client
        })
    }

    async fn post<T: serde::Serialize + std::fmt::Debug>(
      &self
    , path: &str
    , body: &T
    ) -> Result<reqwest::Response, crate::error::Error>
    {   if self.verbose
        {   debug!("POST {}{} {:?}", self.api_base, path, body);
        }

        let response = self.http_client
          .post(format!("{}{}", self.api_base, path))
          .header("Content-Type", "application/json")
          .json(body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            if e.is_timeout()
            {   crate::error::Error::Timeout
            } else
            {   crate::error::Error::HttpError(e.to_string())
            }
          })?;

        let status = response.status();
        trace!("{} response status: {}", path, status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Backend error on {}: {}", path, error_text);
            return Err(crate::error::Error::ApiError(
              format!("{}: {}", status, error_text)
            ));
        }

        Ok(response)
    }

    async fn handle_generate(
      &self
    , request: GenerateRequest
    ) -> GenerateReply
    {   debug!(
          "Handling generate (optimized: {}, conversation: {:?})",
          request.optimized, request.conversation_id
        );

        let response = self.post("/generate", &request).await?;

        let generated: GenerateResponse
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            crate::error::Error::ParseError(e.to_string())
          })?;

        debug!(
          "Generate returned {} responses",
          generated.responses.len()
        );
        Ok(generated)
    }

    async fn handle_feedback(
      &self
    , request: FeedbackRequest
    ) -> FeedbackReply
    {   debug!(
          "Handling feedback for prompt {} / {}",
          request.prompt_id, request.provider
        );
        self.post("/feedback", &request).await?;
        Ok(())
    }
}

/// Production backend reached over HTTP
pub struct HttpBackend
{   tx: BackendSender
  , _task: tokio::task::JoinHandle<()>
}

impl HttpBackend
{   /// Create and spawn a new HTTP backend
    pub fn new(
      config: &crate::config::BackendConfig
    ) -> Result<Self, crate::error::Error>
    {   debug!("Creating HttpBackend");
        let state = HttpBackendState::new(config)?;
        let (cmd_tx, cmd_rx)
          = mpsc::unbounded_channel();

        let _task = tokio::spawn(async move {
          run_http_loop(cmd_rx, state).await;
        });

        Ok(HttpBackend
        {   tx: cmd_tx
          , _task
        })
    }

    /// Sender the hub uses to reach this backend
    pub fn sender(&self) -> BackendSender
    {   self.tx.clone()
    }

    /// Shutdown the backend; requests already running still finish
    pub fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down HttpBackend");
        self.tx.send(BackendCommand::Shutdown)
          .map_err(|_| {
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })
    }
}

/// Main HTTP event loop
///
/// Each request runs in its own task so turns never queue
/// behind one another.
async fn run_http_loop(
  mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>
, state: HttpBackendState
)
{   debug!("Starting HTTP backend loop");

    loop
    { match cmd_rx.recv().await
      {   Some(BackendCommand::Generate { request, reply }) => {
            debug!("Processing Generate");
            let state = state.clone();
            tokio::spawn(async move {
              let result = state.handle_generate(request).await;
              let _ = reply.send(result);
            });
          }
        , Some(BackendCommand::Feedback { request, reply }) => {
            debug!("Processing Feedback");
            let state = state.clone();
            tokio::spawn(async move {
              let result = state.handle_feedback(request).await;
              let _ = reply.send(result);
            });
          }
        , Some(BackendCommand::Shutdown) => {
            info!("HTTP backend shutting down");
            break;
          }
        , None => {
            debug!("Command channel closed");
            break;
          }
      }
    }
}
