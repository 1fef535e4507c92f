use mmhub::backend::{BackendCommand, FeedbackReply, GenerateReply};
use mmhub::error::Error;
use mmhub::request::{FeedbackRequest, GenerateRequest, GenerateResponse, Mode};
use mmhub::{
  ConversationTurn, HubBackend, HubEvent, Provider, SessionSnapshot,
  SlotStatus, TurnId,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

type Sender<T> = mpsc::UnboundedSender<T>;
type Receiver<T> = mpsc::UnboundedReceiver<T>;

/// Hub wired to a scripted backend the test answers by hand
struct Harness
{   hub: HubBackend
  , backend_rx: Receiver<BackendCommand>
  , events_rx: Receiver<HubEvent>
}

fn init_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

fn start_hub() -> Harness
{   init_logging();
    let (backend_tx, backend_rx) = mpsc::unbounded_channel();
    let (event_tx, events_rx) = mpsc::unbounded_channel();
    let hub = HubBackend::with_backend(
      Provider::DEFAULT_SET.to_vec(),
      backend_tx,
      Some(event_tx)
    ).unwrap();
    Harness { hub, backend_rx, events_rx }
}

async fn recv<T>(rx: &mut Receiver<T>) -> T
{   tokio::time::timeout(Duration::from_secs(2), rx.recv())
      .await
      .expect("timed out")
      .expect("channel closed")
}

async fn submit(hub: &HubBackend, prompt: &str) -> mmhub::SubmitReply
{   let mut rx = hub.submit(prompt.to_string()).await.unwrap();
    recv(&mut rx).await
}

async fn rate(
  hub: &HubBackend
, turn_id: TurnId
, provider: Provider
, stars: u8
) -> mmhub::RateReply
{   let mut rx = hub.rate(turn_id, provider, stars).await.unwrap();
    recv(&mut rx).await
}

async fn snapshot(hub: &HubBackend) -> SessionSnapshot
{   let mut rx = hub.snapshot().await.unwrap();
    recv(&mut rx).await.unwrap()
}

async fn next_generate(
  rx: &mut Receiver<BackendCommand>
) -> (GenerateRequest, Sender<GenerateReply>)
{   match recv(rx).await
    {   BackendCommand::Generate { request, reply } => (request, reply)
      , other => panic!("expected Generate, got {:?}", other)
    }
}

async fn next_feedback(
  rx: &mut Receiver<BackendCommand>
) -> (FeedbackRequest, Sender<FeedbackReply>)
{   match recv(rx).await
    {   BackendCommand::Feedback { request, reply } => (request, reply)
      , other => panic!("expected Feedback, got {:?}", other)
    }
}

async fn next_resolved(rx: &mut Receiver<HubEvent>) -> ConversationTurn
{   loop
    { if let HubEvent::TurnResolved { turn } = recv(rx).await
      {   return turn;
      }
    }
}

fn generated(
  pairs: &[(&str, &str)]
, conversation_id: i64
, prompt_id: i64
) -> GenerateResponse
{   GenerateResponse
    {   responses: pairs
          .iter()
          .map(|(p, c)| (p.to_string(), serde_json::json!(c)))
          .collect::<HashMap<_, _>>()
      , conversation_id: Some(conversation_id)
      , prompt_id: Some(prompt_id)
      , domain: Some("general".to_string())
      , mode: None
      , providers_used: None
    }
}

const HELLO: [(&str, &str); 3]
  = [("openai", "hi"), ("gemini", "yo"), ("grok", "hey")];

/// Submit "hello" and answer it; returns the ready turn id
async fn scenario_a(h: &mut Harness) -> TurnId
{   let turn_id = submit(&h.hub, "hello").await.unwrap();

    let (request, reply) = next_generate(&mut h.backend_rx).await;
    assert_eq!(request.prompt, "hello");
    assert!(!request.optimized);
    assert_eq!(request.conversation_id, None);

    reply.send(Ok(generated(&HELLO, 42, 7))).unwrap();
    let turn = next_resolved(&mut h.events_rx).await;
    assert_eq!(turn.id(), turn_id);
    turn_id
}

#[tokio::test]
async fn test_hub_initialization()
{   let hub = HubBackend::new(mmhub::config::HubConfig::default(), None)
      .unwrap();
    let snap = snapshot(&hub).await;
    assert!(snap.turns.is_empty());
    assert_eq!(snap.conversation_id, None);
    assert!(!snap.has_rated);
    assert!(hub.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_submit_success_scenario()
{   let mut h = start_hub();
    let turn_id = scenario_a(&mut h).await;

    let snap = snapshot(&h.hub).await;
    assert_eq!(snap.conversation_id, Some(42));
    assert_eq!(snap.in_flight, 0);
    assert_eq!(snap.turns.len(), 1);

    let turn = &snap.turns[0];
    assert_eq!(turn.id(), turn_id);
    assert_eq!(turn.server_prompt_id(), Some(7));
    assert_eq!(turn.domain(), Some("general"));
    assert_eq!(turn.optimized_providers(), None);
    assert_eq!(turn.slots().len(), 3);
    assert!(turn.slots().iter().all(|s| s.status() == SlotStatus::Ready));
    assert_eq!(turn.slot(Provider::OpenAi).unwrap().content(), "hi");
    assert_eq!(turn.slot(Provider::Gemini).unwrap().content(), "yo");
    assert_eq!(turn.slot(Provider::Grok).unwrap().content(), "hey");
}

#[tokio::test]
async fn test_turn_started_before_backend_answers()
{   let mut h = start_hub();
    let turn_id = submit(&h.hub, "hello").await.unwrap();

    assert_eq!(
      recv(&mut h.events_rx).await,
      HubEvent::TurnStarted { turn_id }
    );
    let snap = snapshot(&h.hub).await;
    assert_eq!(snap.in_flight, 1);
    assert!(snap.turns[0].slots().iter().all(|s| s.is_pending()));

    let (_request, reply) = next_generate(&mut h.backend_rx).await;
    reply.send(Ok(generated(&HELLO, 42, 7))).unwrap();
    next_resolved(&mut h.events_rx).await;
    assert_eq!(snapshot(&h.hub).await.in_flight, 0);
}

#[tokio::test]
async fn test_rating_scenario()
{   let mut h = start_hub();
    let turn_id = scenario_a(&mut h).await;

    assert_eq!(rate(&h.hub, turn_id, Provider::OpenAi, 4).await, Ok(()));

    // local state is updated before the forward resolves
    let snap = snapshot(&h.hub).await;
    assert!(snap.has_rated);
    assert_eq!(
      snap.turns[0].slot(Provider::OpenAi).unwrap().rating(),
      Some(4)
    );

    let (feedback, reply) = next_feedback(&mut h.backend_rx).await;
    assert_eq!(feedback, FeedbackRequest
    {   prompt_id: 7
      , provider: "openai".to_string()
      , rating: 4
    });
    reply.send(Ok(())).unwrap();

    submit(&h.hub, "again").await.unwrap();
    let (request, _reply) = next_generate(&mut h.backend_rx).await;
    assert!(request.optimized);
    assert_eq!(request.conversation_id, Some(42));
}

#[tokio::test]
async fn test_rating_saved_event()
{   let mut h = start_hub();
    let turn_id = scenario_a(&mut h).await;

    rate(&h.hub, turn_id, Provider::Grok, 2).await.unwrap();
    assert_eq!(
      recv(&mut h.events_rx).await,
      HubEvent::RatingSaved
      {   turn_id
        , provider: Provider::Grok
        , stars: 2
      }
    );
}

#[tokio::test]
async fn test_submit_failure_scenario()
{   let mut h = start_hub();
    let turn_id = submit(&h.hub, "hello").await.unwrap();

    let (_request, reply) = next_generate(&mut h.backend_rx).await;
    reply.send(Err(Error::HttpError("connection refused".to_string())))
      .unwrap();

    assert_eq!(
      recv(&mut h.events_rx).await,
      HubEvent::TurnStarted { turn_id }
    );
    assert_eq!(
      recv(&mut h.events_rx).await,
      HubEvent::SubmissionFailed
      {   turn_id
        , message: mmhub::SUBMISSION_FAILED_MESSAGE.to_string()
      }
    );
    let turn = next_resolved(&mut h.events_rx).await;
    assert!(turn.slots().iter().all(|s| s.status() == SlotStatus::Failed));
    assert_eq!(turn.server_prompt_id(), None);

    for provider in Provider::DEFAULT_SET
    {   assert_eq!(
          rate(&h.hub, turn_id, provider, 3).await,
          Err(Error::InvalidTarget { turn_id, provider })
        );
    }

    let snap = snapshot(&h.hub).await;
    assert!(!snap.has_rated);
    assert_eq!(snap.conversation_id, None);
    assert!(h.backend_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_empty_prompt_is_rejected()
{   let mut h = start_hub();
    assert_eq!(submit(&h.hub, "   ").await, Err(Error::EmptyPrompt));

    let snap = snapshot(&h.hub).await;
    assert!(snap.turns.is_empty());
    assert!(h.backend_rx.try_recv().is_err());
    assert!(h.events_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rating_pending_slot_is_invalid_target()
{   let mut h = start_hub();
    let turn_id = submit(&h.hub, "hello").await.unwrap();
    let _pending = next_generate(&mut h.backend_rx).await;

    assert_eq!(
      rate(&h.hub, turn_id, Provider::Gemini, 5).await,
      Err(Error::InvalidTarget { turn_id, provider: Provider::Gemini })
    );
    assert!(!snapshot(&h.hub).await.has_rated);
}

#[tokio::test]
async fn test_out_of_order_replies_route_by_turn()
{   let mut h = start_hub();
    let first = submit(&h.hub, "first").await.unwrap();
    let second = submit(&h.hub, "second").await.unwrap();

    let (req_a, reply_a) = next_generate(&mut h.backend_rx).await;
    let (req_b, reply_b) = next_generate(&mut h.backend_rx).await;
    assert_eq!(req_a.prompt, "first");
    assert_eq!(req_b.prompt, "second");

    reply_b.send(Ok(generated(&[
      ("openai", "2a"), ("gemini", "2b"), ("grok", "2c")
    ], 5, 20))).unwrap();
    let resolved = next_resolved(&mut h.events_rx).await;
    assert_eq!(resolved.id(), second);

    let snap = snapshot(&h.hub).await;
    assert_eq!(snap.in_flight, 1);
    assert!(snap.turns[0].is_pending());

    reply_a.send(Ok(generated(&[
      ("openai", "1a"), ("gemini", "1b"), ("grok", "1c")
    ], 6, 10))).unwrap();
    let resolved = next_resolved(&mut h.events_rx).await;
    assert_eq!(resolved.id(), first);

    let snap = snapshot(&h.hub).await;
    assert_eq!(snap.turns[0].id(), first);
    assert_eq!(snap.turns[0].slot(Provider::OpenAi).unwrap().content(), "1a");
    assert_eq!(snap.turns[0].server_prompt_id(), Some(10));
    assert_eq!(snap.turns[1].slot(Provider::OpenAi).unwrap().content(), "2a");
    assert_eq!(snap.turns[1].server_prompt_id(), Some(20));
    // whichever reply lands first sets the conversation
    assert_eq!(snap.conversation_id, Some(5));
}

#[tokio::test]
async fn test_new_conversation_discards_late_reply()
{   let mut h = start_hub();
    let turn_id = scenario_a(&mut h).await;
    rate(&h.hub, turn_id, Provider::OpenAi, 5).await.unwrap();
    let _feedback = next_feedback(&mut h.backend_rx).await;

    submit(&h.hub, "in flight").await.unwrap();
    let (_request, late_reply) = next_generate(&mut h.backend_rx).await;

    let mut rx = h.hub.new_conversation().await.unwrap();
    recv(&mut rx).await.unwrap();
    let after_reset = snapshot(&h.hub).await;
    assert!(after_reset.turns.is_empty());
    assert_eq!(after_reset.conversation_id, None);
    assert!(!after_reset.has_rated);

    late_reply.send(Ok(generated(&HELLO, 99, 8))).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(snapshot(&h.hub).await, after_reset);

    // a fresh conversation starts without an id or rating history
    submit(&h.hub, "fresh").await.unwrap();
    let (request, _reply) = next_generate(&mut h.backend_rx).await;
    assert!(!request.optimized);
    assert_eq!(request.conversation_id, None);
}

#[tokio::test]
async fn test_late_failure_after_reset_is_silent()
{   let mut h = start_hub();
    let turn_id = submit(&h.hub, "doomed").await.unwrap();
    let (_request, late_reply) = next_generate(&mut h.backend_rx).await;
    assert_eq!(
      recv(&mut h.events_rx).await,
      HubEvent::TurnStarted { turn_id }
    );

    let mut rx = h.hub.new_conversation().await.unwrap();
    recv(&mut rx).await.unwrap();
    assert_eq!(recv(&mut h.events_rx).await, HubEvent::ConversationReset);
    let after_reset = snapshot(&h.hub).await;

    late_reply.send(Err(Error::Timeout)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(snapshot(&h.hub).await, after_reset);
    assert!(h.events_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rate_then_submit_without_waiting()
{   for _ in 0..50
    {   let mut h = start_hub();
        let turn_id = scenario_a(&mut h).await;

        // neither reply is awaited before the next command goes out
        let rated = h.hub.rate(turn_id, Provider::OpenAi, 4).await.unwrap();
        let submitted = h.hub.submit("again".to_string()).await.unwrap();

        let request = loop
        { match recv(&mut h.backend_rx).await
          {   BackendCommand::Generate { request, .. } => break request
            , BackendCommand::Feedback { .. } => continue
            , other => panic!("unexpected {:?}", other)
          }
        };
        assert!(request.optimized);
        drop((rated, submitted));
    }
}

#[tokio::test]
async fn test_toggle_then_submit_without_waiting()
{   for _ in 0..50
    {   let mut h = start_hub();
        let toggled = h.hub.set_optimized(true).await.unwrap();
        let submitted = h.hub.submit("hello".to_string()).await.unwrap();

        let (request, _reply) = next_generate(&mut h.backend_rx).await;
        assert!(request.optimized);
        drop((toggled, submitted));
    }
}

#[tokio::test]
async fn test_reply_with_null_fields_resolves_ready()
{   let mut h = start_hub();
    let turn_id = submit(&h.hub, "hello").await.unwrap();
    let (_request, reply) = next_generate(&mut h.backend_rx).await;

    let response: GenerateResponse = serde_json::from_str(r#"{
      "responses": {"openai": "hi", "gemini": "yo", "grok": null},
      "conversation_id": 3,
      "prompt_id": 4,
      "domain": "general",
      "mode": "default",
      "providers_used": null
    }"#).unwrap();
    reply.send(Ok(response)).unwrap();

    let turn = next_resolved(&mut h.events_rx).await;
    assert_eq!(turn.id(), turn_id);
    assert!(turn.slots().iter().all(|s| s.status() == SlotStatus::Ready));
    assert_eq!(turn.slot(Provider::Grok).unwrap().content(), "");
    assert_eq!(turn.optimized_providers(), None);
    assert_eq!(snapshot(&h.hub).await.conversation_id, Some(3));
}

#[tokio::test]
async fn test_explicit_toggle_forces_optimized()
{   let mut h = start_hub();
    let mut rx = h.hub.set_optimized(true).await.unwrap();
    recv(&mut rx).await.unwrap();

    submit(&h.hub, "hello").await.unwrap();
    let (request, reply) = next_generate(&mut h.backend_rx).await;
    assert!(request.optimized);

    let mut response = generated(&HELLO, 42, 7);
    response.mode = Some(Mode::Rated);
    response.providers_used
      = Some(vec!["gemini".to_string(), "grok".to_string()]);
    reply.send(Ok(response)).unwrap();

    let turn = next_resolved(&mut h.events_rx).await;
    assert_eq!(turn.optimized_providers(), Some("gemini, grok"));

    // the toggle survives a new conversation
    let mut rx = h.hub.new_conversation().await.unwrap();
    recv(&mut rx).await.unwrap();
    assert!(snapshot(&h.hub).await.explicit_optimized);
}

#[tokio::test]
async fn test_rating_forward_failure_keeps_local_rating()
{   let mut h = start_hub();
    let turn_id = scenario_a(&mut h).await;

    rate(&h.hub, turn_id, Provider::Gemini, 1).await.unwrap();
    let (_feedback, reply) = next_feedback(&mut h.backend_rx).await;
    reply.send(Err(Error::ApiError("500".to_string()))).unwrap();

    rate(&h.hub, turn_id, Provider::Gemini, 3).await.unwrap();
    let (feedback, _reply) = next_feedback(&mut h.backend_rx).await;
    assert_eq!(feedback.rating, 3);

    let snap = snapshot(&h.hub).await;
    assert!(snap.has_rated);
    assert_eq!(
      snap.turns[0].slot(Provider::Gemini).unwrap().rating(),
      Some(3)
    );
    while let Ok(event) = h.events_rx.try_recv()
    {   assert!(!matches!(event, HubEvent::SubmissionFailed { .. }));
    }
}

#[tokio::test]
async fn test_backend_gone_fails_turn()
{   init_logging();
    let (backend_tx, backend_rx) = mpsc::unbounded_channel();
    drop(backend_rx);
    let (event_tx, mut events_rx) = mpsc::unbounded_channel();
    let hub = HubBackend::with_backend(
      vec![Provider::OpenAi, Provider::Claude],
      backend_tx,
      Some(event_tx)
    ).unwrap();

    let turn_id = submit(&hub, "hello").await.unwrap();
    let turn = next_resolved(&mut events_rx).await;
    assert_eq!(turn.id(), turn_id);
    assert_eq!(turn.slots().len(), 2);
    assert!(turn.slots().iter().all(|s| s.status() == SlotStatus::Failed));

    let _ = hub.shutdown().await;
}

#[tokio::test]
async fn test_hub_rejects_bad_provider_list()
{   let (backend_tx, _backend_rx) = mpsc::unbounded_channel();
    assert!(HubBackend::with_backend(vec![], backend_tx, None).is_err());
}

#[tokio::test]
#[ignore]
async fn test_http_backend_round_trip()
{   init_logging();
    if std::env::var(mmhub::config::API_URL_ENV).is_err()
    {   println!(
          "Skipping: {} not set",
          mmhub::config::API_URL_ENV
        );
        return;
    }

    let (event_tx, mut events_rx) = mpsc::unbounded_channel();
    let hub = HubBackend::new(
      mmhub::config::HubConfig::from_env(),
      Some(event_tx)
    ).unwrap();

    let turn_id = submit(&hub, "What is 2+2?").await.unwrap();
    let turn = loop
    { match tokio::time::timeout(
        Duration::from_secs(60),
        events_rx.recv()
      ).await
      {   Ok(Some(HubEvent::TurnResolved { turn })) => break turn
        , Ok(Some(_)) => continue
        , _ => panic!("no reply from backend")
      }
    };
    assert_eq!(turn.id(), turn_id);

    for slot in turn.slots()
    {   println!("{}: {:?} {}", slot.provider(), slot.status(), slot.content());
    }

    if turn.server_prompt_id().is_some()
    {   rate(&hub, turn_id, Provider::OpenAi, 5).await.unwrap();
    }

    let _ = hub.shutdown().await;
}
