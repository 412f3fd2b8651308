//! Contract Test: Registration Flow
//!
//! Drives the engine through its run loop exactly as a transport would.
//!
//! Constraints verified:
//! - Exactly one reply per processed message
//! - A full dialogue yields six prompts, one completion and one append
//! - Invalid answers re-prompt without advancing
//! - Messages of one conversation are handled in arrival order
//! - Conversations do not observe each other's state

mod common;

use common::*;
use intake_core::replies;
use intake_core::session::Step;
use intake_core::traits::{ConversationId, RecordStore, TransportEvent};
use intake_core::{ConversationEngine, EngineEvent};

async fn start(
    transport: &ScriptedTransport,
    store: &CountingStore,
) -> (
    ConversationEngine,
    tokio::sync::oneshot::Sender<()>,
    tokio::task::JoinHandle<intake_core::Result<()>>,
    tokio::sync::mpsc::Receiver<EngineEvent>,
) {
    let (engine, event_rx) = ConversationEngine::new(
        Box::new(transport.clone()),
        std::sync::Arc::new(store.clone()),
        minimal_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run_with_shutdown(Some(shutdown_rx)).await });

    (engine, shutdown_tx, handle, event_rx)
}

#[tokio::test]
async fn full_dialogue_persists_one_record() {
    let transport = ScriptedTransport::new();
    let store = CountingStore::new();
    let (_engine, shutdown_tx, handle, _events) = start(&transport, &store).await;

    transport.emit(TransportEvent::Ready);
    for text in registration_script("Jane Doe", "+1 555 123 4567", "jane@x.com") {
        transport.say("chat-1", &text);
    }

    transport.wait_for_replies(7).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let replies = transport.replies_for("chat-1");
    assert_eq!(replies.len(), 7, "one reply per message");
    assert_eq!(replies[0], replies::welcome());
    assert_eq!(replies[1], replies::prompt(Step::Contact));
    assert_eq!(replies[2], replies::prompt(Step::Email));
    assert_eq!(replies[3], replies::prompt(Step::Course));
    assert_eq!(replies[4], replies::prompt(Step::Country));
    assert_eq!(replies[5], replies::prompt(Step::University));
    assert!(replies[6].contains("Registration Complete"));

    assert_eq!(store.append_call_count(), 1, "exactly one append per completed dialogue");

    let records = store.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].contact, "+1 555 123 4567");
    assert_eq!(records[0].course, "CS");
}

#[tokio::test]
async fn invalid_answers_reprompt_until_valid() {
    let transport = ScriptedTransport::new();
    let store = CountingStore::new();
    let (engine, shutdown_tx, handle, _events) = start(&transport, &store).await;

    for text in ["register", "J", "Jane Doe", "12345", "+1 555 123 4567"] {
        transport.say("chat-1", text);
    }
    transport.wait_for_replies(5).await;

    let replies = transport.replies_for("chat-1");
    assert_eq!(replies[1], replies::rejection(Step::Name));
    assert_eq!(replies[2], replies::prompt(Step::Contact));
    assert_eq!(replies[3], replies::rejection(Step::Contact));
    assert_eq!(replies[4], replies::prompt(Step::Email));

    let id = ConversationId::from("chat-1");
    assert_eq!(engine.session_step(&id).await, Some(Step::Email));
    assert_eq!(store.append_call_count(), 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn interleaved_conversations_stay_independent() {
    let transport = ScriptedTransport::new();
    let store = CountingStore::new();
    let (_engine, shutdown_tx, handle, _events) = start(&transport, &store).await;

    let alice = registration_script("Alice Smith", "1111111111", "alice@x.com");
    let bob = registration_script("Bob Jones", "2222222222", "bob@x.com");
    for (a, b) in alice.iter().zip(bob.iter()) {
        transport.say("alice", a);
        transport.say("bob", b);
    }

    transport.wait_for_replies(14).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    for id in ["alice", "bob"] {
        let replies = transport.replies_for(id);
        assert_eq!(replies.len(), 7);
        assert_eq!(replies[0], replies::welcome());
        assert_eq!(replies[5], replies::prompt(Step::University));
        assert!(replies[6].contains("Registration Complete"));
    }

    let mut names: Vec<String> = store
        .records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Alice Smith", "Bob Jones"]);
}

#[tokio::test]
async fn commands_without_session_do_not_start_one() {
    let transport = ScriptedTransport::new();
    let store = CountingStore::new();
    let (engine, shutdown_tx, handle, _events) = start(&transport, &store).await;

    for text in ["hi", "HELP", "what is this?"] {
        transport.say("chat-1", text);
    }
    transport.wait_for_replies(3).await;

    assert_eq!(
        transport.replies_for("chat-1"),
        vec![
            replies::GREETING.to_string(),
            replies::HELP.to_string(),
            replies::UNKNOWN_COMMAND.to_string(),
        ]
    );
    assert_eq!(engine.active_sessions().await, 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn transport_lifecycle_events_are_reported() {
    let transport = ScriptedTransport::new();
    let store = CountingStore::new();
    let (engine, shutdown_tx, handle, mut events) = start(&transport, &store).await;

    transport.emit(TransportEvent::AuthenticationFailed {
        reason: "bad token".to_string(),
    });
    transport.emit(TransportEvent::Ready);
    transport.say("chat-1", "hello");
    transport.wait_for_replies(1).await;

    assert!(engine.is_transport_ready());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&EngineEvent::Started));
    assert!(seen.contains(&EngineEvent::TransportAuthFailed {
        reason: "bad token".to_string()
    }));
    assert!(seen.contains(&EngineEvent::TransportReady));
    assert!(matches!(seen.last(), Some(EngineEvent::Stopped { .. })));
}
