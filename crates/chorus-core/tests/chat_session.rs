//! End-to-end session behavior over an in-memory tunnel.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chorus_core::chat::ChatMode;
use chorus_core::chat::pipeline::PAUSED_FILLER;
use chorus_types::chat::{ChatMessage, MessageRole};
use chorus_types::protocol::{ClientMessage, ServerMessage};
use chorus_types::service::ServiceCategory;
use common::{FixedAction, FixedSummary, Harness, ManualStt, ScriptedLlm};
use uuid::Uuid;

#[tokio::test]
async fn test_ready_then_reply_with_speech_and_action() {
    let mut harness = Harness::new(ScriptedLlm::new(&["Luna: Hello, traveller!"]));
    harness.action = Some(FixedAction("smiles"));
    let mut running = harness.start().await;

    match running.next().await {
        ServerMessage::Ready {
            chat_id,
            thinking_speech_urls,
            services,
        } => {
            assert_eq!(chat_id, running.chat_id);
            assert_eq!(thinking_speech_urls.len(), 1);
            assert!(thinking_speech_urls[0].starts_with("http://chorus.test/speech/remote/"));
            assert_eq!(services[&ServiceCategory::TextGen].service_name, "scripted-llm");
            assert!(services.contains_key(&ServiceCategory::ActionInference));
        }
        other => panic!("expected ready, got {other:?}"),
    }

    running.send_message(ClientMessage::Send {
        text: "hi there".to_string(),
        context: Some("on the pier".to_string()),
        actions: Some(vec!["smile".to_string(), "frown".to_string()]),
    });
    assert_eq!(running.next_reply().await, "Hello, traveller!");

    let rest = running.drain(Duration::from_millis(200)).await;
    assert!(rest.iter().any(|m| matches!(m, ServerMessage::Speech { .. })));
    assert!(rest.contains(&ServerMessage::Action {
        value: "smile".to_string()
    }));

    let stored = running.repo.all(running.chat_id);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, MessageRole::User);
    assert_eq!(stored[0].text, "hi there");
    assert_eq!(stored[1].role, MessageRole::Assistant);
    assert_eq!(stored[1].text, "Hello, traveller!");
    running.stop().await;
}

#[tokio::test]
async fn test_unknown_action_falls_back_to_idle() {
    let mut harness = Harness::new(ScriptedLlm::new(&["Sure."]));
    harness.action = Some(FixedAction("xyz"));
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;

    running.send_message(ClientMessage::Send {
        text: "do something".to_string(),
        context: None,
        actions: Some(vec!["smile".to_string(), "frown".to_string()]),
    });
    assert_eq!(running.next_reply().await, "Sure.");
    assert_eq!(
        running.next().await,
        ServerMessage::Action {
            value: "idle".to_string()
        }
    );
    running.stop().await;
}

#[tokio::test]
async fn test_second_message_supersedes_running_generation() {
    let mut llm = ScriptedLlm::new(&[]);
    llm.delay = Duration::from_millis(300);
    let calls = Arc::clone(&llm.calls);
    let mut harness = Harness::new(llm);
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;

    running.send("first");
    // Let the first generation start before superseding it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    running.send("second");

    assert_eq!(running.next_reply().await, "You said: first; second");
    let rest = running.drain(Duration::from_millis(500)).await;
    assert!(
        !rest.iter().any(|m| matches!(m, ServerMessage::Reply { .. })),
        "superseded reply leaked: {rest:?}"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stored = running.repo.all(running.chat_id);
    let texts: Vec<&str> = stored.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first; second", "You said: first; second"]);
    running.stop().await;
}

#[tokio::test]
async fn test_mode_switches_are_processed_in_order() {
    let stt = Arc::new(ManualStt::default());
    let mut harness = Harness::new(ScriptedLlm::new(&[]));
    harness.stt = Some(Arc::clone(&stt));
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;
    assert_eq!(stt.starts.load(Ordering::SeqCst), 1);

    running.send("please go offline");
    running.send("are you there?");
    running.send("go online");

    assert_eq!(running.next_reply().await, "Going offline.");
    assert_eq!(running.next_reply().await, PAUSED_FILLER);
    assert_eq!(running.next_reply().await, "I'm back online.");
    assert_eq!(running.session.mode(), ChatMode::Live);
    assert_eq!(stt.stops.load(Ordering::SeqCst), 1);
    assert_eq!(stt.starts.load(Ordering::SeqCst), 2);

    // Neither the filler nor the switches touch history.
    assert!(running.repo.all(running.chat_id).is_empty());
    running.stop().await;
}

#[tokio::test]
async fn test_analysis_commands() {
    let mut harness = Harness::new(ScriptedLlm::new(&["One.", "Two.", "Two again."]));
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;

    running.send("hello");
    assert_eq!(running.next_reply().await, "One.");
    running.send("how are you");
    assert_eq!(running.next_reply().await, "Two.");

    running.send("analysis mode");
    assert_eq!(
        running.next_reply().await,
        "Analysis mode. Say 'help' for the list of commands."
    );

    running.send("list");
    assert_eq!(running.next_reply().await, "4 messages, 6 tokens in history.");

    running.send("regenerate");
    assert_eq!(running.next_reply().await, "Two again.");

    running.send("repeat");
    assert_eq!(running.next_reply().await, "Two again.");

    running.send("rollback");
    assert_eq!(running.next_reply().await, "Rolled back the last exchange.");
    let texts: Vec<String> = running
        .repo
        .all(running.chat_id)
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["hello", "One."]);

    running.send("dance");
    assert_eq!(running.next_reply().await, "Unknown command: dance");

    running.send("reset");
    assert_eq!(running.next_reply().await, "History cleared.");
    assert!(running.repo.all(running.chat_id).is_empty());

    running.send("list");
    assert_eq!(running.next_reply().await, "0 messages, 0 tokens in history.");
    running.stop().await;
}

#[tokio::test]
async fn test_summarization_folds_oldest_messages() {
    let chat_id = Uuid::now_v7();
    let base = chrono::Utc::now() - chrono::TimeDelta::minutes(10);
    let history: Vec<ChatMessage> = (0..4)
        .map(|i| {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            let mut message = ChatMessage::new(chat_id, role, "a b c d e", 5);
            message.timestamp = base + chrono::TimeDelta::seconds(i);
            message
        })
        .collect();

    let mut llm = ScriptedLlm::new(&["f g h i j"]);
    llm.trigger = 20;
    let mut harness = Harness::new(llm);
    harness.speech = false;
    harness.history = history.clone();
    harness.summary = Some(FixedSummary {
        text: "They talked. Then they",
        digest: 10,
    });
    let mut running = harness.start().await;
    running.next().await;

    running.send("k l m n o");
    running.next_reply().await;

    let (summary, folded) = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let stored = running.repo.all(chat_id);
            let folded: Vec<Uuid> = stored
                .iter()
                .filter(|m| m.summarized_by.is_some())
                .map(|m| m.id)
                .collect();
            let summary = stored.iter().find(|m| m.role == MessageRole::System);
            if let (Some(summary), 2) = (summary, folded.len()) {
                return (summary.clone(), folded);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("summary written");

    assert_eq!(summary.text, "They talked.");
    assert!(summary.timestamp > history[1].timestamp);
    assert!(summary.timestamp < history[2].timestamp);
    assert_eq!(folded, vec![history[0].id, history[1].id]);
    for id in &folded {
        assert_eq!(running.repo.messages.get(id).unwrap().summarized_by, Some(summary.id));
    }

    running.send("analysis mode");
    running.next_reply().await;
    running.send("list");
    // summary (2) + two old messages (10) + user (5) + reply (5)
    assert_eq!(running.next_reply().await, "5 messages, 22 tokens in history.");
    running.stop().await;
}

#[tokio::test]
async fn test_barge_in_truncates_interrupted_reply() {
    let stt = Arc::new(ManualStt::default());
    let mut harness = Harness::new(ScriptedLlm::new(&[
        "The lighthouse has stood on this cliff for two hundred years.",
        "Sorry, go ahead.",
    ]));
    harness.stt = Some(Arc::clone(&stt));
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;

    running.send("tell me a story");
    running.next_reply().await;

    running.send_message(ClientMessage::SpeechPlaybackStart { duration: 1.0 });
    tokio::time::sleep(Duration::from_millis(400)).await;
    let observer = stt.observer();
    observer.speech_started();
    observer.speech_partial("wait");
    observer.speech_finished(Some("wait a moment"));

    assert_eq!(running.next().await, ServerMessage::SpeechRecognitionStart);
    assert_eq!(
        running.next().await,
        ServerMessage::SpeechRecognitionPartial {
            text: "wait".to_string()
        }
    );
    assert_eq!(
        running.next().await,
        ServerMessage::SpeechRecognitionEnd {
            text: Some("wait a moment".to_string())
        }
    );
    assert_eq!(running.next_reply().await, "Sorry, go ahead.");

    let stored = running.repo.all(running.chat_id);
    let interrupted = &stored[1];
    assert!(interrupted.text.ends_with("..."), "{}", interrupted.text);
    assert!(interrupted.text.len() < "The lighthouse has stood on this cliff for two hundred years.".len());
    assert_eq!(stored[2].text, "*interrupts* wait a moment");
    running.stop().await;
}

#[tokio::test]
async fn test_playback_pauses_recognition_when_configured() {
    let stt = Arc::new(ManualStt::default());
    let mut harness = Harness::new(ScriptedLlm::new(&["Here you go."]));
    harness.stt = Some(Arc::clone(&stt));
    harness.config.pause_speech_recognition_during_playback = true;
    let mut running = harness.start().await;
    running.next().await;

    running.send("hello");
    running.next_reply().await;
    assert!(matches!(running.next().await, ServerMessage::Speech { .. }));
    assert_eq!(stt.stops.load(Ordering::SeqCst), 1);

    running.send_message(ClientMessage::SpeechPlaybackStart { duration: 0.5 });
    running.send_message(ClientMessage::SpeechPlaybackComplete);
    tokio::time::timeout(Duration::from_secs(1), async {
        while stt.starts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("recognition resumed after playback");
    running.stop().await;
}

#[tokio::test]
async fn test_bootstrap_message_rejected_and_stop_disposes() {
    let mut harness = Harness::new(ScriptedLlm::new(&[]));
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;

    running.send_message(ClientMessage::NewChat {
        character_id: Uuid::now_v7(),
        user_name: None,
    });
    assert!(matches!(running.next().await, ServerMessage::Error { .. }));

    let disposals = running.stop().await;
    assert_eq!(disposals.count(), 1);
}

#[tokio::test]
async fn test_resumed_unanswered_message_is_extended() {
    let chat_id = Uuid::now_v7();
    let pending = ChatMessage::new(chat_id, MessageRole::User, "are you", 2);
    let mut harness = Harness::new(ScriptedLlm::new(&["Yes."]));
    harness.speech = false;
    harness.history = vec![pending.clone()];
    let mut running = harness.start().await;
    running.next().await;

    running.send("still there?");
    assert_eq!(running.next_reply().await, "Yes.");
    let stored = running.repo.all(chat_id);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].id, pending.id);
    assert_eq!(stored[0].text, "are you; still there?");
    running.stop().await;
}

async fn next_error(running: &mut common::Running) -> String {
    loop {
        if let ServerMessage::Error { message, .. } = running.next().await {
            return message;
        }
    }
}

#[tokio::test]
async fn test_blank_replies_are_retried_then_reported() {
    let llm = ScriptedLlm::new(&["", "   ", "\n\t"]);
    let calls = Arc::clone(&llm.calls);
    let mut harness = Harness::new(llm);
    harness.speech = false;
    let mut running = harness.start().await;
    running.next().await;

    running.send("hello");
    let message = next_error(&mut running).await;
    assert!(message.contains("empty reply after 3 attempts"), "{message}");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(running.repo.all(running.chat_id).len(), 1);

    running.send("again");
    assert_eq!(running.next_reply().await, "You said: hello; again");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    running.stop().await;
}

#[tokio::test]
async fn test_backend_failure_is_reported_and_recognition_resumes() {
    let stt = Arc::new(ManualStt::default());
    let llm = ScriptedLlm::new(&["Here you go."]);
    let failures = Arc::clone(&llm.failures);
    let mut harness = Harness::new(llm);
    harness.stt = Some(Arc::clone(&stt));
    harness.config.pause_speech_recognition_during_playback = true;
    let mut running = harness.start().await;
    running.next().await;

    running.send("hello");
    assert_eq!(running.next_reply().await, "Here you go.");
    assert!(matches!(running.next().await, ServerMessage::Speech { .. }));
    assert_eq!(stt.stops.load(Ordering::SeqCst), 1);
    let starts = stt.starts.load(Ordering::SeqCst);

    failures.store(1, Ordering::SeqCst);
    running.send("and then?");
    let message = next_error(&mut running).await;
    assert_eq!(message, "service 'scripted-llm' failed: boom");
    tokio::time::timeout(Duration::from_secs(1), async {
        while stt.starts.load(Ordering::SeqCst) <= starts {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("recognition resumed after failure");

    running.send("still there?");
    assert_eq!(
        running.next_reply().await,
        "You said: and then?; still there?"
    );
    running.stop().await;
}

#[tokio::test]
async fn test_stop_releases_unfetched_speech() {
    let harness = Harness::new(ScriptedLlm::new(&["Good night."]));
    let mut running = harness.start().await;
    assert!(matches!(running.next().await, ServerMessage::Ready { .. }));

    running.send("bye");
    assert_eq!(running.next_reply().await, "Good night.");
    assert!(matches!(running.next().await, ServerMessage::Speech { .. }));

    let table = Arc::clone(&running.speech_table);
    assert_eq!(table.len(), 2, "thinking line and reply are pending");
    running.stop().await;
    assert!(table.is_empty());
}
