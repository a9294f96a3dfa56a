//! Conversation loop integration tests

use std::sync::Arc;
use std::time::Duration;

use voice_sales_assistant::voice::StreamingSpeaker;
use voice_sales_assistant::{APOLOGY, Assistant, Error, Persona, Result, Role, TurnOutcome};

mod common;

use common::{FakePlayer, FakeRecorder, FakeSynthesizer, ScriptedChat, ScriptedTranscriber};

struct Harness {
    assistant: Assistant,
    player: Arc<FakePlayer>,
    recorder: Arc<FakeRecorder>,
    chat: Arc<ScriptedChat>,
    _dir: tempfile::TempDir,
}

fn harness(transcripts: Vec<Result<String>>, replies: Vec<Result<String>>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let synth = Arc::new(FakeSynthesizer::new(dir.path()));
    let player = Arc::new(FakePlayer::new(0));
    let recorder = Arc::new(FakeRecorder::new(dir.path()));
    let chat = Arc::new(ScriptedChat::new(replies));

    let speaker = StreamingSpeaker::new(synth, player.clone())
        .with_poll_interval(Duration::from_millis(5));
    let assistant = Assistant::new(
        Persona::embedded().unwrap(),
        chat.clone(),
        speaker,
        recorder.clone(),
        Arc::new(ScriptedTranscriber::new(transcripts)),
    )
    .with_record_duration(Duration::from_secs(1));

    Harness {
        assistant,
        player,
        recorder,
        chat,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_conversation_until_goodbye() {
    let mut h = harness(
        vec![
            Ok("Tell me about the E5".to_string()),
            Ok("Okay, goodbye".to_string()),
        ],
        vec![Ok("The E5 charges fast. It has 204bhp.".to_string())],
    );

    h.assistant.run("\n\n\n".as_bytes()).await.unwrap();

    assert_eq!(
        h.player.played(),
        vec![
            "Welcome to OMODA! I'm Olivia",
            "How can I assist you today?",
            "The E5 charges fast",
            "It has 204bhp",
            "Thank you for visiting OMODA! Have a great day!",
        ]
    );
    // Third line is never consumed
    assert_eq!(h.recorder.recordings(), 2);
    assert_eq!(h.chat.requests(), 1);

    let roles: Vec<Role> = h
        .assistant
        .agent()
        .conversation()
        .messages()
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn test_end_of_input_stops_after_greeting() {
    let mut h = harness(vec![], vec![]);

    h.assistant.run("".as_bytes()).await.unwrap();

    assert_eq!(h.player.played().len(), 2);
    assert_eq!(h.recorder.recordings(), 0);
}

#[tokio::test]
async fn test_turn_error_keeps_loop_running() {
    let mut h = harness(
        vec![
            Err(Error::Stt("Whisper API error 500".to_string())),
            Ok("bye".to_string()),
        ],
        vec![],
    );

    h.assistant.run("\n\n".as_bytes()).await.unwrap();

    assert_eq!(h.recorder.recordings(), 2);
    assert_eq!(h.chat.requests(), 0);
    assert_eq!(
        h.player.played().last().map(String::as_str),
        Some("Thank you for visiting OMODA! Have a great day!")
    );
}

#[tokio::test]
async fn test_chat_failure_speaks_apology() {
    let mut h = harness(
        vec![Ok("What promotions do you have?".to_string())],
        vec![Err(Error::Agent("timeout".to_string()))],
    );

    let outcome = h.assistant.turn().await.unwrap();

    assert_eq!(outcome, TurnOutcome::Continue);
    let expected: Vec<String> = APOLOGY
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    assert_eq!(h.player.played(), expected);
}

#[tokio::test]
async fn test_exit_turn_skips_agent() {
    let mut h = harness(vec![Ok("GOODBYE!".to_string())], vec![]);

    let outcome = h.assistant.turn().await.unwrap();

    assert_eq!(outcome, TurnOutcome::Exit);
    assert_eq!(h.chat.requests(), 0);
    assert_eq!(h.assistant.agent().conversation().len(), 1);
}
