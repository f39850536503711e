//! Integration tests for the trace module

use super::*;
use crate::error::MaieuticError;
use serde_json::json;
use std::time::Duration;

async fn routed_turn(session: &SessionHandle, turn: u32, from: AgentMode, to: AgentMode) {
    session
        .record(
            EventData::UserInput(UserInputData {
                turn,
                input: "I'm stuck, can you give me a hint?".to_string(),
            }),
            None,
        )
        .await
        .unwrap();
    session
        .record(
            EventData::IntentRouting(IntentRoutingData {
                turn,
                current_mode: from,
                target_mode: to,
                confidence: 0.9,
                reasoning: "asks for a hint".to_string(),
            }),
            Some(Duration::from_millis(3)),
        )
        .await
        .unwrap();
    session
        .record(
            EventData::StateTransition(StateTransitionData {
                turn,
                from_mode: from,
                to_mode: to,
            }),
            None,
        )
        .await
        .unwrap();
}

async fn full_session(recorder: &TraceRecorder, id: &str) -> SessionHandle {
    let session = recorder.start_session(id).await.unwrap();
    routed_turn(&session, 1, AgentMode::Router, AgentMode::Tutor).await;
    session
        .record(
            EventData::ToolCall(ToolCallData {
                tool_name: "fetch_leetcode_problem".to_string(),
                arguments: json!({"difficulty": "easy"}),
            }),
            None,
        )
        .await
        .unwrap();
    session
        .record(
            EventData::ToolResponse(ToolResponseData {
                tool_name: "fetch_leetcode_problem".to_string(),
                success: true,
                result: Some(json!({"title": "Two Sum"})),
                error: None,
            }),
            Some(Duration::from_millis(40)),
        )
        .await
        .unwrap();
    session
        .record(
            EventData::AgentResponse(AgentResponseData {
                turn: 1,
                mode: AgentMode::Tutor,
                response: "What if you tried sorting the array first?".to_string(),
            }),
            None,
        )
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_sequence_numbers_are_gapless() {
    let recorder = TraceRecorder::default();
    let session = full_session(&recorder, "gapless").await;
    let trace = session.finalize().await;

    assert_eq!(trace.events.len(), 7);
    for (i, event) in trace.events.iter().enumerate() {
        assert_eq!(event.sequence_no, i as u64);
        assert_eq!(event.session_id, "gapless");
    }
    assert_eq!(trace.events[0].event_type(), EventType::SessionStart);
    assert!(trace.verify().is_ok());
}

#[tokio::test]
async fn test_record_after_finalize_fails() {
    let recorder = TraceRecorder::default();
    let session = full_session(&recorder, "closed").await;
    session.finalize().await;

    let err = session
        .record(
            EventData::UserInput(UserInputData {
                turn: 2,
                input: "one more thing".to_string(),
            }),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MaieuticError::InvalidSessionState(_)));
}

#[tokio::test]
async fn test_finalize_is_idempotent() {
    let recorder = TraceRecorder::default();
    let session = full_session(&recorder, "idem").await;

    let first = session.finalize().await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = session.finalize().await;

    assert_eq!(first, second);
    assert!(session.is_finalized().await);
}

#[tokio::test]
async fn test_respond_and_finalize_closes_session() {
    let recorder = TraceRecorder::default();
    let session = recorder.start_session("terminal").await.unwrap();
    routed_turn(&session, 1, AgentMode::Router, AgentMode::Interviewer).await;

    let trace = session
        .respond_and_finalize(
            AgentResponseData {
                turn: 1,
                mode: AgentMode::Interviewer,
                response: "Walk me through your approach.".to_string(),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        trace.final_response().map(|r| r.response.as_str()),
        Some("Walk me through your approach.")
    );
    assert!(session.is_finalized().await);
}

#[tokio::test]
async fn test_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = TraceRecorder::new(&CaptureConfig {
        mode: RecordingMode::Full,
        ..Default::default()
    })
    .unwrap();
    let session = full_session(&recorder, "round_trip").await;
    let trace = session.finalize().await;

    let path = trace.save_to_dir(dir.path()).unwrap();
    let file_name = path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.starts_with("round_trip_"));
    assert!(file_name.ends_with(".json"));

    let loaded = TraceSession::load(&path).unwrap();
    assert_eq!(loaded, trace);

    // re-encoding the decoded session yields the same document
    let first = serde_json::to_value(&trace).unwrap();
    let second = serde_json::to_value(&loaded).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_save_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = TraceRecorder::default();
    let trace = full_session(&recorder, "twice").await.finalize().await;

    let first = trace.save_to_dir(dir.path()).unwrap();
    let second = trace.save_to_dir(dir.path()).unwrap();
    assert_ne!(first, second);
    assert!(trace.save(&first).is_err());
}

#[tokio::test]
async fn test_transition_without_routing_poisons_session() {
    let recorder = TraceRecorder::default();
    let session = recorder.start_session("poisoned").await.unwrap();
    session
        .record(
            EventData::UserInput(UserInputData {
                turn: 1,
                input: "interview me".to_string(),
            }),
            None,
        )
        .await
        .unwrap();

    let err = session
        .record(
            EventData::StateTransition(StateTransitionData {
                turn: 1,
                from_mode: AgentMode::Router,
                to_mode: AgentMode::Interviewer,
            }),
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is_structural());

    // later, otherwise valid events are refused too
    let err = session
        .record(
            EventData::AgentResponse(AgentResponseData {
                turn: 1,
                mode: AgentMode::Router,
                response: "hello".to_string(),
            }),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MaieuticError::StructuralViolation { .. }));
    assert!(session.violation().await.is_some());

    // the partial trace is still inspectable
    let trace = session.finalize().await;
    assert_eq!(trace.events.len(), 2);
}

#[tokio::test]
async fn test_disabled_recorder_keeps_no_events() {
    let recorder = TraceRecorder::disabled();
    assert!(!recorder.is_enabled());

    let session = full_session(&recorder, "dark").await;
    assert_eq!(session.event_count().await, 7);
    assert_eq!(session.active_mode().await, AgentMode::Tutor);

    let trace = session.finalize().await;
    assert!(!trace.is_recorded());
    assert!(trace.events.is_empty());
}

#[tokio::test]
async fn test_redaction_applies_to_saved_copy_only() {
    let recorder = TraceRecorder::default();
    let session = recorder.start_session("redact").await.unwrap();
    routed_turn(&session, 1, AgentMode::Router, AgentMode::Tutor).await;
    session
        .record(
            EventData::ToolCall(ToolCallData {
                tool_name: "fetch_leetcode_problem".to_string(),
                arguments: json!({"slug": "two-sum", "api_key": "sk-123"}),
            }),
            None,
        )
        .await
        .unwrap();

    let trace = session.finalize().await;
    let call = trace.tool_calls().next().unwrap();
    assert_eq!(call.arguments["api_key"], "sk-123");

    let dir = tempfile::tempdir().unwrap();
    let path = recorder.save(&trace, dir.path()).unwrap();
    let saved = TraceSession::load(&path).unwrap();
    let call = saved.tool_calls().next().unwrap();
    assert_eq!(call.arguments["slug"], "two-sum");
    assert_eq!(call.arguments["api_key"], "[REDACTED]");

    let exported = recorder.export(&trace, TraceFormat::Json).unwrap();
    assert!(!exported.contains("sk-123"));
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_interfere() {
    let recorder = TraceRecorder::default();
    let a = recorder.start_session("a").await.unwrap();
    let b = recorder.start_session("b").await.unwrap();

    tokio::join!(
        routed_turn(&a, 1, AgentMode::Router, AgentMode::Tutor),
        routed_turn(&b, 1, AgentMode::Router, AgentMode::Student),
    );

    assert_eq!(a.active_mode().await, AgentMode::Tutor);
    assert_eq!(b.active_mode().await, AgentMode::Student);
    assert_eq!(a.finalize().await.events.len(), 4);
    assert_eq!(b.finalize().await.events.len(), 4);
}

#[tokio::test]
async fn test_verify_detects_gap() {
    let recorder = TraceRecorder::default();
    let mut trace = full_session(&recorder, "gap").await.finalize().await;
    trace.events.remove(2);

    let err = trace.verify().unwrap_err();
    assert!(err.to_string().contains("sequence gap"));
}

#[tokio::test]
async fn test_summary_export() {
    let recorder = TraceRecorder::default();
    let trace = full_session(&recorder, "summary").await.finalize().await;

    let text = TraceExporter::to_summary(&trace);
    assert!(text.contains("Trace: summary"));
    assert!(text.contains("STATE_TRANSITION"));
    assert!(text.contains("router -> tutor"));
    assert!(text.contains("Time in tool calls: 40ms"));

    let json = TraceExporter::export(&trace, TraceFormat::Json).unwrap();
    let parsed: TraceSession = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.events.len(), trace.events.len());
}
