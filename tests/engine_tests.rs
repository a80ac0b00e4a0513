//! Agent engine behavior against a scripted gateway.

mod common;

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{engine_with, memory_store, ScriptedGateway};
use palaver::checkpoint::{Checkpoint, CheckpointStore, EngineState};
use palaver::engine::{AgentEngine, EngineStep, TurnEvent, TurnEventSink};
use palaver::error::PalaverError;
use palaver::tools::ToolRegistry;
use palaver::types::*;

#[tokio::test]
async fn final_answer_finishes_in_one_agent_step() {
    let gateway = ScriptedGateway::new();
    gateway.queue_response("4");
    let store = memory_store();
    let engine = engine_with(gateway.clone(), store.clone(), 25);

    let output = engine.run_turn("t1", Message::human("What is 2+2?")).await.unwrap();

    assert_eq!(output.steps, 1);
    assert_eq!(output.final_message.role, Role::Agent);
    assert_eq!(output.final_message.text(), "4");

    let checkpoint = store.get("t1").await.unwrap().unwrap();
    let stored: Vec<(Role, String)> = checkpoint
        .messages
        .iter()
        .map(|m| (m.role, m.text()))
        .collect();
    assert_eq!(
        stored,
        vec![
            (Role::Human, "What is 2+2?".to_string()),
            (Role::Agent, "4".to_string())
        ]
    );
    assert_eq!(checkpoint.state.next_step, EngineStep::Done);
    assert_eq!(checkpoint.state.last_step, Some(EngineStep::Agent));
    assert_eq!(checkpoint.state.turn, 1);
}

#[tokio::test]
async fn tool_round_trip_appends_one_result_per_call() {
    let gateway = ScriptedGateway::new();
    gateway.queue_tool_calls(&[
        ("call_1", "calc", json!({"a": 2, "b": 2})),
        ("call_2", "calc", json!({"a": 1, "b": 1})),
        ("call_3", "explode", json!({})),
    ]);
    gateway.queue_response("4 and 2");
    let store = memory_store();
    let engine = engine_with(gateway.clone(), store.clone(), 25);

    let output = engine.run_turn("t2", Message::human("sum things")).await.unwrap();

    assert_eq!(output.steps, 3);
    let roles: Vec<Role> = output.new_messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::Human, Role::Agent, Role::Tool, Role::Tool, Role::Tool, Role::Agent]
    );

    let tool_messages: Vec<&Message> = output
        .new_messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_messages[0].text(), "4");
    assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_2"));
    assert_eq!(tool_messages[1].text(), "2");
    assert_eq!(tool_messages[2].tool_call_id.as_deref(), Some("call_3"));
    assert!(tool_messages[2].is_error);
    assert!(tool_messages[2].text().contains("boom"));

    // The second model call saw every tool result.
    let requests = gateway.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 5);
}

#[tokio::test]
async fn system_prompt_is_sent_but_never_stored() {
    let gateway = ScriptedGateway::new();
    gateway.queue_response("hello");
    let store = memory_store();
    let engine = engine_with(gateway.clone(), store.clone(), 25);

    engine.run_turn("t1", Message::human("hi")).await.unwrap();

    let request = &gateway.requests()[0];
    assert_eq!(
        request.instructions.as_deref(),
        Some("You are a careful assistant.")
    );
    assert_eq!(request.tools.len(), 2);
    let checkpoint = store.get("t1").await.unwrap().unwrap();
    assert!(checkpoint
        .messages
        .iter()
        .all(|m| !m.text().contains("careful assistant")));
}

#[tokio::test]
async fn history_carries_over_between_turns() {
    let gateway = ScriptedGateway::new();
    gateway.queue_response("Hi Ada");
    gateway.queue_response("Your name is Ada");
    let store = memory_store();
    let engine = engine_with(gateway.clone(), store.clone(), 25);

    engine.run_turn("t1", Message::human("I am Ada")).await.unwrap();
    engine.run_turn("t1", Message::human("Who am I?")).await.unwrap();

    let second = &gateway.requests()[1];
    let texts: Vec<String> = second.messages.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["I am Ada", "Hi Ada", "Who am I?"]);
    let checkpoint = store.get("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.turn, 2);
}

#[tokio::test]
async fn step_limit_fails_a_runaway_turn() {
    let gateway = ScriptedGateway::new();
    for i in 0..10 {
        let id = format!("call_{i}");
        gateway.queue_tool_calls(&[(id.as_str(), "calc", json!({"a": 1, "b": 1}))]);
    }
    let store = memory_store();
    let engine = engine_with(gateway.clone(), store.clone(), 4);

    let err = engine.run_turn("t1", Message::human("loop")).await.unwrap_err();

    assert!(matches!(err, PalaverError::StepLimitExceeded { max_steps: 4 }));
    // Agent, Tools, Agent, Tools ran; the third model call never happened.
    assert_eq!(gateway.requests().len(), 2);
    let checkpoint = store.get("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.steps, 4);
    assert_eq!(checkpoint.state.next_step, EngineStep::Agent);
}

#[tokio::test]
async fn interrupted_tool_calls_are_repaired_not_rerun() {
    let store = memory_store();
    let dangling = Message::agent_with_tool_calls(
        "",
        vec![ToolCallRequest::new("call_9", "calc", json!({"a": 1, "b": 2}))],
    );
    let state = EngineState {
        last_step: Some(EngineStep::Agent),
        next_step: EngineStep::Tools,
        turn: 1,
        steps: 1,
    };
    store
        .put(
            "t1",
            &Checkpoint::new(vec![Message::human("add"), dangling], state),
        )
        .await
        .unwrap();

    let gateway = ScriptedGateway::new();
    gateway.queue_response("sorry, let me retry");
    let engine = engine_with(gateway.clone(), store.clone(), 25);
    engine.run_turn("t1", Message::human("still there?")).await.unwrap();

    let checkpoint = store.get("t1").await.unwrap().unwrap();
    let repaired = &checkpoint.messages[2];
    assert_eq!(repaired.role, Role::Tool);
    assert_eq!(repaired.tool_call_id.as_deref(), Some("call_9"));
    assert!(repaired.is_error);
    assert!(repaired.text().contains("interrupted"));
    assert_eq!(checkpoint.messages[3].text(), "still there?");
    assert_eq!(checkpoint.messages.len(), 5);
}

#[tokio::test]
async fn model_failure_fails_the_turn_after_persisting_input() {
    let gateway = ScriptedGateway::new();
    gateway.queue_failure("backend down");
    let store = memory_store();
    let engine = engine_with(gateway, store.clone(), 25);

    let err = engine.run_turn("t1", Message::human("hello?")).await.unwrap_err();
    assert!(matches!(err, PalaverError::Model(_)));

    let checkpoint = store.get("t1").await.unwrap().unwrap();
    assert_eq!(checkpoint.messages.len(), 1);
    assert_eq!(checkpoint.messages[0].role, Role::Human);
}

#[tokio::test]
async fn streaming_turn_emits_fragments_and_tool_messages_in_order() {
    let gateway = ScriptedGateway::new();
    gateway.queue_tool_calls(&[("call_1", "calc", json!({"a": 2, "b": 2}))]);
    gateway.queue_response("The answer is 4");
    let store = memory_store();
    let engine = engine_with(gateway, store.clone(), 25);

    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: TurnEventSink = Arc::new(move |event: TurnEvent| captured.lock().unwrap().push(event));

    let output = engine
        .run_turn_streaming("t2", Message::human("2+2?"), sink)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let tool_idx = events
        .iter()
        .position(|e| matches!(e, TurnEvent::ToolMessage(_)))
        .unwrap();
    let streamed_text: String = events[tool_idx..]
        .iter()
        .filter_map(|e| match e {
            TurnEvent::ModelFragment(f) => Some(f.content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed_text, "The answer is 4");
    assert!(events[..tool_idx]
        .iter()
        .all(|e| matches!(e, TurnEvent::ModelFragment(f) if !f.has_text())));

    // Streamed tool-call chunks were reassembled into parsed arguments.
    let checkpoint = store.get("t2").await.unwrap().unwrap();
    assert_eq!(checkpoint.messages[1].tool_calls[0].arguments, json!({"a": 2, "b": 2}));
    assert_eq!(checkpoint.messages[2].text(), "4");
    assert_eq!(output.final_message.text(), "The answer is 4");
}

#[tokio::test]
async fn mid_stream_failure_leaves_no_partial_message() {
    let gateway = ScriptedGateway::new();
    gateway.queue_mid_stream_failure("The ans", "connection reset");
    let store = memory_store();
    let engine = engine_with(gateway, store.clone(), 25);

    let sink: TurnEventSink = Arc::new(|_event: TurnEvent| {});
    let err = engine
        .run_turn_streaming("t3", Message::human("2+2?"), sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PalaverError::Stream(_)));

    let checkpoint = store.get("t3").await.unwrap().unwrap();
    assert_eq!(checkpoint.messages.len(), 1);
    assert_eq!(checkpoint.messages[0].role, Role::Human);
}

#[tokio::test]
async fn builder_requires_gateway_tools_and_store() {
    let err = AgentEngine::builder()
        .tools(Arc::new(ToolRegistry::new()))
        .store(memory_store())
        .build()
        .unwrap_err();
    assert!(matches!(err, PalaverError::Configuration(_)));
    assert!(err.to_string().contains("model gateway"));

    let err = AgentEngine::builder()
        .gateway(ScriptedGateway::new())
        .store(memory_store())
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("tool executor"));

    let err = AgentEngine::builder()
        .gateway(ScriptedGateway::new())
        .tools(Arc::new(ToolRegistry::new()))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("checkpoint store"));
}
