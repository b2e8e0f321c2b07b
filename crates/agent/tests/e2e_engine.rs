//! End-to-end tests for the lorecall engine.
//!
//! Each test drives a full run: scripted transport, the real classifier and
//! extractor, the stub dispatcher, and the orchestrator loop.

use std::sync::Arc;

use lorecall_agent::{CancellationToken, Orchestrator, RunOutcome};
use lorecall_config::OrchestratorConfig;
use lorecall_core::{
    BlockKind, EngineEvent, EventBus, ModelTransport, Session, SessionStore, StreamDelta,
};
use lorecall_session::InMemorySessionStore;
use lorecall_tools::StubDispatcher;
use lorecall_transport::ScriptedTransport;
use tokio::sync::mpsc;

// ── Helpers ──────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn engine(transport: Arc<dyn ModelTransport>) -> Orchestrator {
    engine_with(transport, OrchestratorConfig::default())
}

fn engine_with(transport: Arc<dyn ModelTransport>, config: OrchestratorConfig) -> Orchestrator {
    engine_on_bus(transport, config, Arc::new(EventBus::default()))
}

fn engine_on_bus(
    transport: Arc<dyn ModelTransport>,
    config: OrchestratorConfig,
    bus: Arc<EventBus>,
) -> Orchestrator {
    Orchestrator::new(transport, Arc::new(StubDispatcher), "mock-model", config, bus)
}

/// Run to completion, collecting every forwarded delta.
async fn run_collecting(
    engine: &Orchestrator,
    session: &mut Session,
    message: &str,
) -> (RunOutcome, Vec<StreamDelta>) {
    let (tx, mut rx) = mpsc::channel(256);
    let collector = tokio::spawn(async move {
        let mut deltas = Vec::new();
        while let Some(delta) = rx.recv().await {
            deltas.push(delta);
        }
        deltas
    });

    let outcome = engine
        .run(session, message, tx, &CancellationToken::new())
        .await
        .expect("run should succeed");
    let deltas = collector.await.expect("collector task should finish");
    (outcome, deltas)
}

/// Concatenated visible text of one kind.
fn visible_of(deltas: &[StreamDelta], kind: BlockKind) -> String {
    deltas
        .iter()
        .filter_map(|d| match d {
            StreamDelta::VisibleText { kind: k, text } if *k == kind => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// Concatenated visible text of every kind.
fn all_visible(deltas: &[StreamDelta]) -> String {
    deltas
        .iter()
        .filter_map(|d| match d {
            StreamDelta::VisibleText { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

const SCENARIO: &str = "Hello <thinking>reasoning</thinking><tool_semantic_search><query>test</query><top_k>5</top_k></tool_semantic_search><present_answer>Done</present_answer>";

// ── Direct answers ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_direct_answer_no_tools() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::single(
        "<thinking>Easy one.</thinking><present_answer>Paris is the capital of France.</present_answer>",
    ));
    let engine = engine(transport.clone());

    let mut session = Session::new();
    let (outcome, deltas) = run_collecting(&engine, &mut session, "Capital of France?").await;

    assert_eq!(outcome.answer, "Paris is the capital of France.");
    assert!(!outcome.degraded);
    assert_eq!(transport.call_count().await, 1);
    assert_eq!(outcome.report.iterations.len(), 1);
    assert_eq!(outcome.report.tool_call_count(), 0);

    // User turn plus assistant turn, nothing else.
    assert_eq!(session.turns.len(), 2);
    assert_eq!(session.turns[1].content, "Paris is the capital of France.");

    assert_eq!(visible_of(&deltas, BlockKind::Reasoning), "Easy one.");
    assert_eq!(
        visible_of(&deltas, BlockKind::Answer),
        "Paris is the capital of France."
    );
}

#[tokio::test]
async fn e2e_untagged_prose_is_the_answer() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::single(
        "The index holds 412 documents.",
    ));
    let engine = engine(transport);

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "How many documents?").await;

    assert_eq!(outcome.answer, "The index holds 412 documents.");
    assert!(!outcome.degraded);
    assert_eq!(session.turns.len(), 2);
}

// ── Tool round trips ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_tool_round_trip() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::sequence(&[
        "<thinking>Need docs on eviction.</thinking>\n<tool_semantic_search>\n<query>cache eviction</query>\n<top_k>3</top_k>\n</tool_semantic_search>",
        "<present_answer>The cache evicts via LRU.</present_answer>",
    ]));
    let engine = engine(transport.clone());

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "How does eviction work?").await;

    assert_eq!(outcome.answer, "The cache evicts via LRU.");
    assert!(!outcome.degraded);
    assert_eq!(transport.call_count().await, 2);

    // user, tool results, assistant.
    assert_eq!(session.turns.len(), 3);
    let results_turn = &session.turns[1];
    assert!(results_turn.content.contains("semantic_search"));
    assert!(results_turn.content.contains("cache eviction"));
    assert_eq!(session.turns[2].tools_used, vec!["semantic_search".to_string()]);

    assert_eq!(outcome.report.iterations.len(), 2);
    assert_eq!(outcome.report.tool_call_count(), 1);
    assert!(outcome.report.iterations[0].tool_results[0].success);
}

#[tokio::test]
async fn e2e_multiple_tools_in_one_iteration() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::sequence(&[
        "<tool_semantic_search><query>alpha</query></tool_semantic_search><tool_regex_search><pattern>fn build</pattern></tool_regex_search>",
        "<present_answer>Both found.</present_answer>",
    ]));
    let engine = engine(transport);

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "Find alpha and build").await;

    let results = &outcome.report.iterations[0].tool_results;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tool_name, "semantic_search");
    assert_eq!(results[1].tool_name, "regex_search");

    let rendered = &session.turns[1].content;
    assert!(rendered.contains("name=\"semantic_search\""));
    assert!(rendered.contains("name=\"regex_search\""));
}

#[tokio::test]
async fn e2e_concurrent_pool_keeps_extraction_order() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::sequence(&[
        "<tool_lexical_search><query>evict</query></tool_lexical_search><tool_get_file_content><path>src/cache.rs</path></tool_get_file_content>",
        "<present_answer>Ordered.</present_answer>",
    ]));
    let config = OrchestratorConfig {
        tool_concurrency: 3,
        ..OrchestratorConfig::default()
    };
    let engine = engine_with(transport, config);

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "Look things up").await;

    let results = &outcome.report.iterations[0].tool_results;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tool_name, "lexical_search");
    assert_eq!(results[1].tool_name, "get_file_content");
}

#[tokio::test]
async fn e2e_failed_tool_outcome_feeds_back() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::sequence(&[
        "<tool_get_file_section><path>src/lib.rs</path><start_line>40</start_line><end_line>10</end_line></tool_get_file_section>",
        "<present_answer>Those line numbers are reversed.</present_answer>",
    ]));
    let engine = engine(transport);

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "Show lines 40 to 10").await;

    assert_eq!(outcome.answer, "Those line numbers are reversed.");
    let result = &outcome.report.iterations[0].tool_results[0];
    assert!(!result.success);

    // The failure is rendered for the model, not swallowed.
    let rendered = &session.turns[1].content;
    assert!(rendered.contains("error=\"true\""));
    assert!(rendered.contains("end_line 10 is before start_line 40"));
}

#[tokio::test]
async fn e2e_malformed_tool_block_falls_back_to_prose() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::single(
        "<thinking>Lost my train of thought.</thinking><tool_semantic_search>unstructured text</tool_semantic_search>",
    ));
    let engine = engine(transport.clone());

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "Anything?").await;

    // The unparseable block is dropped; with nothing to dispatch the
    // visible prose completes the run after a single round trip.
    assert_eq!(outcome.answer, "Lost my train of thought.");
    assert!(!outcome.degraded);
    assert_eq!(transport.call_count().await, 1);
    assert_eq!(outcome.report.tool_call_count(), 0);
}

// ── Budget exhaustion ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_budget_exhaustion_is_degraded_not_error() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::sequence(&[
        "<thinking>Still digging.</thinking><tool_lexical_search><query>evict</query></tool_lexical_search>",
        "<thinking>Still digging.</thinking><tool_lexical_search><query>evict</query></tool_lexical_search>",
    ]));
    let config = OrchestratorConfig {
        max_iterations: 2,
        ..OrchestratorConfig::default()
    };
    let engine = engine_with(transport.clone(), config);

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "Keep looking").await;

    assert!(outcome.degraded);
    assert!(outcome.report.degraded);
    assert_eq!(outcome.answer, "Still digging.");
    assert_eq!(transport.call_count().await, 2);
    assert_eq!(outcome.report.iterations.len(), 2);

    // user, two tool-results turns, closing assistant turn.
    assert_eq!(session.turns.len(), 4);
}

// ── Streaming properties ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_fragmentation_does_not_change_the_run() {
    init_tracing();
    let whole = {
        let engine = engine(Arc::new(ScriptedTransport::single(SCENARIO)));
        let mut session = Session::new();
        run_collecting(&engine, &mut session, "q").await
    };

    for size in [1usize, 3, 7] {
        let engine = engine(Arc::new(ScriptedTransport::fragmented(SCENARIO, size)));
        let mut session = Session::new();
        let (outcome, deltas) = run_collecting(&engine, &mut session, "q").await;

        assert_eq!(outcome.answer, whole.0.answer, "answer at size {size}");
        assert_eq!(
            all_visible(&deltas),
            all_visible(&whole.1),
            "visible stream at size {size}"
        );
        assert_eq!(
            visible_of(&deltas, BlockKind::Answer),
            "Done",
            "answer text at size {size}"
        );
    }
}

#[tokio::test]
async fn e2e_deltas_never_leak_markup() {
    init_tracing();
    let reply = "Prose first. <thinking>hidden reasoning step</thinking><present_answer>Answer body.</present_answer><answer>duplicate</answer><sources>[1, 2]</sources>";
    let engine = engine(Arc::new(ScriptedTransport::fragmented(reply, 3)));

    let mut session = Session::new();
    let (outcome, deltas) = run_collecting(&engine, &mut session, "q").await;

    assert_eq!(outcome.answer, "Answer body.");

    let visible = all_visible(&deltas);
    assert!(!visible.contains('<'), "leaked markup: {visible}");
    assert!(!visible.contains("duplicate"));
    assert!(!visible.contains("[1, 2]"));
    assert!(visible.contains("hidden reasoning step"));
}

#[tokio::test]
async fn e2e_block_boundaries_are_forwarded() {
    init_tracing();
    let engine = engine(Arc::new(ScriptedTransport::single(SCENARIO)));

    let mut session = Session::new();
    let (_, deltas) = run_collecting(&engine, &mut session, "q").await;

    let started_tool = deltas.iter().any(|d| {
        matches!(
            d,
            StreamDelta::BlockStarted { kind: BlockKind::ToolCall, tool_name: Some(name) }
                if name == "semantic_search"
        )
    });
    let finished_answer = deltas.iter().any(|d| {
        matches!(
            d,
            StreamDelta::BlockFinished { block }
                if block.kind == BlockKind::Answer && block.complete
        )
    });
    assert!(started_tool, "no tool BlockStarted delta");
    assert!(finished_answer, "no answer BlockFinished delta");
}

// ── Events ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_engine_events_cover_the_run() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::sequence(&[
        "<tool_semantic_search><query>events</query></tool_semantic_search>",
        "<present_answer>Observed.</present_answer>",
    ]));
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let engine = engine_on_bus(transport, OrchestratorConfig::default(), bus);

    let mut session = Session::new();
    let (outcome, _) = run_collecting(&engine, &mut session, "q").await;
    assert_eq!(outcome.answer, "Observed.");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::BlockOpened { kind: BlockKind::ToolCall, tool_name: Some(name), .. }
            if name == "semantic_search"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::ToolDispatched { tool_name, success: true, .. }
            if tool_name == "semantic_search"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::IterationFinished { index: 1, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::RunCompleted { degraded: false, .. }
    )));
}

// ── Session persistence ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_session_store_round_trip() {
    init_tracing();
    let store = InMemorySessionStore::new();
    let mut session = store.create().await.expect("create");

    let engine = engine(Arc::new(ScriptedTransport::single(
        "<present_answer>Stored.</present_answer>",
    )));
    let (outcome, _) = run_collecting(&engine, &mut session, "Persist this").await;
    assert_eq!(outcome.answer, "Stored.");

    store.save(&session).await.expect("save");

    let reloaded = store.get(&session.id).await.expect("get");
    assert_eq!(reloaded.turns.len(), 2);
    assert_eq!(reloaded.turns[1].content, "Stored.");

    let ids = store.list().await.expect("list");
    assert!(ids.contains(&session.id));
}
