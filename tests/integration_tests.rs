//! Integration tests for graph compilation, execution and checkpointing
//!
//! These tests drive whole graphs through the public API using mock nodes,
//! a scripted model and in-memory or on-disk checkpoint stores.

use async_trait::async_trait;
use kinetic_graph::adk::error::{BoxError, DefinitionError, GraphError};
use kinetic_graph::adk::model::{Content, GenerationConfig, Model, Part};
use kinetic_graph::adk::tool::Tool;
use kinetic_graph::kinetic::checkpoint::{
    CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, WritePolicy,
};
use kinetic_graph::kinetic::workflow::builder::Builder;
use kinetic_graph::kinetic::workflow::graph::{CompiledGraph, RunConfig, StateGraph, Target, END};
use kinetic_graph::kinetic::workflow::loader::GraphLoader;
use kinetic_graph::kinetic::workflow::node::{
    FnNode, ModelNode, Node, ToolNode, ToolsCondition, MESSAGES_FIELD,
};
use kinetic_graph::kinetic::workflow::registry::NodeRegistry;
use kinetic_graph::kinetic::workflow::state::{
    FieldType, ReducerType, State, StateFieldDef, StateSchema,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Mock Components
// ============================================================================

fn counter(state: &State) -> i64 {
    state.get("counter").and_then(Value::as_i64).unwrap_or(0)
}

/// A increments the counter, B loops back to A while it is below three
fn counter_graph(calls_a: Arc<AtomicUsize>, calls_b: Arc<AtomicUsize>) -> StateGraph {
    let schema = StateSchema::new().field(
        "counter",
        StateFieldDef::new(ReducerType::Replace)
            .typed(FieldType::Number)
            .with_default(json!(0)),
    );

    let mut graph = StateGraph::new("counter", schema);
    graph
        .add_node(
            "A",
            FnNode::new(move |state: &State| {
                calls_a.fetch_add(1, Ordering::SeqCst);
                Ok(State::new().with("counter", json!(counter(state) + 1)))
            }),
        )
        .add_node(
            "B",
            FnNode::new(move |_state: &State| {
                calls_b.fetch_add(1, Ordering::SeqCst);
                Ok(State::new())
            }),
        )
        .add_edge("A", "B")
        .add_conditional_edges(
            "B",
            |state: &State| -> String {
                let label = if counter(state) < 3 { "again" } else { "done" };
                label.to_string()
            },
            vec![("again", Target::node("A")), ("done", END)],
        )
        .set_entry_point("A");
    graph
}

fn simple_counter() -> StateGraph {
    counter_graph(Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
}

/// Model that replays scripted responses in order
struct MockModel {
    responses: Vec<Content>,
    response_index: AtomicUsize,
}

impl MockModel {
    fn new(responses: Vec<Content>) -> Self {
        Self {
            responses,
            response_index: AtomicUsize::new(0),
        }
    }

    fn text_response(text: &str) -> Content {
        Content::model(vec![Part::Text(text.to_string())])
    }

    fn tool_call_response(tool_name: &str, args: Value) -> Content {
        Content::model(vec![Part::FunctionCall {
            name: tool_name.to_string(),
            args,
            thought_signature: None,
        }])
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_content(
        &self,
        _history: &[Content],
        _config: Option<&GenerationConfig>,
        _tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, BoxError> {
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(index)
            .cloned()
            .ok_or_else(|| "no more scripted responses".into())
    }
}

static ADD_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "number" },
            "b": { "type": "number" }
        },
        "required": ["a", "b"]
    })
});

struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Adds two numbers"
    }

    fn schema(&self) -> &Value {
        &ADD_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, BoxError> {
        let a = input["a"].as_f64().ok_or("missing a")?;
        let b = input["b"].as_f64().ok_or("missing b")?;
        Ok(json!({ "sum": a + b }))
    }
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_counter_loop_runs_three_times() {
    let calls_a = Arc::new(AtomicUsize::new(0));
    let calls_b = Arc::new(AtomicUsize::new(0));
    let graph = counter_graph(calls_a.clone(), calls_b.clone())
        .compile()
        .unwrap();

    let output = graph
        .invoke(State::new().with("counter", json!(0)), &RunConfig::new())
        .await
        .unwrap();

    assert_eq!(output.state.get("counter"), Some(&json!(3)));
    assert_eq!(output.trace, vec!["A", "B", "A", "B", "A", "B"]);
    assert_eq!(calls_a.load(Ordering::SeqCst), 3);
    assert_eq!(calls_b.load(Ordering::SeqCst), 3);
    assert!(output.checkpoint.is_none());
}

#[tokio::test]
async fn test_graph_is_shareable_across_tasks() {
    let graph = Arc::new(simple_counter().compile().unwrap());

    let runs = (0..4).map(|start| {
        let graph = graph.clone();
        tokio::spawn(async move {
            graph
                .run(State::new().with("counter", json!(start)), None)
                .await
        })
    });

    for (start, result) in futures::future::join_all(runs).await.into_iter().enumerate() {
        let state = result.unwrap().unwrap();
        // Starting at or above three still runs A and B once
        let expected = std::cmp::max(3, start as i64 + 1);
        assert_eq!(state.get("counter"), Some(&json!(expected)));
    }
}

#[tokio::test]
async fn test_node_failure_reports_pre_state_and_skips_checkpoint() {
    let store = Arc::new(InMemoryCheckpointStore::new());

    let mut graph = StateGraph::new("failing", StateSchema::new());
    graph
        .add_node("prepare", FnNode::new(|_: &State| Ok(State::new().with("ready", json!(true)))))
        .add_node("explode", FnNode::new(|_: &State| Err("boom".into())))
        .add_edge("prepare", "explode")
        .set_finish_point("explode")
        .set_entry_point("prepare");
    let graph = graph.compile_with_checkpointer(store.clone()).unwrap();

    let err = graph
        .run(State::new(), Some("t1"))
        .await
        .unwrap_err();

    match &err {
        GraphError::NodeExecution { node, source, .. } => {
            assert_eq!(node, "explode");
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.state().unwrap().get("ready"), Some(&json!(true)));
    assert!(store.load("t1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unregistered_label_is_a_routing_error() {
    let store = Arc::new(InMemoryCheckpointStore::new());

    let mut graph = StateGraph::new("lost", StateSchema::new());
    graph
        .add_node("a", FnNode::new(|_: &State| Ok(State::new().with("x", json!(1)))))
        .add_conditional_edges(
            "a",
            |_: &State| -> String { "nowhere".to_string() },
            vec![("somewhere", END)],
        )
        .set_entry_point("a");
    let graph = graph.compile_with_checkpointer(store.clone()).unwrap();

    let err = graph.run(State::new(), Some("t")).await.unwrap_err();
    match &err {
        GraphError::Routing { node, label, .. } => {
            assert_eq!(node, "a");
            assert_eq!(label, "nowhere");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.state().unwrap().get("x"), Some(&json!(1)));
    assert!(store.history("t").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_step_limit_stops_infinite_loop() {
    let mut graph = StateGraph::new("spin", StateSchema::new());
    graph
        .add_node("a", FnNode::new(|_: &State| Ok(State::new())))
        .add_edge("a", "a")
        .set_entry_point("a");
    let graph = graph.compile().unwrap();

    let err = graph
        .invoke(State::new(), &RunConfig::new().with_max_steps(5))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::StepLimitExceeded { limit: 5, .. }));
}

// ============================================================================
// Checkpointing
// ============================================================================

#[tokio::test]
async fn test_each_successful_run_writes_one_checkpoint() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let graph = simple_counter().compile_with_checkpointer(store.clone()).unwrap();

    let first = graph
        .invoke(State::new(), &RunConfig::for_thread("t1"))
        .await
        .unwrap();
    assert_eq!(first.checkpoint.as_ref().unwrap().sequence, 1);
    assert_eq!(first.state.get("counter"), Some(&json!(3)));

    // The second run resumes from counter = 3, so A and B run once
    let second = graph
        .invoke(State::new(), &RunConfig::for_thread("t1"))
        .await
        .unwrap();
    assert_eq!(second.checkpoint.as_ref().unwrap().sequence, 2);
    assert_eq!(second.trace, vec!["A", "B"]);
    assert_eq!(second.state.get("counter"), Some(&json!(4)));

    let history = store.history("t1").await.unwrap();
    assert_eq!(
        history.iter().map(|c| c.sequence).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let latest = graph.get_state("t1").await.unwrap().unwrap();
    assert_eq!(latest.state, second.state);
}

#[tokio::test]
async fn test_threads_are_isolated() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let graph = simple_counter().compile_with_checkpointer(store.clone()).unwrap();

    graph
        .run(State::new().with("counter", json!(10)), Some("high"))
        .await
        .unwrap();
    graph.run(State::new(), Some("low")).await.unwrap();

    let high = store.load("high").await.unwrap().unwrap();
    let low = store.load("low").await.unwrap().unwrap();
    assert_eq!(high.state.get("counter"), Some(&json!(11)));
    assert_eq!(low.state.get("counter"), Some(&json!(3)));
    assert_eq!(high.sequence, 1);
    assert_eq!(low.sequence, 1);

    let mut threads = store.threads().await.unwrap();
    threads.sort();
    assert_eq!(threads, vec!["high", "low"]);
}

#[tokio::test]
async fn test_load_then_save_preserves_state() {
    let store = InMemoryCheckpointStore::new();
    let state = State::new()
        .with("counter", json!(3))
        .with("tags", json!(["a", "b"]));
    store.save("t", &state).await.unwrap();

    let loaded = store.load("t").await.unwrap().unwrap();
    store.save("t", &loaded.state).await.unwrap();

    let reloaded = store.load("t").await.unwrap().unwrap();
    assert_eq!(reloaded.state, state);
    assert_eq!(reloaded.sequence, 2);
}

#[tokio::test]
async fn test_compare_and_swap_rejects_stale_run() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let graph = simple_counter().compile_with_checkpointer(store.clone()).unwrap();
    graph.run(State::new(), Some("t")).await.unwrap();

    let config = RunConfig::for_thread("t").with_write_policy(WritePolicy::CompareAndSwap);
    let stale = graph.start(State::new(), &config).await.unwrap();
    assert_eq!(stale.resumed_from(), Some(1));

    // Another writer lands first
    graph.run(State::new(), Some("t")).await.unwrap();

    let err = stale.finish().await.unwrap_err();
    assert!(matches!(err, GraphError::Checkpoint(_)));
    assert_eq!(store.history("t").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_runs_on_one_thread_get_distinct_sequences() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let graph = Arc::new(simple_counter().compile_with_checkpointer(store.clone()).unwrap());

    let runs = (0..8).map(|_| {
        let graph = graph.clone();
        tokio::spawn(async move {
            graph
                .invoke(State::new(), &RunConfig::for_thread("shared"))
                .await
        })
    });

    let mut sequences: Vec<u64> = futures::future::join_all(runs)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap().checkpoint.unwrap().sequence)
        .collect();
    sequences.sort();
    assert_eq!(sequences, (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store: Arc<dyn CheckpointStore> =
            Arc::new(FileCheckpointStore::open(dir.path()).await.unwrap());
        let graph = simple_counter().compile_with_checkpointer(store).unwrap();
        graph.run(State::new(), Some("persisted")).await.unwrap();
    }

    let store: Arc<dyn CheckpointStore> =
        Arc::new(FileCheckpointStore::open(dir.path()).await.unwrap());
    let graph = simple_counter().compile_with_checkpointer(store.clone()).unwrap();

    let output = graph
        .invoke(State::new(), &RunConfig::for_thread("persisted"))
        .await
        .unwrap();
    assert_eq!(output.state.get("counter"), Some(&json!(4)));
    assert_eq!(output.checkpoint.unwrap().sequence, 2);
    assert_eq!(store.threads().await.unwrap(), vec!["persisted"]);
}

// ============================================================================
// YAML definitions
// ============================================================================

const COUNTER_YAML: &str = include_str!("../demos/counter.yaml");

async fn build_yaml(yaml: &str) -> CompiledGraph {
    let def = GraphLoader::parse_yaml(yaml).unwrap();
    Builder::new(NodeRegistry::with_builtins())
        .build_from_def(&def)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_yaml_counter_demo() {
    let graph = build_yaml(COUNTER_YAML).await;

    let output = graph.invoke(State::new(), &RunConfig::new()).await.unwrap();
    assert_eq!(output.state.get("counter"), Some(&json!(3)));
    assert_eq!(output.state.get("visits"), Some(&json!(["b", "b", "b"])));
    assert_eq!(output.trace, vec!["a", "b", "a", "b", "a", "b"]);
}

#[tokio::test]
async fn test_yaml_graph_with_file_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.yaml");
    std::fs::write(&path, COUNTER_YAML).unwrap();

    let store = Arc::new(FileCheckpointStore::open(dir.path().join("checkpoints")).await.unwrap());
    let graph = Builder::new(NodeRegistry::with_builtins())
        .with_checkpointer(store.clone())
        .build_graph(&path)
        .await
        .unwrap();

    graph.run(State::new(), Some("yaml")).await.unwrap();
    let checkpoint = store.load("yaml").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.get("counter"), Some(&json!(3)));
}

#[tokio::test]
async fn test_custom_node_kind() {
    let registry = NodeRegistry::with_builtins();
    registry
        .register(
            "greet",
            |_id: &str, params: &Value| -> Result<Arc<dyn Node>, DefinitionError> {
                let name = params["name"].as_str().unwrap_or("world").to_string();
                Ok(Arc::new(FnNode::new(move |_: &State| {
                    Ok(State::new().with("greeting", json!(format!("hello {}", name))))
                })))
            },
        )
        .await;

    let def = GraphLoader::parse_yaml(
        r#"
name: greeter
entry: hi
nodes:
  - { id: hi, kind: greet, params: { name: graph } }
edges:
  - { from: hi, finish: true }
"#,
    )
    .unwrap();
    let graph = Builder::new(registry).build_from_def(&def).await.unwrap();

    let state = graph.run(State::new(), None).await.unwrap();
    assert_eq!(state.get("greeting"), Some(&json!("hello graph")));
}

// ============================================================================
// Agent loop
// ============================================================================

#[tokio::test]
async fn test_model_tool_loop() {
    let model = Arc::new(MockModel::new(vec![
        MockModel::tool_call_response("add", json!({ "a": 2, "b": 3 })),
        MockModel::text_response("The sum is 5"),
    ]));
    let tool: Arc<dyn Tool> = Arc::new(AddTool);

    let schema = StateSchema::new().field(
        MESSAGES_FIELD,
        StateFieldDef::new(ReducerType::Append).typed(FieldType::Array),
    );
    let mut graph = StateGraph::new("agent", schema);
    graph
        .add_node("agent", ModelNode::new(model.clone()).with_tools(vec![tool.clone()]))
        .add_node("tools", ToolNode::new(vec![tool]))
        .add_conditional_edges(
            "agent",
            ToolsCondition::new(),
            vec![
                (ToolsCondition::TOOLS, Target::node("tools")),
                (ToolsCondition::END, END),
            ],
        )
        .add_edge("tools", "agent")
        .set_entry_point("agent");
    let graph = graph.compile().unwrap();

    let input = State::new().with(
        MESSAGES_FIELD,
        serde_json::to_value(vec![Content::user("What is 2 + 3?")]).unwrap(),
    );
    let output = graph.invoke(input, &RunConfig::new()).await.unwrap();

    assert_eq!(output.trace, vec!["agent", "tools", "agent"]);
    let messages: Vec<Content> =
        serde_json::from_value(output.state.get(MESSAGES_FIELD).unwrap().clone()).unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3].text(), Some("The sum is 5".to_string()));
    match &messages[2].parts[0] {
        Part::FunctionResponse { name, response } => {
            assert_eq!(name, "add");
            assert_eq!(response["sum"], json!(5.0));
        }
        other => panic!("expected a tool response, got {:?}", other),
    }
    assert_eq!(model.response_index.load(Ordering::SeqCst), 2);
}
