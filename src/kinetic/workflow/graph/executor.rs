//! Graph executor
//!
//! Drives a single path through a compiled graph: invoke the current node,
//! merge its partial state, resolve the outgoing edge, repeat until the
//! terminal sentinel. The final state is checkpointed only when the run
//! reaches it; failed runs never write.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{Edge, Target};
use crate::adk::error::{CompileError, GraphError};
use crate::kinetic::checkpoint::{Checkpoint, CheckpointStore, WritePolicy};
use crate::kinetic::workflow::node::Node;
use crate::kinetic::workflow::state::{State, StateSchema};

/// Lifecycle of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Created, no node invoked yet
    Ready,
    /// At least one node ran and the terminal sentinel is not reached
    Running,
    Terminal,
    Failed,
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Checkpoint lineage to resume from and write to
    pub thread_id: Option<String>,
    /// Maximum node invocations; `None` runs until the terminal sentinel
    pub max_steps: Option<usize>,
    pub write_policy: WritePolicy,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_write_policy(mut self, write_policy: WritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: String,
    pub state: State,
    /// Node ids in invocation order
    pub trace: Vec<String>,
    /// Snapshot written for this run, if it was checkpointed
    pub checkpoint: Option<Checkpoint>,
}

/// Validated, immutable graph
///
/// Built by [`StateGraph::compile`](super::StateGraph::compile). Shareable
/// across tasks; each run keeps its own state.
pub struct CompiledGraph {
    pub(super) name: String,
    pub(super) schema: StateSchema,
    pub(super) nodes: HashMap<String, Arc<dyn Node>>,
    pub(super) node_order: Vec<String>,
    pub(super) edges: HashMap<String, Edge>,
    pub(super) entry: String,
    pub(super) checkpointer: Option<Arc<dyn CheckpointStore>>,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("node_order", &self.node_order)
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Node ids in registration order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(String::as_str)
    }

    /// Outgoing edge of a node
    pub fn edge(&self, from: &str) -> Option<&Edge> {
        self.edges.get(from)
    }

    pub fn checkpointer(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpointer.as_ref()
    }

    /// Run to completion and return the final state
    pub async fn run(&self, input: State, thread_id: Option<&str>) -> Result<State, GraphError> {
        let config = RunConfig {
            thread_id: thread_id.map(str::to_string),
            ..RunConfig::default()
        };
        Ok(self.invoke(input, &config).await?.state)
    }

    /// Run to completion with explicit options
    pub async fn invoke(&self, input: State, config: &RunConfig) -> Result<RunOutput, GraphError> {
        self.start(input, config).await?.finish().await
    }

    /// Prepare an execution without invoking any node
    ///
    /// Loads the thread's latest checkpoint when a thread id and a store are
    /// both present, falling back to the schema defaults, then merges
    /// `input` into it.
    pub async fn start(&self, input: State, config: &RunConfig) -> Result<Execution<'_>, GraphError> {
        let run_id = Uuid::new_v4().to_string();

        let mut resumed_from = None;
        let mut base = self.schema.initial_state();
        if let (Some(store), Some(thread_id)) = (&self.checkpointer, config.thread_id.as_deref()) {
            if let Some(checkpoint) = store.load(thread_id).await? {
                log::info!(
                    "[{}] Resuming thread {} from checkpoint {}",
                    run_id,
                    thread_id,
                    checkpoint.sequence
                );
                resumed_from = Some(checkpoint.sequence);
                base = checkpoint.state;
            }
        }

        let state = base
            .merge(&input, &self.schema)
            .map_err(|source| GraphError::Merge {
                node: None,
                source,
                state: Box::new(base.clone()),
            })?;

        log::info!("[{}] Starting graph '{}' at '{}'", run_id, self.name, self.entry);
        Ok(Execution {
            graph: self,
            config: config.clone(),
            run_id,
            status: ExecutionStatus::Ready,
            state,
            current: Some(self.entry.clone()),
            trace: Vec::new(),
            resumed_from,
            checkpoint: None,
        })
    }

    /// Latest checkpoint for a thread; `None` without a store
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        match &self.checkpointer {
            Some(store) => Ok(store.load(thread_id).await?),
            None => Ok(None),
        }
    }

    fn resolve(&self, from: &str, state: &State) -> Result<Target, GraphError> {
        match self.edges.get(from) {
            Some(Edge::Static(target)) => Ok(target.clone()),
            Some(Edge::Conditional {
                router,
                destinations,
            }) => {
                let label = router.route(state);
                match destinations.get(&label) {
                    Some(target) => {
                        log::debug!("Node {} routed '{}' -> {}", from, label, target);
                        Ok(target.clone())
                    }
                    None => Err(GraphError::Routing {
                        node: from.to_string(),
                        label,
                        state: Box::new(state.clone()),
                    }),
                }
            }
            None => Err(CompileError::MissingEdge(from.to_string()).into()),
        }
    }
}

/// One in-progress run over a [`CompiledGraph`]
pub struct Execution<'g> {
    graph: &'g CompiledGraph,
    config: RunConfig,
    run_id: String,
    status: ExecutionStatus,
    state: State,
    current: Option<String>,
    trace: Vec<String>,
    resumed_from: Option<u64>,
    checkpoint: Option<Checkpoint>,
}

impl<'g> Execution<'g> {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Node the next step will invoke; `None` once terminal
    pub fn current_node(&self) -> Option<&str> {
        match self.status {
            ExecutionStatus::Terminal => None,
            _ => self.current.as_deref(),
        }
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Checkpoint sequence this run resumed from
    pub fn resumed_from(&self) -> Option<u64> {
        self.resumed_from
    }

    /// Invoke the current node and advance along its edge
    ///
    /// Stepping a terminal execution is a no-op. Any error moves the
    /// execution to [`ExecutionStatus::Failed`], after which it can no
    /// longer step.
    pub async fn step(&mut self) -> Result<ExecutionStatus, GraphError> {
        match self.status {
            ExecutionStatus::Terminal => return Ok(ExecutionStatus::Terminal),
            ExecutionStatus::Failed => {
                return Err(GraphError::NotRunnable(ExecutionStatus::Failed))
            }
            ExecutionStatus::Ready | ExecutionStatus::Running => {}
        }

        match self.advance().await {
            Ok(status) => {
                self.status = status;
                Ok(status)
            }
            Err(e) => {
                log::error!("[{}] Graph '{}' failed: {}", self.run_id, self.graph.name, e);
                self.status = ExecutionStatus::Failed;
                Err(e)
            }
        }
    }

    /// Step until the terminal sentinel is reached
    pub async fn finish(mut self) -> Result<RunOutput, GraphError> {
        while self.step().await? != ExecutionStatus::Terminal {}

        log::info!(
            "[{}] Graph '{}' finished after {} steps",
            self.run_id,
            self.graph.name,
            self.trace.len()
        );
        Ok(RunOutput {
            run_id: self.run_id,
            state: self.state,
            trace: self.trace,
            checkpoint: self.checkpoint,
        })
    }

    async fn advance(&mut self) -> Result<ExecutionStatus, GraphError> {
        let graph = self.graph;

        if let Some(limit) = self.config.max_steps {
            if self.trace.len() >= limit {
                return Err(GraphError::StepLimitExceeded {
                    limit,
                    state: Box::new(self.state.clone()),
                });
            }
        }

        let node_id = self
            .current
            .clone()
            .ok_or(GraphError::NotRunnable(self.status))?;
        let node = graph
            .nodes
            .get(&node_id)
            .ok_or_else(|| CompileError::UnknownNode(node_id.clone()))?;

        log::info!("[{}] Executing node: {}", self.run_id, node_id);
        self.trace.push(node_id.clone());

        let partial = match node.invoke(&self.state).await {
            Ok(partial) => partial,
            Err(source) => {
                return Err(GraphError::NodeExecution {
                    node: node_id,
                    source,
                    state: Box::new(self.state.clone()),
                })
            }
        };

        self.state = self
            .state
            .merge(&partial, &graph.schema)
            .map_err(|source| GraphError::Merge {
                node: Some(node_id.clone()),
                source,
                state: Box::new(self.state.clone()),
            })?;

        match graph.resolve(&node_id, &self.state)? {
            Target::Node(next) => {
                self.current = Some(next);
                Ok(ExecutionStatus::Running)
            }
            Target::End => {
                self.checkpoint = self.persist().await?;
                self.current = None;
                Ok(ExecutionStatus::Terminal)
            }
        }
    }

    async fn persist(&self) -> Result<Option<Checkpoint>, GraphError> {
        let (Some(store), Some(thread_id)) =
            (&self.graph.checkpointer, self.config.thread_id.as_deref())
        else {
            return Ok(None);
        };

        let checkpoint = match self.config.write_policy {
            WritePolicy::LastWriteWins => store.save(thread_id, &self.state).await?,
            WritePolicy::CompareAndSwap => {
                store
                    .save_if(thread_id, &self.state, self.resumed_from)
                    .await?
            }
        };
        log::info!(
            "[{}] Saved checkpoint {} for thread {}",
            self.run_id,
            checkpoint.sequence,
            thread_id
        );
        Ok(Some(checkpoint))
    }
}
