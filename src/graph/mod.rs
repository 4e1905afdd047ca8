pub mod compile;
pub mod node;

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_stream::{Stream, StreamExt};

use crate::model::{PlanState, StateUpdate};

pub use compile::{CompiledGraph, GraphBuilder, GraphError};
pub use node::{ConcurrencyKind, Node, NodeName};

/// Hard ceiling on an end-to-end pipeline run.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// At most one replanning pass per run.
pub const MAX_RETRIES: u32 = 1;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline timed out after {0:?}")]
    DeadlineExceeded(Duration),
    #[error("node `{node}` failed: {message}")]
    Node { node: NodeName, message: String },
    #[error("graph error: {0}")]
    Graph(String),
}

/// One item of the executor's progress stream.
#[derive(Debug)]
pub enum ExecEvent {
    /// A node finished; `update` is the partial it produced.
    NodeCompleted { node: NodeName, update: StateUpdate },
    /// Terminal: the run completed and this is the final state.
    Finished { state: Box<PlanState> },
    /// Terminal: the run failed or timed out. Partial state is discarded.
    Failed { error: PipelineError },
}

/// The graph runtime.
///
/// Walks the compiled graph node by node, merging each partial update into
/// the canonical state. Exposes a synchronous surface ([`invoke`](Self::invoke))
/// and a streaming surface ([`stream`](Self::stream)) that yields one event
/// per node, suitable for progress reporting over a long-lived connection.
#[derive(Clone)]
pub struct Executor {
    graph: Arc<CompiledGraph>,
    deadline: Duration,
}

impl Executor {
    pub fn new(graph: CompiledGraph) -> Self {
        Self {
            graph: Arc::new(graph),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run the graph to completion and return the final state.
    pub async fn invoke(&self, state: PlanState) -> Result<PlanState, PipelineError> {
        let mut stream = pin!(self.stream(state));
        while let Some(event) = stream.next().await {
            match event {
                ExecEvent::NodeCompleted { .. } => {}
                ExecEvent::Finished { state } => return Ok(*state),
                ExecEvent::Failed { error } => return Err(error),
            }
        }
        Err(PipelineError::Graph(
            "stream ended without a terminal event".to_string(),
        ))
    }

    /// Run the graph, yielding `NodeCompleted` after every node and exactly
    /// one terminal event (`Finished` or `Failed`).
    ///
    /// The stream owns the run: dropping it cancels the in-flight node
    /// cooperatively. The global deadline is enforced inside the stream, so
    /// a stalled node surfaces as `Failed` rather than a silent hang.
    pub fn stream(&self, mut state: PlanState) -> impl Stream<Item = ExecEvent> + Send + 'static {
        let graph = Arc::clone(&self.graph);
        let deadline = self.deadline;

        async_stream::stream! {
            let deadline_at = tokio::time::Instant::now() + deadline;
            let mut current = graph.entry();

            loop {
                let node = graph.node(current);
                let update = match tokio::time::timeout_at(deadline_at, node.run(&state)).await {
                    Ok(Ok(update)) => update,
                    Ok(Err(error)) => {
                        tracing::error!(node = %current, %error, "pipeline node failed");
                        yield ExecEvent::Failed { error };
                        return;
                    }
                    Err(_) => {
                        tracing::error!(node = %current, ?deadline, "pipeline deadline expired");
                        yield ExecEvent::Failed {
                            error: PipelineError::DeadlineExceeded(deadline),
                        };
                        return;
                    }
                };

                state.apply(update.clone());
                yield ExecEvent::NodeCompleted { node: current, update };

                match graph.next(current, &state) {
                    Some(next) => current = next,
                    None => break,
                }
            }

            yield ExecEvent::Finished { state: Box::new(state) };
        }
    }
}

/// The conditional edge after the parallel analyst stage: replan once when
/// the Critic vetoed the leading candidate, otherwise synthesize.
///
/// The Commander clears the incoming flags and bumps `retry_count` on entry,
/// so this routes back at most once regardless of analyzer output on the
/// second pass.
pub fn decide_after_analysts(state: &PlanState) -> NodeName {
    if (state.fast_fail || state.veto) && state.retry_count < MAX_RETRIES {
        NodeName::Commander
    } else {
        NodeName::Synthesizer
    }
}
