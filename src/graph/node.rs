use std::fmt;

use async_trait::async_trait;

use crate::model::{PlanState, StateUpdate};

use super::PipelineError;

/// The named stages of the planning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeName {
    Commander,
    Scout,
    ParallelAnalysts,
    Synthesizer,
}

impl NodeName {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeName::Commander => "commander",
            NodeName::Scout => "scout",
            NodeName::ParallelAnalysts => "parallel_analysts",
            NodeName::Synthesizer => "synthesizer",
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling hint for a node body: `Async` nodes suspend on their own;
/// `Blocking` nodes are CPU-bound and must be offloaded to a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyKind {
    Async,
    Blocking,
}

/// A unit of work in the graph.
///
/// A node receives a read-only snapshot of the state and returns a typed
/// partial update. Nodes must be idempotent with respect to retried runs —
/// the executor re-enters Scout and the analysts after a retry edge, and
/// their output must depend only on the snapshot.
///
/// Errors from a node are reserved for invariant violations; every expected
/// failure (provider down, timeout, malformed LLM output) degrades inside
/// the node body to a well-shaped partial.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> NodeName;

    fn concurrency_kind(&self) -> ConcurrencyKind {
        ConcurrencyKind::Async
    }

    async fn run(&self, snapshot: &PlanState) -> Result<StateUpdate, PipelineError>;
}
