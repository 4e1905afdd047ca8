pub mod analysts;
pub mod commander;
pub mod cost_analyst;
pub mod critic;
pub mod scout;
pub mod synthesizer;
pub mod vibe_matcher;

use std::sync::Arc;

use crate::graph::{CompiledGraph, GraphBuilder, GraphError, NodeName, decide_after_analysts};
use crate::services::Services;

pub use analysts::ParallelAnalystsNode;
pub use commander::CommanderNode;
pub use cost_analyst::CostAnalyst;
pub use critic::Critic;
pub use scout::ScoutNode;
pub use synthesizer::SynthesizerNode;
pub use vibe_matcher::VibeMatcher;

/// Assemble and compile the planning graph:
/// `commander → scout → parallel_analysts → {commander | synthesizer} → END`.
pub fn build_graph(services: Arc<Services>) -> Result<CompiledGraph, GraphError> {
    GraphBuilder::new()
        .add_node(Arc::new(CommanderNode::new(Arc::clone(&services))))?
        .add_node(Arc::new(ScoutNode::new(Arc::clone(&services))))?
        .add_node(Arc::new(ParallelAnalystsNode::new(Arc::clone(&services))))?
        .add_node(Arc::new(SynthesizerNode::new(services)))?
        .set_entry(NodeName::Commander)
        .add_edge(NodeName::Commander, NodeName::Scout)?
        .add_edge(NodeName::Scout, NodeName::ParallelAnalysts)?
        .add_conditional_edge(
            NodeName::ParallelAnalysts,
            vec![NodeName::Commander, NodeName::Synthesizer],
            decide_after_analysts,
        )
        .compile()
}
