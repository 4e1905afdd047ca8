use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::graph::{Node, NodeName, PipelineError};
use crate::model::{AnalystKind, PlanState, StateUpdate};
use crate::services::Services;

use super::cost_analyst::CostAnalyst;
use super::critic::Critic;
use super::vibe_matcher::VibeMatcher;

/// Per-task stage deadlines. A task that overruns yields its analyzer's
/// empty-but-well-shaped contribution; it never fails the stage.
const VIBE_STAGE_TIMEOUT: Duration = Duration::from_secs(45);
const CRITIC_STAGE_TIMEOUT: Duration = Duration::from_secs(45);
const COST_STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// The fan-out stage: runs the vibe matcher, critic, and cost analyst
/// concurrently, each on its own copy of the snapshot, then unions their
/// partials. The three write disjoint fields so the union is deterministic.
///
/// An analyzer runs when it is listed in `active_agents`, or when the set is
/// empty (a degenerate plan runs everything).
pub struct ParallelAnalystsNode {
    vibe: VibeMatcher,
    critic: Critic,
    cost: CostAnalyst,
}

impl ParallelAnalystsNode {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            vibe: VibeMatcher::new(Arc::clone(&services)),
            critic: Critic::new(services),
            cost: CostAnalyst::new(),
        }
    }
}

fn empty_vibe_update() -> StateUpdate {
    StateUpdate {
        vibe_scores: Some(BTreeMap::new()),
        ..Default::default()
    }
}

fn empty_cost_update() -> StateUpdate {
    StateUpdate {
        cost_profiles: Some(BTreeMap::new()),
        ..Default::default()
    }
}

fn fallback_update(kind: AnalystKind) -> StateUpdate {
    match kind {
        AnalystKind::VibeMatcher => empty_vibe_update(),
        AnalystKind::CostAnalyst => empty_cost_update(),
        AnalystKind::Critic => Critic::empty_update(),
        AnalystKind::Scout => StateUpdate::default(),
    }
}

#[async_trait]
impl Node for ParallelAnalystsNode {
    fn name(&self) -> NodeName {
        NodeName::ParallelAnalysts
    }

    async fn run(&self, snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        let active = &snapshot.active_agents;
        let run_all = active.is_empty();
        let is_active = |kind: AnalystKind| run_all || active.contains(&kind);

        let mut tasks: Vec<(AnalystKind, JoinHandle<StateUpdate>)> = Vec::new();

        if is_active(AnalystKind::VibeMatcher) {
            let vibe = self.vibe.clone();
            let snap = snapshot.clone();
            tasks.push((
                AnalystKind::VibeMatcher,
                tokio::spawn(async move {
                    match tokio::time::timeout(VIBE_STAGE_TIMEOUT, vibe.analyze(&snap)).await {
                        Ok(update) => update,
                        Err(_) => {
                            tracing::warn!("vibe matcher stage timed out");
                            empty_vibe_update()
                        }
                    }
                }),
            ));
        }

        if is_active(AnalystKind::Critic) {
            let critic = self.critic.clone();
            let snap = snapshot.clone();
            tasks.push((
                AnalystKind::Critic,
                tokio::spawn(async move {
                    match tokio::time::timeout(CRITIC_STAGE_TIMEOUT, critic.analyze(&snap)).await {
                        Ok(update) => update,
                        Err(_) => {
                            tracing::warn!("critic stage timed out");
                            Critic::empty_update()
                        }
                    }
                }),
            ));
        }

        if is_active(AnalystKind::CostAnalyst) {
            // Pure and synchronous: run on a worker thread so it never
            // blocks the event loop.
            let cost = self.cost;
            let snap = snapshot.clone();
            tasks.push((
                AnalystKind::CostAnalyst,
                tokio::spawn(async move {
                    let blocking = tokio::task::spawn_blocking(move || cost.analyze(&snap));
                    match tokio::time::timeout(COST_STAGE_TIMEOUT, blocking).await {
                        Ok(Ok(update)) => update,
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "cost analyst task failed");
                            empty_cost_update()
                        }
                        Err(_) => {
                            tracing::warn!("cost analyst stage timed out");
                            empty_cost_update()
                        }
                    }
                }),
            ));
        }

        let mut merged = StateUpdate::default();
        for (kind, handle) in tasks {
            let update = match handle.await {
                Ok(update) => update,
                Err(e) => {
                    tracing::error!(analyst = kind.as_str(), error = %e, "analyst task aborted");
                    fallback_update(kind)
                }
            };
            merged = merged.union(update);
        }
        Ok(merged)
    }
}
