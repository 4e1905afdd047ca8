use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::graph::{Node, NodeName, PipelineError};
use crate::model::{AnalystKind, ComplexityTier, ParsedIntent, PlanState, StateUpdate};
use crate::services::Services;
use crate::services::llm::strip_code_fences;

/// Memory-context lookup size.
const MEMORY_TOP_K: usize = 2;

/// Weight bump applied to the cost analyst for budget-sensitive profiles.
const BUDGET_SENSITIVE_BUMP: f64 = 0.2;

/// The planning node: parses the raw prompt into an execution plan and
/// decides which analysts run with what weight.
///
/// On entry it also does the retry-edge housekeeping — clearing an incoming
/// veto and bumping `retry_count` — which is what bounds the pipeline to a
/// single replanning pass.
pub struct CommanderNode {
    services: Arc<Services>,
}

impl CommanderNode {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    fn prompt(raw_prompt: &str) -> String {
        format!(
            r#"You are the commander of a venue-planning pipeline. Analyze the user's query and output a JSON execution plan.
Query: "{raw_prompt}"

Determine:
1. Intent parameters (activity, group_size, budget, location, vibe).
2. Complexity tier:
   - 'tier_1': simple lookup (scout only or light analysis)
   - 'tier_2': multi-factor personal request (group activity, constraints)
   - 'tier_3': strategic request (deep research, all analysts)
3. Active agents, chosen from: ["scout", "vibe_matcher", "cost_analyst", "critic"]. Scout is always mandatory.
4. Agent weights: a float from 0.0 to 1.0 per activated agent indicating its importance.

Output exactly this JSON shape:
{{
  "parsed_intent": {{"activity": "...", "group_size": 4, "budget": "low", "location": "...", "vibe": "..."}},
  "complexity_tier": "tier_2",
  "active_agents": ["scout", "cost_analyst", "critic"],
  "agent_weights": {{"scout": 1.0}}
}}
Do not output markdown code blocks. Only the raw JSON string."#
        )
    }
}

/// The LLM's plan as loosely as we are willing to read it. Agent names are
/// kept as strings so one unknown name doesn't throw away the whole plan.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    parsed_intent: ParsedIntent,
    #[serde(default)]
    complexity_tier: Option<ComplexityTier>,
    #[serde(default)]
    active_agents: Vec<String>,
    #[serde(default)]
    agent_weights: BTreeMap<String, f64>,
}

struct Plan {
    parsed_intent: ParsedIntent,
    complexity_tier: ComplexityTier,
    active_agents: Vec<AnalystKind>,
    agent_weights: BTreeMap<AnalystKind, f64>,
}

impl Plan {
    /// The safe fallback when the LLM is unavailable or unparseable:
    /// scout-only, tier 1.
    fn fallback() -> Self {
        Self {
            parsed_intent: ParsedIntent::default(),
            complexity_tier: ComplexityTier::Tier1,
            active_agents: vec![AnalystKind::Scout],
            agent_weights: BTreeMap::from([(AnalystKind::Scout, 1.0)]),
        }
    }

    fn from_raw(raw: RawPlan) -> Self {
        let mut active: Vec<AnalystKind> = Vec::new();
        for name in &raw.active_agents {
            match parse_analyst(name) {
                Some(kind) if !active.contains(&kind) => active.push(kind),
                Some(_) => {}
                None => tracing::warn!(%name, "plan lists unknown analyst, ignoring"),
            }
        }
        if !active.contains(&AnalystKind::Scout) {
            active.insert(0, AnalystKind::Scout);
        }

        let weights = raw
            .agent_weights
            .iter()
            .filter_map(|(name, w)| {
                let kind = parse_analyst(name)?;
                active.contains(&kind).then_some((kind, w.clamp(0.0, 1.0)))
            })
            .collect();

        Self {
            parsed_intent: raw.parsed_intent,
            complexity_tier: raw.complexity_tier.unwrap_or(ComplexityTier::Tier2),
            active_agents: active,
            agent_weights: weights,
        }
    }

    /// Profile-driven adjustments, e.g. budget-sensitive users weigh the
    /// cost analyst higher.
    fn adjust_for_profile(&mut self, profile: Option<&serde_json::Value>) {
        let budget_sensitive = profile
            .and_then(|p| p.pointer("/app_metadata/preferences/budget_sensitive"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if budget_sensitive && self.active_agents.contains(&AnalystKind::CostAnalyst) {
            let w = self
                .agent_weights
                .entry(AnalystKind::CostAnalyst)
                .or_insert(1.0);
            *w = (*w + BUDGET_SENSITIVE_BUMP).min(1.0);
        }
    }
}

fn parse_analyst(name: &str) -> Option<AnalystKind> {
    match name {
        "scout" => Some(AnalystKind::Scout),
        "vibe_matcher" => Some(AnalystKind::VibeMatcher),
        "cost_analyst" => Some(AnalystKind::CostAnalyst),
        "critic" => Some(AnalystKind::Critic),
        _ => None,
    }
}

#[async_trait]
impl Node for CommanderNode {
    fn name(&self) -> NodeName {
        NodeName::Commander
    }

    async fn run(&self, snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        // Retry-edge housekeeping: clear an incoming veto and count the
        // replanning pass before anything else can fail.
        let veto_incoming = snapshot.fast_fail || snapshot.veto;
        let mut update = StateUpdate {
            fast_fail: Some(false),
            fast_fail_reason: Some(None),
            veto: Some(false),
            veto_reason: Some(None),
            retry_count: Some(snapshot.retry_count + u32::from(veto_incoming)),
            ..Default::default()
        };
        if veto_incoming {
            tracing::info!(
                reason = ?snapshot.veto_reason,
                retry = snapshot.retry_count + 1,
                "replanning after critic veto"
            );
        }

        let llm_plan = match self
            .services
            .llm
            .generate(&Self::prompt(&snapshot.raw_prompt), &[])
            .await
        {
            Ok(Some(text)) => match serde_json::from_str::<RawPlan>(strip_code_fences(&text)) {
                Ok(raw) => Some(Plan::from_raw(raw)),
                Err(e) => {
                    tracing::error!(error = %e, "commander plan was not valid JSON, using fallback");
                    None
                }
            },
            Ok(None) => {
                tracing::warn!("LLM unavailable, using fallback plan");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "commander LLM call failed, using fallback plan");
                None
            }
        };

        let (mut plan, intent, memory_context) = match llm_plan {
            Some(plan) => {
                // Advisory memory lookup; failure degrades to empty context.
                let mut context = match self
                    .services
                    .memory
                    .search(&snapshot.raw_prompt, MEMORY_TOP_K)
                    .await
                {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(error = %e, "memory lookup failed");
                        Vec::new()
                    }
                };
                context.truncate(MEMORY_TOP_K);

                // Explicit request fields take precedence over whatever the
                // LLM inferred from the prose.
                let llm_intent = plan.parsed_intent.clone();
                let seeded = &snapshot.parsed_intent;
                let intent = if seeded.is_empty() {
                    llm_intent
                } else {
                    ParsedIntent {
                        activity: seeded.activity.clone().or(llm_intent.activity),
                        group_size: seeded.group_size.or(llm_intent.group_size),
                        budget: seeded.budget.clone().or(llm_intent.budget),
                        location: seeded.location.clone().or(llm_intent.location),
                        vibe: seeded.vibe.clone().or(llm_intent.vibe),
                    }
                };
                (plan, intent, context)
            }
            None => {
                let plan = Plan::fallback();
                (plan, ParsedIntent::default(), Vec::new())
            }
        };
        plan.adjust_for_profile(snapshot.user_profile.as_ref());

        update.parsed_intent = Some(intent);
        update.complexity_tier = Some(plan.complexity_tier);
        update.active_agents = Some(plan.active_agents);
        update.agent_weights = Some(plan.agent_weights);
        update.memory_context = Some(memory_context);
        Ok(update)
    }
}
