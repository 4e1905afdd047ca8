use std::sync::Arc;

use anyhow::{Context, Result};

use crate::agents;
use crate::config::Settings;
use crate::graph::Executor;
use crate::model::{ParsedIntent, PlanState};
use crate::services::Services;

pub struct PlanArgs {
    pub prompt: String,
    pub group_size: Option<u32>,
    pub budget: Option<String>,
    pub location: Option<String>,
    pub vibe: Option<String>,
    pub json: bool,
}

/// Run the pipeline once from the terminal and print the shortlist.
pub fn run(settings: Settings, args: &PlanArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("creating async runtime")?;
    rt.block_on(async {
        let services = Arc::new(Services::from_settings(&settings));
        let graph = agents::build_graph(services).context("compiling plan graph")?;
        let executor = Executor::new(graph);

        let mut state = PlanState::new(args.prompt.clone());
        state.parsed_intent = ParsedIntent {
            activity: None,
            group_size: args.group_size,
            budget: args.budget.clone(),
            location: args.location.clone(),
            vibe: args.vibe.clone(),
        };

        let final_state = executor.invoke(state).await.context("running pipeline")?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&final_state.ranked_results)?);
            return Ok(());
        }

        if final_state.ranked_results.is_empty() {
            println!("No venues found for: {}", args.prompt);
            return Ok(());
        }

        if let Some(summary) = &final_state.execution_summary {
            println!("{summary}");
            println!();
        }
        for ranked in &final_state.ranked_results {
            let price = ranked
                .price_range
                .map(|p| format!(" {}", "$".repeat(p.tier() as usize)))
                .unwrap_or_default();
            println!(
                "{}. {}{} — rating {:.1} ({} reviews), score {:.2}",
                ranked.rank,
                ranked.venue.name,
                price,
                ranked.venue.rating,
                ranked.venue.review_count,
                ranked.composite_score,
            );
            if !ranked.why.is_empty() {
                println!("   {}", ranked.why);
            }
            if let Some(watch_out) = &ranked.watch_out {
                println!("   Watch out: {watch_out}");
            }
        }
        Ok(())
    })
}
