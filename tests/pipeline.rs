
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use stub_common::*;
use tokio_stream::StreamExt;

use venue_flow::agents::build_graph;
use venue_flow::graph::{ExecEvent, Executor, NodeName, PipelineError};
use venue_flow::model::{
    ComplexityTier, CostConfidence, PlanState, PriceBand, RankedVenue, VenueSource,
};
use venue_flow::services::Services;

fn executor(services: Arc<Services>) -> Executor {
    Executor::new(build_graph(services).unwrap())
}

/// The scenario-1 stub set: two cafés known to both catalogs, agreeing `$$`
/// price signals, vibe 0.88 vs 0.75, no risks.
fn happy_path_stubs() -> ServiceStubs {
    let llm = RuleLlm::new(vec![
        (vec![COMMANDER_MARK], Some(commander_plan_json())),
        (vec![VIBE_MARK, "Cafe Azure"], Some(vibe_json(0.88))),
        (vec![VIBE_MARK, "Cafe Brio"], Some(vibe_json(0.75))),
        (vec![CRITIC_MARK], Some(critic_clear_json())),
        (vec![EXPLAIN_MARK], Some(explanation_json("Cozy and close"))),
        (vec![CONSENSUS_MARK], Some("Two strong picks.".to_string())),
    ]);
    let google = vec![
        with_price(
            with_rating(
                venue_at("gp_a", "Cafe Azure", VenueSource::GooglePlaces, 43.65, -79.38),
                4.6,
                200,
            ),
            PriceBand::Moderate,
        ),
        with_price(
            with_rating(
                venue_at("gp_b", "Cafe Brio", VenueSource::GooglePlaces, 43.66, -79.40),
                4.4,
                150,
            ),
            PriceBand::Moderate,
        ),
    ];
    let yelp = vec![
        with_price(
            with_rating(
                venue_at("yelp_a", "Cafe Azure", VenueSource::Yelp, 43.65, -79.38),
                4.3,
                400,
            ),
            PriceBand::Moderate,
        ),
        with_price(
            with_rating(
                venue_at("yelp_b", "Cafe Brio", VenueSource::Yelp, 43.66, -79.40),
                4.2,
                320,
            ),
            PriceBand::Moderate,
        ),
    ];
    stub_services(
        llm,
        StubCatalog::returning(VenueSource::GooglePlaces, google),
        StubCatalog::returning(VenueSource::Yelp, yelp),
        StubWeather::clear(),
    )
}

// ── Scenario 1: happy path ──────────────────────────────────────────

#[tokio::test]
async fn happy_path_ranks_two_cafes() {
    let stubs = happy_path_stubs();
    let state = executor(Arc::clone(&stubs.services))
        .invoke(PlanState::new("cozy café in downtown Toronto"))
        .await
        .unwrap();

    assert_eq!(state.candidate_venues.len(), 2);
    assert_eq!(state.ranked_results.len(), 2);

    let first = &state.ranked_results[0];
    let second = &state.ranked_results[1];
    assert_eq!(first.rank, 1);
    assert_eq!(first.venue.name, "Cafe Azure");
    assert_eq!(first.vibe_score, Some(0.88));
    assert_eq!(first.price_range, Some(PriceBand::Moderate));
    assert_eq!(first.price_confidence, Some(CostConfidence::High));
    assert!(first.composite_score > second.composite_score);
    assert_eq!(first.why, "Cozy and close");
    assert_eq!(state.execution_summary.as_deref(), Some("Two strong picks."));
    assert_eq!(state.retry_count, 0);
}

#[tokio::test]
async fn happy_path_streams_one_result_terminal() {
    let stubs = happy_path_stubs();
    let mut stream = pin!(
        executor(Arc::clone(&stubs.services)).stream(PlanState::new("cozy café in Toronto"))
    );

    let mut completed = Vec::new();
    let mut finished = 0;
    let mut failed = 0;
    while let Some(event) = stream.next().await {
        match event {
            ExecEvent::NodeCompleted { node, .. } => completed.push(node),
            ExecEvent::Finished { .. } => finished += 1,
            ExecEvent::Failed { .. } => failed += 1,
        }
    }
    assert_eq!(
        completed,
        vec![
            NodeName::Commander,
            NodeName::Scout,
            NodeName::ParallelAnalysts,
            NodeName::Synthesizer,
        ]
    );
    assert_eq!((finished, failed), (1, 0));
}

// ── Scenario 2 & 6: veto, retry, and the retry bound ────────────────

fn veto_stubs() -> ServiceStubs {
    let plan = serde_json::json!({
        "parsed_intent": {"activity": "picnic", "location": "Toronto"},
        "complexity_tier": "tier_2",
        "active_agents": ["scout", "critic"],
        "agent_weights": {"scout": 1.0, "critic": 0.9},
    })
    .to_string();
    let llm = RuleLlm::new(vec![
        (vec![COMMANDER_MARK], Some(plan)),
        // The critic vetoes the leading candidate on every pass.
        (
            vec![CRITIC_MARK, "Outdoor Park"],
            Some(critic_veto_json("Heavy precipitation forecast")),
        ),
        (vec![CRITIC_MARK], Some(critic_clear_json())),
        (vec![EXPLAIN_MARK], Some(explanation_json("Best available"))),
        (vec![CONSENSUS_MARK], Some("Plan indoors.".to_string())),
    ]);
    stub_services(
        llm,
        StubCatalog::returning(
            VenueSource::GooglePlaces,
            vec![with_rating(
                venue("gp_park", "Outdoor Park", VenueSource::GooglePlaces),
                4.7,
                300,
            )],
        ),
        StubCatalog::returning(VenueSource::Yelp, Vec::new()),
        StubWeather::heavy_rain(),
    )
}

#[tokio::test]
async fn critic_veto_triggers_exactly_one_replanning_pass() {
    let stubs = veto_stubs();
    let state = executor(Arc::clone(&stubs.services))
        .invoke(PlanState::new("picnic in the park Saturday"))
        .await
        .unwrap();

    // Commander entered twice, then the bound forces synthesis even though
    // the critic vetoed on the second pass too.
    assert_eq!(stubs.llm.calls_matching(COMMANDER_MARK), 2);
    assert_eq!(state.retry_count, 1);
    assert!(!state.ranked_results.is_empty());
}

#[tokio::test]
async fn veto_run_still_emits_a_single_finished_terminal() {
    let stubs = veto_stubs();
    let mut stream =
        pin!(executor(Arc::clone(&stubs.services)).stream(PlanState::new("picnic Saturday")));

    let mut completed = Vec::new();
    let mut terminals = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            ExecEvent::NodeCompleted { node, .. } => completed.push(node),
            ExecEvent::Finished { .. } => terminals.push("result"),
            ExecEvent::Failed { .. } => terminals.push("error"),
        }
    }
    // One full pass, the retry pass, then synthesis.
    assert_eq!(
        completed,
        vec![
            NodeName::Commander,
            NodeName::Scout,
            NodeName::ParallelAnalysts,
            NodeName::Commander,
            NodeName::Scout,
            NodeName::ParallelAnalysts,
            NodeName::Synthesizer,
        ]
    );
    assert_eq!(terminals, vec!["result"]);
}

// ── Scenario 3: catalog partial failure ─────────────────────────────

#[tokio::test]
async fn one_catalog_down_still_produces_ranked_results() {
    let llm = RuleLlm::new(vec![
        (vec![COMMANDER_MARK], Some(commander_plan_json())),
        (vec![CRITIC_MARK], Some(critic_clear_json())),
        (vec![EXPLAIN_MARK], Some(explanation_json("Good spot"))),
    ]);
    let yelp_venues: Vec<_> = (0..3)
        .map(|i| {
            venue_at(
                &format!("yelp_{i}"),
                &format!("Spot {i}"),
                VenueSource::Yelp,
                43.6 + i as f64 * 0.01,
                -79.38,
            )
        })
        .collect();
    let stubs = stub_services(
        llm,
        StubCatalog::failing(VenueSource::GooglePlaces),
        StubCatalog::returning(VenueSource::Yelp, yelp_venues),
        StubWeather::clear(),
    );

    let state = executor(Arc::clone(&stubs.services))
        .invoke(PlanState::new("cafe"))
        .await
        .unwrap();

    assert_eq!(state.candidate_venues.len(), 3);
    assert!(
        state
            .candidate_venues
            .iter()
            .all(|v| v.source == VenueSource::Yelp)
    );
    assert_eq!(state.ranked_results.len(), 3);
}

// ── Scenario 4 + commander fallback boundary ────────────────────────

#[tokio::test]
async fn malformed_commander_plan_still_dedups_and_ranks() {
    // The commander's reply is garbage, so only the scout does meaningful
    // work; the duplicate venue resolves to the higher-rated record.
    let llm = RuleLlm::new(vec![(
        vec![COMMANDER_MARK],
        Some("```json not even close".to_string()),
    )]);
    let stubs = stub_services(
        llm,
        StubCatalog::returning(
            VenueSource::GooglePlaces,
            vec![with_rating(
                venue_at("gp_1", "Cool Spot", VenueSource::GooglePlaces, 43.65, -79.38),
                4.2,
                50,
            )],
        ),
        StubCatalog::returning(
            VenueSource::Yelp,
            vec![with_rating(
                venue_at("yelp_1", "Cool Spot", VenueSource::Yelp, 43.65040, -79.38),
                4.5,
                75,
            )],
        ),
        StubWeather::clear(),
    );

    let state = executor(Arc::clone(&stubs.services))
        .invoke(PlanState::new("cool spot downtown"))
        .await
        .unwrap();

    assert_eq!(state.complexity_tier, ComplexityTier::Tier1);
    assert_eq!(
        state.active_agents,
        vec![venue_flow::model::AnalystKind::Scout]
    );
    assert_eq!(state.candidate_venues.len(), 1);
    assert_eq!(state.candidate_venues[0].rating, 4.5);
    assert_eq!(state.ranked_results.len(), 1);
    // Inactive analysts leave their maps empty, the synthesizer copes.
    assert!(state.vibe_scores.is_empty());
    assert!(state.risk_flags.is_empty());
}

// ── Scenario 5: global timeout ──────────────────────────────────────

#[tokio::test]
async fn slow_catalogs_trip_the_global_deadline() {
    let stubs = stub_services(
        RuleLlm::unavailable(),
        StubCatalog::sleeping(VenueSource::GooglePlaces, Duration::from_secs(5)),
        StubCatalog::sleeping(VenueSource::Yelp, Duration::from_secs(5)),
        StubWeather::unavailable(),
    );
    let executor =
        executor(Arc::clone(&stubs.services)).with_deadline(Duration::from_millis(200));

    let err = executor
        .invoke(PlanState::new("anything"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DeadlineExceeded(_)));
}

#[tokio::test]
async fn deadline_expiry_streams_a_single_error_terminal() {
    let stubs = stub_services(
        RuleLlm::unavailable(),
        StubCatalog::sleeping(VenueSource::GooglePlaces, Duration::from_secs(5)),
        StubCatalog::sleeping(VenueSource::Yelp, Duration::from_secs(5)),
        StubWeather::unavailable(),
    );
    let executor =
        executor(Arc::clone(&stubs.services)).with_deadline(Duration::from_millis(200));

    let mut stream = pin!(executor.stream(PlanState::new("anything")));
    let mut terminals = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            ExecEvent::NodeCompleted { .. } => {}
            ExecEvent::Finished { .. } => terminals.push("result"),
            ExecEvent::Failed { error } => {
                assert!(matches!(error, PipelineError::DeadlineExceeded(_)));
                terminals.push("error");
            }
        }
    }
    assert_eq!(terminals, vec!["error"]);
}

// ── Boundary: empty discovery ───────────────────────────────────────

#[tokio::test]
async fn both_catalogs_down_still_completes_with_empty_results() {
    let llm = RuleLlm::new(vec![(vec![COMMANDER_MARK], Some(commander_plan_json()))]);
    let stubs = stub_services(
        llm,
        StubCatalog::failing(VenueSource::GooglePlaces),
        StubCatalog::failing(VenueSource::Yelp),
        StubWeather::clear(),
    );

    let state = executor(Arc::clone(&stubs.services))
        .invoke(PlanState::new("cafe"))
        .await
        .unwrap();

    assert!(state.candidate_venues.is_empty());
    assert!(state.ranked_results.is_empty());
    // Analysts produced their empty-but-well-shaped contributions.
    assert!(state.vibe_scores.is_empty());
    assert!(state.cost_profiles.is_empty());
    assert!(state.risk_flags.is_empty());
    assert!(!state.fast_fail);
    // No explanation or consensus calls were made for an empty shortlist.
    assert_eq!(stubs.llm.calls_matching(EXPLAIN_MARK), 0);
    assert_eq!(stubs.llm.calls_matching(CONSENSUS_MARK), 0);
}

// ── Idempotence ─────────────────────────────────────────────────────

#[tokio::test]
async fn identical_inputs_with_deterministic_stubs_rank_identically() {
    let run = |stubs: ServiceStubs| async move {
        executor(Arc::clone(&stubs.services))
            .invoke(PlanState::new("cozy café in downtown Toronto"))
            .await
            .unwrap()
            .ranked_results
    };
    let first: Vec<RankedVenue> = run(happy_path_stubs()).await;
    let second: Vec<RankedVenue> = run(happy_path_stubs()).await;
    assert_eq!(first, second);
}
