use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::StreamExt;

use venue_flow::graph::{
    ConcurrencyKind, ExecEvent, Executor, GraphBuilder, GraphError, Node, NodeName, PipelineError,
    decide_after_analysts,
};
use venue_flow::model::{AnalystKind, PlanState, StateUpdate};

// ── Stub nodes ──────────────────────────────────────────────────────

/// A node that returns a fixed update and counts its entries.
struct StaticNode {
    name: NodeName,
    update: StateUpdate,
    entries: Arc<AtomicU32>,
}

impl StaticNode {
    fn new(name: NodeName, update: StateUpdate) -> (Arc<Self>, Arc<AtomicU32>) {
        let entries = Arc::new(AtomicU32::new(0));
        (
            Arc::new(Self {
                name,
                update,
                entries: Arc::clone(&entries),
            }),
            entries,
        )
    }
}

#[async_trait]
impl Node for StaticNode {
    fn name(&self) -> NodeName {
        self.name
    }

    async fn run(&self, _snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        self.entries.fetch_add(1, Ordering::SeqCst);
        Ok(self.update.clone())
    }
}

/// A commander stand-in that does the real retry housekeeping.
struct HousekeepingCommander {
    entries: Arc<AtomicU32>,
}

#[async_trait]
impl Node for HousekeepingCommander {
    fn name(&self) -> NodeName {
        NodeName::Commander
    }

    async fn run(&self, snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        self.entries.fetch_add(1, Ordering::SeqCst);
        let veto_incoming = snapshot.fast_fail || snapshot.veto;
        Ok(StateUpdate {
            fast_fail: Some(false),
            fast_fail_reason: Some(None),
            veto: Some(false),
            veto_reason: Some(None),
            retry_count: Some(snapshot.retry_count + u32::from(veto_incoming)),
            active_agents: Some(vec![AnalystKind::Scout]),
            ..Default::default()
        })
    }
}

/// A node that never finishes in time.
struct SleepyNode {
    name: NodeName,
}

#[async_trait]
impl Node for SleepyNode {
    fn name(&self) -> NodeName {
        self.name
    }

    async fn run(&self, _snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(StateUpdate::default())
    }
}

fn veto_update(veto: bool) -> StateUpdate {
    StateUpdate {
        fast_fail: Some(veto),
        fast_fail_reason: Some(veto.then(|| "rain".to_string())),
        veto: Some(veto),
        veto_reason: Some(veto.then(|| "rain".to_string())),
        ..Default::default()
    }
}

struct TestGraph {
    executor: Executor,
    commander_entries: Arc<AtomicU32>,
    scout_entries: Arc<AtomicU32>,
    synthesizer_entries: Arc<AtomicU32>,
}

/// A four-node graph with the production edge set and controllable analyst
/// veto behavior.
fn test_graph(analysts_veto: bool) -> TestGraph {
    let commander_entries = Arc::new(AtomicU32::new(0));
    let commander = Arc::new(HousekeepingCommander {
        entries: Arc::clone(&commander_entries),
    });
    let (scout, scout_entries) = StaticNode::new(NodeName::Scout, StateUpdate::default());
    let (analysts, _) = StaticNode::new(NodeName::ParallelAnalysts, veto_update(analysts_veto));
    let (synthesizer, synthesizer_entries) = StaticNode::new(
        NodeName::Synthesizer,
        StateUpdate {
            ranked_results: Some(Vec::new()),
            ..Default::default()
        },
    );

    let graph = GraphBuilder::new()
        .add_node(commander)
        .unwrap()
        .add_node(scout)
        .unwrap()
        .add_node(analysts)
        .unwrap()
        .add_node(synthesizer)
        .unwrap()
        .set_entry(NodeName::Commander)
        .add_edge(NodeName::Commander, NodeName::Scout)
        .unwrap()
        .add_edge(NodeName::Scout, NodeName::ParallelAnalysts)
        .unwrap()
        .add_conditional_edge(
            NodeName::ParallelAnalysts,
            vec![NodeName::Commander, NodeName::Synthesizer],
            decide_after_analysts,
        )
        .compile()
        .unwrap();

    TestGraph {
        executor: Executor::new(graph),
        commander_entries,
        scout_entries,
        synthesizer_entries,
    }
}

// ── Ordering & streaming ────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_nodes_in_order_then_finishes() {
    let graph = test_graph(false);
    let mut stream = pin!(graph.executor.stream(PlanState::new("cafe")));

    let mut completed = Vec::new();
    let mut terminals = 0;
    while let Some(event) = stream.next().await {
        match event {
            ExecEvent::NodeCompleted { node, .. } => completed.push(node),
            ExecEvent::Finished { .. } => terminals += 1,
            ExecEvent::Failed { .. } => panic!("run should not fail"),
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
    assert_eq!(terminals, 1);
}

#[tokio::test]
async fn invoke_returns_final_state() {
    let graph = test_graph(false);
    let state = graph.executor.invoke(PlanState::new("cafe")).await.unwrap();
    assert_eq!(state.retry_count, 0);
    assert!(state.ranked_results.is_empty());
    assert_eq!(graph.commander_entries.load(Ordering::SeqCst), 1);
}

// ── Retry edge ──────────────────────────────────────────────────────

#[tokio::test]
async fn veto_routes_back_to_commander_exactly_once() {
    // The analysts veto on every pass; the retry bound must still hold.
    let graph = test_graph(true);
    let state = graph.executor.invoke(PlanState::new("picnic")).await.unwrap();

    assert_eq!(graph.commander_entries.load(Ordering::SeqCst), 2);
    assert_eq!(graph.scout_entries.load(Ordering::SeqCst), 2);
    assert_eq!(graph.synthesizer_entries.load(Ordering::SeqCst), 1);
    assert_eq!(state.retry_count, 1);
}

#[tokio::test]
async fn no_veto_means_no_retry() {
    let graph = test_graph(false);
    graph.executor.invoke(PlanState::new("cafe")).await.unwrap();
    assert_eq!(graph.commander_entries.load(Ordering::SeqCst), 1);
    assert_eq!(graph.scout_entries.load(Ordering::SeqCst), 1);
}

#[test]
fn decide_after_analysts_truth_table() {
    let mut state = PlanState::new("x");
    assert_eq!(decide_after_analysts(&state), NodeName::Synthesizer);

    state.fast_fail = true;
    assert_eq!(decide_after_analysts(&state), NodeName::Commander);

    state.fast_fail = false;
    state.veto = true;
    assert_eq!(decide_after_analysts(&state), NodeName::Commander);

    state.retry_count = 1;
    assert_eq!(decide_after_analysts(&state), NodeName::Synthesizer);
}

// ── Deadline ────────────────────────────────────────────────────────

#[tokio::test]
async fn deadline_expiry_fails_the_run() {
    let (commander, _) = StaticNode::new(NodeName::Commander, StateUpdate::default());
    let graph = GraphBuilder::new()
        .add_node(commander)
        .unwrap()
        .add_node(Arc::new(SleepyNode {
            name: NodeName::Scout,
        }))
        .unwrap()
        .set_entry(NodeName::Commander)
        .add_edge(NodeName::Commander, NodeName::Scout)
        .unwrap()
        .compile()
        .unwrap();
    let executor = Executor::new(graph).with_deadline(Duration::from_millis(100));

    let err = executor.invoke(PlanState::new("slow")).await.unwrap_err();
    assert!(matches!(err, PipelineError::DeadlineExceeded(_)));
}

#[tokio::test]
async fn deadline_expiry_yields_exactly_one_terminal_error_event() {
    let graph = GraphBuilder::new()
        .add_node(Arc::new(SleepyNode {
            name: NodeName::Commander,
        }))
        .unwrap()
        .set_entry(NodeName::Commander)
        .compile()
        .unwrap();
    let executor = Executor::new(graph).with_deadline(Duration::from_millis(100));

    let mut stream = pin!(executor.stream(PlanState::new("slow")));
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        ExecEvent::Failed {
            error: PipelineError::DeadlineExceeded(_)
        }
    ));
}

// ── Compilation ─────────────────────────────────────────────────────

#[test]
fn compile_rejects_static_cycles() {
    let (a, _) = StaticNode::new(NodeName::Commander, StateUpdate::default());
    let (b, _) = StaticNode::new(NodeName::Scout, StateUpdate::default());
    let err = GraphBuilder::new()
        .add_node(a)
        .unwrap()
        .add_node(b)
        .unwrap()
        .set_entry(NodeName::Commander)
        .add_edge(NodeName::Commander, NodeName::Scout)
        .unwrap()
        .add_edge(NodeName::Scout, NodeName::Commander)
        .unwrap()
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected));
}

#[test]
fn compile_rejects_unreachable_nodes() {
    let (a, _) = StaticNode::new(NodeName::Commander, StateUpdate::default());
    let (b, _) = StaticNode::new(NodeName::Scout, StateUpdate::default());
    let (c, _) = StaticNode::new(NodeName::Synthesizer, StateUpdate::default());
    let err = GraphBuilder::new()
        .add_node(a)
        .unwrap()
        .add_node(b)
        .unwrap()
        .add_node(c)
        .unwrap()
        .set_entry(NodeName::Commander)
        .add_edge(NodeName::Commander, NodeName::Scout)
        .unwrap()
        .compile()
        .unwrap_err();
    assert!(matches!(err, GraphError::Unreachable(NodeName::Synthesizer)));
}

#[test]
fn compile_rejects_two_outgoing_static_edges() {
    let (a, _) = StaticNode::new(NodeName::Commander, StateUpdate::default());
    let err = GraphBuilder::new()
        .add_node(a)
        .unwrap()
        .add_edge(NodeName::Commander, NodeName::Scout)
        .unwrap()
        .add_edge(NodeName::Commander, NodeName::Synthesizer)
        .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateEdge(NodeName::Commander)));
}

// ── State merge laws ────────────────────────────────────────────────

#[test]
fn apply_overwrites_only_carried_fields() {
    let mut state = PlanState::new("x");
    state.retry_count = 1;
    state.fast_fail = true;

    state.apply(StateUpdate {
        fast_fail: Some(false),
        ..Default::default()
    });
    assert!(!state.fast_fail);
    assert_eq!(state.retry_count, 1);
}

#[test]
fn union_is_disjoint_field_merge() {
    let a = StateUpdate {
        fast_fail: Some(true),
        ..Default::default()
    };
    let b = StateUpdate {
        retry_count: Some(1),
        ..Default::default()
    };
    let merged = a.union(b);
    assert_eq!(merged.fast_fail, Some(true));
    assert_eq!(merged.retry_count, Some(1));
}

#[test]
fn explicit_clear_is_distinct_from_untouched() {
    let mut state = PlanState::new("x");
    state.fast_fail_reason = Some("rain".to_string());

    // Untouched: reason survives.
    state.apply(StateUpdate::default());
    assert_eq!(state.fast_fail_reason.as_deref(), Some("rain"));

    // Explicit clear.
    state.apply(StateUpdate {
        fast_fail_reason: Some(None),
        ..Default::default()
    });
    assert_eq!(state.fast_fail_reason, None);
}

#[test]
fn concurrency_kind_defaults_to_async() {
    struct Plain;
    #[async_trait]
    impl Node for Plain {
        fn name(&self) -> NodeName {
            NodeName::Scout
        }
        async fn run(&self, _snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
            Ok(StateUpdate::default())
        }
    }
    assert_eq!(Plain.concurrency_kind(), ConcurrencyKind::Async);
}
