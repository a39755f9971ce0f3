use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kameo::actor::Spawn;
use tokio::sync::broadcast;

use ztpflow_actions::OutcomeStatus::{FatalFailure, SoftFailure, Success};
use ztpflow_actions::{ActionExecutor, ActionOutcome, ActionParams, OutcomeStatus, ParamValue};
use ztpflow_core::*;
use ztpflow_inventory::{HostEntry, Inventory, InventoryError, TargetSelector};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    action: String,
    host: Option<String>,
    params: ActionParams,
}

/// Executor whose outcomes are scripted per action or per `action@host`
#[derive(Default)]
struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<OutcomeStatus>>>,
    calls: Mutex<Vec<Call>>,
    abort_on: Option<(String, AbortHandle)>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    work: Duration,
}

impl ScriptedExecutor {
    fn new() -> Self {
        Self::default()
    }

    fn script(self, key: &str, statuses: &[OutcomeStatus]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), statuses.iter().copied().collect());
        self
    }

    fn aborting_on(mut self, action: &str, handle: AbortHandle) -> Self {
        self.abort_on = Some((action.to_string(), handle));
        self
    }

    fn taking(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, action: &str) -> usize {
        self.calls().iter().filter(|c| c.action == action).count()
    }

    fn next_status(&self, action: &str, host: Option<&str>) -> OutcomeStatus {
        let mut scripts = self.scripts.lock().unwrap();
        let host_key = format!("{action}@{}", host.unwrap_or("-"));
        for key in [host_key.as_str(), action] {
            if let Some(script) = scripts.get_mut(key) {
                return script.pop_front().unwrap_or(OutcomeStatus::Success);
            }
        }
        OutcomeStatus::Success
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn invoke(
        &self,
        action: &str,
        host: Option<&str>,
        params: &ActionParams,
    ) -> ActionOutcome {
        self.calls.lock().unwrap().push(Call {
            action: action.to_string(),
            host: host.map(ToString::to_string),
            params: params.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((abort_action, handle)) = &self.abort_on
            && abort_action == action
        {
            handle.abort();
        }

        let line = format!("{action} on {}", host.unwrap_or("fabric"));
        match self.next_status(action, host) {
            OutcomeStatus::Success => ActionOutcome::succeeded(vec![line]).with_changed(true),
            OutcomeStatus::SoftFailure => ActionOutcome::soft_failure(vec![line]),
            _ => ActionOutcome::fatal(vec![line]),
        }
    }
}

fn fabric() -> Arc<Inventory> {
    Arc::new(
        Inventory::new(vec![
            HostEntry::new("spine1").in_group("spine"),
            HostEntry::new("spine2").in_group("spine"),
            HostEntry::new("leaf1").in_group("leaf"),
            HostEntry::new("leaf2").in_group("leaf"),
        ])
        .unwrap(),
    )
}

fn orchestrator(executor: &Arc<ScriptedExecutor>) -> Orchestrator {
    Orchestrator::new(executor.clone(), fabric(), EngineConfig::default())
}

fn stage(id: &str, targets: &str, action: &str) -> StageDefinition {
    StageDefinition::new(id, TargetSelector::parse(targets).unwrap(), action).with_retries(3, 0)
}

#[tokio::test]
async fn test_retry_then_succeed_opens_gate() {
    let exec = Arc::new(
        ScriptedExecutor::new().script("setup@spine1", &[SoftFailure, SoftFailure, Success]),
    );
    let stages = vec![
        stage("initial-setup", "spine[0]", "setup"),
        stage("l2-setup", "spine[0]", "l2")
            .requires(GateSpec::on("initial-setup").block_on_soft_failure()),
    ];

    let report = orchestrator(&exec).run(&stages).await.unwrap();

    let setup = report.stage("initial-setup").unwrap();
    assert_eq!(setup.status, Success);
    assert_eq!(setup.attempts, 3);
    assert_eq!(setup.error_code, "0");
    assert_eq!(report.stage("l2-setup").unwrap().state, StageState::Completed);
    assert_eq!(exec.calls_for("setup"), 3);
    assert_eq!(report.verdict(), Verdict::Success);
}

#[tokio::test]
async fn test_exhausted_fatal_skips_dependents_only() {
    let exec = Arc::new(
        ScriptedExecutor::new().script("l3", &[FatalFailure, FatalFailure, FatalFailure]),
    );
    let stages = vec![
        stage("l3-setup", "spine[0]", "l3"),
        stage("vrrp-setup", "spine", "vrrp").requires(GateSpec::on("l3-setup")),
        stage("ebgp-setup", "leaf", "ebgp"),
    ];

    let report = orchestrator(&exec).run(&stages).await.unwrap();

    let l3 = report.stage("l3-setup").unwrap();
    assert_eq!(l3.status, FatalFailure);
    assert_eq!(l3.error_code, "1");
    assert_eq!(l3.attempts, 3);

    let vrrp = report.stage("vrrp-setup").unwrap();
    assert_eq!(vrrp.state, StageState::Skipped);
    assert_eq!(vrrp.status, OutcomeStatus::Skipped);
    assert_eq!(vrrp.attempts, 0);
    assert_eq!(exec.calls_for("vrrp"), 0);

    let ebgp = report.stage("ebgp-setup").unwrap();
    assert_eq!(ebgp.status, Success);
    assert_eq!(exec.calls_for("ebgp"), 2);

    assert!(!report.aborted);
    assert_eq!(report.verdict(), Verdict::Fatal);
}

#[tokio::test]
async fn test_abort_between_stages() {
    let (handle, signal) = AbortHandle::pair();
    let exec = Arc::new(ScriptedExecutor::new().aborting_on("s2", handle));
    let stages: Vec<StageDefinition> = (1..=5)
        .map(|n| stage(&format!("stage-{n}"), "all", &format!("s{n}")))
        .collect();

    let report = orchestrator(&exec)
        .with_abort_signal(signal)
        .run(&stages)
        .await
        .unwrap();

    assert!(report.aborted);
    let ids: Vec<&str> = report.stages.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["stage-1", "stage-2"]);
    // abort is only observed between stages, so stage 2 finished on every switch
    assert_eq!(report.stage("stage-2").unwrap().status, Success);
    assert_eq!(exec.calls_for("s2"), 4);
    for action in ["s3", "s4", "s5"] {
        assert_eq!(exec.calls_for(action), 0);
    }
    assert_eq!(report.verdict(), Verdict::Incomplete);
}

#[tokio::test]
async fn test_invocations_bounded_by_max_attempts() {
    for (retries, expected) in [(0, 1), (1, 1), (2, 2), (4, 4)] {
        let exec = Arc::new(ScriptedExecutor::new().script("flaky", &[SoftFailure; 8]));
        let stages = vec![
            StageDefinition::new("s", TargetSelector::index("leaf", 0), "flaky")
                .with_retries(retries, 0),
        ];

        let report = orchestrator(&exec).run(&stages).await.unwrap();

        assert_eq!(exec.calls_for("flaky"), expected, "retries = {retries}");
        assert_eq!(report.stage("s").unwrap().attempts, expected as u32);
        assert_eq!(report.stage("s").unwrap().status, SoftFailure);
    }
}

#[tokio::test]
async fn test_per_host_aggregation() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .script("join@leaf1", &[SoftFailure, Success])
            .script("join@leaf2", &[SoftFailure, SoftFailure, SoftFailure]),
    );
    let stages = vec![stage("join", "leaf", "join")];

    let report = orchestrator(&exec).run(&stages).await.unwrap();

    let join = report.stage("join").unwrap();
    assert_eq!(join.status, SoftFailure);
    assert_eq!(join.attempts, 3);
    assert_eq!(join.hosts, vec!["leaf1", "leaf2"]);
    assert!(join.changed);
    assert!(join.output.contains(&"leaf1: join on leaf1".to_string()));
    assert!(join.output.contains(&"leaf2: join on leaf2".to_string()));
    assert_eq!(report.verdict(), Verdict::Incomplete);
}

#[tokio::test]
async fn test_group_action_runs_once_without_host() {
    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![
        stage("l3-setup", "spine[0]", "l3")
            .group_action()
            .with_param("spines", "{{ groups.spine }}")
            .with_param("first_leaf", "{{ groups.leaf[0] }}"),
        stage("vlans", "leaf", "vlan").with_param("switch", "{{ host }}"),
    ];

    let report = orchestrator(&exec).run(&stages).await.unwrap();
    assert_eq!(report.verdict(), Verdict::Success);

    let calls = exec.calls();
    let l3: Vec<&Call> = calls.iter().filter(|c| c.action == "l3").collect();
    assert_eq!(l3.len(), 1);
    assert_eq!(l3[0].host, None);
    assert_eq!(
        l3[0].params["spines"],
        ParamValue::from(vec!["spine1".to_string(), "spine2".to_string()])
    );
    assert_eq!(l3[0].params["first_leaf"], ParamValue::from("leaf1"));

    let mut vlan_hosts: Vec<String> = calls
        .iter()
        .filter(|c| c.action == "vlan")
        .map(|c| c.params["switch"].to_string())
        .collect();
    vlan_hosts.sort();
    assert_eq!(vlan_hosts, vec!["leaf1", "leaf2"]);
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![
        stage("a", "all", "a"),
        stage("b", "leaf", "b"),
        stage("c", "spine", "c"),
    ];

    let report = orchestrator(&exec).run(&stages).await.unwrap();

    let actions: Vec<String> = exec.calls().into_iter().map(|c| c.action).collect();
    assert_eq!(actions, vec!["a", "a", "a", "a", "b", "b", "c", "c"]);
    let ids: Vec<&str> = report.stages.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_second_run_is_identical() {
    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![
        stage("initial-setup", "all", "setup"),
        stage("l2-setup", "spine[0]", "l2").requires(GateSpec::on("initial-setup")),
    ];
    let orch = orchestrator(&exec);

    let first = orch.run(&stages).await.unwrap();
    let second = orch.run(&stages).await.unwrap();

    assert_eq!(first.stages, second.stages);
    assert_eq!(second.verdict(), Verdict::Success);
    assert_eq!(exec.calls_for("setup"), 8);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let exec = Arc::new(ScriptedExecutor::new().taking(Duration::from_millis(20)));
    let config = EngineConfig {
        max_concurrency: 2,
        ..EngineConfig::default()
    };
    let orch = Orchestrator::new(exec.clone(), fabric(), config);

    let report = orch.run(&[stage("all", "all", "ping")]).await.unwrap();

    assert_eq!(report.verdict(), Verdict::Success);
    assert_eq!(exec.calls_for("ping"), 4);
    assert!(exec.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_abort_on_fatal() {
    let exec = Arc::new(ScriptedExecutor::new().script("setup", &[FatalFailure; 3]));
    let config = EngineConfig {
        abort_on_fatal: true,
        ..EngineConfig::default()
    };
    let orch = Orchestrator::new(exec.clone(), fabric(), config);
    let stages = vec![
        stage("initial-setup", "spine[0]", "setup").with_retries(1, 0),
        stage("ebgp-setup", "leaf", "ebgp"),
    ];

    let report = orch.run(&stages).await.unwrap();

    assert!(report.aborted);
    assert_eq!(report.stages.len(), 1);
    assert_eq!(exec.calls_for("ebgp"), 0);
    assert_eq!(report.verdict(), Verdict::Fatal);
}

async fn structural_error(stages: Vec<StageDefinition>) -> CoreError {
    let exec = Arc::new(ScriptedExecutor::new());
    let err = orchestrator(&exec).run(&stages).await.unwrap_err();
    assert!(exec.calls().is_empty(), "no stage may run after {err}");
    err
}

#[tokio::test]
async fn test_structural_errors_abort_before_any_stage() {
    let err = structural_error(vec![stage("a", "all", "a"), stage("a", "leaf", "b")]).await;
    assert!(matches!(err, CoreError::DuplicateStage(id) if id == "a"));

    let err = structural_error(vec![
        stage("a", "all", "a").requires(GateSpec::on("b")),
        stage("b", "all", "b"),
    ])
    .await;
    assert!(matches!(err, CoreError::ForwardDependency { .. }));

    let err = structural_error(vec![stage("a", "all", "a").requires(GateSpec::on("a"))]).await;
    assert!(matches!(err, CoreError::ForwardDependency { .. }));

    let err = structural_error(vec![stage("a", "all", "a").requires(GateSpec::on("ghost"))]).await;
    assert!(matches!(err, CoreError::UnknownDependency { .. }));

    let err = structural_error(vec![stage("a", "all", "a"), stage("b", "border", "b")]).await;
    assert!(matches!(err, CoreError::Inventory(InventoryError::UnknownGroup(g)) if g == "border"));

    let err = structural_error(vec![stage("a", "spine[5]", "a")]).await;
    assert!(matches!(
        err,
        CoreError::Targets {
            source: InventoryError::IndexOutOfRange { .. },
            ..
        }
    ));

    let err = structural_error(vec![stage("a", "leaf[2:]", "a")]).await;
    assert!(matches!(err, CoreError::EmptyTargets { .. }));

    let err = structural_error(vec![
        stage("a", "spine[0]", "a").group_action().with_param("sw", "{{ host }}"),
    ])
    .await;
    assert!(matches!(err, CoreError::HostPlaceholderInGroupStage { .. }));

    let err = structural_error(vec![
        stage("a", "leaf", "a").with_param("peer", "{{ groups.edge[0] }}"),
    ])
    .await;
    assert!(matches!(err, CoreError::Inventory(InventoryError::UnknownGroup(g)) if g == "edge"));
}

#[tokio::test]
async fn test_plan_resolves_without_invoking() {
    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![
        stage("initial-setup", "all", "setup"),
        stage("l3-setup", "spine[0]", "l3")
            .group_action()
            .requires(GateSpec::on("initial-setup")),
    ];

    let plan = orchestrator(&exec).plan(&stages).unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].hosts, vec!["spine1", "spine2", "leaf1", "leaf2"]);
    assert_eq!(plan[1].hosts, vec!["spine1"]);
    assert_eq!(plan[1].cardinality, Cardinality::Group);
    assert_eq!(plan[1].requires.as_deref(), Some("initial-setup"));
    assert_eq!(plan[1].max_attempts, 3);
    assert!(exec.calls().is_empty());
}

#[tokio::test]
async fn test_progress_events() {
    let exec = Arc::new(ScriptedExecutor::new().script("setup", &[SoftFailure, Success]));
    let orch = orchestrator(&exec);
    let mut rx = orch.subscribe();
    let stages = vec![
        stage("initial-setup", "spine[0]", "setup"),
        stage("l2-setup", "spine[0]", "l2").requires(GateSpec::on("initial-setup")),
    ];
    orch.run(&stages).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events.first(), Some(&ProgressEvent::RunStarted { stages: 2 }));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::RunFinished {
            verdict: Verdict::Success
        })
    );
    let attempts: Vec<(u32, OutcomeStatus)> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::AttemptFinished {
                stage,
                attempt,
                status,
                ..
            } if stage == "initial-setup" => Some((*attempt, *status)),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![(1, SoftFailure), (2, Success)]);
    assert!(events.contains(&ProgressEvent::StageCompleted {
        stage: "l2-setup".to_string(),
        status: Success,
        attempts: 1,
        output: vec!["spine1: l2 on spine1".to_string()],
    }));
}

#[tokio::test]
async fn test_switch_actor_tracks_invocations() {
    let (tx, _rx) = broadcast::channel(16);
    let exec = Arc::new(ScriptedExecutor::new().script("setup", &[SoftFailure, Success]));

    let actor_ref = SwitchActor::spawn(SwitchActorArgs {
        name: "leaf1".to_string(),
        executor: exec.clone(),
        event_tx: tx,
    });

    let outcome = actor_ref
        .ask(InvokeAction {
            stage: "initial-setup".to_string(),
            action: "setup".to_string(),
            params: ActionParams::new(),
            policy: RetryPolicy::new(3, Duration::ZERO),
        })
        .await
        .unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.host.as_deref(), Some("leaf1"));

    let status = actor_ref.ask(GetSwitchStatus).await.unwrap();
    assert_eq!(status.name, "leaf1");
    assert_eq!(status.state, SwitchState::Idle);
    assert_eq!(status.invocations, 1);
    assert_eq!(status.last_stage.as_deref(), Some("initial-setup"));
    assert_eq!(status.last_status, Some(Success));

    actor_ref.stop_gracefully().await.unwrap();
}

#[tokio::test]
async fn test_switch_actor_serialises_overlapping_requests() {
    let (tx, _rx) = broadcast::channel(16);
    let exec = Arc::new(ScriptedExecutor::new().taking(Duration::from_millis(20)));

    let actor_ref = SwitchActor::spawn(SwitchActorArgs {
        name: "leaf1".to_string(),
        executor: exec.clone(),
        event_tx: tx,
    });
    let invoke = |stage: &str| InvokeAction {
        stage: stage.to_string(),
        action: "setup".to_string(),
        params: ActionParams::new(),
        policy: RetryPolicy::new(1, Duration::ZERO),
    };

    let (first, second) = tokio::join!(
        async { actor_ref.ask(invoke("l2-setup")).await },
        async { actor_ref.ask(invoke("l3-setup")).await }
    );

    assert!(first.unwrap().success());
    assert!(second.unwrap().success());
    assert_eq!(exec.peak.load(Ordering::SeqCst), 1);
    assert_eq!(actor_ref.ask(GetSwitchStatus).await.unwrap().invocations, 2);

    actor_ref.stop_gracefully().await.unwrap();
    actor_ref.wait_for_shutdown().await;
}
