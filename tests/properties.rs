// tests/properties.rs

//! Ordering, cycle, validation and backup-gating properties.

mod common;

use common::{FakeApplier, FakeSnapshots, dep, open, seed, setup_test_db};
use plinth::config::BackupSection;
use plinth::db::models::{ComponentRecord, DependencyRequirement, OperationKind};
use plinth::registry::{MemoryRegistry, RegistryStore, SqliteRegistry};
use plinth::resolver::{DependencyGraph, validator};
use plinth::{Error, OperationState, Orchestrator, ProgressEvent, ProgressTracker, version};
use std::sync::{Arc, Mutex};

/// Deterministic pseudo-random DAG: component `cN` may depend only on
/// components with a lower index, so the graph is acyclic by construction.
fn layered_components(count: usize, seed: u64) -> Vec<ComponentRecord> {
    let mut state = seed;
    let mut next = move || {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    (0..count)
        .map(|i| {
            let deps = (0..i)
                .filter(|_| next() % 3 == 0)
                .map(|j| DependencyRequirement::any(format!("c{j}")))
                .collect();
            ComponentRecord::new(format!("c{i}"), "1.0.0", format!("/opt/c{i}")).with_dependencies(deps)
        })
        .rev()
        .collect()
}

#[test]
fn install_order_puts_dependencies_first() {
    for seed in [1u64, 7, 42, 1234, 99_991] {
        let records = layered_components(25, seed);
        let graph = DependencyGraph::from_records(&records);
        let order = graph.install_order().unwrap();
        assert_eq!(order.len(), records.len());

        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        for record in &records {
            for requirement in &record.dependencies {
                assert!(
                    position(&requirement.name) < position(&record.name),
                    "seed {seed}: {} must come before {}",
                    requirement.name,
                    record.name
                );
            }
        }

        let mut reversed = order.clone();
        reversed.reverse();
        assert_eq!(graph.uninstall_order().unwrap(), reversed);
    }
}

#[test]
fn three_node_cycle_is_detected() {
    let records = vec![
        ComponentRecord::new("a", "1.0.0", "/opt/a").with_dependencies(vec![dep("b")]),
        ComponentRecord::new("b", "1.0.0", "/opt/b").with_dependencies(vec![dep("c")]),
        ComponentRecord::new("c", "1.0.0", "/opt/c").with_dependencies(vec![dep("a")]),
    ];
    let graph = DependencyGraph::from_records(&records);

    let chain = graph.detect_cycle();
    assert!(!chain.is_empty());
    for name in ["a", "b", "c"] {
        assert!(chain.iter().any(|n| n == name), "{name} missing from {chain:?}");
    }
    assert_eq!(chain.first(), chain.last());

    assert!(!graph.topological_sort().complete);
    match graph.install_order() {
        Err(Error::CycleDetected(reported)) => assert_eq!(reported, chain),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn validation_is_idempotent() {
    let (_temp, db_path) = setup_test_db();
    let conn = open(&db_path);
    seed(
        &conn,
        vec![
            ComponentRecord::new("base", "1.5.0", "/opt/base").installed_at("1.5.0"),
            ComponentRecord::new("mailer", "1.0.0", "/opt/mailer"),
            ComponentRecord::new("reporting", "1.0.0", "/opt/reporting")
                .with_dependencies(vec![dep("base>=2.0"), dep("mailer"), dep("ghost")]),
        ],
    );
    let store = SqliteRegistry::new(&conn);

    validator::validate(&store, "reporting").unwrap();
    let first = store.get("reporting").unwrap().unwrap();
    validator::validate(&store, "reporting").unwrap();
    let second = store.get("reporting").unwrap().unwrap();

    assert_eq!(first.dependencies_status, second.dependencies_status);
    assert_eq!(first.dependencies_warnings, second.dependencies_warnings);
    assert_eq!(
        second.dependencies_warnings,
        vec![
            "base requires version >= 2.0.0, installed 1.5.0".to_string(),
            "mailer is not installed".to_string(),
            "ghost is not registered".to_string(),
        ]
    );
}

#[test]
fn version_satisfaction() {
    assert!(version::satisfies("2.1.0", Some("2.0.0")));
    assert!(!version::satisfies("1.9.0", Some("2.0.0")));
    assert!(version::satisfies("2.0.0", None));
    assert!(version::satisfies("2.0.0", Some(">=2.0")));
    assert!(!version::satisfies("garbage", Some("1.0")));
}

/// Collects every state the orchestrator enters
#[derive(Default)]
struct StateLog {
    states: Mutex<Vec<OperationState>>,
}

impl ProgressTracker for StateLog {
    fn report(&self, event: &ProgressEvent) {
        if let ProgressEvent::StateChanged { state, .. } = event {
            self.states.lock().unwrap().push(*state);
        }
    }
}

#[test]
fn failed_backup_never_reaches_applying() {
    let registry = MemoryRegistry::with_records(vec![
        ComponentRecord::new("x", "1.0.0", "/opt/x").installed_at("1.0.0"),
    ]);
    let before = registry.get("x").unwrap().unwrap();

    let (_temp, db_path) = setup_test_db();
    let conn = open(&db_path);
    let snapshots = FakeSnapshots::failing_create();
    let applier = FakeApplier::default().with_installed(&[("x", "1.0.0")]);

    let states = Arc::new(StateLog::default());
    let orchestrator = Orchestrator::new(&conn, &registry, &snapshots, &applier, &BackupSection::default())
        .with_progress(states.clone());

    let err = orchestrator.run(OperationKind::Uninstall, "x").unwrap_err();
    assert_eq!(err.exit_code(), 2);

    let states = states.states.lock().unwrap();
    assert_eq!(
        *states,
        vec![OperationState::Validating, OperationState::BackingUp, OperationState::Failed]
    );
    assert!(applier.applied().is_empty());
    assert_eq!(registry.get("x").unwrap().unwrap(), before);
}
