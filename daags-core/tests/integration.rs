//! Integration Tests for the Dependency Graph
//!
//! These tests drive whole graphs through the public API: memoization, the
//! pending barrier, out-of-order deferred results, rejection handling and
//! tick coalescing in the history log.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use daags_core::{
    BoxError, Computed, Error, EventKind, Node, RejectionPolicy, Runtime, RuntimeConfig, Status,
    Subject,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;

type Response = Result<i32, String>;

/// Deferred results handed to a compute function in order and resolved by
/// the test through the returned senders.
#[derive(Clone, Default)]
struct Gate {
    receivers: Arc<Mutex<VecDeque<oneshot::Receiver<Response>>>>,
}

impl Gate {
    fn next(&self) -> oneshot::Sender<Response> {
        let (tx, rx) = oneshot::channel();
        self.receivers.lock().push_back(rx);
        tx
    }

    fn compute(&self) -> impl Fn() -> Result<Computed<i32>, BoxError> + Send + Sync + 'static {
        let receivers = self.receivers.clone();
        move || -> Result<Computed<i32>, BoxError> {
            let rx = receivers.lock().pop_front().ok_or("no response queued")?;
            Ok(Computed::deferred(async move {
                match rx.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(message)) => Err(BoxError::from(message)),
                    Err(closed) => Err(Box::new(closed) as BoxError),
                }
            }))
        }
    }
}

/// A node adding `offset` to its parent, counting its computations.
fn plus(runtime: &Runtime, key: &str, parent: &Node<i32>, offset: i32) -> (Node<i32>, Arc<AtomicI32>) {
    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();
    let parent_clone = parent.clone();
    let node = runtime
        .derived(key, [parent.as_dyn()], move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            parent_clone.state().unwrap_or_default() + offset
        })
        .unwrap();
    (node, calls)
}

/// Test that a structurally equal result does not count as a change.
#[test]
fn equal_maps_do_not_propagate() {
    let runtime = Runtime::new();
    let flip = Arc::new(AtomicI32::new(0));

    // Same entries, inserted in a different order on every call
    let flip_clone = flip.clone();
    let scores = runtime
        .derived("scores", [], move || {
            let mut map = HashMap::new();
            if flip_clone.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                map.insert("ann".to_string(), 3);
                map.insert("bob".to_string(), 5);
            } else {
                map.insert("bob".to_string(), 5);
                map.insert("ann".to_string(), 3);
            }
            map
        })
        .unwrap();

    let total_calls = Arc::new(AtomicI32::new(0));
    let total_calls_clone = total_calls.clone();
    let scores_clone = scores.clone();
    let total = runtime
        .derived("total", [scores.as_dyn()], move || {
            total_calls_clone.fetch_add(1, Ordering::SeqCst);
            scores_clone.with_state(|map| map.map_or(0, |m| m.values().sum::<i32>()))
        })
        .unwrap();

    let notified = Arc::new(AtomicI32::new(0));
    let notified_clone = notified.clone();
    scores.on_change(move || {
        notified_clone.fetch_add(1, Ordering::SeqCst);
    });

    total.mount().unwrap();
    assert_eq!(total.state(), Some(8));

    scores.refresh().unwrap();
    scores.refresh().unwrap();

    assert_eq!(flip.load(Ordering::SeqCst), 3);
    assert_eq!(scores.version(), 1);
    assert_eq!(total_calls.load(Ordering::SeqCst), 1);
    // Only the initial computation notified
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

/// Test that descendants of a pending node wait and then compute once.
#[test]
fn pending_barrier_holds_chain() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let resolve = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    let (b, b_calls) = plus(&runtime, "b", &a, 1);
    let (c, c_calls) = plus(&runtime, "c", &b, 1);

    c.mount().unwrap();

    assert_eq!(a.status(), Status::Pending);
    assert_eq!(b.pending_parent_count(), 1);
    assert_eq!(c.pending_parent_count(), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    assert_eq!(c.state(), None);

    resolve.send(Ok(1)).unwrap();
    assert_eq!(runtime.run_until_stalled().unwrap(), 1);

    assert_eq!(a.status(), Status::Idle);
    assert_eq!(c.pending_parent_count(), 0);
    assert_eq!(b.state(), Some(2));
    assert_eq!(c.state(), Some(3));
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 1);
}

/// Test that a change on a settled branch does not leak past the barrier.
#[test]
fn pending_barrier_holds_other_branches() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let resolve = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    let (b, _) = plus(&runtime, "b", &a, 1);

    let external = Arc::new(AtomicI32::new(10));
    let external_clone = external.clone();
    let d = runtime
        .derived("d", [], move || external_clone.load(Ordering::SeqCst))
        .unwrap();

    let c_inputs = Arc::new(Mutex::new(Vec::new()));
    let c_inputs_clone = c_inputs.clone();
    let (b_clone, d_clone) = (b.clone(), d.clone());
    let c = runtime
        .derived("c", [b.as_dyn(), d.as_dyn()], move || {
            let inputs = (b_clone.state(), d_clone.state());
            c_inputs_clone.lock().push(inputs);
            inputs.0.unwrap_or_default() + inputs.1.unwrap_or_default()
        })
        .unwrap();

    c.mount().unwrap();
    assert_eq!(d.state(), Some(10));

    // `d` changes while `a` is still in flight
    external.store(20, Ordering::SeqCst);
    d.refresh().unwrap();
    assert_eq!(d.state(), Some(20));
    assert!(c_inputs.lock().is_empty());

    resolve.send(Ok(1)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(*c_inputs.lock(), vec![(Some(2), Some(20))]);
    assert_eq!(c.state(), Some(22));
}

/// Test that a node created below a pending node joins the barrier.
#[test]
fn late_child_joins_existing_barrier() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let resolve = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    a.mount().unwrap();

    let (b, b_calls) = plus(&runtime, "b", &a, 100);
    assert_eq!(b.pending_parent_count(), 1);

    b.mount().unwrap();
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);

    resolve.send(Ok(5)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(b.pending_parent_count(), 0);
    assert_eq!(b.state(), Some(105));
}

/// Test that only the most recently issued deferred result is applied.
#[test]
fn late_result_of_superseded_compute_is_discarded() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let first = gate.next();
    let second = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    let (b, b_calls) = plus(&runtime, "b", &a, 0);

    b.mount().unwrap();
    // Issue a second computation while the first is in flight
    a.refresh().unwrap();
    assert_eq!(runtime.in_flight(), 2);

    second.send(Ok(20)).unwrap();
    runtime.run_until_stalled().unwrap();
    assert_eq!(a.state(), Some(20));
    assert_eq!(a.status(), Status::Idle);

    first.send(Ok(10)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(a.state(), Some(20));
    assert_eq!(a.version(), 1);
    assert_eq!(b.state(), Some(20));
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.in_flight(), 0);
}

/// Test that an early result of a superseded compute keeps the node pending.
#[test]
fn superseded_result_does_not_release_barrier() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let first = gate.next();
    let second = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    let (b, _) = plus(&runtime, "b", &a, 0);
    b.mount().unwrap();
    a.refresh().unwrap();

    first.send(Ok(10)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(a.status(), Status::Pending);
    assert_eq!(a.state(), None);
    assert_eq!(b.pending_parent_count(), 1);

    second.send(Ok(20)).unwrap();
    runtime.run_until_stalled().unwrap();
    assert_eq!(b.state(), Some(20));
}

/// Test that an immediate result supersedes a deferred one still in flight.
#[test]
fn immediate_result_supersedes_in_flight_compute() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let stale = gate.next();

    // Deferred on the first call, immediate afterwards
    let calls = Arc::new(AtomicI32::new(0));
    let calls_clone = calls.clone();
    let deferred = gate.compute();
    let a = runtime
        .node("a", [], move || {
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                deferred()
            } else {
                Ok(Computed::Immediate(2))
            }
        })
        .unwrap();
    let (b, b_calls) = plus(&runtime, "b", &a, 0);

    b.mount().unwrap();
    assert_eq!(a.status(), Status::Pending);

    a.refresh().unwrap();
    assert_eq!(a.state(), Some(2));
    assert_eq!(a.status(), Status::Idle);
    assert_eq!(b.pending_parent_count(), 0);
    assert_eq!(b.state(), Some(2));

    stale.send(Ok(1)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(a.state(), Some(2));
    assert_eq!(a.version(), 1);
    assert_eq!(b.state(), Some(2));
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.in_flight(), 0);
}

/// Test that a shared descendant is released once both paths settle.
#[test]
fn diamond_below_pending_node_is_released() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let resolve = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    let (left, _) = plus(&runtime, "left", &a, 1);
    let (right, _) = plus(&runtime, "right", &a, 2);

    let d_calls = Arc::new(AtomicI32::new(0));
    let d_calls_clone = d_calls.clone();
    let (left_clone, right_clone) = (left.clone(), right.clone());
    let d = runtime
        .derived("d", [left.as_dyn(), right.as_dyn()], move || {
            d_calls_clone.fetch_add(1, Ordering::SeqCst);
            left_clone.state().unwrap_or_default() + right_clone.state().unwrap_or_default()
        })
        .unwrap();

    d.mount().unwrap();
    assert_eq!(d.pending_parent_count(), 2);
    assert_eq!(d_calls.load(Ordering::SeqCst), 0);

    resolve.send(Ok(10)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(d.pending_parent_count(), 0);
    assert_eq!(d.state(), Some(23));
    // Once per parent change, never while held back
    assert_eq!(d_calls.load(Ordering::SeqCst), 2);
}

/// Test that a result settling after the node was unmounted is not cached.
#[test]
fn result_after_unmount_is_not_cached() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let resolve = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    a.mount().unwrap();
    a.unmount().unwrap();

    resolve.send(Ok(1)).unwrap();
    runtime.run_until_stalled().unwrap();

    assert_eq!(a.state(), None);
    assert_eq!(a.status(), Status::Idle);
    let last = runtime.history().last().unwrap();
    assert!(last.is_node("a"));
    assert_eq!(last.kind, EventKind::Change { asynchronous: true });
}

/// Test that a rejected compute keeps the previous value by default.
#[test]
fn rejection_keeps_previous_value() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let ok = gate.next();
    let failing = gate.next();
    let recovered = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    let (b, _) = plus(&runtime, "b", &a, 1);
    b.mount().unwrap();

    ok.send(Ok(1)).unwrap();
    runtime.run_until_stalled().unwrap();
    assert_eq!(b.state(), Some(2));

    a.refresh().unwrap();
    failing.send(Err("backend down".to_string())).unwrap();
    let err = runtime.run_until_stalled().unwrap_err();

    assert!(matches!(err, Error::Rejected { ref key, .. } if key == "a"));
    assert_eq!(a.state(), Some(1));
    assert_eq!(a.version(), 1);
    assert_eq!(a.status(), Status::Idle);
    assert_eq!(a.last_error().as_deref(), Some("backend down"));
    assert_eq!(b.pending_parent_count(), 0);
    assert_eq!(
        runtime.history().last().unwrap().kind,
        EventKind::Rejected {
            message: "backend down".to_string()
        }
    );

    a.refresh().unwrap();
    recovered.send(Ok(4)).unwrap();
    runtime.run_until_stalled().unwrap();
    assert_eq!(b.state(), Some(5));
    assert_eq!(a.last_error(), None);
}

/// Test that the retry policy recomputes after a rejection.
#[test]
fn retry_policy_recomputes() {
    let config = RuntimeConfig::default()
        .with_rejection_policy(RejectionPolicy::Retry { max_attempts: 2 });
    let runtime = Runtime::with_config(config);
    let gate = Gate::default();

    // Two failures, then a value; all resolved up front
    drop(gate.next());
    gate.next().send(Err("flaky".to_string())).unwrap();
    gate.next().send(Ok(5)).unwrap();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    a.mount().unwrap();

    assert_eq!(runtime.run_until_stalled().unwrap(), 3);
    assert_eq!(a.state(), Some(5));
    assert_eq!(a.last_error(), None);

    let rejections = runtime
        .history()
        .entries()
        .iter()
        .filter(|entry| matches!(entry.kind, EventKind::Rejected { .. }))
        .count();
    assert_eq!(rejections, 2);
}

/// Test that the retry policy gives up after its attempts are spent.
#[test]
fn retry_policy_gives_up() {
    let config = RuntimeConfig::default()
        .with_rejection_policy(RejectionPolicy::Retry { max_attempts: 1 });
    let runtime = Runtime::with_config(config);
    let gate = Gate::default();

    gate.next().send(Err("first".to_string())).unwrap();
    gate.next().send(Err("second".to_string())).unwrap();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    a.mount().unwrap();

    let err = runtime.run_until_stalled().unwrap_err();
    assert!(matches!(err, Error::Rejected { .. }));
    assert_eq!(a.state(), None);
    assert_eq!(a.last_error().as_deref(), Some("second"));
}

/// Test that a mutation and the cascade it triggers share one tick.
#[test]
fn mutation_cascade_shares_a_tick() {
    let runtime = Runtime::new();
    let store = Arc::new(Mutex::new(1));

    let store_clone = store.clone();
    let count = runtime
        .derived("count", [], move || *store_clone.lock())
        .unwrap();
    let (doubled, _) = plus(&runtime, "doubled", &count, 0);
    doubled.mount().unwrap();

    let store_clone = store.clone();
    let increment = runtime
        .mutation(
            "increment",
            [count.as_dyn()],
            move |deps, (by,): (i32,)| -> daags_core::Result<()> {
                *store_clone.lock() += by;
                deps.node::<i32>("count")?.refresh()
            },
        )
        .unwrap();

    let tick_before = runtime.history().tick();
    increment.call((2,)).unwrap();

    let history = runtime.history();
    let cascade = history.at_tick(tick_before);
    let summary: Vec<(EventKind, Subject)> = cascade
        .iter()
        .map(|entry| (entry.kind.clone(), entry.subject.clone()))
        .collect();

    assert_eq!(
        summary,
        vec![
            (
                EventKind::Mutation { args: json!([2]) },
                Subject::Mutation("increment".into())
            ),
            (
                EventKind::Change {
                    asynchronous: false
                },
                Subject::Node("count".into())
            ),
            (
                EventKind::Change {
                    asynchronous: false
                },
                Subject::Node("doubled".into())
            ),
        ]
    );
    assert_eq!(history.tick(), tick_before + 1);
    assert_eq!(doubled.state(), Some(3));
    assert_eq!(runtime.mutation_deps("increment"), Some(vec!["count".to_string()]));
}

/// Test that a deferred settlement is recorded in a later tick than its issue.
#[test]
fn settlement_gets_its_own_tick() {
    let runtime = Runtime::new();
    let gate = Gate::default();
    let resolve = gate.next();

    let a = runtime.node("a", [], gate.compute()).unwrap();
    a.mount().unwrap();
    resolve.send(Ok(9)).unwrap();
    runtime.run_until_stalled().unwrap();

    let entries = runtime.history().entries();
    let issued = entries
        .iter()
        .find(|entry| entry.kind == EventKind::Get)
        .unwrap();
    let settled = entries
        .iter()
        .find(|entry| entry.kind == EventKind::Change { asynchronous: true })
        .unwrap();

    assert!(settled.tick > issued.tick);
    assert_eq!(issued.snapshot.get("a").unwrap().status, Status::Pending);
    assert_eq!(settled.snapshot.get("a").unwrap().value, Some(json!(9)));
}

/// Test the history recorded by mounting and unmounting a chain.
#[test]
fn mount_and_unmount_history() {
    let runtime = Runtime::new();
    let a = runtime.derived("a", [], || 1).unwrap();
    let (b, _) = plus(&runtime, "b", &a, 1);

    b.mount().unwrap();
    b.unmount().unwrap();

    let entries = runtime.history().entries();
    let summary: Vec<(String, &str)> = entries
        .iter()
        .map(|entry| {
            let kind = match entry.kind {
                EventKind::Mount => "mount",
                EventKind::Unmount => "unmount",
                EventKind::Change { .. } => "change",
                _ => "other",
            };
            (entry.subject.key().to_string(), kind)
        })
        .collect();

    let expected: Vec<(String, &str)> = [
        ("a", "mount"),
        ("a", "change"),
        ("b", "mount"),
        ("b", "change"),
        ("a", "unmount"),
        ("a", "change"),
        ("b", "unmount"),
        ("b", "change"),
    ]
    .into_iter()
    .map(|(key, kind)| (key.to_string(), kind))
    .collect();
    assert_eq!(summary, expected);

    // One tick per outermost call
    assert_eq!(entries[0].tick, entries[3].tick);
    assert_eq!(entries[4].tick, entries[7].tick);
    assert!(entries[4].tick > entries[3].tick);

    let last = &entries[7].snapshot;
    assert!(last.iter().all(|node| node.value.is_none() && node.total_mounts() == 0));
}

/// Test that recorded snapshots are unaffected by later changes.
#[test]
fn snapshots_are_detached() {
    let runtime = Runtime::new();
    let store = Arc::new(Mutex::new(vec![1, 2]));
    let store_clone = store.clone();
    let list = runtime
        .derived("list", [], move || store_clone.lock().clone())
        .unwrap();

    list.mount().unwrap();
    let recorded = runtime.history().last().unwrap();

    store.lock().push(3);
    list.refresh().unwrap();

    assert_eq!(recorded.snapshot.get("list").unwrap().value, Some(json!([1, 2])));
    assert_eq!(
        runtime.snapshot().get("list").unwrap().value,
        Some(json!([1, 2, 3]))
    );
    assert_eq!(recorded.snapshot.diff(&runtime.snapshot()), vec!["list"]);
}

/// Test that the exported history loads back.
#[test]
fn history_exports() {
    let runtime = Runtime::new();
    let a = runtime.derived("a", [], || "hello".to_string()).unwrap();
    a.mount().unwrap();

    let json = runtime.history().to_json().unwrap();
    let loaded = daags_core::History::from_json(&json).unwrap();
    assert_eq!(loaded.len(), runtime.history().len());
    assert_eq!(loaded[1].snapshot.get("a").unwrap().value, Some(json!("hello")));

    let packed = runtime.history().to_msgpack().unwrap();
    assert!(!packed.is_empty());
}

/// Test that history subscribers see entries as they are appended.
#[test]
fn history_subscription() {
    let runtime = Runtime::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let id = runtime
        .history()
        .subscribe(move |entry| seen_clone.lock().push(entry.subject.key().to_string()));

    let a = runtime.derived("a", [], || 1).unwrap();
    a.mount().unwrap();
    assert!(runtime.history().unsubscribe(id));
    a.unmount().unwrap();

    assert_eq!(*seen.lock(), vec!["a", "a"]);
}
