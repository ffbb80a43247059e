//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sip_cfg::registry::{Registry, VarFlags, VariableDescriptor};
use sip_cfg::ConfigStore;

/// Per-worker callback invocations, in the order they ran.
pub type Fired = Arc<Mutex<Vec<(usize, String)>>>;

/// The `net` group used across tests:
/// `timeout` int [1, 3600] = 30, `realm` string, `retries` int [0, 10] = 3.
pub fn net_store() -> Arc<ConfigStore> {
    let registry = Registry::new();
    registry
        .declare_group(
            "net",
            vec![
                VariableDescriptor::int("timeout", 30).bounds(1, 3600),
                VariableDescriptor::string("realm", "example.org"),
                VariableDescriptor::int("retries", 3).bounds(0, 10),
            ],
        )
        .unwrap();
    registry.bring_up().unwrap()
}

/// A store whose variables `a`..`d` in group `cb` record every per-worker
/// callback into the returned log.
pub fn recording_store(flags: VarFlags) -> (Arc<ConfigStore>, Fired) {
    let fired: Fired = Arc::new(Mutex::new(Vec::new()));
    let vars = ["a", "b", "c", "d"]
        .iter()
        .map(|name| {
            let fired = fired.clone();
            VariableDescriptor::int(name, 0).flags(flags).per_worker(move |notice| {
                fired
                    .lock()
                    .unwrap()
                    .push((notice.worker, notice.name.to_string()));
            })
        })
        .collect();

    let registry = Registry::new();
    registry.declare_group("cb", vars).unwrap();
    (registry.bring_up().unwrap(), fired)
}

/// Callback names seen by one worker, in order.
pub fn seen_by(fired: &Fired, worker: usize) -> Vec<String> {
    fired
        .lock()
        .unwrap()
        .iter()
        .filter(|(w, _)| *w == worker)
        .map(|(_, name)| name.clone())
        .collect()
}
