//! Process-wide registry of live clients.
//!
//! Entries are weak so the registry never keeps a client alive; a client
//! removes its own entry when its last handle is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

use super::Shared;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static CLIENTS: LazyLock<Mutex<HashMap<u64, Weak<Shared>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn clients() -> MutexGuard<'static, HashMap<u64, Weak<Shared>>> {
    CLIENTS.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(super) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(super) fn register(shared: &Arc<Shared>) {
    clients().insert(shared.id, Arc::downgrade(shared));
}

pub(super) fn deregister(id: u64) {
    clients().remove(&id);
}

pub(super) fn contains(id: u64) -> bool {
    clients().contains_key(&id)
}

pub(super) fn len() -> usize {
    clients().len()
}

/// Strong handles to every live client, ordered by construction.
pub(super) fn snapshot() -> Vec<Arc<Shared>> {
    let mut live: Vec<_> = clients().values().filter_map(Weak::upgrade).collect();
    live.sort_by_key(|shared| shared.id);
    live
}
