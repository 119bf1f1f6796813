//! Per-game advisory locks.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Serializes operations on the same game id while letting different ids
/// proceed in parallel.
#[derive(Default)]
pub struct ItemLocks {
    state: Mutex<LockState>,
    released: Condvar,
}

#[derive(Default)]
struct LockState {
    held: HashSet<i64>,
    creating: usize,
}

impl LockState {
    fn is_idle(&self) -> bool {
        self.held.is_empty() && self.creating == 0
    }
}

/// Held for the duration of one operation on one game.
pub struct ItemGuard<'a> {
    locks: &'a ItemLocks,
    id: i64,
}

/// Held while a game without an id yet is being created.
pub struct CreateGuard<'a> {
    locks: &'a ItemLocks,
}

/// Held while an operation touches every game at once. No per-game lock and
/// no create can start until it is dropped.
pub struct AllItemsGuard<'a> {
    _state: MutexGuard<'a, LockState>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no one else holds `id`, then take it.
    pub fn lock(&self, id: i64) -> ItemGuard<'_> {
        let mut state = self.state();
        while state.held.contains(&id) {
            state = self.released.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.held.insert(id);
        ItemGuard { locks: self, id }
    }

    /// Register a create in progress. Creates never block each other.
    pub fn lock_create(&self) -> CreateGuard<'_> {
        self.state().creating += 1;
        CreateGuard { locks: self }
    }

    /// Block until no game is locked and no create is running, then keep
    /// everyone out.
    pub fn lock_all(&self) -> AllItemsGuard<'_> {
        let mut state = self.state();
        while !state.is_idle() {
            state = self.released.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        AllItemsGuard { _state: state }
    }
}

impl Drop for ItemGuard<'_> {
    fn drop(&mut self) {
        self.locks.state().held.remove(&self.id);
        self.locks.released.notify_all();
    }
}

impl Drop for CreateGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.locks.state();
        state.creating = state.creating.saturating_sub(1);
        drop(state);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_id_is_exclusive() {
        let locks = Arc::new(ItemLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.lock(1);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_ids_do_not_block() {
        let locks = ItemLocks::new();
        let _a = locks.lock(1);
        let _b = locks.lock(2);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = ItemLocks::new();
        drop(locks.lock(1));
        let _again = locks.lock(1);
    }

    #[test]
    fn test_lock_all_waits_for_items() {
        let locks = Arc::new(ItemLocks::new());
        let guard = locks.lock(7);

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let _all = locks.lock_all();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.join().unwrap();
    }

    #[test]
    fn test_lock_all_waits_for_creates() {
        let locks = Arc::new(ItemLocks::new());
        let creating = locks.lock_create();
        drop(locks.lock_create());

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let _all = locks.lock_all();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        drop(creating);
        waiter.join().unwrap();
    }

    #[test]
    fn test_create_waits_for_lock_all() {
        let locks = Arc::new(ItemLocks::new());
        let all = locks.lock_all();

        let creator = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let _creating = locks.lock_create();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!creator.is_finished());
        drop(all);
        creator.join().unwrap();
    }
}
