//! Single-flight registry: coalesces concurrent `get`s of the same key
//! into one in-flight computation.
//!
//! The leader broadcasts its actual resolved value (or absence) to
//! subscribers directly, rather than a bare permit that followers turn
//! into a second L1 read: some refresh branches (the L2-error fallback)
//! return a value without writing anything new to L1, so re-reading L1
//! would not reliably reproduce what the leader saw.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::entry::CacheEntry;

/// What a leader's computation resolves to: presence or absence of a
/// value, exactly what `get` returns to its caller.
type Resolution<V> = Option<CacheEntry<V>>;

struct Flight<V> {
    sender: broadcast::Sender<Resolution<V>>,
}

pub struct SingleFlightRegistry<V> {
    in_flight: DashMap<String, Flight<V>>,
}

/// Either you are the leader (run the refresh, then call
/// [`LeaderHandle::resolve`]) or a follower waiting on the leader's result.
pub enum Role<V> {
    Leader(LeaderHandle<V>),
    Follower(broadcast::Receiver<Resolution<V>>),
}

pub struct LeaderHandle<V> {
    key: String,
    registry: Arc<SingleFlightRegistry<V>>,
    resolved: bool,
}

impl<V: Clone + Send + Sync + 'static> SingleFlightRegistry<V> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { in_flight: DashMap::new() })
    }

    /// Enter the registry for `key`. Returns `Leader` if this call
    /// published a new in-flight entry, `Follower` if one already existed.
    pub fn enter(self: &Arc<Self>, key: &str) -> Role<V> {
        if let Some(flight) = self.in_flight.get(key) {
            return Role::Follower(flight.sender.subscribe());
        }

        // Race: two callers may both miss the `get` above and both try to
        // insert. `entry` makes the second one observe the first's entry.
        match self.in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                Role::Follower(occupied.get().sender.subscribe())
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let (sender, _receiver) = broadcast::channel(1);
                vacant.insert(Flight { sender });
                Role::Leader(LeaderHandle {
                    key: key.to_string(),
                    registry: self.clone(),
                    resolved: false,
                })
            }
        }
    }
}

impl<V: Clone + Send + Sync + 'static> LeaderHandle<V> {
    /// Publish the result to any followers and remove this key from the
    /// registry, unblocking the next caller's leader path. Must be called
    /// exactly once, including on the failure path, so followers are never
    /// left waiting forever on a dropped sender.
    pub fn resolve(mut self, result: Resolution<V>) {
        self.resolved = true;
        if let Some((_, flight)) = self.registry.in_flight.remove(&self.key) {
            // No receivers is not an error: every follower may have given
            // up waiting (cancelled) before the leader finished.
            let _ = flight.sender.send(result);
        }
    }
}

impl<V> Drop for LeaderHandle<V> {
    fn drop(&mut self) {
        if !self.resolved {
            // Leader future was cancelled before calling `resolve`. Remove
            // the slot so the key isn't permanently stuck; any follower
            // subscribed to the broadcast sees the sender drop and treats
            // it as "no result" (lagged/closed error).
            self.registry.in_flight.remove(&self.key);
        }
    }
}
