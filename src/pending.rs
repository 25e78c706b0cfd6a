use std::collections::HashMap;

/// Largest request id ever put on the wire. Hosts mirror ids through a
/// double-precision float path, so ids stay below 2^53.
pub const MAX_SAFE_ID: u64 = (1 << 53) - 1;

/// The correlation table: maps outstanding request ids to their stored
/// completion.
///
/// Ids are allocated from a per-channel monotonic counter, which is
/// sufficient because each channel owns exactly one table and the host
/// echoes back the id it was given. The counter wraps to 0 just before it
/// would exceed [`MAX_SAFE_ID`], so the first id after wrapping is 1.
///
/// An entry is removed exactly once, when the matching response arrives or
/// when the caller explicitly cancels it. There is no timeout: a completion
/// whose response never comes is retained for the life of the table. That
/// leak is deliberate and left to the caller to manage.
pub struct PendingCalls<T> {
    next_id: u64,
    inflight: HashMap<u64, T>,
}

impl<T> PendingCalls<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            inflight: HashMap::new(),
        }
    }

    /// Allocate the next request id and store `completion` under it.
    pub fn register(&mut self, completion: T) -> u64 {
        if self.next_id == MAX_SAFE_ID {
            self.next_id = 0;
        }
        self.next_id += 1;
        self.inflight.insert(self.next_id, completion);
        self.next_id
    }

    /// Remove and return the completion stored under `id`. `None` means the
    /// id is unknown or already resolved; the caller treats that as benign.
    pub fn resolve(&mut self, id: u64) -> Option<T> {
        self.inflight.remove(&id)
    }

    /// Drop a stored completion without running it.
    pub fn cancel(&mut self, id: u64) -> bool {
        self.inflight.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

impl<T> Default for PendingCalls<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_injective() {
        let mut table = PendingCalls::new();
        let ids: Vec<u64> = (0..100).map(|n| table.register(n)).collect();
        assert_eq!(ids, (1..=100).collect::<Vec<u64>>());
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn resolve_removes_exactly_once() {
        let mut table = PendingCalls::new();
        let id = table.register("reply");
        assert_eq!(table.resolve(id), Some("reply"));
        assert_eq!(table.resolve(id), None);
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_id_resolves_to_none() {
        let mut table: PendingCalls<()> = PendingCalls::new();
        assert_eq!(table.resolve(999), None);
    }

    #[test]
    fn cancel_drops_the_completion() {
        let mut table = PendingCalls::new();
        let id = table.register(());
        assert!(table.cancel(id));
        assert!(!table.cancel(id));
        assert_eq!(table.resolve(id), None);
    }

    #[test]
    fn counter_wraps_to_one_at_the_safe_integer_ceiling() {
        let mut table = PendingCalls {
            next_id: MAX_SAFE_ID - 1,
            inflight: HashMap::new(),
        };
        assert_eq!(table.register('a'), MAX_SAFE_ID);
        assert_eq!(table.register('b'), 1);
        assert_eq!(table.register('c'), 2);
        // the wrapped ids must not have clobbered the still-pending one
        assert_eq!(table.resolve(MAX_SAFE_ID), Some('a'));
        assert_eq!(table.resolve(1), Some('b'));
    }
}
