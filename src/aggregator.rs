//! Running count of estimates per brand.

use std::collections::HashMap;
use std::sync::Mutex;

/// Owns the per-key counts. Counts only ever grow and live as long as the
/// process; every access goes through [`Aggregator::increment`].
#[derive(Debug, Default)]
pub struct Aggregator {
    counts: Mutex<HashMap<String, u64>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the count for `group_key` and returns the new value. The first
    /// occurrence of a key sets it to 1.
    pub fn increment(&self, group_key: &str) -> u64 {
        // A poisoned lock only means another worker panicked mid-insert; the
        // map itself is still consistent.
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        match counts.get_mut(group_key) {
            Some(count) => {
                *count += 1;
                *count
            }
            None => {
                counts.insert(group_key.to_string(), 1);
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_increment_is_one() {
        let aggregator = Aggregator::new();

        assert_eq!(aggregator.increment("acme"), 1);
        assert_eq!(aggregator.increment("acme"), 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let aggregator = Aggregator::new();

        aggregator.increment("acme");
        aggregator.increment("globex");
        aggregator.increment("acme");

        assert_eq!(aggregator.increment("globex"), 2);
        assert_eq!(aggregator.increment("acme"), 3);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let aggregator = Arc::new(Aggregator::new());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        aggregator.increment("acme");
                        aggregator.increment(if i % 2 == 0 { "even" } else { "odd" });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(aggregator.increment("acme"), 4001);
        assert_eq!(aggregator.increment("even"), 2001);
        assert_eq!(aggregator.increment("odd"), 2001);
    }
}
