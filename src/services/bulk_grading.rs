use std::collections::HashSet;
use std::future::Future;

use futures::stream::{self, StreamExt};

/// Result of one unit of a fan-out, tagged with the input it belongs to.
#[derive(Debug)]
pub(crate) struct ItemOutcome<K, T, E> {
    pub(crate) key: K,
    pub(crate) result: Result<T, E>,
}

/// Drops repeated ids while keeping first-seen order.
pub(crate) fn dedupe_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}

/// Runs `op` for every key with at most `concurrency` in flight and returns
/// one outcome per key in input order. A failing item never cancels the rest.
pub(crate) async fn fan_out<K, T, E, F, Fut>(
    keys: Vec<K>,
    concurrency: usize,
    op: F,
) -> Vec<ItemOutcome<K, T, E>>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut outcomes: Vec<(usize, ItemOutcome<K, T, E>)> = stream::iter(keys.into_iter().enumerate())
        .map(|(index, key)| {
            let pending = op(key.clone());
            async move { (index, ItemOutcome { key, result: pending.await }) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let ids = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(dedupe_ids(&ids), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn failures_do_not_block_other_items_and_order_is_kept() {
        let keys = vec![1u64, 2, 3, 4, 5];
        let outcomes = fan_out(keys, 3, |key| async move {
            // Later keys finish first so completion order differs from input order.
            tokio::time::sleep(Duration::from_millis(30 - key * 5)).await;
            if key == 3 {
                Err(format!("item {key} failed"))
            } else {
                Ok(key * 10)
            }
        })
        .await;

        let keys: Vec<u64> = outcomes.iter().map(|outcome| outcome.key).collect();
        assert_eq!(keys, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcomes[2].result, Err("item 3 failed".to_string()));
        let succeeded = outcomes.iter().filter(|outcome| outcome.result.is_ok()).count();
        assert_eq!(succeeded, 4);
        assert_eq!(outcomes[4].result, Ok(50));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let outcomes = fan_out((0..12).collect::<Vec<u32>>(), 4, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }
        })
        .await;

        assert_eq!(outcomes.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }
}
