use std::collections::HashMap;

/// Something with a stable identity and a monotonic version.
pub trait Keyed {
    fn key(&self) -> &str;
    fn version(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    /// The held entry has a higher version; the update was dropped.
    Stale,
    /// No entry with this key is held.
    Missing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
    pub stale: usize,
    pub removed: usize,
}

/// Ordered collection reconciled by key. Updates carrying a lower version
/// than the held entry are discarded; equal versions replace.
#[derive(Debug, Clone)]
pub struct KeyedCollection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new(), index: HashMap::new() }
    }
}

impl<T: Keyed> KeyedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&pos| &self.items[pos])
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Reconciles against a full listing: the result follows the listing's
    /// order, entries absent from it are dropped, and a held entry survives
    /// in place of an older incoming one.
    pub fn merge_all(&mut self, listing: Vec<T>) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut held: HashMap<String, T> = HashMap::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            held.insert(item.key().to_string(), item);
        }
        self.index.clear();

        for incoming in listing {
            let key = incoming.key().to_string();
            if self.index.contains_key(&key) {
                tracing::debug!(key = %key, "Duplicate key in listing ignored");
                continue;
            }

            let kept = match held.remove(&key) {
                Some(current) if incoming.version() < current.version() => {
                    stats.stale += 1;
                    current
                }
                Some(_) => {
                    stats.replaced += 1;
                    incoming
                }
                None => {
                    stats.inserted += 1;
                    incoming
                }
            };
            self.index.insert(key, self.items.len());
            self.items.push(kept);
        }

        stats.removed = held.len();
        stats
    }

    /// Applies a single update. New keys are appended.
    pub fn apply(&mut self, incoming: T) -> ApplyOutcome {
        match self.index.get(incoming.key()) {
            Some(&pos) => {
                if incoming.version() < self.items[pos].version() {
                    ApplyOutcome::Stale
                } else {
                    self.items[pos] = incoming;
                    ApplyOutcome::Replaced
                }
            }
            None => {
                self.index.insert(incoming.key().to_string(), self.items.len());
                self.items.push(incoming);
                ApplyOutcome::Inserted
            }
        }
    }

    /// Patches a held entry in place when `version` is not older than it.
    /// The closure must leave the entry's version at `version`.
    pub fn update_with<F>(&mut self, key: &str, version: i64, patch: F) -> ApplyOutcome
    where
        F: FnOnce(&mut T),
    {
        let Some(&pos) = self.index.get(key) else {
            return ApplyOutcome::Missing;
        };
        let entry = &mut self.items[pos];
        if version < entry.version() {
            return ApplyOutcome::Stale;
        }
        patch(entry);
        ApplyOutcome::Replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        version: i64,
        label: &'static str,
    }

    impl Keyed for Row {
        fn key(&self) -> &str {
            self.id
        }

        fn version(&self) -> i64 {
            self.version
        }
    }

    fn row(id: &'static str, version: i64, label: &'static str) -> Row {
        Row { id, version, label }
    }

    fn labels(collection: &KeyedCollection<Row>) -> Vec<&'static str> {
        collection.items().iter().map(|row| row.label).collect()
    }

    #[test]
    fn merge_inserts_replaces_and_drops_missing() {
        let mut collection = KeyedCollection::new();
        collection.merge_all(vec![row("a", 1, "a1"), row("b", 1, "b1"), row("c", 1, "c1")]);

        let stats =
            collection.merge_all(vec![row("c", 2, "c2"), row("a", 1, "a1'"), row("d", 1, "d1")]);

        assert_eq!(stats, MergeStats { inserted: 1, replaced: 2, stale: 0, removed: 1 });
        assert_eq!(labels(&collection), vec!["c2", "a1'", "d1"]);
        assert!(collection.get("b").is_none());
        assert_eq!(collection.get("d").map(|row| row.version), Some(1));
    }

    #[test]
    fn merge_keeps_newer_held_entry() {
        let mut collection = KeyedCollection::new();
        collection.merge_all(vec![row("a", 1, "old")]);
        assert_eq!(collection.apply(row("a", 3, "pushed")), ApplyOutcome::Replaced);

        let stats = collection.merge_all(vec![row("a", 2, "polled")]);

        assert_eq!(stats.stale, 1);
        assert_eq!(labels(&collection), vec!["pushed"]);
    }

    #[test]
    fn merge_with_empty_listing_clears() {
        let mut collection = KeyedCollection::new();
        collection.merge_all(vec![row("a", 1, "a"), row("b", 1, "b")]);

        let stats = collection.merge_all(Vec::new());

        assert_eq!(stats.removed, 2);
        assert!(collection.is_empty());
    }

    #[test]
    fn apply_discards_lower_versions_and_appends_new_keys() {
        let mut collection = KeyedCollection::new();
        assert_eq!(collection.apply(row("a", 2, "two")), ApplyOutcome::Inserted);
        assert_eq!(collection.apply(row("a", 1, "one")), ApplyOutcome::Stale);
        assert_eq!(collection.apply(row("a", 2, "two again")), ApplyOutcome::Replaced);
        assert_eq!(collection.apply(row("b", 1, "b")), ApplyOutcome::Inserted);

        assert_eq!(labels(&collection), vec!["two again", "b"]);
    }

    #[test]
    fn update_with_checks_version_before_patching() {
        let mut collection = KeyedCollection::new();
        collection.apply(row("a", 4, "held"));

        let outcome = collection.update_with("a", 3, |row| row.label = "late");
        assert_eq!(outcome, ApplyOutcome::Stale);

        let outcome = collection.update_with("a", 5, |row| {
            row.label = "patched";
            row.version = 5;
        });
        assert_eq!(outcome, ApplyOutcome::Replaced);
        assert_eq!(collection.get("a"), Some(&row("a", 5, "patched")));

        assert_eq!(collection.update_with("zz", 9, |_| {}), ApplyOutcome::Missing);
    }
}
