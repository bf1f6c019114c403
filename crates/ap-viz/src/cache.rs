use std::collections::BTreeMap;
use std::fmt;

/// Keyed storage that builds a value with its factory the first time a key
/// is requested.
pub struct FigureCache<K, V> {
    entries: BTreeMap<K, V>,
    factory: fn(&K) -> V,
}

impl<K: Ord + Clone, V> FigureCache<K, V> {
    /// Empty cache using `factory` for missing keys.
    pub fn new(factory: fn(&K) -> V) -> Self {
        Self { entries: BTreeMap::new(), factory }
    }

    /// Value for `key`, created on first access.
    pub fn get_or_create(&mut self, key: &K) -> &mut V {
        let factory = self.factory;
        self.entries.entry(key.clone()).or_insert_with(|| factory(key))
    }

    /// Existing value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Mutable entries in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.entries.iter_mut()
    }

    /// Values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for FigureCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FigureCache").field("entries", &self.entries).finish_non_exhaustive()
    }
}

impl<K: Clone, V: Clone> Clone for FigureCache<K, V> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone(), factory: self.factory }
    }
}
