use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::{AppId, Categories, Game, GamePrice, UserInfo};

/// Process-lifetime memory cache for a single kind of value.
///
/// Entries are never evicted or invalidated. Readers share the lock, a write
/// excludes everyone else on this instance only.
pub struct KeyedCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        // a panicking writer cannot leave the map half-updated, so poisoning is ignored
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    pub fn set(&self, key: K, value: V) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for KeyedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// One independent cache per kind of data fetched from Steam.
#[derive(Default)]
pub struct CacheGroup {
    pub users_info: KeyedCache<String, UserInfo>,
    pub games: KeyedCache<String, Arc<HashMap<AppId, Game>>>,
    pub prices: KeyedCache<AppId, GamePrice>,
    pub friends: KeyedCache<String, Arc<Vec<String>>>,
    /// Keyed by the sorted, comma-joined steam ids of everyone involved.
    pub sorted_games: KeyedCache<String, Arc<Vec<Game>>>,
    pub game_categories: KeyedCache<AppId, Categories>,
}

impl CacheGroup {
    pub fn new() -> Self {
        Self::default()
    }
}
