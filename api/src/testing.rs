//! In-memory stand-ins for Steam and the database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::codec;
use crate::db::CategoryStore;
use crate::models::{AppId, Categories, GamePrice, OwnedGame, UserInfo};
use crate::steam::CatalogProvider;

#[derive(Default)]
pub struct FakeSteam {
    users: HashMap<String, UserInfo>,
    vanity: HashMap<String, String>,
    libraries: HashMap<String, Vec<OwnedGame>>,
    prices: HashMap<AppId, GamePrice>,
    friends: HashMap<String, Vec<String>>,
    categories: HashMap<AppId, Categories>,
    failing: HashSet<AppId>,
    extra_yields: HashMap<AppId, usize>,
    category_calls: AtomicUsize,
    library_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSteam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, steam_id: &str, username: &str) -> Self {
        self.users.insert(
            steam_id.to_string(),
            UserInfo {
                steam_id: steam_id.to_string(),
                username: username.to_string(),
                picture_url: format!("https://avatars.example/{}.jpg", steam_id),
            },
        );
        self
    }

    pub fn with_vanity(mut self, vanity_name: &str, steam_id: &str) -> Self {
        self.vanity
            .insert(vanity_name.to_string(), steam_id.to_string());
        self
    }

    /// Adds a game to a library, playtimes are `(two_weeks, forever)`.
    pub fn with_game(mut self, steam_id: &str, app_id: AppId, name: &str, playtime: (u32, u32)) -> Self {
        self.libraries
            .entry(steam_id.to_string())
            .or_default()
            .push(OwnedGame {
                app_id,
                name: name.to_string(),
                playtime_2weeks: playtime.0,
                playtime_forever: playtime.1,
            });
        self
    }

    pub fn with_price(mut self, app_id: AppId, initial: i64) -> Self {
        self.prices.insert(
            app_id,
            GamePrice {
                currency: "USD".to_string(),
                initial,
                final_amount: initial,
                discount_percent: 0,
            },
        );
        self
    }

    pub fn with_friends(mut self, steam_id: &str, friends: &[&str]) -> Self {
        self.friends.insert(
            steam_id.to_string(),
            friends.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn with_categories(mut self, app_id: AppId, categories: &[u16]) -> Self {
        self.categories.insert(app_id, categories.to_vec());
        self
    }

    pub fn failing_categories(mut self, app_id: AppId) -> Self {
        self.failing.insert(app_id);
        self
    }

    /// Makes the category fetch for `app_id` yield `yields` more times than the others.
    pub fn slow_categories(mut self, app_id: AppId, yields: usize) -> Self {
        self.extra_yields.insert(app_id, yields);
        self
    }

    pub fn category_calls(&self) -> usize {
        self.category_calls.load(Ordering::SeqCst)
    }

    pub fn library_calls(&self) -> usize {
        self.library_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for FakeSteam {
    async fn resolve_vanity(&self, vanity_name: &str) -> Result<Option<String>> {
        Ok(self.vanity.get(vanity_name).cloned())
    }

    async fn player_summaries(&self, steam_ids: &[String]) -> Result<Vec<UserInfo>> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        Ok(steam_ids
            .iter()
            .filter_map(|id| self.users.get(id).cloned())
            .collect())
    }

    async fn owned_games(&self, steam_id: &str) -> Result<Vec<OwnedGame>> {
        self.library_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.libraries.get(steam_id).cloned().unwrap_or_default())
    }

    async fn game_prices(&self, app_ids: &[AppId]) -> Result<HashMap<AppId, GamePrice>> {
        Ok(app_ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn friends(&self, steam_id: &str) -> Result<Vec<String>> {
        Ok(self.friends.get(steam_id).cloned().unwrap_or_default())
    }

    async fn game_categories(&self, app_id: AppId) -> Result<Categories> {
        self.category_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // let sibling requests start before this one finishes
        tokio::task::yield_now().await;
        for _ in 0..self.extra_yields.get(&app_id).copied().unwrap_or_default() {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&app_id) {
            return Err(anyhow!("429 Too Many Requests"));
        }
        Ok(self.categories.get(&app_id).cloned().unwrap_or_default())
    }
}

/// Keeps rows in their encoded form so reads go through the codec like the real table.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<AppId, Vec<u8>>>,
    fail_queries: bool,
    fail_saves: bool,
    queries: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn stored_ids(&self) -> Vec<AppId> {
        let mut ids: Vec<AppId> = self.rows.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn query_categories(&self, app_ids: &[AppId]) -> Result<HashMap<AppId, Categories>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(anyhow!("connection reset"));
        }

        let rows = self.rows.lock().unwrap();
        Ok(app_ids
            .iter()
            .filter_map(|id| rows.get(id).map(|encoded| (*id, codec::decode(encoded))))
            .collect())
    }

    async fn save_categories(&self, categories: &HashMap<AppId, Categories>) -> Result<()> {
        if self.fail_saves {
            return Err(anyhow!("connection reset"));
        }
        if categories.is_empty() {
            return Ok(());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);

        let mut rows = self.rows.lock().unwrap();
        if let Some(app_id) = categories.keys().find(|id| rows.contains_key(*id)) {
            return Err(anyhow!("duplicate key value (appid={})", app_id));
        }
        for (app_id, game_categories) in categories {
            rows.insert(*app_id, codec::encode(game_categories));
        }
        Ok(())
    }
}
