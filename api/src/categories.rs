//! Game category lookup across the memory cache, the database and the Steam store.
//!
//! The store API has an undocumented rate limit, so a batch that reaches the
//! remote tier first fetches a single game alone. If that probe fails the
//! limit is assumed to be hit and the batch is abandoned before any parallel
//! requests go out.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::cache::CacheGroup;
use crate::db::CategoryStore;
use crate::models::{AppId, Categories};
use crate::steam::CatalogProvider;

pub const MAX_CONCURRENT_FETCHES: usize = 10;

/// Store categories that mean a game can be played together.
pub const MULTIPLAYER_CATEGORIES: [u16; 7] = [
    1,  // Multi-player
    9,  // Co-op
    20, // MMO
    27, // Cross-Platform Multiplayer
    36, // Online PvP
    38, // Online Co-op
    49, // PvP
];

pub fn is_multiplayer(categories: &[u16]) -> bool {
    categories
        .iter()
        .any(|category| MULTIPLAYER_CATEGORIES.contains(category))
}

#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    /// The probe request failed, so Steam is most likely rate limiting us.
    #[error("fetch steam game categories (appid={app_id}): steam api limit probably reached: {cause:#}")]
    ProviderExhausted { app_id: AppId, cause: anyhow::Error },

    #[error("fetch steam game categories (appid={app_id}): {cause:#}")]
    Fetch { app_id: AppId, cause: anyhow::Error },

    #[error("query categories from database: {0:#}")]
    Store(anyhow::Error),

    #[error("save new game categories to database: {0:#}")]
    Persist(anyhow::Error),
}

pub struct CategoryResolver {
    caches: Arc<CacheGroup>,
    store: Arc<dyn CategoryStore>,
    provider: Arc<dyn CatalogProvider>,
}

impl CategoryResolver {
    pub fn new(
        caches: Arc<CacheGroup>,
        store: Arc<dyn CategoryStore>,
        provider: Arc<dyn CatalogProvider>,
    ) -> Self {
        Self {
            caches,
            store,
            provider,
        }
    }

    pub async fn resolve_categories(
        &self,
        app_ids: &[AppId],
    ) -> Result<HashMap<AppId, Categories>, CategoryError> {
        let mut categories = HashMap::with_capacity(app_ids.len());
        self.resolve_into(app_ids, &mut categories).await?;
        Ok(categories)
    }

    /// Resolves `app_ids` into `dst`.
    ///
    /// On a fetch or persist error `dst` still holds everything resolved up
    /// to that point, and those entries are cached like any other.
    pub async fn resolve_into(
        &self,
        app_ids: &[AppId],
        dst: &mut HashMap<AppId, Categories>,
    ) -> Result<(), CategoryError> {
        let mut pending = Vec::with_capacity(app_ids.len());
        for &app_id in app_ids {
            match self.caches.game_categories.get(&app_id) {
                Some(categories) => {
                    dst.insert(app_id, categories);
                }
                None => pending.push(app_id),
            }
        }

        if pending.is_empty() {
            tracing::debug!("categories: full local cache hit for {} games", app_ids.len());
            return Ok(());
        }
        if pending.len() < app_ids.len() {
            tracing::debug!(
                "categories: partial local cache hit for {} games",
                app_ids.len() - pending.len()
            );
        }

        let stored = self
            .store
            .query_categories(&pending)
            .await
            .map_err(CategoryError::Store)?;

        let queried = pending.len();
        pending.retain(|app_id| match stored.get(app_id) {
            Some(categories) => {
                self.caches.game_categories.set(*app_id, categories.clone());
                dst.insert(*app_id, categories.clone());
                false
            }
            None => true,
        });

        if pending.is_empty() {
            tracing::debug!("categories: full db cache hit for {} games", queried);
            return Ok(());
        }
        if pending.len() < queried {
            tracing::debug!(
                "categories: partial db cache hit for {} games",
                queried - pending.len()
            );
        }

        self.fetch_remote(pending, dst).await
    }

    async fn fetch_remote(
        &self,
        mut pending: Vec<AppId>,
        dst: &mut HashMap<AppId, Categories>,
    ) -> Result<(), CategoryError> {
        let Some(probe_id) = pending.pop() else {
            return Ok(());
        };

        let probed = self
            .fetch_one(probe_id)
            .await
            .map_err(|cause| CategoryError::ProviderExhausted {
                app_id: probe_id,
                cause,
            })?;

        let mut learned = HashMap::with_capacity(pending.len() + 1);
        learned.insert(probe_id, probed);

        let cancel = CancellationToken::new();
        let mut results = stream::iter(pending)
            .map(|app_id| {
                let cancel = &cancel;
                async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => (app_id, None),
                        result = self.fetch_one(app_id) => (app_id, Some(result)),
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES);

        let mut fetch_error = None;
        while let Some((app_id, result)) = results.next().await {
            match result {
                Some(Ok(categories)) => {
                    learned.insert(app_id, categories);
                }
                Some(Err(cause)) if fetch_error.is_none() => {
                    cancel.cancel();
                    fetch_error = Some(CategoryError::Fetch { app_id, cause });
                }
                Some(Err(cause)) => {
                    tracing::debug!("categories: dropping later failure for {}: {:#}", app_id, cause);
                }
                None => {}
            }
        }

        tracing::info!("categories: fetched {} games from steam api", learned.len());

        dst.extend(learned.iter().map(|(&app_id, categories)| (app_id, categories.clone())));

        // whatever was fetched is saved, even when a sibling request failed
        if let Err(cause) = self.store.save_categories(&learned).await {
            if let Some(err) = &fetch_error {
                tracing::error!("{}", err);
            }
            return Err(CategoryError::Persist(cause));
        }

        match fetch_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_one(&self, app_id: AppId) -> anyhow::Result<Categories> {
        let categories = self.provider.game_categories(app_id).await?;
        self.caches.game_categories.set(app_id, categories.clone());
        Ok(categories)
    }
}
