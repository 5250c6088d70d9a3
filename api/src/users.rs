use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::CacheGroup;
use crate::models::UserInfo;
use crate::steam::CatalogProvider;

/// Profiles of `steam_ids`, cached ones first. Unknown ids are left out.
pub async fn users_info(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    steam_ids: &[String],
) -> Result<Vec<UserInfo>> {
    let mut users = Vec::with_capacity(steam_ids.len());
    let mut missing = Vec::new();

    for steam_id in steam_ids {
        match caches.users_info.get(steam_id) {
            Some(user) => users.push(user),
            None => missing.push(steam_id.clone()),
        }
    }

    if missing.is_empty() {
        tracing::debug!("users info: full cache hit for {} users", users.len());
        return Ok(users);
    }
    if !users.is_empty() {
        tracing::debug!("users info: partial cache hit for {} users", users.len());
    }

    for user in provider.player_summaries(&missing).await? {
        caches.users_info.set(user.steam_id.clone(), user.clone());
        users.push(user);
    }

    Ok(users)
}

pub async fn user_info(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    steam_id: &str,
) -> Result<Option<UserInfo>> {
    let users = users_info(provider, caches, &[steam_id.to_string()]).await?;
    Ok(users.into_iter().next())
}

pub async fn user_friends(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    steam_id: &str,
) -> Result<Arc<Vec<String>>> {
    if let Some(friends) = caches.friends.get(steam_id) {
        tracing::debug!("friends: cache hit for {}", steam_id);
        return Ok(friends);
    }

    let friends = Arc::new(provider.friends(steam_id).await?);
    caches.friends.set(steam_id.to_string(), friends.clone());
    Ok(friends)
}

fn looks_like_steam_id(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit())
}

/// Finds the profile behind what a user typed at login: a steam id or a
/// vanity url name. Returns `None` when neither matches.
pub async fn resolve_user(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    identifier: &str,
) -> Result<Option<UserInfo>> {
    if looks_like_steam_id(identifier) {
        if let Some(user) = user_info(provider, caches, identifier).await? {
            return Ok(Some(user));
        }
        // numeric vanity names exist too
    }

    let Some(steam_id) = provider
        .resolve_vanity(identifier)
        .await
        .with_context(|| format!("resolve vanity url {:?}", identifier))?
    else {
        return Ok(None);
    };

    user_info(provider, caches, &steam_id).await
}
