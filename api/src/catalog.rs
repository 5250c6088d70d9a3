use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::CacheGroup;
use crate::models::{AppId, Game, GamePrice};
use crate::steam::CatalogProvider;

pub async fn game_prices(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    app_ids: &[AppId],
) -> Result<HashMap<AppId, GamePrice>> {
    let mut prices = HashMap::with_capacity(app_ids.len());
    let mut missing = Vec::new();

    for &app_id in app_ids {
        match caches.prices.get(&app_id) {
            Some(price) => {
                prices.insert(app_id, price);
            }
            None => missing.push(app_id),
        }
    }

    if missing.is_empty() {
        tracing::debug!("prices: full cache hit for {} games", prices.len());
        return Ok(prices);
    }
    if !prices.is_empty() {
        tracing::debug!("prices: partial cache hit for {} games", prices.len());
    }

    let fetched = provider.game_prices(&missing).await?;
    tracing::debug!("prices: fetched {} games from steam api", missing.len());

    for (app_id, price) in fetched {
        caches.prices.set(app_id, price.clone());
        prices.insert(app_id, price);
    }

    Ok(prices)
}

pub async fn owned_games(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    steam_id: &str,
) -> Result<Arc<HashMap<AppId, Game>>> {
    if let Some(games) = caches.games.get(steam_id) {
        tracing::debug!("owned games: cache hit for {}", steam_id);
        return Ok(games);
    }

    let owned = provider.owned_games(steam_id).await?;
    let app_ids: Vec<AppId> = owned.iter().map(|g| g.app_id).collect();

    let prices = game_prices(provider, caches, &app_ids)
        .await
        .context("fetch game prices")?;

    let games: HashMap<AppId, Game> = owned
        .into_iter()
        .map(|g| {
            let price = prices.get(&g.app_id);
            (g.app_id, g.with_price(price))
        })
        .collect();

    let games = Arc::new(games);
    caches.games.set(steam_id.to_string(), games.clone());
    Ok(games)
}

/// Companions of `steam_id`, sorted and without duplicates or `steam_id` itself.
fn companions<'a>(steam_id: &str, friend_ids: &'a [String]) -> BTreeSet<&'a str> {
    friend_ids
        .iter()
        .map(String::as_str)
        .filter(|id| *id != steam_id)
        .collect()
}

/// Cache key for the ranked games of a user and their companions. Companion
/// order does not matter, but which user is the primary does, since their
/// playtime ranks the list.
pub fn users_key(steam_id: &str, friend_ids: &[String]) -> String {
    let companions: Vec<&str> = companions(steam_id, friend_ids).into_iter().collect();
    format!("{}:{}", steam_id, companions.join(","))
}

/// The games `steam_id` can play with all of `friend_ids`, best candidates first.
pub async fn sorted_common_games(
    provider: &dyn CatalogProvider,
    caches: &CacheGroup,
    steam_id: &str,
    friend_ids: &[String],
) -> Result<Arc<Vec<Game>>> {
    let key = users_key(steam_id, friend_ids);
    if let Some(sorted) = caches.sorted_games.get(&key) {
        tracing::debug!("sorted games: cache hit for {}", key);
        return Ok(sorted);
    }

    let companions = companions(steam_id, friend_ids);
    let mut users_games = HashMap::with_capacity(companions.len() + 1);
    for id in std::iter::once(steam_id).chain(companions) {
        let games = owned_games(provider, caches, id)
            .await
            .with_context(|| format!("fetch user owned games (steamid={})", id))?;
        users_games.insert(id.to_string(), games);
    }

    let mut games = common_games(steam_id, &users_games);
    games.sort_by(compare_games);

    let games = Arc::new(games);
    caches.sorted_games.set(key, games.clone());
    Ok(games)
}

/// Games of `steam_id` that are free or owned by everyone else, plus every
/// free game anyone else owns.
pub fn common_games(steam_id: &str, users_games: &HashMap<String, Arc<HashMap<AppId, Game>>>) -> Vec<Game> {
    let others: Vec<&HashMap<AppId, Game>> = users_games
        .iter()
        .filter(|(id, _)| id.as_str() != steam_id)
        .map(|(_, games)| games.as_ref())
        .collect();

    let mut common: HashMap<AppId, Game> = HashMap::new();

    if let Some(own) = users_games.get(steam_id) {
        for (app_id, game) in own.iter() {
            if game.free || others.iter().all(|games| games.contains_key(app_id)) {
                common.insert(*app_id, game.clone());
            }
        }
    }

    for games in &others {
        for (app_id, game) in games.iter() {
            if game.free && !common.contains_key(app_id) {
                common.insert(*app_id, game.clone());
            }
        }
    }

    common.into_values().collect()
}

/// Recently played games first, by two-week playtime; the rest by lifetime
/// playtime. Names break ties, the greater name first.
pub fn compare_games(a: &Game, b: &Game) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

fn sort_key(game: &Game) -> (Reverse<u32>, Reverse<u32>, Reverse<&str>, AppId) {
    // lifetime playtime only ranks games nobody in the pair played lately,
    // and any game played lately outranks every game that was not
    let lifetime = if game.playtime_2weeks == 0 {
        game.playtime_forever
    } else {
        0
    };
    (
        Reverse(game.playtime_2weeks),
        Reverse(lifetime),
        Reverse(game.name.as_str()),
        game.app_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSteam;

    fn game(app_id: AppId, name: &str, two_weeks: u32, forever: u32) -> Game {
        Game {
            app_id,
            name: name.to_string(),
            playtime_2weeks: two_weeks,
            playtime_forever: forever,
            free: false,
        }
    }

    fn ids(games: &[Game]) -> Vec<AppId> {
        games.iter().map(|g| g.app_id).collect()
    }

    #[test]
    fn test_recent_playtime_tie_prefers_greater_name() {
        let a = game(1, "Z", 5, 10);
        let b = game(2, "A", 5, 900);
        assert_eq!(compare_games(&a, &b), Ordering::Less);
        assert_eq!(compare_games(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_unplayed_tie_prefers_greater_name() {
        let c = game(1, "B", 0, 0);
        let d = game(2, "A", 0, 0);
        assert_eq!(compare_games(&c, &d), Ordering::Less);
    }

    #[test]
    fn test_sort_order() {
        let mut games = vec![
            game(1, "Old favourite", 0, 5000),
            game(2, "Never played", 0, 0),
            game(3, "Played a bit lately", 30, 40),
            game(4, "Played a lot lately", 600, 700),
            game(5, "Another old one", 0, 200),
        ];
        games.sort_by(compare_games);
        assert_eq!(ids(&games), vec![4, 3, 1, 5, 2]);
    }

    #[test]
    fn test_identical_games_still_order_totally() {
        let a = game(7, "Same", 0, 0);
        let b = game(3, "Same", 0, 0);
        assert_eq!(compare_games(&b, &a), Ordering::Less);
        assert_eq!(compare_games(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_users_key_ignores_order_and_duplicates() {
        let a = users_key("1", &["3".to_string(), "2".to_string()]);
        let b = users_key("1", &["2".to_string(), "3".to_string(), "1".to_string()]);
        assert_eq!(a, "1:2,3");
        assert_eq!(a, b);
        assert_ne!(users_key("2", &["1".to_string()]), users_key("1", &["2".to_string()]));
    }

    fn library(games: &[Game]) -> Arc<HashMap<AppId, Game>> {
        Arc::new(games.iter().map(|g| (g.app_id, g.clone())).collect())
    }

    #[test]
    fn test_common_games() {
        let mut free_own = game(4, "Own free", 0, 0);
        free_own.free = true;
        let mut free_friend = game(5, "Friend free", 0, 0);
        free_friend.free = true;

        let users_games = HashMap::from([
            (
                "me".to_string(),
                library(&[game(1, "Shared", 0, 0), game(2, "Partly shared", 0, 0), game(3, "Mine", 0, 0), free_own]),
            ),
            ("a".to_string(), library(&[game(1, "Shared", 0, 0), game(2, "Partly shared", 0, 0), free_friend.clone()])),
            ("b".to_string(), library(&[game(1, "Shared", 0, 0), free_friend])),
        ]);

        let mut common = ids(&common_games("me", &users_games));
        common.sort_unstable();
        assert_eq!(common, vec![1, 4, 5]);
    }

    #[test]
    fn test_alone_means_whole_library() {
        let users_games = HashMap::from([(
            "me".to_string(),
            library(&[game(1, "One", 0, 0), game(2, "Two", 0, 0)]),
        )]);
        assert_eq!(common_games("me", &users_games).len(), 2);
    }

    #[tokio::test]
    async fn test_sorted_common_games_with_free_override() {
        let steam = FakeSteam::new()
            .with_game("me", 10, "Shared", (0, 100))
            .with_game("me", 20, "Only mine", (50, 100))
            .with_game("friend", 10, "Shared", (0, 5))
            .with_game("friend", 30, "Free friend game", (0, 1))
            .with_price(10, 1999)
            .with_price(20, 999)
            .with_price(30, 0);
        let caches = CacheGroup::new();

        let games = sorted_common_games(&steam, &caches, "me", &["friend".to_string()])
            .await
            .unwrap();

        assert_eq!(ids(&games), vec![10, 30]);
        assert!(games[1].free);
        assert!(!games[0].free);
        // the primary user's playtime is what ranks shared games
        assert_eq!(games[0].playtime_forever, 100);
    }

    #[tokio::test]
    async fn test_sorted_common_games_is_cached_per_user_set() {
        let steam = FakeSteam::new()
            .with_game("me", 10, "Shared", (0, 100))
            .with_game("a", 10, "Shared", (0, 5))
            .with_game("b", 10, "Shared", (0, 5))
            .with_price(10, 1999);
        let caches = CacheGroup::new();

        let first = sorted_common_games(&steam, &caches, "me", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(steam.library_calls(), 3);

        let second = sorted_common_games(&steam, &caches, "me", &["b".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(steam.library_calls(), 3);

        // libraries are cached on their own too
        sorted_common_games(&steam, &caches, "me", &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(steam.library_calls(), 3);
    }

    #[tokio::test]
    async fn test_swapping_primary_user_reranks() {
        let steam = FakeSteam::new()
            .with_game("1", 10, "Alpha", (0, 100))
            .with_game("1", 20, "Beta", (0, 50))
            .with_game("2", 10, "Alpha", (0, 1))
            .with_game("2", 20, "Beta", (0, 900))
            .with_price(10, 999)
            .with_price(20, 999);
        let caches = CacheGroup::new();

        let first = sorted_common_games(&steam, &caches, "1", &["2".to_string()])
            .await
            .unwrap();
        let swapped = sorted_common_games(&steam, &caches, "2", &["1".to_string()])
            .await
            .unwrap();

        assert_eq!(ids(&first), vec![10, 20]);
        assert_eq!(ids(&swapped), vec![20, 10]);
        assert_eq!(swapped[0].playtime_forever, 900);
        assert_eq!(steam.library_calls(), 2);
    }

    #[tokio::test]
    async fn test_unpriced_game_counts_as_free() {
        let steam = FakeSteam::new().with_game("me", 10, "No store page", (0, 0));
        let caches = CacheGroup::new();

        let games = owned_games(&steam, &caches, "me").await.unwrap();
        assert!(games[&10].free);
        assert!(caches.games.get("me").is_some());
    }
}
