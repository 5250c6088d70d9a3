use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{AppId, Categories, GamePrice, OwnedGame, UserInfo};

const API_URL: &str = "https://api.steampowered.com";
const STORE_URL: &str = "https://store.steampowered.com";

/// Everything the service needs from Steam.
///
/// "Not found" answers are values (`None`, empty lists, missing map keys),
/// errors are reserved for transport and provider failures.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Returns `None` when no profile uses `vanity_name`.
    async fn resolve_vanity(&self, vanity_name: &str) -> Result<Option<String>>;

    /// Unknown ids are left out of the result.
    async fn player_summaries(&self, steam_ids: &[String]) -> Result<Vec<UserInfo>>;

    async fn owned_games(&self, steam_id: &str) -> Result<Vec<OwnedGame>>;

    /// Ids the store could not price are left out of the result.
    async fn game_prices(&self, app_ids: &[AppId]) -> Result<HashMap<AppId, GamePrice>>;

    async fn friends(&self, steam_id: &str) -> Result<Vec<String>>;

    /// A game the store has no data for has no categories.
    async fn game_categories(&self, app_id: AppId) -> Result<Categories>;
}

#[derive(Debug, Deserialize)]
struct ResolveVanityResponse {
    response: ResolveVanity,
}

#[derive(Debug, Deserialize)]
struct ResolveVanity {
    steamid: Option<String>,
    success: u8,
    message: Option<String>,
}

const VANITY_MATCH: u8 = 1;
const VANITY_NO_MATCH: u8 = 42;

#[derive(Debug, Deserialize)]
struct PlayerSummariesResponse {
    response: PlayerSummaries,
}

#[derive(Debug, Deserialize)]
struct PlayerSummaries {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    steamid: String,
    personaname: String,
    avatarfull: String,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesResponse {
    response: OwnedGames,
}

#[derive(Debug, Deserialize)]
struct OwnedGames {
    // private profiles answer with an empty response object
    #[serde(default)]
    games: Vec<OwnedGameEntry>,
}

#[derive(Debug, Deserialize)]
struct OwnedGameEntry {
    appid: AppId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    playtime_2weeks: u32,
    #[serde(default)]
    playtime_forever: u32,
}

#[derive(Debug, Deserialize)]
struct FriendListResponse {
    friendslist: FriendList,
}

#[derive(Debug, Deserialize)]
struct FriendList {
    #[serde(default)]
    friends: Vec<Friend>,
}

#[derive(Debug, Deserialize)]
struct Friend {
    steamid: String,
}

/// One entry of the store `appdetails` response, keyed by app id.
#[derive(Debug, Deserialize)]
struct AppDetails<T> {
    success: bool,
    #[serde(default = "AppData::missing")]
    data: AppData<T>,
}

/// The store sends `"data": []` instead of an object when it has nothing.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AppData<T> {
    // tried first, a struct would also accept an empty array
    Missing(Vec<serde_json::Value>),
    Present(T),
}

impl<T> AppData<T> {
    fn missing() -> Self {
        AppData::Missing(Vec::new())
    }

    fn into_option(self) -> Option<T> {
        match self {
            AppData::Present(data) => Some(data),
            AppData::Missing(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceData {
    price_overview: Option<GamePrice>,
}

#[derive(Debug, Deserialize)]
struct CategoryData {
    #[serde(default)]
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: u16,
}

#[derive(Clone)]
pub struct SteamClient {
    client: Client,
    api_key: String,
    api_url: String,
    store_url: String,
}

impl SteamClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: API_URL.to_string(),
            store_url: STORE_URL.to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        // errors must not echo the url, it carries the api key
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("request {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} responded with {}", url, status);
        }

        response
            .json()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("decode response from {}", url))
    }
}

#[async_trait]
impl CatalogProvider for SteamClient {
    async fn resolve_vanity(&self, vanity_name: &str) -> Result<Option<String>> {
        let url = format!("{}/ISteamUser/ResolveVanityURL/v0001", self.api_url);
        let res: ResolveVanityResponse = self
            .get_json(&url, &[("key", self.api_key.as_str()), ("vanityurl", vanity_name)])
            .await?;

        match res.response.success {
            VANITY_MATCH => res
                .response
                .steamid
                .map(Some)
                .context("vanity url matched without a steamid"),
            VANITY_NO_MATCH => Ok(None),
            code => anyhow::bail!(
                "invalid vanity url success code {}: {}",
                code,
                res.response.message.unwrap_or_default()
            ),
        }
    }

    async fn player_summaries(&self, steam_ids: &[String]) -> Result<Vec<UserInfo>> {
        if steam_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/ISteamUser/GetPlayerSummaries/v0002", self.api_url);
        let ids = steam_ids.join(",");
        let res: PlayerSummariesResponse = self
            .get_json(&url, &[("key", self.api_key.as_str()), ("steamids", ids.as_str())])
            .await?;

        Ok(res
            .response
            .players
            .into_iter()
            .map(|p| UserInfo {
                steam_id: p.steamid,
                username: p.personaname,
                picture_url: p.avatarfull,
            })
            .collect())
    }

    async fn owned_games(&self, steam_id: &str) -> Result<Vec<OwnedGame>> {
        let url = format!("{}/IPlayerService/GetOwnedGames/v0001", self.api_url);
        let res: OwnedGamesResponse = self
            .get_json(
                &url,
                &[
                    ("key", self.api_key.as_str()),
                    ("steamid", steam_id),
                    ("include_appinfo", "true"),
                    ("include_played_free_games", "true"),
                ],
            )
            .await?;

        Ok(res
            .response
            .games
            .into_iter()
            .map(|g| OwnedGame {
                app_id: g.appid,
                name: g.name,
                playtime_2weeks: g.playtime_2weeks,
                playtime_forever: g.playtime_forever,
            })
            .collect())
    }

    async fn game_prices(&self, app_ids: &[AppId]) -> Result<HashMap<AppId, GamePrice>> {
        if app_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/api/appdetails", self.store_url);
        let ids = app_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let res: HashMap<String, AppDetails<PriceData>> = self
            .get_json(&url, &[("appids", ids.as_str()), ("filters", "price_overview")])
            .await?;

        let mut prices = HashMap::with_capacity(res.len());
        for (app_id, details) in res {
            if !details.success {
                continue;
            }
            let app_id: AppId = app_id
                .parse()
                .with_context(|| format!("parse appid {:?}", app_id))?;
            let price = details
                .data
                .into_option()
                .and_then(|d| d.price_overview)
                .unwrap_or_default();
            prices.insert(app_id, price);
        }

        Ok(prices)
    }

    async fn friends(&self, steam_id: &str) -> Result<Vec<String>> {
        let url = format!("{}/ISteamUser/GetFriendList/v0001", self.api_url);
        let res: FriendListResponse = self
            .get_json(
                &url,
                &[
                    ("key", self.api_key.as_str()),
                    ("steamid", steam_id),
                    ("relationship", "friend"),
                ],
            )
            .await?;

        Ok(res
            .friendslist
            .friends
            .into_iter()
            .map(|f| f.steamid)
            .collect())
    }

    async fn game_categories(&self, app_id: AppId) -> Result<Categories> {
        let url = format!("{}/api/appdetails", self.store_url);
        let id = app_id.to_string();
        let mut res: HashMap<String, AppDetails<CategoryData>> = self
            .get_json(&url, &[("appids", id.as_str()), ("filters", "categories")])
            .await?;

        let categories = res
            .remove(&id)
            .filter(|details| details.success)
            .and_then(|details| details.data.into_option())
            .map(|data| data.categories.into_iter().map(|c| c.id).collect())
            .unwrap_or_default();

        Ok(categories)
    }
}
