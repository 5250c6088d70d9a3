use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub mod cache;
pub mod catalog;
pub mod categories;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pages;
pub mod steam;
pub mod users;

#[cfg(test)]
mod testing;

use cache::CacheGroup;
use categories::{is_multiplayer, CategoryResolver};
use config::Config;
use error::{ApiError, ApiResult};
use models::{Game, UserInfo};
use pages::GamePages;
use steam::CatalogProvider;

#[derive(Clone)]
pub struct AppState {
    pub caches: Arc<CacheGroup>,
    pub provider: Arc<dyn CatalogProvider>,
    pub resolver: Arc<CategoryResolver>,
    pub games_per_page: usize,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        store: Arc<dyn db::CategoryStore>,
        games_per_page: usize,
    ) -> Self {
        let caches = Arc::new(CacheGroup::new());
        let resolver = Arc::new(CategoryResolver::new(
            caches.clone(),
            store,
            provider.clone(),
        ));
        Self {
            caches,
            provider,
            resolver,
            games_per_page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResolveQuery {
    identifier: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendsData {
    pub user: UserInfo,
    pub friends: Vec<UserInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GamesPage {
    pub user: UserInfo,
    pub games: Vec<Game>,
    pub next_page: Option<u16>,
}

async fn health_check() -> &'static str {
    "ok"
}

async fn resolve_user(
    State(state): State<AppState>,
    Query(params): Query<ResolveQuery>,
) -> ApiResult<Json<UserInfo>> {
    let identifier = params.identifier.trim();
    if identifier.is_empty() {
        return Err(ApiError::BadRequest("identifier is required".to_string()));
    }
    if identifier.contains(' ') {
        return Err(ApiError::BadRequest(
            "identifier must not have spaces".to_string(),
        ));
    }

    let user = users::resolve_user(state.provider.as_ref(), &state.caches, identifier)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no steam user matches {:?}", identifier)))?;

    tracing::info!("resolved {:?} to {}", identifier, user.steam_id);
    Ok(Json(user))
}

async fn find_user(state: &AppState, steam_id: &str) -> ApiResult<UserInfo> {
    users::user_info(state.provider.as_ref(), &state.caches, steam_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("unknown steamid {}", steam_id)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(steam_id): Path<String>,
) -> ApiResult<Json<UserInfo>> {
    Ok(Json(find_user(&state, &steam_id).await?))
}

async fn get_friends(
    State(state): State<AppState>,
    Path(steam_id): Path<String>,
) -> ApiResult<Json<FriendsData>> {
    let user = find_user(&state, &steam_id).await?;
    let friend_ids = users::user_friends(state.provider.as_ref(), &state.caches, &steam_id).await?;
    let friends = users::users_info(state.provider.as_ref(), &state.caches, &friend_ids).await?;

    Ok(Json(FriendsData { user, friends }))
}

/// Query string is `steamid=<friend>` repeated once per friend, plus `page`.
async fn get_games(
    State(state): State<AppState>,
    Path(steam_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<GamesPage>> {
    let mut friend_ids = Vec::new();
    let mut page = None;
    for (key, value) in params {
        match key.as_str() {
            "steamid" if value.is_empty() => {
                return Err(ApiError::BadRequest("invalid steamid query param".to_string()));
            }
            "steamid" => friend_ids.push(value),
            "page" => {
                let parsed: u16 = value
                    .parse()
                    .map_err(|_| ApiError::BadRequest("invalid page query param".to_string()))?;
                page = Some(parsed);
            }
            _ => {}
        }
    }
    if friend_ids.is_empty() {
        return Err(ApiError::BadRequest("missing steamid query param".to_string()));
    }
    let page = page.ok_or_else(|| ApiError::BadRequest("invalid page query param".to_string()))?;

    let user = find_user(&state, &steam_id).await?;

    let sorted = catalog::sorted_common_games(
        state.provider.as_ref(),
        &state.caches,
        &steam_id,
        &friend_ids,
    )
    .await
    .map_err(|e| e.context(format!("get sorted games (steamid={})", steam_id)))?;

    let per_page = state.games_per_page;
    let offset = per_page
        .checked_mul(usize::from(page))
        .ok_or_else(|| ApiError::BadRequest("page query param out of range".to_string()))?;
    let mut pages = GamePages::new(&state.resolver, &sorted, per_page, is_multiplayer).skip(offset);
    let games = pages.next_page().await?;

    let next_page = if games.is_empty() {
        None
    } else {
        page.checked_add(1)
    };

    Ok(Json(GamesPage {
        user,
        games,
        next_page,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/users/resolve", get(resolve_user))
        .route("/api/users/:steamid", get(get_user))
        .route("/api/users/:steamid/friends", get(get_friends))
        .route("/api/users/:steamid/games", get(get_games))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("what2play_api=debug,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    let pool = db::init_db(&config.database_url).await?;
    tracing::info!("database initialized");

    let state = AppState::new(
        Arc::new(steam::SteamClient::new(config.steam_api_key.clone())),
        Arc::new(db::PgCategoryStore::new(pool)),
        config.games_per_page,
    );

    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
