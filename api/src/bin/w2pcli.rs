use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use what2play_api::{
    cache::CacheGroup, catalog, categories::is_multiplayer, categories::CategoryResolver,
    config::Config, db, pages::GamePages, steam::SteamClient, users,
};

#[derive(Parser)]
#[command(name = "w2pcli")]
#[command(about = "what2play CLI tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a steam user by steam id or vanity url name
    Resolve {
        #[arg(value_name = "IDENTIFIER")]
        identifier: String,
    },

    /// List a user's friends
    Friends {
        #[arg(value_name = "STEAMID")]
        steam_id: String,
    },

    /// List multiplayer games a user shares with friends
    Games {
        #[arg(value_name = "STEAMID")]
        steam_id: String,

        /// Friend steam ids, repeat once per friend
        #[arg(short, long = "with", required = true)]
        with: Vec<String>,

        /// Page to show, starting at 0
        #[arg(short, long, default_value_t = 0)]
        page: usize,
    },

    /// Show the store categories of games, fetching and saving unknown ones
    Categories {
        #[arg(value_name = "APPID", required = true)]
        app_ids: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("w2pcli=info,what2play_api=info")
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let steam = Arc::new(SteamClient::new(config.steam_api_key.clone()));
    let caches = Arc::new(CacheGroup::new());

    match cli.command {
        Commands::Resolve { identifier } => {
            match users::resolve_user(steam.as_ref(), &caches, &identifier).await? {
                Some(user) => println!("{} {} {}", user.steam_id, user.username, user.picture_url),
                None => println!("no steam user matches {:?}", identifier),
            }
        }
        Commands::Friends { steam_id } => {
            let friend_ids = users::user_friends(steam.as_ref(), &caches, &steam_id).await?;
            let friends = users::users_info(steam.as_ref(), &caches, &friend_ids).await?;
            println!("{} friends", friends.len());
            for friend in friends {
                println!("  {} {}", friend.steam_id, friend.username);
            }
        }
        Commands::Games {
            steam_id,
            with,
            page,
        } => {
            let resolver = resolver(&config, caches.clone(), steam.clone()).await?;
            let sorted =
                catalog::sorted_common_games(steam.as_ref(), &caches, &steam_id, &with).await?;
            println!("{} candidate games", sorted.len());

            let per_page = config.games_per_page;
            let offset = per_page
                .checked_mul(page)
                .with_context(|| format!("--page {} is out of range", page))?;
            let mut pages =
                GamePages::new(&resolver, &sorted, per_page, is_multiplayer).skip(offset);
            let games = pages.next_page().await?;

            for game in &games {
                let free = if game.free { " (free)" } else { "" };
                println!(
                    "  {:>8} {}{} - {} min last two weeks, {} min total",
                    game.app_id, game.name, free, game.playtime_2weeks, game.playtime_forever
                );
            }
            if games.is_empty() {
                println!("no multiplayer games on page {}", page);
            }
        }
        Commands::Categories { app_ids } => {
            let resolver = resolver(&config, caches.clone(), steam.clone()).await?;
            let categories = resolver.resolve_categories(&app_ids).await?;
            for app_id in app_ids {
                let game_categories = categories.get(&app_id).cloned().unwrap_or_default();
                let multiplayer = if is_multiplayer(&game_categories) {
                    " multiplayer"
                } else {
                    ""
                };
                println!("  {:>8} {:?}{}", app_id, game_categories, multiplayer);
            }
        }
    }

    Ok(())
}

async fn resolver(
    config: &Config,
    caches: Arc<CacheGroup>,
    steam: Arc<SteamClient>,
) -> Result<CategoryResolver> {
    let pool = db::init_db(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    Ok(CategoryResolver::new(
        caches,
        Arc::new(db::PgCategoryStore::new(pool)),
        steam,
    ))
}
