use anyhow::{Context, Result};

/// Server configuration loaded from environment variables.
///
/// | Env Var          | Default                            |
/// |------------------|------------------------------------|
/// | `STEAM_API_KEY`  | required                           |
/// | `DATABASE_URL`   | `postgresql://localhost/what2play` |
/// | `HOST`           | `0.0.0.0`                          |
/// | `PORT`           | `3001`                             |
/// | `GAMES_PER_PAGE` | `20`                               |
#[derive(Clone)]
pub struct Config {
    pub steam_api_key: String,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub games_per_page: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let steam_api_key = std::env::var("STEAM_API_KEY").unwrap_or_default();
        if steam_api_key.trim().is_empty() {
            anyhow::bail!("STEAM_API_KEY must be set");
        }

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/what2play".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let games_per_page: usize = std::env::var("GAMES_PER_PAGE")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .context("GAMES_PER_PAGE must be a valid number")?;
        if games_per_page == 0 {
            anyhow::bail!("GAMES_PER_PAGE must be positive");
        }

        Ok(Self {
            steam_api_key,
            database_url,
            host,
            port,
            games_per_page,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
