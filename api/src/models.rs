use serde::{Deserialize, Serialize};

pub type AppId = u32;

/// Steam store category ids of a single game, in the order the store lists them.
pub type Categories = Vec<u16>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub app_id: AppId,
    pub name: String,
    pub playtime_2weeks: u32,  // minutes
    pub playtime_forever: u32, // minutes
    pub free: bool,
}

/// A game as listed in a user's library, before pricing is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedGame {
    pub app_id: AppId,
    pub name: String,
    pub playtime_2weeks: u32,
    pub playtime_forever: u32,
}

impl OwnedGame {
    pub fn with_price(self, price: Option<&GamePrice>) -> Game {
        Game {
            app_id: self.app_id,
            name: self.name,
            playtime_2weeks: self.playtime_2weeks,
            playtime_forever: self.playtime_forever,
            // no price overview means the store sells it for nothing
            free: price.map_or(true, GamePrice::is_free),
        }
    }
}

/// Amounts are in the minor unit of `currency` (cents for USD).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GamePrice {
    pub currency: String,
    pub initial: i64,
    #[serde(rename = "final")]
    pub final_amount: i64,
    pub discount_percent: i32,
}

impl GamePrice {
    pub fn is_free(&self) -> bool {
        self.initial == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub steam_id: String,
    pub username: String,
    pub picture_url: String,
}
