use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::token::ConcurrencyToken;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Board {
    pub id: String,
    pub owner_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub name: String,
    pub position: i64,
    /// Advisory only; moves never check it.
    pub wip_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub rank: f64,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Card {
    pub fn token(&self) -> ConcurrencyToken {
        ConcurrencyToken::from_version(self.version)
    }
}

/// What callers see of a card after a move: enough to order it and to move it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub id: String,
    pub column_id: String,
    pub title: String,
    pub rank: f64,
    pub concurrency_token: String,
    pub created_at: String,
}

impl From<&Card> for CardSnapshot {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.clone(),
            column_id: card.column_id.clone(),
            title: card.title.clone(),
            rank: card.rank,
            concurrency_token: card.token().encode(),
            created_at: card.created_at.clone(),
        }
    }
}
