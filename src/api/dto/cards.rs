use serde::{Deserialize, Serialize};

use crate::domain::CardSnapshot;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCardRequest {
    pub column_id: String,
    pub rank: f64,
    #[serde(default)]
    pub concurrency_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCardsResponse {
    pub column_id: String,
    pub cards: Vec<CardSnapshot>,
}
