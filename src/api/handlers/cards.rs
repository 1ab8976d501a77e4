use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::Json;

use crate::api::dto::{ColumnCardsResponse, MoveCardRequest};
use crate::api::AppState;
use crate::auth::middleware::AuthUser;
use crate::domain::permission::is_owner;
use crate::domain::{CardSnapshot, Entity, KanbanError};
use crate::infrastructure::CardStore;
use crate::services::MoveCommand;

pub async fn move_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<MoveCardRequest>, JsonRejection>,
) -> Result<Json<CardSnapshot>, KanbanError> {
    let Json(req) = payload?;

    // Dropping this handler (client gone, request timeout) cancels the move.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let command = MoveCommand {
        card_id: id,
        target_column_id: req.column_id,
        rank: req.rank,
        concurrency_token: req.concurrency_token,
        requester_id: user.user_id,
    };

    let card = state
        .orchestrator
        .move_card(&state.db, &state.notifier, command, &cancel)
        .await?;

    Ok(Json(card))
}

pub async fn list_column_cards(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<String>,
) -> Result<Json<ColumnCardsResponse>, KanbanError> {
    let mut conn = state.db.acquire().await?;

    let column = CardStore::find_column(&mut conn, &column_id)
        .await?
        .ok_or_else(|| KanbanError::not_found(Entity::Column, &column_id))?;
    let board = CardStore::find_board(&mut conn, &column.board_id)
        .await?
        .ok_or_else(|| KanbanError::not_found(Entity::Column, &column_id))?;

    if !is_owner(&board, &user.user_id) {
        return Err(KanbanError::not_found(Entity::Column, &column_id));
    }

    let cards = CardStore::list_column_ordered(&mut conn, &column.id)
        .await?
        .iter()
        .map(CardSnapshot::from)
        .collect();

    Ok(Json(ColumnCardsResponse {
        column_id: column.id,
        cards,
    }))
}
