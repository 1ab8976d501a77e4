use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Extension, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::api::AppState;
use crate::auth::middleware::AuthUser;
use crate::domain::permission::is_owner;
use crate::domain::{Entity, KanbanError};
use crate::infrastructure::CardStore;
use crate::services::notifier::{board_topic, rebalance_topic, TopicMessage};

/// Streams both topics of one board: card moves and column rebalances.
pub async fn board_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(board_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, KanbanError> {
    let mut conn = state.db.acquire().await?;
    let board = CardStore::find_board(&mut conn, &board_id)
        .await?
        .ok_or_else(|| KanbanError::not_found(Entity::Board, &board_id))?;
    drop(conn);

    if !is_owner(&board, &user.user_id) {
        return Err(KanbanError::not_found(Entity::Board, &board_id));
    }

    let topics = [board_topic(&board.id), rebalance_topic(&board.id)];
    tracing::debug!(board_id = board.id.as_str(), "Board event stream opened");

    let stream = BroadcastStream::new(state.notifier.subscribe()).filter_map(move |result| {
        // Lagged receivers skip what they missed.
        let payload = result.ok()?;
        let message: TopicMessage = serde_json::from_str(&payload).ok()?;
        if !topics.contains(&message.topic) {
            return None;
        }

        let data = serde_json::to_string(&message.event).ok()?;
        Some(Ok::<_, Infallible>(
            Event::default().event(message.event.name()).data(data),
        ))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
