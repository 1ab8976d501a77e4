use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::config::RankingConfig;
use crate::domain::permission::{is_owner, same_board};
use crate::domain::{Card, CardSnapshot, Column, ConcurrencyToken, Entity, KanbanError};
use crate::infrastructure::db::timestamp_now;
use crate::infrastructure::CardStore;
use crate::services::gap_analyzer::GapAnalyzer;
use crate::services::notifier::Notifier;
use crate::services::rebalancer::{RebalanceReport, Rebalancer};

#[derive(Debug, Clone)]
pub struct MoveCommand {
    pub card_id: String,
    pub target_column_id: String,
    pub rank: f64,
    /// Exactly what the client sent; presence and shape are checked by the move.
    pub concurrency_token: Option<String>,
    pub requester_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct MoveOrchestrator {
    analyzer: GapAnalyzer,
    rebalancer: Rebalancer,
}

impl MoveOrchestrator {
    pub fn new(analyzer: GapAnalyzer, rebalancer: Rebalancer) -> Self {
        Self {
            analyzer,
            rebalancer,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(
            GapAnalyzer::new(config.min_gap),
            Rebalancer::from_config(config),
        )
    }

    /// Moves a card to `target_column_id` at `rank`.
    ///
    /// Every check runs before the single conditional write, so any error up
    /// to and including `Conflict` leaves the card untouched. After the write
    /// the target column is checked for crowded or colliding ranks and
    /// renumbered if needed; a failed renumbering is reported as
    /// `RebalanceFailed` but the move itself stays committed.
    pub async fn move_card(
        &self,
        pool: &SqlitePool,
        notifier: &Notifier,
        command: MoveCommand,
        cancel: &CancellationToken,
    ) -> Result<CardSnapshot, KanbanError> {
        if !command.rank.is_finite() || command.rank < 0.0 {
            return Err(KanbanError::BadRequest(format!(
                "rank must be a finite number >= 0, got {}",
                command.rank
            )));
        }

        let mut conn = pool.acquire().await?;

        let card = CardStore::find_card(&mut conn, &command.card_id)
            .await?
            .ok_or_else(|| KanbanError::not_found(Entity::Card, &command.card_id))?;

        // A card whose column or board cannot be resolved is invisible to everyone.
        let current_column = CardStore::find_column(&mut conn, &card.column_id)
            .await?
            .ok_or_else(|| KanbanError::not_found(Entity::Card, &command.card_id))?;
        let board = CardStore::find_board(&mut conn, &current_column.board_id)
            .await?
            .ok_or_else(|| KanbanError::not_found(Entity::Card, &command.card_id))?;

        if !is_owner(&board, &command.requester_id) {
            tracing::debug!(
                card_id = card.id.as_str(),
                "Move rejected: requester does not own the board"
            );
            return Err(KanbanError::not_found(Entity::Card, &command.card_id));
        }

        let target_column = CardStore::find_column(&mut conn, &command.target_column_id)
            .await?
            .ok_or_else(|| KanbanError::not_found(Entity::Column, &command.target_column_id))?;

        if !same_board(&current_column, &target_column) {
            return Err(KanbanError::DomainViolation(
                "cross-board move: cannot move a card to a column on a different board".into(),
            ));
        }

        let expected = ConcurrencyToken::parse(command.concurrency_token.as_deref())?;

        if cancel.is_cancelled() {
            return Err(KanbanError::Cancelled);
        }

        let now = timestamp_now();
        let affected = CardStore::move_if_current(
            &mut conn,
            &card.id,
            &target_column.id,
            command.rank,
            expected.version(),
            &now,
        )
        .await?;

        if affected == 0 {
            tracing::warn!(
                card_id = card.id.as_str(),
                "Move rejected: card was modified by another operation"
            );
            return Err(KanbanError::Conflict(
                "card was modified by another operation; reload and retry".into(),
            ));
        }
        drop(conn);

        tracing::info!(
            card_id = card.id.as_str(),
            from_column = card.column_id.as_str(),
            to_column = target_column.id.as_str(),
            rank = command.rank,
            "Card moved"
        );

        let moved = Card {
            column_id: target_column.id.clone(),
            rank: command.rank,
            version: expected.next().version(),
            updated_at: now,
            ..card
        };

        let repaired = self
            .repair_ordering(pool, notifier, &target_column, &moved, cancel)
            .await;

        let snapshot = match &repaired {
            // Renumbering rewrote this row too; hand back its current rank and token.
            Ok(Some(_)) => {
                let mut conn = pool.acquire().await?;
                match CardStore::find_card(&mut conn, &moved.id).await? {
                    Some(current) => CardSnapshot::from(&current),
                    None => CardSnapshot::from(&moved),
                }
            }
            _ => CardSnapshot::from(&moved),
        };

        notifier.card_moved(&board.id, &snapshot);

        if let Err(e) = repaired {
            tracing::warn!(
                card_id = moved.id.as_str(),
                column_id = target_column.id.as_str(),
                "Move committed but rank repair did not complete: {}",
                e
            );
            return Err(e);
        }

        Ok(snapshot)
    }

    async fn repair_ordering(
        &self,
        pool: &SqlitePool,
        notifier: &Notifier,
        column: &Column,
        moved: &Card,
        cancel: &CancellationToken,
    ) -> Result<Option<RebalanceReport>, KanbanError> {
        let verdict = {
            let mut conn = pool.acquire().await?;
            self.analyzer.inspect(&mut conn, &column.id, moved).await?
        };

        if !verdict.needs_rebalance() {
            return Ok(None);
        }

        tracing::info!(
            column_id = column.id.as_str(),
            card_id = moved.id.as_str(),
            verdict = ?verdict,
            "Rank gap below threshold, rebalancing column"
        );

        self.rebalancer
            .rebalance(pool, notifier, column, cancel)
            .await
            .map(Some)
    }
}
