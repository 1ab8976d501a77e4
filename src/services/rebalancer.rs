//! Renumbers every card in a column to `spacing, 2 * spacing, ...` under
//! optimistic concurrency.
//!
//! A pass reads the column in display order, assigns fresh ranks and writes
//! them in one transaction, re-reading each row's version right before its
//! write. Any zero-row write (or writer lock contention) throws the whole
//! pass away; the next pass starts from a fresh read after a linear backoff.
//!
//! The pass is not read against one consistent snapshot of the column: a card
//! inserted while a pass is running can be left out and is only picked up by
//! the next rebalance.

use std::time::Duration;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tokio_util::sync::CancellationToken;

use crate::config::RankingConfig;
use crate::domain::{Column, KanbanError};
use crate::infrastructure::db::timestamp_now;
use crate::infrastructure::{is_write_contention, CardStore};
use crate::services::notifier::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalancePhase {
    Idle,
    Reading,
    Assigning,
    Committing,
    ConflictRetry,
    Done,
    Failed,
}

impl RebalancePhase {
    pub fn can_transition_to(&self, next: &RebalancePhase) -> bool {
        use RebalancePhase::*;
        match (self, next) {
            (Idle, Reading) => true,
            (Reading, Assigning) => true,
            (Assigning, Committing) => true,
            (Committing, Done) => true,
            (Committing, ConflictRetry) => true,
            (ConflictRetry, Reading) => true,
            // Exhausted retries, cancellation, or a store error.
            (Idle | Reading | Assigning | Committing | ConflictRetry, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RebalancePhase::Done | RebalancePhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceReport {
    pub column_id: String,
    pub cards: usize,
    pub attempts: u32,
}

enum PassOutcome {
    Committed { cards: usize },
    /// `card_id` is `None` when the commit itself hit contention.
    Conflict { card_id: Option<String> },
}

/// Ranks `spacing * (i + 1)` for `i` in `0..count`.
pub fn assign_ranks(count: usize, spacing: f64) -> Vec<f64> {
    (1..=count).map(|i| spacing * i as f64).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Rebalancer {
    spacing: f64,
    max_attempts: u32,
    base_delay: Duration,
}

impl Rebalancer {
    pub fn new(spacing: f64, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            spacing,
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(
            config.spacing,
            config.max_attempts,
            config.retry_base_delay(),
        )
    }

    /// Runs up to `max_attempts` passes. On success publishes a
    /// column-rebalanced event for the column's board.
    pub async fn rebalance(
        &self,
        pool: &SqlitePool,
        notifier: &Notifier,
        column: &Column,
        cancel: &CancellationToken,
    ) -> Result<RebalanceReport, KanbanError> {
        let column_id = column.id.as_str();
        let mut phase = RebalancePhase::Idle;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                advance(column_id, &mut phase, RebalancePhase::Failed);
                return Err(KanbanError::Cancelled);
            }

            match self.run_pass(pool, column_id, attempt, &mut phase).await {
                Ok(PassOutcome::Committed { cards }) => {
                    advance(column_id, &mut phase, RebalancePhase::Done);
                    tracing::info!(column_id, cards, attempt, "Column rebalanced");
                    notifier.column_rebalanced(&column.board_id, column_id, Utc::now());
                    return Ok(RebalanceReport {
                        column_id: column.id.clone(),
                        cards,
                        attempts: attempt,
                    });
                }
                Ok(PassOutcome::Conflict { card_id }) => {
                    advance(column_id, &mut phase, RebalancePhase::ConflictRetry);
                    tracing::warn!(
                        column_id,
                        card_id = ?card_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Concurrency conflict during rebalancing"
                    );
                }
                Err(e) => {
                    advance(column_id, &mut phase, RebalancePhase::Failed);
                    return Err(e);
                }
            }

            if attempt < self.max_attempts {
                let delay = self.base_delay * attempt;
                tokio::select! {
                    _ = cancel.cancelled() => {
                        advance(column_id, &mut phase, RebalancePhase::Failed);
                        tracing::debug!(column_id, attempt, "Rebalance backoff cancelled");
                        return Err(KanbanError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        advance(column_id, &mut phase, RebalancePhase::Failed);
        tracing::warn!(
            column_id,
            max_attempts = self.max_attempts,
            "Rank rebalance gave up; ordering may stay imprecise until the next move"
        );

        Err(KanbanError::RebalanceFailed {
            column_id: column.id.clone(),
            attempts: self.max_attempts,
        })
    }

    async fn run_pass(
        &self,
        pool: &SqlitePool,
        column_id: &str,
        attempt: u32,
        phase: &mut RebalancePhase,
    ) -> Result<PassOutcome, KanbanError> {
        let mut tx = pool.begin().await?;

        advance(column_id, phase, RebalancePhase::Reading);
        let cards = CardStore::list_column_ordered(&mut *tx, column_id).await?;
        tracing::info!(
            column_id,
            count = cards.len(),
            spacing = self.spacing,
            attempt,
            "Rebalancing column"
        );

        advance(column_id, phase, RebalancePhase::Assigning);
        let ranks = assign_ranks(cards.len(), self.spacing);

        advance(column_id, phase, RebalancePhase::Committing);
        let now = timestamp_now();
        for (card, rank) in cards.iter().zip(ranks) {
            let written = match write_rank(&mut *tx, column_id, &card.id, rank, &now).await {
                Ok(written) => written,
                Err(e) if is_write_contention(&e) => false,
                Err(e) => return Err(e.into()),
            };

            if !written {
                return Ok(PassOutcome::Conflict {
                    card_id: Some(card.id.clone()),
                });
            }
        }

        match tx.commit().await {
            Ok(()) => Ok(PassOutcome::Committed { cards: cards.len() }),
            Err(e) if is_write_contention(&e) => Ok(PassOutcome::Conflict { card_id: None }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Re-reads the row's version and writes against it.
async fn write_rank(
    conn: &mut SqliteConnection,
    column_id: &str,
    card_id: &str,
    rank: f64,
    now: &str,
) -> Result<bool, sqlx::Error> {
    let Some(version) = CardStore::current_version(conn, card_id, column_id).await? else {
        return Ok(false);
    };

    let affected = CardStore::set_rank_if_current(conn, card_id, column_id, rank, version, now).await?;
    Ok(affected == 1)
}

fn advance(column_id: &str, phase: &mut RebalancePhase, next: RebalancePhase) {
    debug_assert!(
        phase.can_transition_to(&next),
        "invalid rebalance transition {:?} -> {:?}",
        phase,
        next
    );
    tracing::debug!(column_id, from = ?phase, to = ?next, "Rebalance phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_ranks_are_multiples_of_spacing() {
        assert_eq!(assign_ranks(3, 1000.0), vec![1000.0, 2000.0, 3000.0]);
        assert_eq!(assign_ranks(1, 0.5), vec![0.5]);
        assert!(assign_ranks(0, 1000.0).is_empty());
    }

    #[test]
    fn test_assigned_ranks_strictly_increase() {
        let ranks = assign_ranks(500, 1000.0);
        assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ranks[499], 500_000.0);
    }

    #[test]
    fn test_happy_path_transitions() {
        use RebalancePhase::*;
        let path = [Idle, Reading, Assigning, Committing, Done];
        assert!(path.windows(2).all(|w| w[0].can_transition_to(&w[1])));
    }

    #[test]
    fn test_retry_transitions() {
        use RebalancePhase::*;
        assert!(Committing.can_transition_to(&ConflictRetry));
        assert!(ConflictRetry.can_transition_to(&Reading));
        assert!(ConflictRetry.can_transition_to(&Failed));
        assert!(!ConflictRetry.can_transition_to(&Committing));
    }

    #[test]
    fn test_terminal_phases_are_final() {
        use RebalancePhase::*;
        for terminal in [Done, Failed] {
            assert!(terminal.is_terminal());
            for next in [Idle, Reading, Assigning, Committing, ConflictRetry, Done, Failed] {
                assert!(!terminal.can_transition_to(&next));
            }
        }
        assert!(!Reading.is_terminal());
    }
}
