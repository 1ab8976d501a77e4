//! Decides whether a column's ranks need renumbering after a move.
//!
//! One read of the column per call. Full-column scans are fine for the column
//! sizes a board holds; an index-backed neighbour lookup only pays off for far
//! larger columns.

use sqlx::SqliteConnection;

use crate::domain::{Card, KanbanError};
use crate::infrastructure::CardStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GapVerdict {
    Clear,
    /// Another card already sits at exactly this rank.
    Collision,
    TightPredecessor { gap: f64 },
    TightSuccessor { gap: f64 },
}

impl GapVerdict {
    pub fn needs_rebalance(&self) -> bool {
        !matches!(self, GapVerdict::Clear)
    }
}

/// Pure decision over the other cards' ranks.
pub fn assess(others: &[f64], rank: f64, min_gap: f64) -> GapVerdict {
    if others.iter().any(|&other| other == rank) {
        return GapVerdict::Collision;
    }

    let predecessor = others
        .iter()
        .copied()
        .filter(|&other| other < rank)
        .reduce(f64::max);
    let successor = others
        .iter()
        .copied()
        .filter(|&other| other > rank)
        .reduce(f64::min);

    if let Some(pred) = predecessor {
        let gap = rank - pred;
        if gap < min_gap {
            return GapVerdict::TightPredecessor { gap };
        }
    }

    if let Some(succ) = successor {
        let gap = succ - rank;
        if gap < min_gap {
            return GapVerdict::TightSuccessor { gap };
        }
    }

    GapVerdict::Clear
}

#[derive(Debug, Clone, Copy)]
pub struct GapAnalyzer {
    min_gap: f64,
}

impl GapAnalyzer {
    pub fn new(min_gap: f64) -> Self {
        Self { min_gap }
    }

    pub async fn inspect(
        &self,
        conn: &mut SqliteConnection,
        column_id: &str,
        moved: &Card,
    ) -> Result<GapVerdict, KanbanError> {
        let others = CardStore::other_ranks(conn, column_id, &moved.id).await?;
        Ok(assess(&others, moved.rank, self.min_gap))
    }

    pub async fn needs_rebalance(
        &self,
        conn: &mut SqliteConnection,
        column_id: &str,
        moved: &Card,
    ) -> Result<bool, KanbanError> {
        Ok(self.inspect(conn, column_id, moved).await?.needs_rebalance())
    }
}
