//! Row-level access to boards, columns and cards.
//!
//! Every function takes its connection explicitly, so the same query runs on a
//! pooled connection or inside an open transaction. Writes to `cards` are
//! conditional on the row version and report how many rows they touched;
//! callers turn a zero into a conflict.

use sqlx::SqliteConnection;

use crate::domain::{Board, Card, Column};

pub struct CardStore;

impl CardStore {
    pub async fn find_board(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Board>, sqlx::Error> {
        sqlx::query_as("SELECT id, owner_id, name FROM boards WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_column(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Column>, sqlx::Error> {
        sqlx::query_as("SELECT id, board_id, name, position, wip_limit FROM columns WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_card(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Card>, sqlx::Error> {
        sqlx::query_as("SELECT id, column_id, title, rank, version, created_at, updated_at FROM cards WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Ranks of every card in the column except `exclude_card_id`.
    pub async fn other_ranks(
        conn: &mut SqliteConnection,
        column_id: &str,
        exclude_card_id: &str,
    ) -> Result<Vec<f64>, sqlx::Error> {
        sqlx::query_scalar("SELECT rank FROM cards WHERE column_id = ? AND id != ? ORDER BY rank ASC")
            .bind(column_id)
            .bind(exclude_card_id)
            .fetch_all(conn)
            .await
    }

    /// Cards of a column in display order. `created_at` breaks rank ties and
    /// `id` makes the order total.
    pub async fn list_column_ordered(
        conn: &mut SqliteConnection,
        column_id: &str,
    ) -> Result<Vec<Card>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, column_id, title, rank, version, created_at, updated_at FROM cards WHERE column_id = ? ORDER BY rank ASC, created_at ASC, id ASC",
        )
        .bind(column_id)
        .fetch_all(conn)
        .await
    }

    /// Current version of a card, provided it is still in `column_id`.
    pub async fn current_version(
        conn: &mut SqliteConnection,
        card_id: &str,
        column_id: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT version FROM cards WHERE id = ? AND column_id = ?")
            .bind(card_id)
            .bind(column_id)
            .fetch_optional(conn)
            .await
    }

    /// Compare-and-swap move. Returns rows affected: 1 on success, 0 when the
    /// card is gone or its version no longer equals `expected_version`.
    pub async fn move_if_current(
        conn: &mut SqliteConnection,
        card_id: &str,
        target_column_id: &str,
        rank: f64,
        expected_version: i64,
        now: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cards SET column_id = ?, rank = ?, version = (version + 1) % 4294967296, updated_at = ? WHERE id = ? AND version = ?",
        )
        .bind(target_column_id)
        .bind(rank)
        .bind(now)
        .bind(card_id)
        .bind(expected_version)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Compare-and-swap rank write used by the rebalancer. The row must still
    /// be in `column_id` and at `expected_version`.
    pub async fn set_rank_if_current(
        conn: &mut SqliteConnection,
        card_id: &str,
        column_id: &str,
        rank: f64,
        expected_version: i64,
        now: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cards SET rank = ?, version = (version + 1) % 4294967296, updated_at = ? WHERE id = ? AND column_id = ? AND version = ?",
        )
        .bind(rank)
        .bind(now)
        .bind(card_id)
        .bind(column_id)
        .bind(expected_version)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

/// SQLite reports lock contention between writers as BUSY/LOCKED (including
/// the extended BUSY_SNAPSHOT a WAL reader gets when it tries to write after
/// another connection committed). For a batch of conditional writes that is
/// the same outcome as a version mismatch.
pub fn is_write_contention(err: &sqlx::Error) -> bool {
    let Some(code) = err.as_database_error().and_then(|db| db.code()) else {
        return false;
    };

    match code.parse::<i32>() {
        Ok(code) => matches!(code & 0xFF, 5 | 6),
        Err(_) => false,
    }
}
