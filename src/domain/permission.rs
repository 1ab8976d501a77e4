//! Authorization predicates over already-loaded entities. No I/O.

use super::card::{Board, Column};

pub fn is_owner(board: &Board, requester_id: &str) -> bool {
    board.owner_id == requester_id
}

/// Silo check: a card may only move between columns of one board.
pub fn same_board(a: &Column, b: &Column) -> bool {
    a.board_id == b.board_id
}
