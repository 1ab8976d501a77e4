pub mod cards;

pub use cards::{ColumnCardsResponse, MoveCardRequest};
