pub mod card;
pub mod error;
pub mod permission;
pub mod token;

pub use card::{Board, Card, CardSnapshot, Column};
pub use error::{Entity, KanbanError};
pub use token::ConcurrencyToken;
