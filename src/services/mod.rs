pub mod gap_analyzer;
pub mod move_orchestrator;
pub mod notifier;
pub mod rebalancer;

pub use gap_analyzer::{GapAnalyzer, GapVerdict};
pub use move_orchestrator::{MoveCommand, MoveOrchestrator};
pub use notifier::{BoardEvent, Notifier, TopicMessage};
pub use rebalancer::{RebalancePhase, RebalanceReport, Rebalancer};
