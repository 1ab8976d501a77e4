use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::CardSnapshot;

pub fn board_topic(board_id: &str) -> String {
    format!("Board_{board_id}")
}

pub fn rebalance_topic(board_id: &str) -> String {
    format!("BoardRebalance_{board_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoardEvent {
    CardMoved {
        card: CardSnapshot,
    },
    ColumnRebalanced {
        column_id: String,
        rebalanced_at: String,
    },
}

impl BoardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::CardMoved { .. } => "cardMoved",
            BoardEvent::ColumnRebalanced { .. } => "columnRebalanced",
        }
    }
}

/// What travels over the broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic: String,
    pub event: BoardEvent,
}

/// Fire-and-forget publisher. Nobody listening is normal and not an error.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<String>,
}

impl Notifier {
    pub fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn card_moved(&self, board_id: &str, card: &CardSnapshot) {
        self.publish(
            board_topic(board_id),
            BoardEvent::CardMoved { card: card.clone() },
        );
    }

    pub fn column_rebalanced(&self, board_id: &str, column_id: &str, at: DateTime<Utc>) {
        self.publish(
            rebalance_topic(board_id),
            BoardEvent::ColumnRebalanced {
                column_id: column_id.to_string(),
                rebalanced_at: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            },
        );
    }

    pub fn publish(&self, topic: String, event: BoardEvent) {
        let message = TopicMessage { topic, event };

        match serde_json::to_string(&message) {
            Ok(payload) => {
                if self.tx.send(payload).is_err() {
                    tracing::debug!(topic = message.topic.as_str(), "No subscribers, event dropped");
                }
            }
            Err(e) => {
                tracing::warn!(topic = message.topic.as_str(), "Failed to serialize event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> CardSnapshot {
        CardSnapshot {
            id: "card-1".into(),
            column_id: "col-1".into(),
            title: "Card".into(),
            rank: 1000.0,
            concurrency_token: "AQAAAA==".into(),
            created_at: "2026-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(board_topic("b1"), "Board_b1");
        assert_eq!(rebalance_topic("b1"), "BoardRebalance_b1");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let notifier = Notifier::new(tx);
        notifier.card_moved("b1", &snapshot());
    }

    #[test]
    fn test_card_moved_reaches_subscriber() {
        let (tx, _rx) = broadcast::channel(4);
        let notifier = Notifier::new(tx);
        let mut rx = notifier.subscribe();

        notifier.card_moved("b1", &snapshot());

        let payload = rx.try_recv().unwrap();
        let message: TopicMessage = serde_json::from_str(&payload).unwrap();
        assert_eq!(message.topic, "Board_b1");
        assert_eq!(message.event, BoardEvent::CardMoved { card: snapshot() });
    }

    #[test]
    fn test_event_wire_shape() {
        let event = BoardEvent::ColumnRebalanced {
            column_id: "col-1".into(),
            rebalanced_at: "2026-01-01T00:00:00.000000Z".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "columnRebalanced");
        assert_eq!(value["columnId"], "col-1");
        assert_eq!(value["rebalancedAt"], "2026-01-01T00:00:00.000000Z");
        assert_eq!(event.name(), "columnRebalanced");
    }
}
