use serde::{Deserialize, Serialize};

use super::models::*;

/// Change-feed message broadcast to WebSocket subscribers after every
/// successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    BoardCreated {
        board: Board,
    },
    ListCreated {
        list: List,
    },
    ListUpdated {
        list: List,
    },
    ListDeleted {
        list_id: i64,
        board_id: i64,
    },
    ListsReordered {
        board_id: i64,
        list_ids: Vec<i64>,
    },
    CardCreated {
        card: Card,
    },
    CardUpdated {
        card: Card,
    },
    CardDeleted {
        card_id: i64,
        list_id: i64,
    },
    CardsReordered {
        list_id: i64,
        card_ids: Vec<i64>,
    },
    CardMoved {
        card_id: i64,
        source_list_id: i64,
        dest_list_id: i64,
        position: i32,
    },
    ChecklistsChanged {
        card_id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_moved_serialization() {
        let msg = BoardEvent::CardMoved {
            card_id: 5,
            source_list_id: 1,
            dest_list_id: 2,
            position: 0,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"CardMoved\""));
        assert!(json.contains("\"dest_list_id\":2"));
    }

    #[test]
    fn test_lists_reordered_roundtrip() {
        let msg = BoardEvent::ListsReordered {
            board_id: 1,
            list_ids: vec![3, 1, 2],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: BoardEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
