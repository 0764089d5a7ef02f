use kanban_common::{Board, BoardView, Card, CardView, List, ListView};

pub const BOARD: i64 = 1;
pub const LIST_A: i64 = 10;
pub const LIST_B: i64 = 20;
pub const X: i64 = 1;
pub const Y: i64 = 2;
pub const Z: i64 = 3;
pub const M: i64 = 4;
pub const N: i64 = 5;

fn card(id: i64, list_id: i64, position: i32) -> CardView {
    CardView {
        card: Card {
            id,
            list_id,
            title: format!("Card {}", id),
            description: String::new(),
            due_date: None,
            archived: false,
            position,
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
        },
        labels: vec![],
        members: vec![],
        checklists: vec![],
    }
}

fn list(id: i64, position: i32, cards: &[i64]) -> ListView {
    ListView {
        list: List {
            id,
            board_id: BOARD,
            title: format!("List {}", id),
            position,
            created_at: "2024-01-01 00:00:00".to_string(),
        },
        cards: cards
            .iter()
            .enumerate()
            .map(|(i, &c)| card(c, id, i as i32))
            .collect(),
    }
}

/// Board 1 with A = [X, Y, Z] and B = [M, N].
pub fn board_fixture() -> BoardView {
    BoardView {
        board: Board {
            id: BOARD,
            title: "Test Board".to_string(),
            created_at: "2024-01-01 00:00:00".to_string(),
        },
        lists: vec![list(LIST_A, 0, &[X, Y, Z]), list(LIST_B, 1, &[M, N])],
    }
}

pub fn card_ids(board: &BoardView, list_id: i64) -> Vec<i64> {
    board.list(list_id).map(|l| l.card_ids()).unwrap_or_default()
}
