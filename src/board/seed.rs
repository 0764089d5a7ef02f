//! Demo board for fresh databases.

use chrono::{Duration, Utc};
use kanban_common::requests::{UpdateCardRequest, UpdateItemRequest};
use tracing::info;

use super::db::BoardDb;
use crate::errors::BoardResult;

const LABELS: &[(&str, &str)] = &[
    ("Bug", "#eb5a46"),
    ("Feature", "#61bd4f"),
    ("Enhancement", "#f2d600"),
    ("Documentation", "#00c2e0"),
    ("Design", "#c377e0"),
    ("Urgent", "#ff9f1a"),
];

const MEMBERS: &[(&str, &str, &str)] = &[
    ("John Doe", "john@example.com", "https://i.pravatar.cc/150?img=1"),
    ("Jane Smith", "jane@example.com", "https://i.pravatar.cc/150?img=5"),
    ("Mike Johnson", "mike@example.com", "https://i.pravatar.cc/150?img=12"),
    ("Sarah Williams", "sarah@example.com", "https://i.pravatar.cc/150?img=9"),
];

struct SeedCard {
    list: usize,
    title: &'static str,
    description: &'static str,
    due_in_days: Option<i64>,
    labels: &'static [usize],
    members: &'static [usize],
}

const LISTS: &[&str] = &["To Do", "In Progress", "Done"];

const CARDS: &[SeedCard] = &[
    SeedCard {
        list: 0,
        title: "Design landing page mockups",
        description: "Create high-fidelity mockups for the new landing page including desktop and mobile views.",
        due_in_days: Some(10),
        labels: &[4],
        members: &[3],
    },
    SeedCard {
        list: 0,
        title: "Set up CI/CD pipeline",
        description: "Configure automated testing and deployment.",
        due_in_days: None,
        labels: &[1],
        members: &[2],
    },
    SeedCard {
        list: 0,
        title: "Write API documentation",
        description: "Document all REST endpoints with request/response examples.",
        due_in_days: Some(5),
        labels: &[3],
        members: &[0],
    },
    SeedCard {
        list: 1,
        title: "Implement drag and drop functionality",
        description: "Support reordering lists and moving cards between lists.",
        due_in_days: Some(3),
        labels: &[1],
        members: &[0, 1],
    },
    SeedCard {
        list: 1,
        title: "Fix authentication bug",
        description: "Users are being logged out unexpectedly. Investigate and fix.",
        due_in_days: None,
        labels: &[0, 5],
        members: &[1],
    },
    SeedCard {
        list: 2,
        title: "Database schema design",
        description: "Design and implement the schema for all entities.",
        due_in_days: None,
        labels: &[],
        members: &[0],
    },
    SeedCard {
        list: 2,
        title: "Set up project repository",
        description: "Initialize the repository and configure project structure.",
        due_in_days: None,
        labels: &[],
        members: &[2],
    },
];

/// Checklist attached to the first "In Progress" card.
const CHECKLIST_CARD: usize = 3;
const CHECKLIST_TITLE: &str = "Implementation Steps";
const CHECKLIST_ITEMS: &[(&str, bool)] = &[
    ("Model drag results", true),
    ("Implement list drag and drop", true),
    ("Implement card drag and drop", false),
    ("Add animations", false),
    ("Test on mobile devices", false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded { board_id: i64 },
    AlreadySeeded { board_id: i64 },
}

impl SeedOutcome {
    pub fn board_id(&self) -> i64 {
        match *self {
            Self::Seeded { board_id } | Self::AlreadySeeded { board_id } => board_id,
        }
    }
}

impl BoardDb {
    /// Create the demo board, labels and members unless a board already
    /// exists.
    pub fn seed_demo(&mut self) -> BoardResult<SeedOutcome> {
        if let Some(existing) = self.list_boards()?.first() {
            info!(board_id = existing.id, "Database already seeded");
            return Ok(SeedOutcome::AlreadySeeded {
                board_id: existing.id,
            });
        }

        let mut label_ids = Vec::with_capacity(LABELS.len());
        for (name, color) in LABELS {
            label_ids.push(self.create_label(name, color)?.id);
        }
        let mut member_ids = Vec::with_capacity(MEMBERS.len());
        for (name, email, avatar) in MEMBERS {
            member_ids.push(self.create_member(name, email, Some(*avatar))?.id);
        }

        let board = self.create_board("Product Development")?;
        let mut list_ids = Vec::with_capacity(LISTS.len());
        for title in LISTS {
            list_ids.push(self.create_list(board.id, title)?.id);
        }

        let now = Utc::now();
        let mut card_ids = Vec::with_capacity(CARDS.len());
        for seed in CARDS {
            let card = self.create_card(list_ids[seed.list], seed.title, Some(seed.description))?;
            if let Some(days) = seed.due_in_days {
                self.update_card(
                    card.id,
                    &UpdateCardRequest {
                        due_date: Some(Some(now + Duration::days(days))),
                        ..Default::default()
                    },
                )?;
            }
            for &label in seed.labels {
                self.add_card_label(card.id, label_ids[label])?;
            }
            for &member in seed.members {
                self.add_card_member(card.id, member_ids[member])?;
            }
            card_ids.push(card.id);
        }

        let checklist = self.add_checklist(card_ids[CHECKLIST_CARD], CHECKLIST_TITLE)?;
        for (title, completed) in CHECKLIST_ITEMS {
            let item = self.add_item(checklist.id, title)?;
            if *completed {
                self.update_item(
                    item.id,
                    &UpdateItemRequest {
                        completed: Some(true),
                        ..Default::default()
                    },
                )?;
            }
        }

        info!(board_id = board.id, cards = card_ids.len(), "Seeded demo board");
        Ok(SeedOutcome::Seeded { board_id: board.id })
    }
}
