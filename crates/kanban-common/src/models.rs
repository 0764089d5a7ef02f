use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct List {
    pub id: i64,
    pub board_id: i64,
    pub title: String,
    pub position: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub archived: bool,
    pub position: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checklist {
    pub id: i64,
    pub card_id: i64,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub id: i64,
    pub checklist_id: i64,
    pub title: String,
    pub completed: bool,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

// Aggregate view types

/// A board with every list, active card, checklist and item in position order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub lists: Vec<ListView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListView {
    #[serde(flatten)]
    pub list: List,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardView {
    #[serde(flatten)]
    pub card: Card,
    pub labels: Vec<Label>,
    pub members: Vec<Member>,
    pub checklists: Vec<ChecklistView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistView {
    #[serde(flatten)]
    pub checklist: Checklist,
    pub items: Vec<ChecklistItem>,
}

/// A card returned by search and filter, with the list it lives in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardMatch {
    #[serde(flatten)]
    pub card: Card,
    pub list: List,
    pub labels: Vec<Label>,
    pub members: Vec<Member>,
}

impl BoardView {
    pub fn list(&self, list_id: i64) -> Option<&ListView> {
        self.lists.iter().find(|l| l.list.id == list_id)
    }

    pub fn list_ids(&self) -> Vec<i64> {
        self.lists.iter().map(|l| l.list.id).collect()
    }
}

impl ListView {
    pub fn card_ids(&self) -> Vec<i64> {
        self.cards.iter().map(|c| c.card.id).collect()
    }
}

/// Due-date window used when filtering cards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DueWindow {
    /// Due strictly before now.
    Overdue,
    /// Due within the next 24 hours.
    Today,
    /// Due within the next 7 days.
    Week,
}

impl DueWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Today => "today",
            Self::Week => "week",
        }
    }

    /// Whether `due` falls inside this window relative to `now`.
    pub fn contains(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Overdue => due < now,
            Self::Today => due >= now && due < now + Duration::days(1),
            Self::Week => due >= now && due < now + Duration::days(7),
        }
    }
}

impl FromStr for DueWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overdue" => Ok(Self::Overdue),
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            _ => Err(format!("Invalid due window: {}", s)),
        }
    }
}

impl fmt::Display for DueWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
