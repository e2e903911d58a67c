use serde::Serialize;

use crate::window::Timestamp;

/// Number of nominees kept per category.
pub const NOMINATE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reaction {
    pub name: String,
    /// Number of users who applied it.
    pub count: usize,
    /// Display names of those users.
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub channel_id: String,
    pub contributor: String,
    pub text: String,
    pub ts: Timestamp,
    pub reactions: Vec<Reaction>,
    pub reaction_count: usize,
}

impl Message {
    pub fn new(
        channel_id: impl Into<String>,
        contributor: impl Into<String>,
        text: impl Into<String>,
        ts: Timestamp,
        reactions: Vec<Reaction>,
    ) -> Self {
        let reaction_count = reactions.iter().map(|r| r.count).sum();
        Self {
            channel_id: channel_id.into(),
            contributor: contributor.into(),
            text: text.into(),
            ts,
            reactions,
            reaction_count,
        }
    }
}

/// A scored contender for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nominate {
    pub count: usize,
    pub message: Message,
}

/// One position of a category list. `Vacant` ranks below every nominee.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Slot {
    Vacant,
    Nominated(Nominate),
}

impl Slot {
    pub fn score(&self) -> Option<usize> {
        match self {
            Slot::Vacant => None,
            Slot::Nominated(n) => Some(n.count),
        }
    }

    pub fn nominee(&self) -> Option<&Nominate> {
        match self {
            Slot::Vacant => None,
            Slot::Nominated(n) => Some(n),
        }
    }
}

/// The three independent scoring dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Omoro,
    Variety,
    Amount,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 3] = [
        CategoryKind::Omoro,
        CategoryKind::Variety,
        CategoryKind::Amount,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub omoro: Vec<Slot>,
    pub variety: Vec<Slot>,
    pub amount: Vec<Slot>,
}

impl Default for Category {
    fn default() -> Self {
        Self {
            omoro: vec![Slot::Vacant; NOMINATE_SIZE],
            variety: vec![Slot::Vacant; NOMINATE_SIZE],
            amount: vec![Slot::Vacant; NOMINATE_SIZE],
        }
    }
}

impl Category {
    pub fn get(&self, kind: CategoryKind) -> &[Slot] {
        match kind {
            CategoryKind::Omoro => &self.omoro,
            CategoryKind::Variety => &self.variety,
            CategoryKind::Amount => &self.amount,
        }
    }

    pub fn get_mut(&mut self, kind: CategoryKind) -> &mut Vec<Slot> {
        match kind {
            CategoryKind::Omoro => &mut self.omoro,
            CategoryKind::Variety => &mut self.variety,
            CategoryKind::Amount => &mut self.amount,
        }
    }

    /// Nominees of `kind` in rank order, vacant slots skipped.
    pub fn nominees(&self, kind: CategoryKind) -> impl Iterator<Item = &Nominate> {
        self.get(kind).iter().filter_map(Slot::nominee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionUsage {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankingStats {
    pub channels: usize,
    pub messages_harvested: usize,
    pub messages_ranked: usize,
    pub messages_out_of_window: usize,
}

/// Final result of one run. Never mutated after it is assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub category: Category,
    pub reactions: Vec<ReactionUsage>,
    pub stats: RankingStats,
}
