use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::model::{
    Category, CategoryKind, Message, Nominate, Ranking, RankingStats, ReactionUsage, Slot,
};
use crate::pool::{WorkQueue, lock, shutdown_workers};
use crate::window::Window;
use crate::Result;

/// Reaction names that count towards the funniest-message award.
#[derive(Debug, Clone, Default)]
pub struct FunnyReactions(HashSet<String>);

impl FunnyReactions {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scores {
    pub omoro: usize,
    pub variety: usize,
    pub amount: usize,
}

impl Scores {
    pub fn of(message: &Message, funny: &FunnyReactions) -> Self {
        message
            .reactions
            .iter()
            .fold(Scores::default(), |mut scores, reaction| {
                scores.amount += reaction.count;
                scores.variety += 1;
                if funny.contains(&reaction.name) {
                    scores.omoro += reaction.count;
                }
                scores
            })
    }

    pub fn get(&self, kind: CategoryKind) -> usize {
        match kind {
            CategoryKind::Omoro => self.omoro,
            CategoryKind::Variety => self.variety,
            CategoryKind::Amount => self.amount,
        }
    }
}

#[derive(Default)]
struct Board {
    category: Category,
    tally: HashMap<String, usize>,
    ranked: usize,
    out_of_window: usize,
}

/// Folds messages into the three nominee lists and the reaction tally.
///
/// All shared state sits behind one lock, taken once per message, so the
/// tally update and the three tail comparisons happen as a single step.
pub struct RankingAggregator {
    window: Window,
    funny: FunnyReactions,
    board: Mutex<Board>,
}

impl RankingAggregator {
    pub fn new(window: Window, funny: FunnyReactions) -> Self {
        Self {
            window,
            funny,
            board: Mutex::new(Board::default()),
        }
    }

    /// Whether `message` is inside the window. Rejections are counted.
    pub fn admit(&self, message: &Message) -> bool {
        if self.window.admits(&message.ts) {
            return true;
        }
        lock(&self.board).out_of_window += 1;
        false
    }

    /// Score one message. Returns false when it falls before the window.
    pub fn observe(&self, message: &Message) -> bool {
        if !self.window.admits(&message.ts) {
            return false;
        }
        let scores = Scores::of(message, &self.funny);

        let mut board = lock(&self.board);
        for reaction in &message.reactions {
            *board.tally.entry(reaction.name.clone()).or_default() += reaction.count;
        }
        for kind in CategoryKind::ALL {
            nominate(board.category.get_mut(kind), scores.get(kind), message);
        }
        board.ranked += 1;
        true
    }

    /// Snapshot of the current standings with the tally sorted by use.
    pub fn ranking(&self) -> Ranking {
        let board = lock(&self.board);
        let mut reactions: Vec<ReactionUsage> = board
            .tally
            .iter()
            .map(|(name, count)| ReactionUsage {
                name: name.clone(),
                count: *count,
            })
            .collect();
        reactions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        Ranking {
            category: board.category.clone(),
            reactions,
            stats: RankingStats {
                messages_ranked: board.ranked,
                messages_out_of_window: board.out_of_window,
                ..RankingStats::default()
            },
        }
    }
}

/// Replace the last slot when `count` beats it, then restore descending
/// order. The sort is stable, so earlier nominees keep their place on ties.
fn nominate(slots: &mut [Slot], count: usize, message: &Message) -> bool {
    if count == 0 {
        return false;
    }
    let Some(last) = slots.last_mut() else {
        return false;
    };
    if Some(count) <= last.score() {
        return false;
    }
    *last = Slot::Nominated(Nominate {
        count,
        message: message.clone(),
    });
    slots.sort_by(|a, b| b.score().cmp(&a.score()));
    true
}

/// Rank `messages` on `workers` parallel workers.
pub async fn rank_messages(
    messages: Vec<Message>,
    aggregator: Arc<RankingAggregator>,
    workers: usize,
) -> Result<Ranking> {
    let harvested = messages.len();
    let queue: WorkQueue<Message> = WorkQueue::bounded(workers.max(1) * 10);
    let pool = {
        let aggregator = Arc::clone(&aggregator);
        queue.spawn_workers(workers, move |message: Message| {
            let aggregator = Arc::clone(&aggregator);
            async move {
                aggregator.observe(&message);
            }
        })
    };

    for message in messages {
        if !aggregator.admit(&message) {
            continue;
        }
        queue.push(message).await?;
    }
    queue.drained().await;
    shutdown_workers(pool).await?;

    let mut ranking = aggregator.ranking();
    ranking.stats.messages_harvested = harvested;
    info!(
        harvested,
        ranked = ranking.stats.messages_ranked,
        out_of_window = ranking.stats.messages_out_of_window,
        reactions = ranking.reactions.len(),
        "ranking done"
    );
    Ok(ranking)
}
