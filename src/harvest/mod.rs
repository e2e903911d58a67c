//! Fan-out over channels and their paginated histories.

mod dispatcher;
mod walker;

pub use dispatcher::{Dispatcher, Harvest};
pub use walker::HistoryWalker;
