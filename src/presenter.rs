use tracing::warn;

use crate::api::ChatApi;
use crate::model::{CategoryKind, Ranking};
use crate::{AppError, Result};

/// Where rendered results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Slack { channel_id: String },
    Stdout,
}

struct Award {
    kind: CategoryKind,
    title: &'static str,
    unit: &'static str,
}

const AWARDS: [Award; 3] = [
    Award {
        kind: CategoryKind::Omoro,
        title: "*reacji_omoro award*",
        unit: "omoro",
    },
    Award {
        kind: CategoryKind::Variety,
        title: "*Most reacted award (variety)*",
        unit: "kinds",
    },
    Award {
        kind: CategoryKind::Amount,
        title: "*Most reacted award (amount)*",
        unit: "reactions",
    },
];

fn place(i: usize) -> String {
    match i {
        0 => "Winner".to_string(),
        1 => "Runner-up".to_string(),
        n => {
            let n = n + 1;
            let suffix = match (n % 10, n % 100) {
                (1, r) if r != 11 => "st",
                (2, r) if r != 12 => "nd",
                (3, r) if r != 13 => "rd",
                _ => "th",
            };
            format!("{n}{suffix} place")
        }
    }
}

/// `:name:` for Slack, the emoji itself when it is a standard shortcode and
/// the text is meant for a terminal.
fn reaction_label(name: &str, glyphs: bool) -> String {
    if glyphs {
        let base = name.split("::").next().unwrap_or(name);
        if let Some(emoji) = emojis::get_by_shortcode(base) {
            return format!("{} :{}:", emoji, name);
        }
    }
    format!(":{}:", name)
}

pub fn format_reactions(ranking: &Ranking, top: usize, glyphs: bool) -> String {
    let mut text = String::from("*Most used reactions!*\n");
    for (i, usage) in ranking.reactions.iter().take(top).enumerate() {
        text.push_str(&format!(
            "{}. {} : {} times\n",
            i + 1,
            reaction_label(&usage.name, glyphs),
            usage.count
        ));
    }
    text
}

pub fn format_summary(ranking: &Ranking) -> String {
    format!(
        "Active channels: {}\nMessages ranked: {}",
        ranking.stats.channels, ranking.stats.messages_ranked
    )
}

#[derive(Default)]
struct PostLog {
    attempted: usize,
    failures: Vec<String>,
}

impl PostLog {
    fn into_result(self) -> Result<()> {
        match self.failures.first() {
            None => Ok(()),
            Some(first) => Err(AppError::Post(format!(
                "{} of {} posts failed, first error: {}",
                self.failures.len(),
                self.attempted,
                first
            ))),
        }
    }
}

/// Posts a finished ranking. Individual failures are logged and do not stop
/// the remaining posts, but they are reported once everything was tried.
pub struct Presenter<'a> {
    api: &'a dyn ChatApi,
    target: Target,
    podium_size: usize,
    top_reactions: usize,
}

impl<'a> Presenter<'a> {
    pub fn new(
        api: &'a dyn ChatApi,
        target: Target,
        podium_size: usize,
        top_reactions: usize,
    ) -> Self {
        Self {
            api,
            target,
            podium_size,
            top_reactions,
        }
    }

    pub async fn present(&self, ranking: &Ranking) -> Result<()> {
        let mut log = PostLog::default();
        let glyphs = self.target == Target::Stdout;

        self.send(format_reactions(ranking, self.top_reactions, glyphs), &mut log)
            .await;
        self.send(format_summary(ranking), &mut log).await;

        for award in &AWARDS {
            self.send(award.title.to_string(), &mut log).await;
            for (i, nominee) in ranking
                .category
                .nominees(award.kind)
                .take(self.podium_size)
                .enumerate()
            {
                let link = match self
                    .api
                    .permalink(&nominee.message.channel_id, &nominee.message.ts)
                    .await
                {
                    Ok(url) => url,
                    Err(err) => {
                        warn!(
                            channel = %nominee.message.channel_id,
                            ts = %nominee.message.ts,
                            error = %err,
                            "failed to get permalink"
                        );
                        log.attempted += 1;
                        log.failures.push(err.to_string());
                        continue;
                    }
                };
                self.send(
                    format!("{}: {} {}\n{}\n", place(i), nominee.count, award.unit, link),
                    &mut log,
                )
                .await;
            }
        }

        log.into_result()
    }

    async fn send(&self, text: String, log: &mut PostLog) {
        log.attempted += 1;
        if let Err(err) = self.deliver(&text).await {
            warn!(error = %err, "failed to post message");
            log.failures.push(err.to_string());
        }
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        match &self.target {
            Target::Slack { channel_id } => self.api.post_message(channel_id, text).await,
            Target::Stdout => {
                println!("{}", text);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{FakeChatApi, message};
    use crate::model::{Category, Nominate, RankingStats, ReactionUsage, Slot};

    fn ranking() -> Ranking {
        let mut category = Category::default();
        category.amount[0] = Slot::Nominated(Nominate {
            count: 12,
            message: message("C1", "1700000000.000100", &[("eyes", 12)]),
        });
        category.amount[1] = Slot::Nominated(Nominate {
            count: 7,
            message: message("C2", "1700000001.000200", &[("eyes", 7)]),
        });
        Ranking {
            category,
            reactions: vec![
                ReactionUsage {
                    name: "eyes".to_string(),
                    count: 19,
                },
                ReactionUsage {
                    name: "kusa".to_string(),
                    count: 3,
                },
            ],
            stats: RankingStats {
                channels: 4,
                messages_harvested: 30,
                messages_ranked: 25,
                messages_out_of_window: 5,
            },
        }
    }

    #[test]
    fn test_place_labels() {
        assert_eq!(place(0), "Winner");
        assert_eq!(place(1), "Runner-up");
        assert_eq!(place(2), "3rd place");
        assert_eq!(place(3), "4th place");
        assert_eq!(place(10), "11th place");
        assert_eq!(place(20), "21st place");
    }

    #[test]
    fn test_format_reactions_limits_entries() {
        let text = format_reactions(&ranking(), 1, false);
        assert!(text.contains("1. :eyes: : 19 times"));
        assert!(!text.contains("kusa"));
    }

    #[test]
    fn test_format_reactions_with_glyphs() {
        let text = format_reactions(&ranking(), 10, true);
        assert!(text.contains("👀 :eyes:"));
        assert!(text.contains("2. :kusa: : 3 times"));
    }

    #[test]
    fn test_format_summary() {
        assert_eq!(
            format_summary(&ranking()),
            "Active channels: 4\nMessages ranked: 25"
        );
    }

    #[tokio::test]
    async fn test_present_posts_everything_in_order() {
        let api = FakeChatApi::new();
        let presenter = Presenter::new(
            &api,
            Target::Slack {
                channel_id: "CAWARD".to_string(),
            },
            3,
            10,
        );

        presenter.present(&ranking()).await.unwrap();

        let posts = api.posts.lock().unwrap();
        // reactions, summary, three titles, two amount nominees
        assert_eq!(posts.len(), 7);
        assert!(posts.iter().all(|(channel, _)| channel == "CAWARD"));
        assert!(posts[0].1.starts_with("*Most used reactions!*"));
        assert_eq!(posts[2].1, "*reacji_omoro award*");
        assert_eq!(posts[4].1, "*Most reacted award (amount)*");
        assert_eq!(
            posts[5].1,
            "Winner: 12 reactions\nhttps://example.slack.com/archives/C1/p1700000000000100\n"
        );
        assert!(posts[6].1.starts_with("Runner-up: 7 reactions"));
    }

    #[tokio::test]
    async fn test_present_reports_post_failures() {
        let api = FakeChatApi::new().with_failing_posts();
        let presenter = Presenter::new(
            &api,
            Target::Slack {
                channel_id: "CAWARD".to_string(),
            },
            3,
            10,
        );

        let result = presenter.present(&ranking()).await;

        match result {
            Err(AppError::Post(msg)) => assert!(msg.starts_with("7 of 7 posts failed")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_present_counts_skipped_nominees_as_attempted() {
        let api = FakeChatApi::new().with_failing_permalinks();
        let presenter = Presenter::new(
            &api,
            Target::Slack {
                channel_id: "CAWARD".to_string(),
            },
            3,
            10,
        );

        let result = presenter.present(&ranking()).await;

        // two nominees without a link, five posts delivered
        assert_eq!(api.posts.lock().unwrap().len(), 5);
        match result {
            Err(AppError::Post(msg)) => assert!(msg.starts_with("2 of 7 posts failed")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
