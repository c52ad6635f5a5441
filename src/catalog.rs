//! Static catalogs: challenge categories, achievements, milestones, levels.
//!
//! Loaded once at startup and never mutated. The builtin set matches the
//! production bot; CATALOG_PATH swaps in a JSON file with the same shape.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub challenges: Vec<String>,
}

/// Unlock condition, evaluated by exhaustive match over a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    StreakAtLeast { n: u32 },
    TotalAtLeast { n: u32 },
    DistinctCategoriesAtLeast { n: u32 },
    CategoryCountAtLeast { category: String, n: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub reward: i64,
    pub condition: Condition,
}

/// Celebratory message keyed to an exact streak or total value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub value: u32,
    pub message: String,
}

/// Level name unlocked at a total-completed threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub threshold: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub achievements: Vec<Achievement>,
    pub streak_milestones: Vec<Milestone>,
    pub total_milestones: Vec<Milestone>,
    pub levels: Vec<Level>,
}

impl Catalog {
    pub fn load(cfg: &Config) -> Result<Self> {
        match &cfg.catalog_path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("read catalog {}", path))?;
        let cat: Catalog = serde_json::from_str(&raw).with_context(|| format!("parse catalog {}", path))?;
        Ok(cat)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn builtin() -> Self {
        let cat = |id: &str, name: &str, challenges: &[&str]| Category {
            id: id.to_string(),
            name: name.to_string(),
            challenges: challenges.iter().map(|c| c.to_string()).collect(),
        };
        let ach = |id: &str, name: &str, reward: i64, condition: Condition| Achievement {
            id: id.to_string(),
            name: name.to_string(),
            reward,
            condition,
        };
        let ms = |value: u32, message: &str| Milestone { value, message: message.to_string() };

        Self {
            categories: vec![
                cat("sport", "Sport", &[
                    "Do 20 squats",
                    "Take a 15 minute walk outside",
                    "Hold a one minute plank",
                    "Stretch for 10 minutes",
                    "Do 15 push-ups",
                    "Climb stairs instead of taking the elevator all day",
                    "Do a 7 minute full-body workout",
                ]),
                cat("thinking", "Thinking", &[
                    "Solve one logic puzzle",
                    "Read 10 pages of a non-fiction book",
                    "Write down three ideas to improve your day",
                    "Learn five words in a foreign language",
                    "Do mental arithmetic for 5 minutes",
                    "Summarize an article in three sentences",
                ]),
                cat("creative", "Creative", &[
                    "Sketch anything for 10 minutes",
                    "Write a four-line poem",
                    "Take five photos of one object from different angles",
                    "Invent an alternative ending to a film you know",
                    "Doodle with your non-dominant hand for 5 minutes",
                    "Describe your day in exactly 50 words",
                ]),
                cat("communication", "Communication", &[
                    "Message an old friend you have not spoken to in a month",
                    "Give a sincere compliment to someone",
                    "Ask a colleague about their hobby",
                    "Call a relative instead of texting",
                    "Thank someone who helped you recently",
                    "Start a conversation with a stranger",
                ]),
            ],
            achievements: vec![
                ach("first_step", "First Step", 10, Condition::TotalAtLeast { n: 1 }),
                ach("ten_done", "Getting Going", 30, Condition::TotalAtLeast { n: 10 }),
                ach("fifty_done", "Habit Machine", 100, Condition::TotalAtLeast { n: 50 }),
                ach("hundred_done", "Centurion", 250, Condition::TotalAtLeast { n: 100 }),
                ach("week_streak", "One Week Strong", 50, Condition::StreakAtLeast { n: 7 }),
                ach("month_streak", "Iron Month", 200, Condition::StreakAtLeast { n: 30 }),
                ach("all_rounder", "All-Rounder", 40, Condition::DistinctCategoriesAtLeast { n: 4 }),
                ach("sport_fan", "Sport Fan", 60, Condition::CategoryCountAtLeast { category: "sport".to_string(), n: 10 }),
                ach("deep_thinker", "Deep Thinker", 60, Condition::CategoryCountAtLeast { category: "thinking".to_string(), n: 10 }),
                ach("maker", "Maker", 60, Condition::CategoryCountAtLeast { category: "creative".to_string(), n: 10 }),
                ach("connector", "Connector", 60, Condition::CategoryCountAtLeast { category: "communication".to_string(), n: 10 }),
            ],
            streak_milestones: vec![
                ms(3, "Three days in a row! The habit is taking root."),
                ms(6, "Six straight days! Momentum is on your side."),
                ms(7, "A full week! This is how habits are built."),
                ms(14, "Two weeks without a miss. Seriously impressive."),
                ms(30, "Thirty days! You have built a real habit."),
                ms(100, "One hundred days. You are unstoppable."),
            ],
            total_milestones: vec![
                ms(10, "Ten challenges done overall!"),
                ms(21, "Twenty-one completions. They say that is when it sticks."),
                ms(50, "Fifty challenges behind you!"),
                ms(100, "One hundred completions. A collector of good days."),
            ],
            levels: vec![
                Level { threshold: 0, name: "Sprout".to_string() },
                Level { threshold: 5, name: "Apprentice".to_string() },
                Level { threshold: 15, name: "Practitioner".to_string() },
                Level { threshold: 40, name: "Veteran".to_string() },
                Level { threshold: 100, name: "Master".to_string() },
            ],
        }
    }
}
