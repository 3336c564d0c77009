use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{
    AchievementDefinition, AchievementUnlockRecord, LessonId, QuizResult, UnlockRule,
};
use crate::storage::{Persistence, Stored};

pub const ACHIEVEMENTS_KEY: &str = "course-achievements";

/// Rule catalog, evaluated in this order.
pub const CATALOG: &[AchievementDefinition] = &[
    AchievementDefinition {
        id: "first-lesson",
        title: "First Steps",
        description: "Complete your first lesson",
        icon: "🎯",
        rule: UnlockRule::CompletedAtLeast(1),
    },
    AchievementDefinition {
        id: "halfway-there",
        title: "Halfway There",
        description: "Complete 4 out of 8 lessons",
        icon: "⚡",
        rule: UnlockRule::CompletedAtLeast(4),
    },
    AchievementDefinition {
        id: "course-complete",
        title: "Course Master",
        description: "Complete all 8 lessons",
        icon: "🏆",
        rule: UnlockRule::CompletedAtLeast(8),
    },
    AchievementDefinition {
        id: "quiz-passed",
        title: "Quiz Warrior",
        description: "Pass the quiz with 60% or higher",
        icon: "✅",
        rule: UnlockRule::QuizPassed,
    },
    AchievementDefinition {
        id: "quiz-master",
        title: "Quiz Master",
        description: "Get a perfect score (100%) on the quiz",
        icon: "🌟",
        rule: UnlockRule::QuizPerfect,
    },
];

/// Wire shape of one `course-achievements` element: the catalog entry with
/// its unlock state inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AchievementEntry {
    id: String,
    title: String,
    description: String,
    icon: String,
    unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementStatus {
    pub definition: &'static AchievementDefinition,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl AchievementStatus {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

pub struct AchievementEngine {
    catalog: &'static [AchievementDefinition],
    persistence: Arc<Persistence>,
    unlocks: Vec<AchievementUnlockRecord>,
}

impl AchievementEngine {
    pub fn new(persistence: Arc<Persistence>) -> Self {
        Self::with_catalog(CATALOG, persistence)
    }

    pub fn with_catalog(
        catalog: &'static [AchievementDefinition],
        persistence: Arc<Persistence>,
    ) -> Self {
        Self {
            catalog,
            persistence,
            unlocks: Vec::new(),
        }
    }

    /// Restores unlock records. Titles and descriptions always come from the
    /// catalog; persisted ids the catalog does not know are dropped.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load(&mut self) {
        self.unlocks.clear();
        let entries = match self
            .persistence
            .read_json::<Vec<AchievementEntry>>(ACHIEVEMENTS_KEY)
            .await
        {
            Stored::Present(entries) => entries,
            Stored::Absent => return,
            Stored::Malformed(e) => {
                tracing::warn!(error = %e, "discarding persisted achievements");
                return;
            }
        };

        let now = Utc::now();
        for definition in self.catalog {
            let saved = entries
                .iter()
                .find(|entry| entry.id == definition.id && entry.unlocked);
            if let Some(entry) = saved {
                self.unlocks.push(AchievementUnlockRecord {
                    achievement_id: definition.id,
                    unlocked_at: entry.unlocked_at.unwrap_or(now),
                });
            }
        }
        tracing::debug!(unlocked = self.unlocks.len(), "achievements restored");
    }

    pub fn is_unlocked(&self, achievement_id: &str) -> bool {
        self.unlocks
            .iter()
            .any(|record| record.achievement_id == achievement_id)
    }

    fn unlocked_at(&self, achievement_id: &str) -> Option<DateTime<Utc>> {
        self.unlocks
            .iter()
            .find(|record| record.achievement_id == achievement_id)
            .map(|record| record.unlocked_at)
    }

    #[cfg(test)]
    pub fn unlock_records(&self) -> &[AchievementUnlockRecord] {
        &self.unlocks
    }

    pub fn achievements(&self) -> Vec<AchievementStatus> {
        self.catalog
            .iter()
            .map(|definition| AchievementStatus {
                definition,
                unlocked_at: self.unlocked_at(definition.id),
            })
            .collect()
    }

    /// Unlocks every catalog entry whose rule now holds and returns the newly
    /// unlocked ones in catalog order. Already unlocked entries are never
    /// returned again.
    #[tracing::instrument(level = "debug", skip(self, completed))]
    pub async fn evaluate(
        &mut self,
        completed: &BTreeSet<LessonId>,
        quiz: Option<&QuizResult>,
    ) -> Vec<AchievementDefinition> {
        let now = Utc::now();
        let mut newly_unlocked = Vec::new();
        for definition in self.catalog {
            if self.is_unlocked(definition.id) || !definition.rule.is_met(completed, quiz) {
                continue;
            }
            self.unlocks.push(AchievementUnlockRecord {
                achievement_id: definition.id,
                unlocked_at: now,
            });
            tracing::info!(achievement = definition.id, "achievement unlocked");
            newly_unlocked.push(definition.clone());
        }

        if !newly_unlocked.is_empty() {
            self.persist().await;
        }
        newly_unlocked
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn reset(&mut self) {
        self.unlocks.clear();
        self.persist().await;
        tracing::info!("achievements reset");
    }

    async fn persist(&self) {
        let entries: Vec<AchievementEntry> = self
            .achievements()
            .into_iter()
            .map(|status| AchievementEntry {
                id: status.definition.id.to_string(),
                title: status.definition.title.to_string(),
                description: status.definition.description.to_string(),
                icon: status.definition.icon.to_string(),
                unlocked: status.is_unlocked(),
                unlocked_at: status.unlocked_at,
            })
            .collect();
        self.persistence.write_json(ACHIEVEMENTS_KEY, &entries).await;
    }
}
