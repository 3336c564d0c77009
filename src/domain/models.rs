// Domain models shared by the progress store, the achievement engine and the API.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOTAL_LESSONS: u32 = 8;

/// One-based lesson number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonId(pub u32);

impl LessonId {
    pub const FIRST: LessonId = LessonId(1);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn previous(self) -> Option<LessonId> {
        (self.0 > 1).then(|| LessonId(self.0 - 1))
    }

    pub fn next(self) -> LessonId {
        LessonId(self.0.saturating_add(1))
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed lesson sequence. Lesson k requires lesson k-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Course {
    pub total_lessons: u32,
}

impl Default for Course {
    fn default() -> Self {
        Course {
            total_lessons: DEFAULT_TOTAL_LESSONS,
        }
    }
}

impl Course {
    #[cfg(test)]
    pub fn new(total_lessons: u32) -> Self {
        Course { total_lessons }
    }

    pub fn contains(&self, lesson: LessonId) -> bool {
        (1..=self.total_lessons).contains(&lesson.0)
    }

    pub fn last(&self) -> LessonId {
        LessonId(self.total_lessons)
    }

    pub fn lessons(&self) -> impl Iterator<Item = LessonId> {
        (1..=self.total_lessons).map(LessonId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub current_lesson: LessonId,
    pub completed_lessons: BTreeSet<LessonId>,
    pub last_accessed_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        ProgressRecord {
            current_lesson: LessonId::FIRST,
            completed_lessons: BTreeSet::new(),
            last_accessed_at: now,
        }
    }

    pub fn is_completed(&self, lesson: LessonId) -> bool {
        self.completed_lessons.contains(&lesson)
    }
}

/// Outcome of one quiz submission. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total_questions: u32,
    pub passed: bool,
}

impl QuizResult {
    /// Grades a submission: passing needs at least `pass_percent` of the
    /// questions, rounded up. An empty quiz never passes.
    pub fn graded(score: u32, total_questions: u32, pass_percent: u32) -> Self {
        let needed = (u64::from(total_questions) * u64::from(pass_percent)).div_ceil(100);
        QuizResult {
            score,
            total_questions,
            passed: total_questions > 0 && u64::from(score) >= needed,
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.score == self.total_questions
    }
}

/// Predicate deciding when an achievement unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockRule {
    CompletedAtLeast(usize),
    QuizPassed,
    QuizPerfect,
}

impl UnlockRule {
    pub fn is_met(&self, completed: &BTreeSet<LessonId>, quiz: Option<&QuizResult>) -> bool {
        match self {
            UnlockRule::CompletedAtLeast(n) => completed.len() >= *n,
            // a quiz without questions is never eligible, whatever its flag says
            UnlockRule::QuizPassed => quiz.is_some_and(|q| q.total_questions > 0 && q.passed),
            UnlockRule::QuizPerfect => quiz.is_some_and(QuizResult::is_perfect),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub rule: UnlockRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementUnlockRecord {
    pub achievement_id: &'static str,
    pub unlocked_at: DateTime<Utc>,
}

/// Why a navigation request was refused. Refusals are no-ops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationRejection {
    OutOfRange,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Moved(ProgressRecord),
    Rejected(NavigationRejection),
}
