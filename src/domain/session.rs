use std::{collections::VecDeque, sync::Arc};

use chrono::Duration;

use super::{
    achievements::{AchievementEngine, AchievementStatus},
    models::{
        AchievementDefinition, Course, LessonId, NavigationOutcome, NavigationRejection,
        ProgressRecord, QuizResult,
    },
    progress::{LoadOutcome, ProgressStore},
    router,
};
use crate::storage::Persistence;

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub resume_window: Duration,
    pub quiz_pass_percent: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            resume_window: Duration::days(30),
            quiz_pass_percent: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub record: ProgressRecord,
    pub unlocked: Vec<AchievementDefinition>,
}

/// One learner's course state: progress, achievements and the queue of
/// unlock notifications not yet shown.
pub struct CourseSession {
    progress: ProgressStore,
    achievements: AchievementEngine,
    persistence: Arc<Persistence>,
    settings: SessionSettings,
    notifications: VecDeque<AchievementDefinition>,
}

impl CourseSession {
    #[tracing::instrument(level = "debug", skip(persistence))]
    pub async fn open(
        course: Course,
        persistence: Arc<Persistence>,
        settings: SessionSettings,
    ) -> (Self, LoadOutcome) {
        let mut progress = ProgressStore::new(course, persistence.clone(), settings.resume_window);
        let mut achievements = AchievementEngine::new(persistence.clone());
        let outcome = progress.load().await;
        achievements.load().await;
        let session = CourseSession {
            progress,
            achievements,
            persistence,
            settings,
            notifications: VecDeque::new(),
        };
        (session, outcome)
    }

    pub fn course(&self) -> &Course {
        self.progress.course()
    }

    pub fn record(&self) -> &ProgressRecord {
        self.progress.record()
    }

    pub fn percentage(&self) -> u8 {
        self.progress.percentage()
    }

    pub fn storage_available(&self) -> bool {
        self.persistence.is_available()
    }

    pub fn can_advance(&self, lesson: LessonId) -> bool {
        self.course().contains(lesson) && router::can_advance(self.record(), lesson)
    }

    /// Moves to `lesson` if it exists and, when moving forward, is unlocked.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn go_to(&mut self, lesson: LessonId) -> NavigationOutcome {
        if let Err(rejection) = router::check_navigation(self.course(), self.record(), lesson) {
            tracing::debug!(%lesson, ?rejection, "navigation rejected");
            return NavigationOutcome::Rejected(rejection);
        }
        NavigationOutcome::Moved(self.progress.navigate_to(lesson).await)
    }

    pub async fn next_lesson(&mut self) -> NavigationOutcome {
        let next = self.record().current_lesson.next();
        self.go_to(next).await
    }

    pub async fn previous_lesson(&mut self) -> NavigationOutcome {
        match self.record().current_lesson.previous() {
            Some(previous) => self.go_to(previous).await,
            None => NavigationOutcome::Rejected(NavigationRejection::OutOfRange),
        }
    }

    /// Marks `lesson` done, persists, then evaluates achievements against the
    /// saved state. `None` when the lesson is not part of the course.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn complete_lesson(&mut self, lesson: LessonId) -> Option<CompletionOutcome> {
        if !self.course().contains(lesson) {
            return None;
        }
        let record = self.progress.mark_completed(lesson).await;
        let unlocked = self
            .achievements
            .evaluate(&record.completed_lessons, None)
            .await;
        self.notifications.extend(unlocked.iter().cloned());
        Some(CompletionOutcome { record, unlocked })
    }

    pub fn grade_quiz(&self, score: u32, total_questions: u32) -> QuizResult {
        QuizResult::graded(score, total_questions, self.settings.quiz_pass_percent)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn submit_quiz(&mut self, result: QuizResult) -> Vec<AchievementDefinition> {
        let completed = self.record().completed_lessons.clone();
        let unlocked = self.achievements.evaluate(&completed, Some(&result)).await;
        self.notifications.extend(unlocked.iter().cloned());
        unlocked
    }

    pub fn achievements(&self) -> Vec<AchievementStatus> {
        self.achievements.achievements()
    }

    #[cfg(test)]
    pub fn is_unlocked(&self, achievement_id: &str) -> bool {
        self.achievements.is_unlocked(achievement_id)
    }

    /// Oldest unlock not yet handed to the notification display.
    pub fn next_notification(&mut self) -> Option<AchievementDefinition> {
        self.notifications.pop_front()
    }

    #[cfg(test)]
    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn reset(&mut self) -> ProgressRecord {
        self.notifications.clear();
        self.achievements.reset().await;
        self.progress.reset().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::BrokenStore;

    async fn session_on(persistence: Arc<Persistence>) -> CourseSession {
        CourseSession::open(Course::default(), persistence, SessionSettings::default())
            .await
            .0
    }

    #[tokio::test]
    async fn forward_navigation_is_gated_on_completion() {
        let mut session = session_on(Arc::new(Persistence::in_memory())).await;

        assert_eq!(
            session.go_to(LessonId(3)).await,
            NavigationOutcome::Rejected(NavigationRejection::Locked)
        );
        assert_eq!(
            session.next_lesson().await,
            NavigationOutcome::Rejected(NavigationRejection::Locked)
        );

        session.complete_lesson(LessonId(1)).await;
        assert!(matches!(
            session.next_lesson().await,
            NavigationOutcome::Moved(r) if r.current_lesson == LessonId(2)
        ));
        assert!(matches!(
            session.previous_lesson().await,
            NavigationOutcome::Moved(r) if r.current_lesson == LessonId(1)
        ));
        assert_eq!(
            session.previous_lesson().await,
            NavigationOutcome::Rejected(NavigationRejection::OutOfRange)
        );
    }

    #[tokio::test]
    async fn completion_queues_notifications_in_order() {
        let mut session = session_on(Arc::new(Persistence::in_memory())).await;
        for lesson in 1..=3 {
            session.complete_lesson(LessonId(lesson)).await;
        }
        let outcome = session.complete_lesson(LessonId(4)).await.unwrap();
        assert_eq!(outcome.unlocked.len(), 1);
        assert_eq!(outcome.unlocked[0].id, "halfway-there");

        let quiz = session.grade_quiz(6, 6);
        session.submit_quiz(quiz).await;

        let queued: Vec<_> = std::iter::from_fn(|| session.next_notification())
            .map(|a| a.id)
            .collect();
        assert_eq!(queued, vec!["first-lesson", "halfway-there", "quiz-passed", "quiz-master"]);
        assert_eq!(session.pending_notifications(), 0);
    }

    #[tokio::test]
    async fn completing_unknown_lesson_is_ignored() {
        let mut session = session_on(Arc::new(Persistence::in_memory())).await;
        assert_eq!(session.complete_lesson(LessonId(12)).await, None);
        assert!(session.record().completed_lessons.is_empty());
        assert_eq!(session.pending_notifications(), 0);
    }

    #[tokio::test]
    async fn state_is_restored_when_reopened() {
        let persistence = Arc::new(Persistence::in_memory());
        let mut session = session_on(persistence.clone()).await;
        for lesson in 1..=4 {
            session.complete_lesson(LessonId(lesson)).await;
            session.next_lesson().await;
        }

        let (reopened, outcome) =
            CourseSession::open(Course::default(), persistence, SessionSettings::default()).await;
        assert!(!outcome.cold_start);
        assert_eq!(reopened.record().current_lesson, LessonId(5));
        assert_eq!(reopened.percentage(), 1 + 15 + 14 + 14);
        assert!(reopened.is_unlocked("halfway-there"));
        assert_eq!(reopened.pending_notifications(), 0);
    }

    #[tokio::test]
    async fn reset_clears_progress_achievements_and_queue() {
        let mut session = session_on(Arc::new(Persistence::in_memory())).await;
        session.complete_lesson(LessonId(1)).await;

        let record = session.reset().await;
        assert!(record.completed_lessons.is_empty());
        assert!(!session.is_unlocked("first-lesson"));
        assert_eq!(session.next_notification(), None);
    }

    #[tokio::test]
    async fn degraded_storage_still_unlocks() {
        let mut session = session_on(Arc::new(Persistence::new(Arc::new(BrokenStore)))).await;
        assert!(!session.storage_available());

        let outcome = session.complete_lesson(LessonId(1)).await.unwrap();
        assert_eq!(outcome.unlocked[0].id, "first-lesson");
        assert_eq!(session.percentage(), 1);
    }
}
