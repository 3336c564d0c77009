use std::sync::Arc;

use poem_openapi::{
    OpenApi,
    param::Path,
    payload::{Json, PlainText},
};
use tokio::sync::Mutex;

use super::models::{
    AchievementListResponse, CompletionResponse, LessonAccessResponse, MortgageRequestDto,
    MortgageResponse, NavigationResponse, NotificationResponse, ProgressResponse, QuizResponse,
    QuizSubmissionDto,
};
use super::services::{
    achievements::AchievementService, calculator::CalculatorService, health::HealthService,
    progress::ProgressService,
};
use crate::domain::session::CourseSession;

pub struct CourseApi {
    pub session: Arc<Mutex<CourseSession>>,
}

#[OpenApi]
impl CourseApi {
    #[oai(path = "/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> PlainText<String> {
        HealthService::new(&self.session).status_text().await
    }

    // ===== Progress =====

    /// Current lesson, completed lessons and completion percentage
    #[oai(path = "/v1/progress", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_progress(&self) -> ProgressResponse {
        ProgressService::new(&self.session).get_progress().await
    }

    /// Navigate to a lesson. Forward moves need the previous lesson completed.
    #[oai(path = "/v1/progress/current/:lesson", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, lesson))]
    async fn navigate(&self, lesson: Path<u32>) -> NavigationResponse {
        tracing::debug!(lesson = lesson.0, "handling navigate");
        ProgressService::new(&self.session).go_to(lesson.0).await
    }

    #[oai(path = "/v1/progress/next", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn next_lesson(&self) -> NavigationResponse {
        ProgressService::new(&self.session).step(true).await
    }

    #[oai(path = "/v1/progress/previous", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn previous_lesson(&self) -> NavigationResponse {
        ProgressService::new(&self.session).step(false).await
    }

    /// Clear progress and achievements
    #[oai(path = "/v1/progress/reset", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn reset(&self) -> ProgressResponse {
        ProgressService::new(&self.session).reset().await
    }

    // ===== Lessons =====

    /// Mark a lesson completed and report achievements it unlocked
    #[oai(path = "/v1/lessons/:lesson/complete", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, lesson))]
    async fn complete_lesson(&self, lesson: Path<u32>) -> CompletionResponse {
        tracing::debug!(lesson = lesson.0, "handling complete_lesson");
        ProgressService::new(&self.session).complete(lesson.0).await
    }

    /// Whether the learner may move forward into a lesson
    #[oai(path = "/v1/lessons/:lesson/access", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, lesson))]
    async fn lesson_access(&self, lesson: Path<u32>) -> LessonAccessResponse {
        ProgressService::new(&self.session).access(lesson.0).await
    }

    // ===== Quiz & achievements =====

    #[oai(path = "/v1/quiz/results", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn submit_quiz(&self, body: Json<QuizSubmissionDto>) -> QuizResponse {
        AchievementService::new(&self.session).submit_quiz(body.0).await
    }

    #[oai(path = "/v1/achievements", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_achievements(&self) -> AchievementListResponse {
        AchievementService::new(&self.session).list().await
    }

    /// Pop the oldest unlock notification not yet shown
    #[oai(path = "/v1/achievements/notifications/next", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn next_notification(&self) -> NotificationResponse {
        AchievementService::new(&self.session).next_notification().await
    }

    // ===== Calculator =====

    /// Monthly payment and total interest for a fixed-rate mortgage
    #[oai(path = "/v1/calculator/mortgage", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn mortgage(&self, body: Json<MortgageRequestDto>) -> MortgageResponse {
        CalculatorService.mortgage(body.0)
    }
}
