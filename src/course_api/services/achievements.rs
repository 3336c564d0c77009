use poem_openapi::payload::Json;
use tokio::sync::Mutex;

use super::unlocked_dtos;
use crate::{
    course_api::models::{
        AchievementDto, AchievementListResponse, ErrorDto, NotificationResponse, QuizOutcomeDto,
        QuizResponse, QuizSubmissionDto,
    },
    domain::{models::QuizResult, session::CourseSession},
};

pub struct AchievementService<'a> {
    pub session: &'a Mutex<CourseSession>,
}

impl<'a> AchievementService<'a> {
    pub fn new(session: &'a Mutex<CourseSession>) -> Self {
        Self { session }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list(&self) -> AchievementListResponse {
        let session = self.session.lock().await;
        let dtos = session.achievements().iter().map(AchievementDto::from).collect();
        AchievementListResponse::Ok(Json(dtos))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn next_notification(&self) -> NotificationResponse {
        let mut session = self.session.lock().await;
        let Some(achievement) = session.next_notification() else {
            return NotificationResponse::NoContent;
        };
        match unlocked_dtos(&session, std::slice::from_ref(&achievement)).pop() {
            Some(dto) => NotificationResponse::Ok(Json(dto)),
            // unlock was wiped by a reset after it was queued
            None => NotificationResponse::NoContent,
        }
    }

    #[tracing::instrument(level = "debug", skip(self, submission))]
    pub async fn submit_quiz(&self, submission: QuizSubmissionDto) -> QuizResponse {
        if submission.total_questions == 0 {
            return QuizResponse::BadRequest(Json(ErrorDto {
                message: "A quiz result needs at least one question".into(),
            }));
        }
        if submission.score > submission.total_questions {
            return QuizResponse::BadRequest(Json(ErrorDto {
                message: format!(
                    "Score {} exceeds the number of questions {}",
                    submission.score, submission.total_questions
                ),
            }));
        }
        let mut session = self.session.lock().await;
        let result = match submission.passed {
            Some(passed) => QuizResult {
                score: submission.score,
                total_questions: submission.total_questions,
                passed,
            },
            None => session.grade_quiz(submission.score, submission.total_questions),
        };
        tracing::info!(
            score = result.score,
            total = result.total_questions,
            passed = result.passed,
            "quiz submitted"
        );

        let unlocked = session.submit_quiz(result).await;
        QuizResponse::Ok(Json(QuizOutcomeDto {
            result: result.into(),
            unlocked: unlocked_dtos(&session, &unlocked),
        }))
    }
}
