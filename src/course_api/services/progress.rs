use poem_openapi::payload::Json;
use tokio::sync::Mutex;

use super::unlocked_dtos;
use crate::{
    course_api::models::{
        CompletionDto, CompletionResponse, ErrorDto, LessonAccessDto, LessonAccessResponse,
        NavigationResponse, ProgressDto, ProgressResponse,
    },
    domain::{
        models::{LessonId, NavigationOutcome, NavigationRejection},
        session::CourseSession,
    },
};

pub struct ProgressService<'a> {
    pub session: &'a Mutex<CourseSession>,
}

fn not_in_course(lesson: LessonId, session: &CourseSession) -> ErrorDto {
    ErrorDto {
        message: format!(
            "Lesson {} is not part of this {}-lesson course",
            lesson,
            session.course().total_lessons
        ),
    }
}

fn navigation_response(
    session: &CourseSession,
    lesson: LessonId,
    outcome: NavigationOutcome,
) -> NavigationResponse {
    match outcome {
        NavigationOutcome::Moved(record) => {
            NavigationResponse::Ok(Json(ProgressDto::new(session.course(), &record)))
        }
        NavigationOutcome::Rejected(NavigationRejection::OutOfRange) => {
            NavigationResponse::NotFound(Json(not_in_course(lesson, session)))
        }
        NavigationOutcome::Rejected(NavigationRejection::Locked) => {
            NavigationResponse::Conflict(Json(ErrorDto {
                message: format!(
                    "Lesson {} is locked until lesson {} is completed",
                    lesson,
                    lesson.get() - 1
                ),
            }))
        }
    }
}

impl<'a> ProgressService<'a> {
    pub fn new(session: &'a Mutex<CourseSession>) -> Self {
        Self { session }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_progress(&self) -> ProgressResponse {
        let session = self.session.lock().await;
        ProgressResponse::Ok(Json(ProgressDto::new(session.course(), session.record())))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn go_to(&self, lesson: u32) -> NavigationResponse {
        let lesson = LessonId(lesson);
        let mut session = self.session.lock().await;
        let outcome = session.go_to(lesson).await;
        navigation_response(&session, lesson, outcome)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn step(&self, forward: bool) -> NavigationResponse {
        let mut session = self.session.lock().await;
        let current = session.record().current_lesson;
        let (target, outcome) = if forward {
            (current.next(), session.next_lesson().await)
        } else {
            (
                current.previous().unwrap_or(LessonId(0)),
                session.previous_lesson().await,
            )
        };
        navigation_response(&session, target, outcome)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn complete(&self, lesson: u32) -> CompletionResponse {
        let lesson = LessonId(lesson);
        let mut session = self.session.lock().await;
        match session.complete_lesson(lesson).await {
            Some(outcome) => {
                let dto = CompletionDto {
                    progress: ProgressDto::new(session.course(), &outcome.record),
                    unlocked: unlocked_dtos(&session, &outcome.unlocked),
                };
                CompletionResponse::Ok(Json(dto))
            }
            None => CompletionResponse::NotFound(Json(not_in_course(lesson, &session))),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn access(&self, lesson: u32) -> LessonAccessResponse {
        let lesson = LessonId(lesson);
        let session = self.session.lock().await;
        if !session.course().contains(lesson) {
            return LessonAccessResponse::NotFound(Json(not_in_course(lesson, &session)));
        }
        LessonAccessResponse::Ok(Json(LessonAccessDto {
            lesson: lesson.get(),
            can_advance: session.can_advance(lesson),
            completed: session.record().is_completed(lesson),
        }))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn reset(&self) -> ProgressResponse {
        let mut session = self.session.lock().await;
        let record = session.reset().await;
        ProgressResponse::Ok(Json(ProgressDto::new(session.course(), &record)))
    }
}
