use chrono::{DateTime, Utc};
use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::domain::{
    achievements::AchievementStatus,
    calculator::MortgageQuote,
    models::{Course, ProgressRecord, QuizResult},
    progress::progress_percentage,
};

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl From<String> for ErrorDto {
    fn from(message: String) -> Self {
        ErrorDto { message }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ProgressDto {
    pub current_lesson: u32,
    pub completed_lessons: Vec<u32>,
    /// Course completion, 0 to 100
    pub percentage: u8,
    pub total_lessons: u32,
    pub can_go_next: bool,
    pub can_go_previous: bool,
    pub last_accessed_at: DateTime<Utc>,
}

impl ProgressDto {
    pub fn new(course: &Course, record: &ProgressRecord) -> Self {
        let current = record.current_lesson;
        ProgressDto {
            current_lesson: current.get(),
            completed_lessons: record.completed_lessons.iter().map(|l| l.get()).collect(),
            percentage: progress_percentage(course, record),
            total_lessons: course.total_lessons,
            can_go_next: current < course.last(),
            can_go_previous: current.previous().is_some(),
            last_accessed_at: record.last_accessed_at,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct AchievementDto {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl From<&AchievementStatus> for AchievementDto {
    fn from(status: &AchievementStatus) -> Self {
        AchievementDto {
            id: status.definition.id.to_string(),
            title: status.definition.title.to_string(),
            description: status.definition.description.to_string(),
            icon: status.definition.icon.to_string(),
            unlocked: status.is_unlocked(),
            unlocked_at: status.unlocked_at,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct CompletionDto {
    pub progress: ProgressDto,
    /// Achievements unlocked by this completion, in unlock order
    pub unlocked: Vec<AchievementDto>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct LessonAccessDto {
    pub lesson: u32,
    pub can_advance: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct QuizSubmissionDto {
    pub score: u32,
    pub total_questions: u32,
    /// Pass/fail decided by the quiz view. Graded with the configured pass mark when omitted.
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct QuizResultDto {
    pub score: u32,
    pub total_questions: u32,
    pub passed: bool,
}

impl From<QuizResult> for QuizResultDto {
    fn from(result: QuizResult) -> Self {
        QuizResultDto {
            score: result.score,
            total_questions: result.total_questions,
            passed: result.passed,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct QuizOutcomeDto {
    pub result: QuizResultDto,
    pub unlocked: Vec<AchievementDto>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct MortgageRequestDto {
    pub loan_amount: f64,
    pub down_payment: Option<f64>,
    /// Annual rate in percent
    pub annual_rate_percent: f64,
    pub term_years: f64,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct MortgageQuoteDto {
    pub principal: f64,
    pub monthly_payment: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

impl From<MortgageQuote> for MortgageQuoteDto {
    fn from(quote: MortgageQuote) -> Self {
        MortgageQuoteDto {
            principal: quote.principal,
            monthly_payment: quote.monthly_payment,
            total_payment: quote.total_payment,
            total_interest: quote.total_interest,
        }
    }
}

#[derive(ApiResponse)]
pub enum ProgressResponse {
    /// Current progress
    #[oai(status = 200)]
    Ok(Json<ProgressDto>),
}

#[derive(ApiResponse)]
pub enum NavigationResponse {
    /// Moved to the requested lesson
    #[oai(status = 200)]
    Ok(Json<ProgressDto>),

    /// Lesson is not part of the course
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    /// Lesson is locked until the previous one is completed
    #[oai(status = 409)]
    Conflict(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum CompletionResponse {
    /// Lesson recorded as completed
    #[oai(status = 200)]
    Ok(Json<CompletionDto>),

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum LessonAccessResponse {
    #[oai(status = 200)]
    Ok(Json<LessonAccessDto>),

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum QuizResponse {
    /// Quiz result accepted and achievements evaluated
    #[oai(status = 200)]
    Ok(Json<QuizOutcomeDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum AchievementListResponse {
    /// Full catalog with unlock state
    #[oai(status = 200)]
    Ok(Json<Vec<AchievementDto>>),
}

#[derive(ApiResponse)]
pub enum NotificationResponse {
    /// Oldest pending unlock notification
    #[oai(status = 200)]
    Ok(Json<AchievementDto>),

    /// Nothing pending
    #[oai(status = 204)]
    NoContent,
}

#[derive(ApiResponse)]
pub enum MortgageResponse {
    #[oai(status = 200)]
    Ok(Json<MortgageQuoteDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}
