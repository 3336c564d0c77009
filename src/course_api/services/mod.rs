pub mod achievements;
pub mod calculator;
pub mod health;
pub mod progress;

use crate::{
    course_api::models::AchievementDto,
    domain::{models::AchievementDefinition, session::CourseSession},
};

/// Looks up the recorded unlock state for achievements that were just unlocked.
fn unlocked_dtos(
    session: &CourseSession,
    unlocked: &[AchievementDefinition],
) -> Vec<AchievementDto> {
    session
        .achievements()
        .iter()
        .filter(|status| unlocked.iter().any(|a| a.id == status.definition.id))
        .map(AchievementDto::from)
        .collect()
}
