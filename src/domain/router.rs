// Navigation gating and resume rules. Pure functions over the progress record.

use chrono::{DateTime, Duration, Utc};

use super::models::{Course, LessonId, NavigationRejection, ProgressRecord};

/// A lesson is reachable when it is the first one, its predecessor is done,
/// or it was already completed itself.
pub fn can_advance(record: &ProgressRecord, lesson: LessonId) -> bool {
    lesson == LessonId::FIRST
        || lesson
            .previous()
            .is_some_and(|prev| record.is_completed(prev))
        || record.is_completed(lesson)
}

/// Decides whether moving from the current lesson to `target` is allowed.
/// Moving back or staying put only needs the target to exist.
pub fn check_navigation(
    course: &Course,
    record: &ProgressRecord,
    target: LessonId,
) -> Result<(), NavigationRejection> {
    if !course.contains(target) {
        return Err(NavigationRejection::OutOfRange);
    }
    if target > record.current_lesson && !can_advance(record, target) {
        return Err(NavigationRejection::Locked);
    }
    Ok(())
}

/// Lesson to reopen on load: a stored lesson in `[2, N]` that was visited
/// within `window`, otherwise the first lesson.
pub fn resume_lesson(
    course: &Course,
    stored: LessonId,
    accessed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> LessonId {
    let fresh = now.signed_duration_since(accessed_at) < window;
    if stored > LessonId::FIRST && course.contains(stored) && fresh {
        stored
    } else {
        LessonId::FIRST
    }
}
