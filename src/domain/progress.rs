use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    models::{Course, LessonId, ProgressRecord},
    router,
};
use crate::storage::{Persistence, Stored};

pub const PROGRESS_KEY: &str = "course-progress";
pub const CURRENT_LESSON_KEY: &str = "current_lesson";
pub const LAST_ACCESSED_LESSON_KEY: &str = "last_accessed_lesson";
pub const LAST_ACCESS_TIMESTAMP_KEY: &str = "last_access_timestamp";

const FIRST_LESSON_SHARE: u32 = 1;
const REMAINING_SHARE: u32 = 99;

/// Wire shape of the `course-progress` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressSnapshot {
    current_lesson: u32,
    completed_lessons: Vec<u32>,
    last_accessed: DateTime<Utc>,
}

impl ProgressSnapshot {
    fn from_record(record: &ProgressRecord) -> Self {
        ProgressSnapshot {
            current_lesson: record.current_lesson.get(),
            completed_lessons: record.completed_lessons.iter().map(|l| l.get()).collect(),
            last_accessed: record.last_accessed_at,
        }
    }

    fn completed(&self, course: &Course) -> Result<BTreeSet<LessonId>, String> {
        self.completed_lessons
            .iter()
            .map(|&id| {
                let lesson = LessonId(id);
                if course.contains(lesson) {
                    Ok(lesson)
                } else {
                    Err(format!("completed lesson {id} is outside the course"))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub record: ProgressRecord,
    /// Nothing usable was persisted; the record holds defaults.
    pub cold_start: bool,
}

/// Percentage points a single lesson is worth. Lesson 1 is worth 1; the other
/// 99 are split evenly over lessons 2..N with the remainder going to lesson 2.
pub fn lesson_share(course: &Course, lesson: LessonId) -> u32 {
    if !course.contains(lesson) {
        return 0;
    }
    if course.total_lessons == 1 {
        return 100;
    }
    if lesson == LessonId::FIRST {
        return FIRST_LESSON_SHARE;
    }
    let rest = course.total_lessons - 1;
    let base = REMAINING_SHARE / rest;
    if lesson.get() == 2 {
        base + REMAINING_SHARE % rest
    } else {
        base
    }
}

pub fn progress_percentage(course: &Course, record: &ProgressRecord) -> u8 {
    let total: u32 = record
        .completed_lessons
        .iter()
        .map(|&lesson| lesson_share(course, lesson))
        .sum();
    total.min(100) as u8
}

/// Owns the learner's position and completed lessons and writes every change
/// through to the shared persistence handle.
pub struct ProgressStore {
    course: Course,
    persistence: Arc<Persistence>,
    resume_window: Duration,
    record: ProgressRecord,
}

impl ProgressStore {
    pub fn new(course: Course, persistence: Arc<Persistence>, resume_window: Duration) -> Self {
        Self {
            course,
            persistence,
            resume_window,
            record: ProgressRecord::fresh(Utc::now()),
        }
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub fn percentage(&self) -> u8 {
        progress_percentage(&self.course, &self.record)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load(&mut self) -> LoadOutcome {
        let now = Utc::now();
        let snapshot = match self.persistence.read_json::<ProgressSnapshot>(PROGRESS_KEY).await {
            Stored::Absent => None,
            Stored::Present(snapshot) => match snapshot.completed(&self.course) {
                Ok(completed) => Some((snapshot, completed)),
                Err(reason) => {
                    tracing::warn!(key = PROGRESS_KEY, %reason, "discarding persisted progress");
                    None
                }
            },
            Stored::Malformed(e) => {
                tracing::warn!(error = %e, "discarding persisted progress");
                None
            }
        };

        let Some((snapshot, completed)) = snapshot else {
            self.record = ProgressRecord::fresh(now);
            tracing::info!("no saved progress, starting at lesson 1");
            return LoadOutcome {
                record: self.record.clone(),
                cold_start: true,
            };
        };

        let current_lesson = self.resume_lesson(&snapshot, now).await;
        self.record = ProgressRecord {
            current_lesson,
            completed_lessons: completed,
            last_accessed_at: snapshot.last_accessed,
        };
        tracing::info!(
            lesson = %current_lesson,
            completed = self.record.completed_lessons.len(),
            "resuming course"
        );
        LoadOutcome {
            record: self.record.clone(),
            cold_start: false,
        }
    }

    /// Picks the lesson to reopen from the resume metadata, falling back to the
    /// plain current-lesson entry and then the JSON record.
    async fn resume_lesson(&self, snapshot: &ProgressSnapshot, now: DateTime<Utc>) -> LessonId {
        let stored_lesson = match self.read_decimal::<u32>(LAST_ACCESSED_LESSON_KEY).await {
            Some(lesson) => Some(lesson),
            None => self.read_decimal::<u32>(CURRENT_LESSON_KEY).await,
        };
        let candidate = LessonId(stored_lesson.unwrap_or(snapshot.current_lesson));
        let accessed_at = self
            .read_decimal::<i64>(LAST_ACCESS_TIMESTAMP_KEY)
            .await
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or(snapshot.last_accessed);

        router::resume_lesson(&self.course, candidate, accessed_at, now, self.resume_window)
    }

    async fn read_decimal<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.persistence.read_parsed::<T>(key).await {
            Stored::Present(value) => Some(value),
            Stored::Absent => None,
            Stored::Malformed(e) => {
                tracing::warn!(error = %e, "ignoring resume metadata");
                None
            }
        }
    }

    /// Moves to `lesson`. Out-of-range targets leave state and storage untouched.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn navigate_to(&mut self, lesson: LessonId) -> ProgressRecord {
        if !self.course.contains(lesson) {
            tracing::debug!(%lesson, "ignoring navigation outside the course");
            return self.record.clone();
        }
        self.record.current_lesson = lesson;
        self.record.last_accessed_at = Utc::now();
        self.persist().await;
        self.record.clone()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn mark_completed(&mut self, lesson: LessonId) -> ProgressRecord {
        if !self.course.contains(lesson) {
            tracing::debug!(%lesson, "ignoring completion outside the course");
            return self.record.clone();
        }
        let newly = self.record.completed_lessons.insert(lesson);
        self.record.last_accessed_at = Utc::now();
        tracing::info!(%lesson, newly, "lesson completed");
        self.persist().await;
        self.record.clone()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn reset(&mut self) -> ProgressRecord {
        for key in [
            PROGRESS_KEY,
            CURRENT_LESSON_KEY,
            LAST_ACCESSED_LESSON_KEY,
            LAST_ACCESS_TIMESTAMP_KEY,
        ] {
            self.persistence.delete(key).await;
        }
        self.record = ProgressRecord::fresh(Utc::now());
        tracing::info!("course progress reset");
        self.record.clone()
    }

    async fn persist(&self) {
        let snapshot = ProgressSnapshot::from_record(&self.record);
        let lesson = self.record.current_lesson.to_string();
        self.persistence.write_json(PROGRESS_KEY, &snapshot).await;
        self.persistence.write(CURRENT_LESSON_KEY, &lesson).await;
        self.persistence.write(LAST_ACCESSED_LESSON_KEY, &lesson).await;
        self.persistence
            .write(
                LAST_ACCESS_TIMESTAMP_KEY,
                &self.record.last_accessed_at.timestamp_millis().to_string(),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::{BrokenStore, CountingStore};

    fn store_with(persistence: Arc<Persistence>) -> ProgressStore {
        ProgressStore::new(Course::default(), persistence, Duration::days(30))
    }

    fn record_with(completed: &[u32]) -> ProgressRecord {
        let mut record = ProgressRecord::fresh(Utc::now());
        record.completed_lessons = completed.iter().copied().map(LessonId).collect();
        record
    }

    fn snapshot_json(current: u32, completed: &[u32], accessed: DateTime<Utc>) -> String {
        serde_json::json!({
            "currentLesson": current,
            "completedLessons": completed,
            "lastAccessed": accessed,
        })
        .to_string()
    }

    #[test]
    fn shares_add_up_to_one_hundred() {
        let course = Course::default();
        let shares: Vec<u32> = course.lessons().map(|l| lesson_share(&course, l)).collect();
        assert_eq!(shares, vec![1, 15, 14, 14, 14, 14, 14, 14]);
        assert_eq!(shares.iter().sum::<u32>(), 100);
    }

    #[test]
    fn percentage_boundaries() {
        let course = Course::default();
        assert_eq!(progress_percentage(&course, &record_with(&[])), 0);
        assert_eq!(progress_percentage(&course, &record_with(&[1])), 1);
        let all = record_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(progress_percentage(&course, &all), 100);
        assert!(progress_percentage(&course, &record_with(&[2, 3, 4, 5, 6, 7, 8])) < 100);
        assert!(progress_percentage(&course, &record_with(&[1, 2, 3, 4, 5, 6, 7])) < 100);
    }

    #[test]
    fn percentage_never_decreases_as_lessons_complete() {
        let course = Course::default();
        // over all subsets, adding a lesson never lowers the total
        for mask in 0u32..(1 << 8) {
            let base: Vec<u32> = (1..=8).filter(|i| mask & (1 << (i - 1)) != 0).collect();
            let before = progress_percentage(&course, &record_with(&base));
            for extra in 1..=8 {
                let mut grown = base.clone();
                grown.push(extra);
                assert!(progress_percentage(&course, &record_with(&grown)) >= before);
            }
        }
    }

    #[test]
    fn uneven_course_sizes_still_reach_one_hundred() {
        for total in 2..=20 {
            let course = Course::new(total);
            let all: u32 = course.lessons().map(|l| lesson_share(&course, l)).sum();
            assert_eq!(all, 100, "course of {total} lessons");
        }
    }

    #[tokio::test]
    async fn cold_start_without_saved_progress() {
        let mut store = store_with(Arc::new(Persistence::in_memory()));
        let outcome = store.load().await;

        assert!(outcome.cold_start);
        assert_eq!(outcome.record.current_lesson, LessonId(1));
        assert!(outcome.record.completed_lessons.is_empty());
    }

    #[tokio::test]
    async fn malformed_progress_falls_back_to_defaults() {
        let persistence = Arc::new(Persistence::in_memory());
        persistence.write(PROGRESS_KEY, "[1,2,").await;
        let mut store = store_with(persistence.clone());

        let outcome = store.load().await;
        assert!(outcome.cold_start);
        assert_eq!(outcome.record.current_lesson, LessonId(1));

        // a well-formed record naming a lesson outside the course is also rejected
        persistence
            .write(PROGRESS_KEY, &snapshot_json(2, &[1, 12], Utc::now()))
            .await;
        assert!(store.load().await.cold_start);
    }

    #[tokio::test]
    async fn mark_completed_is_idempotent() {
        let mut store = store_with(Arc::new(Persistence::in_memory()));
        store.load().await;

        let once = store.mark_completed(LessonId(3)).await;
        let twice = store.mark_completed(LessonId(3)).await;
        assert_eq!(once.completed_lessons, twice.completed_lessons);
        assert_eq!(twice.completed_lessons.len(), 1);
    }

    #[tokio::test]
    async fn navigation_and_completion_survive_reload() {
        let persistence = Arc::new(Persistence::in_memory());
        let mut store = store_with(persistence.clone());
        store.load().await;
        store.navigate_to(LessonId(5)).await;
        store.mark_completed(LessonId(5)).await;

        let mut reloaded = store_with(persistence.clone());
        let outcome = reloaded.load().await;
        assert!(!outcome.cold_start);
        assert_eq!(outcome.record.current_lesson, LessonId(5));
        assert!(outcome.record.is_completed(LessonId(5)));
        assert_eq!(persistence.read(CURRENT_LESSON_KEY).await.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn out_of_range_navigation_writes_nothing() {
        let backend = Arc::new(CountingStore::default());
        let mut store = store_with(Arc::new(Persistence::new(backend.clone())));
        store.load().await;
        let before = store.record().clone();

        let after = store.navigate_to(LessonId(9)).await;
        assert_eq!(after, before);
        assert_eq!(store.navigate_to(LessonId(0)).await, before);
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn stale_resume_restarts_at_first_lesson() {
        let persistence = Arc::new(Persistence::in_memory());
        let mut store = store_with(persistence.clone());
        store.load().await;
        store.mark_completed(LessonId(1)).await;
        store.navigate_to(LessonId(4)).await;

        let stale = Utc::now() - Duration::days(45);
        persistence
            .write(LAST_ACCESS_TIMESTAMP_KEY, &stale.timestamp_millis().to_string())
            .await;

        let mut reloaded = store_with(persistence);
        let outcome = reloaded.load().await;
        assert_eq!(outcome.record.current_lesson, LessonId(1));
        // completed lessons are kept even when the position is not
        assert!(outcome.record.is_completed(LessonId(1)));
    }

    #[tokio::test]
    async fn resumes_from_progress_record_alone() {
        let persistence = Arc::new(Persistence::in_memory());
        let recent = Utc::now() - Duration::days(2);
        persistence
            .write(PROGRESS_KEY, &snapshot_json(3, &[1, 2], recent))
            .await;

        let outcome = store_with(persistence.clone()).load().await;
        assert!(!outcome.cold_start);
        assert_eq!(outcome.record.current_lesson, LessonId(3));

        // the record's own timestamp decides freshness when the epoch entry is missing
        let stale = Utc::now() - Duration::days(40);
        persistence
            .write(PROGRESS_KEY, &snapshot_json(3, &[1, 2], stale))
            .await;
        let outcome = store_with(persistence).load().await;
        assert_eq!(outcome.record.current_lesson, LessonId(1));
        assert_eq!(outcome.record.completed_lessons.len(), 2);
    }

    #[tokio::test]
    async fn garbage_resume_entries_fall_through() {
        let persistence = Arc::new(Persistence::in_memory());
        let recent = Utc::now() - Duration::days(1);
        persistence
            .write(PROGRESS_KEY, &snapshot_json(2, &[1, 2, 3], recent))
            .await;
        persistence.write(LAST_ACCESSED_LESSON_KEY, "lesson four").await;
        persistence.write(CURRENT_LESSON_KEY, "4").await;
        persistence.write(LAST_ACCESS_TIMESTAMP_KEY, "yesterday").await;

        let outcome = store_with(persistence.clone()).load().await;
        assert!(!outcome.cold_start);
        assert_eq!(outcome.record.current_lesson, LessonId(4));

        // with both decimal entries unreadable the JSON record's lesson is used
        persistence.write(CURRENT_LESSON_KEY, "").await;
        let outcome = store_with(persistence).load().await;
        assert_eq!(outcome.record.current_lesson, LessonId(2));
    }

    #[tokio::test]
    async fn reset_clears_storage() {
        let persistence = Arc::new(Persistence::in_memory());
        let mut store = store_with(persistence.clone());
        store.load().await;
        store.navigate_to(LessonId(2)).await;
        store.mark_completed(LessonId(1)).await;

        let record = store.reset().await;
        assert_eq!(record.current_lesson, LessonId(1));
        assert!(record.completed_lessons.is_empty());
        assert_eq!(persistence.read(PROGRESS_KEY).await, None);
        assert_eq!(persistence.read(LAST_ACCESSED_LESSON_KEY).await, None);
        assert!(store_with(persistence).load().await.cold_start);
    }

    #[tokio::test]
    async fn unavailable_storage_keeps_working_in_memory() {
        let persistence = Arc::new(Persistence::new(Arc::new(BrokenStore)));
        let mut store = store_with(persistence.clone());

        assert!(store.load().await.cold_start);
        store.navigate_to(LessonId(2)).await;
        let record = store.mark_completed(LessonId(1)).await;

        assert!(!persistence.is_available());
        assert_eq!(record.current_lesson, LessonId(2));
        assert!(record.is_completed(LessonId(1)));
    }
}
