use poem_openapi::payload::PlainText;
use tokio::sync::Mutex;

use crate::domain::session::CourseSession;

pub struct HealthService<'a> {
    pub session: &'a Mutex<CourseSession>,
}

impl<'a> HealthService<'a> {
    pub fn new(session: &'a Mutex<CourseSession>) -> Self {
        Self { session }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn status_text(&self) -> PlainText<String> {
        let session = self.session.lock().await;
        let storage = if session.storage_available() {
            "persistent"
        } else {
            "memory-only"
        };
        PlainText(format!(
            "course_progress version={} lessons={} storage={}",
            env!("CARGO_PKG_VERSION"),
            session.course().total_lessons,
            storage
        ))
    }
}
