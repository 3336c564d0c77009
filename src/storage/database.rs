use chrono::Utc;
use entities::kv_entry;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait, sea_query::OnConflict};

use super::{KeyValueStore, StorageError};

/// `kv_entries` table accessed through SeaORM.
#[derive(Clone, Debug)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for DatabaseStore {
    #[tracing::instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = kv_entry::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(entry.map(|e| e.value))
    }

    #[tracing::instrument(level = "trace", skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let entry = kv_entry::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now()),
        };
        kv_entry::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_columns([kv_entry::Column::Value, kv_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        kv_entry::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;

    async fn store() -> DatabaseStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        DatabaseStore::new(db)
    }

    #[tokio::test]
    async fn set_overwrites_existing_key() {
        let store = store().await;
        store.set("current_lesson", "2").await.unwrap();
        store.set("current_lesson", "6").await.unwrap();

        assert_eq!(store.get("current_lesson").await.unwrap().as_deref(), Some("6"));
    }

    #[tokio::test]
    async fn remove_deletes_key_and_tolerates_missing() {
        let store = store().await;
        store.set("course-progress", "{}").await.unwrap();
        store.remove("course-progress").await.unwrap();
        store.remove("course-progress").await.unwrap();

        assert_eq!(store.get("course-progress").await.unwrap(), None);
    }
}
