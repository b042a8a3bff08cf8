//! Entry repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{LocalEntry, Locator};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

/// Local store boundary used by the sync pipeline.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Find an entry by its locator
    ///
    /// # Returns
    /// - `Ok(Some(entry))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_locator(&self, locator: &Locator) -> Result<Option<LocalEntry>>;

    /// Persist an entry, inserting it or replacing the stored fields.
    ///
    /// `created_at` of an existing row is preserved.
    ///
    /// # Errors
    /// Returns error if validation fails or the database rejects the write.
    async fn commit(&self, entry: &LocalEntry) -> Result<()>;

    /// Number of stored entries
    async fn count(&self) -> Result<i64>;

    /// All entries ordered by locator
    async fn find_all(&self) -> Result<Vec<LocalEntry>>;
}

/// SQLite implementation of EntryRepository
pub struct SqliteEntryRepository {
    pool: SqlitePool,
}

impl SqliteEntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryRepository for SqliteEntryRepository {
    async fn find_by_locator(&self, locator: &Locator) -> Result<Option<LocalEntry>> {
        let entry = query_as::<_, LocalEntry>("SELECT * FROM entries WHERE locator = ?")
            .bind(locator)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    async fn commit(&self, entry: &LocalEntry) -> Result<()> {
        entry.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "entry".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO entries (
                locator, title, artist, album, year, track_number,
                genre, duration_secs, file_size, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(locator) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                year = excluded.year,
                track_number = excluded.track_number,
                genre = excluded.genre,
                duration_secs = excluded.duration_secs,
                file_size = excluded.file_size,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.locator)
        .bind(&entry.title)
        .bind(&entry.artist)
        .bind(&entry.album)
        .bind(entry.year)
        .bind(entry.track_number)
        .bind(&entry.genre)
        .bind(entry.duration_secs)
        .bind(entry.file_size)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(locator = %entry.locator, "Entry committed");
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn find_all(&self) -> Result<Vec<LocalEntry>> {
        let entries = query_as::<_, LocalEntry>("SELECT * FROM entries ORDER BY locator")
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::EntryField;

    async fn repository() -> SqliteEntryRepository {
        SqliteEntryRepository::new(create_test_pool().await.unwrap())
    }

    fn song(id: &str, title: &str, now: i64) -> LocalEntry {
        let mut entry = LocalEntry::new(Locator::new("music.example.com", id), now);
        entry.set(EntryField::Title(title.to_string()));
        entry.set(EntryField::Artist("Daft Punk".to_string()));
        entry.set(EntryField::Album("Discovery".to_string()));
        entry.set(EntryField::Year(2001));
        entry
    }

    #[tokio::test]
    async fn test_commit_and_find() {
        let repo = repository().await;
        let entry = song("1", "One More Time", 10);

        repo.commit(&entry).await.unwrap();

        let found = repo.find_by_locator(&entry.locator).await.unwrap().unwrap();
        assert_eq!(found, entry);
        assert!(repo
            .find_by_locator(&Locator::new("music.example.com", "2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_commit_same_locator_updates_in_place() {
        let repo = repository().await;
        repo.commit(&song("1", "One More Time", 10)).await.unwrap();

        let mut refreshed = song("1", "One More Time (Radio Edit)", 20);
        refreshed.set(EntryField::Genre("House".to_string()));
        repo.commit(&refreshed).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo
            .find_by_locator(&refreshed.locator)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title.as_deref(), Some("One More Time (Radio Edit)"));
        assert_eq!(stored.genre.as_deref(), Some("House"));
        assert_eq!(stored.created_at, 10);
        assert_eq!(stored.updated_at, 20);
    }

    #[tokio::test]
    async fn test_commit_rejects_invalid_entry() {
        let repo = repository().await;
        let mut entry = song("1", "Aerodynamic", 10);
        entry.set(EntryField::TrackNumber(-3));

        let result = repo.commit(&entry).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_all_ordered_by_locator() {
        let repo = repository().await;
        repo.commit(&song("b", "Digital Love", 1)).await.unwrap();
        repo.commit(&song("a", "Aerodynamic", 1)).await.unwrap();

        let ids: Vec<_> = repo
            .find_all()
            .await
            .unwrap()
            .iter()
            .map(|e| e.locator.remote_id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
