use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("storage error: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Story collection. Listings are newest-first.
#[async_trait]
pub trait StoryRepo: Send + Sync {
    async fn list_stories(&self, region: Option<Region>) -> RepoResult<Vec<Story>>;
    async fn list_stories_by_author(&self, author_id: &str) -> RepoResult<Vec<Story>>;
    async fn get_story(&self, id: &str) -> RepoResult<Story>;
    async fn create_story(&self, form: StoryForm, author: User) -> RepoResult<Story>;
    /// Overwrites the editable fields; author, media type and `created_at` are kept.
    async fn update_story(&self, id: &str, form: StoryForm) -> RepoResult<Story>;
    /// Removes the story together with its comments.
    async fn delete_story(&self, id: &str) -> RepoResult<()>;
    /// Existence check used by the seeding utility.
    async fn has_stories(&self) -> RepoResult<bool>;
}

/// Comments nested under a story. Listings are newest-first.
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn list_comments(&self, story_id: &str) -> RepoResult<Vec<Comment>>;
    async fn add_comment(&self, story_id: &str, text: String, author: User) -> RepoResult<Comment>;
}

pub trait Repo: StoryRepo + CommentRepo {}

impl<T> Repo for T where T: StoryRepo + CommentRepo {}

fn new_id() -> Id {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
    use tracing::{info, warn};

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Default, Clone, Serialize, Deserialize)]
    struct State {
        // insertion order; listings walk it backwards
        stories: Vec<Story>,
        comments: HashMap<Id, Vec<Comment>>,
    }

    impl State {
        fn story_index(&self, id: &str) -> Option<usize> {
            self.stories.iter().position(|s| s.id == id)
        }
    }

    /// Development store: everything in memory, mirrored to a JSON snapshot after each write.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    fn newest_first<T>(items: impl DoubleEndedIterator<Item = T>, created: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
        // reverse insertion order first so equal timestamps still come out newest-first
        let mut v: Vec<T> = items.rev().collect();
        v.sort_by(|a, b| created(b).cmp(&created(a)));
        v
    }

    impl InMemRepo {
        /// Snapshot directory comes from `HERITAGELINK_DATA_DIR`, defaulting to `data/`.
        pub fn new() -> Self {
            let dir = std::env::var("HERITAGELINK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"));
            Self::with_snapshot(dir.join(SNAPSHOT_FILE))
        }

        pub fn with_snapshot(path: PathBuf) -> Self {
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        /// No snapshot file at all; used by tests.
        pub fn ephemeral() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), snapshot_path: None }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), stories = s.stories.len(), "loaded snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to parse snapshot, starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), error = %e, "no snapshot, starting empty");
                    State::default()
                }
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        /// Applies `change` to a copy of the state and swaps it in only once the
        /// snapshot holding it has been written. A failed write leaves memory untouched.
        fn commit<T>(&self, change: impl FnOnce(&mut State) -> RepoResult<T>) -> RepoResult<T> {
            let mut current = self.write()?;
            let mut next = current.clone();
            let out = change(&mut next)?;
            self.persist(&next)?;
            *current = next;
            Ok(out)
        }

        fn persist(&self, state: &State) -> RepoResult<()> {
            let Some(path) = self.snapshot_path.as_deref() else { return Ok(()) };
            let bytes = serde_json::to_vec_pretty(state)
                .map_err(|e| RepoError::Internal(e.to_string()))?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| RepoError::Internal(e.to_string()))?;
            }
            std::fs::write(path, bytes).map_err(|e| {
                warn!(path = %path.display(), error = %e, "failed to write snapshot");
                RepoError::Internal(e.to_string())
            })
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl StoryRepo for InMemRepo {
        async fn list_stories(&self, region: Option<Region>) -> RepoResult<Vec<Story>> {
            let s = self.read()?;
            let matching = s.stories.iter().filter(|st| region.map_or(true, |r| st.region == r)).cloned();
            Ok(newest_first(matching, |st| st.created_at))
        }

        async fn list_stories_by_author(&self, author_id: &str) -> RepoResult<Vec<Story>> {
            let s = self.read()?;
            let matching = s.stories.iter().filter(|st| st.author.id == author_id).cloned();
            Ok(newest_first(matching, |st| st.created_at))
        }

        async fn get_story(&self, id: &str) -> RepoResult<Story> {
            let s = self.read()?;
            s.stories.iter().find(|st| st.id == id).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_story(&self, form: StoryForm, author: User) -> RepoResult<Story> {
            let story = Story {
                id: new_id(),
                title: form.title,
                description: form.description,
                category: form.category,
                media_url: form.media_url,
                media_type: MediaType::Image,
                region: form.region,
                author,
                created_at: Utc::now(),
            };
            self.commit(|s| {
                s.stories.push(story.clone());
                Ok(story)
            })
        }

        async fn update_story(&self, id: &str, form: StoryForm) -> RepoResult<Story> {
            self.commit(|s| {
                let idx = s.story_index(id).ok_or(RepoError::NotFound)?;
                let story = &mut s.stories[idx];
                story.title = form.title;
                story.description = form.description;
                story.category = form.category;
                story.media_url = form.media_url;
                story.region = form.region;
                Ok(story.clone())
            })
        }

        async fn delete_story(&self, id: &str) -> RepoResult<()> {
            self.commit(|s| {
                let idx = s.story_index(id).ok_or(RepoError::NotFound)?;
                s.stories.remove(idx);
                s.comments.remove(id);
                Ok(())
            })
        }

        async fn has_stories(&self) -> RepoResult<bool> {
            Ok(!self.read()?.stories.is_empty())
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn list_comments(&self, story_id: &str) -> RepoResult<Vec<Comment>> {
            let s = self.read()?;
            if s.story_index(story_id).is_none() { return Err(RepoError::NotFound); }
            let comments = s.comments.get(story_id).map(|c| c.as_slice()).unwrap_or_default();
            Ok(newest_first(comments.iter().cloned(), |c| c.created_at))
        }

        async fn add_comment(&self, story_id: &str, text: String, author: User) -> RepoResult<Comment> {
            self.commit(|s| {
                if s.story_index(story_id).is_none() { return Err(RepoError::NotFound); }
                let comment = Comment { id: new_id(), text, author, created_at: Utc::now() };
                s.comments.entry(story_id.to_string()).or_default().push(comment.clone());
                Ok(comment)
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn author(id: &str) -> User {
            User { id: id.into(), name: format!("user {id}"), avatar_url: None }
        }

        fn form(title: &str, region: Region) -> StoryForm {
            StoryForm {
                title: title.into(),
                description: "A long enough description of a tradition".into(),
                category: Category::Craft,
                media_url: "https://example.org/m.jpg".into(),
                region,
            }
        }

        #[tokio::test]
        async fn listings_are_newest_first_and_filterable() {
            let repo = InMemRepo::ephemeral();
            let a = repo.create_story(form("First story", Region::Italy), author("u1")).await.unwrap();
            let b = repo.create_story(form("Second story", Region::Sweden), author("u2")).await.unwrap();
            let c = repo.create_story(form("Third story", Region::Italy), author("u1")).await.unwrap();

            let all: Vec<_> = repo.list_stories(None).await.unwrap().into_iter().map(|s| s.id).collect();
            assert_eq!(all, vec![c.id.clone(), b.id.clone(), a.id.clone()]);

            let italy: Vec<_> = repo.list_stories(Some(Region::Italy)).await.unwrap().into_iter().map(|s| s.id).collect();
            assert_eq!(italy, vec![c.id.clone(), a.id.clone()]);

            let mine = repo.list_stories_by_author("u2").await.unwrap();
            assert_eq!(mine.len(), 1);
            assert_eq!(mine[0].id, b.id);
        }

        #[tokio::test]
        async fn delete_drops_nested_comments() {
            let repo = InMemRepo::ephemeral();
            let s = repo.create_story(form("A story", Region::Morocco), author("u1")).await.unwrap();
            repo.add_comment(&s.id, "nice".into(), author("u2")).await.unwrap();
            repo.delete_story(&s.id).await.unwrap();
            assert!(matches!(repo.get_story(&s.id).await, Err(RepoError::NotFound)));
            assert!(matches!(repo.list_comments(&s.id).await, Err(RepoError::NotFound)));
            assert!(matches!(repo.add_comment(&s.id, "late".into(), author("u2")).await, Err(RepoError::NotFound)));
        }

        #[tokio::test]
        async fn snapshot_survives_reload() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("state.json");
            let repo = InMemRepo::with_snapshot(path.clone());
            let s = repo.create_story(form("Kept story", Region::Tunisia), author("u1")).await.unwrap();
            repo.add_comment(&s.id, "still here".into(), author("u3")).await.unwrap();

            let reloaded = InMemRepo::with_snapshot(path);
            assert_eq!(reloaded.get_story(&s.id).await.unwrap(), s);
            assert_eq!(reloaded.list_comments(&s.id).await.unwrap()[0].text, "still here");
        }

        #[tokio::test]
        async fn failed_snapshot_write_leaves_state_unchanged() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("state.json");
            let repo = InMemRepo::with_snapshot(path.clone());
            let s = repo.create_story(form("Kept story", Region::Tunisia), author("u1")).await.unwrap();
            repo.add_comment(&s.id, "first".into(), author("u2")).await.unwrap();

            // a directory where the snapshot file should be makes every write fail
            std::fs::remove_file(&path).unwrap();
            std::fs::create_dir(&path).unwrap();

            assert!(matches!(
                repo.create_story(form("Lost story", Region::Italy), author("u1")).await,
                Err(RepoError::Internal(_))
            ));
            assert_eq!(repo.list_stories(None).await.unwrap().len(), 1);

            assert!(repo.add_comment(&s.id, "second".into(), author("u2")).await.is_err());
            assert!(repo.add_comment(&s.id, "second".into(), author("u2")).await.is_err());
            assert_eq!(repo.list_comments(&s.id).await.unwrap().len(), 1);

            assert!(repo.update_story(&s.id, form("Renamed story", Region::Italy)).await.is_err());
            assert_eq!(repo.get_story(&s.id).await.unwrap(), s);

            assert!(repo.delete_story(&s.id).await.is_err());
            assert_eq!(repo.get_story(&s.id).await.unwrap(), s);
            assert_eq!(repo.list_comments(&s.id).await.unwrap().len(), 1);
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::postgres::PgRow;
    use sqlx::{Pool, Postgres, Row};

    const STORY_COLUMNS: &str = "id, title, description, category, media_url, media_type, region, \
        author_id, author_name, author_avatar_url, created_at";
    const COMMENT_COLUMNS: &str = "id, text, author_id, author_name, author_avatar_url, created_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }

    fn decode_err(e: crate::models::UnknownVariant) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    fn author_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
        Ok(User {
            id: row.try_get("author_id")?,
            name: row.try_get("author_name")?,
            avatar_url: row.try_get("author_avatar_url")?,
        })
    }

    fn story_from_row(row: PgRow) -> RepoResult<Story> {
        let category: String = row.try_get("category").map_err(db_err)?;
        let media_type: String = row.try_get("media_type").map_err(db_err)?;
        let region: String = row.try_get("region").map_err(db_err)?;
        Ok(Story {
            id: row.try_get("id").map_err(db_err)?,
            title: row.try_get("title").map_err(db_err)?,
            description: row.try_get("description").map_err(db_err)?,
            category: category.parse().map_err(decode_err)?,
            media_url: row.try_get("media_url").map_err(db_err)?,
            media_type: media_type.parse().map_err(decode_err)?,
            region: region.parse().map_err(decode_err)?,
            author: author_from_row(&row).map_err(db_err)?,
            created_at: row.try_get("created_at").map_err(db_err)?,
        })
    }

    fn comment_from_row(row: PgRow) -> RepoResult<Comment> {
        Ok(Comment {
            id: row.try_get("id").map_err(db_err)?,
            text: row.try_get("text").map_err(db_err)?,
            author: author_from_row(&row).map_err(db_err)?,
            created_at: row.try_get("created_at").map_err(db_err)?,
        })
    }

    #[async_trait]
    impl StoryRepo for PgRepo {
        async fn list_stories(&self, region: Option<Region>) -> RepoResult<Vec<Story>> {
            let rows = sqlx::query(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE ($1::text IS NULL OR region = $1) ORDER BY created_at DESC"
            ))
            .bind(region.map(|r| r.as_str()))
            .fetch_all(&self.pool).await.map_err(db_err)?;
            rows.into_iter().map(story_from_row).collect()
        }

        async fn list_stories_by_author(&self, author_id: &str) -> RepoResult<Vec<Story>> {
            let rows = sqlx::query(&format!(
                "SELECT {STORY_COLUMNS} FROM stories WHERE author_id = $1 ORDER BY created_at DESC"
            ))
            .bind(author_id)
            .fetch_all(&self.pool).await.map_err(db_err)?;
            rows.into_iter().map(story_from_row).collect()
        }

        async fn get_story(&self, id: &str) -> RepoResult<Story> {
            let row = sqlx::query(&format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            story_from_row(row)
        }

        async fn create_story(&self, form: StoryForm, author: User) -> RepoResult<Story> {
            let row = sqlx::query(&format!(
                "INSERT INTO stories (id, title, description, category, media_url, media_type, region, \
                 author_id, author_name, author_avatar_url) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10) RETURNING {STORY_COLUMNS}"
            ))
            .bind(new_id())
            .bind(&form.title)
            .bind(&form.description)
            .bind(form.category.as_str())
            .bind(&form.media_url)
            .bind(MediaType::Image.as_str())
            .bind(form.region.as_str())
            .bind(&author.id)
            .bind(&author.name)
            .bind(author.avatar_url.as_deref())
            .fetch_one(&self.pool).await.map_err(db_err)?;
            story_from_row(row)
        }

        async fn update_story(&self, id: &str, form: StoryForm) -> RepoResult<Story> {
            let row = sqlx::query(&format!(
                "UPDATE stories SET title = $2, description = $3, category = $4, media_url = $5, region = $6 \
                 WHERE id = $1 RETURNING {STORY_COLUMNS}"
            ))
            .bind(id)
            .bind(&form.title)
            .bind(&form.description)
            .bind(form.category.as_str())
            .bind(&form.media_url)
            .bind(form.region.as_str())
            .fetch_optional(&self.pool).await.map_err(db_err)?
            .ok_or(RepoError::NotFound)?;
            story_from_row(row)
        }

        async fn delete_story(&self, id: &str) -> RepoResult<()> {
            // comments go with it via ON DELETE CASCADE
            let res = sqlx::query("DELETE FROM stories WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await.map_err(db_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn has_stories(&self) -> RepoResult<bool> {
            let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM stories LIMIT 1) AS present")
                .fetch_one(&self.pool).await.map_err(db_err)?;
            row.try_get("present").map_err(db_err)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn list_comments(&self, story_id: &str) -> RepoResult<Vec<Comment>> {
            let exists: bool = sqlx::query("SELECT EXISTS (SELECT 1 FROM stories WHERE id = $1) AS present")
                .bind(story_id)
                .fetch_one(&self.pool).await.map_err(db_err)?
                .try_get("present").map_err(db_err)?;
            if !exists { return Err(RepoError::NotFound); }
            let rows = sqlx::query(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE story_id = $1 ORDER BY created_at DESC"
            ))
            .bind(story_id)
            .fetch_all(&self.pool).await.map_err(db_err)?;
            rows.into_iter().map(comment_from_row).collect()
        }

        async fn add_comment(&self, story_id: &str, text: String, author: User) -> RepoResult<Comment> {
            let row = sqlx::query(&format!(
                "INSERT INTO comments (id, story_id, text, author_id, author_name, author_avatar_url) \
                 SELECT $1, $2, $3, $4, $5, $6 WHERE EXISTS (SELECT 1 FROM stories WHERE id = $2) \
                 RETURNING {COMMENT_COLUMNS}"
            ))
            .bind(new_id())
            .bind(story_id)
            .bind(&text)
            .bind(&author.id)
            .bind(&author.name)
            .bind(author.avatar_url.as_deref())
            .fetch_optional(&self.pool).await.map_err(db_err)?
            .ok_or(RepoError::NotFound)?;
            comment_from_row(row)
        }
    }
}
