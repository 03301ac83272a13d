//! Moderation-gated comment submission.
//!
//! validate -> moderate -> persist. Moderation always completes before the
//! write is attempted, so a stored comment is always one that passed.

use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::models::{Comment, User};
use crate::moderation::{ModerationError, Moderator};
use crate::repo::{CommentRepo, RepoError};

/// Reserved error tag telling the client the comment was rejected by moderation.
pub const MODERATION_FAILED: &str = "MODERATION_FAILED";
pub const DEFAULT_BLOCK_REASON: &str = "Comment was flagged as inappropriate.";

#[derive(thiserror::Error, Debug)]
pub enum CommentError {
    #[error("comment author is not authenticated")]
    NotAuthenticated,
    #[error("comment text is empty")]
    EmptyInput,
    #[error(transparent)]
    ModerationUnavailable(#[from] ModerationError),
    #[error("blocked by moderation: {reason}")]
    Blocked { reason: String },
    #[error("failed to store comment: {0}")]
    PersistFailed(#[source] RepoError),
}

impl CommentError {
    /// Text shown to the submitter. Only moderation reasons are passed through verbatim.
    pub fn user_message(&self) -> &'static str {
        match self {
            CommentError::NotAuthenticated => "You must be logged in to comment.",
            CommentError::EmptyInput => "Comment cannot be empty.",
            CommentError::Blocked { .. } => MODERATION_FAILED,
            CommentError::ModerationUnavailable(_) | CommentError::PersistFailed(_) => {
                "An unexpected error occurred."
            }
        }
    }
}

pub async fn submit_comment<R, M>(
    repo: &R,
    moderator: &M,
    story_id: &str,
    text: &str,
    author: Option<&User>,
) -> Result<Comment, CommentError>
where
    R: CommentRepo + ?Sized,
    M: Moderator + ?Sized,
{
    let author = author.ok_or(CommentError::NotAuthenticated)?;
    if text.trim().is_empty() {
        return Err(CommentError::EmptyInput);
    }

    let verdict = moderator.moderate(text).await.map_err(|e| {
        warn!(story_id, error = %e, "moderation unavailable, rejecting comment");
        metrics::counter!("moderation_verdicts_total", "verdict" => "unavailable").increment(1);
        CommentError::from(e)
    })?;

    if !verdict.is_safe {
        let reason = verdict
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string());
        info!(story_id, author_id = %author.id, %reason, "comment blocked by moderation");
        metrics::counter!("moderation_verdicts_total", "verdict" => "blocked").increment(1);
        return Err(CommentError::Blocked { reason });
    }
    metrics::counter!("moderation_verdicts_total", "verdict" => "safe").increment(1);

    let comment = repo
        .add_comment(story_id, text.to_string(), author.clone())
        .await
        .map_err(|e| {
            error!(story_id, error = %e, "error submitting comment");
            CommentError::PersistFailed(e)
        })?;
    metrics::counter!("comments_posted_total").increment(1);
    info!(story_id, comment_id = %comment.id, author_id = %author.id, "comment posted");
    Ok(comment)
}

/// Wire shape of a submission outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_reason: Option<String>,
}

impl From<&Result<Comment, CommentError>> for SubmissionResult {
    fn from(outcome: &Result<Comment, CommentError>) -> Self {
        match outcome {
            Ok(_) => Self { success: true, error: None, moderation_reason: None },
            Err(e) => Self {
                success: false,
                error: Some(e.user_message().to_string()),
                moderation_reason: match e {
                    CommentError::Blocked { reason } => Some(reason.clone()),
                    _ => None,
                },
            },
        }
    }
}

#[cfg(all(test, feature = "inmem-store"))]
mod tests {
    use super::*;
    use crate::models::{Category, Region, StoryForm};
    use crate::moderation::ModerationVerdict;
    use crate::repo::inmem::InMemRepo;
    use crate::repo::StoryRepo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        verdict: Option<ModerationVerdict>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(verdict: Option<ModerationVerdict>) -> Self {
            Self { verdict, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Moderator for Scripted {
        async fn moderate(&self, _text: &str) -> Result<ModerationVerdict, ModerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone().ok_or_else(|| ModerationError::Unavailable("down".into()))
        }
    }

    fn user() -> User {
        User { id: "u1".into(), name: "Ana".into(), avatar_url: Some("https://i.pravatar.cc/150?u=u1".into()) }
    }

    async fn story(repo: &InMemRepo) -> String {
        let form = StoryForm {
            title: "Swedish Midsummer".into(),
            description: "Dancing around the maypole with family".into(),
            category: Category::Ritual,
            media_url: "https://picsum.photos/800/600".into(),
            region: Region::Sweden,
        };
        repo.create_story(form, user()).await.unwrap().id
    }

    #[tokio::test]
    async fn safe_comment_is_stored_verbatim() {
        let repo = InMemRepo::ephemeral();
        let id = story(&repo).await;
        let m = Scripted::new(Some(ModerationVerdict::safe()));
        let res = submit_comment(&repo, &m, &id, "  What a beautiful tradition! ", Some(&user())).await;
        assert!(res.is_ok());
        let comments = repo.list_comments(&id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "  What a beautiful tradition! ");
        assert_eq!(comments[0].author, user());
    }

    #[tokio::test]
    async fn blocked_comment_without_reason_gets_default() {
        let repo = InMemRepo::ephemeral();
        let id = story(&repo).await;
        let m = Scripted::new(Some(ModerationVerdict { is_safe: false, reason: None }));
        let res = submit_comment(&repo, &m, &id, "something nasty", Some(&user())).await;
        let shape = SubmissionResult::from(&res);
        assert_eq!(shape.error.as_deref(), Some(MODERATION_FAILED));
        assert_eq!(shape.moderation_reason.as_deref(), Some(DEFAULT_BLOCK_REASON));
        assert!(repo.list_comments(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_text_and_missing_author_skip_moderation() {
        let repo = InMemRepo::ephemeral();
        let id = story(&repo).await;
        let m = Scripted::new(Some(ModerationVerdict::safe()));
        for text in ["", "   ", "\n\t"] {
            let res = submit_comment(&repo, &m, &id, text, Some(&user())).await;
            assert!(matches!(res, Err(CommentError::EmptyInput)));
        }
        let res = submit_comment(&repo, &m, &id, "hello", None).await;
        assert!(matches!(res, Err(CommentError::NotAuthenticated)));
        assert_eq!(m.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn moderation_outage_fails_closed() {
        let repo = InMemRepo::ephemeral();
        let id = story(&repo).await;
        let m = Scripted::new(None);
        let res = submit_comment(&repo, &m, &id, "hello there", Some(&user())).await;
        assert!(matches!(res, Err(CommentError::ModerationUnavailable(_))));
        let shape = SubmissionResult::from(&res);
        assert_eq!(shape.error.as_deref(), Some("An unexpected error occurred."));
        assert_eq!(shape.moderation_reason, None);
        assert!(repo.list_comments(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_posts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let repo = InMemRepo::with_snapshot(path.clone());
        let id = story(&repo).await;
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let m = Scripted::new(Some(ModerationVerdict::safe()));
        for _ in 0..2 {
            let res = submit_comment(&repo, &m, &id, "What a beautiful tradition!", Some(&user())).await;
            assert!(matches!(res, Err(CommentError::PersistFailed(RepoError::Internal(_)))));
        }
        assert!(repo.list_comments(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_story_is_a_persist_failure() {
        let repo = InMemRepo::ephemeral();
        let m = Scripted::new(Some(ModerationVerdict::safe()));
        let res = submit_comment(&repo, &m, "nope", "hello there", Some(&user())).await;
        assert!(matches!(res, Err(CommentError::PersistFailed(RepoError::NotFound))));
        assert_eq!(m.calls.load(Ordering::SeqCst), 1);
    }
}
