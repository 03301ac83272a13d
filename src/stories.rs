//! Story create / update / delete behind the ownership gate.
//!
//! Only the user recorded in `story.author.id` may change or remove a story.
//! Ownership is checked against a fresh read on every call.

use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::models::{Id, Story, StoryForm, User};
use crate::repo::{RepoError, StoryRepo};

#[derive(thiserror::Error, Debug)]
pub enum StoryError {
    #[error("caller is not authenticated")]
    NotAuthenticated,
    #[error("story not found")]
    StoryNotFound,
    #[error("caller does not own the story")]
    Unauthorized,
    #[error("storage failure: {0}")]
    PersistFailed(#[source] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryAction {
    Create,
    Update,
    Delete,
}

impl StoryError {
    pub fn user_message(&self, action: StoryAction) -> &'static str {
        use StoryAction::*;
        match (self, action) {
            (StoryError::NotAuthenticated, Create) => "You must be logged in to submit a story.",
            (StoryError::NotAuthenticated, Update) => "You must be logged in to update a story.",
            (StoryError::NotAuthenticated, Delete) => "You must be logged in to delete a story.",
            (StoryError::StoryNotFound, _) => "Story not found.",
            (StoryError::Unauthorized, Delete) => "You are not authorized to delete this story.",
            (StoryError::Unauthorized, _) => "You are not authorized to edit this story.",
            (StoryError::PersistFailed(_), Create) => "Failed to submit story.",
            (StoryError::PersistFailed(_), Update) => "Failed to update story.",
            (StoryError::PersistFailed(_), Delete) => "Failed to delete story.",
        }
    }
}

fn storage_failure(story_id: &str, action: &str, e: RepoError) -> StoryError {
    match e {
        RepoError::NotFound => StoryError::StoryNotFound,
        other => {
            error!(story_id, action, error = %other, "story storage failure");
            StoryError::PersistFailed(other)
        }
    }
}

/// Loads the story and checks that `acting_user_id` owns it.
pub async fn authorize<R>(repo: &R, story_id: &str, acting_user_id: Option<&str>) -> Result<Story, StoryError>
where
    R: StoryRepo + ?Sized,
{
    let acting = acting_user_id
        .filter(|id| !id.is_empty())
        .ok_or(StoryError::NotAuthenticated)?;
    let story = repo.get_story(story_id).await.map_err(|e| storage_failure(story_id, "load", e))?;
    if story.author.id != acting {
        warn!(story_id, owner = %story.author.id, acting, "ownership check failed");
        return Err(StoryError::Unauthorized);
    }
    Ok(story)
}

/// Any authenticated user may create a story; the form must already be validated.
pub async fn create_story<R>(repo: &R, form: StoryForm, author: Option<&User>) -> Result<Story, StoryError>
where
    R: StoryRepo + ?Sized,
{
    let author = author.ok_or(StoryError::NotAuthenticated)?;
    let story = repo.create_story(form, author.clone()).await.map_err(|e| {
        error!(author_id = %author.id, error = %e, "error submitting story");
        StoryError::PersistFailed(e)
    })?;
    metrics::counter!("stories_created_total").increment(1);
    info!(story_id = %story.id, author_id = %author.id, "story created");
    Ok(story)
}

pub async fn update_story<R>(
    repo: &R,
    story_id: &str,
    form: StoryForm,
    acting_user_id: Option<&str>,
) -> Result<Story, StoryError>
where
    R: StoryRepo + ?Sized,
{
    authorize(repo, story_id, acting_user_id).await?;
    let story = repo
        .update_story(story_id, form)
        .await
        .map_err(|e| storage_failure(story_id, "update", e))?;
    info!(story_id, "story updated");
    Ok(story)
}

pub async fn delete_story<R>(repo: &R, story_id: &str, acting_user_id: Option<&str>) -> Result<(), StoryError>
where
    R: StoryRepo + ?Sized,
{
    authorize(repo, story_id, acting_user_id).await?;
    repo.delete_story(story_id)
        .await
        .map_err(|e| storage_failure(story_id, "delete", e))?;
    info!(story_id, "story deleted");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<Story, StoryError>> for CreateStoryResult {
    fn from(outcome: &Result<Story, StoryError>) -> Self {
        match outcome {
            Ok(s) => Self { success: true, story_id: Some(s.id.clone()), error: None },
            Err(e) => Self { success: false, story_id: None, error: Some(e.user_message(StoryAction::Create).into()) },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UpdateStoryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<Story, StoryError>> for UpdateStoryResult {
    fn from(outcome: &Result<Story, StoryError>) -> Self {
        match outcome {
            Ok(_) => Self { success: true, error: None },
            Err(e) => Self { success: false, error: Some(e.user_message(StoryAction::Update).into()) },
        }
    }
}
