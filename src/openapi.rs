use crate::comments::SubmissionResult;
use crate::models::{Board, Category, Comment, MediaType, NewComment, Region, Story, StoryForm, User};
use crate::moderation::ModerationVerdict;
use crate::seed::SeedOutcome;
use crate::stories::{CreateStoryResult, UpdateStoryResult};
use crate::validation::StoryFormInput;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_stories,
        crate::routes::list_user_stories,
        crate::routes::get_story,
        crate::routes::create_story,
        crate::routes::update_story,
        crate::routes::delete_story,
        crate::routes::list_comments,
        crate::routes::submit_comment,
        crate::routes::list_boards,
        crate::routes::seed,
        crate::routes::auth_me,
    ),
    components(schemas(
        Story, StoryForm, StoryFormInput, Comment, NewComment, User, Board,
        Category, MediaType, Region, ModerationVerdict,
        SubmissionResult, CreateStoryResult, UpdateStoryResult, SeedOutcome
    )),
    tags(
        (name = "stories", description = "Story browsing and authoring"),
        (name = "comments", description = "Moderated comments"),
    )
)]
pub struct ApiDoc;
