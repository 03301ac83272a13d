use std::sync::Arc;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use crate::auth::{create_jwt, Auth};
use crate::comments::{self, CommentError, SubmissionResult};
use crate::error::{json_error, query_error, ApiError};
use crate::models::*;
use crate::moderation::Moderator;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::Repo;
use crate::seed::seed_database;
use crate::stories::{self, CreateStoryResult, StoryAction, StoryError, UpdateStoryResult};
use crate::validation::{StoryFormInput, ValidationError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .app_data(web::QueryConfig::default().error_handler(query_error))
            .service(
                web::resource("/stories")
                    .route(web::get().to(list_stories))
                    .route(web::post().to(create_story)),
            )
            .service(
                web::resource("/stories/{id}")
                    .route(web::get().to(get_story))
                    .route(web::put().to(update_story))
                    .route(web::delete().to(delete_story)),
            )
            .service(
                web::resource("/stories/{id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(submit_comment)),
            )
            .service(web::resource("/users/{id}/stories").route(web::get().to(list_user_stories)))
            .service(web::resource("/boards").route(web::get().to(list_boards)))
            .service(web::resource("/admin/seed").route(web::post().to(seed)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/auth/refresh").route(web::post().to(refresh_token))),
    );
    cfg.route("/healthz", web::get().to(healthz));
    cfg.route("/metrics", web::get().to(render_metrics));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub moderator: Arc<dyn Moderator>,
    pub rate_limiter: Option<RateLimiterFacade>,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
pub struct StoryQuery {
    pub region: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/stories",
    params(("region" = Option<Region>, Query, description = "Only stories from this country")),
    responses(
        (status = 200, description = "Stories, newest first", body = [Story]),
        (status = 400, description = "Unknown region")
    )
)]
pub async fn list_stories(data: web::Data<AppState>, query: web::Query<StoryQuery>) -> Result<HttpResponse, ApiError> {
    let region = match query.into_inner().region {
        Some(r) => Some(r.parse::<Region>().map_err(|_| {
            ApiError::Invalid(ValidationError { field: "region", message: "Unknown region.".into() })
        })?),
        None => None,
    };
    let stories = data.repo.list_stories(region).await?;
    Ok(HttpResponse::Ok().json(stories))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/stories",
    params(("id" = String, Path, description = "Author id")),
    responses((status = 200, description = "Stories by this author, newest first", body = [Story]))
)]
pub async fn list_user_stories(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let stories = data.repo.list_stories_by_author(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(stories))
}

#[utoipa::path(
    get,
    path = "/api/v1/stories/{id}",
    params(("id" = String, Path, description = "Story id")),
    responses(
        (status = 200, description = "Story", body = Story),
        (status = 404, description = "Story not found")
    )
)]
pub async fn get_story(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let story = data.repo.get_story(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(story))
}

fn story_status(e: &StoryError) -> StatusCode {
    match e {
        StoryError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        StoryError::StoryNotFound => StatusCode::NOT_FOUND,
        StoryError::Unauthorized => StatusCode::FORBIDDEN,
        StoryError::PersistFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/stories",
    request_body = StoryFormInput,
    responses(
        (status = 201, description = "Story created", body = CreateStoryResult),
        (status = 400, description = "Form validation failed"),
        (status = 401, description = "Not logged in", body = CreateStoryResult),
        (status = 429, description = "Too many stories")
    )
)]
pub async fn create_story(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    payload: web::Json<StoryFormInput>,
) -> Result<HttpResponse, ApiError> {
    let author = auth.as_ref().map(Auth::author);
    let outcome = match &author {
        None => Err(StoryError::NotAuthenticated),
        Some(a) => {
            let form = payload.into_inner().into_form()?;
            if let Some(rl) = &data.rate_limiter {
                if !rl.allow_story(&a.id) { return Err(ApiError::TooManyRequests); }
            }
            stories::create_story(&*data.repo, form, Some(a)).await
        }
    };
    let status = match &outcome {
        Ok(_) => StatusCode::CREATED,
        Err(e) => story_status(e),
    };
    Ok(HttpResponse::build(status).json(CreateStoryResult::from(&outcome)))
}

#[utoipa::path(
    put,
    path = "/api/v1/stories/{id}",
    request_body = StoryFormInput,
    params(("id" = String, Path, description = "Story id")),
    responses(
        (status = 200, description = "Story updated", body = UpdateStoryResult),
        (status = 400, description = "Form validation failed"),
        (status = 403, description = "Caller is not the author", body = UpdateStoryResult),
        (status = 404, description = "Story not found", body = UpdateStoryResult)
    )
)]
pub async fn update_story(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StoryFormInput>,
) -> Result<HttpResponse, ApiError> {
    let acting = auth.as_ref().map(Auth::user_id);
    let story_id = path.into_inner();
    // ownership before form errors: a non-owner only ever learns it may not edit
    let outcome = match stories::authorize(&*data.repo, &story_id, acting).await {
        Err(e) => Err(e),
        Ok(_) => {
            let form = payload.into_inner().into_form()?;
            stories::update_story(&*data.repo, &story_id, form, acting).await
        }
    };
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => story_status(e),
    };
    Ok(HttpResponse::build(status).json(UpdateStoryResult::from(&outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stories/{id}",
    params(("id" = String, Path, description = "Story id")),
    responses(
        (status = 204, description = "Story and its comments deleted"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "Story not found")
    )
)]
pub async fn delete_story(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let acting = auth.as_ref().map(Auth::user_id);
    stories::delete_story(&*data.repo, &path.into_inner(), acting)
        .await
        .map_err(|e| ApiError::from_story(e, StoryAction::Delete))?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/stories/{id}/comments",
    params(("id" = String, Path, description = "Story id")),
    responses(
        (status = 200, description = "Comments, newest first", body = [Comment]),
        (status = 404, description = "Story not found")
    )
)]
pub async fn list_comments(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let comments = data.repo.list_comments(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

fn comment_status(e: &CommentError) -> StatusCode {
    match e {
        CommentError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        CommentError::EmptyInput => StatusCode::BAD_REQUEST,
        CommentError::Blocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CommentError::ModerationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CommentError::PersistFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/stories/{id}/comments",
    request_body = NewComment,
    params(("id" = String, Path, description = "Story id")),
    responses(
        (status = 201, description = "Comment passed moderation and was posted", body = SubmissionResult),
        (status = 400, description = "Empty comment", body = SubmissionResult),
        (status = 401, description = "Not logged in", body = SubmissionResult),
        (status = 422, description = "Blocked by moderation; see moderationReason", body = SubmissionResult),
        (status = 429, description = "Too many comments"),
        (status = 503, description = "Moderation unavailable", body = SubmissionResult)
    )
)]
pub async fn submit_comment(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let author = auth.as_ref().map(Auth::author);
    if let (Some(a), Some(rl)) = (&author, &data.rate_limiter) {
        if !rl.allow_comment(&a.id) { return Err(ApiError::TooManyRequests); }
    }
    let story_id = path.into_inner();
    let outcome = comments::submit_comment(
        &*data.repo,
        &*data.moderator,
        &story_id,
        &payload.text,
        author.as_ref(),
    )
    .await;
    let status = match &outcome {
        Ok(_) => StatusCode::CREATED,
        Err(e) => comment_status(e),
    };
    Ok(HttpResponse::build(status).json(SubmissionResult::from(&outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/boards",
    responses((status = 200, description = "Curated boards (not populated yet)", body = [Board]))
)]
pub async fn list_boards() -> HttpResponse {
    HttpResponse::Ok().json(Vec::<Board>::new())
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/seed",
    responses(
        (status = 201, description = "Sample stories added", body = SeedOutcome),
        (status = 200, description = "Store already populated or seeding failed", body = SeedOutcome),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn seed(auth: Auth, data: web::Data<AppState>) -> HttpResponse {
    tracing::info!(user_id = %auth.user_id(), "seed requested");
    let outcome = seed_database(&*data.repo).await;
    let status = if outcome.success { StatusCode::CREATED } else { StatusCode::OK };
    HttpResponse::build(status).json(outcome)
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user snapshot", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth) -> HttpResponse {
    HttpResponse::Ok().json(auth.author())
}

pub async fn refresh_token(auth: Auth) -> Result<HttpResponse, ApiError> {
    let jwt = create_jwt(&auth.author()).map_err(|e| {
        tracing::error!(error = %e, "token refresh failed");
        ApiError::Internal("internal error")
    })?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": jwt })))
}

pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn render_metrics(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let handle = data.metrics.as_ref().ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render()))
}
