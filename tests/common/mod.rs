#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use heritagelink::auth::create_jwt;
use heritagelink::models::User;
use heritagelink::moderation::{ModerationError, ModerationVerdict, Moderator};
use heritagelink::rate_limit::RateLimiterFacade;
use heritagelink::repo::inmem::InMemRepo;
use heritagelink::AppState;

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

pub fn ensure_secret() {
    std::env::set_var("JWT_SECRET", SECRET);
}

pub fn user(id: &str) -> User {
    User { id: id.into(), name: format!("User {id}"), avatar_url: Some(format!("https://i.pravatar.cc/150?u={id}")) }
}

pub fn token(id: &str) -> String {
    ensure_secret();
    create_jwt(&user(id)).unwrap()
}

pub fn bearer(id: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(id)))
}

/// Moderator returning a fixed verdict (or an outage) and counting calls.
pub struct ScriptedModerator {
    verdict: Mutex<Option<ModerationVerdict>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedModerator {
    pub fn returning(verdict: ModerationVerdict) -> Arc<Self> {
        Arc::new(Self { verdict: Mutex::new(Some(verdict)), calls: AtomicUsize::new(0), seen: Mutex::new(vec![]) })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self { verdict: Mutex::new(None), calls: AtomicUsize::new(0), seen: Mutex::new(vec![]) })
    }

    pub fn set(&self, verdict: ModerationVerdict) {
        *self.verdict.lock().unwrap() = Some(verdict);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Moderator for ScriptedModerator {
    async fn moderate(&self, text: &str) -> Result<ModerationVerdict, ModerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        self.verdict
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ModerationError::Unavailable("scripted outage".into()))
    }
}

pub fn state(repo: InMemRepo, moderator: Arc<dyn Moderator>) -> AppState {
    ensure_secret();
    AppState { repo: Arc::new(repo), moderator, rate_limiter: None, metrics: None }
}

pub fn state_with_limiter(repo: InMemRepo, moderator: Arc<dyn Moderator>, limiter: RateLimiterFacade) -> AppState {
    AppState { rate_limiter: Some(limiter), ..state(repo, moderator) }
}

pub fn story_json(title: &str, region: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "description": "A tradition passed down through many generations of families.",
        "category": "Folklore",
        "mediaUrl": "https://picsum.photos/800/600?random=9",
        "region": region
    })
}

/// Ephemeral repo holding one story owned by `u1`.
pub async fn repo_with_story() -> (InMemRepo, String) {
    use heritagelink::repo::StoryRepo;
    let repo = InMemRepo::ephemeral();
    let form = serde_json::from_value(story_json("Tarantella nights", "Italy")).unwrap();
    let story = repo.create_story(form, user("u1")).await.unwrap();
    (repo, story.id)
}
