use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::{Category, Region, StoryForm};

pub const MIN_TITLE_LEN: usize = 5;
pub const MIN_DESCRIPTION_LEN: usize = 20;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Story form as posted by the client. Category and region arrive as plain
/// text so an unknown value is reported against its field.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryFormInput {
    pub title: String,
    pub description: String,
    #[schema(example = "Folklore")]
    pub category: String,
    pub media_url: String,
    #[schema(example = "Italy")]
    pub region: String,
}

impl StoryFormInput {
    pub fn into_form(self) -> Result<StoryForm, ValidationError> {
        let category: Category = self
            .category
            .parse()
            .map_err(|_| ValidationError::new("category", "Please select a valid category."))?;
        let region: Region = self
            .region
            .parse()
            .map_err(|_| ValidationError::new("region", "Please select a valid region."))?;
        let form = StoryForm {
            title: self.title,
            description: self.description,
            category,
            media_url: self.media_url,
            region,
        };
        validate_story_form(&form)?;
        Ok(form)
    }
}

/// Server-side checks for the story form. Category and region are already
/// constrained by deserialization, so only free-text fields are checked here.
pub fn validate_story_form(form: &StoryForm) -> Result<(), ValidationError> {
    if form.title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(ValidationError::new(
            "title",
            format!("Title must be at least {MIN_TITLE_LEN} characters."),
        ));
    }
    if form.description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        return Err(ValidationError::new(
            "description",
            format!("Description must be at least {MIN_DESCRIPTION_LEN} characters."),
        ));
    }
    match url::Url::parse(form.media_url.trim()) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
        _ => Err(ValidationError::new("mediaUrl", "Please enter a valid URL.")),
    }
}
