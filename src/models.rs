use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque store-generated identifier.
pub type Id = String;

/// Public identity of a user, copied into stories and comments when they are created.
///
/// The copy is never refreshed: later profile changes do not reach existing content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    Language,
    Ritual,
    Craft,
    Folklore,
    Music,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// Countries a story can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Region {
    Italy,
    Netherlands,
    Sweden,
    Lebanon,
    Tunisia,
    Morocco,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

macro_rules! str_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self { $($ty::$variant => $s),+ }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

str_enum!(Category, "category", {
    Language => "Language",
    Ritual => "Ritual",
    Craft => "Craft",
    Folklore => "Folklore",
    Music => "Music",
});

str_enum!(MediaType, "media type", {
    Image => "image",
    Video => "video",
});

str_enum!(Region, "region", {
    Italy => "Italy",
    Netherlands => "Netherlands",
    Sweden => "Sweden",
    Lebanon => "Lebanon",
    Tunisia => "Tunisia",
    Morocco => "Morocco",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub media_url: String,
    pub media_type: MediaType,
    pub region: Region,
    pub author: User,
    pub created_at: DateTime<Utc>,
}

/// Editable story fields as submitted by the story form.
///
/// Author, media type and creation time are absent: they are
/// fixed when the story is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryForm {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub media_url: String,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id,
    pub text: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub text: String,
}

// Curated collections are not implemented yet; listing always yields nothing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub creator: User,
    pub stories: Vec<Story>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_string_form() {
        for r in Region::ALL {
            assert_eq!(r.as_str().parse::<Region>().unwrap(), *r);
        }
        assert_eq!("Folklore".parse::<Category>().unwrap(), Category::Folklore);
        assert!("Atlantis".parse::<Region>().is_err());
        assert_eq!(MediaType::Video.to_string(), "video");
    }

    #[test]
    fn story_serializes_camel_case() {
        let story = Story {
            id: "s1".into(),
            title: "Dabke".into(),
            description: "A traditional Levantine folk dance".into(),
            category: Category::Ritual,
            media_url: "https://example.org/a.jpg".into(),
            media_type: MediaType::Image,
            region: Region::Lebanon,
            author: User { id: "u1".into(), name: "Ana".into(), avatar_url: None },
            created_at: Utc::now(),
        };
        let v = serde_json::to_value(&story).unwrap();
        assert_eq!(v["mediaUrl"], "https://example.org/a.jpg");
        assert_eq!(v["mediaType"], "image");
        assert_eq!(v["region"], "Lebanon");
        assert_eq!(v["author"]["avatarUrl"], serde_json::Value::Null);
    }
}
