use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::models::{Category, Region, StoryForm, User};
use crate::repo::StoryRepo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeedOutcome {
    pub success: bool,
    pub message: String,
}

pub fn seed_user() -> User {
    User {
        id: "seed_user".into(),
        name: "Heritage Contributor".into(),
        avatar_url: Some("https://i.pravatar.cc/150?u=seed_user".into()),
    }
}

fn sample(title: &str, description: &str, category: Category, n: u8, region: Region) -> StoryForm {
    StoryForm {
        title: title.into(),
        description: description.into(),
        category,
        media_url: format!("https://picsum.photos/800/600?random={n}"),
        region,
    }
}

pub fn sample_stories() -> Vec<StoryForm> {
    vec![
        sample(
            "The Art of Dabke in Lebanon",
            "Dabke is a traditional Levantine folk dance performed at weddings and joyous occasions. The dance line forms from right to left, with the leader alternating between facing the audience and the other dancers. It symbolizes community solidarity and is a vibrant expression of cultural identity.",
            Category::Ritual, 1, Region::Lebanon,
        ),
        sample(
            "Swedish Midsummer: A Celebration of Light",
            "Midsummer is one of the most important holidays in Sweden. It involves decorating and dancing around a maypole, eating pickled herring with new potatoes, and singing traditional drinking songs. Families and friends gather in the countryside to celebrate the longest day of the year.",
            Category::Ritual, 2, Region::Sweden,
        ),
        sample(
            "Moroccan Zellige: The Art of Geometric Tiles",
            "Zellige is a style of mosaic tilework made from individually chiseled geometric tiles. This intricate art form is a hallmark of Moroccan architecture, adorning walls, floors, and fountains with stunning patterns. Each piece is handcrafted, making every installation unique.",
            Category::Craft, 3, Region::Morocco,
        ),
        sample(
            "The Gnaoua Music of Tunisia",
            "Gnaoua music is a rich repertoire of ancient African Islamic spiritual religious songs and rhythms. Its well-preserved heritage combines ritual poetry with traditional music and dancing. Originally practiced for healing, it is now a major part of Tunisia's cultural life.",
            Category::Music, 4, Region::Tunisia,
        ),
        sample(
            "Dutch Windmills: Engineering Marvels",
            "The iconic windmills of the Netherlands are a symbol of the Dutch battle against water. For centuries, these structures have been used to drain land, mill grain, and saw wood. The historic windmills at Kinderdijk are a UNESCO World Heritage site, showcasing Dutch ingenuity.",
            Category::Craft, 5, Region::Netherlands,
        ),
        sample(
            "The Tarantella: Italy's Healing Dance",
            "The Tarantella is a lively folk dance from Southern Italy, once believed to be a cure for the venomous bite of a tarantula. Its frenetic pace and passionate music were thought to sweat out the poison. Today, it is a joyful dance performed at festivals and celebrations.",
            Category::Folklore, 6, Region::Italy,
        ),
    ]
}

/// Fills an empty store with sample stories. A store that already holds any story is left alone.
pub async fn seed_database<R: StoryRepo + ?Sized>(repo: &R) -> SeedOutcome {
    match repo.has_stories().await {
        Ok(true) => {
            return SeedOutcome { success: false, message: "Database already has stories.".into() };
        }
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "error seeding database");
            return SeedOutcome { success: false, message: format!("An error occurred: {e}") };
        }
    }

    let stories = sample_stories();
    let count = stories.len();
    let author = seed_user();
    for form in stories {
        if let Err(e) = repo.create_story(form, author.clone()).await {
            error!(error = %e, "error seeding database");
            return SeedOutcome { success: false, message: format!("An error occurred: {e}") };
        }
    }
    info!(count, "seeded sample stories");
    SeedOutcome { success: true, message: format!("{count} stories have been added.") }
}

#[cfg(all(test, feature = "inmem-store"))]
mod tests {
    use super::*;
    use crate::repo::inmem::InMemRepo;
    use crate::validation::validate_story_form;

    #[tokio::test]
    async fn seeds_once() {
        let repo = InMemRepo::ephemeral();
        let first = seed_database(&repo).await;
        assert_eq!(first, SeedOutcome { success: true, message: "6 stories have been added.".into() });
        let second = seed_database(&repo).await;
        assert!(!second.success);
        assert_eq!(second.message, "Database already has stories.");
        assert_eq!(repo.list_stories(None).await.unwrap().len(), 6);
    }

    #[test]
    fn samples_pass_form_validation() {
        for f in sample_stories() {
            assert!(validate_story_form(&f).is_ok(), "{}", f.title);
        }
    }
}
