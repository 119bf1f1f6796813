//! Types for game records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A photo attached to a game beyond the cover and gameplay images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalPhoto {
    /// Absolute URL of the stored file
    pub path: String,
    /// Name of the file as uploaded
    pub filename: String,
    pub added_at: String,
}

/// A free-text note attached to a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalNote {
    pub content: String,
    pub added_at: String,
}

/// A game as stored in the `games` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: i64,
    pub title: String,
    pub link: Option<String>,
    pub rating: i64,
    pub finished: bool,
    pub checked: bool,
    pub platform: String,
    pub strikes: i64,
    pub notes: String,
    pub cover_art_path: Option<String>,
    pub gameplay_image_path: Option<String>,
    pub date_added: NaiveDate,
    pub additional_photos: Vec<AdditionalPhoto>,
    pub additional_notes: Vec<AdditionalNote>,
}

/// Payload for creating a game. Everything but the title is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewGame {
    pub title: String,
    pub link: Option<String>,
    pub rating: Option<i64>,
    pub finished: Option<bool>,
    pub checked: Option<bool>,
    pub platform: Option<String>,
    pub strikes: Option<i64>,
    pub notes: Option<String>,
    pub cover_art_path: Option<String>,
    pub gameplay_image_path: Option<String>,
    pub additional_photos: Option<Vec<AdditionalPhoto>>,
    pub additional_notes: Option<Vec<AdditionalNote>>,
}

impl NewGame {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Fill in the documented defaults for every omitted field.
    pub fn into_game(self, id: i64, date_added: NaiveDate) -> Game {
        Game {
            id,
            title: self.title,
            link: self.link,
            rating: self.rating.unwrap_or(0),
            finished: self.finished.unwrap_or(false),
            checked: self.checked.unwrap_or(false),
            platform: self.platform.unwrap_or_default(),
            strikes: self.strikes.unwrap_or(0),
            notes: self.notes.unwrap_or_default(),
            cover_art_path: self.cover_art_path,
            gameplay_image_path: self.gameplay_image_path,
            date_added,
            additional_photos: self.additional_photos.unwrap_or_default(),
            additional_notes: self.additional_notes.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_game_defaults() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let game = NewGame::titled("Chrono Trigger").into_game(7, date);

        assert_eq!(game.id, 7);
        assert_eq!(game.title, "Chrono Trigger");
        assert_eq!(game.rating, 0);
        assert!(!game.finished);
        assert!(!game.checked);
        assert_eq!(game.platform, "");
        assert_eq!(game.notes, "");
        assert!(game.cover_art_path.is_none());
        assert!(game.additional_photos.is_empty());
        assert!(game.additional_notes.is_empty());
    }

    #[test]
    fn test_json_shape_is_camel_case() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let game = NewGame::titled("Okami").into_game(1, date);
        let value = serde_json::to_value(&game).unwrap();

        assert!(value.get("coverArtPath").is_some());
        assert!(value.get("gameplayImagePath").is_some());
        assert_eq!(value["dateAdded"], "2024-03-01");
        assert_eq!(value["additionalPhotos"], serde_json::json!([]));
    }

    #[test]
    fn test_new_game_from_partial_json() {
        let new: NewGame =
            serde_json::from_str(r#"{"title": "Celeste", "rating": 5, "finished": true}"#).unwrap();
        assert_eq!(new.title, "Celeste");
        assert_eq!(new.rating, Some(5));
        assert_eq!(new.finished, Some(true));
        assert!(new.platform.is_none());
    }
}
