//! Partial updates of a game record.

use serde::{Deserialize, Deserializer};

use crate::db::{AdditionalNote, AdditionalPhoto, Game};

/// Fields provided by an update request.
///
/// `None` means the key was absent and the stored value is kept. Any `Some`
/// overrides, including `Some(0)`, `Some(false)` and `Some("")`. Nullable
/// columns use `Option<Option<_>>`, so an explicit JSON `null` clears them.
/// The id and creation date cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub link: Option<Option<String>>,
    pub rating: Option<i64>,
    pub finished: Option<bool>,
    pub checked: Option<bool>,
    pub platform: Option<String>,
    pub strikes: Option<i64>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub cover_art_path: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub gameplay_image_path: Option<Option<String>>,
    pub additional_photos: Option<Vec<AdditionalPhoto>>,
    pub additional_notes: Option<Vec<AdditionalNote>>,
}

/// Distinguish a present `null` from a missing key.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl GamePatch {
    pub fn is_empty(&self) -> bool {
        *self == GamePatch::default()
    }

    /// The provided title, if it differs from the stored one.
    pub fn title_change<'a>(&'a self, current: &Game) -> Option<&'a str> {
        self.title
            .as_deref()
            .filter(|title| *title != current.title)
    }

    pub fn apply(self, mut current: Game) -> Game {
        if let Some(value) = self.title {
            current.title = value;
        }
        if let Some(value) = self.link {
            current.link = value;
        }
        if let Some(value) = self.rating {
            current.rating = value;
        }
        if let Some(value) = self.finished {
            current.finished = value;
        }
        if let Some(value) = self.checked {
            current.checked = value;
        }
        if let Some(value) = self.platform {
            current.platform = value;
        }
        if let Some(value) = self.strikes {
            current.strikes = value;
        }
        if let Some(value) = self.notes {
            current.notes = value;
        }
        if let Some(value) = self.cover_art_path {
            current.cover_art_path = value;
        }
        if let Some(value) = self.gameplay_image_path {
            current.gameplay_image_path = value;
        }
        if let Some(value) = self.additional_photos {
            current.additional_photos = value;
        }
        if let Some(value) = self.additional_notes {
            current.additional_notes = value;
        }
        current
    }
}
