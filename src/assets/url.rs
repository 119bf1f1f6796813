//! Absolute asset URLs of the form `{base_url}/uploads/{token}/{filename}`.

use std::path::{Path, PathBuf};

pub const UPLOADS_SEGMENT: &str = "uploads";

/// The token and file name a stored asset URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUrl {
    pub token: String,
    pub filename: String,
}

impl AssetUrl {
    pub fn new(token: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            filename: filename.into(),
        }
    }

    /// Parse a URL produced by [`AssetUrl::to_url`] with the same base.
    /// Returns `None` for anything outside `{base_url}/uploads/`.
    pub fn parse(url: &str, base_url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix(base_url.trim_end_matches('/'))?
            .strip_prefix('/')?
            .strip_prefix(UPLOADS_SEGMENT)?
            .strip_prefix('/')?;

        let (token, filename) = rest.split_once('/')?;
        if filename.is_empty() || filename.contains('/') || is_dot_segment(token) || is_dot_segment(filename) {
            return None;
        }

        Some(Self::new(token, filename))
    }

    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            base_url.trim_end_matches('/'),
            UPLOADS_SEGMENT,
            self.token,
            self.filename
        )
    }

    /// Location of the file under the asset root.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        root.join(&self.token).join(&self.filename)
    }

    pub fn with_token(&self, token: &str) -> Self {
        Self::new(token, self.filename.clone())
    }
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}
