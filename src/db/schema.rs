pub const SCHEMA: &str = r#"
-- Games table: one row per catalogued game
CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(title) > 0),
    link TEXT,
    rating INTEGER NOT NULL DEFAULT 0,
    finished INTEGER NOT NULL DEFAULT 0,
    platform TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',

    -- Absolute URLs under the asset root
    cover_art_path TEXT,

    date_added TEXT NOT NULL DEFAULT (date('now'))
);

CREATE INDEX IF NOT EXISTS idx_games_title ON games(title);
"#;

/// Columns added after the first release. Each statement fails harmlessly
/// with "duplicate column" on databases that already have it.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE games ADD COLUMN checked INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE games ADD COLUMN strikes INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE games ADD COLUMN gameplay_image_path TEXT",
    "ALTER TABLE games ADD COLUMN additional_photos TEXT NOT NULL DEFAULT '[]'", // JSON array
    "ALTER TABLE games ADD COLUMN additional_notes TEXT NOT NULL DEFAULT '[]'",  // JSON array
];
