//! DDL and statements for the three artifact tables.

pub const TABLES: [&str; 3] = ["artifact_metadata", "artifact_media", "artifact_colors"];

pub(crate) const CREATE_STATEMENTS: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS artifact_metadata (
        id INTEGER PRIMARY KEY,
        title TEXT,
        culture TEXT,
        period TEXT,
        century TEXT,
        medium TEXT,
        dimensions TEXT,
        description TEXT,
        department TEXT,
        classification TEXT,
        accessionyear INTEGER,
        accessionmethod TEXT
    )",
    // At most one media row per object; enforced by the writer, not a constraint.
    "CREATE TABLE IF NOT EXISTS artifact_media (
        objectid INTEGER NOT NULL,
        imagecount INTEGER NOT NULL DEFAULT 0,
        mediacount INTEGER NOT NULL DEFAULT 0,
        colorcount INTEGER NOT NULL DEFAULT 0,
        rank INTEGER NOT NULL DEFAULT 0,
        datebegin INTEGER NOT NULL DEFAULT 0,
        dateend INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (objectid) REFERENCES artifact_metadata(id)
    )",
    "CREATE TABLE IF NOT EXISTS artifact_colors (
        objectid INTEGER NOT NULL,
        color TEXT,
        spectrum TEXT,
        hue TEXT,
        percent REAL,
        css3 TEXT,
        FOREIGN KEY (objectid) REFERENCES artifact_metadata(id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_artifact_media_objectid ON artifact_media(objectid)",
    "CREATE INDEX IF NOT EXISTS idx_artifact_colors_objectid ON artifact_colors(objectid)",
];

pub(crate) const UPSERT_METADATA: &str = "INSERT INTO artifact_metadata
    (id, title, culture, period, century, medium, dimensions, description,
     department, classification, accessionyear, accessionmethod)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        title = excluded.title,
        culture = excluded.culture,
        period = excluded.period,
        century = excluded.century,
        medium = excluded.medium,
        dimensions = excluded.dimensions,
        description = excluded.description,
        department = excluded.department,
        classification = excluded.classification,
        accessionyear = excluded.accessionyear,
        accessionmethod = excluded.accessionmethod";

pub(crate) const INSERT_MEDIA: &str = "INSERT INTO artifact_media
    (objectid, imagecount, mediacount, colorcount, rank, datebegin, dateend)
    VALUES (?, ?, ?, ?, ?, ?, ?)";

pub(crate) const INSERT_COLOR: &str = "INSERT INTO artifact_colors
    (objectid, color, spectrum, hue, percent, css3)
    VALUES (?, ?, ?, ?, ?, ?)";

pub(crate) const DELETE_MEDIA: &str = "DELETE FROM artifact_media WHERE objectid = ?";
pub(crate) const DELETE_COLORS: &str = "DELETE FROM artifact_colors WHERE objectid = ?";

pub(crate) const ORPHAN_MEDIA: &str = "SELECT COUNT(*) FROM artifact_media m
    LEFT JOIN artifact_metadata a ON a.id = m.objectid WHERE a.id IS NULL";
pub(crate) const ORPHAN_COLORS: &str = "SELECT COUNT(*) FROM artifact_colors c
    LEFT JOIN artifact_metadata a ON a.id = c.objectid WHERE a.id IS NULL";
