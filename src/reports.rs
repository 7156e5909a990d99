//! Named analysis queries over the artifact tables.
//!
//! Every report goes through `Store::query`, so it gets the same read-only
//! screening as ad-hoc SQL.
use crate::error::QueryError;
use crate::store::{QueryResult, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub name: &'static str,
    pub title: &'static str,
    pub sql: &'static str,
}

impl Report {
    pub async fn run(&self, store: &Store) -> Result<QueryResult, QueryError> {
        store.query(self.sql).await
    }
}

pub const REPORTS: &[Report] = &[
    Report {
        name: "byzantine-11th-century",
        title: "Byzantine artifacts from the 11th century",
        sql: "SELECT id, title, culture, century, period
              FROM artifact_metadata
              WHERE century = '11th century' AND culture = 'Byzantine'
              LIMIT 20",
    },
    Report {
        name: "cultures",
        title: "All unique cultures",
        sql: "SELECT culture, COUNT(*) AS count
              FROM artifact_metadata
              WHERE culture IS NOT NULL
              GROUP BY culture
              ORDER BY count DESC",
    },
    Report {
        name: "archaic-period",
        title: "Artifacts from the Archaic period",
        sql: "SELECT id, title, culture, period
              FROM artifact_metadata
              WHERE period LIKE '%Archaic%'
              LIMIT 20",
    },
    Report {
        name: "accession-years",
        title: "Most recent accessions",
        sql: "SELECT title, accessionyear, accessionmethod
              FROM artifact_metadata
              WHERE accessionyear IS NOT NULL
              ORDER BY accessionyear DESC
              LIMIT 20",
    },
    Report {
        name: "departments",
        title: "Artifacts per department",
        sql: "SELECT department, COUNT(*) AS count
              FROM artifact_metadata
              WHERE department IS NOT NULL
              GROUP BY department
              ORDER BY count DESC",
    },
    Report {
        name: "multiple-images",
        title: "Artifacts with more than one image",
        sql: "SELECT m.title, a.imagecount
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              WHERE a.imagecount > 1
              ORDER BY a.imagecount DESC
              LIMIT 20",
    },
    Report {
        name: "average-rank",
        title: "Average rank of ranked artifacts",
        sql: "SELECT AVG(rank) AS avg_rank, COUNT(*) AS total
              FROM artifact_media
              WHERE rank > 0",
    },
    Report {
        name: "colors-over-media",
        title: "More colors than media",
        sql: "SELECT m.title, a.colorcount, a.mediacount
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              WHERE a.colorcount > a.mediacount
              LIMIT 20",
    },
    Report {
        name: "dated-1500-1600",
        title: "Artifacts dated 1500 to 1600",
        sql: "SELECT m.title, a.datebegin, a.dateend
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              WHERE a.datebegin >= 1500 AND a.dateend <= 1600
              LIMIT 20",
    },
    Report {
        name: "no-media",
        title: "Artifacts with no media",
        sql: "SELECT m.title, a.mediacount
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              WHERE a.mediacount = 0
              LIMIT 20",
    },
    Report {
        name: "hues",
        title: "All color hues used",
        sql: "SELECT hue, COUNT(*) AS frequency
              FROM artifact_colors
              WHERE hue IS NOT NULL
              GROUP BY hue
              ORDER BY frequency DESC",
    },
    Report {
        name: "top-colors",
        title: "Top 5 colors by frequency",
        sql: "SELECT color, COUNT(*) AS frequency
              FROM artifact_colors
              GROUP BY color
              ORDER BY frequency DESC
              LIMIT 5",
    },
    Report {
        name: "hue-coverage",
        title: "Average color coverage by hue",
        sql: "SELECT hue, AVG(percent) AS avg_coverage
              FROM artifact_colors
              WHERE hue IS NOT NULL
              GROUP BY hue
              ORDER BY avg_coverage DESC",
    },
    Report {
        name: "sample-colors",
        title: "Colors for a sample of artifacts",
        sql: "SELECT c.objectid, m.title, c.color, c.hue, c.percent
              FROM artifact_colors c
              JOIN artifact_metadata m ON c.objectid = m.id
              LIMIT 20",
    },
    Report {
        name: "color-totals",
        title: "Total color entries",
        sql: "SELECT COUNT(*) AS total_colors,
                     COUNT(DISTINCT objectid) AS artifacts_with_colors
              FROM artifact_colors",
    },
    Report {
        name: "byzantine-hues",
        title: "Byzantine artifacts with their hues",
        sql: "SELECT m.title, GROUP_CONCAT(DISTINCT c.hue) AS hues
              FROM artifact_metadata m
              JOIN artifact_colors c ON m.id = c.objectid
              WHERE m.culture = 'Byzantine'
              GROUP BY m.id, m.title
              LIMIT 15",
    },
    Report {
        name: "hues-per-artifact",
        title: "Distinct hues per artifact",
        sql: "SELECT m.title, COUNT(DISTINCT c.hue) AS unique_hues
              FROM artifact_metadata m
              JOIN artifact_colors c ON m.id = c.objectid
              GROUP BY m.id, m.title
              ORDER BY unique_hues DESC
              LIMIT 20",
    },
    Report {
        name: "ranks-with-period",
        title: "Media ranks where the period is known",
        sql: "SELECT m.title, m.period, a.rank
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              WHERE m.period IS NOT NULL
              ORDER BY a.rank
              LIMIT 20",
    },
    Report {
        name: "grey-top-ranked",
        title: "Top 10 ranked artifacts with a Grey hue",
        sql: "SELECT DISTINCT m.title, a.rank
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              JOIN artifact_colors c ON m.id = c.objectid
              WHERE c.hue = 'Grey'
              ORDER BY a.rank
              LIMIT 10",
    },
    Report {
        name: "classification-stats",
        title: "Artifacts and average media per classification",
        sql: "SELECT m.classification,
                     COUNT(*) AS count,
                     AVG(a.mediacount) AS avg_media
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              GROUP BY m.classification
              ORDER BY count DESC",
    },
    Report {
        name: "most-colorful",
        title: "Most colorful artifacts",
        sql: "SELECT m.title, a.colorcount
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              ORDER BY a.colorcount DESC
              LIMIT 15",
    },
    Report {
        name: "culture-by-department",
        title: "Cultures within each department",
        sql: "SELECT department, culture, COUNT(*) AS count
              FROM artifact_metadata
              WHERE department IS NOT NULL AND culture IS NOT NULL
              GROUP BY department, culture
              ORDER BY count DESC
              LIMIT 20",
    },
    Report {
        name: "century-stats",
        title: "Artifacts and average images per century",
        sql: "SELECT century, COUNT(*) AS artifacts, AVG(a.imagecount) AS avg_images
              FROM artifact_metadata m
              JOIN artifact_media a ON m.id = a.objectid
              WHERE century IS NOT NULL
              GROUP BY century
              ORDER BY artifacts DESC",
    },
    Report {
        name: "accession-methods",
        title: "Accession methods",
        sql: "SELECT accessionmethod, COUNT(*) AS count
              FROM artifact_metadata
              WHERE accessionmethod IS NOT NULL
              GROUP BY accessionmethod
              ORDER BY count DESC",
    },
    Report {
        name: "color-diversity",
        title: "Distinct hues per classification",
        sql: "SELECT m.classification, COUNT(DISTINCT c.hue) AS color_diversity
              FROM artifact_metadata m
              JOIN artifact_colors c ON m.id = c.objectid
              GROUP BY m.classification
              ORDER BY color_diversity DESC",
    },
    // Chart aggregations.
    Report {
        name: "chart-classifications",
        title: "Top 10 classifications",
        sql: "SELECT classification, COUNT(*) AS count
              FROM artifact_metadata
              WHERE classification IS NOT NULL
              GROUP BY classification
              ORDER BY count DESC
              LIMIT 10",
    },
    Report {
        name: "chart-cultures",
        title: "Top 10 cultures",
        sql: "SELECT culture, COUNT(*) AS count
              FROM artifact_metadata
              WHERE culture IS NOT NULL
              GROUP BY culture
              ORDER BY count DESC
              LIMIT 10",
    },
    Report {
        name: "chart-centuries",
        title: "Top 10 centuries",
        sql: "SELECT century, COUNT(*) AS count
              FROM artifact_metadata
              WHERE century IS NOT NULL
              GROUP BY century
              ORDER BY count DESC
              LIMIT 10",
    },
    Report {
        name: "chart-hues",
        title: "Hue frequency",
        sql: "SELECT hue, COUNT(*) AS frequency
              FROM artifact_colors
              WHERE hue IS NOT NULL
              GROUP BY hue
              ORDER BY frequency DESC",
    },
    Report {
        name: "chart-departments",
        title: "Artifacts per department",
        sql: "SELECT department, COUNT(*) AS count
              FROM artifact_metadata
              WHERE department IS NOT NULL
              GROUP BY department
              ORDER BY count DESC",
    },
    Report {
        name: "recent",
        title: "Ten most recent object ids",
        sql: "SELECT id, title, classification, culture
              FROM artifact_metadata
              ORDER BY id DESC
              LIMIT 10",
    },
];

/// Look a report up by name (case-insensitive) or by its 1-based position.
pub fn find(key: &str) -> Option<&'static Report> {
    let key = key.trim();
    if let Ok(n) = key.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| REPORTS.get(i));
    }
    REPORTS.iter().find(|r| r.name.eq_ignore_ascii_case(key))
}

pub fn list() -> impl Iterator<Item = (usize, &'static Report)> {
    REPORTS.iter().enumerate().map(|(i, r)| (i + 1, r))
}
