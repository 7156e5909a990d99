//! Strongly-typed rows for the three artifact tables.
use serde::{Deserialize, Serialize};

/// One row of `artifact_metadata`. `id` is assigned by the catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: i64,
    pub title: Option<String>,
    pub culture: Option<String>,
    pub period: Option<String>,
    pub century: Option<String>,
    pub medium: Option<String>,
    pub dimensions: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub classification: Option<String>,
    pub accession_year: Option<i64>,
    pub accession_method: Option<String>,
}

/// One row of `artifact_media`. Zero means unknown for every field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactMedia {
    pub object_id: i64,
    pub image_count: i64,
    pub media_count: i64,
    pub color_count: i64,
    pub rank: i64,
    pub date_begin: i64,
    pub date_end: i64,
}

/// One row of `artifact_colors`. Duplicates for the same object are legitimate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtifactColor {
    pub object_id: i64,
    pub color: Option<String>,
    pub spectrum: Option<String>,
    pub hue: Option<String>,
    pub percent: Option<f64>,
    pub css3: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub metadata: ArtifactMetadata,
    pub media: ArtifactMedia,
    pub colors: Vec<ArtifactColor>,
    /// Entries of the raw `colors` list that were not objects.
    #[serde(default)]
    pub dropped_colors: usize,
}

impl NormalizedRecord {
    pub fn id(&self) -> i64 {
        self.metadata.id
    }

    /// Compact one-line summary used by collection previews.
    pub fn preview_row(&self) -> String {
        let title = self.metadata.title.as_deref().unwrap_or("N/A");
        format!(
            "{:>9}  {:<43}  {:<18}  {:<18}  images={}",
            self.metadata.id,
            truncate(title, 40),
            truncate(self.metadata.culture.as_deref().unwrap_or("N/A"), 18),
            truncate(self.metadata.century.as_deref().unwrap_or("N/A"), 18),
            self.media.image_count
        )
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}

/// A record that did not make it through a stage, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub id: Option<i64>,
    pub reason: String,
}

impl RecordFailure {
    pub fn new(id: Option<i64>, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_titles() {
        let rec = NormalizedRecord {
            metadata: ArtifactMetadata {
                id: 7,
                title: Some("A".repeat(60)),
                ..Default::default()
            },
            media: ArtifactMedia {
                object_id: 7,
                image_count: 3,
                ..Default::default()
            },
            colors: vec![],
            dropped_colors: 0,
        };
        let row = rec.preview_row();
        assert!(row.contains(&format!("{}...", "A".repeat(40))));
        assert!(row.contains("N/A"));
        assert!(row.ends_with("images=3"));
    }
}
