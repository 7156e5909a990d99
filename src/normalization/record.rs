use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::fields::{as_int, counter, float, int, text, to_i64};
use crate::error::MalformedRecordError;
use crate::model::{ArtifactColor, ArtifactMedia, ArtifactMetadata, NormalizedRecord, RecordFailure};

/// A catalog object exactly as the API returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Best-effort id for failure reporting; `None` when it cannot be read.
    pub fn id_hint(&self) -> Option<i64> {
        self.0.get("id").and_then(as_int)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

fn object_id(raw: &RawRecord) -> Result<i64, MalformedRecordError> {
    let value = match raw.get("id") {
        None | Some(Value::Null) => return Err(MalformedRecordError::MissingId),
        Some(v) => v,
    };
    let integral = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(to_i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    integral.ok_or_else(|| MalformedRecordError::InvalidId(value.to_string()))
}

fn normalize_color(object_id: i64, entry: &Map<String, Value>) -> ArtifactColor {
    ArtifactColor {
        object_id,
        color: text(entry, "color"),
        spectrum: text(entry, "spectrum"),
        hue: text(entry, "hue"),
        percent: float(entry, "percent"),
        css3: text(entry, "css3"),
    }
}

/// Map one raw catalog object into its three typed sub-records.
///
/// Only a missing or non-integral `id` is an error; every other field falls
/// back to `None` (text) or `0` (counters, rank and date bounds).
pub fn normalize(raw: &RawRecord) -> Result<NormalizedRecord, MalformedRecordError> {
    let id = object_id(raw)?;
    let obj = &raw.0;

    let metadata = ArtifactMetadata {
        id,
        title: text(obj, "title"),
        culture: text(obj, "culture"),
        period: text(obj, "period"),
        century: text(obj, "century"),
        medium: text(obj, "medium"),
        dimensions: text(obj, "dimensions"),
        description: text(obj, "description"),
        department: text(obj, "department"),
        classification: text(obj, "classification"),
        accession_year: int(obj, "accessionyear"),
        accession_method: text(obj, "accessionmethod"),
    };

    let media = ArtifactMedia {
        object_id: id,
        image_count: counter(obj, "imagecount"),
        media_count: counter(obj, "mediacount"),
        color_count: counter(obj, "colorcount"),
        rank: counter(obj, "rank"),
        date_begin: counter(obj, "datebegin"),
        date_end: counter(obj, "dateend"),
    };

    let mut colors = Vec::new();
    let mut dropped_colors = 0usize;
    if let Some(Value::Array(entries)) = obj.get("colors") {
        for entry in entries {
            match entry {
                Value::Object(map) => colors.push(normalize_color(id, map)),
                _ => dropped_colors += 1,
            }
        }
    }
    if dropped_colors > 0 {
        debug!(object_id = id, dropped_colors, "ignored non-object color entries");
    }

    Ok(NormalizedRecord {
        metadata,
        media,
        colors,
        dropped_colors,
    })
}

/// Normalize a whole batch; malformed records are reported and skipped.
pub fn normalize_batch(raws: &[RawRecord]) -> (Vec<NormalizedRecord>, Vec<RecordFailure>) {
    let mut ok = Vec::with_capacity(raws.len());
    let mut failed = Vec::new();
    for (idx, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(rec) => ok.push(rec),
            Err(err) => {
                warn!(position = idx, error = %err, "skipping malformed record");
                failed.push(RecordFailure::new(raw.id_hint(), err.to_string()));
            }
        }
    }
    (ok, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawRecord {
        RawRecord::try_from(v).expect("object literal")
    }

    #[test]
    fn maps_full_record() {
        let rec = normalize(&raw(json!({
            "id": 299843,
            "title": "Self-Portrait",
            "culture": "Dutch",
            "century": "17th century",
            "classification": "Paintings",
            "accessionyear": 1951,
            "accessionmethod": "Bequest",
            "imagecount": 4,
            "mediacount": 2,
            "colorcount": 2,
            "rank": 812,
            "datebegin": 1630,
            "dateend": 1640,
            "colors": [
                {"color": "#323232", "spectrum": "#3db657", "hue": "Grey", "percent": 0.61, "css3": "#2f4f4f"},
                {"color": "#c89664", "hue": "Brown", "percent": 0.12}
            ]
        })))
        .unwrap();

        assert_eq!(rec.id(), 299843);
        assert_eq!(rec.metadata.title.as_deref(), Some("Self-Portrait"));
        assert_eq!(rec.metadata.accession_year, Some(1951));
        assert_eq!(rec.metadata.period, None);
        assert_eq!(rec.media.object_id, 299843);
        assert_eq!(rec.media.rank, 812);
        assert_eq!(rec.media.date_begin, 1630);
        assert_eq!(rec.colors.len(), 2);
        assert!(rec.colors.iter().all(|c| c.object_id == 299843));
        assert_eq!(rec.colors[1].spectrum, None);
        assert_eq!(rec.colors[1].percent, Some(0.12));
    }

    #[test]
    fn missing_counters_default_to_zero() {
        let rec = normalize(&raw(json!({"id": 1, "title": "Bowl"}))).unwrap();
        assert_eq!(rec.media.image_count, 0);
        assert_eq!(rec.media.media_count, 0);
        assert_eq!(rec.media.color_count, 0);
        assert_eq!(rec.media.rank, 0);
        assert_eq!(rec.media.date_begin, 0);
        assert_eq!(rec.media.date_end, 0);
        assert!(rec.colors.is_empty());
        assert_eq!(rec.metadata.accession_year, None);
    }

    #[test]
    fn keeps_color_entries_without_color_name() {
        let rec = normalize(&raw(json!({
            "id": 5,
            "colors": [{"hue": "Blue"}, "not-a-map", 3, {"percent": "0.4"}]
        })))
        .unwrap();
        assert_eq!(rec.colors.len(), 2);
        assert_eq!(rec.dropped_colors, 2);
        assert_eq!(rec.colors[0].color, None);
        assert_eq!(rec.colors[0].hue.as_deref(), Some("Blue"));
        assert_eq!(rec.colors[1].percent, Some(0.4));
    }

    #[test]
    fn non_array_colors_are_treated_as_absent() {
        let rec = normalize(&raw(json!({"id": 5, "colors": {"hue": "Red"}}))).unwrap();
        assert!(rec.colors.is_empty());
        assert_eq!(rec.dropped_colors, 0);
    }

    #[test]
    fn id_rules() {
        assert_eq!(
            normalize(&raw(json!({"title": "x"}))).unwrap_err(),
            MalformedRecordError::MissingId
        );
        assert_eq!(
            normalize(&raw(json!({"id": null}))).unwrap_err(),
            MalformedRecordError::MissingId
        );
        assert!(matches!(
            normalize(&raw(json!({"id": "abc"}))).unwrap_err(),
            MalformedRecordError::InvalidId(_)
        ));
        assert!(matches!(
            normalize(&raw(json!({"id": 1.5}))).unwrap_err(),
            MalformedRecordError::InvalidId(_)
        ));
        assert_eq!(normalize(&raw(json!({"id": "42"}))).unwrap().id(), 42);
        assert_eq!(normalize(&raw(json!({"id": 42.0}))).unwrap().id(), 42);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let rec = normalize(&raw(json!({
            "id": 9,
            "imagecount": "3",
            "accessionyear": "1987",
            "rank": 12.7
        })))
        .unwrap();
        assert_eq!(rec.media.image_count, 3);
        assert_eq!(rec.media.rank, 12);
        assert_eq!(rec.metadata.accession_year, Some(1987));
    }

    #[test]
    fn huge_numbers_are_rejected_not_clamped() {
        let err = normalize(&raw(json!({"id": 1e20}))).unwrap_err();
        assert!(matches!(err, MalformedRecordError::InvalidId(_)));
        assert_eq!(raw(json!({"id": 1e20})).id_hint(), None);

        let rec = normalize(&raw(json!({
            "id": 3,
            "imagecount": 1e20,
            "rank": "-1e20",
            "accessionyear": 1e20
        })))
        .unwrap();
        assert_eq!(rec.media.image_count, 0);
        assert_eq!(rec.media.rank, 0);
        assert_eq!(rec.metadata.accession_year, None);
    }

    #[test]
    fn batch_skips_malformed_records() {
        let mut raws: Vec<RawRecord> = (1..=10).map(|i| raw(json!({"id": i}))).collect();
        raws[4] = raw(json!({"title": "no id"}));
        let (ok, failed) = normalize_batch(&raws);
        assert_eq!(ok.len(), 9);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, None);
        assert!(failed[0].reason.contains("no object id"));
    }
}
