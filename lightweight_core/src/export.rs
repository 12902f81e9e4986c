//! Export of the full dataset to JSON or CSV, and import of the JSON form.
//!
//! Both exports walk exercises in store order and, inside each, results in
//! relation order. Absent text fields (`detail`, `otherUnits`, `notes`) are
//! written as `""`; absent numbers are JSON `null` and empty CSV cells.
//!
//! Files are written to a temp file in the target directory and renamed into
//! place, so a failed export leaves no partial file behind.

use crate::{Error, Exercise, ExerciseResult, Measurement, Result, ScoreType, Store};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

const CSV_HEADER: [&str; 9] = [
    "Exercise",
    "Detail",
    "Score Type",
    "Date",
    "Weight",
    "Reps",
    "Time",
    "Other Value",
    "Notes",
];

/// Supported export formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// File name used for exports in this format
    pub fn file_name(&self) -> String {
        format!("lightweight_export.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::InvalidData(format!("Unknown export format: {}", other))),
        }
    }
}

// ============================================================================
// Interchange records
// ============================================================================

/// One exercise in the JSON export
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedExercise {
    name: String,
    #[serde(default)]
    detail: String,
    score_type: String,
    #[serde(default)]
    other_units: String,
    #[serde(default)]
    results: Vec<ExportedResult>,
}

/// One result in the JSON export
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedResult {
    date: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    weight: Option<i32>,
    #[serde(default)]
    reps: Option<i32>,
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    other_unit: Option<f64>,
}

impl From<&ExerciseResult> for ExportedResult {
    fn from(result: &ExerciseResult) -> Self {
        ExportedResult {
            date: iso_date(&result.date),
            notes: result.notes.clone().unwrap_or_default(),
            weight: result.weight(),
            reps: result.reps(),
            time: result.time(),
            other_unit: result.other_value(),
        }
    }
}

fn iso_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Plain decimal text for CSV cells (`59.0`, `62.5`)
fn decimal(value: f64) -> String {
    format!("{:?}", value)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn snapshot(store: &Store) -> Vec<ExportedExercise> {
    store
        .exercises()
        .iter()
        .map(|exercise| ExportedExercise {
            name: exercise.name.clone(),
            detail: exercise.detail.clone().unwrap_or_default(),
            score_type: exercise.score_type.as_str().to_string(),
            other_units: exercise.other_units.clone().unwrap_or_default(),
            results: store
                .results_for(exercise.id)
                .into_iter()
                .map(ExportedResult::from)
                .collect(),
        })
        .collect()
}

// ============================================================================
// Rendering
// ============================================================================

/// Pretty-printed JSON array, one entry per exercise
pub fn render_json(store: &Store) -> Result<String> {
    Ok(serde_json::to_string_pretty(&snapshot(store))?)
}

/// CSV with a header row and one row per result
pub fn render_csv(store: &Store) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for exercise in store.exercises() {
        for result in store.results_for(exercise.id) {
            writer.write_record([
                exercise.name.clone(),
                exercise.detail.clone().unwrap_or_default(),
                exercise.score_type.as_str().to_string(),
                iso_date(&result.date),
                result.weight().map(|w| w.to_string()).unwrap_or_default(),
                result.reps().map(|r| r.to_string()).unwrap_or_default(),
                result.time().map(decimal).unwrap_or_default(),
                result.other_value().map(decimal).unwrap_or_default(),
                result.notes.clone().unwrap_or_default(),
            ])?;
        }
    }

    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("CSV buffer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(format!("CSV is not UTF-8: {}", e)))
}

pub fn render(store: &Store, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => render_json(store),
        ExportFormat::Csv => render_csv(store),
    }
}

/// Write an export into `dir` and return the file's path
pub fn export_to_dir(store: &Store, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    let contents = render(store, format)?;
    let path = dir.join(format.file_name());

    write_atomically(&path, contents.as_bytes())
        .map_err(|e| Error::ExportIo(format!("{}: {}", path.display(), e)))?;

    tracing::info!(
        "Exported {} exercises as {} to {:?}",
        store.exercises().len(),
        format,
        path
    );
    Ok(path)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ============================================================================
// Import
// ============================================================================

/// Counts of records created by an import
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub exercises: usize,
    pub results: usize,
}

/// Load a JSON export into `store` as new records, in one transaction.
///
/// Values that do not belong to an exercise's discipline are dropped.
pub fn import_json(store: &mut Store, json: &str) -> Result<ImportSummary> {
    let exported: Vec<ExportedExercise> = serde_json::from_str(json)?;

    store.transaction(|tx| {
        let mut summary = ImportSummary::default();
        for entry in exported {
            let score_type: ScoreType = entry.score_type.parse()?;
            let mut exercise = Exercise::new(entry.name, score_type);
            exercise.detail = non_empty(entry.detail);
            exercise.other_units = non_empty(entry.other_units);
            tx.insert(exercise.clone())?;
            summary.exercises += 1;

            for row in entry.results {
                let date = DateTime::parse_from_rfc3339(&row.date)
                    .map_err(|e| Error::InvalidData(format!("Invalid date {:?}: {}", row.date, e)))?
                    .with_timezone(&Utc);

                let measurement = match score_type {
                    ScoreType::Weight => Measurement::Weight {
                        weight: row.weight,
                        reps: row.reps,
                    },
                    ScoreType::Reps => Measurement::Reps { reps: row.reps },
                    ScoreType::Time => Measurement::Time { seconds: row.time },
                    ScoreType::Other => Measurement::Other {
                        value: row.other_unit,
                    },
                };

                let mut result = ExerciseResult::new(&exercise)
                    .with_date(date)
                    .with_measurement(measurement);
                result.notes = non_empty(row.notes);
                tx.insert(result)?;
                summary.results += 1;
            }
        }
        Ok(summary)
    })
    .map(|summary| {
        tracing::info!(
            "Imported {} exercises and {} results",
            summary.exercises,
            summary.results
        );
        summary
    })
}

pub fn import_json_file(store: &mut Store, path: &Path) -> Result<ImportSummary> {
    let contents = std::fs::read_to_string(path)?;
    import_json(store, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_store() -> Store {
        let mut store = Store::in_memory();
        let clean = Exercise::new("Clean, Jerk", ScoreType::Weight).with_detail("Squat \"full\"");
        store.insert(clean.clone()).unwrap();
        store
            .insert(
                ExerciseResult::new(&clean)
                    .with_date(Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap())
                    .with_measurement(Measurement::weight_reps(100, Some(2)))
                    .with_notes("line one\nline two"),
            )
            .unwrap();

        let row = Exercise::new("Row 500m", ScoreType::Time);
        store.insert(row.clone()).unwrap();
        store
            .insert(
                ExerciseResult::new(&row)
                    .with_date(Utc.with_ymd_and_hms(2025, 4, 16, 7, 30, 0).unwrap())
                    .with_measurement(Measurement::seconds(95.5)),
            )
            .unwrap();

        store
            .insert(Exercise::new("Assault Bike", ScoreType::Other).with_other_units("calories"))
            .unwrap();
        store
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let csv = render_csv(&sample_store()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Exercise,Detail,Score Type,Date,Weight,Reps,Time,Other Value,Notes"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("\"Clean, Jerk\",\"Squat \"\"full\"\"\",weight,2025-04-15T10:00:00Z,100,2,,,"));
        assert!(csv.contains("\"line one\nline two\""));
    }

    #[test]
    fn test_csv_one_row_per_result() {
        let csv = render_csv(&sample_store()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        // The bike has no results and contributes no row
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "Clean, Jerk");
        assert_eq!(&rows[1][0], "Row 500m");
        assert_eq!(&rows[1][6], "95.5");
        assert_eq!(&rows[1][4], "");
    }

    #[test]
    fn test_json_shape() {
        let json = render_json(&sample_store()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let exercises = value.as_array().unwrap();
        assert_eq!(exercises.len(), 3);

        let clean = &exercises[0];
        assert_eq!(clean["name"], "Clean, Jerk");
        assert_eq!(clean["scoreType"], "weight");
        assert_eq!(clean["otherUnits"], "");
        assert_eq!(clean["results"][0]["date"], "2025-04-15T10:00:00Z");
        assert_eq!(clean["results"][0]["weight"], 100);
        assert!(clean["results"][0]["time"].is_null());

        let bike = &exercises[2];
        assert_eq!(bike["otherUnits"], "calories");
        assert_eq!(bike["detail"], "");
        assert!(bike["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_json_import_restores_dataset() {
        crate::logging::init_test();
        let source = sample_store();
        let json = render_json(&source).unwrap();

        let mut target = Store::in_memory();
        let summary = import_json(&mut target, &json).unwrap();
        assert_eq!(summary, ImportSummary { exercises: 3, results: 2 });

        let bike = &target.exercises()[2];
        assert_eq!(bike.other_units.as_deref(), Some("calories"));
        assert_eq!(bike.detail, None);

        let row = &target.exercises()[1];
        let results = target.results_for(row.id);
        assert_eq!(results[0].time(), Some(95.5));
        assert_eq!(results[0].notes, None);
    }

    #[test]
    fn test_bad_import_changes_nothing() {
        let mut store = Store::in_memory();
        let json = r#"[
            {"name": "Fine", "scoreType": "reps", "results": []},
            {"name": "Broken", "scoreType": "distance", "results": []}
        ]"#;
        assert!(import_json(&mut store, json).is_err());
        assert_eq!(store.exercises().len(), 0);
    }

    #[test]
    fn test_export_to_dir_writes_file() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let store = sample_store();

        let path = export_to_dir(&store, ExportFormat::Csv, temp_dir.path()).unwrap();
        assert_eq!(path, temp_dir.path().join("lightweight_export.csv"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Exercise,Detail"));

        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_export_failure_is_export_io() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = export_to_dir(&sample_store(), ExportFormat::Json, &blocker).unwrap_err();
        assert!(matches!(err, Error::ExportIo(_)));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
