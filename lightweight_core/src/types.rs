//! Core domain types for the Lightweight exercise log.
//!
//! This module defines the fundamental records stored by the engine:
//! - Exercises and their scoring discipline
//! - Recorded results and their per-discipline measurements

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Scoring Discipline
// ============================================================================

/// How an exercise is measured, and therefore how its results are
/// formatted and ranked
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    #[default]
    Weight,
    Reps,
    Time,
    Other,
}

impl ScoreType {
    pub const ALL: [ScoreType; 4] = [
        ScoreType::Weight,
        ScoreType::Reps,
        ScoreType::Time,
        ScoreType::Other,
    ];

    /// Stable raw value used in exports
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::Weight => "weight",
            ScoreType::Reps => "reps",
            ScoreType::Time => "time",
            ScoreType::Other => "other",
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "weight" => Ok(ScoreType::Weight),
            "reps" => Ok(ScoreType::Reps),
            "time" => Ok(ScoreType::Time),
            "other" => Ok(ScoreType::Other),
            other => Err(Error::InvalidData(format!("Unknown score type: {}", other))),
        }
    }
}

// ============================================================================
// Exercise
// ============================================================================

/// A named tracked movement with a scoring discipline
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub detail: Option<String>,
    pub score_type: ScoreType,
    /// Unit label for `ScoreType::Other` values (e.g. "calories")
    pub other_units: Option<String>,
}

impl Exercise {
    /// Create a new exercise with a freshly generated identity
    pub fn new(name: impl Into<String>, score_type: ScoreType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            detail: None,
            score_type,
            other_units: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_other_units(mut self, units: impl Into<String>) -> Self {
        self.other_units = Some(units.into());
        self
    }
}

// ============================================================================
// Measurements
// ============================================================================

/// The measured values of one result, shaped by the owning exercise's
/// scoring discipline
///
/// Every inner value is optional so that a freshly created result can exist
/// blank until it is filled in. A result can never carry values from two
/// disciplines at once.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measurement {
    /// Load in the canonical unit (kilograms), optionally with reps
    Weight {
        weight: Option<i32>,
        reps: Option<i32>,
    },
    Reps {
        reps: Option<i32>,
    },
    /// Duration in seconds, millisecond precision
    Time {
        seconds: Option<f64>,
    },
    /// Free value read through the exercise's `other_units` label
    Other {
        value: Option<f64>,
    },
}

impl Measurement {
    /// An empty measurement for the given discipline
    pub fn blank(score_type: ScoreType) -> Self {
        match score_type {
            ScoreType::Weight => Measurement::Weight {
                weight: None,
                reps: None,
            },
            ScoreType::Reps => Measurement::Reps { reps: None },
            ScoreType::Time => Measurement::Time { seconds: None },
            ScoreType::Other => Measurement::Other { value: None },
        }
    }

    pub fn score_type(&self) -> ScoreType {
        match self {
            Measurement::Weight { .. } => ScoreType::Weight,
            Measurement::Reps { .. } => ScoreType::Reps,
            Measurement::Time { .. } => ScoreType::Time,
            Measurement::Other { .. } => ScoreType::Other,
        }
    }

    pub fn weight(&self) -> Option<i32> {
        match self {
            Measurement::Weight { weight, .. } => *weight,
            _ => None,
        }
    }

    pub fn reps(&self) -> Option<i32> {
        match self {
            Measurement::Weight { reps, .. } | Measurement::Reps { reps } => *reps,
            _ => None,
        }
    }

    pub fn time(&self) -> Option<f64> {
        match self {
            Measurement::Time { seconds } => *seconds,
            _ => None,
        }
    }

    pub fn other_value(&self) -> Option<f64> {
        match self {
            Measurement::Other { value } => *value,
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.weight().is_none()
            && self.reps().is_none()
            && self.time().is_none()
            && self.other_value().is_none()
    }

    /// Reshape this measurement for a different discipline.
    ///
    /// Reps survive a move between `Weight` and `Reps`; every other value
    /// that has no slot in the target discipline is dropped.
    pub fn retarget(self, score_type: ScoreType) -> Self {
        if self.score_type() == score_type {
            return self;
        }
        let reps = self.reps();
        match score_type {
            ScoreType::Weight => Measurement::Weight { weight: None, reps },
            ScoreType::Reps => Measurement::Reps { reps },
            other => Measurement::blank(other),
        }
    }
}

// ============================================================================
// Exercise Result
// ============================================================================

/// One dated attempt recorded against an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseResult {
    pub id: Uuid,
    /// Owning exercise; lookup only, ownership lives in the store
    pub exercise_id: Uuid,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub measurement: Measurement,
}

impl ExerciseResult {
    /// Create a blank result attached to `exercise`, dated now
    pub fn new(exercise: &Exercise) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id: exercise.id,
            date: Utc::now(),
            notes: None,
            measurement: Measurement::blank(exercise.score_type),
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_measurement(mut self, measurement: Measurement) -> Self {
        self.measurement = measurement;
        self
    }

    pub fn weight(&self) -> Option<i32> {
        self.measurement.weight()
    }

    pub fn reps(&self) -> Option<i32> {
        self.measurement.reps()
    }

    pub fn time(&self) -> Option<f64> {
        self.measurement.time()
    }

    pub fn other_value(&self) -> Option<f64> {
        self.measurement.other_value()
    }
}

/// Shorthand constructors used when logging results
impl Measurement {
    pub fn weight_reps(weight: i32, reps: Option<i32>) -> Self {
        Measurement::Weight {
            weight: Some(weight),
            reps,
        }
    }

    pub fn reps_only(reps: i32) -> Self {
        Measurement::Reps { reps: Some(reps) }
    }

    pub fn seconds(seconds: f64) -> Self {
        Measurement::Time {
            seconds: Some(seconds),
        }
    }

    pub fn other(value: f64) -> Self {
        Measurement::Other { value: Some(value) }
    }
}
