//! Reseed hook used by [`Store::reset`](crate::Store::reset), plus the
//! starter dataset shown on a fresh install.

use crate::{Exercise, ExerciseResult, Measurement, Result, ScoreType, Transaction};
use once_cell::sync::Lazy;

/// Fills a freshly emptied store inside the reset transaction
pub trait Seed {
    fn seed(&self, tx: &mut Transaction<'_>) -> Result<()>;
}

impl<F> Seed for F
where
    F: Fn(&mut Transaction<'_>) -> Result<()>,
{
    fn seed(&self, tx: &mut Transaction<'_>) -> Result<()> {
        self(tx)
    }
}

/// One starter exercise, optionally with a first logged result
struct StarterEntry {
    name: &'static str,
    detail: Option<&'static str>,
    score_type: ScoreType,
    other_units: Option<&'static str>,
    first_result: Option<(Measurement, &'static str)>,
}

static STARTER_ENTRIES: Lazy<Vec<StarterEntry>> = Lazy::new(|| {
    vec![
        StarterEntry {
            name: "Back Squat",
            detail: None,
            score_type: ScoreType::Weight,
            other_units: None,
            first_result: Some((
                Measurement::weight_reps(135, Some(5)),
                "First workout - feeling good!",
            )),
        },
        StarterEntry {
            name: "Power Snatch",
            detail: None,
            score_type: ScoreType::Weight,
            other_units: None,
            first_result: None,
        },
        StarterEntry {
            name: "Assault Bike",
            detail: Some("10 minutes"),
            score_type: ScoreType::Other,
            other_units: Some("calories"),
            first_result: None,
        },
        StarterEntry {
            name: "Sample Exercises",
            detail: Some("Slide to delete"),
            score_type: ScoreType::Weight,
            other_units: None,
            first_result: None,
        },
    ]
});

/// The starter dataset: a few example exercises and one logged result
#[derive(Clone, Copy, Debug, Default)]
pub struct StarterSeed;

impl Seed for StarterSeed {
    fn seed(&self, tx: &mut Transaction<'_>) -> Result<()> {
        for entry in STARTER_ENTRIES.iter() {
            let mut exercise = Exercise::new(entry.name, entry.score_type);
            exercise.detail = entry.detail.map(String::from);
            exercise.other_units = entry.other_units.map(String::from);
            tx.insert(exercise.clone())?;

            if let Some((measurement, notes)) = &entry.first_result {
                tx.insert(
                    ExerciseResult::new(&exercise)
                        .with_measurement(measurement.clone())
                        .with_notes(*notes),
                )?;
            }
        }
        tracing::info!("Seeded {} starter exercises", STARTER_ENTRIES.len());
        Ok(())
    }
}
