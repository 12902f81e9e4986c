//! Best-result selection per scoring discipline.
//!
//! - Weight: highest weight
//! - Reps: most reps
//! - Time: shortest time
//! - Other: highest value
//!
//! Missing values count as 0, and the first result encountered wins a tie.
//! Nothing is cached; every call is a single scan.

use crate::units::{format_other, format_time, format_weight_with_reps};
use crate::{Exercise, ExerciseResult, ScoreType, Store, WeightUnit};

/// Pick the representative result for `score_type`, or `None` when there
/// are no results
pub fn best_result<'a, I>(score_type: ScoreType, results: I) -> Option<&'a ExerciseResult>
where
    I: IntoIterator<Item = &'a ExerciseResult>,
{
    let results = results.into_iter();
    match score_type {
        ScoreType::Weight => pick(results, |r| r.weight().unwrap_or(0) as f64, higher),
        ScoreType::Reps => pick(results, |r| r.reps().unwrap_or(0) as f64, higher),
        ScoreType::Time => pick(results, |r| r.time().unwrap_or(0.0), lower),
        ScoreType::Other => pick(results, |r| r.other_value().unwrap_or(0.0), higher),
    }
}

/// Best result among everything `exercise` owns in `store`
pub fn best_result_for<'s>(store: &'s Store, exercise: &Exercise) -> Option<&'s ExerciseResult> {
    best_result(exercise.score_type, store.results_for(exercise.id))
}

fn higher(candidate: f64, current: f64) -> bool {
    candidate > current
}

fn lower(candidate: f64, current: f64) -> bool {
    candidate < current
}

/// Single pass keeping the first result that no later one strictly beats
fn pick<'a, I, K, B>(results: I, key: K, beats: B) -> Option<&'a ExerciseResult>
where
    I: Iterator<Item = &'a ExerciseResult>,
    K: Fn(&ExerciseResult) -> f64,
    B: Fn(f64, f64) -> bool,
{
    let mut best: Option<(&'a ExerciseResult, f64)> = None;
    for result in results {
        let value = key(result);
        match best {
            Some((_, current)) if !beats(value, current) => {}
            _ => best = Some((result, value)),
        }
    }
    best.map(|(result, _)| result)
}

/// Short summary of a best result for list display.
///
/// Empty when the value that matters for `score_type` is missing.
pub fn format_best_result(result: &ExerciseResult, score_type: ScoreType, unit: WeightUnit) -> String {
    match score_type {
        ScoreType::Weight => result
            .weight()
            .map(|w| format_weight_with_reps(w, result.reps(), unit))
            .unwrap_or_default(),
        ScoreType::Reps => result.reps().map(|r| r.to_string()).unwrap_or_default(),
        ScoreType::Time => result.time().map(format_time).unwrap_or_default(),
        ScoreType::Other => result.other_value().map(format_other).unwrap_or_default(),
    }
}
