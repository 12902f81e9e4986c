//! Filter and sort descriptors used to materialize views of the store.
//!
//! A [`FetchDescriptor`] pairs an optional predicate with an ordered list of
//! sort keys. Sorting is stable, so rows that compare equal on every key keep
//! the store's insertion order.

use crate::{Exercise, ExerciseResult};
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Direction of a single sort key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Forward,
    Reverse,
}

/// Predicate plus multi-key sort for one record type
pub struct FetchDescriptor<T> {
    predicate: Option<Predicate<T>>,
    sort: Vec<Comparator<T>>,
}

impl<T> Default for FetchDescriptor<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            sort: Vec::new(),
        }
    }
}

impl<T: 'static> FetchDescriptor<T> {
    /// Everything, in natural order
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep only rows matching `predicate` (combined with any earlier filter)
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let combined: Predicate<T> = match self.predicate.take() {
            Some(existing) => Box::new(move |row: &T| existing(row) && predicate(row)),
            None => Box::new(predicate),
        };
        self.predicate = Some(combined);
        self
    }

    /// Append a sort key. Earlier keys take priority.
    pub fn sort_by<F>(mut self, order: SortOrder, compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let key: Comparator<T> = match order {
            SortOrder::Forward => Box::new(compare),
            SortOrder::Reverse => Box::new(move |a: &T, b: &T| compare(b, a)),
        };
        self.sort.push(key);
        self
    }

    pub fn matches(&self, row: &T) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(row))
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.sort
            .iter()
            .map(|cmp| cmp(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Filter and sort rows into an owned snapshot
    pub fn apply<'a, I>(&self, rows: I) -> Vec<T>
    where
        I: IntoIterator<Item = &'a T>,
        T: Clone + 'a,
    {
        let mut out: Vec<T> = rows.into_iter().filter(|r| self.matches(r)).cloned().collect();
        if !self.sort.is_empty() {
            out.sort_by(|a, b| self.compare(a, b));
        }
        out
    }
}

// ============================================================================
// Exercise list
// ============================================================================

/// Case-insensitive substring match; an empty search matches everything
pub fn name_matches(name: &str, search: &str) -> bool {
    let search = search.trim();
    search.is_empty() || name.to_lowercase().contains(&search.to_lowercase())
}

/// Exercises whose name contains `search`, ordered by name
pub fn exercise_search(search: &str) -> FetchDescriptor<Exercise> {
    let search = search.to_string();
    FetchDescriptor::all()
        .filter(move |e: &Exercise| name_matches(&e.name, &search))
        .sort_by(SortOrder::Forward, |a: &Exercise, b: &Exercise| {
            standard_compare(&a.name, &b.name)
        })
}

/// Human-friendly string ordering.
///
/// Letters compare by their base form, ignoring case and accents, so
/// "Élan Row" sorts with the e's. Runs of digits compare by numeric value
/// so "Set 2" sorts before "Set 10". Strings equal under those rules fall
/// back to byte order.
pub fn standard_compare(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => compare_digits(x, y),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => folded(x).cmp(folded(y)),
                };
                if ord.is_ne() {
                    return ord;
                }
            }
        }
    }
}

/// Lowercased base letters of `text` with combining accents removed
fn folded(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn compare_digits(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map_or(self.rest.len(), |(i, _)| i);

        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}

// ============================================================================
// Result list
// ============================================================================

/// Display ordering of results, independent of scoring discipline:
/// weight desc, reps desc, time asc, other value desc.
///
/// Missing values rank lowest on every key.
pub fn result_sort(descriptor: FetchDescriptor<ExerciseResult>) -> FetchDescriptor<ExerciseResult> {
    descriptor
        .sort_by(SortOrder::Reverse, |a: &ExerciseResult, b: &ExerciseResult| {
            a.weight().cmp(&b.weight())
        })
        .sort_by(SortOrder::Reverse, |a: &ExerciseResult, b: &ExerciseResult| {
            a.reps().cmp(&b.reps())
        })
        .sort_by(SortOrder::Forward, |a: &ExerciseResult, b: &ExerciseResult| {
            compare_optional_f64(a.time(), b.time())
        })
        .sort_by(SortOrder::Reverse, |a: &ExerciseResult, b: &ExerciseResult| {
            compare_optional_f64(a.other_value(), b.other_value())
        })
}

/// Results owned by one exercise, in display order
pub fn results_for_exercise(exercise_id: Uuid) -> FetchDescriptor<ExerciseResult> {
    result_sort(FetchDescriptor::all().filter(move |r: &ExerciseResult| r.exercise_id == exercise_id))
}

fn compare_optional_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Measurement, ScoreType, Store};

    fn names(exercises: &[Exercise]) -> Vec<&str> {
        exercises.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive() {
        assert!(name_matches("Back Squat", "squat"));
        assert!(name_matches("Back Squat", "BACK"));
        assert!(!name_matches("Back Squat", "bench"));
        assert!(name_matches("Back Squat", ""));
    }

    #[test]
    fn test_exercise_search_sorted_by_name() {
        let mut store = Store::in_memory();
        for name in ["power snatch", "Back Squat", "Assault Bike", "Front Squat"] {
            store.insert(Exercise::new(name, ScoreType::Weight)).unwrap();
        }

        let all = store.fetch(&exercise_search(""));
        assert_eq!(
            names(&all),
            vec!["Assault Bike", "Back Squat", "Front Squat", "power snatch"]
        );

        let squats = store.fetch(&exercise_search("SQUAT"));
        assert_eq!(names(&squats), vec!["Back Squat", "Front Squat"]);
    }

    #[test]
    fn test_equal_names_keep_insertion_order() {
        let mut store = Store::in_memory();
        let first = Exercise::new("Deadlift", ScoreType::Weight);
        let second = Exercise::new("Deadlift", ScoreType::Reps);
        store.insert(first.clone()).unwrap();
        store.insert(second.clone()).unwrap();

        let all = store.fetch(&exercise_search(""));
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);
    }

    #[test]
    fn test_standard_compare_numeric_runs() {
        assert_eq!(standard_compare("Set 2", "Set 10"), Ordering::Less);
        assert_eq!(standard_compare("row 500m", "Row 2000m"), Ordering::Less);
        assert_eq!(standard_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(standard_compare("abc", "abc"), Ordering::Equal);
    }

    #[test]
    fn test_accented_names_sort_with_base_letters() {
        let mut store = Store::in_memory();
        for name in ["Zercher Squat", "Élan Row", "apple", "Ćwiczenie"] {
            store.insert(Exercise::new(name, ScoreType::Reps)).unwrap();
        }

        let all = store.fetch(&exercise_search(""));
        assert_eq!(
            names(&all),
            vec!["apple", "Ćwiczenie", "Élan Row", "Zercher Squat"]
        );

        assert_eq!(standard_compare("éclair", "Eclairs"), Ordering::Less);
        // Accent-only differences still give a total order
        assert_ne!(standard_compare("Élan", "Elan"), Ordering::Equal);
    }

    #[test]
    fn test_result_sort_reps_breaks_weight_tie() {
        let squat = Exercise::new("Squat", ScoreType::Weight);
        let five = ExerciseResult::new(&squat).with_measurement(Measurement::weight_reps(100, Some(5)));
        let three = ExerciseResult::new(&squat).with_measurement(Measurement::weight_reps(100, Some(3)));

        let sorted = results_for_exercise(squat.id).apply([&three, &five]);
        assert_eq!(sorted[0].id, five.id);
        assert_eq!(sorted[1].id, three.id);
    }

    #[test]
    fn test_result_sort_missing_weight_last() {
        let squat = Exercise::new("Squat", ScoreType::Weight);
        let blank = ExerciseResult::new(&squat);
        let light = ExerciseResult::new(&squat).with_measurement(Measurement::weight_reps(20, None));

        let sorted = results_for_exercise(squat.id).apply([&blank, &light]);
        assert_eq!(sorted[0].id, light.id);
    }

    #[test]
    fn test_result_sort_time_ascending() {
        let row = Exercise::new("Row", ScoreType::Time);
        let slow = ExerciseResult::new(&row).with_measurement(Measurement::seconds(62.5));
        let fast = ExerciseResult::new(&row).with_measurement(Measurement::seconds(59.0));

        let sorted = results_for_exercise(row.id).apply([&slow, &fast]);
        assert_eq!(sorted[0].id, fast.id);
    }

    #[test]
    fn test_result_sort_other_descending() {
        let bike = Exercise::new("Bike", ScoreType::Other);
        let low = ExerciseResult::new(&bike).with_measurement(Measurement::other(80.0));
        let high = ExerciseResult::new(&bike).with_measurement(Measurement::other(120.0));

        let sorted = results_for_exercise(bike.id).apply([&low, &high]);
        assert_eq!(sorted[0].id, high.id);
    }

    #[test]
    fn test_results_for_exercise_filters_owner() {
        let squat = Exercise::new("Squat", ScoreType::Weight);
        let bench = Exercise::new("Bench", ScoreType::Weight);
        let a = ExerciseResult::new(&squat);
        let b = ExerciseResult::new(&bench);

        let only = results_for_exercise(squat.id).apply([&a, &b]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, a.id);
    }
}
