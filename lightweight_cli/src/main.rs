use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use lightweight_core::aggregate::best_result_for;
use lightweight_core::export::{export_to_dir, import_json_file};
use lightweight_core::query::{exercise_search, results_for_exercise};
use lightweight_core::units::{convert_weight, format_other_with_units, format_time, format_weight, parse_time};
use lightweight_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lightweight")]
#[command(about = "Exercise log with personal bests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override display weight unit (kg, lb)
    #[arg(long, global = true)]
    unit: Option<String>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List exercises with their best result (default)
    List {
        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,
    },

    /// Add a new exercise
    Add {
        name: String,

        #[arg(long)]
        detail: Option<String>,

        /// weight, reps, time or other
        #[arg(long, default_value = "weight")]
        score_type: String,

        /// Unit label for "other" exercises (e.g. calories)
        #[arg(long)]
        other_units: Option<String>,
    },

    /// Edit an exercise's name, detail, score type or units
    Edit {
        /// Exercise name or id
        exercise: String,

        #[arg(long)]
        name: Option<String>,

        /// New detail; pass an empty string to clear it
        #[arg(long)]
        detail: Option<String>,

        #[arg(long)]
        score_type: Option<String>,

        #[arg(long)]
        other_units: Option<String>,
    },

    /// Show every result for an exercise, best first
    Show {
        /// Exercise name or id
        exercise: String,
    },

    /// Record a result
    Log {
        /// Exercise name or id
        exercise: String,

        /// Weight in the display unit
        #[arg(long)]
        weight: Option<i32>,

        #[arg(long)]
        reps: Option<i32>,

        /// Time as SS, M:SS or H:MM:SS (fractions allowed)
        #[arg(long)]
        time: Option<String>,

        /// Value for "other" exercises
        #[arg(long)]
        value: Option<f64>,

        #[arg(long)]
        notes: Option<String>,

        /// Date as YYYY-MM-DD (default: now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an exercise and all of its results
    Delete {
        /// Exercise name or id
        exercise: String,
    },

    /// Delete a single result
    DeleteResult {
        /// Result id or a unique prefix of it
        id: String,
    },

    /// Export all data
    Export {
        /// json or csv
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory (default: configured export dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import a JSON export
    Import { file: PathBuf },

    /// Delete everything and restore the starter exercises
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    lightweight_core::logging::init(cli.verbose);

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let unit = match cli.unit {
        Some(u) => u.parse::<WeightUnit>()?,
        None => config.display.weight_unit,
    };

    let mut store = Store::open_file(data_dir.join("store.json"))?;

    match cli.command {
        Some(Commands::List { search }) => cmd_list(&store, search.as_deref().unwrap_or(""), unit),
        Some(Commands::Add {
            name,
            detail,
            score_type,
            other_units,
        }) => cmd_add(&mut store, name, detail, &score_type, other_units),
        Some(Commands::Edit {
            exercise,
            name,
            detail,
            score_type,
            other_units,
        }) => cmd_edit(&mut store, &exercise, name, detail, score_type, other_units),
        Some(Commands::Show { exercise }) => cmd_show(&store, &exercise, unit),
        Some(Commands::Log {
            exercise,
            weight,
            reps,
            time,
            value,
            notes,
            date,
        }) => {
            let entry = LogEntry {
                weight,
                reps,
                time,
                value,
                notes,
                date,
            };
            cmd_log(&mut store, &exercise, entry, unit)
        }
        Some(Commands::Delete { exercise }) => cmd_delete(&mut store, &exercise),
        Some(Commands::DeleteResult { id }) => cmd_delete_result(&mut store, &id),
        Some(Commands::Export { format, out }) => {
            let dir = out.unwrap_or_else(|| config.export.export_dir.clone());
            cmd_export(&store, &format, dir)
        }
        Some(Commands::Import { file }) => cmd_import(&mut store, file),
        Some(Commands::Reset { yes }) => cmd_reset(&mut store, yes),
        None => cmd_list(&store, "", unit),
    }
}

fn cmd_list(store: &Store, search: &str, unit: WeightUnit) -> Result<()> {
    let exercises = store.fetch(&exercise_search(search));

    if exercises.is_empty() {
        if search.trim().is_empty() {
            println!("No exercises yet. Add one with `lightweight add <name>`.");
        } else {
            println!("No exercises match \"{}\".", search);
        }
        return Ok(());
    }

    for exercise in &exercises {
        let label = match &exercise.detail {
            Some(detail) => format!("{} ({})", exercise.name, detail),
            None => exercise.name.clone(),
        };
        let best = best_result_for(store, exercise)
            .map(|r| format_best_result(r, exercise.score_type, unit))
            .unwrap_or_default();
        println!("{:<40} {}", label, best);
    }
    Ok(())
}

fn cmd_add(
    store: &mut Store,
    name: String,
    detail: Option<String>,
    score_type: &str,
    other_units: Option<String>,
) -> Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(Error::InvalidData("Exercise name cannot be empty".into()));
    }

    let score_type: ScoreType = score_type.parse()?;
    if score_type == ScoreType::Other && other_units.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return Err(Error::InvalidData(
            "Exercises scored by \"other\" need --other-units".into(),
        ));
    }

    let mut exercise = Exercise::new(name, score_type);
    exercise.detail = detail.filter(|d| !d.is_empty());
    exercise.other_units = other_units.filter(|_| score_type == ScoreType::Other);
    store.insert(exercise.clone())?;

    println!("✓ Added {} ({})", exercise.name, exercise.score_type);
    Ok(())
}

fn cmd_edit(
    store: &mut Store,
    query: &str,
    name: Option<String>,
    detail: Option<String>,
    score_type: Option<String>,
    other_units: Option<String>,
) -> Result<()> {
    let exercise = find_exercise(store, query)?;
    let score_type = score_type.map(|s| s.parse::<ScoreType>()).transpose()?;
    if let Some(name) = &name {
        if name.trim().is_empty() {
            return Err(Error::InvalidData("Exercise name cannot be empty".into()));
        }
    }

    store.update_exercise(exercise.id, |e| {
        if let Some(name) = name {
            e.name = name.trim().to_string();
        }
        if let Some(detail) = detail {
            e.detail = if detail.is_empty() { None } else { Some(detail) };
        }
        if let Some(score_type) = score_type {
            e.score_type = score_type;
        }
        if let Some(units) = other_units {
            e.other_units = if units.is_empty() { None } else { Some(units) };
        }
    })?;

    println!("✓ Updated {}", exercise.name);
    Ok(())
}

fn cmd_show(store: &Store, query: &str, unit: WeightUnit) -> Result<()> {
    let exercise = find_exercise(store, query)?;
    let results = store.fetch(&results_for_exercise(exercise.id));

    println!("{}", exercise.name);
    if let Some(detail) = &exercise.detail {
        println!("  {}", detail);
    }
    println!();

    if results.is_empty() {
        println!("  No results yet.");
        return Ok(());
    }

    for result in &results {
        let short_id: String = result.id.to_string().chars().take(8).collect();
        println!(
            "  {:<24} {:>7}  {}{}",
            describe_result(&exercise, result, unit),
            result.date.format("%d %b").to_string(),
            short_id,
            result
                .notes
                .as_ref()
                .map(|n| format!("  {}", n))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Values entered on the command line for one result
struct LogEntry {
    weight: Option<i32>,
    reps: Option<i32>,
    time: Option<String>,
    value: Option<f64>,
    notes: Option<String>,
    date: Option<String>,
}

fn cmd_log(store: &mut Store, query: &str, entry: LogEntry, unit: WeightUnit) -> Result<()> {
    let exercise = find_exercise(store, query)?;
    let measurement = build_measurement(&exercise, &entry, unit)?;

    let date = match &entry.date {
        Some(d) => parse_date(d)?,
        None => Utc::now(),
    };

    let mut result = ExerciseResult::new(&exercise)
        .with_date(date)
        .with_measurement(measurement);
    result.notes = entry.notes.filter(|n| !n.is_empty());
    store.insert(result.clone())?;

    println!(
        "✓ Logged {} for {}",
        describe_result(&exercise, &result, unit),
        exercise.name
    );
    Ok(())
}

fn cmd_delete(store: &mut Store, query: &str) -> Result<()> {
    let exercise = find_exercise(store, query)?;
    let removed = store.delete(&exercise)?;
    println!(
        "✓ Deleted {} ({} results)",
        exercise.name,
        removed.saturating_sub(1)
    );
    Ok(())
}

fn cmd_delete_result(store: &mut Store, query: &str) -> Result<()> {
    let result = find_result(store, query)?;
    store.delete(&result)?;
    println!("✓ Deleted result {}", result.id);
    Ok(())
}

fn cmd_export(store: &Store, format: &str, dir: PathBuf) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let path = export_to_dir(store, format, &dir)?;
    println!("✓ Exported to {}", path.display());
    Ok(())
}

fn cmd_import(store: &mut Store, file: PathBuf) -> Result<()> {
    let summary = import_json_file(store, &file)?;
    println!(
        "✓ Imported {} exercises and {} results",
        summary.exercises, summary.results
    );
    Ok(())
}

fn cmd_reset(store: &mut Store, yes: bool) -> Result<()> {
    if !yes {
        eprintln!("This permanently deletes all exercises and results. Re-run with --yes to confirm.");
        return Ok(());
    }
    store.reset(&StarterSeed)?;
    println!("✓ Reset to {} starter exercises", store.exercises().len());
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve an exercise by id or by case-insensitive exact name
fn find_exercise(store: &Store, query: &str) -> Result<Exercise> {
    if let Ok(id) = Uuid::parse_str(query) {
        return store
            .get::<Exercise>(id)
            .cloned()
            .ok_or(Error::NotFound(id));
    }

    let wanted = query.trim().to_lowercase();
    let matches: Vec<&Exercise> = store
        .exercises()
        .iter()
        .filter(|e| e.name.to_lowercase() == wanted)
        .collect();

    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(Error::Other(format!("No exercise named \"{}\"", query))),
        _ => Err(Error::Other(format!(
            "Several exercises are named \"{}\"; use the id instead",
            query
        ))),
    }
}

/// Resolve a result by id or by unique id prefix
fn find_result(store: &Store, query: &str) -> Result<ExerciseResult> {
    if let Ok(id) = Uuid::parse_str(query) {
        return store
            .get::<ExerciseResult>(id)
            .cloned()
            .ok_or(Error::NotFound(id));
    }

    let prefix = query.trim().to_lowercase();
    if prefix.len() < 4 {
        return Err(Error::InvalidData("Result id prefix must be at least 4 characters".into()));
    }
    let matches: Vec<&ExerciseResult> = store
        .dataset()
        .results
        .iter()
        .filter(|r| r.id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(Error::Other(format!("No result with id \"{}\"", query))),
        _ => Err(Error::Other(format!("Result id \"{}\" is ambiguous", query))),
    }
}

/// Turn command-line values into a measurement for `exercise`'s discipline.
///
/// Weights are entered in the display unit and stored in kilograms.
fn build_measurement(exercise: &Exercise, entry: &LogEntry, unit: WeightUnit) -> Result<Measurement> {
    let stray = |flag: &str| {
        Error::InvalidData(format!(
            "--{} does not apply to a {} exercise",
            flag, exercise.score_type
        ))
    };

    let measurement = match exercise.score_type {
        ScoreType::Weight => {
            if entry.time.is_some() {
                return Err(stray("time"));
            }
            if entry.value.is_some() {
                return Err(stray("value"));
            }
            Measurement::Weight {
                weight: entry
                    .weight
                    .map(|w| convert_weight(w, unit, WeightUnit::Kilograms)),
                reps: entry.reps,
            }
        }
        ScoreType::Reps => {
            if entry.weight.is_some() {
                return Err(stray("weight"));
            }
            if entry.time.is_some() {
                return Err(stray("time"));
            }
            if entry.value.is_some() {
                return Err(stray("value"));
            }
            Measurement::Reps { reps: entry.reps }
        }
        ScoreType::Time => {
            if entry.weight.is_some() {
                return Err(stray("weight"));
            }
            if entry.reps.is_some() {
                return Err(stray("reps"));
            }
            if entry.value.is_some() {
                return Err(stray("value"));
            }
            Measurement::Time {
                seconds: entry.time.as_deref().map(parse_time).transpose()?,
            }
        }
        ScoreType::Other => {
            if entry.weight.is_some() {
                return Err(stray("weight"));
            }
            if entry.reps.is_some() {
                return Err(stray("reps"));
            }
            if entry.time.is_some() {
                return Err(stray("time"));
            }
            Measurement::Other { value: entry.value }
        }
    };

    if measurement.is_blank() {
        return Err(Error::InvalidData(format!(
            "Nothing to log: give a value for this {} exercise",
            exercise.score_type
        )));
    }
    Ok(measurement)
}

fn parse_date(input: &str) -> Result<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidData(format!("Invalid date {:?}: {}", input, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidData(format!("Invalid date {:?}", input)))?;
    Ok(midnight.and_utc())
}

fn reps_label(reps: i32) -> String {
    if reps == 1 {
        "1 rep".into()
    } else {
        format!("{} reps", reps)
    }
}

/// One-line rendering of a result in the exercise's discipline
fn describe_result(exercise: &Exercise, result: &ExerciseResult, unit: WeightUnit) -> String {
    match exercise.score_type {
        ScoreType::Weight => {
            let weight = result.weight().map(|w| format_weight(w, unit));
            let reps = result.reps().map(reps_label);
            match (weight, reps) {
                (Some(w), Some(r)) => format!("{} · {}", w, r),
                (Some(w), None) => w,
                (None, Some(r)) => r,
                (None, None) => "-".into(),
            }
        }
        ScoreType::Reps => result.reps().map(reps_label).unwrap_or_else(|| "-".into()),
        ScoreType::Time => result.time().map(format_time).unwrap_or_else(|| "-".into()),
        ScoreType::Other => result
            .other_value()
            .map(|v| format_other_with_units(v, exercise.other_units.as_deref()))
            .unwrap_or_else(|| "-".into()),
    }
}
