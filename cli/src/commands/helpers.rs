use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::models::{DATE_FORMAT, SetMetrics, WorkoutExercise};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, DATE_FORMAT).with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Turn a 1-based position typed by the user into an index.
pub(crate) fn to_index(position: usize, what: &str) -> Result<usize> {
    if position == 0 {
        bail!("{what} numbers start at 1");
    }
    Ok(position - 1)
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn format_set(metrics: &SetMetrics) -> String {
    match *metrics {
        SetMetrics::Strength { weight_kg, reps } => format!("{weight_kg}kg x {reps}"),
        SetMetrics::Cardio {
            duration_min,
            speed_kmh,
            incline_pct,
        } => format!("{duration_min}min @ {speed_kmh}km/h, {incline_pct}%"),
    }
}

pub(crate) fn print_workout_table(exercises: &[WorkoutExercise]) {
    #[derive(Tabled)]
    struct SetRow {
        #[tabled(rename = "#")]
        exercise: String,
        #[tabled(rename = "Exercise")]
        name: String,
        #[tabled(rename = "Muscle")]
        muscle: String,
        #[tabled(rename = "Set")]
        set: usize,
        #[tabled(rename = "Values")]
        values: String,
        #[tabled(rename = "Done")]
        done: String,
    }

    let rows: Vec<SetRow> = exercises
        .iter()
        .enumerate()
        .flat_map(|(i, ex)| {
            ex.sets.iter().enumerate().map(move |(j, s)| SetRow {
                exercise: if j == 0 { (i + 1).to_string() } else { String::new() },
                name: if j == 0 { truncate(&ex.name, 35) } else { String::new() },
                muscle: if j == 0 { ex.muscle.to_string() } else { String::new() },
                set: j + 1,
                values: format_set(&s.metrics),
                done: if s.completed { "x".into() } else { String::new() },
            })
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
