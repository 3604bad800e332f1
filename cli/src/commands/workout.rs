use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use tabled::{Table, Tabled, settings::Style};

use nutrilog_core::models::{DATE_FORMAT, MuscleGroup, WorkoutLog};
use nutrilog_core::session::Session;
use nutrilog_core::workout::{
    EXERCISE_CATALOG, ExerciseDefinition, SetUpdate, exercises_for, find_exercise,
    search_exercises,
};

use super::helpers::{parse_date, print_workout_table, to_index};

#[derive(Debug, Default, Args)]
pub(crate) struct SetArgs {
    /// Weight in kg (strength)
    #[arg(long)]
    pub weight: Option<f64>,
    /// Repetitions (strength)
    #[arg(long)]
    pub reps: Option<u32>,
    /// Duration in minutes (cardio)
    #[arg(long)]
    pub duration: Option<f64>,
    /// Speed in km/h (cardio)
    #[arg(long)]
    pub speed: Option<f64>,
    /// Incline in percent (cardio)
    #[arg(long)]
    pub incline: Option<f64>,
    /// Mark the set as completed
    #[arg(long, conflicts_with = "undone")]
    pub done: bool,
    /// Mark the set as not completed
    #[arg(long)]
    pub undone: bool,
}

impl SetArgs {
    fn to_update(&self) -> SetUpdate {
        let completed = match (self.done, self.undone) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        SetUpdate {
            weight_kg: self.weight,
            reps: self.reps,
            duration_min: self.duration,
            speed_kmh: self.speed,
            incline_pct: self.incline,
            completed,
        }
    }
}

fn current_workout(session: &Session, date: NaiveDate) -> WorkoutLog {
    session.log_for(date).workout.unwrap_or_default()
}

fn print_result(session: &Session, date: NaiveDate, json: bool) -> Result<()> {
    let workout = current_workout(session, date);
    if json {
        println!("{}", serde_json::to_string_pretty(&workout)?);
    } else if workout.exercises.is_empty() {
        println!("No exercises logged for {}", date.format(DATE_FORMAT));
    } else {
        print_workout_table(&workout.exercises);
    }
    Ok(())
}

pub(crate) fn cmd_workout_show(session: &Session, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    if !json {
        println!("=== Workout {} ===", date.format(DATE_FORMAT));
    }
    print_result(session, date, json)
}

pub(crate) fn cmd_exercises(
    muscle: Option<&str>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct ExerciseRow {
        #[tabled(rename = "ID")]
        id: &'static str,
        #[tabled(rename = "Name")]
        name: &'static str,
        #[tabled(rename = "Muscle")]
        muscle: MuscleGroup,
    }

    let mut found: Vec<&ExerciseDefinition> = match search {
        Some(term) => search_exercises(term),
        None => EXERCISE_CATALOG.iter().collect(),
    };
    if let Some(m) = muscle {
        let muscle: MuscleGroup = m.parse()?;
        let allowed: Vec<&str> = exercises_for(muscle).map(|d| d.id).collect();
        found.retain(|d| allowed.contains(&d.id));
    }

    if json {
        let items: Vec<serde_json::Value> = found
            .iter()
            .map(|d| serde_json::json!({ "id": d.id, "name": d.name, "muscle": d.muscle }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if found.is_empty() {
        eprintln!("No exercises match");
        return Ok(());
    }

    let rows: Vec<ExerciseRow> = found
        .iter()
        .map(|d| ExerciseRow {
            id: d.id,
            name: d.name,
            muscle: d.muscle,
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_workout_add(
    session: &mut Session,
    exercise_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let def = find_exercise(exercise_id).with_context(|| {
        format!("Unknown exercise '{exercise_id}'. Use `nutrilog workout exercises` to list them")
    })?;
    let date = parse_date(date)?;
    let mut workout = current_workout(session, date);
    workout.add_exercise(def);
    let position = workout.exercises.len();
    session.save_workout(date, workout)?;

    if !json {
        println!("Added {} as exercise {position}", def.name);
    }
    print_result(session, date, json)
}

pub(crate) fn cmd_workout_set(
    session: &mut Session,
    exercise: usize,
    set: usize,
    args: &SetArgs,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let update = args.to_update();
    if update.completed.is_none()
        && args.weight.is_none()
        && args.reps.is_none()
        && args.duration.is_none()
        && args.speed.is_none()
        && args.incline.is_none()
    {
        bail!("Nothing to change. Pass values such as --weight/--reps or --done");
    }
    let exercise = to_index(exercise, "Exercise")?;
    let set = to_index(set, "Set")?;
    let date = parse_date(date)?;

    let mut workout = current_workout(session, date);
    workout.exercise_mut(exercise)?.update_set(set, update)?;
    session.save_workout(date, workout)?;
    print_result(session, date, json)
}

pub(crate) fn cmd_workout_add_set(
    session: &mut Session,
    exercise: usize,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let exercise = to_index(exercise, "Exercise")?;
    let date = parse_date(date)?;
    let mut workout = current_workout(session, date);
    workout.exercise_mut(exercise)?.add_set();
    session.save_workout(date, workout)?;
    print_result(session, date, json)
}

pub(crate) fn cmd_workout_remove(
    session: &mut Session,
    exercise: usize,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let exercise = to_index(exercise, "Exercise")?;
    let date = parse_date(date)?;
    let mut workout = current_workout(session, date);
    let removed = workout.remove_exercise(exercise)?;
    session.save_workout(date, workout)?;

    if !json {
        println!("Removed {}", removed.name);
    }
    print_result(session, date, json)
}

pub(crate) fn cmd_template_list(session: &Session, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct TemplateRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Exercises")]
        exercises: String,
    }

    let templates = session.templates();
    if json {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    let rows: Vec<TemplateRow> = templates
        .iter()
        .map(|t| TemplateRow {
            id: t.id.clone(),
            name: t.name.clone(),
            exercises: t
                .exercises
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_template_save(
    session: &mut Session,
    name: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let template = session.save_template(date, name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
    } else {
        println!(
            "Saved routine '{}' ({} exercises)",
            template.name,
            template.exercises.len()
        );
    }
    Ok(())
}

pub(crate) fn cmd_template_load(
    session: &mut Session,
    key: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let template = session.load_template(date, key)?;
    if !json {
        println!("Loaded routine '{}'", template.name);
    }
    print_result(session, date, json)
}
