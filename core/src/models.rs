use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Cumulative nutrient amounts. Used both for a day's running totals and for
/// the nutrient half of [`Targets`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub sodium: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Targets {
    #[serde(flatten)]
    pub nutrients: NutritionTotals,
    /// Daily water goal in ml.
    pub water_target: u32,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            nutrients: NutritionTotals {
                calories: 2950.0,
                protein: 170.0,
                carbs: 430.0,
                fat: 62.0,
                fiber: 35.0,
                sugar: 50.0,
                sodium: 2300.0,
            },
            water_target: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: String,
    pub name: String,
    pub timestamp: String,
    #[serde(default)]
    pub nutrition: NutritionTotals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Supplements {
    pub creatine: bool,
    pub multivitamin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplementKind {
    Creatine,
    Multivitamin,
}

impl Supplements {
    #[must_use]
    pub fn get(&self, kind: SupplementKind) -> bool {
        match kind {
            SupplementKind::Creatine => self.creatine,
            SupplementKind::Multivitamin => self.multivitamin,
        }
    }

    #[must_use]
    pub fn toggled(mut self, kind: SupplementKind) -> Self {
        match kind {
            SupplementKind::Creatine => self.creatine = !self.creatine,
            SupplementKind::Multivitamin => self.multivitamin = !self.multivitamin,
        }
        self
    }
}

impl FromStr for SupplementKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "creatine" => Ok(Self::Creatine),
            "multivitamin" | "multi" => Ok(Self::Multivitamin),
            _ => bail!("Invalid supplement '{s}'. Must be one of: creatine, multivitamin"),
        }
    }
}

impl fmt::Display for SupplementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creatine => f.write_str("creatine"),
            Self::Multivitamin => f.write_str("multivitamin"),
        }
    }
}

// --- Workouts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MuscleGroup {
    Chest,
    Back,
    Legs,
    Shoulders,
    Arms,
    Core,
    Cardio,
}

pub const MUSCLE_GROUPS: &[MuscleGroup] = &[
    MuscleGroup::Chest,
    MuscleGroup::Back,
    MuscleGroup::Legs,
    MuscleGroup::Shoulders,
    MuscleGroup::Arms,
    MuscleGroup::Core,
    MuscleGroup::Cardio,
];

impl MuscleGroup {
    #[must_use]
    pub fn is_cardio(self) -> bool {
        self == Self::Cardio
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chest => "Chest",
            Self::Back => "Back",
            Self::Legs => "Legs",
            Self::Shoulders => "Shoulders",
            Self::Arms => "Arms",
            Self::Core => "Core",
            Self::Cardio => "Cardio",
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MuscleGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        MUSCLE_GROUPS
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid muscle group '{s}'. Must be one of: {}",
                    MUSCLE_GROUPS
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Measurements of one set. Which variant applies is decided by the parent
/// exercise's muscle group, never by the set itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetMetrics {
    Strength {
        weight_kg: f64,
        reps: u32,
    },
    Cardio {
        duration_min: f64,
        speed_kmh: f64,
        incline_pct: f64,
    },
}

impl SetMetrics {
    #[must_use]
    pub fn empty_for(muscle: MuscleGroup) -> Self {
        if muscle.is_cardio() {
            Self::Cardio {
                duration_min: 0.0,
                speed_kmh: 0.0,
                incline_pct: 0.0,
            }
        } else {
            Self::Strength {
                weight_kg: 0.0,
                reps: 0,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSet {
    pub id: String,
    pub metrics: SetMetrics,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWorkoutExercise", into = "RawWorkoutExercise")]
pub struct WorkoutExercise {
    /// Instance id, unique within a workout.
    pub id: String,
    /// Id into the static exercise catalog.
    pub exercise_id: String,
    pub name: String,
    pub muscle: MuscleGroup,
    pub sets: Vec<ExerciseSet>,
}

// Stored documents keep sets as flat records with every metric optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkoutExercise {
    #[serde(default)]
    id: String,
    exercise_id: String,
    name: String,
    muscle: MuscleGroup,
    #[serde(default)]
    sets: Vec<RawExerciseSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawExerciseSet {
    #[serde(default)]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    incline: Option<f64>,
    #[serde(default)]
    completed: bool,
}

impl From<RawWorkoutExercise> for WorkoutExercise {
    #[allow(clippy::cast_sign_loss)]
    fn from(raw: RawWorkoutExercise) -> Self {
        let muscle = raw.muscle;
        let sets = raw
            .sets
            .into_iter()
            .map(|s| {
                let metrics = if muscle.is_cardio() {
                    SetMetrics::Cardio {
                        duration_min: s.time.unwrap_or(0.0),
                        speed_kmh: s.speed.unwrap_or(0.0),
                        incline_pct: s.incline.unwrap_or(0.0),
                    }
                } else {
                    SetMetrics::Strength {
                        weight_kg: s.weight.unwrap_or(0.0),
                        reps: s.reps.unwrap_or(0.0).max(0.0).round() as u32,
                    }
                };
                ExerciseSet {
                    id: s.id,
                    metrics,
                    completed: s.completed,
                }
            })
            .collect();
        Self {
            id: raw.id,
            exercise_id: raw.exercise_id,
            name: raw.name,
            muscle,
            sets,
        }
    }
}

impl From<WorkoutExercise> for RawWorkoutExercise {
    fn from(ex: WorkoutExercise) -> Self {
        let sets = ex
            .sets
            .into_iter()
            .map(|s| {
                let mut raw = RawExerciseSet {
                    id: s.id,
                    completed: s.completed,
                    ..RawExerciseSet::default()
                };
                match s.metrics {
                    SetMetrics::Strength { weight_kg, reps } => {
                        raw.weight = Some(weight_kg);
                        raw.reps = Some(f64::from(reps));
                    }
                    SetMetrics::Cardio {
                        duration_min,
                        speed_kmh,
                        incline_pct,
                    } => {
                        raw.time = Some(duration_min);
                        raw.speed = Some(speed_kmh);
                        raw.incline = Some(incline_pct);
                    }
                }
                raw
            })
            .collect();
        Self {
            id: ex.id,
            exercise_id: ex.exercise_id,
            name: ex.name,
            muscle: ex.muscle,
            sets,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutLog {
    #[serde(default)]
    pub exercises: Vec<WorkoutExercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// --- Daily log ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    #[serde(flatten)]
    pub totals: NutritionTotals,
    #[serde(default)]
    pub meals: Vec<MealEntry>,
    /// Water drunk so far, in ml.
    #[serde(default)]
    pub water_intake: u32,
    #[serde(default)]
    pub supplements: Supplements,
    /// Body weight in kg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout: Option<WorkoutLog>,
}

impl DailyLog {
    /// True when the day has at least one exercise. A missing workout and an
    /// empty one are the same thing.
    #[must_use]
    pub fn has_workout(&self) -> bool {
        self.workout.as_ref().is_some_and(|w| !w.exercises.is_empty())
    }

    #[must_use]
    pub fn exercises(&self) -> &[WorkoutExercise] {
        self.workout.as_ref().map_or(&[], |w| w.exercises.as_slice())
    }

    /// Reads the same as a date with no entry at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals == NutritionTotals::default()
            && self.meals.is_empty()
            && self.water_intake == 0
            && self.supplements == Supplements::default()
            && self.weight.is_none()
            && !self.has_workout()
    }
}

/// Date-keyed collection of daily logs. A date with no entry reads as
/// `DailyLog::default()`; go through [`History::get_log`] rather than
/// indexing the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(BTreeMap<NaiveDate, DailyLog>);

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_log(&self, date: NaiveDate) -> DailyLog {
        self.0.get(&date).cloned().unwrap_or_default()
    }

    /// Copy of this history with `date`'s log replaced.
    #[must_use]
    pub fn with_log(&self, date: NaiveDate, log: DailyLog) -> Self {
        let mut next = self.clone();
        next.0.insert(date, log);
        next
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, &DailyLog)> {
        self.0.iter().map(|(d, l)| (*d, l))
    }

    /// The `n` most recent recorded dates, oldest first. Dates whose log is
    /// empty don't count as recorded.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<(NaiveDate, &DailyLog)> {
        let mut days: Vec<_> = self
            .iter()
            .rev()
            .filter(|(_, l)| !l.is_empty())
            .take(n)
            .collect();
        days.reverse();
        days
    }
}

impl FromIterator<(NaiveDate, DailyLog)> for History {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, DailyLog)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The whole durable state; also the remote wire document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub history: History,
    pub targets: Targets,
}

// --- Validation ---

pub fn validate_targets(targets: &Targets) -> Result<()> {
    let n = &targets.nutrients;
    for (name, value) in [
        ("calories", n.calories),
        ("protein", n.protein),
        ("carbs", n.carbs),
        ("fat", n.fat),
        ("fiber", n.fiber),
        ("sugar", n.sugar),
        ("sodium", n.sodium),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("Target {name} must be a non-negative number");
        }
    }
    Ok(())
}

pub fn validate_weight(weight_kg: f64) -> Result<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(())
}

pub fn parse_date_key(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| anyhow::anyhow!("Invalid date '{s}'. Use YYYY-MM-DD"))
}
