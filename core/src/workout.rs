//! Static exercise catalog, per-exercise set editing, and saved routines.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ExerciseSet, MuscleGroup, SetMetrics, WorkoutExercise, WorkoutLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExerciseDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub muscle: MuscleGroup,
}

const fn def(id: &'static str, name: &'static str, muscle: MuscleGroup) -> ExerciseDefinition {
    ExerciseDefinition { id, name, muscle }
}

pub const EXERCISE_CATALOG: &[ExerciseDefinition] = &[
    def("chest_press_machine", "Chest Press Machine", MuscleGroup::Chest),
    def("decline_cable_press", "Decline Cable Press Full", MuscleGroup::Chest),
    def("decline_cable_fly", "Decline Cable Flys", MuscleGroup::Chest),
    def("bench_press", "Barbell Bench Press", MuscleGroup::Chest),
    def("lat_pulldown_wide", "Lat Pull Down Wide", MuscleGroup::Back),
    def("lat_pulldown_close", "Lat Pulldown Close Grip ( 11 )", MuscleGroup::Back),
    def("seated_row_neutral", "Seated Rows Neutral Grip 11", MuscleGroup::Back),
    def("seated_row_wide", "Seated Row Wide Grip", MuscleGroup::Back),
    def("rows_machine_wide", "Rows Machine Wide Grip", MuscleGroup::Back),
    def("back_extension", "Back Extension (Glutes/Erector)", MuscleGroup::Back),
    def("db_rdl", "Dumbbell Romanian Deadlift", MuscleGroup::Legs),
    def("seated_leg_curl", "Seated Leg Curl Down", MuscleGroup::Legs),
    def("leg_extensions", "Leg Extensions", MuscleGroup::Legs),
    def("machine_abduction", "Machine Abductions", MuscleGroup::Legs),
    def("standing_calf_raise_db", "Standing Calf Raises With Dumbbell", MuscleGroup::Legs),
    def("leg_press", "Leg Presses", MuscleGroup::Legs),
    def("seated_calf_raise", "Seated Calf Raise", MuscleGroup::Legs),
    def("front_shoulder_press_machine", "Front Shoulder Presses Machine", MuscleGroup::Shoulders),
    def("lateral_raises_bench", "Lateral Raises On Bench Shoulder", MuscleGroup::Shoulders),
    def("rear_delt_fly_machine", "Rear Delt Fly Machine", MuscleGroup::Shoulders),
    def("tricep_rope_pushdown", "Triceps Rope Pushdown", MuscleGroup::Arms),
    def("tricep_cable_overhead", "Seated Triceps Cable Overhead Extension", MuscleGroup::Arms),
    def("bicep_incline_db_curl", "Biceps Inclined Dumbbell Curls", MuscleGroup::Arms),
    def("preacher_curl_machine", "Preacher Curl Machine", MuscleGroup::Arms),
    def("cable_curl_pronated", "Cable Curl Pronated Grip", MuscleGroup::Arms),
    def("crunches", "Crunches", MuscleGroup::Core),
    def("russian_twist", "Russian Twist Exercise", MuscleGroup::Core),
    def("plank", "Plank Core", MuscleGroup::Core),
    def("treadmill", "Treadmill Run", MuscleGroup::Cardio),
    def("bike", "Stationary Bike", MuscleGroup::Cardio),
    def("elliptical", "Elliptical (Orbitrak)", MuscleGroup::Cardio),
    def("stairmaster", "Stairmaster (Steps)", MuscleGroup::Cardio),
    def("rowing", "Rowing Machine", MuscleGroup::Cardio),
    def("arc_trainer", "Arc Trainer", MuscleGroup::Cardio),
    def("rope_jumps", "Jump Rope", MuscleGroup::Cardio),
];

#[must_use]
pub fn find_exercise(id: &str) -> Option<&'static ExerciseDefinition> {
    EXERCISE_CATALOG.iter().find(|e| e.id == id)
}

pub fn exercises_for(muscle: MuscleGroup) -> impl Iterator<Item = &'static ExerciseDefinition> {
    EXERCISE_CATALOG.iter().filter(move |e| e.muscle == muscle)
}

/// Case-insensitive substring match on name or id.
#[must_use]
pub fn search_exercises(term: &str) -> Vec<&'static ExerciseDefinition> {
    let term = term.trim().to_lowercase();
    EXERCISE_CATALOG
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&term) || e.id.contains(&term))
        .collect()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl ExerciseDefinition {
    /// A fresh exercise instance with one empty set. The set variant is fixed
    /// here from the muscle group.
    #[must_use]
    pub fn start(&self) -> WorkoutExercise {
        WorkoutExercise {
            id: new_id(),
            exercise_id: self.id.to_string(),
            name: self.name.to_string(),
            muscle: self.muscle,
            sets: vec![ExerciseSet {
                id: new_id(),
                metrics: SetMetrics::empty_for(self.muscle),
                completed: false,
            }],
        }
    }
}

/// Partial edit of one set. Fields that do not belong to the set's variant
/// are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetUpdate {
    pub weight_kg: Option<f64>,
    pub reps: Option<u32>,
    pub duration_min: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub incline_pct: Option<f64>,
    pub completed: Option<bool>,
}

impl SetUpdate {
    fn has_strength_fields(&self) -> bool {
        self.weight_kg.is_some() || self.reps.is_some()
    }

    fn has_cardio_fields(&self) -> bool {
        self.duration_min.is_some() || self.speed_kmh.is_some() || self.incline_pct.is_some()
    }
}

impl WorkoutExercise {
    /// Append a set that copies the previous set's numbers, not completed.
    pub fn add_set(&mut self) {
        let metrics = self
            .sets
            .last()
            .map_or_else(|| SetMetrics::empty_for(self.muscle), |s| s.metrics);
        self.sets.push(ExerciseSet {
            id: new_id(),
            metrics,
            completed: false,
        });
    }

    pub fn update_set(&mut self, index: usize, update: SetUpdate) -> Result<()> {
        let name = self.name.clone();
        let Some(set) = self.sets.get_mut(index) else {
            bail!("Set {} does not exist for '{name}'", index + 1);
        };

        for value in [
            update.weight_kg,
            update.duration_min,
            update.speed_kmh,
            update.incline_pct,
        ]
        .into_iter()
        .flatten()
        {
            if !value.is_finite() || value < 0.0 {
                bail!("Set values must be non-negative numbers");
            }
        }

        match &mut set.metrics {
            SetMetrics::Strength { weight_kg, reps } => {
                if update.has_cardio_fields() {
                    bail!("'{name}' is a strength exercise; use weight and reps");
                }
                if let Some(w) = update.weight_kg {
                    *weight_kg = w;
                }
                if let Some(r) = update.reps {
                    *reps = r;
                }
            }
            SetMetrics::Cardio {
                duration_min,
                speed_kmh,
                incline_pct,
            } => {
                if update.has_strength_fields() {
                    bail!("'{name}' is a cardio exercise; use duration, speed and incline");
                }
                if let Some(d) = update.duration_min {
                    *duration_min = d;
                }
                if let Some(s) = update.speed_kmh {
                    *speed_kmh = s;
                }
                if let Some(i) = update.incline_pct {
                    *incline_pct = i;
                }
            }
        }
        if let Some(done) = update.completed {
            set.completed = done;
        }
        Ok(())
    }

    /// Copy with fresh instance and set ids and every set reset to not done.
    #[must_use]
    pub fn fresh_copy(&self) -> Self {
        Self {
            id: new_id(),
            sets: self
                .sets
                .iter()
                .map(|s| ExerciseSet {
                    id: new_id(),
                    metrics: s.metrics,
                    completed: false,
                })
                .collect(),
            ..self.clone()
        }
    }
}

impl WorkoutLog {
    pub fn add_exercise(&mut self, def: &ExerciseDefinition) -> &mut WorkoutExercise {
        let index = self.exercises.len();
        self.exercises.push(def.start());
        &mut self.exercises[index]
    }

    pub fn exercise_mut(&mut self, index: usize) -> Result<&mut WorkoutExercise> {
        let count = self.exercises.len();
        self.exercises
            .get_mut(index)
            .with_context(|| format!("Exercise {} does not exist (workout has {count})", index + 1))
    }

    pub fn remove_exercise(&mut self, index: usize) -> Result<WorkoutExercise> {
        if index >= self.exercises.len() {
            bail!(
                "Exercise {} does not exist (workout has {})",
                index + 1,
                self.exercises.len()
            );
        }
        Ok(self.exercises.remove(index))
    }
}

// --- Templates ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub exercises: Vec<WorkoutExercise>,
}

impl WorkoutTemplate {
    pub fn from_exercises(name: &str, exercises: &[WorkoutExercise]) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Routine name must not be empty");
        }
        if exercises.is_empty() {
            bail!("Cannot save an empty routine");
        }
        Ok(Self {
            id: new_id(),
            name: name.to_string(),
            exercises: exercises.iter().map(WorkoutExercise::fresh_copy).collect(),
        })
    }

    /// Exercises ready to append to a workout.
    #[must_use]
    pub fn instantiate(&self) -> Vec<WorkoutExercise> {
        self.exercises.iter().map(WorkoutExercise::fresh_copy).collect()
    }
}

/// `target` is reps for strength work and minutes for cardio.
fn template(id: &str, name: &str, plan: &[(&str, usize, u32)]) -> WorkoutTemplate {
    let exercises = plan
        .iter()
        .filter_map(|&(exercise_id, sets, target)| {
            let def = find_exercise(exercise_id)?;
            let mut metrics = SetMetrics::empty_for(def.muscle);
            match &mut metrics {
                SetMetrics::Strength { reps, .. } => *reps = target,
                SetMetrics::Cardio { duration_min, .. } => *duration_min = f64::from(target),
            }
            let mut ex = def.start();
            ex.sets = (0..sets)
                .map(|_| ExerciseSet {
                    id: new_id(),
                    metrics,
                    completed: false,
                })
                .collect();
            Some(ex)
        })
        .collect();
    WorkoutTemplate {
        id: id.to_string(),
        name: name.to_string(),
        exercises,
    }
}

/// Routines offered before the user has saved any of their own.
#[must_use]
pub fn default_templates() -> Vec<WorkoutTemplate> {
    vec![
        template(
            "user_day_1",
            "Day 1: Push",
            &[
                ("chest_press_machine", 3, 10),
                ("decline_cable_press", 3, 10),
                ("front_shoulder_press_machine", 3, 10),
                ("lateral_raises_bench", 3, 12),
                ("tricep_rope_pushdown", 3, 10),
                ("tricep_cable_overhead", 3, 12),
                ("crunches", 3, 20),
            ],
        ),
        template(
            "user_day_2",
            "Day 2: Pull",
            &[
                ("lat_pulldown_wide", 3, 10),
                ("seated_row_neutral", 3, 10),
                ("seated_row_wide", 3, 10),
                ("back_extension", 3, 12),
                ("rear_delt_fly_machine", 3, 10),
                ("bicep_incline_db_curl", 3, 10),
                ("preacher_curl_machine", 3, 10),
            ],
        ),
        template(
            "user_day_3",
            "Day 3: Legs & Core",
            &[
                ("db_rdl", 3, 15),
                ("seated_leg_curl", 3, 10),
                ("leg_extensions", 3, 12),
                ("machine_abduction", 3, 10),
                ("standing_calf_raise_db", 4, 15),
                ("russian_twist", 3, 20),
                ("plank", 3, 60),
            ],
        ),
        template(
            "user_day_4",
            "Day 4: Full Body",
            &[
                ("leg_press", 3, 10),
                ("seated_calf_raise", 3, 20),
                ("decline_cable_fly", 3, 10),
                ("chest_press_machine", 3, 10),
                ("lat_pulldown_close", 3, 10),
                ("rows_machine_wide", 3, 10),
                ("cable_curl_pronated", 3, 15),
            ],
        ),
        template(
            "arnold_1",
            "Arnold: Chest & Back",
            &[("bench_press", 3, 10), ("lat_pulldown_wide", 3, 10)],
        ),
        template(
            "ul_1",
            "Upper Body",
            &[("chest_press_machine", 3, 10), ("lat_pulldown_wide", 3, 10)],
        ),
    ]
}
