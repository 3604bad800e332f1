//! Training digest and prompt for the AI workout coach.
//!
//! Only completed sets are sent. Cardio sets carry time, speed and incline;
//! strength sets carry load and reps.

use std::future::Future;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DATE_FORMAT, History, MuscleGroup, SetMetrics, WorkoutExercise};

/// How many workout days the coach looks back over.
pub const COACH_DAYS: usize = 30;

pub trait WorkoutCoach: Send + Sync {
    /// Free-form advice for a prompt built by [`coach_prompt`].
    fn advise(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestDay {
    pub date: String,
    pub exercises: Vec<DigestExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestExercise {
    pub name: String,
    pub muscle: MuscleGroup,
    pub sets: Vec<DigestSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DigestSet {
    Strength { kg: f64, reps: u32 },
    Cardio { min: f64, kmh: f64, incline: f64 },
}

fn digest_exercise(ex: &WorkoutExercise) -> DigestExercise {
    let sets = ex
        .sets
        .iter()
        .filter(|s| s.completed)
        .map(|s| match s.metrics {
            SetMetrics::Strength { weight_kg, reps } => DigestSet::Strength {
                kg: weight_kg,
                reps,
            },
            SetMetrics::Cardio {
                duration_min,
                speed_kmh,
                incline_pct,
            } => DigestSet::Cardio {
                min: duration_min,
                kmh: speed_kmh,
                incline: incline_pct,
            },
        })
        .collect();
    DigestExercise {
        name: ex.name.clone(),
        muscle: ex.muscle,
        sets,
    }
}

/// The last `days` dates with a workout, oldest first.
#[must_use]
pub fn workout_digest(history: &History, days: usize) -> Vec<DigestDay> {
    let mut digest: Vec<DigestDay> = history
        .iter()
        .rev()
        .filter(|(_, log)| log.has_workout())
        .take(days)
        .map(|(date, log): (NaiveDate, _)| DigestDay {
            date: date.format(DATE_FORMAT).to_string(),
            exercises: log.exercises().iter().map(digest_exercise).collect(),
        })
        .collect();
    digest.reverse();
    digest
}

/// `None` when no set in the window was completed, so there is nothing to
/// analyze.
#[must_use]
pub fn coach_prompt(history: &History, days: usize) -> Option<String> {
    let digest = workout_digest(history, days);
    let completed = digest
        .iter()
        .flat_map(|d| &d.exercises)
        .any(|ex| !ex.sets.is_empty());
    if !completed {
        return None;
    }
    let data = serde_json::to_string(&digest).ok()?;
    Some(format!(
        "You are a professional personal trainer. Analyze this user's training log \
for their last {count} workout day(s). Strength sets list load in kg and reps; cardio \
sets list minutes, speed in km/h and incline in percent.\n\
{data}\n\n\
Cover:\n\
1. Progressive overload: are loads or reps going up?\n\
2. Muscle balance: are some groups trained much more than others?\n\
3. Cardio: is there enough of it?\n\
4. Consistency: how many times a week do they train?\n\
5. One key recommendation to improve results, such as raising the load on a \
specific exercise or adding a new one.\n\n\
Keep it energetic and professional.",
        count = digest.len()
    ))
}
