use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DailyLog, History, MuscleGroup, SetMetrics, Targets};

/// How many recorded days the period report covers.
pub const REPORT_DAYS: usize = 30;

/// One day's intake against the targets. Ratios are `consumed / target`,
/// left unclamped so overshoot is visible; a zero target gives 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyProgress {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub sodium: f64,
    pub water: f64,
    pub remaining_calories: f64,
    pub over_calories: bool,
}

fn ratio(value: f64, target: f64) -> f64 {
    if target > 0.0 { value / target } else { 0.0 }
}

impl DailyProgress {
    #[must_use]
    pub fn compute(log: &DailyLog, targets: &Targets) -> Self {
        let t = &log.totals;
        let n = &targets.nutrients;
        Self {
            calories: ratio(t.calories, n.calories),
            protein: ratio(t.protein, n.protein),
            carbs: ratio(t.carbs, n.carbs),
            fat: ratio(t.fat, n.fat),
            fiber: ratio(t.fiber, n.fiber),
            sugar: ratio(t.sugar, n.sugar),
            sodium: ratio(t.sodium, n.sodium),
            water: ratio(f64::from(log.water_intake), f64::from(targets.water_target)),
            remaining_calories: (n.calories - t.calories).max(0.0),
            over_calories: t.calories > n.calories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRow {
    pub date: NaiveDate,
    pub calories: f64,
    pub protein: f64,
    pub water_intake: u32,
    pub weight: Option<f64>,
    /// Sum of weight x reps over completed strength sets.
    pub volume: f64,
    pub cardio_minutes: f64,
    pub exercises: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub days: usize,
    pub avg_calories: f64,
    pub avg_protein: f64,
    pub total_volume: f64,
    pub total_cardio_minutes: f64,
    pub workout_days: usize,
    pub avg_weight: Option<f64>,
    /// Last weigh-in minus the first one in the period.
    pub weight_change: Option<f64>,
    pub top_muscle: Option<MuscleGroup>,
    /// Newest first.
    pub rows: Vec<DayRow>,
}

fn day_row(date: NaiveDate, log: &DailyLog) -> DayRow {
    let mut volume = 0.0;
    let mut cardio = 0.0;
    for ex in log.exercises() {
        for set in ex.sets.iter().filter(|s| s.completed) {
            match set.metrics {
                SetMetrics::Strength { weight_kg, reps } => volume += weight_kg * f64::from(reps),
                SetMetrics::Cardio { duration_min, .. } => cardio += duration_min,
            }
        }
    }
    DayRow {
        date,
        calories: log.totals.calories,
        protein: log.totals.protein,
        water_intake: log.water_intake,
        weight: log.weight,
        volume,
        cardio_minutes: cardio,
        exercises: log.exercises().len(),
    }
}

/// Aggregate the last `days` recorded dates. Empty logs count as unrecorded.
/// `None` when nothing is recorded.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_report(history: &History, days: usize) -> Option<PeriodReport> {
    let window = history.recent(days);
    if window.is_empty() {
        return None;
    }
    let count = window.len() as f64;

    let mut muscle_focus: BTreeMap<MuscleGroup, usize> = BTreeMap::new();
    let mut weights = Vec::new();
    let mut workout_days = 0;
    let mut rows = Vec::with_capacity(window.len());

    for (date, log) in &window {
        if log.has_workout() {
            workout_days += 1;
            for ex in log.exercises() {
                *muscle_focus.entry(ex.muscle).or_default() += 1;
            }
        }
        if let Some(w) = log.weight.filter(|w| *w > 0.0) {
            weights.push(w);
        }
        rows.push(day_row(*date, log));
    }

    let avg_weight = (!weights.is_empty()).then(|| weights.iter().sum::<f64>() / weights.len() as f64);
    let weight_change = match (weights.first(), weights.last()) {
        (Some(first), Some(last)) => Some(last - first),
        _ => None,
    };
    // Ties go to the earlier muscle group in catalog order.
    let top_muscle = muscle_focus
        .into_iter()
        .max_by_key(|(muscle, n)| (*n, Reverse(*muscle)))
        .map(|(muscle, _)| muscle);

    let report = PeriodReport {
        days: window.len(),
        avg_calories: (rows.iter().map(|r| r.calories).sum::<f64>() / count).round(),
        avg_protein: (rows.iter().map(|r| r.protein).sum::<f64>() / count).round(),
        total_volume: rows.iter().map(|r| r.volume).sum(),
        total_cardio_minutes: rows.iter().map(|r| r.cardio_minutes).sum(),
        workout_days,
        avg_weight,
        weight_change,
        top_muscle,
        rows: rows.into_iter().rev().collect(),
    };
    Some(report)
}
