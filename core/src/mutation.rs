//! Pure edits of a [`History`]. Each returns a new history with only the
//! given date's log replaced; the input is never touched.

use anyhow::Result;
use chrono::NaiveDate;

use crate::assistant::AiPatch;
use crate::models::{History, SupplementKind, WorkoutLog, validate_weight};

/// Add `delta_ml` (possibly negative) to the day's water, never going below 0.
#[must_use]
pub fn apply_water_delta(history: &History, date: NaiveDate, delta_ml: i64) -> History {
    let mut log = history.get_log(date);
    let next = (i64::from(log.water_intake) + delta_ml).max(0);
    log.water_intake = u32::try_from(next).unwrap_or(u32::MAX);
    history.with_log(date, log)
}

pub fn set_weight(history: &History, date: NaiveDate, weight_kg: f64) -> Result<History> {
    validate_weight(weight_kg)?;
    let mut log = history.get_log(date);
    log.weight = Some(weight_kg);
    Ok(history.with_log(date, log))
}

/// Replace the day's workout wholesale.
#[must_use]
pub fn replace_workout(history: &History, date: NaiveDate, workout: WorkoutLog) -> History {
    let mut log = history.get_log(date);
    log.workout = Some(workout);
    history.with_log(date, log)
}

#[must_use]
pub fn toggle_supplement(history: &History, date: NaiveDate, kind: SupplementKind) -> History {
    let mut log = history.get_log(date);
    log.supplements = log.supplements.toggled(kind);
    history.with_log(date, log)
}

/// Overwrite only the fields present in `patch`. Values are cumulative day
/// totals, not increments.
#[must_use]
pub fn apply_ai_patch(history: &History, date: NaiveDate, patch: &AiPatch) -> History {
    let mut log = history.get_log(date);
    if let Some(totals) = &patch.daily_totals {
        let t = &mut log.totals;
        for (field, value) in [
            (&mut t.calories, totals.calories),
            (&mut t.protein, totals.protein),
            (&mut t.carbs, totals.carbs),
            (&mut t.fat, totals.fat),
            (&mut t.fiber, totals.fiber),
            (&mut t.sugar, totals.sugar),
            (&mut t.sodium, totals.sodium),
        ] {
            if let Some(v) = value {
                *field = v;
            }
        }
    }
    if let Some(supps) = &patch.supplements {
        if let Some(v) = supps.creatine {
            log.supplements.creatine = v;
        }
        if let Some(v) = supps.multivitamin {
            log.supplements.multivitamin = v;
        }
    }
    history.with_log(date, log)
}

/// Which kind of edit is being made, for the date policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Water,
    Weight,
    Workout,
    Supplement,
    AiPatch,
}

impl MutationKind {
    /// Weight and workouts may be back-filled; everything else is today-only.
    #[must_use]
    pub fn allows_past_dates(self) -> bool {
        matches!(self, Self::Weight | Self::Workout)
    }
}

#[must_use]
pub fn is_editable(kind: MutationKind, date: NaiveDate, today: NaiveDate) -> bool {
    date == today || kind.allows_past_dates()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{PartialSupplements, PartialTotals};
    use crate::models::{DailyLog, MealEntry, NutritionTotals, Supplements, parse_date_key};
    use crate::workout::find_exercise;

    fn day() -> NaiveDate {
        parse_date_key("2024-07-15").unwrap()
    }

    #[test]
    fn test_water_scenario_clamps_at_zero() {
        let h = apply_water_delta(&History::new(), day(), 1000);
        assert_eq!(h.get_log(day()).water_intake, 1000);
        let h = apply_water_delta(&h, day(), -1500);
        assert_eq!(h.get_log(day()).water_intake, 0);
    }

    #[test]
    fn test_water_never_negative_over_sequence() {
        let deltas = [250, -100, -400, 750, -2000, 300, 0, -1, 1000];
        let mut h = History::new();
        let mut expected: i64 = 0;
        for d in deltas {
            h = apply_water_delta(&h, day(), d);
            expected = (expected + d).max(0);
            assert_eq!(i64::from(h.get_log(day()).water_intake), expected);
        }
    }

    #[test]
    fn test_mutation_touches_only_target_date() {
        let other = parse_date_key("2024-07-14").unwrap();
        let before = History::new().with_log(
            other,
            DailyLog {
                water_intake: 300,
                ..DailyLog::default()
            },
        );
        let after = apply_water_delta(&before, day(), 250);
        assert_eq!(after.get_log(other), before.get_log(other));
        assert_eq!(before.get_log(day()).water_intake, 0);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_set_weight_validates() {
        let h = set_weight(&History::new(), day(), 80.2).unwrap();
        assert_eq!(h.get_log(day()).weight, Some(80.2));
        assert!(set_weight(&h, day(), 0.0).is_err());
    }

    #[test]
    fn test_toggle_supplement_flips_one_flag() {
        let h = toggle_supplement(&History::new(), day(), SupplementKind::Creatine);
        assert_eq!(
            h.get_log(day()).supplements,
            Supplements {
                creatine: true,
                multivitamin: false
            }
        );
        let h = toggle_supplement(&h, day(), SupplementKind::Creatine);
        assert!(!h.get_log(day()).supplements.creatine);
    }

    #[test]
    fn test_replace_workout_is_wholesale() {
        let first = WorkoutLog {
            exercises: vec![find_exercise("bench_press").unwrap().start()],
            ..WorkoutLog::default()
        };
        let h = replace_workout(&History::new(), day(), first);
        let h = replace_workout(&h, day(), WorkoutLog::default());
        assert!(!h.get_log(day()).has_workout());
    }

    #[test]
    fn test_ai_patch_is_shallow() {
        let meal = MealEntry {
            id: "m1".to_string(),
            name: "Oats".to_string(),
            timestamp: "2024-07-15T08:00:00Z".to_string(),
            nutrition: NutritionTotals::default(),
        };
        let before = History::new().with_log(
            day(),
            DailyLog {
                totals: NutritionTotals {
                    calories: 200.0,
                    protein: 50.0,
                    ..NutritionTotals::default()
                },
                meals: vec![meal.clone()],
                weight: Some(77.0),
                ..DailyLog::default()
            },
        );
        let patch = AiPatch {
            daily_totals: Some(PartialTotals {
                calories: Some(500.0),
                ..PartialTotals::default()
            }),
            supplements: Some(PartialSupplements {
                multivitamin: Some(true),
                ..PartialSupplements::default()
            }),
        };

        let after = apply_ai_patch(&before, day(), &patch).get_log(day());
        assert_eq!(after.totals.calories, 500.0);
        assert_eq!(after.totals.protein, 50.0);
        assert_eq!(after.meals, vec![meal]);
        assert_eq!(after.weight, Some(77.0));
        assert!(after.supplements.multivitamin);
        assert!(!after.supplements.creatine);
    }

    #[test]
    fn test_date_policy() {
        let today = day();
        let past = parse_date_key("2024-07-01").unwrap();
        assert!(is_editable(MutationKind::Water, today, today));
        assert!(!is_editable(MutationKind::Water, past, today));
        assert!(!is_editable(MutationKind::Supplement, past, today));
        assert!(!is_editable(MutationKind::AiPatch, past, today));
        assert!(is_editable(MutationKind::Weight, past, today));
        assert!(is_editable(MutationKind::Workout, past, today));
    }
}
