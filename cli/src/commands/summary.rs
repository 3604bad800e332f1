use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::models::DATE_FORMAT;
use nutrilog_core::reports::{DailyProgress, REPORT_DAYS, build_report};
use nutrilog_core::session::Session;

use super::helpers::{no_neg_zero, parse_date, print_workout_table};

fn pct(ratio: f64) -> String {
    format!("{:.0}%", no_neg_zero(ratio * 100.0))
}

pub(crate) fn cmd_summary(session: &Session, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let log = session.log_for(date);
    let targets = session.targets();
    let progress = DailyProgress::compute(&log, targets);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "date": date.format(DATE_FORMAT).to_string(),
                "log": log,
                "targets": targets,
                "progress": progress,
                "sync": session.sync_status(),
            }))?
        );
        return Ok(());
    }

    println!("=== {} ===\n", date.format(DATE_FORMAT));

    let t = &log.totals;
    let n = &targets.nutrients;
    println!(
        "  CALORIES: {:.0} / {:.0} kcal ({})",
        t.calories,
        n.calories,
        pct(progress.calories)
    );
    if progress.over_calories {
        println!("  OVER by {:.0} kcal", t.calories - n.calories);
    } else {
        println!("  REMAINING: {:.0} kcal", progress.remaining_calories);
    }
    println!(
        "  MACROS: P:{:.0}/{:.0}g C:{:.0}/{:.0}g F:{:.0}/{:.0}g",
        t.protein, n.protein, t.carbs, n.carbs, t.fat, n.fat
    );
    println!(
        "  FIBER: {:.0}/{:.0}g  SUGAR: {:.0}/{:.0}g  SODIUM: {:.0}/{:.0}mg",
        t.fiber, n.fiber, t.sugar, n.sugar, t.sodium, n.sodium
    );
    println!(
        "  WATER: {} / {} ml ({})",
        log.water_intake,
        targets.water_target,
        pct(progress.water)
    );

    let check = |taken: bool| if taken { "x" } else { " " };
    println!(
        "  SUPPLEMENTS: [{}] creatine  [{}] multivitamin",
        check(log.supplements.creatine),
        check(log.supplements.multivitamin)
    );
    if let Some(w) = log.weight {
        println!("  WEIGHT: {w:.1} kg");
    }
    if let Some(status) = session.sync_status() {
        println!("  SYNC: {status}");
    }

    if !log.meals.is_empty() {
        println!("\n  MEALS");
        for meal in &log.meals {
            println!(
                "    {} ({}): {:.0} kcal",
                meal.name, meal.timestamp, meal.nutrition.calories
            );
        }
    }

    if log.has_workout() {
        println!("\n  WORKOUT");
        print_workout_table(log.exercises());
    }

    Ok(())
}

pub(crate) fn cmd_history(session: &Session, days: usize, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Water")]
        water: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Workout")]
        workout: String,
    }

    let recent = session.history().recent(days);

    if json {
        let map: serde_json::Map<String, serde_json::Value> = recent
            .iter()
            .map(|(date, log)| -> Result<(String, serde_json::Value)> {
                Ok((date.format(DATE_FORMAT).to_string(), serde_json::to_value(log)?))
            })
            .collect::<Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if recent.is_empty() {
        eprintln!("Nothing logged yet");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = recent
        .iter()
        .rev()
        .map(|(date, log)| {
            let t = &log.totals;
            HistoryRow {
                date: date.format(DATE_FORMAT).to_string(),
                calories: format!("{:.0}", no_neg_zero(t.calories)),
                protein: format!("{:.0}g", no_neg_zero(t.protein)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                fat: format!("{:.0}g", no_neg_zero(t.fat)),
                water: format!("{} ml", log.water_intake),
                weight: log.weight.map(|w| format!("{w:.1}")).unwrap_or_default(),
                workout: match log.exercises().len() {
                    0 => String::new(),
                    n => format!("{n} ex"),
                },
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_report(session: &Session, days: Option<usize>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct ReportRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Volume")]
        volume: String,
        #[tabled(rename = "Cardio")]
        cardio: String,
        #[tabled(rename = "Weight")]
        weight: String,
    }

    let days = days.unwrap_or(REPORT_DAYS);
    let Some(report) = build_report(session.history(), days) else {
        if json {
            println!("{}", serde_json::json!({ "error": "Nothing logged yet" }));
        } else {
            eprintln!("Nothing logged yet");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== Last {} recorded day(s) ===\n", report.days);
    println!("  AVG CALORIES: {:.0} kcal", report.avg_calories);
    println!("  AVG PROTEIN: {:.0}g", report.avg_protein);
    println!(
        "  WORKOUTS: {} day(s), {:.0} kg volume, {:.0} min cardio",
        report.workout_days, report.total_volume, report.total_cardio_minutes
    );
    if let Some(m) = report.top_muscle {
        println!("  TOP MUSCLE GROUP: {m}");
    }
    if let Some(avg) = report.avg_weight {
        let change = report.weight_change.unwrap_or(0.0);
        println!("  WEIGHT: avg {avg:.1} kg, change {:+.1} kg", no_neg_zero(change));
    }
    println!();

    let rows: Vec<ReportRow> = report
        .rows
        .iter()
        .map(|r| ReportRow {
            date: r.date.format(DATE_FORMAT).to_string(),
            calories: format!("{:.0}", r.calories),
            protein: format!("{:.0}g", r.protein),
            volume: format!("{:.0} kg", r.volume),
            cardio: format!("{:.0} min", r.cardio_minutes),
            weight: r.weight.map(|w| format!("{w:.1}")).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::local_cache::LocalCache;

    #[test]
    fn test_pct_rounds_and_avoids_negative_zero() {
        assert_eq!(pct(0.504), "50%");
        assert_eq!(pct(1.25), "125%");
        assert_eq!(pct(-0.0), "0%");
    }

    #[test]
    fn test_summary_runs_without_sync() {
        let session = Session::open(LocalCache::open_in_memory().unwrap(), None);
        assert_eq!(session.sync_status(), None);
        cmd_summary(&session, None, false).unwrap();
        cmd_summary(&session, Some("today".into()), true).unwrap();
    }
}
