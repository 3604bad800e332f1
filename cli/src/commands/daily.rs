use anyhow::{Result, bail};

use nutrilog_core::models::{DATE_FORMAT, SupplementKind};
use nutrilog_core::session::Session;

use super::helpers::{no_neg_zero, parse_date};

const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn cmd_water(
    session: &mut Session,
    amount_ml: i64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let total = session.add_water(date, amount_ml)?;
    let target = session.targets().water_target;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "date": date.format(DATE_FORMAT).to_string(),
                "waterIntake": total,
                "waterTarget": target,
            })
        );
    } else {
        let verb = if amount_ml < 0 { "Removed" } else { "Added" };
        let amount = amount_ml.unsigned_abs();
        println!("{verb} {amount} ml. Water today: {total} / {target} ml");
    }
    Ok(())
}

fn to_kg(value: f64, unit: &str) -> Result<f64> {
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => {
            let kg = no_neg_zero(value * KG_PER_LB);
            eprintln!("Converting {value:.1} lbs → {kg:.2} kg");
            Ok(kg)
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

pub(crate) fn cmd_weight(
    session: &mut Session,
    value: f64,
    unit: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let weight_kg = to_kg(value, unit)?;
    let date = parse_date(date)?;
    session.set_weight(date, weight_kg)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "date": date.format(DATE_FORMAT).to_string(),
                "weight": weight_kg,
            })
        );
    } else {
        let lbs = weight_kg * LBS_PER_KG;
        println!(
            "Logged {weight_kg:.1} kg ({lbs:.1} lbs) for {}",
            date.format(DATE_FORMAT)
        );
    }
    Ok(())
}

pub(crate) fn cmd_supplement(
    session: &mut Session,
    kind: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let kind: SupplementKind = kind.parse()?;
    let date = parse_date(date)?;
    let taken = session.toggle_supplement(date, kind)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "date": date.format(DATE_FORMAT).to_string(),
                "supplement": kind,
                "taken": taken,
            })
        );
    } else if taken {
        println!("Marked {kind} as taken");
    } else {
        println!("Marked {kind} as not taken");
    }
    Ok(())
}
