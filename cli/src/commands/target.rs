use anyhow::{Result, bail};
use clap::Args;

use nutrilog_core::models::Targets;
use nutrilog_core::session::Session;

/// Per-field target overrides; unset fields keep their current value.
#[derive(Debug, Default, Args)]
pub(crate) struct TargetArgs {
    /// Daily calories (kcal)
    #[arg(long)]
    pub calories: Option<f64>,
    /// Protein (g)
    #[arg(long)]
    pub protein: Option<f64>,
    /// Carbs (g)
    #[arg(long)]
    pub carbs: Option<f64>,
    /// Fat (g)
    #[arg(long)]
    pub fat: Option<f64>,
    /// Fiber (g)
    #[arg(long)]
    pub fiber: Option<f64>,
    /// Sugar (g)
    #[arg(long)]
    pub sugar: Option<f64>,
    /// Sodium (mg)
    #[arg(long)]
    pub sodium: Option<f64>,
    /// Water (ml)
    #[arg(long)]
    pub water: Option<u32>,
}

impl TargetArgs {
    fn is_empty(&self) -> bool {
        self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.fiber.is_none()
            && self.sugar.is_none()
            && self.sodium.is_none()
            && self.water.is_none()
    }

    fn apply(&self, current: &Targets) -> Targets {
        let mut next = *current;
        let n = &mut next.nutrients;
        for (slot, value) in [
            (&mut n.calories, self.calories),
            (&mut n.protein, self.protein),
            (&mut n.carbs, self.carbs),
            (&mut n.fat, self.fat),
            (&mut n.fiber, self.fiber),
            (&mut n.sugar, self.sugar),
            (&mut n.sodium, self.sodium),
        ] {
            if let Some(v) = value {
                *slot = v;
            }
        }
        if let Some(w) = self.water {
            next.water_target = w;
        }
        next
    }
}

fn print_targets(targets: &Targets) {
    let n = &targets.nutrients;
    println!("  Calories: {:.0} kcal", n.calories);
    println!("  Protein:  {:.0} g", n.protein);
    println!("  Carbs:    {:.0} g", n.carbs);
    println!("  Fat:      {:.0} g", n.fat);
    println!("  Fiber:    {:.0} g", n.fiber);
    println!("  Sugar:    {:.0} g", n.sugar);
    println!("  Sodium:   {:.0} mg", n.sodium);
    println!("  Water:    {} ml", targets.water_target);
}

pub(crate) fn cmd_target_show(session: &Session, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(session.targets())?);
    } else {
        println!("Daily targets:");
        print_targets(session.targets());
    }
    Ok(())
}

pub(crate) fn cmd_target_set(session: &mut Session, args: &TargetArgs, json: bool) -> Result<()> {
    if args.is_empty() {
        bail!("Nothing to set. Pass at least one of --calories, --protein, --carbs, --fat, --fiber, --sugar, --sodium, --water");
    }
    let next = args.apply(session.targets());
    session.set_targets(next)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.targets())?);
    } else {
        println!("Targets updated:");
        print_targets(session.targets());
    }
    Ok(())
}
