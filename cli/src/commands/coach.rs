use anyhow::{Context, Result};
use std::process;

use nutrilog_core::coach::{WorkoutCoach, coach_prompt};
use nutrilog_core::session::Session;

const NO_ADVICE: &str = "The coach had nothing to say this time. Try again later.";

/// Ask the coach about the last `days` workout days. Exits with code 2 when
/// no completed set is on record.
pub(crate) async fn cmd_coach<C: WorkoutCoach>(
    session: &Session,
    coach: &C,
    days: usize,
    json: bool,
) -> Result<()> {
    let Some(prompt) = coach_prompt(session.history(), days) else {
        if json {
            println!("{}", serde_json::json!({ "error": "No completed workouts yet" }));
        } else {
            eprintln!("No completed workouts yet. Mark some sets done first.");
        }
        process::exit(2);
    };

    let advice = coach
        .advise(&prompt)
        .await
        .context("The workout coach could not be reached")?;
    let advice = match advice.trim() {
        "" => NO_ADVICE,
        text => text,
    };

    if json {
        println!("{}", serde_json::json!({ "advice": advice }));
    } else {
        println!("=== Coach ===\n");
        println!("{advice}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    use nutrilog_core::local_cache::LocalCache;
    use nutrilog_core::models::WorkoutLog;
    use nutrilog_core::workout::{SetUpdate, find_exercise};

    struct Recording {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl WorkoutCoach for Recording {
        async fn advise(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply {
                Some(r) => Ok(r.to_string()),
                None => bail!("offline"),
            }
        }
    }

    fn session_with_completed_set() -> Session {
        let mut session = Session::open(LocalCache::open_in_memory().unwrap(), None);
        let mut ex = find_exercise("bench_press").unwrap().start();
        let done = SetUpdate {
            weight_kg: Some(50.0),
            reps: Some(10),
            completed: Some(true),
            ..SetUpdate::default()
        };
        ex.update_set(0, done).unwrap();
        let workout = WorkoutLog {
            exercises: vec![ex],
            ..WorkoutLog::default()
        };
        let today = session.today();
        session.save_workout(today, workout).unwrap();
        session
    }

    #[tokio::test]
    async fn test_coach_receives_training_digest() {
        let session = session_with_completed_set();
        let coach = Recording {
            reply: Some("Add a set of bench press."),
            prompts: Mutex::new(Vec::new()),
        };
        cmd_coach(&session, &coach, 30, false).await.unwrap();

        let prompts = coach.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Bench Press"));
        assert!(prompts[0].contains("\"kg\":50.0,\"reps\":10"));
    }

    #[tokio::test]
    async fn test_coach_failure_is_reported() {
        let session = session_with_completed_set();
        let coach = Recording {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        };
        assert!(cmd_coach(&session, &coach, 30, true).await.is_err());
    }
}
