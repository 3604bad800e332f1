//! The single owner of the in-memory state. Every edit goes through here so
//! that the local cache write and the sync schedule always follow it.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use crate::assistant::{
    AiPatch, AssistantRequest, ChatMessage, Conversation, ERROR_TEXT, NutritionAssistant,
    parse_reply,
};
use crate::local_cache::LocalCache;
use crate::models::{
    DailyLog, History, Snapshot, SupplementKind, Targets, WorkoutLog, validate_targets,
};
use crate::mutation::{self, MutationKind, is_editable};
use crate::sync::{SyncHandle, SyncStatus};
use crate::workout::WorkoutTemplate;

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct Session {
    history: History,
    targets: Targets,
    cache: LocalCache,
    sync: Option<SyncHandle>,
    today: fn() -> NaiveDate,
}

impl Session {
    /// Load whatever the local cache holds. Without a sync handle the session
    /// runs local-only.
    #[must_use]
    pub fn open(cache: LocalCache, sync: Option<SyncHandle>) -> Self {
        let Snapshot { history, targets } = cache.load_local();
        log::debug!("Loaded {} day(s) from local cache", history.len());
        Self {
            history,
            targets,
            cache,
            sync,
            today: local_today,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    /// Replace local state with the remote document if there is one. The
    /// remote copy wins outright: no merge, no timestamps. The result is
    /// persisted locally. It is not pushed back, but a push already waiting
    /// on the debounce now carries it instead of the discarded local state.
    pub async fn reconcile_remote(&mut self) -> bool {
        let Some(sync) = &self.sync else {
            return false;
        };
        let Some(Snapshot { history, targets }) = sync.fetch_remote().await else {
            log::debug!("No remote data; keeping local state");
            return false;
        };
        log::info!("Loaded {} day(s) from remote", history.len());
        self.history = history;
        self.targets = targets;
        self.persist();
        if let Some(sync) = &self.sync {
            sync.supersede(self.snapshot());
        }
        true
    }

    fn persist(&mut self) {
        if let Err(e) = self.cache.save_local(&self.history, &self.targets) {
            log::warn!("Local cache write failed: {e:#}");
        }
    }

    fn commit(&mut self, history: History) {
        self.history = history;
        self.persist();
        if let Some(sync) = &self.sync {
            sync.schedule(self.snapshot());
        }
    }

    fn ensure_editable(&self, kind: MutationKind, date: NaiveDate) -> Result<()> {
        if !is_editable(kind, date, self.today()) {
            bail!("Only today's log can be changed this way (got {date})");
        }
        Ok(())
    }

    // --- Mutations ---

    /// Returns the day's new water total.
    pub fn add_water(&mut self, date: NaiveDate, delta_ml: i64) -> Result<u32> {
        self.ensure_editable(MutationKind::Water, date)?;
        let next = mutation::apply_water_delta(&self.history, date, delta_ml);
        let total = next.get_log(date).water_intake;
        self.commit(next);
        Ok(total)
    }

    pub fn set_weight(&mut self, date: NaiveDate, weight_kg: f64) -> Result<()> {
        self.ensure_editable(MutationKind::Weight, date)?;
        let next = mutation::set_weight(&self.history, date, weight_kg)?;
        self.commit(next);
        Ok(())
    }

    pub fn save_workout(&mut self, date: NaiveDate, workout: WorkoutLog) -> Result<()> {
        self.ensure_editable(MutationKind::Workout, date)?;
        let next = mutation::replace_workout(&self.history, date, workout);
        self.commit(next);
        Ok(())
    }

    /// Returns the flag's new value.
    pub fn toggle_supplement(&mut self, date: NaiveDate, kind: SupplementKind) -> Result<bool> {
        self.ensure_editable(MutationKind::Supplement, date)?;
        let next = mutation::toggle_supplement(&self.history, date, kind);
        let taken = next.get_log(date).supplements.get(kind);
        self.commit(next);
        Ok(taken)
    }

    pub fn apply_ai_patch(&mut self, date: NaiveDate, patch: &AiPatch) -> Result<()> {
        self.ensure_editable(MutationKind::AiPatch, date)?;
        let next = mutation::apply_ai_patch(&self.history, date, patch);
        self.commit(next);
        Ok(())
    }

    pub fn set_targets(&mut self, targets: Targets) -> Result<()> {
        validate_targets(&targets)?;
        self.targets = targets;
        let history = self.history.clone();
        self.commit(history);
        Ok(())
    }

    // --- Assistant ---

    /// First conversation on this device opens with a welcome message.
    pub fn open_conversation(&self) -> Conversation {
        if self.cache.has_onboarded() {
            return Conversation::new();
        }
        if let Err(e) = self.cache.mark_onboarded() {
            log::warn!("Could not record onboarding: {e:#}");
        }
        Conversation::with_welcome()
    }

    /// One exchange with the assistant about today's log. A failed call
    /// leaves a single error message in the conversation and is not
    /// returned as an error.
    pub async fn send_message<A: NutritionAssistant>(
        &mut self,
        conversation: &mut Conversation,
        assistant: &A,
        text: &str,
        image: Option<String>,
    ) -> Result<()> {
        let today = self.today();
        self.ensure_editable(MutationKind::AiPatch, today)?;
        if text.trim().is_empty() && image.is_none() {
            bail!("Message must have text or an image");
        }

        let prior = conversation.messages.len();
        conversation.push(ChatMessage::user(text, image.clone()));
        conversation.pending = true;

        let log = self.history.get_log(today);
        let request = AssistantRequest {
            history: &conversation.messages[..prior],
            text,
            image: image.as_deref(),
            targets: &self.targets,
            log: &log,
            date: today,
        };
        let result = assistant.analyze(&request).await;

        match result {
            Ok(raw) => {
                let reply = parse_reply(&raw);
                conversation.push(ChatMessage::model(&reply.text));
                if let Some(patch) = reply.patch.filter(|p| !p.is_empty()) {
                    self.apply_ai_patch(today, &patch)?;
                }
            }
            Err(e) => {
                log::error!("Assistant request failed: {e:#}");
                conversation.push(ChatMessage::error(ERROR_TEXT));
            }
        }
        conversation.pending = false;
        Ok(())
    }

    // --- Templates ---

    #[must_use]
    pub fn templates(&self) -> Vec<WorkoutTemplate> {
        self.cache.load_templates()
    }

    /// Save `date`'s exercises as a new named routine.
    pub fn save_template(&mut self, date: NaiveDate, name: &str) -> Result<WorkoutTemplate> {
        let log = self.history.get_log(date);
        let template = WorkoutTemplate::from_exercises(name, log.exercises())?;
        let mut templates = self.templates();
        templates.push(template.clone());
        self.cache.save_templates(&templates)?;
        Ok(template)
    }

    /// Append a routine's exercises to `date`'s workout. `key` matches a
    /// template id or, case-insensitively, its name.
    pub fn load_template(&mut self, date: NaiveDate, key: &str) -> Result<WorkoutTemplate> {
        let template = self
            .templates()
            .into_iter()
            .find(|t| t.id == key || t.name.eq_ignore_ascii_case(key))
            .with_context(|| format!("No routine named '{key}'"))?;
        let mut workout = self.history.get_log(date).workout.unwrap_or_default();
        workout.exercises.extend(template.instantiate());
        self.save_workout(date, workout)?;
        Ok(template)
    }

    // --- Reads ---

    #[must_use]
    pub fn log_for(&self, date: NaiveDate) -> DailyLog {
        self.history.get_log(date)
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            history: self.history.clone(),
            targets: self.targets,
        }
    }

    /// `None` when running local-only.
    #[must_use]
    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync.as_ref().map(SyncHandle::status)
    }

    // --- Control ---

    /// Push the current state now. Also serves as the manual retry after an
    /// error.
    pub async fn sync_now(&self) -> Result<SyncStatus> {
        let sync = self.sync.as_ref().context("Remote sync is not configured")?;
        sync.schedule(self.snapshot());
        sync.flush().await
    }

    /// Push anything still waiting on the debounce and stop syncing.
    pub async fn close(self) -> Option<SyncStatus> {
        let sync = self.sync?;
        match sync.shutdown().await {
            Ok(status) => Some(status),
            Err(e) => {
                log::warn!("Sync shutdown failed: {e:#}");
                Some(SyncStatus::Error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::models::{NutritionTotals, parse_date_key};
    use crate::remote::MemoryRemote;
    use crate::sync::SyncConfig;
    use crate::workout::find_exercise;

    fn fixed_today() -> NaiveDate {
        parse_date_key("2024-09-10").unwrap()
    }

    fn yesterday() -> NaiveDate {
        parse_date_key("2024-09-09").unwrap()
    }

    fn local_session() -> Session {
        Session::open(LocalCache::open_in_memory().unwrap(), None).with_clock(fixed_today)
    }

    fn synced_session(remote: &Arc<MemoryRemote>) -> Session {
        let sync = SyncHandle::spawn(Arc::clone(remote), SyncConfig::default());
        Session::open(LocalCache::open_in_memory().unwrap(), Some(sync)).with_clock(fixed_today)
    }

    struct Scripted {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl NutritionAssistant for Scripted {
        async fn analyze(&self, request: &AssistantRequest<'_>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.date, fixed_today());
            match self.reply {
                Some(r) => Ok(r.to_string()),
                None => bail!("network down"),
            }
        }
    }

    #[test]
    fn test_mutations_are_cached_immediately() {
        let mut session = local_session();
        session.add_water(fixed_today(), 500).unwrap();
        session.set_weight(yesterday(), 81.0).unwrap();

        let cached = session.cache.load_local();
        assert_eq!(cached.history.get_log(fixed_today()).water_intake, 500);
        assert_eq!(cached.history.get_log(yesterday()).weight, Some(81.0));
    }

    #[test]
    fn test_today_only_mutations_reject_past_dates() {
        let mut session = local_session();
        assert!(session.add_water(yesterday(), 250).is_err());
        assert!(
            session
                .toggle_supplement(yesterday(), SupplementKind::Creatine)
                .is_err()
        );
        assert!(session.history().is_empty());

        let workout = WorkoutLog {
            exercises: vec![find_exercise("plank").unwrap().start()],
            ..WorkoutLog::default()
        };
        session.save_workout(yesterday(), workout).unwrap();
        assert!(session.log_for(yesterday()).has_workout());
    }

    #[test]
    fn test_water_scenario_through_session() {
        let mut session = local_session();
        assert_eq!(session.add_water(fixed_today(), 1000).unwrap(), 1000);
        assert_eq!(session.add_water(fixed_today(), -1500).unwrap(), 0);
    }

    #[test]
    fn test_set_targets_validates_and_persists() {
        let mut session = local_session();
        let mut targets = Targets::default();
        targets.nutrients.protein = 150.0;
        session.set_targets(targets).unwrap();
        assert_eq!(session.cache.load_local().targets.nutrients.protein, 150.0);

        targets.nutrients.protein = -1.0;
        assert!(session.set_targets(targets).is_err());
        assert_eq!(session.targets().nutrients.protein, 150.0);
    }

    #[test]
    fn test_reopen_restores_state() {
        let mut session = local_session();
        session.add_water(fixed_today(), 750).unwrap();
        let Session { cache, .. } = session;
        let reopened = Session::open(cache, None).with_clock(fixed_today);
        assert_eq!(reopened.log_for(fixed_today()).water_intake, 750);
    }

    #[tokio::test]
    async fn test_remote_wins_on_load() {
        let remote_history = History::new().with_log(
            yesterday(),
            DailyLog {
                water_intake: 2000,
                ..DailyLog::default()
            },
        );
        let remote = Arc::new(MemoryRemote::with_document(Snapshot {
            history: remote_history.clone(),
            targets: Targets::default(),
        }));

        let mut session = synced_session(&remote);
        session.add_water(fixed_today(), 300).unwrap();
        assert!(session.reconcile_remote().await);

        assert_eq!(session.history(), &remote_history);
        assert_eq!(session.cache.load_local().history, remote_history);
        assert_eq!(remote.push_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_replaces_pending_push() {
        let remote_history = History::new().with_log(
            yesterday(),
            DailyLog {
                water_intake: 2000,
                ..DailyLog::default()
            },
        );
        let remote = Arc::new(MemoryRemote::with_document(Snapshot {
            history: remote_history.clone(),
            targets: Targets::default(),
        }));

        let mut session = synced_session(&remote);
        session.add_water(fixed_today(), 300).unwrap();
        assert!(session.reconcile_remote().await);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let stored = remote.stored().unwrap();
        assert_eq!(stored.history, remote_history);
        assert_eq!(&stored.history, session.history());
        assert_eq!(stored.history.get_log(fixed_today()).water_intake, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_push_survives_reopen_and_retry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let older = History::new().with_log(
            yesterday(),
            DailyLog {
                water_intake: 100,
                ..DailyLog::default()
            },
        );
        let remote = Arc::new(MemoryRemote::with_document(Snapshot {
            history: older,
            targets: Targets::default(),
        }));

        remote.set_failing(true);
        let sync = SyncHandle::spawn(Arc::clone(&remote), SyncConfig::default());
        let mut first =
            Session::open(LocalCache::open(&path).unwrap(), Some(sync)).with_clock(fixed_today);
        first.add_water(fixed_today(), 750).unwrap();
        assert_eq!(first.close().await, Some(SyncStatus::Error));

        // The retry pushes what the cache holds without reloading the remote.
        remote.set_failing(false);
        let sync = SyncHandle::spawn(Arc::clone(&remote), SyncConfig::default());
        let second =
            Session::open(LocalCache::open(&path).unwrap(), Some(sync)).with_clock(fixed_today);
        assert_eq!(second.sync_now().await.unwrap(), SyncStatus::Success);
        let stored = remote.stored().unwrap();
        assert_eq!(stored.history.get_log(fixed_today()).water_intake, 750);
        assert_eq!(second.log_for(fixed_today()).water_intake, 750);
    }

    #[tokio::test]
    async fn test_reconcile_without_remote_data_keeps_local() {
        let remote = Arc::new(MemoryRemote::new());
        let mut session = synced_session(&remote);
        session.add_water(fixed_today(), 300).unwrap();
        assert!(!session.reconcile_remote().await);
        assert_eq!(session.log_for(fixed_today()).water_intake, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_debounce_into_one_push() {
        let remote = Arc::new(MemoryRemote::new());
        let session = {
            let mut s = synced_session(&remote);
            for _ in 0..5 {
                s.add_water(fixed_today(), 250).unwrap();
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            s
        };
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(remote.push_count(), 1);
        let pushed = remote.stored().unwrap();
        assert_eq!(pushed.history.get_log(fixed_today()).water_intake, 1250);
        assert_eq!(session.sync_status(), Some(SyncStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_change() {
        let remote = Arc::new(MemoryRemote::new());
        let mut session = synced_session(&remote);
        session.set_weight(fixed_today(), 70.5).unwrap();
        assert_eq!(session.close().await, Some(SyncStatus::Success));
        assert_eq!(
            remote.stored().unwrap().history.get_log(fixed_today()).weight,
            Some(70.5)
        );
    }

    #[tokio::test]
    async fn test_sync_now_requires_remote() {
        let session = local_session();
        assert!(session.sync_now().await.is_err());
        assert_eq!(session.close().await, None);
    }

    #[tokio::test]
    async fn test_send_message_applies_patch() {
        let mut session = local_session();
        session.add_water(fixed_today(), 400).unwrap();
        let assistant = Scripted::replying(
            "Two eggs logged.\n```json\n{\"dailyTotals\": {\"calories\": 160, \"protein\": 12}}\n```",
        );
        let mut convo = Conversation::new();

        session
            .send_message(&mut convo, &assistant, "two eggs", None)
            .await
            .unwrap();

        assert_eq!(convo.messages.len(), 2);
        assert_eq!(convo.messages[1].text, "Two eggs logged.");
        assert!(!convo.pending);
        let log = session.log_for(fixed_today());
        assert_eq!(
            log.totals,
            NutritionTotals {
                calories: 160.0,
                protein: 12.0,
                ..NutritionTotals::default()
            }
        );
        assert_eq!(log.water_intake, 400);
    }

    #[tokio::test]
    async fn test_failed_exchange_adds_one_error_message() {
        let mut session = local_session();
        let assistant = Scripted::failing();
        let mut convo = Conversation::new();

        session
            .send_message(&mut convo, &assistant, "hello", None)
            .await
            .unwrap();

        assert_eq!(convo.messages.len(), 2);
        assert!(convo.messages[1].is_error);
        assert!(!convo.pending);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_patch_still_shows_text() {
        let mut session = local_session();
        let assistant = Scripted::replying("Hi!\n```json\n{oops}\n```");
        let mut convo = Conversation::new();
        session
            .send_message(&mut convo, &assistant, "hi", None)
            .await
            .unwrap();
        assert!(convo.messages[1].text.starts_with("Hi!"));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_patch_leaves_history_untouched() {
        let mut session = local_session();
        let assistant = Scripted::replying("Noted.\n```json\n{}\n```");
        let mut convo = Conversation::new();
        session
            .send_message(&mut convo, &assistant, "what should I eat?", None)
            .await
            .unwrap();
        assert_eq!(convo.messages[1].text, "Noted.");
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_calling_assistant() {
        let mut session = local_session();
        let assistant = Scripted::replying("unused");
        let mut convo = Conversation::new();
        assert!(
            session
                .send_message(&mut convo, &assistant, "   ", None)
                .await
                .is_err()
        );
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 0);
        assert!(convo.messages.is_empty());
    }

    #[test]
    fn test_welcome_shown_once() {
        let session = local_session();
        assert_eq!(session.open_conversation().messages.len(), 1);
        assert!(session.open_conversation().messages.is_empty());
    }

    #[test]
    fn test_template_save_and_load() {
        let mut session = local_session();
        let workout = WorkoutLog {
            exercises: vec![
                find_exercise("bench_press").unwrap().start(),
                find_exercise("treadmill").unwrap().start(),
            ],
            ..WorkoutLog::default()
        };
        session.save_workout(yesterday(), workout).unwrap();
        let saved = session.save_template(yesterday(), "Mixed").unwrap();
        assert_eq!(session.templates().last().unwrap().id, saved.id);

        let loaded = session.load_template(fixed_today(), "mixed").unwrap();
        assert_eq!(loaded.id, saved.id);
        let exercises = session.log_for(fixed_today()).workout.unwrap().exercises;
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[1].exercise_id, "treadmill");

        assert!(session.load_template(fixed_today(), "nope").is_err());
        assert!(session.save_template(parse_date_key("2020-01-01").unwrap(), "x").is_err());
    }
}
