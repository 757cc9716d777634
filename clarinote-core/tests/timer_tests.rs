use chrono::{Duration, TimeZone, Utc};
use clarinote_core::store::memory::MemoryBackend;
use clarinote_core::{
    AppSettings, CoreError, PomodoroSettings, PomodoroTimer, Store, StoreBackend, StoreKey,
    StudyService, TickOutcome, TimerDriver, TimerEvent, TimerMode,
};
use std::time::Duration as StdDuration;

fn settings(work: u32, short: u32, long: u32, every: u32) -> PomodoroSettings {
    PomodoroSettings {
        work_minutes: work,
        short_break_minutes: short,
        long_break_minutes: long,
        sessions_per_long_break: every,
    }
}

fn store_with(pomodoro: PomodoroSettings) -> Store {
    let store = Store::in_memory();
    store
        .set(StoreKey::Settings, &AppSettings { pomodoro, blocked_sites: vec![] })
        .unwrap();
    store
}

/// Ticks until the current countdown expires.
fn run_out(timer: &mut PomodoroTimer) -> TickOutcome {
    timer.start();
    loop {
        match timer.tick(Utc::now()).unwrap() {
            TickOutcome::Running { .. } => continue,
            other => return other,
        }
    }
}

#[test]
fn starts_paused_in_work() {
    let timer = PomodoroTimer::new(store_with(settings(25, 5, 15, 4)));
    assert_eq!(timer.mode(), TimerMode::Work);
    assert_eq!(timer.remaining_secs(), 1500);
    assert!(!timer.is_active());
    assert_eq!(timer.completed_work_intervals(), 0);
}

#[test]
fn paused_ticks_do_nothing() {
    let mut timer = PomodoroTimer::new(store_with(settings(25, 5, 15, 4)));
    assert_eq!(timer.tick(Utc::now()).unwrap(), TickOutcome::Idle);
    assert_eq!(timer.remaining_secs(), 1500);
}

#[test]
fn full_work_interval_records_one_session() {
    let store = store_with(settings(2, 1, 3, 4));
    let subject = StudyService::new(store.clone()).add_subject("Physics").unwrap();
    let mut timer = PomodoroTimer::new(store.clone());
    timer.select_subject(Some(subject.id));
    timer.start();

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    for _ in 0..119 {
        assert!(matches!(timer.tick(now).unwrap(), TickOutcome::Running { .. }));
    }
    let TickOutcome::Expired(t) = timer.tick(now).unwrap() else {
        panic!("expected expiry on tick 120");
    };
    assert_eq!(t.from, TimerMode::Work);
    assert_eq!(t.to, TimerMode::ShortBreak);
    assert!(!timer.is_active());
    assert_eq!(timer.remaining_secs(), 60);
    assert_eq!(timer.completed_work_intervals(), 1);

    let sessions = store.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].subject_id, subject.id);
    assert_eq!(sessions[0].duration, 120);
    assert_eq!(sessions[0].start_time, now - Duration::seconds(120));
    assert_eq!(t.recorded.as_ref(), Some(&sessions[0]));
}

#[test]
fn fourth_interval_earns_long_break() {
    let store = store_with(settings(1, 1, 2, 4));
    let mut timer = PomodoroTimer::new(store);
    let mut next_modes = Vec::new();
    for _ in 0..4 {
        let TickOutcome::Expired(work) = run_out(&mut timer) else { panic!() };
        next_modes.push(work.to);
        let TickOutcome::Expired(brk) = run_out(&mut timer) else { panic!() };
        assert_eq!(brk.to, TimerMode::Work);
        assert_eq!(timer.remaining_secs(), 60);
    }
    assert_eq!(
        next_modes,
        [TimerMode::ShortBreak, TimerMode::ShortBreak, TimerMode::ShortBreak, TimerMode::LongBreak]
    );
}

#[test]
fn no_subject_means_no_session() {
    let store = store_with(settings(1, 1, 1, 4));
    let mut timer = PomodoroTimer::new(store.clone());
    let TickOutcome::Expired(t) = run_out(&mut timer) else { panic!() };
    assert!(t.recorded.is_none());
    assert!(store.sessions().is_empty());
    assert_eq!(timer.completed_work_intervals(), 1);
}

#[test]
fn pending_notes_ride_along_once() {
    let store = store_with(settings(1, 1, 1, 4));
    let study = StudyService::new(store.clone());
    let subject = study.add_subject("Chemistry").unwrap();
    study.set_session_notes("balanced redox equations").unwrap();

    let mut timer = PomodoroTimer::new(store.clone());
    timer.select_subject(Some(subject.id));
    run_out(&mut timer);
    run_out(&mut timer);
    run_out(&mut timer);

    let sessions = store.sessions();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].notes.as_deref(), Some("balanced redox equations"));
    assert_eq!(sessions[1].notes, None);
    assert_eq!(study.session_notes(), "");
}

/// Refuses every write to one key.
struct ReadOnlyKey {
    inner: MemoryBackend,
    key: StoreKey,
}

impl StoreBackend for ReadOnlyKey {
    fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CoreError> {
        if key == self.key.as_str() {
            return Err(CoreError::Storage("disk full".into()));
        }
        self.inner.write(key, value)
    }
}

#[test]
fn stuck_notes_do_not_duplicate_sessions() {
    let inner = MemoryBackend::new().with_raw(StoreKey::SessionNotes.as_str(), r#""chapter 4""#);
    let store = Store::new(ReadOnlyKey { inner, key: StoreKey::SessionNotes });
    store
        .set(StoreKey::Settings, &AppSettings { pomodoro: settings(1, 1, 1, 4), blocked_sites: vec![] })
        .unwrap();
    let subject = StudyService::new(store.clone()).add_subject("History").unwrap();
    let mut timer = PomodoroTimer::new(store.clone());
    timer.select_subject(Some(subject.id));

    let TickOutcome::Expired(t) = run_out(&mut timer) else { panic!() };
    assert_eq!(t.to, TimerMode::ShortBreak);
    assert_eq!(timer.completed_work_intervals(), 1);
    let sessions = store.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].notes.as_deref(), Some("chapter 4"));
    assert_eq!(store.session_notes(), "chapter 4");
}

#[test]
fn reset_restores_full_duration_only() {
    let mut timer = PomodoroTimer::new(store_with(settings(25, 5, 15, 4)));
    timer.start();
    for _ in 0..100 {
        timer.tick(Utc::now()).unwrap();
    }
    assert_eq!(timer.remaining_secs(), 1400);
    timer.reset();
    assert_eq!(timer.remaining_secs(), 1500);
    assert_eq!(timer.mode(), TimerMode::Work);
    assert_eq!(timer.completed_work_intervals(), 0);
    assert!(timer.is_active());
}

#[test]
fn set_mode_pauses_and_discards_countdown() {
    let mut timer = PomodoroTimer::new(store_with(settings(25, 5, 15, 4)));
    timer.start();
    timer.tick(Utc::now()).unwrap();
    timer.set_mode(TimerMode::LongBreak);
    assert!(!timer.is_active());
    assert_eq!(timer.mode(), TimerMode::LongBreak);
    assert_eq!(timer.remaining_secs(), 900);
}

#[test]
fn settings_apply_immediately_only_while_paused() {
    let mut timer = PomodoroTimer::new(store_with(settings(25, 5, 15, 4)));
    timer.apply_settings(settings(50, 10, 20, 2));
    assert_eq!(timer.remaining_secs(), 3000);

    timer.start();
    timer.tick(Utc::now()).unwrap();
    timer.apply_settings(settings(10, 10, 20, 2));
    assert_eq!(timer.remaining_secs(), 2999);

    timer.set_mode(TimerMode::Work);
    assert_eq!(timer.remaining_secs(), 600);
}

#[test]
fn zero_long_break_interval_never_goes_long() {
    let mut timer = PomodoroTimer::new(store_with(settings(1, 1, 1, 0)));
    for _ in 0..3 {
        let TickOutcome::Expired(t) = run_out(&mut timer) else { panic!() };
        assert_eq!(t.to, TimerMode::ShortBreak);
        run_out(&mut timer);
    }
}

#[tokio::test(start_paused = true)]
async fn driver_runs_a_work_interval_to_completion() {
    let store = store_with(settings(1, 1, 1, 4));
    let subject = StudyService::new(store.clone()).add_subject("Latin").unwrap();
    let mut timer = PomodoroTimer::new(store.clone());
    timer.select_subject(Some(subject.id));

    let mut driver = TimerDriver::new(timer);
    let mut events = driver.subscribe();
    driver.start();

    let transition = loop {
        match events.recv().await.unwrap() {
            TimerEvent::Expired(t) => break t,
            TimerEvent::Tick(_) => continue,
            TimerEvent::Failed(e) => panic!("{e}"),
        }
    };
    assert_eq!(transition.to, TimerMode::ShortBreak);
    assert_eq!(store.sessions().len(), 1);

    let snap = driver.snapshot();
    assert!(!snap.active);
    assert_eq!(snap.mode, TimerMode::ShortBreak);
    assert_eq!(snap.remaining_secs, 60);
}

#[tokio::test(start_paused = true)]
async fn pause_cancels_pending_ticks() {
    let mut driver = TimerDriver::new(PomodoroTimer::new(store_with(settings(25, 5, 15, 4))));
    driver.start();
    tokio::time::sleep(StdDuration::from_millis(10_500)).await;
    driver.pause();
    assert_eq!(driver.snapshot().remaining_secs, 1490);
    assert!(!driver.is_running());

    tokio::time::sleep(StdDuration::from_secs(120)).await;
    assert_eq!(driver.snapshot().remaining_secs, 1490);

    driver.start();
    tokio::time::sleep(StdDuration::from_millis(5_500)).await;
    assert_eq!(driver.snapshot().remaining_secs, 1485);
}

#[tokio::test(start_paused = true)]
async fn shutdown_discards_partial_interval() {
    let store = store_with(settings(1, 1, 1, 4));
    let subject = StudyService::new(store.clone()).add_subject("Music").unwrap();
    let mut timer = PomodoroTimer::new(store.clone());
    timer.select_subject(Some(subject.id));

    let mut driver = TimerDriver::new(timer);
    driver.start();
    tokio::time::sleep(StdDuration::from_millis(30_500)).await;
    let snap = driver.shutdown();
    assert!(!snap.active);
    assert_eq!(snap.remaining_secs, 30);

    tokio::time::sleep(StdDuration::from_secs(120)).await;
    assert!(store.sessions().is_empty());
}

#[test]
fn driver_follows_settings_while_paused() {
    let store = store_with(settings(25, 5, 15, 4));
    let mut driver = TimerDriver::new(PomodoroTimer::new(store.clone()));
    driver.follow_settings(&store);

    StudyService::new(store.clone())
        .update_pomodoro(settings(40, 5, 15, 4))
        .unwrap();
    assert_eq!(driver.snapshot().remaining_secs, 2400);
}
