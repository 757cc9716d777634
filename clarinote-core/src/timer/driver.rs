use crate::timer::{PomodoroTimer, TickOutcome, TimerMode, TimerSnapshot, Transition};
use crate::{PomodoroSettings, Store, StoreKey, SubjectId, SubscriptionId};
use chrono::Utc;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Tick(TimerSnapshot),
    Expired(Transition),
    /// The store refused to record a finished interval; the timer is paused.
    Failed(String),
}

/// Runs a [`PomodoroTimer`] on a tokio runtime, one tick per period.
///
/// At most one tick task exists at a time. Every method that stops or
/// redirects the countdown aborts the pending task before touching the
/// machine, so no tick lands after the caller has moved on. All methods must
/// be called from within a tokio runtime.
pub struct TimerDriver {
    timer: Arc<Mutex<PomodoroTimer>>,
    events: broadcast::Sender<TimerEvent>,
    period: Duration,
    task: Option<JoinHandle<()>>,
    settings_sub: Option<(Store, SubscriptionId)>,
}

impl TimerDriver {
    pub fn new(timer: PomodoroTimer) -> Self {
        Self::with_period(timer, TICK_PERIOD)
    }

    pub fn with_period(timer: PomodoroTimer, period: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            timer: Arc::new(Mutex::new(timer)),
            events,
            period,
            task: None,
            settings_sub: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.timer.lock().snapshot()
    }

    /// True while a tick task is armed and has not stopped on its own.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn select_subject(&self, subject: Option<SubjectId>) {
        self.timer.lock().select_subject(subject);
    }

    pub fn start(&mut self) {
        self.cancel();
        self.timer.lock().start();
        self.arm();
    }

    pub fn pause(&mut self) {
        self.cancel();
        self.timer.lock().pause();
    }

    pub fn toggle(&mut self) {
        if self.timer.lock().is_active() {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Restores the current mode's full duration without changing whether the
    /// countdown runs.
    pub fn reset(&mut self) {
        self.cancel();
        let active = {
            let mut t = self.timer.lock();
            t.reset();
            t.is_active()
        };
        if active {
            self.arm();
        }
    }

    pub fn set_mode(&mut self, mode: TimerMode) {
        self.cancel();
        self.timer.lock().set_mode(mode);
    }

    pub fn apply_settings(&self, settings: PomodoroSettings) {
        self.timer.lock().apply_settings(settings);
    }

    /// Keeps the machine's settings in step with the store's `settings` key.
    pub fn follow_settings(&mut self, store: &Store) {
        self.unfollow_settings();
        let timer = Arc::clone(&self.timer);
        let id = store.subscribe(StoreKey::Settings, move |_| timer.lock().reload_settings());
        self.settings_sub = Some((store.clone(), id));
    }

    fn unfollow_settings(&mut self) {
        if let Some((store, id)) = self.settings_sub.take() {
            store.unsubscribe(id);
        }
    }

    /// Stops ticking for good. An unfinished work interval is dropped, not recorded.
    pub fn shutdown(mut self) -> TimerSnapshot {
        self.cancel();
        self.unfollow_settings();
        let mut t = self.timer.lock();
        t.pause();
        t.snapshot()
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn arm(&mut self) {
        let timer = Arc::clone(&self.timer);
        let events = self.events.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if step(&timer, &events).is_break() {
                    break;
                }
            }
        }));
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.cancel();
        self.unfollow_settings();
    }
}

fn step(timer: &Mutex<PomodoroTimer>, events: &broadcast::Sender<TimerEvent>) -> ControlFlow<()> {
    let Some(mut t) = timer.try_lock() else {
        tracing::debug!("timer busy, skipping overlapping tick");
        return ControlFlow::Continue(());
    };
    // Send errors only mean nobody is listening.
    match t.tick(Utc::now()) {
        Ok(TickOutcome::Idle) => ControlFlow::Break(()),
        Ok(TickOutcome::Running { .. }) => {
            let _ = events.send(TimerEvent::Tick(t.snapshot()));
            ControlFlow::Continue(())
        }
        Ok(TickOutcome::Expired(transition)) => {
            let snapshot = t.snapshot();
            let _ = events.send(TimerEvent::Expired(transition));
            let _ = events.send(TimerEvent::Tick(snapshot));
            ControlFlow::Break(())
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to record study session");
            t.pause();
            let _ = events.send(TimerEvent::Failed(e.to_string()));
            ControlFlow::Break(())
        }
    }
}
