use crate::{Deck, Session, Subject, SubjectId};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub sessions: u32,
    pub seconds: u64,
}

impl Totals {
    pub fn record(&mut self, s: &Session) {
        self.sessions += 1;
        self.seconds += s.duration;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectMinutes {
    pub subject_id: SubjectId,
    pub name: String,
    pub minutes: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub totals: Totals,
    pub total_flashcards: usize,
    pub ai_questions: u64,
    pub per_subject: Vec<SubjectMinutes>,
}

fn rounded_minutes(seconds: u64) -> u64 {
    (seconds + 30) / 60
}

pub fn summarize(
    sessions: &[Session],
    subjects: &[Subject],
    decks: &[Deck],
    ai_questions: u64,
) -> ProgressSummary {
    let mut totals = Totals::default();
    for s in sessions {
        totals.record(s);
    }

    // Each session is rounded on its own before summing.
    let per_subject = subjects
        .iter()
        .map(|subj| SubjectMinutes {
            subject_id: subj.id,
            name: subj.name.clone(),
            minutes: sessions
                .iter()
                .filter(|s| s.subject_id == subj.id)
                .map(|s| rounded_minutes(s.duration))
                .sum(),
        })
        .filter(|m| m.minutes > 0)
        .collect();

    ProgressSummary {
        totals,
        total_flashcards: decks.iter().map(|d| d.flashcards.len()).sum(),
        ai_questions,
        per_subject,
    }
}

pub fn sessions_per_day(sessions: &[Session]) -> BTreeMap<NaiveDate, Totals> {
    let mut per_day: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for s in sessions {
        per_day.entry(s.start_time.date_naive()).or_default().record(s);
    }
    per_day
}

pub fn daily_streak(sessions: &[Session], today: NaiveDate) -> u32 {
    let per_day = sessions_per_day(sessions);
    let mut streak = 0u32;
    let mut day = today;
    while per_day.get(&day).is_some_and(|t| t.sessions > 0) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}
