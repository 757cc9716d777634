use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type SubjectId = Uuid;
pub type DeckId = Uuid;
pub type CardId = Uuid;
pub type SessionId = Uuid;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;
pub const DEFAULT_SESSIONS_PER_LONG_BREAK: u32 = 4;

/// Self-assessed recall quality for a single review.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Forgot,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Forgot => "forgot",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "f" | "forgot" | "again" => Ok(Rating::Forgot),
            "2" | "h" | "hard" => Ok(Rating::Hard),
            "3" | "g" | "good" => Ok(Rating::Good),
            "4" | "e" | "easy" => Ok(Rating::Easy),
            _ => Err(crate::CoreError::Validation("unknown rating")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A question/answer pair before it has been scheduled, as produced by
/// generation, import, or a shared link.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDraft {
    pub question: String,
    pub answer: String,
}

impl CardDraft {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: CardId,
    pub question: String,
    pub answer: String,
    pub srs_level: u32,
    /// `None` only for legacy records; such cards are always due.
    #[serde(default)]
    pub next_review_date: Option<DateTime<Utc>>,
}

impl Flashcard {
    /// A freshly scheduled card: level 0, due immediately.
    pub fn new(question: impl Into<String>, answer: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer: answer.into(),
            srs_level: 0,
            next_review_date: Some(now),
        }
    }

    pub fn from_draft(draft: CardDraft, now: DateTime<Utc>) -> Self {
        Self::new(draft.question, draft.answer, now)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date.map_or(true, |due| due <= now)
    }

    pub fn to_draft(&self) -> CardDraft {
        CardDraft::new(self.question.clone(), self.answer.clone())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DeckId,
    pub subject_id: SubjectId,
    pub topic: String,
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
}

impl Deck {
    pub fn card(&self, id: CardId) -> Option<&Flashcard> {
        self.flashcards.iter().find(|c| c.id == id)
    }
}

/// Input for creating a deck; ids and scheduling are assigned on insert.
#[derive(Clone, Debug)]
pub struct NewDeck {
    pub subject_id: SubjectId,
    pub topic: String,
    pub summary: String,
    pub flashcards: Vec<CardDraft>,
}

/// Flashcard annotated with the deck it lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeckCard {
    pub card: Flashcard,
    pub deck_id: DeckId,
    pub subject_id: SubjectId,
    pub topic: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub subject_id: SubjectId,
    /// Seconds.
    pub duration: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Session {
    pub fn new(
        subject_id: SubjectId,
        duration: u64,
        start_time: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            duration,
            start_time,
            notes,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettings {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub sessions_per_long_break: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            short_break_minutes: DEFAULT_SHORT_BREAK_MINUTES,
            long_break_minutes: DEFAULT_LONG_BREAK_MINUTES,
            sessions_per_long_break: DEFAULT_SESSIONS_PER_LONG_BREAK,
        }
    }
}

impl PomodoroSettings {
    pub fn validate(&self) -> Result<(), crate::CoreError> {
        if self.work_minutes == 0 || self.short_break_minutes == 0 || self.long_break_minutes == 0 {
            return Err(crate::CoreError::Validation("durations must be at least one minute"));
        }
        if self.sessions_per_long_break == 0 {
            return Err(crate::CoreError::Validation(
                "sessions per long break must be at least one",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub pomodoro: PomodoroSettings,
    pub blocked_sites: Vec<String>,
}
