use crate::filters::{due_cards, flatten_cards, group_by_subject, SubjectDecks};
use crate::generate::{AssistantReply, Quiz, SourceMaterial, StudyGenerator};
use crate::share::{self, SharedDeck};
use crate::{
    rate, AppSettings, CardId, CoreError, Deck, DeckCard, DeckId, Flashcard, NewDeck,
    PomodoroSettings, Rating, ServiceFailure, Session, Store, StoreKey, Subject, SubjectId,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Subject, deck, settings and counter bookkeeping over a [`Store`].
#[derive(Clone)]
pub struct StudyService {
    store: Store,
}

impl StudyService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // Subjects

    pub fn subjects(&self) -> Vec<Subject> {
        self.store.subjects()
    }

    pub fn subject(&self, id: SubjectId) -> Result<Subject, CoreError> {
        self.subjects()
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(CoreError::NotFound("subject"))
    }

    pub fn add_subject(&self, name: &str) -> Result<Subject, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("subject name is required"));
        }
        let subject = Subject::new(name);
        let out = subject.clone();
        self.store
            .update(StoreKey::Subjects, |v: &mut Vec<Subject>| v.push(subject))?;
        Ok(out)
    }

    /// Decks of the removed subject are left in place.
    pub fn remove_subject(&self, id: SubjectId) -> Result<(), CoreError> {
        let removed = self.store.update(StoreKey::Subjects, |v: &mut Vec<Subject>| {
            let before = v.len();
            v.retain(|s| s.id != id);
            before != v.len()
        })?;
        if !removed {
            return Err(CoreError::NotFound("subject"));
        }
        let orphans = self.decks().iter().filter(|d| d.subject_id == id).count();
        if orphans > 0 {
            tracing::warn!(subject = %id, orphans, "removed subject still has decks");
        }
        Ok(())
    }

    // Decks

    pub fn decks(&self) -> Vec<Deck> {
        self.store.decks()
    }

    pub fn deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        self.decks()
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(CoreError::NotFound("deck"))
    }

    pub fn add_deck(&self, new: NewDeck, now: DateTime<Utc>) -> Result<Deck, CoreError> {
        let topic = new.topic.trim();
        if topic.is_empty() {
            return Err(CoreError::Validation("topic name is required"));
        }
        self.subject(new.subject_id)
            .map_err(|_| CoreError::Validation("select a subject first"))?;

        let deck = Deck {
            id: Uuid::new_v4(),
            subject_id: new.subject_id,
            topic: topic.to_string(),
            summary: new.summary,
            flashcards: new
                .flashcards
                .into_iter()
                .map(|d| Flashcard::from_draft(d, now))
                .collect(),
        };
        let out = deck.clone();
        self.store.update(StoreKey::Decks, |v: &mut Vec<Deck>| v.push(deck))?;
        tracing::info!(deck = %out.id, cards = out.flashcards.len(), "added deck");
        Ok(out)
    }

    pub fn remove_deck(&self, id: DeckId) -> Result<(), CoreError> {
        let removed = self.store.update(StoreKey::Decks, |v: &mut Vec<Deck>| {
            let before = v.len();
            v.retain(|d| d.id != id);
            before != v.len()
        })?;
        if !removed {
            return Err(CoreError::NotFound("deck"));
        }
        tracing::info!(deck = %id, "removed deck");
        Ok(())
    }

    pub fn decks_by_subject(&self) -> Vec<SubjectDecks> {
        group_by_subject(&self.subjects(), &self.decks())
    }

    pub fn all_flashcards(&self) -> Vec<DeckCard> {
        flatten_cards(&self.decks())
    }

    // Review

    pub fn due_cards(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<Vec<Flashcard>, CoreError> {
        Ok(due_cards(&self.deck(deck_id)?, now))
    }

    pub fn rate_card(
        &self,
        card_id: CardId,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<Flashcard, CoreError> {
        let updated = self.store.update(StoreKey::Decks, |decks: &mut Vec<Deck>| {
            decks
                .iter_mut()
                .flat_map(|d| d.flashcards.iter_mut())
                .find(|c| c.id == card_id)
                .map(|card| {
                    let next = rate(card, rating, now);
                    *card = next.clone();
                    next
                })
        })?;
        updated.ok_or(CoreError::NotFound("card"))
    }

    // Settings, notes, counters

    pub fn settings(&self) -> AppSettings {
        self.store.settings()
    }

    pub fn update_pomodoro(&self, pomodoro: PomodoroSettings) -> Result<AppSettings, CoreError> {
        pomodoro.validate()?;
        self.store.update(StoreKey::Settings, |s: &mut AppSettings| {
            s.pomodoro = pomodoro;
            s.clone()
        })
    }

    pub fn set_blocked_sites(&self, sites: Vec<String>) -> Result<AppSettings, CoreError> {
        let mut cleaned: Vec<String> = Vec::new();
        for site in sites {
            let site = site.trim().to_lowercase();
            if !site.is_empty() && !cleaned.contains(&site) {
                cleaned.push(site);
            }
        }
        self.store.update(StoreKey::Settings, |s: &mut AppSettings| {
            s.blocked_sites = cleaned;
            s.clone()
        })
    }

    pub fn session_notes(&self) -> String {
        self.store.session_notes()
    }

    pub fn set_session_notes(&self, notes: &str) -> Result<(), CoreError> {
        self.store.set(StoreKey::SessionNotes, notes)
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.store.sessions()
    }

    /// Appends a finished session, consuming any pending notes.
    pub fn record_session(
        &self,
        subject_id: SubjectId,
        duration: u64,
        start_time: DateTime<Utc>,
    ) -> Result<Session, CoreError> {
        let notes = self.session_notes();
        let notes = (!notes.trim().is_empty()).then_some(notes);
        let session = Session::new(subject_id, duration, start_time, notes);
        self.store.append_session(session.clone())?;
        // Must not fail once the session is stored, or a retry records it twice.
        if session.notes.is_some() {
            if let Err(e) = self.set_session_notes("") {
                tracing::warn!(error = %e, "recorded session but could not clear pending notes");
            }
        }
        Ok(session)
    }

    pub fn ai_questions_count(&self) -> u64 {
        self.store.ai_questions_count()
    }

    pub fn increment_ai_questions(&self) -> Result<u64, CoreError> {
        self.store.update(StoreKey::AiQuestionsCount, |n: &mut u64| {
            *n += 1;
            *n
        })
    }

    // Sharing

    pub fn share_deck(&self, deck_id: DeckId) -> Result<String, CoreError> {
        share::encode(&SharedDeck::from_deck(&self.deck(deck_id)?))
    }

    /// Decodes and validates the payload before touching the store, so a bad
    /// link never leaves a partial deck behind.
    pub fn import_shared(
        &self,
        payload: &str,
        subject_id: Option<SubjectId>,
        now: DateTime<Utc>,
    ) -> Result<Deck, CoreError> {
        let shared = share::decode(payload)?;
        let subject_id = subject_id.ok_or(CoreError::Validation("select a subject first"))?;
        let summary = shared
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("Imported deck for {}", shared.topic));
        self.add_deck(
            NewDeck {
                subject_id,
                topic: shared.topic,
                summary,
                flashcards: shared.flashcards,
            },
            now,
        )
    }

    // Generation

    pub async fn generate_deck(
        &self,
        generator: &dyn StudyGenerator,
        subject_id: Option<SubjectId>,
        topic: &str,
        source: &SourceMaterial,
        now: DateTime<Utc>,
    ) -> Result<Deck, CoreError> {
        let subject_id = subject_id.ok_or(CoreError::Validation("select a subject first"))?;
        if topic.trim().is_empty() {
            return Err(CoreError::Validation("topic name is required"));
        }
        if source.is_empty() {
            return Err(CoreError::Validation("source content is empty"));
        }
        self.subject(subject_id)
            .map_err(|_| CoreError::Validation("select a subject first"))?;

        let generated = generator.generate_flashcards(source).await?;
        if generated.flashcards.is_empty() {
            return Err(CoreError::ExternalService(ServiceFailure::Other(
                "no flashcards could be generated from this material".into(),
            )));
        }
        self.add_deck(
            NewDeck {
                subject_id,
                topic: topic.to_string(),
                summary: generated.summary,
                flashcards: generated.flashcards,
            },
            now,
        )
    }

    pub async fn generate_quiz(
        &self,
        generator: &dyn StudyGenerator,
        deck_id: DeckId,
    ) -> Result<Quiz, CoreError> {
        let deck = self.deck(deck_id)?;
        if deck.flashcards.is_empty() {
            return Err(CoreError::Validation("deck has no flashcards"));
        }
        let drafts: Vec<_> = deck.flashcards.iter().map(|c| c.to_draft()).collect();
        let quiz = generator.generate_quiz(&deck.topic, &drafts).await?;
        if quiz.questions.is_empty() || !quiz.questions.iter().all(|q| q.is_well_formed()) {
            return Err(CoreError::ExternalService(ServiceFailure::Other(
                "the generated quiz was malformed".into(),
            )));
        }
        Ok(quiz)
    }

    pub async fn ask_assistant(
        &self,
        generator: &dyn StudyGenerator,
        query: &str,
        simplify: bool,
    ) -> Result<AssistantReply, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::Validation("question is empty"));
        }
        let mut reply = generator.study_assistant(query, simplify).await?;
        if simplify {
            reply.suggested_flashcards.clear();
        }
        self.increment_ai_questions()?;
        Ok(reply)
    }
}
