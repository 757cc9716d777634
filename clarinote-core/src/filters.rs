use crate::{Deck, DeckCard, Flashcard, Subject};
use chrono::{DateTime, Utc};

/// Review queue for a deck: due cards in deck order, or the whole deck when
/// nothing is due yet.
pub fn due_cards(deck: &Deck, now: DateTime<Utc>) -> Vec<Flashcard> {
    let due: Vec<Flashcard> = deck
        .flashcards
        .iter()
        .filter(|c| c.is_due(now))
        .cloned()
        .collect();
    if due.is_empty() {
        deck.flashcards.clone()
    } else {
        due
    }
}

pub fn count_due(deck: &Deck, now: DateTime<Utc>) -> usize {
    deck.flashcards.iter().filter(|c| c.is_due(now)).count()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectDecks {
    pub subject: Subject,
    pub decks: Vec<Deck>,
}

/// Subjects in stored order, each with its decks sorted by topic. Subjects
/// without decks are left out, as are decks whose subject no longer exists.
pub fn group_by_subject(subjects: &[Subject], decks: &[Deck]) -> Vec<SubjectDecks> {
    subjects
        .iter()
        .map(|s| {
            let mut own: Vec<Deck> = decks
                .iter()
                .filter(|d| d.subject_id == s.id)
                .cloned()
                .collect();
            own.sort_by(|a, b| a.topic.cmp(&b.topic));
            SubjectDecks {
                subject: s.clone(),
                decks: own,
            }
        })
        .filter(|g| !g.decks.is_empty())
        .collect()
}

pub fn flatten_cards(decks: &[Deck]) -> Vec<DeckCard> {
    decks
        .iter()
        .flat_map(|d| {
            d.flashcards.iter().map(move |c| DeckCard {
                card: c.clone(),
                deck_id: d.id,
                subject_id: d.subject_id,
                topic: d.topic.clone(),
            })
        })
        .collect()
}

pub fn orphaned_decks<'a>(subjects: &[Subject], decks: &'a [Deck]) -> Vec<&'a Deck> {
    decks
        .iter()
        .filter(|d| !subjects.iter().any(|s| s.id == d.subject_id))
        .collect()
}
