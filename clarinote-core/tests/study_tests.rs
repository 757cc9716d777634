use async_trait::async_trait;
use chrono::{Duration, Utc};
use clarinote_core::generate::{
    AssistantReply, GeneratedDeck, GeneratorError, Quiz, QuizQuestion, SourceMaterial,
    StudyGenerator,
};
use clarinote_core::share::{self, SharedDeck};
use clarinote_core::{
    CardDraft, CoreError, NewDeck, PomodoroSettings, Rating, ServiceFailure, Store, StudyService,
};
use std::sync::atomic::{AtomicUsize, Ordering};

fn service() -> StudyService {
    StudyService::new(Store::in_memory())
}

fn drafts(n: usize) -> Vec<CardDraft> {
    (0..n).map(|i| CardDraft::new(format!("q{i}"), format!("a{i}"))).collect()
}

#[test]
fn new_decks_start_unlearned_and_due() {
    let svc = service();
    let subj = svc.add_subject("  Biology ").unwrap();
    assert_eq!(subj.name, "Biology");
    let now = Utc::now();
    let deck = svc
        .add_deck(
            NewDeck { subject_id: subj.id, topic: "Cells".into(), summary: "s".into(), flashcards: drafts(3) },
            now,
        )
        .unwrap();

    assert_eq!(deck.flashcards.len(), 3);
    assert!(deck.flashcards.iter().all(|c| c.srs_level == 0 && c.next_review_date == Some(now)));
    let questions: Vec<_> = deck.flashcards.iter().map(|c| c.question.as_str()).collect();
    assert_eq!(questions, ["q0", "q1", "q2"]);
    let mut ids: Vec<_> = deck.flashcards.iter().map(|c| c.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(svc.deck(deck.id).unwrap(), deck);
}

#[test]
fn deck_needs_topic_and_known_subject() {
    let svc = service();
    let subj = svc.add_subject("Math").unwrap();
    let blank = svc.add_deck(
        NewDeck { subject_id: subj.id, topic: "  ".into(), summary: String::new(), flashcards: drafts(1) },
        Utc::now(),
    );
    assert!(matches!(blank, Err(CoreError::Validation(_))));

    let stray = svc.add_deck(
        NewDeck { subject_id: uuid::Uuid::new_v4(), topic: "Sets".into(), summary: String::new(), flashcards: drafts(1) },
        Utc::now(),
    );
    assert!(matches!(stray, Err(CoreError::Validation(_))));
    assert!(svc.decks().is_empty());
    assert!(matches!(svc.add_subject(""), Err(CoreError::Validation(_))));
}

#[test]
fn rating_persists_and_moves_card_out_of_queue() {
    let svc = service();
    let subj = svc.add_subject("French").unwrap();
    let now = Utc::now();
    let deck = svc
        .add_deck(
            NewDeck { subject_id: subj.id, topic: "Verbs".into(), summary: String::new(), flashcards: drafts(2) },
            now,
        )
        .unwrap();
    let first = deck.flashcards[0].id;

    let updated = svc.rate_card(first, Rating::Good, now).unwrap();
    assert_eq!(updated.srs_level, 1);
    assert_eq!(updated.next_review_date, Some(now + Duration::days(2)));
    assert_eq!(svc.deck(deck.id).unwrap().card(first), Some(&updated));

    let queue = svc.due_cards(deck.id, now).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, deck.flashcards[1].id);

    assert!(matches!(
        svc.rate_card(uuid::Uuid::new_v4(), Rating::Easy, now),
        Err(CoreError::NotFound("card"))
    ));
}

#[test]
fn removing_a_subject_orphans_its_decks() {
    let svc = service();
    let subj = svc.add_subject("Old").unwrap();
    let deck = svc
        .add_deck(
            NewDeck { subject_id: subj.id, topic: "Kept".into(), summary: String::new(), flashcards: drafts(1) },
            Utc::now(),
        )
        .unwrap();
    svc.remove_subject(subj.id).unwrap();
    assert!(svc.subjects().is_empty());
    assert_eq!(svc.decks(), vec![deck.clone()]);
    assert!(svc.decks_by_subject().is_empty());

    svc.remove_deck(deck.id).unwrap();
    assert!(svc.decks().is_empty());
    assert!(matches!(svc.remove_deck(deck.id), Err(CoreError::NotFound(_))));
}

#[test]
fn pomodoro_edits_are_validated() {
    let svc = service();
    let bad = PomodoroSettings { sessions_per_long_break: 0, ..PomodoroSettings::default() };
    assert!(matches!(svc.update_pomodoro(bad), Err(CoreError::Validation(_))));

    let good = PomodoroSettings { work_minutes: 50, ..PomodoroSettings::default() };
    let saved = svc.update_pomodoro(good).unwrap();
    assert_eq!(saved.pomodoro.work_minutes, 50);
    assert_eq!(svc.settings().pomodoro, good);

    let sites = svc
        .set_blocked_sites(vec!["YouTube.com".into(), " youtube.com".into(), "".into(), "reddit.com".into()])
        .unwrap();
    assert_eq!(sites.blocked_sites, ["youtube.com", "reddit.com"]);
}

#[test]
fn shared_deck_imports_under_chosen_subject() {
    let sender = service();
    let subj = sender.add_subject("Astronomy").unwrap();
    let deck = sender
        .add_deck(
            NewDeck { subject_id: subj.id, topic: "Planets".into(), summary: "Eight of them".into(), flashcards: drafts(3) },
            Utc::now(),
        )
        .unwrap();
    let payload = sender.share_deck(deck.id).unwrap();
    assert!(payload.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

    let receiver = service();
    let target = receiver.add_subject("Space").unwrap();
    let link = format!("https://clarinote.example/import?data={payload}");
    let imported = receiver.import_shared(&link, Some(target.id), Utc::now()).unwrap();
    assert_eq!(imported.subject_id, target.id);
    assert_eq!(imported.topic, "Planets");
    assert_eq!(imported.summary, "Eight of them");
    let pairs: Vec<_> = imported.flashcards.iter().map(|c| c.to_draft()).collect();
    assert_eq!(pairs, drafts(3));
    assert!(imported.flashcards.iter().all(|c| c.srs_level == 0));
}

#[test]
fn missing_summary_gets_placeholder() {
    let svc = service();
    let subj = svc.add_subject("Art").unwrap();
    let payload = share::encode(&SharedDeck { topic: "Cubism".into(), summary: None, flashcards: drafts(1) }).unwrap();
    let deck = svc.import_shared(&payload, Some(subj.id), Utc::now()).unwrap();
    assert_eq!(deck.summary, "Imported deck for Cubism");
}

#[test]
fn malformed_payloads_are_rejected_without_side_effects() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let svc = service();
    let subj = svc.add_subject("Any").unwrap();
    let no_topic = URL_SAFE_NO_PAD.encode(br#"{"flashcards":[]}"#);
    let blank_topic = URL_SAFE_NO_PAD.encode(br#"{"topic":"","flashcards":[]}"#);
    let cards_not_list = URL_SAFE_NO_PAD.encode(br#"{"topic":"x","flashcards":"nope"}"#);
    let bad_card = URL_SAFE_NO_PAD.encode(br#"{"topic":"x","flashcards":[{"question":1}]}"#);

    for payload in ["", "%%%not-base64%%%", no_topic.as_str(), blank_topic.as_str(), cards_not_list.as_str(), bad_card.as_str()] {
        let out = svc.import_shared(payload, Some(subj.id), Utc::now());
        assert!(matches!(out, Err(CoreError::ImportFormat(_))), "accepted {payload:?}");
    }
    assert!(svc.decks().is_empty());

    let good = share::encode(&SharedDeck { topic: "x".into(), summary: None, flashcards: vec![] }).unwrap();
    assert!(matches!(svc.import_shared(&good, None, Utc::now()), Err(CoreError::Validation(_))));
}

#[derive(Default)]
struct FakeGenerator {
    fail_with: Option<&'static str>,
    cards: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl StudyGenerator for FakeGenerator {
    async fn generate_flashcards(&self, _source: &SourceMaterial) -> Result<GeneratedDeck, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.fail_with {
            return Err(GeneratorError::new(msg));
        }
        Ok(GeneratedDeck { summary: "generated".into(), flashcards: drafts(self.cards) })
    }

    async fn generate_quiz(&self, topic: &str, flashcards: &[CardDraft]) -> Result<Quiz, GeneratorError> {
        let questions = flashcards
            .iter()
            .map(|c| QuizQuestion {
                text: c.question.clone(),
                options: vec![c.answer.clone(), "b".into(), "c".into(), "d".into()],
                correct_index: 0,
                explanation: "because".into(),
            })
            .collect();
        Ok(Quiz { title: format!("{topic} quiz"), questions })
    }

    async fn study_assistant(&self, query: &str, _simplify: bool) -> Result<AssistantReply, GeneratorError> {
        Ok(AssistantReply { response: format!("about {query}"), suggested_flashcards: drafts(2) })
    }
}

#[tokio::test]
async fn generation_saves_a_deck_on_success() {
    let svc = service();
    let subj = svc.add_subject("Economics").unwrap();
    let generator = FakeGenerator { cards: 4, ..Default::default() };
    let source = SourceMaterial::Text("Supply and demand...".into());

    let deck = svc.generate_deck(&generator, Some(subj.id), "Markets", &source, Utc::now()).await.unwrap();
    assert_eq!(deck.flashcards.len(), 4);
    assert_eq!(deck.summary, "generated");
    assert_eq!(svc.decks().len(), 1);

    let quiz = svc.generate_quiz(&generator, deck.id).await.unwrap();
    assert_eq!(quiz.title, "Markets quiz");
    assert_eq!(quiz.questions.len(), 4);
}

#[tokio::test]
async fn generation_validates_before_calling_out() {
    let svc = service();
    let subj = svc.add_subject("Economics").unwrap();
    let generator = FakeGenerator { cards: 4, ..Default::default() };
    let text = SourceMaterial::Text("content".into());

    let no_subject = svc.generate_deck(&generator, None, "Markets", &text, Utc::now()).await;
    assert!(matches!(no_subject, Err(CoreError::Validation(_))));
    let no_topic = svc.generate_deck(&generator, Some(subj.id), " ", &text, Utc::now()).await;
    assert!(matches!(no_topic, Err(CoreError::Validation(_))));
    let empty = svc
        .generate_deck(&generator, Some(subj.id), "Markets", &SourceMaterial::Text("   ".into()), Utc::now())
        .await;
    assert!(matches!(empty, Err(CoreError::Validation(_))));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn service_failures_are_classified_and_save_nothing() {
    let svc = service();
    let subj = svc.add_subject("Economics").unwrap();
    let text = SourceMaterial::Text("content".into());

    let busy = FakeGenerator { fail_with: Some("503 Service Unavailable"), ..Default::default() };
    let out = svc.generate_deck(&busy, Some(subj.id), "Markets", &text, Utc::now()).await;
    assert!(matches!(out, Err(CoreError::ExternalService(ServiceFailure::Overloaded))));
    assert_eq!(busy.calls.load(Ordering::SeqCst), 1);

    let broken = FakeGenerator { fail_with: Some("bad gateway"), ..Default::default() };
    let out = svc.generate_deck(&broken, Some(subj.id), "Markets", &text, Utc::now()).await;
    assert!(matches!(out, Err(CoreError::ExternalService(ServiceFailure::Other(_)))));

    let empty = FakeGenerator::default();
    let out = svc.generate_deck(&empty, Some(subj.id), "Markets", &text, Utc::now()).await;
    assert!(matches!(out, Err(CoreError::ExternalService(_))));

    assert!(svc.decks().is_empty());
}

#[tokio::test]
async fn assistant_counts_questions_and_simplified_replies_carry_no_cards() {
    let svc = service();
    let generator = FakeGenerator::default();

    let full = svc.ask_assistant(&generator, "what is entropy?", false).await.unwrap();
    assert_eq!(full.suggested_flashcards.len(), 2);
    let simple = svc.ask_assistant(&generator, "what is entropy?", true).await.unwrap();
    assert!(simple.suggested_flashcards.is_empty());
    assert_eq!(svc.ai_questions_count(), 2);

    assert!(matches!(svc.ask_assistant(&generator, "  ", false).await, Err(CoreError::Validation(_))));
    assert_eq!(svc.ai_questions_count(), 2);
}
