use crate::cli::opts::*;
use crate::config::Config;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clarinote_core::share::{self, SharedDeck};
use clarinote_core::{
    count_due, daily_streak, summarize, CardDraft, Deck, NewDeck, PomodoroTimer, Rating, Store,
    StudyService, Subject, TimerDriver, TimerEvent, TimerMode, Transition,
};
use clarinote_json::JsonFileBackend;
use serde::{Deserialize, Serialize};
use std::io::{stdin, stdout, Write};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

pub async fn run_cli(args: Cli, config: Config) -> Result<()> {
    let study = open_study(&config)?;
    match args.cmd {
        Command::Subject(cmd) => subject_cmd(&study, cmd),
        Command::Deck(cmd) => deck_cmd(&study, cmd),
        Command::Review(cmd) => review_cmd(&study, cmd),
        Command::Timer(cmd) => timer_cmd(&study, cmd).await,
        Command::Settings(cmd) => settings_cmd(&study, cmd),
        Command::Notes { text } => {
            study.set_session_notes(&text)?;
            println!("ok");
            Ok(())
        }
        Command::Stats => stats_cmd(&study),
    }
}

pub fn open_study(config: &Config) -> Result<StudyService> {
    let backend = JsonFileBackend::open_with(
        config.data_file.clone(),
        config.backups_dir.clone(),
        config.max_backups,
    )
    .with_context(|| format!("opening store at {}", config.data_file.display()))?;
    Ok(StudyService::new(Store::new(backend)))
}

fn subject_cmd(study: &StudyService, cmd: SubjectCmd) -> Result<()> {
    match cmd {
        SubjectCmd::Add { name } => {
            let s = study.add_subject(&name)?;
            println!("{}", s.id);
        }
        SubjectCmd::List => {
            let decks = study.decks();
            for s in study.subjects() {
                let n = decks.iter().filter(|d| d.subject_id == s.id).count();
                println!("{}\t{}\tdecks={}", s.id, s.name, n);
            }
        }
        SubjectCmd::Rm { subject } => {
            let s = resolve_subject(study, &subject)?;
            study.remove_subject(s.id)?;
            println!("ok");
        }
    }
    Ok(())
}

fn deck_cmd(study: &StudyService, cmd: DeckCmd) -> Result<()> {
    let now = Utc::now();
    match cmd {
        DeckCmd::List { subject } => {
            let filter = match subject {
                Some(sel) => Some(resolve_subject(study, &sel)?.id),
                None => None,
            };
            let subjects = study.subjects();
            for d in study.decks() {
                if filter.is_some_and(|id| id != d.subject_id) {
                    continue;
                }
                let owner = subjects
                    .iter()
                    .find(|s| s.id == d.subject_id)
                    .map_or("(no subject)", |s| s.name.as_str());
                println!(
                    "{}\t{}\t{}\tcards={}\tdue={}",
                    d.id,
                    d.topic,
                    owner,
                    d.flashcards.len(),
                    count_due(&d, now)
                );
            }
        }
        DeckCmd::Show { deck } => {
            let d = resolve_deck(study, &deck)?;
            println!("{}\n{}\n", d.topic, d.summary);
            for c in &d.flashcards {
                println!(
                    "{}\tlevel={}\tnext={}\n  Q: {}\n  A: {}",
                    c.id,
                    c.srs_level,
                    format_due(c.next_review_date),
                    c.question,
                    c.answer
                );
            }
        }
        DeckCmd::Rm { deck } => {
            let d = resolve_deck(study, &deck)?;
            study.remove_deck(d.id)?;
            println!("ok");
        }
        DeckCmd::Share { deck, base_url } => {
            let d = resolve_deck(study, &deck)?;
            println!("{}", share::share_link(&base_url, &SharedDeck::from_deck(&d))?);
        }
        DeckCmd::Import { link, subject } => {
            let s = resolve_subject(study, &subject)?;
            let d = study.import_shared(&link, Some(s.id), now)?;
            println!("{}\t{}\tcards={}", d.id, d.topic, d.flashcards.len());
        }
        DeckCmd::ExportCsv { path, deck } => {
            let decks = match deck {
                Some(sel) => vec![resolve_deck(study, &sel)?],
                None => study.decks(),
            };
            let n = export_csv(&path, &decks)?;
            println!("wrote {} cards to {}", n, path.display());
        }
        DeckCmd::ImportCsv { path, subject } => {
            let s = resolve_subject(study, &subject)?;
            let groups = read_csv(&path)?;
            if groups.is_empty() {
                bail!("no rows in {}", path.display());
            }
            let source = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            for (topic, flashcards) in groups {
                let d = study.add_deck(
                    NewDeck {
                        subject_id: s.id,
                        summary: format!("Imported from {source}"),
                        topic,
                        flashcards,
                    },
                    now,
                )?;
                println!("{}\t{}\tcards={}", d.id, d.topic, d.flashcards.len());
            }
        }
    }
    Ok(())
}

fn review_cmd(study: &StudyService, cmd: ReviewCmd) -> Result<()> {
    let deck = resolve_deck(study, &cmd.deck)?;
    let queue = study.due_cards(deck.id, Utc::now())?;
    if queue.is_empty() {
        println!("deck has no cards");
        return Ok(());
    }

    let total = queue.len().min(cmd.max);
    let mut reviewed = 0usize;
    for (i, card) in queue.into_iter().take(cmd.max).enumerate() {
        println!("\n[{}/{}] {}", i + 1, total, deck.topic);
        println!("Q: {}", card.question);
        prompt_enter("[enter=show]")?;
        println!("A: {}", card.answer);
        println!("[1=Forgot, 2=Hard, 3=Good, 4=Easy, s=skip, q=quit]");
        let rating = loop {
            let line = read_line("rating> ")?;
            match line.trim().to_lowercase().as_str() {
                "s" | "skip" => break None,
                "q" | "quit" => {
                    println!("\nreviewed {reviewed}");
                    return Ok(());
                }
                other => match other.parse::<Rating>() {
                    Ok(r) => break Some(r),
                    Err(_) => println!("enter 1-4, s, or q"),
                },
            }
        };

        if let Some(rating) = rating {
            let updated = study.rate_card(card.id, rating, Utc::now())?;
            reviewed += 1;
            println!("→ level {}, next review {}", updated.srs_level, format_due(updated.next_review_date));
        }
    }

    println!("\nreviewed {reviewed}");
    Ok(())
}

async fn timer_cmd(study: &StudyService, cmd: TimerCmd) -> Result<()> {
    let subject = resolve_subject(study, &cmd.subject)?;
    let cycles = cmd.cycles.max(1);

    let mut timer = PomodoroTimer::new(study.store().clone());
    timer.set_mode(cmd.mode.into());
    timer.select_subject(Some(subject.id));

    let mut driver = TimerDriver::new(timer);
    driver.follow_settings(study.store());
    let mut events = driver.subscribe();

    println!("{} work interval(s) for {}, Ctrl-C to stop", cycles, subject.name);
    begin_interval(study, &mut driver);

    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Ok(TimerEvent::Tick(snap)) => {
                    print!("\r{} {}  ", snap.mode, snap.clock());
                    stdout().flush().ok();
                }
                Ok(TimerEvent::Expired(t)) => {
                    println!("\r{} finished, next up: {}", t.from, t.to);
                    if let Some(s) = &t.recorded {
                        println!("recorded {} min for {}", s.duration / 60, subject.name);
                    }
                    if run_complete(&t, driver.snapshot().completed_work_intervals, cycles) {
                        break;
                    }
                    begin_interval(study, &mut driver);
                }
                Ok(TimerEvent::Failed(e)) => {
                    driver.shutdown();
                    bail!("could not record session: {e}");
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "timer output lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                let snap = driver.shutdown();
                println!("\rstopped at {}, partial interval not recorded", snap.clock());
                return Ok(());
            }
        }
    }

    let snap = driver.shutdown();
    println!("done: {} work interval(s) completed", snap.completed_work_intervals);
    Ok(())
}

/// Picks up settings saved by other processes, then starts the pending mode.
fn begin_interval(study: &StudyService, driver: &mut TimerDriver) {
    let settings = study.settings();
    driver.apply_settings(settings.pomodoro);
    let snap = driver.snapshot();
    if snap.mode == TimerMode::Work && !settings.blocked_sites.is_empty() {
        println!("stay off: {}", settings.blocked_sites.join(", "));
    }
    println!("{} ({})", snap.mode, snap.clock());
    driver.start();
}

/// The run ends right after the requested number of work intervals.
fn run_complete(t: &Transition, completed: u32, cycles: u32) -> bool {
    t.from == TimerMode::Work && completed >= cycles
}

fn settings_cmd(study: &StudyService, cmd: SettingsCmd) -> Result<()> {
    match cmd {
        SettingsCmd::Show => {}
        SettingsCmd::Set(s) => {
            let mut p = study.settings().pomodoro;
            if let Some(v) = s.work { p.work_minutes = v; }
            if let Some(v) = s.short_break { p.short_break_minutes = v; }
            if let Some(v) = s.long_break { p.long_break_minutes = v; }
            if let Some(v) = s.every { p.sessions_per_long_break = v; }
            study.update_pomodoro(p)?;
        }
        SettingsCmd::Block { site } => {
            let mut sites = study.settings().blocked_sites;
            sites.push(site);
            study.set_blocked_sites(sites)?;
        }
        SettingsCmd::Unblock { site } => {
            let site = site.trim().to_lowercase();
            let mut sites = study.settings().blocked_sites;
            let before = sites.len();
            sites.retain(|s| *s != site);
            if sites.len() == before {
                bail!("not blocked: {site}");
            }
            study.set_blocked_sites(sites)?;
        }
    }

    let s = study.settings();
    println!("work={}m short_break={}m long_break={}m every={}",
        s.pomodoro.work_minutes,
        s.pomodoro.short_break_minutes,
        s.pomodoro.long_break_minutes,
        s.pomodoro.sessions_per_long_break);
    let blocked = if s.blocked_sites.is_empty() { "-".to_string() } else { s.blocked_sites.join(";") };
    println!("blocked={blocked}");
    Ok(())
}

fn stats_cmd(study: &StudyService) -> Result<()> {
    let sessions = study.sessions();
    let summary = summarize(&sessions, &study.subjects(), &study.decks(), study.ai_questions_count());
    let streak = daily_streak(&sessions, Utc::now().date_naive());

    println!("sessions\t{}", summary.totals.sessions);
    println!("study time\t{:.1}h", summary.totals.seconds as f64 / 3600.0);
    println!("flashcards\t{}", summary.total_flashcards);
    println!("ai questions\t{}", summary.ai_questions);
    println!("streak\t{} day(s)", streak);
    for s in summary.per_subject {
        println!("  {}\t{}m", s.name, s.minutes);
    }
    Ok(())
}

// ===== Helpers =====

fn resolve_subject(study: &StudyService, sel: &str) -> Result<Subject> {
    if let Ok(id) = Uuid::parse_str(sel) {
        if let Ok(s) = study.subject(id) {
            return Ok(s);
        }
    }
    match study.subjects().into_iter().find(|s| s.name.eq_ignore_ascii_case(sel.trim())) {
        Some(s) => Ok(s),
        None => bail!("subject not found: {sel}"),
    }
}

fn resolve_deck(study: &StudyService, sel: &str) -> Result<Deck> {
    if let Ok(id) = Uuid::parse_str(sel) {
        if let Ok(d) = study.deck(id) {
            return Ok(d);
        }
    }
    let mut hits: Vec<Deck> = study
        .decks()
        .into_iter()
        .filter(|d| d.topic.eq_ignore_ascii_case(sel.trim()))
        .collect();
    match hits.len() {
        0 => bail!("deck not found: {sel}"),
        1 => Ok(hits.remove(0)),
        n => bail!("{n} decks are named {sel:?}; use the deck id"),
    }
}

fn format_due(due: Option<DateTime<Utc>>) -> String {
    due.map_or_else(|| "now".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

fn prompt_enter(label: &str) -> Result<()> {
    read_line(label).map(|_| ())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    if stdin().read_line(&mut s)? == 0 {
        bail!("input closed");
    }
    Ok(s)
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    topic: String,
    question: String,
    answer: String,
    #[serde(default)]
    srs_level: Option<u32>,
    #[serde(default)]
    next_review_date: Option<DateTime<Utc>>,
}

fn export_csv(path: &Path, decks: &[Deck]) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut n = 0;
    for d in decks {
        for c in &d.flashcards {
            wtr.serialize(CsvRow {
                topic: d.topic.clone(),
                question: c.question.clone(),
                answer: c.answer.clone(),
                srs_level: Some(c.srs_level),
                next_review_date: c.next_review_date,
            })?;
            n += 1;
        }
    }
    wtr.flush()?;
    Ok(n)
}

/// Groups rows by topic in first-seen order. Scheduling columns are ignored;
/// imported cards start fresh.
fn read_csv(path: &Path) -> Result<Vec<(String, Vec<CardDraft>)>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut groups: Vec<(String, Vec<CardDraft>)> = Vec::new();
    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("row {}", line + 1))?;
        if row.question.trim().is_empty() || row.answer.trim().is_empty() {
            tracing::warn!(row = line + 1, "skipping row without question or answer");
            continue;
        }
        let draft = CardDraft::new(row.question, row.answer);
        match groups.iter_mut().find(|(t, _)| t.eq_ignore_ascii_case(row.topic.trim())) {
            Some((_, cards)) => cards.push(draft),
            None => groups.push((row.topic.trim().to_string(), vec![draft])),
        }
    }
    Ok(groups)
}
