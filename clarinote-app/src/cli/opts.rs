use clap::{Args, Parser, Subcommand, ValueEnum};
use clarinote_core::TimerMode;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(name = "clarinote", version, about = "ClariNote study companion CLI")]
pub struct Cli {
    /// Store file (defaults to the app data dir)
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Directory for rotating backups of the store file
    #[arg(long, global = true)]
    pub backups_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. warn, info, debug)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Subject operations
    #[command(subcommand)]
    Subject(SubjectCmd),
    /// Deck operations, sharing and CSV import/export
    #[command(subcommand)]
    Deck(DeckCmd),
    /// Review the due cards of one deck
    Review(ReviewCmd),
    /// Run the focus timer in the foreground
    Timer(TimerCmd),
    /// Focus timer settings and blocked sites
    #[command(subcommand)]
    Settings(SettingsCmd),
    /// Set the notes attached to the next recorded session
    Notes { text: String },
    /// Progress summary
    Stats,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SubjectCmd {
    Add { name: String },
    List,
    Rm { subject: String },
}

#[derive(Debug, Subcommand, Clone)]
pub enum DeckCmd {
    List {
        #[arg(long)]
        subject: Option<String>,
    },
    Show { deck: String },
    Rm { deck: String },
    /// Print a share link for a deck
    Share {
        deck: String,
        #[arg(long, default_value = "https://clarinote.app")]
        base_url: String,
    },
    /// Import a shared link or bare payload into a subject
    Import {
        link: String,
        #[arg(long)]
        subject: String,
    },
    ExportCsv {
        path: PathBuf,
        #[arg(long)]
        deck: Option<String>,
    },
    /// Rows are `topic,question,answer`; decks are created per topic
    ImportCsv {
        path: PathBuf,
        #[arg(long)]
        subject: String,
    },
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[arg(long)]
    pub deck: String,
    #[arg(long, default_value_t = 50)]
    pub max: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Work,
    ShortBreak,
    LongBreak,
}

impl From<ModeArg> for TimerMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Work => TimerMode::Work,
            ModeArg::ShortBreak => TimerMode::ShortBreak,
            ModeArg::LongBreak => TimerMode::LongBreak,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct TimerCmd {
    #[arg(long)]
    pub subject: String,
    #[arg(long, value_enum, default_value_t = ModeArg::Work)]
    pub mode: ModeArg,
    /// Work intervals to complete before exiting; breaks run in between
    #[arg(long, default_value_t = 1)]
    pub cycles: u32,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SettingsCmd {
    Show,
    Set(SettingsSet),
    Block { site: String },
    Unblock { site: String },
}

#[derive(Debug, Args, Clone)]
pub struct SettingsSet {
    #[arg(long)]
    pub work: Option<u32>,
    #[arg(long)]
    pub short_break: Option<u32>,
    #[arg(long)]
    pub long_break: Option<u32>,
    /// Work intervals per long break
    #[arg(long)]
    pub every: Option<u32>,
}
