use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use n0_future::StreamExt;
use resh_common::telemetry::{self, TelemetryConfig};
use resh_editor_core::normalize::{detect, normalize};
use resh_editor_core::seo::{ScoredCandidate, rank_candidates, score_breakdown};
use resh_editor_core::stream::{TextAccumulator, chunked, scripted};
use resh_editor_core::{
    DocumentId, Draft, EditingTarget, EditorConfig, EditorSession, GenerationEvent,
    LanguageCode, MemoryView, RenderEvent, SessionEvent,
};
use web_time::Instant;

mod json_store;
mod settings;

use json_store::JsonFileStore;

#[derive(Parser)]
#[command(version, about = "resh - SEO scoring and editor pipeline tools", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Editor timings (.json, or .kdl overrides)
    #[arg(long, global = true, env = "RESH_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score title/description candidates for a keyword
    Score {
        /// Primary keyword
        #[arg(long, short)]
        keyword: String,

        /// Candidate title; repeat to rank several candidates
        #[arg(long, short, required = true)]
        title: Vec<String>,

        /// Meta description, paired with each --title in order
        #[arg(long, short)]
        description: Vec<String>,

        /// Related keyword (repeatable)
        #[arg(long, short)]
        related: Vec<String>,
    },
    /// Print the markup the editor would show for a file
    Normalize {
        file: PathBuf,
    },
    /// Stream a file through a full editor session, saving to a JSON store
    Replay {
        file: PathBuf,

        /// JSON file the document store writes to
        #[arg(long)]
        out: PathBuf,

        /// Document id to save under
        #[arg(long, default_value = "draft")]
        document: String,

        /// Save as a translation into this language
        #[arg(long)]
        language: Option<String>,

        /// Characters per streamed delta
        #[arg(long, default_value_t = 24)]
        chunk: usize,

        /// Simulated milliseconds between deltas
        #[arg(long, default_value_t = 40)]
        interval_ms: u64,

        /// Sleep between deltas instead of simulating time
        #[arg(long)]
        realtime: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();

    let cli = Cli::parse();

    let mut telemetry_config = TelemetryConfig::from_env("resh-cli");
    if cli.verbose {
        telemetry_config = telemetry_config.with_level(tracing::Level::DEBUG);
    }
    telemetry::init(telemetry_config);

    let config = settings::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Score {
            keyword,
            title,
            description,
            related,
        } => score(keyword, title, description, related),
        Commands::Normalize { file } => {
            let text = tokio::fs::read_to_string(&file).await.into_diagnostic()?;
            tracing::debug!(kind = ?detect(&text), "detected content kind");
            println!("{}", normalize(&text));
            Ok(())
        }
        Commands::Replay {
            file,
            out,
            document,
            language,
            chunk,
            interval_ms,
            realtime,
        } => {
            let document = DocumentId::new(document)?;
            let target = match language {
                Some(language) => EditingTarget::translation(document, LanguageCode::new(language)?),
                None => EditingTarget::original(document),
            };
            let replay = Replay {
                file,
                store: JsonFileStore::new(&out),
                target,
                chunk,
                interval: Duration::from_millis(interval_ms),
                realtime,
            };
            replay.run(&config).await?;
            println!("✓ Output: {}", out.display());
            Ok(())
        }
    }
}

fn score(
    keyword: String,
    titles: Vec<String>,
    descriptions: Vec<String>,
    related: Vec<String>,
) -> Result<()> {
    if descriptions.len() > titles.len() {
        return Err(miette::miette!(
            "{} descriptions given for {} titles",
            descriptions.len(),
            titles.len()
        ));
    }

    let candidates: Vec<ScoredCandidate> = titles
        .into_iter()
        .enumerate()
        .map(|(i, title)| {
            let description = descriptions.get(i).cloned().unwrap_or_default();
            ScoredCandidate::new(title, description, keyword.clone()).with_related(related.clone())
        })
        .collect();

    for (index, score) in rank_candidates(&candidates) {
        let candidate = &candidates[index];
        let breakdown = score_breakdown(candidate);
        println!("{score:>3}  {}  {}", breakdown.band().as_str(), candidate.title);
        for check in &breakdown.checks {
            println!("       {:<24} {:>2}/{}", check.kind.label(), check.earned, check.weight);
        }
    }
    Ok(())
}

struct Replay {
    file: PathBuf,
    store: JsonFileStore,
    target: EditingTarget,
    chunk: usize,
    interval: Duration,
    realtime: bool,
}

impl Replay {
    async fn run(&self, config: &EditorConfig) -> Result<()> {
        let text = tokio::fs::read_to_string(&self.file)
            .await
            .into_diagnostic()?;
        let mut session = EditorSession::new(
            self.target.clone(),
            MemoryView::new(),
            Draft::default(),
            config,
        );

        println!("→ Replaying {} into {}", self.file.display(), self.target);
        let events = chunked(&text, self.chunk).into_iter().map(Ok).collect();
        let mut stream = scripted(events);
        let mut accumulated = TextAccumulator::new();
        let mut now = Instant::now();

        while let Some(event) = stream.next().await {
            match event? {
                GenerationEvent::Delta(delta) => {
                    if self.realtime {
                        tokio::time::sleep(self.interval).await;
                    }
                    now += self.interval;
                    self.run_until(&mut session, now).await;
                    session.deliver(accumulated.push(&delta), now);
                }
                GenerationEvent::Progress { step, percent } => println!("  {step} {percent}%"),
                GenerationEvent::Done => break,
            }
        }

        // Let every debounce run out.
        while let Some(deadline) = session.next_deadline() {
            now = deadline;
            self.step(&mut session, now).await;
        }

        if session.close(now) {
            if let Some(Err(e)) = session.force_save(&self.store, now).await {
                return Err(e.into());
            }
        }

        let state = session.save_state();
        println!(
            "✓ {} words, {} deltas, seo {} ({})",
            session.word_count(),
            accumulated.deltas(),
            session.score().score,
            session.score().band().as_str()
        );
        if let Some(e) = state.last_error {
            return Err(e.into());
        }
        Ok(())
    }

    /// Fire every deadline up to and including `now`, in order.
    async fn run_until(&self, session: &mut EditorSession<MemoryView>, now: Instant) {
        while let Some(deadline) = session.next_deadline().filter(|d| *d <= now) {
            self.step(session, deadline).await;
        }
    }

    async fn step(&self, session: &mut EditorSession<MemoryView>, at: Instant) {
        for event in session.tick(at) {
            match event {
                SessionEvent::Render(RenderEvent::Committed(change)) => {
                    println!("  commit: {} words", change.word_count)
                }
                SessionEvent::Render(other) => tracing::trace!(?other, "render event"),
                SessionEvent::Rescored(breakdown) => {
                    tracing::debug!(score = breakdown.score, "seo rescored")
                }
            }
        }
        match session.save_due(&self.store, at).await {
            Some(Ok(saved)) => println!("  saved revision {}", saved.revision),
            Some(Err(e)) => println!("⚠ save failed: {e}"),
            None => {}
        }
    }
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
