use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use fitcheck_contracts::commands::{parse_command, ChatCommand, CHAT_HELP_COMMANDS};
use fitcheck_contracts::events::{now_utc_iso, EventWriter, SessionEvent};
use fitcheck_contracts::summary::{write_summary, OutfitSummary, SessionSummary};
use fitcheck_contracts::{OutfitResult, OutfitStatus, UploadedImage};
use fitcheck_engine::{
    compose_styleboard, save_outfit_image, EngineConfig, GenerationClient, SessionController,
    SessionSnapshot, StyleboardLayout,
};
use log::{info, warn};
use serde_json::{Map, Value};

#[derive(Debug, Parser)]
#[command(
    name = "fitcheck",
    version,
    about = "Body-shape analysis and outfit try-on from a single photo"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a photo, generate every outfit and write the results to disk.
    Run(RunArgs),
    /// Interactive slash-command session.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct EngineArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    analysis_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 1)]
    rounds: u64,
    #[arg(long)]
    no_styleboard: bool,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    engine: EngineArgs,
}

impl EngineArgs {
    fn config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::from_env()?;
        if let Some(model) = self.analysis_model.as_deref() {
            config = config.with_analysis_model(model);
        }
        if let Some(model) = self.image_model.as_deref() {
            config = config.with_image_model(model);
        }
        if let Some(width) = self.concurrency {
            config = config.with_max_concurrency(width);
        }
        Ok(config)
    }

    fn session(&self, out: &Path) -> Result<(SessionController, EventWriter)> {
        let config = self.config()?;
        info!(
            "models: analysis={} image={} concurrency={}",
            config.analysis_model, config.image_model, config.max_concurrency
        );
        let events_path = self
            .events
            .clone()
            .unwrap_or_else(|| out.join("events.jsonl"));
        let events = EventWriter::for_new_session(events_path);
        let session = SessionController::new(
            GenerationClient::from_config(&config),
            config.max_concurrency,
        )
        .with_events(events.clone());
        Ok((session, events))
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fitcheck error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    match cli.command {
        Command::Run(args) => runtime.block_on(run_pipeline(args)),
        Command::Chat(args) => {
            runtime.block_on(run_chat(args))?;
            Ok(0)
        }
    }
}

async fn run_pipeline(args: RunArgs) -> Result<i32> {
    let (session, events) = args.engine.session(&args.out)?;
    let started_at = now_utc_iso();
    let image = UploadedImage::from_path(&args.image)
        .with_context(|| format!("failed to load {}", args.image.display()))?;
    session.upload(image).await?;

    let rounds = args.rounds.max(1);
    let mut outfits = Vec::new();
    let mut generated = Vec::new();
    let mut analysis_error = None;
    let mut last_analysis = None;
    for round in 1..=rounds {
        println!("Round {round}/{rounds}: analyzing photo...");
        let snapshot = session.find_outfits().await?;
        if let Some(message) = snapshot.status_message.clone() {
            println!("{message}");
            analysis_error = Some(message);
            break;
        }
        print_results(&snapshot);

        for result in &snapshot.results {
            let position = outfits.len() + 1;
            let file = if result.is_done() {
                match save_outfit_image(result, position, &args.out) {
                    Ok(path) => Some(path.to_string_lossy().to_string()),
                    Err(err) => {
                        warn!("could not save '{}': {err:#}", result.name);
                        None
                    }
                }
            } else {
                None
            };
            outfits.push(OutfitSummary {
                name: result.name.clone(),
                status: result.status,
                file,
                error: result.error_message.clone(),
            });
            if result.is_done() {
                generated.push(result.clone());
            }
        }
        last_analysis = snapshot.analysis;
    }

    let styleboard = if args.no_styleboard || generated.is_empty() {
        None
    } else {
        let path = args.out.join("styleboard.png");
        match compose_styleboard(&generated, &path, &StyleboardLayout::default()) {
            Ok(board) => Some(board.path.to_string_lossy().to_string()),
            Err(err) => {
                warn!("styleboard skipped: {err:#}");
                None
            }
        }
    };

    let excluded = session.snapshot().await.history;
    let summary = SessionSummary {
        session_id: events.session_id().to_string(),
        started_at,
        finished_at: now_utc_iso(),
        rounds,
        body_shape: last_analysis.as_ref().map(|a| a.body_shape.clone()),
        reason: last_analysis.as_ref().map(|a| a.reason.clone()),
        analysis_error,
        outfits,
        excluded,
        styleboard,
    };
    let summary_path = args.out.join("summary.json");
    let mut extra = Map::new();
    extra.insert(
        "image".to_string(),
        Value::String(args.image.to_string_lossy().to_string()),
    );
    write_summary(&summary_path, &summary, Some(&extra))
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    println!(
        "Generated {} of {} outfit images. Summary: {}",
        summary.generated(),
        summary.outfits.len(),
        summary_path.display()
    );
    Ok(exit_code(summary.generated()))
}

fn exit_code(generated: usize) -> i32 {
    if generated > 0 {
        0
    } else {
        2
    }
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let (session, events) = args.engine.session(&args.out)?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Fitcheck chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        match command.action.as_str() {
            "noop" => {}
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "upload" => {
                let Some(path) = command.arg_str("path") else {
                    println!("/upload requires a path");
                    continue;
                };
                let uploaded = match UploadedImage::from_path(Path::new(path)) {
                    Ok(image) => session.upload(image).await.map_err(anyhow::Error::from),
                    Err(err) => Err(err.into()),
                };
                match uploaded {
                    Ok(()) => println!("Photo loaded. Type /find to get outfit ideas."),
                    Err(err) => println!("Upload failed: {err:#}"),
                }
            }
            "find_outfits" => {
                println!("Analyzing photo and generating outfits...");
                match session.find_outfits().await {
                    Ok(snapshot) => print_results(&snapshot),
                    Err(err) => println!("{err}"),
                }
            }
            "regenerate" => {
                let snapshot = session.snapshot().await;
                let Some((position, result)) = resolve_outfit(&snapshot, &command) else {
                    println!("No outfit matches '{}'", command.arg_str("outfit").unwrap_or(""));
                    continue;
                };
                println!("Regenerating {position}. {}...", result.name);
                match session.regenerate(&result.name).await {
                    Ok(updated) => print_result_line(position, &updated),
                    Err(err) => println!("{err}"),
                }
            }
            "download" => {
                let snapshot = session.snapshot().await;
                let Some((position, result)) = resolve_outfit(&snapshot, &command) else {
                    println!("No outfit matches '{}'", command.arg_str("outfit").unwrap_or(""));
                    continue;
                };
                match save_outfit_image(result, position, &args.out) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => println!("Download failed: {err:#}"),
                }
            }
            "download_all" => {
                let snapshot = session.snapshot().await;
                let mut saved = 0;
                for (idx, result) in snapshot.results.iter().enumerate() {
                    if !result.is_done() {
                        continue;
                    }
                    match save_outfit_image(result, idx + 1, &args.out) {
                        Ok(path) => {
                            saved += 1;
                            println!("Saved {}", path.display());
                        }
                        Err(err) => println!("Download failed: {err:#}"),
                    }
                }
                if saved == 0 {
                    println!("No generated images to download.");
                }
            }
            "styleboard" => {
                let path = command
                    .arg_str("path")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| args.out.join("styleboard.png"));
                let snapshot = session.snapshot().await;
                match compose_styleboard(&snapshot.results, &path, &StyleboardLayout::default()) {
                    Ok(board) => {
                        if let Err(err) = events.record(&SessionEvent::StyleboardSaved {
                            path: board.path.to_string_lossy().to_string(),
                            tiles: board.tiles,
                        }) {
                            warn!("failed to write styleboard_saved event: {err:#}");
                        }
                        println!(
                            "Styleboard with {} outfits saved to {}",
                            board.tiles,
                            board.path.display()
                        );
                    }
                    Err(err) => println!("Styleboard failed: {err:#}"),
                }
            }
            "status" => {
                let snapshot = session.snapshot().await;
                println!("Phase: {}", snapshot.phase);
                if !snapshot.history.is_empty() {
                    println!("Already suggested: {}", snapshot.history.len());
                }
                print_results(&snapshot);
            }
            "reset" => {
                session.reset().await;
                println!("Session reset. Upload a new photo with /upload.");
            }
            "quit" => break,
            _ => {
                let name = command.arg_str("command").unwrap_or("");
                if name.is_empty() {
                    println!("Commands start with '/'. Type /help for commands.");
                } else {
                    println!("Unknown command: /{name}. Type /help for commands.");
                }
            }
        }
    }

    Ok(())
}

/// Picks an outfit by 1-based position, then exact name, then
/// case-insensitive name.
fn resolve_outfit<'a>(
    snapshot: &'a SessionSnapshot,
    command: &ChatCommand,
) -> Option<(usize, &'a OutfitResult)> {
    if let Some(position) = command
        .command_args
        .get("position")
        .and_then(Value::as_u64)
        .map(|value| value as usize)
    {
        if position >= 1 {
            if let Some(result) = snapshot.results.get(position - 1) {
                return Some((position, result));
            }
        }
    }
    let target = command.arg_str("outfit")?;
    let indexed = || snapshot.results.iter().enumerate();
    indexed()
        .find(|(_, result)| result.name == target)
        .or_else(|| indexed().find(|(_, result)| result.name.eq_ignore_ascii_case(target)))
        .map(|(idx, result)| (idx + 1, result))
}

fn print_results(snapshot: &SessionSnapshot) {
    if let Some(message) = snapshot.status_message.as_deref() {
        println!("{message}");
    }
    if let Some(analysis) = snapshot.analysis.as_ref() {
        println!("Body shape: {}", analysis.body_shape);
        println!("{}", analysis.reason);
    }
    for (idx, result) in snapshot.results.iter().enumerate() {
        print_result_line(idx + 1, result);
    }
}

fn print_result_line(position: usize, result: &OutfitResult) {
    match result.status {
        OutfitStatus::Done => println!("  {position}. {} [done]", result.name),
        OutfitStatus::Pending => println!("  {position}. {} [pending]", result.name),
        OutfitStatus::Error => println!(
            "  {position}. {} [error: {}]",
            result.name,
            result.error_message.as_deref().unwrap_or("unknown error")
        ),
    }
}
