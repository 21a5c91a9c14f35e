//! Barkeep CLI
//!
//! Interactive terminal client for the Barkeep recommendation service:
//! drives one quiz conversation and renders the dialog as it unfolds.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use barkeep_client::HttpSessionClient;
use barkeep_core::{
    Arity, Config, Conversation, ConversationSnapshot, DialogEntry, RecommendationPayload, Toggle,
    CONFIG_FILE_NAME,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

/// Poll interval for rendering conversation changes (in milliseconds).
const POLL_INTERVAL_MS: u64 = 200;

/// Barkeep - Drink Recommendation Client
///
/// Walks through the bartender's quiz: answer each question and receive
/// a drink recommendation at the end.
#[derive(Parser, Debug)]
#[command(name = "barkeep")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: barkeep.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Base URL of the recommendation service API
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Shared access token sent with every request
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Directory to save recommendation images into
    #[arg(long, value_name = "DIR")]
    images_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn, so
    // the interactive output stays readable)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run_client(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Tracks what the renderer has already written to the terminal.
#[derive(Debug, Default)]
struct RenderState {
    printed: usize,
    prompt_shown: bool,
    summary_shown: bool,
}

#[allow(clippy::too_many_lines)]
async fn run_client(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(token) = args.token {
        config.access_token = token;
    }
    config.validate()?;

    tracing::debug!(base_url = %config.base_url, "Configuration loaded");

    let client = Arc::new(HttpSessionClient::new(&config).map_err(|e| anyhow::anyhow!("{e}"))?);
    let conversation = Conversation::new(Arc::clone(&client), config.pacing.clone());

    println!("Welcome to Barkeep.");
    println!("Type the number of an answer to pick it, then 'submit'.");
    println!("Other commands: 'reset', 'start', 'quit'.");

    conversation.start().await;

    let mut render = RenderState::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let poll_interval = Duration::from_millis(POLL_INTERVAL_MS);

    loop {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(input) => {
                        if handle_command(&conversation, input.trim(), &mut render).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            () = sleep(poll_interval) => {
                render_changes(&conversation, &client, args.images_dir.as_deref(), &mut render)
                    .await;
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

/// Applies one line of user input. Returns `true` to quit.
async fn handle_command(
    conversation: &Conversation<Arc<HttpSessionClient>>,
    input: &str,
    render: &mut RenderState,
) -> bool {
    match input {
        "" => false,
        "q" | "quit" | "exit" => true,
        "s" | "start" => {
            conversation.start().await;
            false
        }
        "r" | "reset" => {
            conversation.reset().await;
            println!();
            println!("Conversation reset. Type 'start' to begin again.");
            false
        }
        "submit" | "done" => {
            if !conversation.submit().await {
                explain_rejected_submit(&conversation.snapshot().await);
            }
            false
        }
        other => {
            toggle_input(conversation, other, render).await;
            false
        }
    }
}

/// Toggles an answer given either its number or its exact label.
async fn toggle_input(
    conversation: &Conversation<Arc<HttpSessionClient>>,
    input: &str,
    render: &mut RenderState,
) {
    let snapshot = conversation.snapshot().await;
    let Some(question) = snapshot.question.as_ref() else {
        println!("There is no question to answer right now.");
        return;
    };

    let label = match input.parse::<usize>() {
        Ok(n) if n >= 1 && n <= question.answers.len() => question.answers[n - 1].clone(),
        Ok(_) => {
            println!("Pick a number between 1 and {}.", question.answers.len());
            return;
        }
        Err(_) => input.to_string(),
    };

    match conversation.toggle(&label).await {
        Toggle::Applied => {
            let snapshot = conversation.snapshot().await;
            // Redraw the options so the markers stay current.
            render.prompt_shown = false;
            if snapshot.selection.is_empty() {
                println!("Selection cleared.");
            } else {
                println!("Selected: {}", snapshot.selection.join(", "));
            }
        }
        Toggle::Rejected => explain_rejected_toggle(&snapshot, &label),
    }
}

fn explain_rejected_toggle(snapshot: &ConversationSnapshot, label: &str) {
    if !snapshot.can_answer {
        println!("Hold on, the bartender is still talking.");
        return;
    }
    match snapshot.question.as_ref() {
        Some(question) if !question.offers(label) => {
            println!("'{label}' is not one of the options.");
        }
        Some(question) => match question.arity {
            Arity::Single => println!("Deselect your current pick first."),
            Arity::Multiple => println!("You can pick at most three; deselect one first."),
        },
        None => println!("There is no question to answer right now."),
    }
}

fn explain_rejected_submit(snapshot: &ConversationSnapshot) {
    if !snapshot.can_answer {
        println!("Hold on, the bartender is still talking.");
        return;
    }
    match snapshot.question.as_ref().map(|q| q.arity) {
        Some(Arity::Single) => println!("Pick exactly one option before submitting."),
        Some(Arity::Multiple) => println!("Pick exactly three options before submitting."),
        None => println!("There is nothing to submit right now."),
    }
}

/// Prints everything that changed since the last poll: new dialog
/// entries, the answer prompt once toggling opens, and the summary.
async fn render_changes(
    conversation: &Conversation<Arc<HttpSessionClient>>,
    client: &HttpSessionClient,
    images_dir: Option<&str>,
    render: &mut RenderState,
) {
    let snapshot = conversation.snapshot().await;

    // A shrinking ledger means a reset happened.
    if snapshot.entries.len() < render.printed {
        *render = RenderState::default();
    }

    for entry in &snapshot.entries[render.printed..] {
        print_entry(entry);
        if matches!(entry, DialogEntry::Question { .. }) {
            render.prompt_shown = false;
        }
    }
    render.printed = snapshot.entries.len();

    if snapshot.can_answer && !render.prompt_shown {
        if let Some(question) = snapshot.question.as_ref() {
            print_prompt(question, &snapshot);
            render.prompt_shown = true;
        }
    }

    if snapshot.show_summary && !render.summary_shown {
        render.summary_shown = true;
        println!();
        println!("=== That's my recommendation. Cheers! ===");
        println!("Type 'reset' to start over or 'quit' to leave.");
        if let Some(dir) = images_dir {
            save_recommendation_images(client, &snapshot, dir).await;
        }
    }
}

fn print_entry(entry: &DialogEntry) {
    match entry {
        DialogEntry::Question { text } => {
            println!();
            println!("Barkeep asks: {text}");
        }
        DialogEntry::Answer { text } => println!("You: {text}"),
        DialogEntry::Response { text } => println!("Barkeep: {text}"),
        DialogEntry::Recommendation { source, payload } => {
            println!();
            println!("Recommended ({source}): {}", payload.style_name);
            if !payload.description.is_empty() {
                println!("  {}", payload.description);
            }
            let flavors: Vec<&str> = payload.flavors().collect();
            if !flavors.is_empty() {
                println!("  Flavors: {}", flavors.join(", "));
            }
            println!("  Alcohol: {}%", payload.alcohol_content);
        }
    }
}

fn print_prompt(question: &barkeep_core::Question, snapshot: &ConversationSnapshot) {
    for (i, label) in question.answers.iter().enumerate() {
        let marker = if snapshot.selection.iter().any(|l| l == label) {
            "[x]"
        } else {
            "[ ]"
        };
        println!("  {} {} {label}", i + 1, marker);
    }
    match question.arity {
        Arity::Single => println!("Pick one, then type 'submit'."),
        Arity::Multiple => println!("Pick three, then type 'submit'."),
    }
}

/// Downloads the images referenced by the recommendations into `dir`.
/// Best effort: a failed download is logged and skipped.
async fn save_recommendation_images(
    client: &HttpSessionClient,
    snapshot: &ConversationSnapshot,
    dir: &str,
) {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!(error = %e, dir, "Could not create images directory");
        return;
    }

    for entry in &snapshot.entries {
        let DialogEntry::Recommendation { payload, .. } = entry else {
            continue;
        };
        for name in image_names(payload) {
            match client.fetch_image(name).await {
                Ok(bytes) => {
                    let path = Path::new(dir).join(name);
                    match tokio::fs::write(&path, bytes).await {
                        Ok(()) => println!("Saved image: {}", path.display()),
                        Err(e) => {
                            tracing::warn!(error = %e, name, "Could not write image");
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, name, "Could not fetch image"),
            }
        }
    }
}

fn image_names(payload: &RecommendationPayload) -> impl Iterator<Item = &str> {
    payload
        .image_name
        .as_deref()
        .into_iter()
        .chain(payload.image_icon.as_deref())
}

/// Loads configuration from the specified path or the default
/// location; falls back to defaults when no file exists.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => {
            let default = Path::new(CONFIG_FILE_NAME);
            if default.exists() {
                Config::load_from_file(default).map_err(|e| anyhow::anyhow!("{e}"))
            } else {
                Ok(Config::default())
            }
        }
    }
}
