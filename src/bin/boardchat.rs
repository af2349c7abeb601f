use boardchat::config::ChatConfig;
use boardchat::secret_store::SecretStore;
use boardchat::session::ChatSession;
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spinners::{Spinner, Spinners};
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

/// Command line arguments for the board chat CLI
#[derive(Parser)]
#[clap(
    name = "boardchat",
    about = "Ask questions about your project boards",
    allow_hyphen_values = true
)]
struct CliArgs {
    /// Command to execute (chat, ask, set, get, delete)
    #[arg(index = 1)]
    command: Option<String>,

    /// Question for `ask`, or secret key for set/get/delete
    #[arg(index = 2)]
    key_or_question: Option<String>,

    /// Secret value for `set`
    #[arg(index = 3)]
    value: Option<String>,

    /// Config file (defaults to ~/.boardchat/config.json)
    #[arg(long, env = "BOARDCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// LLM backend (huggingface, hf-inference, groq, openai)
    #[arg(long)]
    backend: Option<String>,

    /// Model name to use
    #[arg(long)]
    model: Option<String>,

    /// Base URL for the model API
    #[arg(long)]
    base_url: Option<String>,

    /// Temperature setting (0.0-1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Render answers as they are generated
    #[arg(long)]
    stream: bool,

    /// Number of earlier messages replayed per question
    #[arg(long)]
    history_window: Option<usize>,

    /// Fetch fresh board data for every question
    #[arg(long)]
    no_cache: bool,
}

impl CliArgs {
    fn config(&self) -> Result<ChatConfig, Box<dyn std::error::Error>> {
        let mut config = match self.config.clone().or_else(ChatConfig::default_path) {
            Some(path) => ChatConfig::load_or_default(&path)?,
            None => ChatConfig::default(),
        };
        if let Some(backend) = &self.backend {
            config.backend = backend.clone();
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(url) = &self.base_url {
            config.base_url = Some(url.clone());
        }
        if let Some(temp) = self.temperature {
            config.temperature = temp;
        }
        if let Some(mt) = self.max_tokens {
            config.max_tokens = mt;
        }
        if let Some(window) = self.history_window {
            config.history_window = window;
        }
        if self.stream {
            config.stream = true;
        }
        if self.no_cache {
            config.cache_ttl_seconds = 0;
        }
        Ok(config)
    }
}

fn separator() {
    println!("{}", "─".repeat(50).bright_black());
}

/// Asks one question and prints the answer, progressively when streaming.
async fn ask_and_print(session: &mut ChatSession, question: &str) {
    let mut spinner = (!session.is_streaming()).then(|| {
        Spinner::new(
            Spinners::Dots12,
            "Fetching boards and thinking...".bright_magenta().to_string(),
        )
    });
    if spinner.is_none() {
        print!("{} ", "> Assistant:".bright_green());
        let _ = io::stdout().flush();
    }
    session
        .answer(question, |text| {
            if let Some(mut sp) = spinner.take() {
                sp.stop();
                print!("\r\x1B[K{} ", "> Assistant:".bright_green());
            }
            print!("{text}");
            let _ = io::stdout().flush();
        })
        .await;
    println!();
}

async fn print_history(session: &ChatSession) {
    let history = session.history().await;
    if history.is_empty() {
        println!("{}", "(no messages yet)".bright_black());
        return;
    }
    for msg in history {
        println!("{} {}", format!("[{}]", msg.role).bright_blue(), msg.content);
    }
}

/// Main entry point for the board chat CLI
///
/// Manages secrets, answers one-shot questions, or runs an interactive chat.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boardchat::init_logging();
    let args = CliArgs::parse();

    if let Some(cmd) = args.command.as_deref() {
        match cmd {
            "set" => {
                if let (Some(key), Some(value)) =
                    (args.key_or_question.as_deref(), args.value.as_deref())
                {
                    let mut store = SecretStore::new()?;
                    store.set(key, value)?;
                    println!("{} Secret '{}' has been set.", "✓".bright_green(), key);
                    return Ok(());
                }
                eprintln!("{} Usage: boardchat set <key> <value>", "Error:".bright_red());
                return Ok(());
            }
            "get" => {
                if let Some(key) = args.key_or_question.as_deref() {
                    let store = SecretStore::new()?;
                    match store.get(key) {
                        Some(value) => println!("{}: {}", key, value),
                        None => println!("{} Secret '{}' not found", "!".bright_yellow(), key),
                    }
                    return Ok(());
                }
                eprintln!("{} Usage: boardchat get <key>", "Error:".bright_red());
                return Ok(());
            }
            "delete" => {
                if let Some(key) = args.key_or_question.as_deref() {
                    let mut store = SecretStore::new()?;
                    store.delete(key)?;
                    println!("{} Secret '{}' has been deleted.", "✓".bright_green(), key);
                    return Ok(());
                }
                eprintln!("{} Usage: boardchat delete <key>", "Error:".bright_red());
                return Ok(());
            }
            "chat" | "ask" => {}
            other => {
                eprintln!("{} Unknown command '{}'", "Error:".bright_red(), other);
                return Ok(());
            }
        }
    }

    let config = args.config()?;
    let secrets = SecretStore::new()?;
    let mut session = config
        .session(&secrets)
        .map_err(|e| format!("Failed to start session: {e}"))?;

    let is_pipe = !io::stdin().is_terminal();
    if is_pipe || args.command.as_deref() == Some("ask") {
        let question = match args.key_or_question.clone() {
            Some(q) => q,
            None => {
                let mut input = String::new();
                io::stdin().read_to_string(&mut input)?;
                input.trim().to_string()
            }
        };
        if question.is_empty() {
            eprintln!("{} Usage: boardchat ask <question>", "Error:".bright_red());
            return Ok(());
        }
        ask_and_print(&mut session, &question).await;
        return Ok(());
    }

    println!("{}", "boardchat - Ask your boards".bright_cyan());
    println!("Backend: {}", config.backend.bright_green());
    println!(
        "{}",
        "Commands: /history, /clear. Type 'exit' to quit".bright_black()
    );
    separator();

    let mut rl = DefaultEditor::new()?;

    loop {
        io::stdout().flush()?;
        let readline = rl.readline("> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.eq_ignore_ascii_case("exit") {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                let _ = rl.add_history_entry(trimmed);

                match trimmed {
                    "/history" => print_history(&session).await,
                    "/clear" => {
                        session.clear_history().await;
                        println!("{}", "History cleared.".bright_yellow());
                    }
                    question => ask_and_print(&mut session, question).await,
                }
                separator();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\n{}", "Goodbye!".bright_cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".bright_red(), err);
                break;
            }
        }
    }

    Ok(())
}
