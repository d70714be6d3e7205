//! CLI entry point for Lantern.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use lantern_core::{
    app_data_dir, ingest_path, load_config, load_config_from, scan_sources, set_sources_root,
    set_sources_root_in, status, Answer, Assistant, ChatCompletionsClient, Config,
    ContextBudgeter, EngineConfig, HfTokenizer, OllamaClient, ResponseGenerator, SearchEngine,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lantern")]
#[command(about = "Lantern: answer questions from your own documents")]
struct Cli {
    /// Config file (default: config.toml in the app data directory).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Storage path of the vector store (overrides config).
    #[arg(long, global = true, value_name = "PATH")]
    storage: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status and store size.
    Status,
    /// Show where Lantern stores its config and vector store.
    DataDir,
    /// Print the effective configuration.
    Config,
    /// Remember a default directory for `ingest`.
    SetRoot {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// List the text documents under a directory.
    Scan {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Chunk, embed and store documents from a file or directory.
    Ingest {
        /// File or directory (default: the configured sources root).
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Store texts as-is, one record per argument.
    Add {
        #[arg(value_name = "TEXT", required = true)]
        texts: Vec<String>,
    },
    /// Show the stored passages closest to a query.
    Search {
        query: String,
        /// Number of results.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Dump every stored record.
    ViewIndex {
        #[arg(long)]
        json: bool,
    },
    /// Answer one question from the stored documents.
    Ask {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Interactive question loop on stdin.
    Chat,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("LANTERN_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn resolve_config(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    if let Some(storage) = &cli.storage {
        config.storage_path = Some(storage.to_string_lossy().into_owned());
    }
    config
}

fn open_engine(config: &Config) -> anyhow::Result<SearchEngine<OllamaClient>> {
    let storage_path = config
        .storage_path()
        .context("could not determine a storage path; pass --storage")?;
    let embedder = OllamaClient::from_url(&config.ollama_url)?.with_embed_model(&config.embed_model);
    let engine = SearchEngine::open(
        embedder,
        EngineConfig {
            storage_path,
            dim: config.dim,
        },
    )?;
    Ok(engine)
}

fn build_budgeter(config: &Config) -> ContextBudgeter {
    let budgeter = ContextBudgeter::new(config.context_budget).with_top_n(config.context_top_n);
    let Some(path) = config.tokenizer_path() else {
        return budgeter;
    };
    match HfTokenizer::from_file(&path) {
        Ok(tokenizer) => budgeter.with_tokenizer(tokenizer),
        Err(e) => {
            tracing::warn!(error = %e, "tokenizer unavailable, using character-based budget");
            budgeter
        }
    }
}

fn build_assistant(config: &Config) -> anyhow::Result<Assistant<OllamaClient, ChatCompletionsClient>> {
    let engine = open_engine(config)?;
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client = ChatCompletionsClient::new(&config.llm_base_url, config.api_key(), timeout)?;
    let generator = ResponseGenerator::new(client, &config.llm_model)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_timeout(timeout);
    Ok(Assistant::new(
        engine,
        build_budgeter(config),
        generator,
        config.search_top_k,
    ))
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, s) in answer.sources.iter().enumerate() {
            println!("  {}. ({:.4}) {}", i + 1, s.score, preview(&s.text, 80));
        }
    }
}

fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

async fn chat(assistant: &Assistant<OllamaClient, ChatCompletionsClient>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }
        let answer = assistant.ask(query).await?;
        print_answer(&answer);
        println!();
    }
    Ok(())
}

fn ingest_root(path: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    if let Some(p) = path {
        return Ok(p);
    }
    match config.sources_root.as_deref().filter(|s| !s.is_empty()) {
        Some(root) => Ok(PathBuf::from(root)),
        None => bail!("no path given and no sources root configured (see `lantern set-root`)"),
    }
}

/// Store the sources root in `--config` when given, else in the app data config.
fn set_root(path: &Path, config_file: Option<&Path>) -> anyhow::Result<()> {
    match config_file {
        Some(file) => set_sources_root_in(path, file)?,
        None => set_sources_root(path)?,
    }
    Ok(())
}

fn scan(path: &Path) -> anyhow::Result<()> {
    let docs = scan_sources(path)?;
    println!("Scanned {} document(s) under {}", docs.len(), path.display());
    for d in docs {
        println!("  {}  {}", d.path.display(), preview(&d.body, 60));
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("Lantern backend");
            println!("  core: {}", status());
            let engine = open_engine(&config)?;
            println!("  store: {}", engine.storage_paths().metadata.display());
            println!("  records: {}", engine.len());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => bail!("could not determine app data directory"),
        },
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::SetRoot { path } => {
            set_root(&path, cli.config.as_deref())?;
            println!("Sources root set to {}", path.display());
        }
        Commands::Scan { path } => scan(&path)?,
        Commands::Ingest { path } => {
            let root = ingest_root(path, &config)?;
            let engine = open_engine(&config)?;
            let report = ingest_path(&engine, &root, config.chunk_max_chars).await?;
            println!(
                "Stored {} chunk(s) from {} document(s); {} record(s) total",
                report.chunks,
                report.documents,
                engine.len()
            );
        }
        Commands::Add { texts } => {
            let engine = open_engine(&config)?;
            engine.add_data(&texts).await?;
            println!("Stored {} record(s); {} total", texts.len(), engine.len());
        }
        Commands::Search { query, top_k } => {
            let engine = open_engine(&config)?;
            let results = engine
                .search(&query, top_k.unwrap_or(config.search_top_k))
                .await?;
            if results.is_empty() {
                println!("No matching results found.");
            }
            for r in results {
                println!("- {} (score: {:.4})", r.text, r.score);
            }
        }
        Commands::ViewIndex { json } => {
            let engine = open_engine(&config)?;
            let entries = engine.view_index();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for e in entries {
                    println!("{:>6}  {}", e.index, preview(&e.text, 100));
                }
            }
        }
        Commands::Ask { query, json } => {
            let assistant = build_assistant(&config)?;
            let answer = assistant.ask(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Commands::Chat => {
            let assistant = build_assistant(&config)?;
            chat(&assistant).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
