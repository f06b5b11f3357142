use hybridrag::cli::{Cli, Commands, ConfigAction};
use hybridrag::config::Config;
use hybridrag::corpus::Corpus;
use hybridrag::embedding::build_embedder;
use hybridrag::error::{RagError, Result};
use hybridrag::expansion::QueryExpander;
use hybridrag::retrieval::{HybridRetriever, IndexSet, Retriever};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| RagError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    match cli.command {
        Commands::BuildIndex { corpus, output } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_build_index(&config, corpus, output)?;
        }
        Commands::Retrieve {
            question,
            top_k,
            no_expansion,
            context,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            runtime.block_on(cmd_retrieve(&config, &question, top_k, no_expansion, context))?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "hybridrag=debug"
    } else {
        "hybridrag=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries command output only
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_build_index(
    config: &Config,
    corpus_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let corpus_path = expand_path(&corpus_path.unwrap_or_else(|| config.corpus.path.clone()))?;
    let output = expand_path(&output.unwrap_or_else(|| config.index.vector_path.clone()))?;

    // Corpus validation happens before any embedding work
    let corpus = Arc::new(Corpus::load(&corpus_path)?);
    let embedder = build_embedder(&config.embedding)?;

    let indexes = IndexSet::build(corpus.clone(), embedder, config.embedding.batch_size)?;
    indexes.save_vector_index(&output)?;

    println!("✓ Vector index built");
    println!("  Chunks: {}", corpus.len());
    println!("  Model:  {}", indexes.vector().model_name());
    println!("  Output: {}", output.display());

    Ok(())
}

async fn cmd_retrieve(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    no_expansion: bool,
    context: bool,
) -> Result<()> {
    let corpus_path = expand_path(&config.corpus.path)?;
    let vector_path = expand_path(&config.index.vector_path)?;

    let corpus = Arc::new(Corpus::load(&corpus_path)?);
    let embedder = build_embedder(&config.embedding)?;
    let indexes = IndexSet::load(corpus, embedder.clone(), &vector_path)?;

    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let expander = if no_expansion {
        QueryExpander::disabled()
    } else {
        QueryExpander::from_config(&config.expansion)
    };

    let retriever = Retriever::with_indexes(
        HybridRetriever::new(expander, top_k),
        embedder,
        config.embedding.batch_size,
        indexes,
    );

    let response = retriever.retrieve(question).await?;

    if context {
        println!("{}", response.context());
    } else {
        let json = serde_json::to_string_pretty(&response).map_err(|e| RagError::Json {
            source: e,
            context: "Failed to serialize retrieval response".to_string(),
        })?;
        println!("{}", json);
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    Config::load_or_default(&path, profile.as_deref())
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RagError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
