//! YANG Path Index CLI
//!
//! Flatten compiled artifacts and query release indexes from the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use yang_paths::flatten::ArtifactFormat;
use yang_paths::source::{read_artifact, DirectoryCatalog, MarkerFile, PyangCompiler};
use yang_paths::{
    flatten, ArtifactDir, CompiledSchema, IndexStore, LastLoaded, PathsConfig, QueryEngine,
    ReleaseCatalog, SchemaSource, Variant,
};

#[derive(Parser)]
#[command(name = "yang-paths")]
#[command(about = "Flatten YANG models and look up node paths")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Compile with pyang instead of reading pre-compiled artifacts
    #[arg(long, global = true)]
    pyang: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a single compiled artifact and print its paths
    Flatten {
        file: PathBuf,
        /// yin, tree, outline or flat-paths (default: from extension)
        #[arg(short, long)]
        format: Option<String>,
        /// Print nodes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a path (exact, then closest match) and show an example command
    Lookup {
        #[arg(short, long)]
        release: Option<String>,
        /// Defaults to the variant named by the path's first segment
        #[arg(short, long)]
        variant: Option<String>,
        path: String,
    },

    /// Find paths with a segment containing the text
    Search {
        #[arg(short, long)]
        release: Option<String>,
        #[arg(short, long, default_value = "state")]
        variant: String,
        text: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Rank with fuzzy matching instead of substring filtering
        #[arg(long)]
        fuzzy: bool,
    },

    /// List discovered releases
    Releases,

    /// Build releases and print the store status as JSON
    Status {
        /// Only pre-warm the last loaded release instead of every release
        #[arg(long)]
        last_loaded: bool,
    },

    /// Print the effective configuration as TOML, or write it to a file
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PathsConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Flatten { file, format, json } => flatten_file(&file, format.as_deref(), json),
        Commands::Lookup {
            release,
            variant,
            path,
        } => {
            let store = open_store(&config, cli.pyang);
            let release = pick_release(&config, release)?;
            let variant = match variant {
                Some(v) => v.parse()?,
                None => variant_of(&path)?,
            };
            lookup(&config, &store, &release, variant, &path)
        }
        Commands::Search {
            release,
            variant,
            text,
            limit,
            fuzzy,
        } => {
            let store = open_store(&config, cli.pyang);
            let release = pick_release(&config, release)?;
            let index = store.get_or_build(&release, variant.parse()?)?;
            let engine = QueryEngine::new(&index);
            let limit = limit.unwrap_or(config.query.search_limit);

            if fuzzy {
                for hit in engine.fuzzy_search(&text, limit) {
                    println!("{:>5}  {}", hit.score, hit.node.path);
                }
            } else {
                let hits = engine.search(&text, limit);
                if hits.is_empty() {
                    println!("No results for '{}' in {} ({})", text, release, variant);
                }
                for node in hits {
                    println!("{}", node.path);
                }
            }
            Ok(())
        }
        Commands::Releases => {
            for release in DirectoryCatalog::new(&config.models.root).releases()? {
                println!("{}", release);
            }
            Ok(())
        }
        Commands::Status { last_loaded } => {
            let store = Arc::new(open_store(&config, cli.pyang));
            let handles = if last_loaded {
                store.prewarm_last_loaded()?
            } else {
                let releases = DirectoryCatalog::new(&config.models.root).releases()?;
                store.prewarm(&releases)?
            };
            for handle in handles {
                if let Err(e) = handle.join() {
                    tracing::warn!(error = %e, "build failed");
                }
            }
            println!("{}", serde_json::to_string_pretty(&store.list_status())?);
            Ok(())
        }
        Commands::Config { write } => {
            match write {
                Some(path) => {
                    config
                        .save(&path)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", config.to_toml()?),
            }
            Ok(())
        }
    }
}

fn open_store(config: &PathsConfig, use_pyang: bool) -> IndexStore {
    let source: Arc<dyn SchemaSource> = if use_pyang {
        Arc::new(
            PyangCompiler::new(&config.models.root)
                .with_binary(&config.models.pyang)
                .with_include_dirs(config.models.include_dirs.clone())
                .with_cache_dir(&config.models.artifacts),
        )
    } else {
        Arc::new(ArtifactDir::new(&config.models.artifacts))
    };
    IndexStore::new(source).with_last_loaded(Arc::new(MarkerFile::new(config.last_loaded_file())))
}

/// Explicit release, else the last loaded one, else the newest discovered
fn pick_release(config: &PathsConfig, release: Option<String>) -> anyhow::Result<String> {
    if let Some(release) = release {
        return Ok(release);
    }
    if config.store.default_to_last_loaded {
        if let Some(release) = MarkerFile::new(config.last_loaded_file()).load() {
            return Ok(release);
        }
    }
    DirectoryCatalog::new(&config.models.root)
        .releases()?
        .into_iter()
        .next()
        .context("no releases found; pass --release")
}

fn variant_of(path: &str) -> anyhow::Result<Variant> {
    let normalized = yang_paths::normalize_path(path);
    let first = normalized.split('/').find(|s| !s.is_empty()).unwrap_or_default();
    match Variant::from_root(first) {
        Some(v) => Ok(v),
        None => bail!("cannot infer variant from '{}'; pass --variant", path),
    }
}

fn lookup(
    config: &PathsConfig,
    store: &IndexStore,
    release: &str,
    variant: Variant,
    path: &str,
) -> anyhow::Result<()> {
    let index = store.get_or_build(release, variant)?;
    let engine = QueryEngine::new(&index);
    let found = engine.resolve(path)?;
    let node = found.node;

    if found.is_partial() {
        println!("No exact match for {}; closest node:", path);
    }
    println!("Path:        {}", node.path);
    println!("Kind:        {}", node.kind);
    if !node.base_type.is_empty() {
        println!("Type:        {}", node.base_type);
    }
    if !node.keys.is_empty() {
        println!("Keys:        {}", node.keys.join(" "));
    }
    if !node.description.is_empty() {
        println!("Description: {}", node.description);
    }
    println!("Example:     {}", config.synthesizer().synthesize(&index, node));
    Ok(())
}

fn flatten_file(file: &Path, format: Option<&str>, json: bool) -> anyhow::Result<()> {
    let schema: CompiledSchema = match format {
        Some(name) => {
            let format = ArtifactFormat::from_name(name)
                .with_context(|| format!("unknown format '{}'", name))?;
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            CompiledSchema::parse(format, text, &file.display().to_string())?
        }
        None => read_artifact(file)?,
    };

    let flattened = flatten(&schema, &file.display().to_string())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&flattened.nodes)?);
    } else {
        for path in flattened.paths() {
            println!("{}", path);
        }
    }

    for warning in &flattened.warnings {
        eprintln!("warning: {}", warning);
    }
    eprintln!("{} nodes, {} warnings", flattened.nodes.len(), flattened.warnings.len());
    Ok(())
}
