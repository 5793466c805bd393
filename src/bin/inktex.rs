use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "inktex", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fingerprint of a TeX fragment and its options.
    Fingerprint(SourceArgs),
    /// Print the document the engine would be given for a fragment.
    Synthesize(SourceArgs),
    /// Inspect or populate a persistent render cache.
    Cache(CacheArgs),
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Fragment source file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Option as `key=value`, using dataset keys (e.g. `tikzLibraries=arrows`). Repeatable.
    #[arg(long = "option", value_parser = parse_option)]
    options: Vec<(String, String)>,
}

#[derive(Parser, Debug)]
struct CacheArgs {
    /// Cache root directory.
    #[arg(long)]
    dir: PathBuf,

    /// Store name under the cache root.
    #[arg(long, default_value = inktex::cache::STORE_NAME)]
    store: String,

    #[command(subcommand)]
    op: CacheOp,
}

#[derive(Subcommand, Debug)]
enum CacheOp {
    /// Print the stored markup for a fingerprint.
    Get { key: String },
    /// Store markup read from a file under a fingerprint.
    Put {
        key: String,
        #[arg(long = "in")]
        in_path: PathBuf,
    },
    /// Print whether a fingerprint is stored.
    Has { key: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Fingerprint(args) => cmd_fingerprint(args),
        Command::Synthesize(args) => cmd_synthesize(args),
        Command::Cache(args) => cmd_cache(args),
    }
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    let (k, v) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if k.is_empty() {
        return Err("option key must be non-empty".to_string());
    }
    Ok((k.to_string(), v.to_string()))
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read source '{}'", path.display()))
}

fn cmd_fingerprint(args: SourceArgs) -> anyhow::Result<()> {
    let source = read_source(&args.in_path)?;
    let dataset: inktex::Dataset = args.options.into_iter().collect();
    println!("{}", inktex::fingerprint(&source, &dataset));
    Ok(())
}

fn cmd_synthesize(args: SourceArgs) -> anyhow::Result<()> {
    let source = read_source(&args.in_path)?;
    let dataset: inktex::Dataset = args.options.into_iter().collect();
    let options = inktex::RenderOptions::from_dataset(&dataset);
    print!("{}", inktex::engine::synthesize_input(&source, &options));
    Ok(())
}

fn parse_key(raw: &str) -> anyhow::Result<inktex::Fingerprint> {
    inktex::Fingerprint::from_hex(raw)
        .with_context(|| format!("'{raw}' is not a 64-digit lowercase hex fingerprint"))
}

fn cmd_cache(args: CacheArgs) -> anyhow::Result<()> {
    let cache = inktex::DiskCache::open(&args.dir, &args.store)
        .with_context(|| format!("open cache '{}'", args.dir.display()))?;

    match args.op {
        CacheOp::Get { key } => {
            let key = parse_key(&key)?;
            let markup = cache
                .get_blocking(&key)?
                .with_context(|| format!("no entry for {key}"))?;
            print!("{markup}");
        }
        CacheOp::Put { key, in_path } => {
            let key = parse_key(&key)?;
            let markup = read_source(&in_path)?;
            cache.put_blocking(&key, &markup)?;
            eprintln!("stored {key}");
        }
        CacheOp::Has { key } => {
            let key = parse_key(&key)?;
            println!("{}", cache.get_blocking(&key)?.is_some());
        }
    }
    Ok(())
}
