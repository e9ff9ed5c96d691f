use anyhow::Result;
use clap::Parser;
use feedrank::services::ctr::{self, CtrComputer};
use feedrank::services::split::{self, DatasetSplitter};
use feedrank::store::{self, IndexCache, JsonIndexCache, NoCache};
use feedrank::{init_tracing, Config};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Indexes a raw event log, computes the per-user CTR baseline and writes
/// the leakage-aware chronological train/test split.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event log file: one header line, then
    /// `user item interaction_type timestamp` rows.
    events: String,

    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting FeedRank indexing pipeline");

    let config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    let reader = BufReader::new(File::open(&args.events)?);
    let cache: Box<dyn IndexCache> = match &config.data.index_cache {
        Some(path) => Box::new(JsonIndexCache::new(path)),
        None => Box::new(NoCache),
    };
    let store = store::load_or_parse(reader, cache.as_ref())?;

    info!(
        users = store.user_count(),
        events = store.event_count(),
        "interaction store ready"
    );

    fs::create_dir_all(&config.data.output_dir)?;
    let out_dir = Path::new(&config.data.output_dir);

    let ctr_results = CtrComputer::new(config.positive_feedback_set()).compute(&store);
    let ctr_path = out_dir.join("user_ctr.txt");
    ctr::write_ctr(BufWriter::new(File::create(&ctr_path)?), &ctr_results)?;
    info!(path = %ctr_path.display(), "wrote CTR baseline");

    let split_result = DatasetSplitter::new().split(&store);
    let train_path = out_dir.join("train_pairs.txt");
    let test_path = out_dir.join("test_pairs.txt");
    split::write_pairs(
        BufWriter::new(File::create(&train_path)?),
        split_result.train.iter().copied(),
    )?;
    split::write_pairs(
        BufWriter::new(File::create(&test_path)?),
        split_result.test.iter().map(|(&user, &item)| (user, item)),
    )?;

    info!(
        train_pairs = split_result.train_len(),
        test_users = split_result.test_len(),
        train = %train_path.display(),
        test = %test_path.display(),
        "wrote chronological split"
    );

    Ok(())
}
