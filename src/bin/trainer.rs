use anyhow::Result;
use clap::Parser;
use feedrank::algorithms::sampler::NegativeSampler;
use feedrank::algorithms::Bpr;
use feedrank::models::{IdMap, ItemId, UserId};
use feedrank::services::comparison::SimilarityComparator;
use feedrank::services::ctr::read_ctr_ratios;
use feedrank::services::evaluation::{
    load_item_embeddings, read_user_scores, write_eval_records, Evaluator, ItemEmbeddings,
};
use feedrank::services::split::read_pairs;
use feedrank::utils::validation::{validate_batch_size, validate_rank};
use feedrank::{init_tracing, Config};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Trains a BPR model on a chronological split and scores it against the
/// held-out items, optionally correlating the results with the CTR
/// baseline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Training pairs file (`user item` per line).
    train: String,

    /// Held-out test pairs file (`user item` per line).
    test: String,

    /// Item-embedding table for the soft-MRR fallback.
    #[arg(short, long)]
    embeddings: Option<String>,

    /// CTR baseline file for the similarity comparison.
    #[arg(long)]
    ctr: Option<String>,

    /// Additional `user score` files from external evaluation methods,
    /// named by file stem in the comparison output.
    #[arg(short, long)]
    method_scores: Vec<String>,

    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting FeedRank trainer");

    let config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };

    let train_pairs = read_pairs(BufReader::new(File::open(&args.train)?))?;
    let test_pairs = read_pairs(BufReader::new(File::open(&args.test)?))?;
    info!(
        train_pairs = train_pairs.len(),
        test_pairs = test_pairs.len(),
        "loaded split"
    );

    // The model universe spans both files so held-out ids stay rankable;
    // users and items only seen in the test file keep their random factors.
    let mut user_map = IdMap::new();
    let mut item_map = IdMap::new();
    let train_data: Vec<(usize, usize)> = train_pairs
        .iter()
        .map(|&(user, item)| (user_map.get_or_insert(user), item_map.get_or_insert(item)))
        .collect();
    for &(user, item) in &test_pairs {
        user_map.get_or_insert(user);
        item_map.get_or_insert(item);
    }

    validate_rank(config.model.rank)?;
    validate_batch_size(config.training.batch_size, 1 << 20)?;

    let mut rng = match config.training.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut model = Bpr::with_rng(
        user_map.len(),
        item_map.len(),
        config.model.hyperparameters(),
        &mut rng,
    );
    let sampler = NegativeSampler::new(config.training.max_sampling_retries);
    model.train(
        &train_data,
        config.training.epochs,
        config.training.batch_size,
        &sampler,
        &mut rng,
    )?;
    info!("BPR training finished");

    let embeddings = match &args.embeddings {
        Some(path) => load_item_embeddings(BufReader::new(File::open(path)?))?,
        None => {
            warn!("no embedding table supplied, soft-MRR will be unavailable");
            ItemEmbeddings::new()
        }
    };

    let test_map: BTreeMap<UserId, ItemId> = test_pairs.iter().copied().collect();
    let evaluator = Evaluator::new(&model, &embeddings, config.evaluation.top_k);
    let evaluation = evaluator.evaluate(&test_map, &user_map, &item_map)?;

    for &(user, item) in &evaluation.missing_embeddings {
        warn!(user, item, "soft-MRR unavailable: missing embedding data");
    }

    fs::create_dir_all(&config.data.output_dir)?;
    let out_dir = Path::new(&config.data.output_dir);
    write_eval_records(
        BufWriter::new(File::create(out_dir.join("success_k.txt"))?),
        BufWriter::new(File::create(out_dir.join("mrr.txt"))?),
        BufWriter::new(File::create(out_dir.join("mrr_soft.txt"))?),
        &evaluation.records,
    )?;
    info!(
        hit_rate = evaluation.summary.hit_rate,
        mrr = evaluation.summary.mrr,
        soft_mrr = evaluation.summary.soft_mrr,
        "wrote evaluation result streams"
    );

    if let Some(ctr_path) = &args.ctr {
        let ctr = read_ctr_ratios(BufReader::new(File::open(ctr_path)?))?;

        let mut methods: BTreeMap<String, BTreeMap<UserId, f32>> = BTreeMap::new();
        methods.insert(
            "bpr_mrr".to_string(),
            evaluation
                .records
                .iter()
                .map(|record| (record.user, record.mrr))
                .collect(),
        );
        for path in &args.method_scores {
            let name = Path::new(path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            methods.insert(name, read_user_scores(BufReader::new(File::open(path)?))?);
        }

        let results = SimilarityComparator::new().compare(&ctr, &methods);
        let mut writer = BufWriter::new(File::create(out_dir.join("ctr_comparison.txt"))?);
        for (name, similarity) in &results {
            writeln!(
                writer,
                "{}\t{}\t{}",
                name, similarity.pearson, similarity.cosine
            )?;
        }
        info!(methods = results.len(), "wrote CTR comparison");
    }

    Ok(())
}
