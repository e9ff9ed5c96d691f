use anyhow::Result;
use feedrank::algorithms::sampler::NegativeSampler;
use feedrank::algorithms::{Bpr, BprHyperparameters};
use feedrank::models::{IdMap, UserId};
use feedrank::services::comparison::SimilarityComparator;
use feedrank::services::ctr::CtrComputer;
use feedrank::services::evaluation::{Evaluator, ItemEmbeddings};
use feedrank::services::split::DatasetSplitter;
use feedrank::store::InteractionStore;
use feedrank::{init_tracing, Config};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::io::Cursor;

fn main() -> Result<()> {
    init_tracing();

    println!("FeedRank basic usage walkthrough");

    // 1. A tiny event log: header line, then
    //    `user item interaction_type timestamp` rows.
    let log = "user item interaction timestamp\n\
               1 10 0 100\n\
               1 10 1 101\n\
               1 20 0 200\n\
               1 30 2 300\n\
               2 10 0 100\n\
               2 20 1 150\n\
               2 40 0 180\n\
               3 10 0 100\n";

    let store = InteractionStore::parse(Cursor::new(log))?;
    println!(
        "Indexed {} events from {} users",
        store.event_count(),
        store.user_count()
    );

    // 2. CTR baseline per user.
    let config = Config::default();
    let ctr_results = CtrComputer::new(config.positive_feedback_set()).compute(&store);
    for (user, score) in &ctr_results {
        println!(
            "  CTR({}) = {:.3} ({} of {} impressed items engaged)",
            user,
            score.ratio,
            score.numerator_items.len(),
            score.denominator_items.len()
        );
    }

    // 3. Chronological train/test split.
    let split = DatasetSplitter::new().split(&store);
    println!(
        "Split: {} training pairs, {} held-out users",
        split.train_len(),
        split.test_len()
    );

    // 4. Map raw ids onto dense indices and train the BPR model.
    let mut user_map = IdMap::new();
    let mut item_map = IdMap::new();
    let train_data: Vec<(usize, usize)> = split
        .train
        .iter()
        .map(|&(user, item)| (user_map.get_or_insert(user), item_map.get_or_insert(item)))
        .collect();
    for (&user, &item) in &split.test {
        user_map.get_or_insert(user);
        item_map.get_or_insert(item);
    }

    let mut rng = StdRng::seed_from_u64(42);
    let mut model = Bpr::with_rng(
        user_map.len(),
        item_map.len(),
        BprHyperparameters::default(),
        &mut rng,
    );
    model.train(&train_data, 50, 2, &NegativeSampler::new(10_000), &mut rng)?;
    println!("Trained BPR model (rank {})", model.hyperparameters().rank);

    // 5. Evaluate against the held-out items, with a small embedding table
    //    backing the soft-MRR fallback.
    let mut embeddings = ItemEmbeddings::new();
    embeddings.insert(10, DVector::from_vec(vec![1.0, 0.0]));
    embeddings.insert(20, DVector::from_vec(vec![0.9, 0.1]));
    embeddings.insert(30, DVector::from_vec(vec![0.0, 1.0]));
    embeddings.insert(40, DVector::from_vec(vec![0.2, 0.8]));

    let evaluator = Evaluator::new(&model, &embeddings, 10);
    let evaluation = evaluator.evaluate(&split.test, &user_map, &item_map)?;
    for record in &evaluation.records {
        println!(
            "  user {}: hit={} mrr={:.3} soft_mrr={}",
            record.user,
            record.hit,
            record.mrr,
            record
                .soft_mrr
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    println!(
        "Aggregate: hit-rate {:.3}, MRR {:.3}, soft-MRR {:.3}",
        evaluation.summary.hit_rate, evaluation.summary.mrr, evaluation.summary.soft_mrr
    );

    // 6. Correlate the model's per-user MRR with the CTR baseline.
    let ctr: BTreeMap<UserId, f32> = ctr_results
        .iter()
        .map(|(&user, score)| (user, score.ratio))
        .collect();
    let methods = BTreeMap::from([(
        "bpr_mrr".to_string(),
        evaluation
            .records
            .iter()
            .map(|record| (record.user, record.mrr))
            .collect::<BTreeMap<UserId, f32>>(),
    )]);

    for (name, similarity) in SimilarityComparator::new().compare(&ctr, &methods) {
        println!(
            "  {} vs CTR: pearson={:.3} cosine={:.3}",
            name, similarity.pearson, similarity.cosine
        );
    }

    Ok(())
}
