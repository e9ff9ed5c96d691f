use crate::algorithms::Bpr;
use crate::error::{PipelineError, Result};
use crate::models::{EvalRecord, IdMap, ItemId, UserId};
use crate::utils::metrics::{RankingMetrics, RankingSummary};
use crate::utils::validation::{validate_embedding_dimension, validate_finite};
use nalgebra::DVector;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

/// External per-item feature vectors, required only for the soft-MRR
/// fallback.
pub type ItemEmbeddings = HashMap<ItemId, DVector<f32>>;

/// Loads a tabular embedding file: one header line, then
/// `item_id v1 v2 ... vd` rows. All rows must share the same dimension.
pub fn load_item_embeddings<R: BufRead>(reader: R) -> Result<ItemEmbeddings> {
    let mut embeddings = ItemEmbeddings::new();
    let mut dimension: Option<usize> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line_no == 1 || line.trim().is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let item: ItemId = tokens
            .next()
            .ok_or_else(|| PipelineError::Parse {
                line: line_no,
                reason: "empty embedding row".to_string(),
            })?
            .parse()
            .map_err(|e| PipelineError::Parse {
                line: line_no,
                reason: format!("invalid item id: {}", e),
            })?;

        let values = tokens
            .map(|token| {
                token.parse::<f32>().map_err(|e| PipelineError::Parse {
                    line: line_no,
                    reason: format!("invalid embedding value: {}", e),
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        if values.is_empty() {
            return Err(PipelineError::Parse {
                line: line_no,
                reason: "embedding row has no values".to_string(),
            });
        }
        // Textual floats can still spell NaN or inf.
        validate_finite(&values, "embedding").map_err(|e| PipelineError::Parse {
            line: line_no,
            reason: e.to_string(),
        })?;
        match dimension {
            None => dimension = Some(values.len()),
            Some(expected) => {
                validate_embedding_dimension(&values, expected).map_err(|e| {
                    PipelineError::Parse {
                        line: line_no,
                        reason: e.to_string(),
                    }
                })?;
            }
        }

        embeddings.insert(item, DVector::from_vec(values));
    }

    info!(items = embeddings.len(), "loaded item embeddings");
    Ok(embeddings)
}

fn cosine(a: &DVector<f32>, b: &DVector<f32>) -> f32 {
    let norm_a = a.norm();
    let norm_b = b.norm();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        a.dot(b) / (norm_a * norm_b)
    }
}

/// Full evaluation output: per-user records, the users whose soft score was
/// unavailable for lack of embedding data, and the aggregate summary.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub records: Vec<EvalRecord>,
    pub missing_embeddings: Vec<(UserId, ItemId)>,
    pub summary: RankingSummary,
}

/// Scores a trained model against held-out test items.
pub struct Evaluator<'a> {
    model: &'a Bpr,
    embeddings: &'a ItemEmbeddings,
    metrics: RankingMetrics,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a Bpr, embeddings: &'a ItemEmbeddings, k: usize) -> Self {
        Self {
            model,
            embeddings,
            metrics: RankingMetrics::new(k),
        }
    }

    /// Evaluates every test user that also appears in the training users.
    /// Other users are skipped (they cannot be scored) but still counted
    /// for progress reporting.
    pub fn evaluate(
        &self,
        test: &BTreeMap<UserId, ItemId>,
        user_map: &IdMap,
        item_map: &IdMap,
    ) -> Result<Evaluation> {
        let total_users = test.len();
        let mut records = Vec::new();
        let mut missing_embeddings = Vec::new();
        let mut skipped_users = 0usize;

        for (processed, (&user, &test_item)) in test.iter().enumerate() {
            let user_index = match user_map.index_of(user) {
                Some(index) if self.model.train_users().contains(&index) => index,
                _ => {
                    skipped_users += 1;
                    continue;
                }
            };

            let top_items = self.model.top_predictions(user_index, self.metrics.k())?;
            // An item absent from the training universe has no dense index;
            // it simply cannot appear in the ranking.
            let position = item_map
                .index_of(test_item)
                .and_then(|target| self.metrics.position(&top_items, target));

            let (hit, mrr, soft_mrr) = match position {
                Some(p) => {
                    let rr = 1.0 / (p as f32 + 1.0);
                    (1, rr, Some(rr))
                }
                None => {
                    let soft =
                        self.soft_reciprocal_rank(user, test_item, &top_items, item_map);
                    if soft.is_none() {
                        missing_embeddings.push((user, test_item));
                    }
                    (0, 0.0, soft)
                }
            };

            records.push(EvalRecord {
                user,
                hit,
                mrr,
                soft_mrr,
            });

            if (processed + 1) % 1000 == 0 {
                debug!(processed = processed + 1, total = total_users, "evaluating users");
            }
        }

        let hits: Vec<f32> = records.iter().map(|r| r.hit as f32).collect();
        let mrrs: Vec<f32> = records.iter().map(|r| r.mrr).collect();
        let softs: Vec<f32> = records.iter().filter_map(|r| r.soft_mrr).collect();

        let summary = RankingSummary {
            hit_rate: crate::utils::mean(&hits),
            mrr: crate::utils::mean(&mrrs),
            soft_mrr: crate::utils::mean(&softs),
            evaluated_users: records.len(),
            skipped_users,
        };

        info!(
            evaluated = summary.evaluated_users,
            skipped = summary.skipped_users,
            hit_rate = summary.hit_rate,
            mrr = summary.mrr,
            soft_mrr = summary.soft_mrr,
            "evaluation complete"
        );

        Ok(Evaluation {
            records,
            missing_embeddings,
            summary,
        })
    }

    /// Credits the ranked item most similar to the held-out one:
    /// `1/(p'+1)` for the best candidate position `p'`. Returns `None` when
    /// the embedding collaborator cannot answer for this user; an empty
    /// ranking scores 0.
    fn soft_reciprocal_rank(
        &self,
        user: UserId,
        test_item: ItemId,
        top_items: &[usize],
        item_map: &IdMap,
    ) -> Option<f32> {
        if top_items.is_empty() {
            return Some(0.0);
        }

        let target = match self.embeddings.get(&test_item) {
            Some(target) => target,
            None => {
                warn!(user, item = test_item, "missing embedding for held-out item");
                return None;
            }
        };

        let mut best: Option<(usize, f32)> = None;
        for (position, &candidate) in top_items.iter().enumerate() {
            let candidate_id = item_map.id_of(candidate)?;
            let embedding = match self.embeddings.get(&candidate_id) {
                Some(embedding) => embedding,
                None => {
                    debug!(item = candidate_id, "no embedding for ranked candidate, skipping");
                    continue;
                }
            };

            let similarity = cosine(target, embedding);
            if best.map(|(_, s)| similarity > s).unwrap_or(true) {
                best = Some((position, similarity));
            }
        }

        match best {
            Some((position, _)) => Some(1.0 / (position as f32 + 1.0)),
            None => {
                warn!(user, item = test_item, "no ranked candidate has an embedding");
                None
            }
        }
    }
}

/// Writes the three per-user result streams: hit flags, MRR and soft-MRR,
/// each as `user<TAB>value`. Users with unavailable soft scores are omitted
/// from the soft stream.
pub fn write_eval_records<W1: Write, W2: Write, W3: Write>(
    mut hit_writer: W1,
    mut mrr_writer: W2,
    mut soft_writer: W3,
    records: &[EvalRecord],
) -> Result<()> {
    for record in records {
        writeln!(hit_writer, "{}\t{}", record.user, record.hit)?;
        writeln!(mrr_writer, "{}\t{}", record.user, record.mrr)?;
        if let Some(soft) = record.soft_mrr {
            writeln!(soft_writer, "{}\t{}", record.user, soft)?;
        }
    }
    Ok(())
}

/// Reads a per-user score stream written by [`write_eval_records`] (or any
/// `user value` file produced by an external evaluation method).
pub fn read_user_scores<R: BufRead>(reader: R) -> Result<BTreeMap<UserId, f32>> {
    let mut scores = BTreeMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(PipelineError::Parse {
                line: line_no,
                reason: format!("expected `user score`, found {} fields", tokens.len()),
            });
        }

        let user: UserId = tokens[0].parse().map_err(|e| PipelineError::Parse {
            line: line_no,
            reason: format!("invalid user id: {}", e),
        })?;
        let score: f32 = tokens[1].parse().map_err(|e| PipelineError::Parse {
            line: line_no,
            reason: format!("invalid score: {}", e),
        })?;

        scores.insert(user, score);
    }

    Ok(scores)
}
