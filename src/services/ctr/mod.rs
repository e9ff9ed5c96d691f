use crate::error::{PipelineError, Result};
use crate::models::{CtrScore, InteractionType, ItemId, UserId, IMPRESSION};
use crate::store::InteractionStore;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{BufRead, Write};
use tracing::info;

/// Per-user click-through baseline over the primary index.
///
/// CTR(user) = |impressed items with positive feedback| / |impressed items|,
/// defined as 0 when the user has no impressed items.
#[derive(Debug, Clone)]
pub struct CtrComputer {
    positive_feedback: HashSet<InteractionType>,
}

impl CtrComputer {
    pub fn new(positive_feedback: HashSet<InteractionType>) -> Self {
        Self { positive_feedback }
    }

    pub fn compute(&self, store: &InteractionStore) -> BTreeMap<UserId, CtrScore> {
        let mut results = BTreeMap::new();

        for (&user, items) in store.primary() {
            let mut numerator_items: BTreeSet<ItemId> = BTreeSet::new();
            let mut denominator_items: BTreeSet<ItemId> = BTreeSet::new();

            for (&item, kinds) in items {
                let impressed = kinds
                    .get(&IMPRESSION)
                    .map(|stamps| !stamps.is_empty())
                    .unwrap_or(false);
                if !impressed {
                    continue;
                }

                denominator_items.insert(item);
                if kinds.keys().any(|kind| self.positive_feedback.contains(kind)) {
                    numerator_items.insert(item);
                }
            }

            let ratio = if denominator_items.is_empty() {
                0.0
            } else {
                numerator_items.len() as f32 / denominator_items.len() as f32
            };

            results.insert(
                user,
                CtrScore {
                    ratio,
                    numerator_items,
                    denominator_items,
                },
            );
        }

        info!(users = results.len(), "computed CTR baseline");
        results
    }
}

fn format_item_list(items: &BTreeSet<ItemId>) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Writes one line per user: `user ratio numerator_list denominator_list`,
/// item lists comma-separated with `-` for empty.
pub fn write_ctr<W: Write>(mut writer: W, results: &BTreeMap<UserId, CtrScore>) -> Result<()> {
    for (user, score) in results {
        writeln!(
            writer,
            "{} {} {} {}",
            user,
            score.ratio,
            format_item_list(&score.numerator_items),
            format_item_list(&score.denominator_items)
        )?;
    }
    Ok(())
}

/// Reads the per-user ratios back from a CTR output file.
pub fn read_ctr_ratios<R: BufRead>(reader: R) -> Result<BTreeMap<UserId, f32>> {
    let mut ratios = BTreeMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let mut tokens = line.split_whitespace();
        let (user, ratio) = match (tokens.next(), tokens.next()) {
            (Some(user), Some(ratio)) => (user, ratio),
            _ => {
                return Err(PipelineError::Parse {
                    line: line_no,
                    reason: "expected at least `user ratio`".to_string(),
                })
            }
        };

        let user: UserId = user.parse().map_err(|e| PipelineError::Parse {
            line: line_no,
            reason: format!("invalid user id: {}", e),
        })?;
        let ratio: f32 = ratio.parse().map_err(|e| PipelineError::Parse {
            line: line_no,
            reason: format!("invalid ratio: {}", e),
        })?;

        ratios.insert(user, ratio);
    }

    Ok(ratios)
}
