use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Raw user identifier as it appears in the event log.
pub type UserId = u64;
/// Raw item identifier as it appears in the event log.
pub type ItemId = u64;
/// Interaction type code; `IMPRESSION` is reserved, higher codes are
/// engagement signals.
pub type InteractionType = u32;
/// Event timestamp as logged (opaque integer, only ordering matters).
pub type Timestamp = i64;

/// The interaction type denoting an item was shown without any action.
pub const IMPRESSION: InteractionType = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub user: UserId,
    pub item: ItemId,
    pub kind: InteractionType,
    pub timestamp: Timestamp,
}

impl Interaction {
    pub fn new(user: UserId, item: ItemId, kind: InteractionType, timestamp: Timestamp) -> Self {
        Self {
            user,
            item,
            kind,
            timestamp,
        }
    }

    pub fn is_impression(&self) -> bool {
        self.kind == IMPRESSION
    }
}

/// Bidirectional mapping between raw log identifiers and the dense indices
/// the factorisation model operates on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdMap {
    to_index: HashMap<u64, usize>,
    to_id: Vec<u64>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dense index for `id`, assigning the next free one on
    /// first sight.
    pub fn get_or_insert(&mut self, id: u64) -> usize {
        if let Some(&index) = self.to_index.get(&id) {
            return index;
        }
        let index = self.to_id.len();
        self.to_index.insert(id, index);
        self.to_id.push(id);
        index
    }

    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.to_index.get(&id).copied()
    }

    pub fn id_of(&self, index: usize) -> Option<u64> {
        self.to_id.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_id.is_empty()
    }
}

/// Per-user CTR result: the engagement ratio plus the item sets behind the
/// numerator and denominator, kept for downstream diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtrScore {
    pub ratio: f32,
    pub numerator_items: BTreeSet<ItemId>,
    pub denominator_items: BTreeSet<ItemId>,
}

/// Output of the chronological splitter. `train` holds deduplicated
/// (user, item) pairs in first-seen order; `test` maps each qualifying user
/// to its single held-out item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<(UserId, ItemId)>,
    pub test: BTreeMap<UserId, ItemId>,
}

impl TrainTestSplit {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn test_len(&self) -> usize {
        self.test.len()
    }
}

/// Per-user evaluation outcome. `soft_mrr` is `None` when the embedding
/// collaborator had no vector for the items involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub user: UserId,
    pub hit: u8,
    pub mrr: f32,
    pub soft_mrr: Option<f32>,
}
