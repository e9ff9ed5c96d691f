use crate::error::{PipelineError, Result};
use crate::models::{Interaction, InteractionType, ItemId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// user → item → interaction type → timestamps. Insertion is idempotent: a
/// quadruple already present is a no-op.
pub type PrimaryIndex =
    HashMap<UserId, HashMap<ItemId, HashMap<InteractionType, BTreeSet<Timestamp>>>>;

/// user → timestamp → (item, interaction type), ascending by timestamp.
/// Timestamps are assumed unique per user; a colliding event overwrites the
/// earlier one (inherited upstream ambiguity, kept as-is).
pub type SecondaryIndex = HashMap<UserId, BTreeMap<Timestamp, (ItemId, InteractionType)>>;

/// Both indices over a parsed event log. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionStore {
    primary: PrimaryIndex,
    secondary: SecondaryIndex,
    event_count: u64,
}

impl InteractionStore {
    /// Parses a whitespace-delimited event log. The first line is a header
    /// and is discarded; every following line must hold exactly
    /// `user item interaction_type timestamp` as integers. Any malformed
    /// row aborts the whole ingestion.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut store = Self::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if line_no == 1 {
                continue;
            }

            let event = parse_event_row(&line, line_no)?;
            store.insert(event);

            if line_no % 100_000 == 0 {
                debug!(lines = line_no, "parsing event log");
            }
        }

        info!(
            users = store.primary.len(),
            events = store.event_count,
            "event log indexed"
        );
        Ok(store)
    }

    fn insert(&mut self, event: Interaction) {
        self.secondary
            .entry(event.user)
            .or_default()
            .insert(event.timestamp, (event.item, event.kind));

        let timestamps = self
            .primary
            .entry(event.user)
            .or_default()
            .entry(event.item)
            .or_default()
            .entry(event.kind)
            .or_default();
        if timestamps.insert(event.timestamp) {
            self.event_count += 1;
        }
    }

    pub fn primary(&self) -> &PrimaryIndex {
        &self.primary
    }

    pub fn secondary(&self) -> &SecondaryIndex {
        &self.secondary
    }

    /// Distinct quadruples recorded in the primary index.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn user_count(&self) -> usize {
        self.primary.len()
    }

    /// Every item seen anywhere in the log, ascending.
    pub fn item_universe(&self) -> BTreeSet<ItemId> {
        self.primary
            .values()
            .flat_map(|items| items.keys().copied())
            .collect()
    }

    /// A user's events in ascending timestamp order.
    pub fn events_of(&self, user: UserId) -> Option<&BTreeMap<Timestamp, (ItemId, InteractionType)>> {
        self.secondary.get(&user)
    }
}

fn parse_event_row(line: &str, line_no: usize) -> Result<Interaction> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 4 {
        return Err(PipelineError::Parse {
            line: line_no,
            reason: format!("expected 4 fields, found {}", tokens.len()),
        });
    }

    let field = |idx: usize, name: &str| -> Result<i64> {
        tokens[idx].parse::<i64>().map_err(|e| PipelineError::Parse {
            line: line_no,
            reason: format!("invalid {}: {}", name, e),
        })
    };

    let user = field(0, "user id")?;
    let item = field(1, "item id")?;
    let kind = field(2, "interaction type")?;
    let timestamp = field(3, "timestamp")?;

    let check_unsigned = |value: i64, name: &str| -> Result<u64> {
        u64::try_from(value).map_err(|_| PipelineError::Parse {
            line: line_no,
            reason: format!("invalid {}: negative value {}", name, value),
        })
    };

    let kind = u32::try_from(check_unsigned(kind, "interaction type")?).map_err(|_| {
        PipelineError::Parse {
            line: line_no,
            reason: format!("invalid interaction type: {}", kind),
        }
    })?;

    Ok(Interaction::new(
        check_unsigned(user, "user id")?,
        check_unsigned(item, "item id")?,
        kind,
        timestamp,
    ))
}

/// Cache collaborator for the parsed indices. Injected into
/// [`load_or_parse`] so the load-or-rebuild decision lives outside the
/// store itself.
pub trait IndexCache {
    fn load(&self) -> Result<Option<InteractionStore>>;
    fn save(&self, store: &InteractionStore) -> Result<()>;
}

/// File-backed cache storing the indices as a JSON snapshot.
#[derive(Debug, Clone)]
pub struct JsonIndexCache {
    path: PathBuf,
}

impl JsonIndexCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexCache for JsonIndexCache {
    fn load(&self) -> Result<Option<InteractionStore>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let store = serde_json::from_slice(&bytes)?;
        info!(path = %self.path.display(), "loaded index snapshot from cache");
        Ok(Some(store))
    }

    fn save(&self, store: &InteractionStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec(store)?)?;
        info!(path = %self.path.display(), "saved index snapshot to cache");
        Ok(())
    }
}

/// Null cache: never loads, never saves.
#[derive(Debug, Clone, Default)]
pub struct NoCache;

impl IndexCache for NoCache {
    fn load(&self) -> Result<Option<InteractionStore>> {
        Ok(None)
    }

    fn save(&self, _store: &InteractionStore) -> Result<()> {
        Ok(())
    }
}

/// Returns the cached indices when available, otherwise parses `reader` and
/// saves the result through `cache`.
pub fn load_or_parse<R: BufRead>(reader: R, cache: &dyn IndexCache) -> Result<InteractionStore> {
    if let Some(store) = cache.load()? {
        return Ok(store);
    }
    let store = InteractionStore::parse(reader)?;
    cache.save(&store)?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IMPRESSION;
    use std::io::Cursor;

    const LOG: &str = "user item interaction timestamp\n\
                       1 10 0 100\n\
                       1 10 1 101\n\
                       1 20 0 200\n";

    #[test]
    fn test_parse_builds_both_indices() {
        let store = InteractionStore::parse(Cursor::new(LOG)).unwrap();

        let user = store.primary().get(&1).unwrap();
        assert_eq!(
            user.get(&10).unwrap().get(&IMPRESSION).unwrap(),
            &BTreeSet::from([100])
        );
        assert_eq!(user.get(&10).unwrap().get(&1).unwrap(), &BTreeSet::from([101]));

        let events: Vec<_> = store.events_of(1).unwrap().iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(*events[0].0, 100);
        assert_eq!(*events[2].1, (20, IMPRESSION));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let duplicated = format!("{}1 10 0 100\n", LOG);
        let store = InteractionStore::parse(Cursor::new(duplicated)).unwrap();
        let baseline = InteractionStore::parse(Cursor::new(LOG)).unwrap();

        assert_eq!(store.event_count(), baseline.event_count());
        assert_eq!(
            store.primary().get(&1).unwrap().get(&10).unwrap(),
            baseline.primary().get(&1).unwrap().get(&10).unwrap()
        );
    }

    #[test]
    fn test_timestamp_collision_overwrites() {
        let log = "header\n1 10 0 100\n1 20 1 100\n";
        let store = InteractionStore::parse(Cursor::new(log)).unwrap();

        let events = store.events_of(1).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events.get(&100), Some(&(20, 1)));
    }

    #[test]
    fn test_malformed_rows_are_fatal() {
        let missing_field = "header\n1 10 0\n";
        assert!(matches!(
            InteractionStore::parse(Cursor::new(missing_field)),
            Err(PipelineError::Parse { line: 2, .. })
        ));

        let non_numeric = "header\n1 ten 0 100\n";
        assert!(matches!(
            InteractionStore::parse(Cursor::new(non_numeric)),
            Err(PipelineError::Parse { line: 2, .. })
        ));

        let extra_field = "header\n1 10 0 100 9\n";
        assert!(InteractionStore::parse(Cursor::new(extra_field)).is_err());
    }

    #[test]
    fn test_header_is_skipped() {
        let store = InteractionStore::parse(Cursor::new(LOG)).unwrap();
        assert_eq!(store.event_count(), 3);
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_item_universe() {
        let store = InteractionStore::parse(Cursor::new(LOG)).unwrap();
        assert_eq!(store.item_universe(), BTreeSet::from([10, 20]));
    }

    #[test]
    fn test_no_cache_round_trip() {
        let store = load_or_parse(Cursor::new(LOG), &NoCache).unwrap();
        assert_eq!(store.event_count(), 3);
    }
}
