use crate::error::{PipelineError, Result};
use crate::models::{ItemId, TrainTestSplit, UserId, IMPRESSION};
use crate::store::InteractionStore;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use tracing::info;

/// Leakage-aware chronological train/test splitter.
///
/// Per user, the held-out test item is the one engaged at the latest
/// timestamp without any prior impression of that item; everything earlier
/// becomes training pairs and everything later is discarded. Users without
/// such an event are excluded from both outputs.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplitter;

impl DatasetSplitter {
    pub fn new() -> Self {
        Self
    }

    pub fn split(&self, store: &InteractionStore) -> TrainTestSplit {
        let mut result = TrainTestSplit::default();
        let mut seen_pairs: HashSet<(UserId, ItemId)> = HashSet::new();

        let mut users: Vec<UserId> = store.secondary().keys().copied().collect();
        users.sort_unstable();

        for user in users {
            let events = match store.events_of(user) {
                Some(events) => events,
                None => continue,
            };

            // First pass: the held-out candidate is the latest engagement of
            // an item never impressed before that point.
            let mut impressed_items: HashSet<ItemId> = HashSet::new();
            let mut last = None;
            for (&timestamp, &(item, kind)) in events {
                if kind == IMPRESSION {
                    impressed_items.insert(item);
                } else if !impressed_items.contains(&item) {
                    last = Some(timestamp);
                }
            }

            let last = match last {
                Some(last) => last,
                None => continue,
            };

            // Second pass: training pairs strictly before `last`, the test
            // label at `last`, nothing after it. The held-out item never
            // enters the training pairs.
            let test_item = events
                .get(&last)
                .map(|&(item, _)| item)
                .unwrap_or_default();
            for (&timestamp, &(item, _)) in events {
                if timestamp >= last {
                    break;
                }
                if item == test_item {
                    continue;
                }
                if seen_pairs.insert((user, item)) {
                    result.train.push((user, item));
                }
            }
            result.test.insert(user, test_item);
        }

        info!(
            train_pairs = result.train_len(),
            test_users = result.test_len(),
            "chronological split complete"
        );
        result
    }
}

/// Writes `user item` pairs, one per line.
pub fn write_pairs<W: Write, I>(mut writer: W, pairs: I) -> Result<()>
where
    I: IntoIterator<Item = (UserId, ItemId)>,
{
    for (user, item) in pairs {
        writeln!(writer, "{} {}", user, item)?;
    }
    Ok(())
}

/// Reads `user item` pairs written by [`write_pairs`].
pub fn read_pairs<R: BufRead>(reader: R) -> Result<Vec<(UserId, ItemId)>> {
    let mut pairs = Vec::new();

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
                reason: format!("expected `user item`, found {} fields", tokens.len()),
            });
        }

        let parse = |token: &str, name: &str| -> Result<u64> {
            token.parse().map_err(|e| PipelineError::Parse {
                line: line_no,
                reason: format!("invalid {}: {}", name, e),
            })
        };

        pairs.push((parse(tokens[0], "user id")?, parse(tokens[1], "item id")?));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(log: &str) -> InteractionStore {
        InteractionStore::parse(Cursor::new(log)).unwrap()
    }

    #[test]
    fn test_split_scenario() {
        // Item 20 is purchased without ever being impressed; it becomes the
        // held-out label and the earlier events train.
        let store = parse(
            "header\n\
             1 10 0 100\n\
             1 10 1 101\n\
             1 20 3 200\n",
        );
        let split = DatasetSplitter::new().split(&store);

        assert_eq!(split.train, vec![(1, 10)]);
        assert_eq!(split.test.get(&1), Some(&20));
    }

    #[test]
    fn test_user_without_qualifying_event_is_excluded() {
        // Every engagement follows an impression of the same item.
        let store = parse(
            "header\n\
             1 10 0 100\n\
             1 10 1 101\n\
             1 20 0 150\n\
             1 20 2 160\n",
        );
        let split = DatasetSplitter::new().split(&store);

        assert!(split.train.is_empty());
        assert!(split.test.is_empty());
    }

    #[test]
    fn test_events_after_test_label_are_discarded() {
        let store = parse(
            "header\n\
             1 10 0 100\n\
             1 20 1 150\n\
             1 30 0 200\n\
             1 40 0 300\n",
        );
        let split = DatasetSplitter::new().split(&store);

        assert_eq!(split.test.get(&1), Some(&20));
        assert_eq!(split.train, vec![(1, 10)]);
    }

    #[test]
    fn test_latest_unimpressed_engagement_wins() {
        let store = parse(
            "header\n\
             1 10 1 100\n\
             1 20 0 150\n\
             1 30 2 200\n",
        );
        let split = DatasetSplitter::new().split(&store);

        // Both 10 and 30 qualify; the later one is held out.
        assert_eq!(split.test.get(&1), Some(&30));
        assert_eq!(split.train, vec![(1, 10), (1, 20)]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let log = "header\n\
                   2 10 0 100\n\
                   2 20 1 110\n\
                   1 10 0 100\n\
                   1 30 2 120\n\
                   3 40 0 100\n";
        let store = parse(log);
        let splitter = DatasetSplitter::new();

        let first = splitter.split(&store);
        let second = splitter.split(&store);
        assert_eq!(first, second);
    }

    #[test]
    fn test_test_item_never_in_training() {
        // The held-out item is engaged twice without impression; the earlier
        // engagement must not leak into training.
        let store = parse(
            "header\n\
             1 10 0 100\n\
             1 20 1 150\n\
             1 20 1 250\n",
        );
        let split = DatasetSplitter::new().split(&store);

        assert_eq!(split.test.get(&1), Some(&20));
        assert!(!split.train.iter().any(|&(user, item)| user == 1 && item == 20));
        assert_eq!(split.train, vec![(1, 10)]);
    }

    #[test]
    fn test_pairs_round_trip() {
        let pairs = vec![(1, 10), (2, 20)];
        let mut buffer = Vec::new();
        write_pairs(&mut buffer, pairs.clone()).unwrap();
        assert_eq!(read_pairs(Cursor::new(buffer)).unwrap(), pairs);
    }
}
