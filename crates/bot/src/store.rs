//! YAML-file configuration store.
//!
//! Every channel namespace is one document at `<root>/<namespace>.yaml`:
//!
//! ```yaml
//! commands:
//!   hello: { say: "hi {user}", description: "Greets you." }
//! permissions:
//!   hello: [mods, alice]
//! prefixes: ["!", "@bot "]
//! ```
//!
//! The file is polled and each poll is diffed against the last good
//! snapshot to produce change notifications.

use core::time::Duration;
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use channel_core::{ChangeEvent, Collection, ConfigFeed, ConfigStore, FeedSender};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Key the composite prefix value is reported under.
const PREFIXES_KEY: &str = "prefixes";

#[derive(Debug, Clone)]
pub(crate) struct FileConfigStore {
    root: PathBuf,
    interval: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
struct Snapshot {
    commands: BTreeMap<String, Value>,
    permissions: BTreeMap<String, Value>,
    prefixes: Option<Value>,
}

impl FileConfigStore {
    pub(crate) fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
        }
    }

    fn path_for(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty() || namespace.contains(['/', '\\']) || namespace == ".." {
            return Err(anyhow!("invalid store namespace `{namespace}`"));
        }
        Ok(self.root.join(format!("{namespace}.yaml")))
    }
}

async fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let yaml = match tokio::fs::read_to_string(path).await {
        Ok(yaml) => yaml,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("reading store file at {}", path.display()));
        }
    };
    if yaml.trim().is_empty() {
        return Ok(Snapshot::default());
    }
    serde_yaml::from_str(&yaml).with_context(|| format!("parsing store file at {}", path.display()))
}

/// Removals first, then additions and modifications in key order.
fn diff_children(
    prev: &BTreeMap<String, Value>,
    next: &BTreeMap<String, Value>,
) -> Vec<ChangeEvent> {
    let removed = prev
        .keys()
        .filter(|key| !next.contains_key(*key))
        .map(|key| ChangeEvent::removed(key.as_str()));
    let upserted = next.iter().filter_map(|(key, value)| match prev.get(key) {
        None => Some(ChangeEvent::added(key.as_str(), value.clone())),
        Some(old) if old != value => Some(ChangeEvent::changed(key.as_str(), value.clone())),
        Some(_) => None,
    });
    removed.chain(upserted).collect()
}

fn diff_single(prev: Option<&Value>, next: Option<&Value>) -> Option<ChangeEvent> {
    match (prev, next) {
        (None, Some(value)) => Some(ChangeEvent::added(PREFIXES_KEY, value.clone())),
        (Some(old), Some(value)) if old != value => {
            Some(ChangeEvent::changed(PREFIXES_KEY, value.clone()))
        }
        (Some(_), None) => Some(ChangeEvent::removed(PREFIXES_KEY)),
        _ => None,
    }
}

/// Sends the difference between two snapshots. Returns `false` once nobody
/// is listening any more.
fn publish(tx: &FeedSender, prev: &Snapshot, next: &Snapshot) -> bool {
    let mut changes = Vec::new();
    changes.extend(
        diff_single(prev.prefixes.as_ref(), next.prefixes.as_ref())
            .map(|change| (Collection::Prefixes, change)),
    );
    changes.extend(
        diff_children(&prev.commands, &next.commands)
            .into_iter()
            .map(|change| (Collection::Commands, change)),
    );
    changes.extend(
        diff_children(&prev.permissions, &next.permissions)
            .into_iter()
            .map(|change| (Collection::Permissions, change)),
    );

    for (collection, change) in changes {
        debug!(collection = %collection, key = %change.key(), kind = change.kind(), "Store change");
        tx.send(collection, change);
    }
    !tx.is_closed()
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn subscribe(&self, namespace: &str) -> Result<ConfigFeed> {
        let path = self.path_for(namespace)?;
        let (tx, feed) = ConfigFeed::channel();

        let mut current = match read_snapshot(&path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Store file unreadable; starting empty");
                Snapshot::default()
            }
        };
        publish(&tx, &Snapshot::default(), &current);
        info!(namespace = %namespace, path = %path.display(), "Subscribed to store file");

        let interval = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the file was just read.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                match read_snapshot(&path).await {
                    Ok(next) => {
                        if next != current && !publish(&tx, &current, &next) {
                            break;
                        }
                        current = next;
                    }
                    Err(e) => warn!(error = %e, "Skipping store poll"),
                }
            }
            debug!(path = %path.display(), "Store poller stopped");
        });

        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

    const WAIT: Duration = Duration::from_secs(5);

    fn store(dir: &Path) -> FileConfigStore {
        FileConfigStore::new(dir, Duration::from_millis(10))
    }

    /// Writes through a rename so the poller never sees a partial file.
    fn write(dir: &Path, namespace: &str, yaml: &str) {
        let tmp = dir.join(format!(".{namespace}.tmp"));
        std::fs::write(&tmp, yaml).unwrap();
        std::fs::rename(&tmp, dir.join(format!("{namespace}.yaml"))).unwrap();
    }

    async fn next(rx: &mut UnboundedReceiver<ChangeEvent>) -> ChangeEvent {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[test]
    fn diff_orders_removals_first() {
        let prev = BTreeMap::from([
            ("a".to_owned(), json!(1)),
            ("b".to_owned(), json!(2)),
            ("c".to_owned(), json!(3)),
        ]);
        let next = BTreeMap::from([
            ("a".to_owned(), json!(1)),
            ("b".to_owned(), json!(20)),
            ("d".to_owned(), json!(4)),
        ]);
        assert_eq!(
            diff_children(&prev, &next),
            vec![
                ChangeEvent::removed("c"),
                ChangeEvent::changed("b", json!(20)),
                ChangeEvent::added("d", json!(4)),
            ]
        );
    }

    #[test]
    fn diff_single_value() {
        let v = json!(["!"]);
        let w = json!(["?"]);
        assert_eq!(diff_single(None, None), None);
        assert_eq!(diff_single(Some(&v), Some(&v)), None);
        assert_eq!(
            diff_single(None, Some(&v)),
            Some(ChangeEvent::added("prefixes", v.clone()))
        );
        assert_eq!(
            diff_single(Some(&v), Some(&w)),
            Some(ChangeEvent::changed("prefixes", w))
        );
        assert_eq!(
            diff_single(Some(&v), None),
            Some(ChangeEvent::removed("prefixes"))
        );
    }

    #[tokio::test]
    async fn rejects_path_like_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.subscribe("../etc").await.is_err());
        assert!(store.subscribe("a\\b").await.is_err());
        assert!(store.subscribe("").await.is_err());
    }

    #[tokio::test]
    async fn initial_contents_arrive_as_added() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "foo",
            "commands:\n  hello: { say: hi }\npermissions:\n  hello: [mods]\nprefixes: ['?']\n",
        );
        let mut feed = store(dir.path()).subscribe("foo").await.unwrap();

        assert_eq!(
            next(&mut feed.commands).await,
            ChangeEvent::added("hello", json!({"say": "hi"}))
        );
        assert_eq!(
            next(&mut feed.permissions).await,
            ChangeEvent::added("hello", json!(["mods"]))
        );
        assert_eq!(
            next(&mut feed.prefixes).await,
            ChangeEvent::added("prefixes", json!(["?"]))
        );
    }

    #[tokio::test]
    async fn edits_are_diffed_between_polls() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "foo", "commands:\n  a: { say: one }\n  b: { say: two }\n");
        let mut feed = store(dir.path()).subscribe("foo").await.unwrap();
        next(&mut feed.commands).await;
        next(&mut feed.commands).await;

        write(dir.path(), "foo", "commands:\n  a: { say: uno }\n");
        assert_eq!(next(&mut feed.commands).await, ChangeEvent::removed("b"));
        assert_eq!(
            next(&mut feed.commands).await,
            ChangeEvent::changed("a", json!({"say": "uno"}))
        );
    }

    #[tokio::test]
    async fn missing_file_then_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut feed = store(dir.path()).subscribe("late").await.unwrap();
        assert!(feed.commands.try_recv().is_err());

        write(dir.path(), "late", "prefixes: ['!', '@bot ']\n");
        assert_eq!(
            next(&mut feed.prefixes).await,
            ChangeEvent::added("prefixes", json!(["!", "@bot "]))
        );
    }

    #[tokio::test]
    async fn unparsable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "foo", "permissions:\n  ping: [mods]\n");
        let mut feed = store(dir.path()).subscribe("foo").await.unwrap();
        next(&mut feed.permissions).await;

        write(dir.path(), "foo", "permissions: [unclosed\n");
        tokio::time::sleep(Duration::from_millis(50)).await;
        write(dir.path(), "foo", "permissions:\n  ping: [admins]\n");

        // The broken revision produced nothing; the diff is against the last good one.
        assert_eq!(
            next(&mut feed.permissions).await,
            ChangeEvent::changed("ping", json!(["admins"]))
        );
    }
}
