//! In-process store, used when no database is configured.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Collection, RawDocument, Scope, Store, StoreError, Write};

type LookupKey = (Collection, String, String);

#[derive(Default)]
struct State {
    documents: BTreeMap<(Collection, String), RawDocument>,
    lookups: HashMap<LookupKey, String>,
}

#[derive(Default)]
pub struct MemoryStore { state: RwLock<State> }

impl State {
    fn validate(&self, writes: &[Write]) -> Result<(), StoreError> {
        let mut claimed: HashSet<LookupKey> = HashSet::new();
        for write in writes {
            let (collection, key, expected) = match write {
                Write::Put { collection, expected_version, document, .. } => (*collection, &document.key, *expected_version),
                Write::Delete { collection, key, expected_version } => (*collection, key, *expected_version),
            };
            let current = self.documents.get(&(collection, key.clone())).map_or(0, |d| d.version);
            if current != expected {
                return Err(StoreError::Conflict { collection, key: key.clone() });
            }
            if let Write::Put { lookups, .. } = write {
                for (name, value) in lookups {
                    let lookup = (collection, name.clone(), value.clone());
                    let taken_by_other = self.lookups.get(&lookup).is_some_and(|owner| owner != key);
                    if taken_by_other || !claimed.insert(lookup) {
                        return Err(StoreError::Duplicate { lookup: name.clone(), value: value.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::Put { collection, document, lookups, .. } => {
                self.drop_lookups(collection, &document.key);
                for (name, value) in lookups {
                    self.lookups.insert((collection, name, value), document.key.clone());
                }
                self.documents.insert((collection, document.key.clone()), document);
            }
            Write::Delete { collection, key, .. } => {
                self.drop_lookups(collection, &key);
                self.documents.remove(&(collection, key));
            }
        }
    }

    fn drop_lookups(&mut self, collection: Collection, key: &str) {
        self.lookups.retain(|(c, _, _), owner| *c != collection || owner.as_str() != key);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<RawDocument>, StoreError> {
        Ok(self.state.read().await.documents.get(&(collection, key.to_string())).cloned())
    }

    async fn find(&self, collection: Collection, lookup: &str, value: &str) -> Result<Option<RawDocument>, StoreError> {
        let state = self.state.read().await;
        let key = state.lookups.get(&(collection, lookup.to_string(), value.to_string()));
        Ok(key.and_then(|k| state.documents.get(&(collection, k.clone())).cloned()))
    }

    async fn scan(&self, collection: Collection, scope: &Scope) -> Result<Vec<RawDocument>, StoreError> {
        let state = self.state.read().await;
        Ok(state.documents.iter()
            .filter(|((c, _), doc)| *c == collection && scope.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.validate(&writes)?;
        for write in writes { state.apply(write); }
        Ok(())
    }
}
