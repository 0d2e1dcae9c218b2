//! Aggregate persistence.
//!
//! Aggregates are stored as versioned JSON documents. A read hands back the
//! version it saw; a [`UnitOfWork`] commits a batch of writes only if every
//! document is still at the version it was read at. Secondary lookups
//! (email, coupon code, gateway order id, target period) are unique per
//! collection.

pub mod documents;
pub mod memory;
pub mod postgres;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection { Users, Products, Carts, Wishlists, Coupons, Orders, Targets }

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Products => "products",
            Self::Carts => "carts",
            Self::Wishlists => "wishlists",
            Self::Coupons => "coupons",
            Self::Orders => "orders",
            Self::Targets => "targets",
        }
    }
}

/// A stored document as the backend sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDocument {
    pub key: String,
    pub version: i64,
    pub owner: Option<String>,
    pub tag: Option<String>,
    pub body: serde_json::Value,
}

/// Filter for [`Store::scan`]. `None` fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope { pub owner: Option<String>, pub tag: Option<String> }

impl Scope {
    pub fn all() -> Self { Self::default() }
    pub fn owner(owner: impl ToString) -> Self { Self { owner: Some(owner.to_string()), tag: None } }
    pub fn tag(tag: impl Into<String>) -> Self { Self { owner: None, tag: Some(tag.into()) } }

    fn matches(&self, doc: &RawDocument) -> bool {
        self.owner.as_ref().map_or(true, |o| doc.owner.as_ref() == Some(o))
            && self.tag.as_ref().map_or(true, |t| doc.tag.as_ref() == Some(t))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    /// Inserts when `expected_version` is 0, otherwise updates in place.
    Put {
        collection: Collection,
        expected_version: i64,
        document: RawDocument,
        lookups: Vec<(String, String)>,
    },
    Delete { collection: Collection, key: String, expected_version: i64 },
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<RawDocument>, StoreError>;
    async fn find(&self, collection: Collection, lookup: &str, value: &str) -> Result<Option<RawDocument>, StoreError>;
    async fn scan(&self, collection: Collection, scope: &Scope) -> Result<Vec<RawDocument>, StoreError>;
    /// Applies every write or none of them.
    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection:?} {key} was modified concurrently")]
    Conflict { collection: Collection, key: String },
    #[error("{lookup} {value} already exists")]
    Duplicate { lookup: String, value: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An aggregate that can be persisted.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    fn key(&self) -> String;
    fn owner(&self) -> Option<String> { None }
    fn tag(&self) -> Option<String> { None }
    fn lookups(&self) -> Vec<(&'static str, String)> { vec![] }
}

/// An aggregate together with the version it was read at. Version 0 means
/// not yet stored.
#[derive(Clone, Debug)]
pub struct Versioned<T> { version: i64, value: T }

impl<T> Versioned<T> {
    pub fn new(value: T) -> Self { Self { version: 0, value } }
    pub fn version(&self) -> i64 { self.version }
    pub fn into_inner(self) -> T { self.value }
}

impl<T> Deref for Versioned<T> {
    type Target = T;
    fn deref(&self) -> &T { &self.value }
}

impl<T> DerefMut for Versioned<T> {
    fn deref_mut(&mut self) -> &mut T { &mut self.value }
}

fn decode<T: Document>(raw: RawDocument) -> Result<Versioned<T>, StoreError> {
    Ok(Versioned { version: raw.version, value: serde_json::from_value(raw.body)? })
}

/// Typed access over a [`Store`].
#[derive(Clone)]
pub struct Repository { store: Arc<dyn Store> }

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn get<T: Document>(&self, key: &str) -> Result<Option<Versioned<T>>, StoreError> {
        self.store.get(T::COLLECTION, key).await?.map(decode).transpose()
    }

    pub async fn find<T: Document>(&self, lookup: &str, value: &str) -> Result<Option<Versioned<T>>, StoreError> {
        self.store.find(T::COLLECTION, lookup, value).await?.map(decode).transpose()
    }

    pub async fn scan<T: Document>(&self, scope: &Scope) -> Result<Vec<Versioned<T>>, StoreError> {
        self.store.scan(T::COLLECTION, scope).await?.into_iter().map(decode).collect()
    }

    pub fn unit_of_work(&self) -> UnitOfWork<'_> { UnitOfWork { store: self.store.as_ref(), writes: vec![] } }
}

/// A batch of writes committed atomically.
pub struct UnitOfWork<'a> {
    store: &'a dyn Store,
    writes: Vec<Write>,
}

impl UnitOfWork<'_> {
    pub fn put<T: Document>(&mut self, doc: &Versioned<T>) -> Result<&mut Self, StoreError> {
        let value: &T = doc;
        self.writes.push(Write::Put {
            collection: T::COLLECTION,
            expected_version: doc.version,
            document: RawDocument {
                key: value.key(), version: doc.version + 1, owner: value.owner(), tag: value.tag(),
                body: serde_json::to_value(value)?,
            },
            lookups: value.lookups().into_iter().map(|(name, v)| (name.to_string(), v)).collect(),
        });
        Ok(self)
    }

    pub fn delete<T: Document>(&mut self, doc: &Versioned<T>) -> &mut Self {
        self.writes.push(Write::Delete { collection: T::COLLECTION, key: doc.key(), expected_version: doc.version });
        self
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        if self.writes.is_empty() { return Ok(()); }
        self.store.commit(self.writes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Note { id: String, owner: String, slug: String }

    impl Document for Note {
        const COLLECTION: Collection = Collection::Targets;
        fn key(&self) -> String { self.id.clone() }
        fn owner(&self) -> Option<String> { Some(self.owner.clone()) }
        fn lookups(&self) -> Vec<(&'static str, String)> { vec![("slug", self.slug.clone())] }
    }

    fn repo() -> Repository { Repository::new(Arc::new(MemoryStore::default())) }

    fn note(id: &str, slug: &str) -> Versioned<Note> {
        Versioned::new(Note { id: id.into(), owner: "u1".into(), slug: slug.into() })
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let repo = repo();
        let mut uow = repo.unit_of_work();
        uow.put(&note("a", "first")).unwrap();
        uow.commit().await.unwrap();
        let stored = repo.get::<Note>("a").await.unwrap().unwrap();
        assert_eq!(stored.version(), 1);
        assert_eq!(repo.find::<Note>("slug", "first").await.unwrap().unwrap().id, "a");
        assert_eq!(repo.scan::<Note>(&Scope::owner("u1")).await.unwrap().len(), 1);
        assert!(repo.scan::<Note>(&Scope::owner("u2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_write_conflicts_and_batch_is_atomic() {
        let repo = repo();
        let mut uow = repo.unit_of_work();
        uow.put(&note("a", "first")).unwrap();
        uow.commit().await.unwrap();

        let mut fresh = repo.get::<Note>("a").await.unwrap().unwrap();
        let stale = repo.get::<Note>("a").await.unwrap().unwrap();
        fresh.slug = "renamed".into();
        let mut uow = repo.unit_of_work();
        uow.put(&fresh).unwrap();
        uow.commit().await.unwrap();

        let mut uow = repo.unit_of_work();
        uow.put(&note("b", "second")).unwrap();
        uow.put(&stale).unwrap();
        assert!(matches!(uow.commit().await, Err(StoreError::Conflict { .. })));
        assert!(repo.get::<Note>("b").await.unwrap().is_none());
        assert!(repo.find::<Note>("slug", "first").await.unwrap().is_none());
        assert_eq!(repo.find::<Note>("slug", "renamed").await.unwrap().unwrap().version(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_lookup_rejected() {
        let repo = repo();
        let mut uow = repo.unit_of_work();
        uow.put(&note("a", "same")).unwrap();
        uow.commit().await.unwrap();
        let mut uow = repo.unit_of_work();
        uow.put(&note("b", "same")).unwrap();
        assert!(matches!(uow.commit().await, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo();
        let mut uow = repo.unit_of_work();
        uow.put(&note("a", "gone")).unwrap();
        uow.commit().await.unwrap();
        let stored = repo.get::<Note>("a").await.unwrap().unwrap();
        let mut uow = repo.unit_of_work();
        uow.delete(&stored);
        uow.commit().await.unwrap();
        assert!(repo.get::<Note>("a").await.unwrap().is_none());
        assert!(repo.find::<Note>("slug", "gone").await.unwrap().is_none());
    }
}
