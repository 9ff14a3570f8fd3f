//! Typed collection implementation.

use crate::collection::{IndexName, Item, NoIndex};
use crate::error::{StoreError, StoreResult};
use crate::handle::StoreHandle;
use crate::service::StorageService;
use crate::types::Record;
use powa_codec::{from_value, to_value, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::debug;

/// A typed view of one store.
///
/// Each method acquires a fresh [`StoreHandle`], performs one operation,
/// then commits on success or aborts on failure, so a failed call leaves no
/// trace. If the service has no live connection the collection initializes
/// it and begins the transaction in one step
/// ([`StorageService::open_store`]), at most [`Config::init_retry_limit`]
/// times.
///
/// [`Config::init_retry_limit`]: crate::Config::init_retry_limit
///
/// # Example
///
/// ```rust,ignore
/// let images: Collection<ImageDoc> = Collection::new(service.clone(), "images");
/// images.add("i1", &ImageDoc { src, title }).await?;
/// let all = images.get().await?;
/// ```
pub struct Collection<T, I = NoIndex> {
    service: StorageService,
    name: String,
    _marker: PhantomData<fn() -> (T, I)>,
}

impl<T, I> Clone for Collection<T, I> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, I> Collection<T, I>
where
    T: Serialize + DeserializeOwned,
    I: IndexName,
{
    /// Creates a collection bound to the store `name`.
    pub fn new(service: StorageService, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying service.
    pub fn service(&self) -> &StorageService {
        &self.service
    }

    /// All records in ascending key order.
    pub async fn get(&self) -> StoreResult<Vec<Item<T>>> {
        let handle = self.handle().await?;
        let result = handle.scan_all().await;
        let records = finish(handle, result).await?;
        records.into_iter().map(decode).collect()
    }

    /// The document stored under `key`, if any.
    pub async fn get_by_id(&self, key: &str) -> StoreResult<Option<T>> {
        let handle = self.handle().await?;
        let result = handle.get(key).await;
        match finish(handle, result).await? {
            Some(record) => Ok(Some(from_value(&record.value)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new document.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] if `key` exists.
    pub async fn add(&self, key: &str, value: &T) -> StoreResult<()> {
        let document = to_value(value)?;
        let mut handle = self.handle().await?;
        let result = handle.add(key, document).await;
        finish(handle, result).await
    }

    /// Inserts or replaces a document.
    pub async fn put(&self, key: &str, value: &T) -> StoreResult<()> {
        let document = to_value(value)?;
        let mut handle = self.handle().await?;
        let result = handle.put(key, document).await;
        finish(handle, result).await
    }

    /// Deletes the document under `key`, if any.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut handle = self.handle().await?;
        let result = handle.remove(key).await;
        finish(handle, result).await
    }

    /// All documents whose `index` field equals `key`.
    pub async fn get_by_index(&self, index: I, key: impl Into<Value>) -> StoreResult<Vec<Item<T>>> {
        let key = key.into();
        let handle = self.handle().await?;
        let result = handle.query_by_index(index.name(), &key).await;
        let records = finish(handle, result).await?;
        records.into_iter().map(decode).collect()
    }

    /// Number of documents.
    pub async fn count(&self) -> StoreResult<usize> {
        let handle = self.handle().await?;
        let result = handle.count().await;
        finish(handle, result).await
    }

    async fn handle(&self) -> StoreResult<StoreHandle> {
        let mut last = match self.service.store(&self.name).await {
            Err(e) if e.is_no_connection() => e,
            other => return other,
        };

        let limit = self.service.config().init_retry_limit;
        for attempt in 1..=limit {
            debug!(store = %self.name, attempt, "no connection, initializing");
            match self.service.open_store(&self.name).await {
                Err(e) if e.is_no_connection() => last = e,
                other => return other,
            }
        }
        Err(StoreError::RetriesExhausted {
            attempts: limit,
            source: Box::new(last),
        })
    }
}

/// Ends the call's transaction: commit on success, abort on failure.
async fn finish<R>(mut handle: StoreHandle, result: StoreResult<R>) -> StoreResult<R> {
    match result {
        Ok(value) => {
            handle.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(abort_error) = handle.abort().await {
                debug!(error = %abort_error, "abort after failed request");
            }
            Err(e)
        }
    }
}

fn decode<T: DeserializeOwned>(record: Record) -> StoreResult<Item<T>> {
    Ok(Item {
        data: from_value(&record.value)?,
        key: record.key,
    })
}
