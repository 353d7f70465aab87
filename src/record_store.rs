//! Line-delimited JSON record files.
//!
//! Every record occupies one line. New keys are appended, changes to existing
//! records rewrite the whole file. Lines that fail to parse are skipped on read
//! so a single corrupt entry never hides the rest of the store.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use log::warn;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// Raw text storage underneath a [`RecordStore`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    async fn read(&self) -> io::Result<Option<String>>;
    async fn append(&self, text: &str) -> io::Result<()>;
    async fn replace(&self, text: &str) -> io::Result<()>;
    fn name(&self) -> String;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn read(&self) -> io::Result<Option<String>> {
        (**self).read().await
    }

    async fn append(&self, text: &str) -> io::Result<()> {
        (**self).append(text).await
    }

    async fn replace(&self, text: &str) -> io::Result<()> {
        (**self).replace(text).await
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileBackend { path: path.into() }
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn append(&self, text: &str) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await
    }

    async fn replace(&self, text: &str) -> io::Result<()> {
        fs::write(&self.path, text).await
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    text: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_contents<S: Into<String>>(text: S) -> Self {
        MemoryBackend {
            text: Mutex::new(Some(text.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.text.lock().clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents())
    }

    async fn append(&self, text: &str) -> io::Result<()> {
        self.text
            .lock()
            .get_or_insert_with(String::new)
            .push_str(text);
        Ok(())
    }

    async fn replace(&self, text: &str) -> io::Result<()> {
        *self.text.lock() = Some(text.to_owned());
        Ok(())
    }

    fn name(&self) -> String {
        "<memory>".to_owned()
    }
}

pub fn parse_line<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(raw)
}

fn encode_line<T: Serialize>(record: &T) -> StoreResult<String> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// A file of `T` records, one JSON value per line.
///
/// The store does not cache anything: each call goes back to the backend.
/// Callers that check a key before writing must hold [`RecordStore::exclusive`]
/// across the whole sequence, otherwise two writers can both pass the check.
pub struct RecordStore<T> {
    backend: Box<dyn Backend>,
    lock: AsyncMutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        RecordStore {
            backend: Box::new(backend),
            lock: AsyncMutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(FileBackend::new(path))
    }

    pub fn name(&self) -> String {
        self.backend.name()
    }

    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    pub async fn read_all(&self) -> StoreResult<Vec<T>> {
        let text = self
            .backend
            .read()
            .await
            .map_err(|err| StoreError::io("reading", self.name(), err))?;
        Ok(match text {
            Some(text) => self.parse_all(&text),
            None => Vec::new(),
        })
    }

    fn parse_all(&self, text: &str) -> Vec<T> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match parse_line(line) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!("Skipping unparsable line in {}: {} ({})", self.name(), line, err);
                    None
                }
            })
            .collect()
    }

    pub async fn append(&self, record: &T) -> StoreResult<()> {
        let line = encode_line(record)?;
        self.backend
            .append(&line)
            .await
            .map_err(|err| StoreError::io("appending to", self.name(), err))
    }

    pub async fn rewrite_all(&self, records: &[T]) -> StoreResult<()> {
        let text = records
            .iter()
            .map(encode_line)
            .collect::<StoreResult<String>>()?;
        self.backend
            .replace(&text)
            .await
            .map_err(|err| StoreError::io("rewriting", self.name(), err))
    }
}
