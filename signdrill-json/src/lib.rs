use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use signdrill_core::{Card, CardId, CardStore, CoreError, Review};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task;

pub mod paths;

const FILE_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cards: Vec<Card>,
    reviews: Vec<Review>,
}

#[derive(Clone)]
struct State {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cards: HashMap<CardId, Card>,
    reviews: Vec<Review>,
}

impl State {
    fn new_empty() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            cards: HashMap::new(),
            reviews: Vec::new(),
        }
    }

    fn to_image(&self) -> FileImage {
        let mut cards: Vec<Card> = self.cards.values().cloned().collect();
        cards.sort_by_cached_key(Card::id);
        FileImage {
            version: FILE_VERSION,
            created_at: self.created_at,
            updated_at: self.updated_at,
            cards,
            reviews: self.reviews.clone(),
        }
    }

    fn from_image(img: FileImage) -> Self {
        let cards = img.cards.into_iter().map(|c| (c.id(), c)).collect();
        let mut reviews = img.reviews;
        reviews.sort_by_key(|r| r.reviewed_at);
        Self {
            created_at: img.created_at,
            updated_at: img.updated_at,
            cards,
            reviews,
        }
    }
}

pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    state: RwLock<State>,
    // Serializes commits so one write cannot overwrite another's snapshot.
    writer: AsyncMutex<()>,
}

impl JsonStore {
    pub async fn open_default() -> Result<Self, CoreError> {
        let (file, backups) = paths::default_store_file();
        Self::open_with(file, backups, 10).await
    }

    pub async fn open_with(
        path: PathBuf,
        backups_dir: PathBuf,
        max_backups: usize,
    ) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let state = load_or_init(&path, &backups_dir).await?;
        tracing::debug!(path = %path.display(), cards = state.cards.len(), "json store opened");
        Ok(Self {
            path,
            backups_dir,
            max_backups: max_backups.max(1),
            state: RwLock::new(state),
            writer: AsyncMutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the state, write it out, and only then
    /// make it visible. A failed write leaves memory as it was.
    async fn commit<F>(&self, change: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut State),
    {
        let _guard = self.writer.lock().await;
        let mut next = self.state.read().clone();
        change(&mut next);
        next.updated_at = Utc::now();
        let snapshot = next.to_image();

        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;
        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &snapshot))
            .await
            .map_err(|_| CoreError::Storage("io"))?
            .map_err(|e| {
                tracing::warn!(error = %e, "json store write failed, change discarded");
                CoreError::Storage("io")
            })?;

        *self.state.write() = next;
        Ok(())
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(|_| CoreError::Storage("io"))
}

async fn load_or_init(path: &Path, backups_dir: &Path) -> Result<State, CoreError> {
    if path.exists() {
        let p = path.to_path_buf();
        let img: FileImage = task::spawn_blocking(move || {
            let mut f = fs::File::open(&p)?;
            let mut buf = String::new();
            f.read_to_string(&mut buf)?;
            let v = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(v)
        })
        .await
        .map_err(|_| CoreError::Storage("io"))
        .and_then(|r| r.map_err(|_| CoreError::Storage("corrupt store file")))?;
        if img.version != FILE_VERSION {
            return Err(CoreError::Storage("unsupported store file version"));
        }
        Ok(State::from_image(img))
    } else {
        let st = State::new_empty();
        let img = st.to_image();
        write_with_backup(path, backups_dir, 1, &img).map_err(|_| CoreError::Storage("io"))?;
        Ok(st)
    }
}

fn write_with_backup(
    path: &Path,
    backups_dir: &Path,
    max_backups: usize,
    img: &FileImage,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(backups_dir)?;

    let json = serde_json::to_vec_pretty(img)?;
    let mut tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Backup rotation
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    let backup_path = backups_dir.join(format!("signdrill-{ts}.json"));
    let mut btmp = NamedTempFile::new_in(backups_dir)?;
    btmp.write_all(&json)?;
    btmp.flush()?;
    btmp.persist(&backup_path).map_err(|e| e.error)?;

    rotate_backups(backups_dir, max_backups)?;

    Ok(())
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    // Names embed the timestamp, so lexical order is age order.
    entries.sort();
    if entries.len() > keep {
        for p in &entries[0..entries.len() - keep] {
            let _ = fs::remove_file(p);
        }
    }
    Ok(())
}

#[async_trait]
impl CardStore for JsonStore {
    async fn get(&self, id: &CardId) -> Result<Option<Card>, CoreError> {
        let s = self.state.read();
        Ok(s.cards.get(id).cloned())
    }

    async fn put(&self, card: &Card) -> Result<(), CoreError> {
        self.commit(|s| {
            s.cards.insert(card.id(), card.clone());
        })
        .await
    }

    async fn get_all(&self) -> Result<HashMap<CardId, Card>, CoreError> {
        let s = self.state.read();
        Ok(s.cards.clone())
    }

    async fn insert_review(&self, review: &Review) -> Result<(), CoreError> {
        self.commit(|s| s.reviews.push(review.clone())).await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>, CoreError> {
        let s = self.state.read();
        let mut v = s.reviews.clone();
        v.sort_by_key(|r| r.reviewed_at);
        Ok(v)
    }

    async fn record_review(&self, card: &Card, review: &Review) -> Result<(), CoreError> {
        self.commit(|s| {
            s.cards.insert(card.id(), card.clone());
            s.reviews.push(review.clone());
        })
        .await
    }

    async fn reset(&self, cards: &[Card]) -> Result<(), CoreError> {
        self.commit(|s| {
            s.cards = cards.iter().map(|c| (c.id(), c.clone())).collect();
            s.reviews.clear();
        })
        .await
    }
}
