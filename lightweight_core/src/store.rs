//! Transactional record store with cascade delete.
//!
//! Exercises and results live in two tables. A result points at its owner
//! through `exercise_id`; deleting an exercise removes every result it owns
//! inside the same transaction.
//!
//! Every mutation runs against a private copy of the tables. On commit the
//! copy is handed to the backend, and only once the backend has made it
//! durable does it replace the visible state. A failed commit therefore
//! leaves both the durable and the in-memory state as they were, and readers
//! never see a half-applied cascade.
//!
//! # Concurrency
//!
//! Mutation requires `&mut Store`, so a single owner serializes all writers.
//! The store is not safe for concurrent multi-thread mutation on its own:
//! hosts that share it between threads must wrap it in a `Mutex` (or give it
//! to a single worker) themselves.
//!
//! Across processes, the file backend holds an exclusive `fs2` lock on a
//! sidecar `store.lock` from load until it is dropped. A second process
//! opening the same store blocks until the first one is done, so neither
//! can overwrite a snapshot the other has not seen.

use crate::query::FetchDescriptor;
use crate::seed::Seed;
use crate::{Error, Exercise, ExerciseResult, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

// ============================================================================
// Dataset and entities
// ============================================================================

/// Full contents of the store at one point in time
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub results: Vec<ExerciseResult>,
}

impl Dataset {
    pub fn record_count(&self) -> usize {
        self.exercises.len() + self.results.len()
    }
}

/// A record type with its own table in the store
pub trait Entity: Clone + 'static {
    /// Table name used in log output
    const TABLE: &'static str;

    fn id(&self) -> Uuid;

    fn rows(data: &Dataset) -> &Vec<Self>;

    fn rows_mut(data: &mut Dataset) -> &mut Vec<Self>;

    /// Relational checks run before the row is written
    fn check(&self, _data: &Dataset) -> Result<()> {
        Ok(())
    }

    /// Remove rows owned by `id`, returning how many were removed
    fn cascade(_id: Uuid, _data: &mut Dataset) -> usize {
        0
    }
}

impl Entity for Exercise {
    const TABLE: &'static str = "exercise";

    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(data: &Dataset) -> &Vec<Self> {
        &data.exercises
    }

    fn rows_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.exercises
    }

    fn cascade(id: Uuid, data: &mut Dataset) -> usize {
        let before = data.results.len();
        data.results.retain(|r| r.exercise_id != id);
        before - data.results.len()
    }
}

impl Entity for ExerciseResult {
    const TABLE: &'static str = "exercise_result";

    fn id(&self) -> Uuid {
        self.id
    }

    fn rows(data: &Dataset) -> &Vec<Self> {
        &data.results
    }

    fn rows_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.results
    }

    fn check(&self, data: &Dataset) -> Result<()> {
        let owner = data
            .exercises
            .iter()
            .find(|e| e.id == self.exercise_id)
            .ok_or(Error::NotFound(self.exercise_id))?;

        // JSON has no representation for NaN or infinity
        let value = self.time().or_else(|| self.other_value());
        if let Some(value) = value.filter(|v| !v.is_finite()) {
            return Err(Error::InvalidData(format!(
                "result {} has a non-finite value ({})",
                self.id, value
            )));
        }

        if self.measurement.score_type() != owner.score_type {
            return Err(Error::InvalidData(format!(
                "result {} carries a {} measurement but exercise '{}' is scored by {}",
                self.id,
                self.measurement.score_type(),
                owner.name,
                owner.score_type
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Storage engine underneath the store
pub trait StoreBackend {
    /// Read the last durable dataset
    fn load(&mut self) -> Result<Dataset>;

    /// Make `data` durable. On error the previous durable state must remain.
    fn persist(&mut self, data: &Dataset) -> Result<()>;
}

/// Backend that keeps nothing beyond the process lifetime
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl StoreBackend for MemoryBackend {
    fn load(&mut self) -> Result<Dataset> {
        Ok(Dataset::default())
    }

    fn persist(&mut self, _data: &Dataset) -> Result<()> {
        Ok(())
    }
}

/// Single-file JSON snapshot backend with atomic replace
pub struct JsonFileBackend {
    path: PathBuf,
    /// Held from the first load until drop
    lock: Option<File>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: None,
        }
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Take the exclusive `store.lock` next to the snapshot, waiting for any
    /// other holder
    fn acquire_lock(&mut self) -> Result<()> {
        if self.lock.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(self.parent_dir())?;
        let lock_path = self.path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        tracing::debug!("Acquired store lock {:?}", lock_path);
        self.lock = Some(file);
        Ok(())
    }
}

impl StoreBackend for JsonFileBackend {
    /// A missing file is an empty dataset. A corrupt file is an error: the
    /// store never starts over on top of data it could not read.
    fn load(&mut self) -> Result<Dataset> {
        self.acquire_lock()?;

        if !self.path.exists() {
            tracing::info!("No store file at {:?}, starting empty", self.path);
            return Ok(Dataset::default());
        }

        let mut contents = String::new();
        File::open(&self.path)?.read_to_string(&mut contents)?;

        let data: Dataset = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded {} exercises and {} results from {:?}",
            data.exercises.len(),
            data.results.len(),
            self.path
        );
        Ok(data)
    }

    /// Writes a temp file next to the target, syncs it, then renames it over
    /// the previous snapshot.
    fn persist(&mut self, data: &Dataset) -> Result<()> {
        self.acquire_lock()?;
        let parent = self.parent_dir();
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, data)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Persisted {} records to {:?}", data.record_count(), self.path);
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

/// The persistence store
pub struct Store {
    backend: Box<dyn StoreBackend + Send>,
    data: Dataset,
}

impl Store {
    /// Open a store over `backend`, loading its durable state
    pub fn open(backend: impl StoreBackend + Send + 'static) -> Result<Self> {
        let mut backend: Box<dyn StoreBackend + Send> = Box::new(backend);
        let data = backend.load()?;
        Ok(Self { backend, data })
    }

    /// An empty store that is never written anywhere
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend),
            data: Dataset::default(),
        }
    }

    /// Open (or create on first commit) a JSON snapshot file
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(JsonFileBackend::new(path))
    }

    /// Start a transaction. Nothing is visible until `commit`.
    pub fn begin(&mut self) -> Transaction<'_> {
        let working = self.data.clone();
        Transaction {
            store: self,
            working,
            committed: false,
        }
    }

    /// Run `f` inside a transaction, committing if it succeeds
    pub fn transaction<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R>,
    {
        let mut tx = self.begin();
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Auto-committing mutations
    // ------------------------------------------------------------------

    pub fn insert<T: Entity>(&mut self, entity: T) -> Result<()> {
        self.transaction(|tx| tx.insert(entity))
    }

    /// Delete a record (cascading for exercises). Returns the number of
    /// records removed; 0 when the record is already gone.
    pub fn delete<T: Entity>(&mut self, entity: &T) -> Result<usize> {
        self.delete_by_id::<T>(entity.id())
    }

    pub fn delete_by_id<T: Entity>(&mut self, id: Uuid) -> Result<usize> {
        self.transaction(|tx| Ok(tx.delete_by_id::<T>(id)))
    }

    pub fn delete_all<T: Entity>(&mut self) -> Result<usize> {
        self.transaction(|tx| Ok(tx.delete_all::<T>()))
    }

    pub fn update_exercise<F>(&mut self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Exercise),
    {
        self.transaction(|tx| tx.update_exercise(id, f))
    }

    pub fn update_result<F>(&mut self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut ExerciseResult),
    {
        self.transaction(|tx| tx.update_result(id, f))
    }

    /// Delete every exercise (and so every result), then run `seed`, all
    /// in one transaction
    pub fn reset(&mut self, seed: &dyn Seed) -> Result<()> {
        self.transaction(|tx| {
            let removed = tx.delete_all::<Exercise>() + tx.delete_all::<ExerciseResult>();
            tracing::info!("Reset removed {} records", removed);
            seed.seed(tx)
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn fetch<T: Entity>(&self, descriptor: &FetchDescriptor<T>) -> Vec<T> {
        descriptor.apply(T::rows(&self.data).iter())
    }

    pub fn get<T: Entity>(&self, id: Uuid) -> Option<&T> {
        T::rows(&self.data).iter().find(|e| e.id() == id)
    }

    pub fn count<T: Entity>(&self) -> usize {
        T::rows(&self.data).len()
    }

    /// Exercises in natural (insertion) order
    pub fn exercises(&self) -> &[Exercise] {
        &self.data.exercises
    }

    /// Results owned by `exercise_id`, in relation (insertion) order
    pub fn results_for(&self, exercise_id: Uuid) -> Vec<&ExerciseResult> {
        self.data
            .results
            .iter()
            .filter(|r| r.exercise_id == exercise_id)
            .collect()
    }

    /// Snapshot of all visible records
    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    fn publish(&mut self, data: Dataset) -> Result<()> {
        if let Err(e) = self.backend.persist(&data) {
            tracing::error!("Commit failed, keeping previous state: {}", e);
            return Err(match e {
                Error::PersistFailed(_) => e,
                other => Error::PersistFailed(other.to_string()),
            });
        }
        self.data = data;
        Ok(())
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// A pending set of mutations against a private copy of the tables.
///
/// Dropping a transaction without calling `commit` discards it.
pub struct Transaction<'s> {
    store: &'s mut Store,
    working: Dataset,
    committed: bool,
}

impl Transaction<'_> {
    /// Insert a new record. The caller has already assigned its identity.
    pub fn insert<T: Entity>(&mut self, entity: T) -> Result<()> {
        let id = entity.id();
        if T::rows(&self.working).iter().any(|e| e.id() == id) {
            return Err(Error::DuplicateIdentity(id));
        }
        entity.check(&self.working)?;
        T::rows_mut(&mut self.working).push(entity);
        tracing::debug!("Inserted {} {}", T::TABLE, id);
        Ok(())
    }

    /// Remove a record and everything it owns. A missing record is a no-op.
    pub fn delete_by_id<T: Entity>(&mut self, id: Uuid) -> usize {
        let rows = T::rows_mut(&mut self.working);
        let Some(index) = rows.iter().position(|e| e.id() == id) else {
            tracing::debug!("Delete of missing {} {} ignored", T::TABLE, id);
            return 0;
        };
        rows.remove(index);

        let cascaded = T::cascade(id, &mut self.working);
        if cascaded > 0 {
            tracing::debug!("Deleting {} {} cascaded to {} results", T::TABLE, id, cascaded);
        }
        1 + cascaded
    }

    /// Remove every record of a type, cascading to owned records
    pub fn delete_all<T: Entity>(&mut self) -> usize {
        let ids: Vec<Uuid> = T::rows(&self.working).iter().map(|e| e.id()).collect();
        ids.into_iter().map(|id| self.delete_by_id::<T>(id)).sum()
    }

    /// Edit an exercise in place.
    ///
    /// A change of score type reshapes every owned result's measurement so
    /// no result keeps values from the old discipline.
    pub fn update_exercise<F>(&mut self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Exercise),
    {
        let index = self
            .working
            .exercises
            .iter()
            .position(|e| e.id == id)
            .ok_or(Error::NotFound(id))?;

        let mut edited = self.working.exercises[index].clone();
        let previous = edited.score_type;
        f(&mut edited);

        if edited.id != id {
            return Err(Error::InvalidData("exercise identity is immutable".into()));
        }

        let score_type = edited.score_type;
        self.working.exercises[index] = edited;

        if score_type != previous {
            let mut retargeted = 0;
            for result in self.working.results.iter_mut().filter(|r| r.exercise_id == id) {
                result.measurement = result.measurement.clone().retarget(score_type);
                retargeted += 1;
            }
            tracing::debug!(
                "Exercise {} changed from {} to {}, retargeted {} results",
                id,
                previous,
                score_type,
                retargeted
            );
        }
        Ok(())
    }

    /// Edit a result in place. The result must stay attached to an
    /// existing exercise and keep that exercise's discipline.
    pub fn update_result<F>(&mut self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut ExerciseResult),
    {
        let index = self
            .working
            .results
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::NotFound(id))?;

        let mut edited = self.working.results[index].clone();
        f(&mut edited);

        if edited.id != id {
            return Err(Error::InvalidData("result identity is immutable".into()));
        }
        edited.check(&self.working)?;
        self.working.results[index] = edited;
        Ok(())
    }

    pub fn fetch<T: Entity>(&self, descriptor: &FetchDescriptor<T>) -> Vec<T> {
        descriptor.apply(T::rows(&self.working).iter())
    }

    pub fn get<T: Entity>(&self, id: Uuid) -> Option<&T> {
        T::rows(&self.working).iter().find(|e| e.id() == id)
    }

    /// Persist and publish the working copy
    pub fn commit(mut self) -> Result<()> {
        let data = std::mem::take(&mut self.working);
        self.committed = true;
        self.store.publish(data)?;
        tracing::debug!("Committed transaction");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!("Transaction dropped without commit, rolled back");
        }
    }
}
