use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use habit_core::{CompletionLedger, CompletionState};
use parking_lot::RwLock;
use walkdir::WalkDir;

use crate::record::{assemble_ledgers, CompletionRecord, HabitDocument, HabitRecord};

/// Source of habit records and the exclusive writer of their completion ledgers.
pub trait HabitRepository: Send + Sync {
    fn habits(&self) -> Result<Vec<HabitRecord>>;

    fn ledger(&self, habit_id: &str) -> Result<CompletionLedger>;

    /// Upsert keyed by `(habit_id, date)`. `Unset` deletes the entry.
    fn persist_completion(
        &self,
        habit_id: &str,
        date: NaiveDate,
        state: CompletionState,
    ) -> Result<()>;

    fn reload(&self) -> Result<()> {
        Ok(())
    }

    fn watch_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    documents: RwLock<BTreeMap<String, HabitDocument>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, habit: HabitRecord, completions: CompletionLedger) {
        self.documents.write().insert(
            habit.id.clone(),
            HabitDocument {
                habit,
                completions,
            },
        );
    }

    /// Build from flat habit and completion rows; completions for unknown habits are ignored.
    pub fn from_records<H, C>(habits: H, completions: C) -> Self
    where
        H: IntoIterator<Item = HabitRecord>,
        C: IntoIterator<Item = CompletionRecord>,
    {
        let mut ledgers = assemble_ledgers(completions);
        let repo = Self::new();
        for habit in habits {
            let ledger = ledgers.remove(&habit.id).unwrap_or_default();
            repo.insert(habit, ledger);
        }
        for orphan in ledgers.keys() {
            tracing::debug!(habit = %orphan, "ignoring completions for unknown habit");
        }
        repo
    }
}

impl HabitRepository for InMemoryRepository {
    fn habits(&self) -> Result<Vec<HabitRecord>> {
        Ok(self
            .documents
            .read()
            .values()
            .map(|doc| doc.habit.clone())
            .collect())
    }

    fn ledger(&self, habit_id: &str) -> Result<CompletionLedger> {
        self.documents
            .read()
            .get(habit_id)
            .map(|doc| doc.completions.clone())
            .ok_or_else(|| anyhow!("unknown habit `{habit_id}`"))
    }

    fn persist_completion(
        &self,
        habit_id: &str,
        date: NaiveDate,
        state: CompletionState,
    ) -> Result<()> {
        let mut docs = self.documents.write();
        let doc = docs
            .get_mut(habit_id)
            .ok_or_else(|| anyhow!("unknown habit `{habit_id}`"))?;
        doc.completions.set(date, state);
        Ok(())
    }
}

/// One `*.json` [`HabitDocument`] per habit, discovered recursively under each root.
pub struct JsonDirRepository {
    roots: Vec<PathBuf>,
    documents: RwLock<HashMap<String, (PathBuf, HabitDocument)>>,
}

impl JsonDirRepository {
    pub fn open<I, P>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut unique: Vec<PathBuf> = Vec::new();
        for root in roots {
            let root = root.as_ref().to_path_buf();
            if !unique.contains(&root) {
                unique.push(root);
            }
        }
        let repo = Self {
            roots: unique,
            documents: RwLock::new(HashMap::new()),
        };
        repo.reload()?;
        Ok(repo)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn create_habit(&self, habit: HabitRecord) -> Result<PathBuf> {
        let root = self
            .roots
            .first()
            .ok_or_else(|| anyhow!("no habit root configured"))?;
        fs::create_dir_all(root)
            .with_context(|| format!("creating habit root `{}`", root.display()))?;
        let path = root.join(format!("{}.json", sanitize_file_stem(&habit.id)));
        let mut docs = self.documents.write();
        anyhow::ensure!(
            !docs.contains_key(&habit.id),
            "habit `{}` already exists",
            habit.id
        );
        let taken = docs.values().any(|(existing, _)| *existing == path) || path.exists();
        anyhow::ensure!(
            !taken,
            "habit file `{}` is already in use, cannot store habit `{}`",
            path.display(),
            habit.id
        );
        let doc = HabitDocument::new(habit);
        write_document(&path, &doc)?;
        docs.insert(doc.habit.id.clone(), (path.clone(), doc));
        Ok(path)
    }

    fn ingest_root(
        docs: &mut HashMap<String, (PathBuf, HabitDocument)>,
        root: &Path,
    ) -> Result<()> {
        if root.is_file() {
            if is_json_file(root) {
                Self::ingest_file(docs, root);
            }
            return Ok(());
        }
        if !root.is_dir() {
            tracing::warn!(path = %root.display(), "habit root does not exist");
            return Ok(());
        }
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if entry.file_type().is_file() && is_json_file(entry.path()) {
                Self::ingest_file(docs, entry.path());
            }
        }
        Ok(())
    }

    fn ingest_file(docs: &mut HashMap<String, (PathBuf, HabitDocument)>, path: &Path) {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable habit file");
                return;
            }
        };
        let doc: HabitDocument = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping malformed habit file");
                return;
            }
        };
        if let Some((existing, _)) = docs.get(&doc.habit.id) {
            tracing::warn!(
                habit = %doc.habit.id,
                kept = %existing.display(),
                ignored = %path.display(),
                "duplicate habit id"
            );
            return;
        }
        docs.insert(doc.habit.id.clone(), (path.to_path_buf(), doc));
    }
}

impl HabitRepository for JsonDirRepository {
    fn habits(&self) -> Result<Vec<HabitRecord>> {
        let docs = self.documents.read();
        let mut habits: Vec<HabitRecord> = docs.values().map(|(_, doc)| doc.habit.clone()).collect();
        habits.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(habits)
    }

    fn ledger(&self, habit_id: &str) -> Result<CompletionLedger> {
        self.documents
            .read()
            .get(habit_id)
            .map(|(_, doc)| doc.completions.clone())
            .ok_or_else(|| anyhow!("unknown habit `{habit_id}`"))
    }

    fn persist_completion(
        &self,
        habit_id: &str,
        date: NaiveDate,
        state: CompletionState,
    ) -> Result<()> {
        let mut docs = self.documents.write();
        let (path, doc) = docs
            .get_mut(habit_id)
            .ok_or_else(|| anyhow!("unknown habit `{habit_id}`"))?;
        let mut updated = doc.clone();
        if !updated.completions.set(date, state) {
            return Ok(());
        }
        write_document(path, &updated)?;
        std::mem::swap(doc, &mut updated);
        tracing::info!(habit = %habit_id, %date, ?state, path = %path.display(), "persisted completion");
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        let mut fresh = HashMap::new();
        for root in &self.roots {
            Self::ingest_root(&mut fresh, root)?;
        }
        tracing::debug!(habits = fresh.len(), "loaded habit files");
        *self.documents.write() = fresh;
        Ok(())
    }

    fn watch_paths(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}

fn write_document(path: &Path, doc: &HabitDocument) -> Result<()> {
    let payload = serde_json::to_string_pretty(doc)?;
    fs::write(path, payload).with_context(|| format!("writing habit file `{}`", path.display()))
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn sanitize_file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
