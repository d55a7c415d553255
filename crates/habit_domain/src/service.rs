use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Weekday};
use habit_core::{
    classify,
    day_state::classify_range,
    stats::{aggregate_by_day, DayProgress},
    CompletionLedger, CompletionState, DayClassification, DayRange, Habit, Progress, StatsWindow,
    StepRecord, StreakStats,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::record::{HabitRecord, StartDateSource};
use crate::repository::{HabitRepository, InMemoryRepository, JsonDirRepository};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HabitSummary {
    pub id: String,
    pub title: String,
    pub stats: StreakStats,
    pub today: DayClassification,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HabitSnapshot {
    pub today: NaiveDate,
    pub habits: Vec<HabitSummary>,
    pub day: Progress,
    pub week: Progress,
    pub week_days: Vec<DayProgress>,
}

pub struct HabitService {
    repository: Arc<dyn HabitRepository>,
    start_date_source: StartDateSource,
    week_start: Weekday,
    watcher: Option<RecommendedWatcher>,
}

pub struct HabitServiceBuilder {
    roots: Vec<PathBuf>,
    repository: Option<Arc<dyn HabitRepository>>,
    start_date_source: StartDateSource,
    week_start: Weekday,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            repository: None,
            start_date_source: StartDateSource::default(),
            week_start: Weekday::Mon,
        }
    }

    pub fn add_root(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn HabitRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn start_dates_from(mut self, source: StartDateSource) -> Self {
        self.start_date_source = source;
        self
    }

    pub fn week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn build(self) -> Result<HabitService> {
        let repository: Arc<dyn HabitRepository> = match self.repository {
            Some(repository) => {
                anyhow::ensure!(
                    self.roots.is_empty(),
                    "habit roots cannot be combined with a custom repository"
                );
                repository
            }
            None if self.roots.is_empty() => Arc::new(InMemoryRepository::new()),
            None => Arc::new(JsonDirRepository::open(&self.roots)?),
        };
        tracing::info!(
            roots = self.roots.len(),
            start_dates = ?self.start_date_source,
            week_start = %self.week_start,
            "habit service ready"
        );
        Ok(HabitService {
            repository,
            start_date_source: self.start_date_source,
            week_start: self.week_start,
            watcher: None,
        })
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn start_date_source(&self) -> StartDateSource {
        self.start_date_source
    }

    pub fn habits(&self) -> Result<Vec<Habit>> {
        Ok(self
            .repository
            .habits()?
            .iter()
            .map(|record| record.to_habit(self.start_date_source))
            .collect())
    }

    pub fn habit(&self, habit_id: &str) -> Result<(Habit, CompletionLedger)> {
        let (_, habit, ledger) = self.entry(habit_id)?;
        Ok((habit, ledger))
    }

    #[instrument(skip(self))]
    pub fn stats(&self, habit_id: &str, today: NaiveDate) -> Result<StreakStats> {
        let (habit, ledger) = self.habit(habit_id)?;
        Ok(habit_core::compute_stats(&habit, &ledger, today))
    }

    pub fn calendar(
        &self,
        habit_id: &str,
        range: DayRange,
        today: NaiveDate,
    ) -> Result<Vec<DayClassification>> {
        let (habit, ledger) = self.habit(habit_id)?;
        Ok(classify_range(&habit, &ledger, range, today))
    }

    /// Apply a click on `date`. Returns the written state, or `None` for days that do not accept toggles.
    #[instrument(skip(self))]
    pub fn toggle(
        &self,
        habit_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Option<CompletionState>> {
        let (habit, ledger) = self.habit(habit_id)?;
        let day = classify(&habit, &ledger, date, today);
        let Some(target) = day.toggle_target() else {
            tracing::debug!(state = ?day.state, "day does not accept toggles");
            return Ok(None);
        };
        self.record_completion(habit_id, date, target)?;
        Ok(Some(target))
    }

    #[instrument(skip(self))]
    pub fn record_completion(
        &self,
        habit_id: &str,
        date: NaiveDate,
        state: CompletionState,
    ) -> Result<bool> {
        let mut ledger = self.repository.ledger(habit_id)?;
        if !ledger.set(date, state) {
            return Ok(false);
        }
        self.repository.persist_completion(habit_id, date, state)?;
        Ok(true)
    }

    pub fn dashboard(&self, window: StatsWindow, steps: &[StepRecord]) -> Result<Progress> {
        Ok(habit_core::aggregate(&self.evaluated()?, steps, window))
    }

    pub fn dashboard_by_day(
        &self,
        window: StatsWindow,
        steps: &[StepRecord],
    ) -> Result<Vec<DayProgress>> {
        Ok(aggregate_by_day(&self.evaluated()?, steps, window))
    }

    #[instrument(skip(self, steps))]
    pub fn snapshot(&self, today: NaiveDate, steps: &[StepRecord]) -> Result<HabitSnapshot> {
        let entries = self.entries()?;
        let habits = entries
            .iter()
            .map(|(record, habit, ledger)| HabitSummary {
                id: record.id.clone(),
                title: record.title.clone(),
                stats: habit_core::compute_stats(habit, ledger, today),
                today: classify(habit, ledger, today, today),
            })
            .collect();
        let evaluated: Vec<(Habit, CompletionLedger)> = entries
            .into_iter()
            .map(|(_, habit, ledger)| (habit, ledger))
            .collect();
        let week_days =
            aggregate_by_day(&evaluated, steps, StatsWindow::week_of(today, self.week_start));
        let week = week_days
            .iter()
            .fold(Progress::default(), |acc, day| acc + day.combined);
        let day = week_days
            .iter()
            .find(|day| day.date == today)
            .map(|day| day.combined)
            .unwrap_or_default();
        Ok(HabitSnapshot {
            today,
            habits,
            day,
            week,
            week_days,
        })
    }

    pub fn reload(&self) -> Result<()> {
        self.repository.reload()
    }

    /// Reload the repository whenever its backing files change. Each completed
    /// reload is signalled on the returned channel.
    pub fn watch(&mut self) -> Result<Receiver<()>> {
        anyhow::ensure!(self.watcher.is_none(), "habit service is already watching");
        let (tx, rx) = mpsc::channel();
        let repository = Arc::clone(&self.repository);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(%err, "habit watcher error");
                    return;
                }
            };
            if event.kind.is_access() || event.kind.is_other() {
                return;
            }
            tracing::debug!(?event, "habit data changed on disk");
            match repository.reload() {
                Ok(()) => {
                    let _ = tx.send(());
                }
                Err(err) => tracing::warn!(%err, "reloading habits after change failed"),
            }
        })?;
        for path in self.repository.watch_paths() {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&path, mode)?;
        }
        self.watcher = Some(watcher);
        Ok(rx)
    }
}

impl HabitService {
    fn entry(&self, habit_id: &str) -> Result<(HabitRecord, Habit, CompletionLedger)> {
        let record = self
            .repository
            .habits()?
            .into_iter()
            .find(|record| record.id == habit_id)
            .ok_or_else(|| anyhow!("unknown habit `{habit_id}`"))?;
        let ledger = self.repository.ledger(habit_id)?;
        let habit = record.to_habit(self.start_date_source);
        Ok((record, habit, ledger))
    }

    fn entries(&self) -> Result<Vec<(HabitRecord, Habit, CompletionLedger)>> {
        self.repository
            .habits()?
            .into_iter()
            .map(|record| {
                let ledger = self.repository.ledger(&record.id)?;
                let habit = record.to_habit(self.start_date_source);
                Ok((record, habit, ledger))
            })
            .collect()
    }

    fn evaluated(&self) -> Result<Vec<(Habit, CompletionLedger)>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|(_, habit, ledger)| (habit, ledger))
            .collect())
    }
}
