use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, NaiveDate, Weekday};
use habit_core::{calendar::require_iso_date, schedule::parse_weekday, DayState, TodayState};
use habit_domain::{HabitService, HabitSnapshot, StartDateSource};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) roots: Vec<PathBuf>,
    pub(crate) start_date_source: StartDateSource,
    pub(crate) week_start: Weekday,
    pub(crate) today: Option<NaiveDate>,
    pub(crate) json_output: bool,
    pub(crate) watch: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            start_date_source: StartDateSource::HabitCreation,
            week_start: Weekday::Mon,
            today: None,
            json_output: false,
            watch: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Invalid values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(root) = lookup("HABIT_ROOT") {
            config.push_root(PathBuf::from(root));
        }
        if let Some(list) = lookup("HABIT_ROOTS") {
            for path in std::env::split_paths(&list) {
                config.push_root(path);
            }
        }
        let account_created = lookup("HABIT_ACCOUNT_CREATED").and_then(|raw| {
            require_iso_date(&raw)
                .map_err(|err| warn!(%err, "ignoring HABIT_ACCOUNT_CREATED"))
                .ok()
        });
        if let Some(source) = lookup("HABIT_START_DATE_SOURCE") {
            match (source.trim().to_ascii_lowercase().as_str(), account_created) {
                ("habit", _) => config.start_date_source = StartDateSource::HabitCreation,
                ("account", Some(date)) => {
                    config.start_date_source = StartDateSource::AccountCreation(date)
                }
                ("account", None) => {
                    warn!("HABIT_START_DATE_SOURCE=account requires HABIT_ACCOUNT_CREATED")
                }
                (other, _) => warn!(value = other, "unknown HABIT_START_DATE_SOURCE"),
            }
        }
        if let Some(raw) = lookup("HABIT_WEEK_START") {
            match parse_weekday(&raw) {
                Ok(day) => config.week_start = day,
                Err(err) => warn!(%err, "ignoring HABIT_WEEK_START"),
            }
        }
        if let Some(raw) = lookup("HABIT_TODAY") {
            match require_iso_date(&raw) {
                Ok(date) => config.today = Some(date),
                Err(err) => warn!(%err, "ignoring HABIT_TODAY"),
            }
        }
        if let Some(raw) = lookup("HABIT_OUTPUT") {
            config.json_output = raw.trim().eq_ignore_ascii_case("json");
        }
        if let Some(raw) = lookup("HABIT_WATCH") {
            config.watch = matches!(raw.trim(), "1" | "true" | "yes");
        }
        Ok(config)
    }

    pub(crate) fn push_root(&mut self, path: PathBuf) {
        if !self.roots.contains(&path) {
            info!(path = %path.display(), "registering habit root");
            self.roots.push(path);
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    anyhow::ensure!(
        !config.roots.is_empty(),
        "no habit roots configured; set HABIT_ROOT or HABIT_ROOTS"
    );
    let mut builder = HabitService::builder()
        .start_dates_from(config.start_date_source)
        .week_start(config.week_start);
    for root in &config.roots {
        builder = builder.add_root(root);
    }
    let mut service = builder.build()?;
    print_snapshot(&service, &config)?;
    if config.watch {
        let changes = service.watch()?;
        info!("watching habit roots for changes");
        for () in changes {
            print_snapshot(&service, &config)?;
        }
    }
    Ok(())
}

fn print_snapshot(service: &HabitService, config: &AppConfig) -> Result<()> {
    let snapshot = service.snapshot(config.today(), &[])?;
    if config.json_output {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for line in render_snapshot(&snapshot) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn render_snapshot(snapshot: &HabitSnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "Habits for {}",
        snapshot.today.format("%Y-%m-%d (%a)")
    )];
    let width = snapshot
        .habits
        .iter()
        .map(|summary| summary.title.chars().count())
        .max()
        .unwrap_or(0);
    for summary in &snapshot.habits {
        let stats = &summary.stats;
        lines.push(format!(
            "[{}] {:<width$}  streak {} (best {})  done {}  missed {}",
            marker(summary.today.state),
            summary.title,
            stats.current_streak,
            stats.longest_streak,
            stats.total_completed,
            stats.total_missed,
        ));
    }
    lines.push(format!(
        "Today: {}/{} ({}%)",
        snapshot.day.completed, snapshot.day.total, snapshot.day.progress_percent
    ));
    lines.push(format!(
        "Week:  {}/{} ({}%)",
        snapshot.week.completed, snapshot.week.total, snapshot.week.progress_percent
    ));
    lines
}

fn marker(state: DayState) -> char {
    match state {
        DayState::Completed => 'x',
        DayState::Missed => '-',
        DayState::Today(TodayState::Planned) | DayState::Planned => ' ',
        DayState::Today(TodayState::NotScheduled) | DayState::NotScheduled => '~',
        DayState::Inactive => '.',
    }
}
