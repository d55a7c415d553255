pub mod record;
pub mod repository;
pub mod service;

pub use crate::record::{CompletionRecord, HabitDocument, HabitRecord, StartDateSource};
pub use crate::repository::{HabitRepository, InMemoryRepository, JsonDirRepository};
pub use crate::service::{HabitService, HabitServiceBuilder, HabitSnapshot, HabitSummary};
