use crate::calendar::{build_month_grid, discover_months};
use crate::config::JournalConfig;
use crate::db::Database;
use crate::errors::{ErrorReport, JournalError, JournalResult};
use crate::models::{DayRecord, DayStatus, LongPress, MonthGrid, MonthKey, NoteRecord};
use crate::subscription::{MonthSubscription, SubscriptionManager};
use crate::surface::{Confirm, NotePrompt};
use chrono::NaiveDate;
use std::sync::Arc;

/// Handle to an open journal. Cheap to clone; every clone shares the same
/// database and subscription registry.
///
/// All storage access runs on tokio's blocking pool, so the async caller
/// (the interaction loop) is never stalled by SQLite.
#[derive(Debug, Clone)]
pub struct Journal {
    db: Arc<Database>,
    config: Arc<JournalConfig>,
    subscriptions: SubscriptionManager,
}

impl Journal {
    pub fn open(config: JournalConfig) -> JournalResult<Self> {
        let db = Database::new(&config.database_path())?;
        Ok(Self::with_database(Arc::new(db), config))
    }

    pub fn with_database(db: Arc<Database>, config: JournalConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
            subscriptions: SubscriptionManager::new(),
        }
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub async fn tap_day(&self, date: NaiveDate) -> JournalResult<DayStatus> {
        let next = run_blocking(&self.db, move |db| db.cycle_status(date)).await?;
        tracing::info!(%date, status = next.as_str(), "day tapped");
        Ok(next)
    }

    pub async fn set_status(&self, date: NaiveDate, status: DayStatus) -> JournalResult<()> {
        run_blocking(&self.db, move |db| db.upsert_status(date, status)).await
    }

    pub async fn status(&self, date: NaiveDate) -> JournalResult<DayStatus> {
        run_blocking(&self.db, move |db| db.get_status(date)).await
    }

    pub async fn statuses_in_range(&self, start: NaiveDate, end: NaiveDate) -> JournalResult<Vec<DayRecord>> {
        run_blocking(&self.db, move |db| db.statuses_in_range(start, end)).await
    }

    pub async fn all_statuses(&self) -> JournalResult<Vec<DayRecord>> {
        run_blocking(&self.db, |db| db.all_statuses()).await
    }

    pub async fn add_note(&self, date: NaiveDate, text: &str) -> JournalResult<i64> {
        let text = text.to_string();
        run_blocking(&self.db, move |db| db.add_note(date, &text)).await
    }

    pub async fn delete_note(&self, id: i64) -> JournalResult<bool> {
        run_blocking(&self.db, move |db| db.delete_note(id)).await
    }

    pub async fn notes_for_date(&self, date: NaiveDate) -> JournalResult<Vec<NoteRecord>> {
        run_blocking(&self.db, move |db| db.notes_for_date(date)).await
    }

    pub async fn all_notes(&self) -> JournalResult<Vec<NoteRecord>> {
        run_blocking(&self.db, |db| db.all_notes()).await
    }

    /// Bulk note listing for display. On failure the report keeps the raw
    /// storage error so the user can copy it out.
    pub async fn load_all_notes(&self) -> Result<Vec<NoteRecord>, ErrorReport> {
        self.all_notes().await.map_err(|error| {
            tracing::warn!(error = %error, "loading all notes failed");
            ErrorReport::new("Error loading notes", &error)
        })
    }

    pub async fn month_grid(&self, month: MonthKey) -> JournalResult<MonthGrid> {
        run_blocking(&self.db, move |db| read_month_grid(db, month)).await
    }

    /// Months to render on first load, newest first.
    pub async fn initial_months(&self, today: NaiveDate) -> JournalResult<Vec<MonthKey>> {
        let window = self.config.trailing_window_months;
        run_blocking(&self.db, move |db| {
            let status_dates = db.all_statuses()?.into_iter().map(|record| record.date);
            let note_dates = db.all_notes()?.into_iter().map(|note| note.date);
            Ok(discover_months(today, window, status_dates.chain(note_dates)))
        })
        .await
    }

    /// Must be called from within a tokio runtime.
    pub fn watch_month(&self, month: MonthKey) -> JournalResult<MonthSubscription> {
        self.subscriptions.open(self.db.clone(), month)
    }

    pub fn active_subscriptions(&self) -> JournalResult<usize> {
        self.subscriptions.active_count()
    }

    pub fn close_all_subscriptions(&self) -> JournalResult<()> {
        self.subscriptions.close_all()
    }

    pub async fn long_press(&self, date: NaiveDate) -> JournalResult<LongPress> {
        let notes = self.notes_for_date(date).await?;
        if notes.is_empty() {
            Ok(LongPress::PromptNewNote { date })
        } else {
            Ok(LongPress::ShowNotes { date, notes })
        }
    }

    /// Blank input is re-prompted with the validation message.
    pub async fn prompt_note(&self, date: NaiveDate, prompt: &mut impl NotePrompt) -> JournalResult<Option<i64>> {
        let mut last_error: Option<String> = None;
        loop {
            let Some(text) = prompt.request_text(date, last_error.as_deref()) else {
                return Ok(None);
            };
            match self.add_note(date, &text).await {
                Ok(id) => return Ok(Some(id)),
                Err(JournalError::Validation(message)) => last_error = Some(message),
                Err(error) => return Err(error),
            }
        }
    }

    pub async fn add_note_for_today(&self, today: NaiveDate, prompt: &mut impl NotePrompt) -> JournalResult<Option<i64>> {
        self.prompt_note(today, prompt).await
    }

    pub async fn confirm_delete_note(&self, id: i64, confirm: &mut impl Confirm) -> JournalResult<bool> {
        if !confirm.confirm("Delete note", "Are you sure you want to delete this note?") {
            return Ok(false);
        }
        self.delete_note(id).await?;
        Ok(true)
    }
}

pub(crate) fn read_month_grid(db: &Database, month: MonthKey) -> JournalResult<MonthGrid> {
    let records = db.statuses_in_range(month.first_day(), month.last_day())?;
    let note_dates = db.note_dates_in_range(month.first_day(), month.last_day())?;
    Ok(build_month_grid(month, &records, &note_dates))
}

pub(crate) async fn run_blocking<T, F>(db: &Arc<Database>, work: F) -> JournalResult<T>
where
    F: FnOnce(&Database) -> JournalResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || work(&db)).await?
}

#[cfg(test)]
mod tests {
    use super::Journal;
    use crate::config::JournalConfig;
    use crate::models::{DayStatus, MonthKey};
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, d).expect("valid date")
    }

    fn open(dir: &tempfile::TempDir) -> Journal {
        let config = JournalConfig::load_from(dir.path()).expect("config");
        Journal::open(config).expect("journal")
    }

    #[tokio::test]
    async fn tapping_cycles_through_every_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(&dir);
        let date = day(2024, 3, 3);

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(journal.tap_day(date).await.expect("tap"));
        }
        assert_eq!(
            seen,
            vec![
                DayStatus::Check,
                DayStatus::Exclamation,
                DayStatus::Cross,
                DayStatus::Study,
                DayStatus::None
            ]
        );
        assert!(journal.all_statuses().await.expect("all").is_empty());
    }

    #[tokio::test]
    async fn month_grid_reflects_stored_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(&dir);
        journal.set_status(day(2024, 1, 10), DayStatus::Study).await.expect("set");
        journal.add_note(day(2024, 1, 11), "dentist").await.expect("note");

        let grid = journal.month_grid(MonthKey::new(2024, 1).expect("month")).await.expect("grid");
        assert_eq!(grid.cells.len(), 32);
        assert_eq!(grid.cell_for(day(2024, 1, 10)).expect("cell").status, DayStatus::Study);
        assert!(grid.cell_for(day(2024, 1, 11)).expect("cell").has_notes);
    }

    #[tokio::test]
    async fn initial_months_include_old_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(&dir);
        journal.set_status(day(2022, 3, 1), DayStatus::Check).await.expect("set");
        journal.add_note(day(2022, 3, 15), "old").await.expect("note");

        let months = journal.initial_months(day(2024, 6, 1)).await.expect("months");
        let expected: Vec<MonthKey> = [(2024, 6), (2024, 5), (2024, 4), (2024, 3), (2022, 3)]
            .into_iter()
            .map(|(year, month)| MonthKey::new(year, month).expect("month"))
            .collect();
        assert_eq!(months, expected);
    }
}
