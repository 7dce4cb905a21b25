//! Month grid construction and initial month discovery. Nothing here touches
//! storage.

use crate::models::{DayCell, DayRecord, DayStatus, MonthGrid, MonthKey};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashMap};

/// Lays out one month for a 7-column grid with weeks starting on Sunday.
///
/// Leading padding cells fill the slots before the first of the month. The
/// trailing row is left short; filling it is the renderer's concern.
/// Records and note dates outside `month` are ignored.
pub fn build_month_grid(
    month: MonthKey,
    records: &[DayRecord],
    note_dates: &BTreeSet<NaiveDate>,
) -> MonthGrid {
    let statuses: HashMap<NaiveDate, DayStatus> = records
        .iter()
        .filter(|record| month.contains(record.date))
        .map(|record| (record.date, record.status))
        .collect();

    let padding = month.first_day().weekday().num_days_from_sunday() as usize;
    let days = month.days_in_month();
    let mut cells = Vec::with_capacity(padding + days as usize);
    cells.extend(std::iter::repeat_with(DayCell::padding).take(padding));

    for date in month.first_day().iter_days().take(days as usize) {
        cells.push(DayCell {
            label: date.day().to_string(),
            date: Some(date),
            status: statuses.get(&date).copied().unwrap_or_default(),
            has_notes: note_dates.contains(&date),
        });
    }

    MonthGrid { month, cells }
}

/// Months to show on first load: the `window` most recent months ending at
/// the month of `today`, plus every month holding data. Newest first.
pub fn discover_months(
    today: NaiveDate,
    window: u32,
    data_dates: impl IntoIterator<Item = NaiveDate>,
) -> Vec<MonthKey> {
    let mut months = BTreeSet::new();

    let mut cursor = Some(MonthKey::containing(today));
    for _ in 0..window {
        let Some(month) = cursor else {
            break;
        };
        months.insert(month);
        cursor = month.previous();
    }

    months.extend(data_dates.into_iter().map(MonthKey::containing));
    months.into_iter().rev().collect()
}
