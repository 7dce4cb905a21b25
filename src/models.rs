use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayStatus {
    #[default]
    None,
    Check,
    Exclamation,
    Cross,
    Study,
}

impl DayStatus {
    pub const ALL: [DayStatus; 5] = [
        Self::None,
        Self::Check,
        Self::Exclamation,
        Self::Cross,
        Self::Study,
    ];

    /// Successor on tap.
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::Check,
            Self::Check => Self::Exclamation,
            Self::Exclamation => Self::Cross,
            Self::Cross => Self::Study,
            Self::Study => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Check => "CHECK",
            Self::Exclamation => "EXCLAMATION",
            Self::Cross => "CROSS",
            Self::Study => "STUDY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NONE" => Some(Self::None),
            "CHECK" => Some(Self::Check),
            "EXCLAMATION" => Some(Self::Exclamation),
            "CROSS" => Some(Self::Cross),
            "STUDY" => Some(Self::Study),
            _ => None,
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub status: DayStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub label: String,
    pub date: Option<NaiveDate>,
    pub status: DayStatus,
    pub has_notes: bool,
}

impl DayCell {
    pub fn padding() -> Self {
        Self {
            label: String::new(),
            date: None,
            status: DayStatus::None,
            has_notes: false,
        }
    }

    pub fn is_padding(&self) -> bool {
        self.date.is_none()
    }
}

/// A calendar month, held as its first day so ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey {
    first: NaiveDate,
}

impl MonthKey {
    /// `month` is one-based.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date - chrono::Duration::days(i64::from(date.day0())),
        }
    }

    pub fn year(self) -> i32 {
        self.first.year()
    }

    pub fn month(self) -> u32 {
        self.first.month()
    }

    pub fn first_day(self) -> NaiveDate {
        self.first
    }

    pub fn last_day(self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            // Only December of the last representable year has no successor month.
            .unwrap_or_else(|| self.first.with_day(31).unwrap_or(self.first))
    }

    pub fn days_in_month(self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        Self::containing(date) == self
    }

    pub fn previous(self) -> Option<Self> {
        self.first
            .checked_sub_months(Months::new(1))
            .map(|first| Self { first })
    }

    pub fn tone(self, today: NaiveDate) -> MonthTone {
        let current = Self::containing(today);
        match self.cmp(&current) {
            std::cmp::Ordering::Less => MonthTone::Past,
            std::cmp::Ordering::Equal => MonthTone::Current,
            std::cmp::Ordering::Greater => MonthTone::Future,
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonthTone {
    Past,
    Current,
    Future,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub month: MonthKey,
    pub cells: Vec<DayCell>,
}

impl MonthGrid {
    pub fn padding_len(&self) -> usize {
        self.cells.iter().take_while(|cell| cell.is_padding()).count()
    }

    pub fn cell_for(&self, date: NaiveDate) -> Option<&DayCell> {
        self.cells.iter().find(|cell| cell.date == Some(date))
    }

    pub fn is_today(cell: &DayCell, today: NaiveDate) -> bool {
        cell.date == Some(today)
    }
}

/// Published by the database after every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Status { date: NaiveDate },
    Note { date: NaiveDate },
}

impl StoreChange {
    pub fn date(self) -> NaiveDate {
        match self {
            Self::Status { date } | Self::Note { date } => date,
        }
    }
}

/// What a long-press on a day leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LongPress {
    ShowNotes { date: NaiveDate, notes: Vec<NoteRecord> },
    PromptNewNote { date: NaiveDate },
}

#[cfg(test)]
mod tests {
    use super::{DayStatus, MonthKey, MonthTone};
    use chrono::NaiveDate;

    #[test]
    fn cycle_returns_to_start_after_five_taps() {
        for start in DayStatus::ALL {
            let mut status = start;
            for _ in 0..5 {
                status = status.next();
            }
            assert_eq!(status, start);
        }
    }

    #[test]
    fn cycle_visits_every_status_once() {
        let mut seen = Vec::new();
        let mut status = DayStatus::None;
        for _ in 0..5 {
            seen.push(status);
            status = status.next();
        }
        assert_eq!(seen, DayStatus::ALL.to_vec());
    }

    #[test]
    fn status_names_parse_back() {
        for status in DayStatus::ALL {
            assert_eq!(DayStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DayStatus::parse("X"), None);
    }

    #[test]
    fn month_key_handles_leap_february() {
        assert_eq!(MonthKey::new(2024, 2).expect("month").days_in_month(), 29);
        assert_eq!(MonthKey::new(2023, 2).expect("month").days_in_month(), 28);
        assert_eq!(MonthKey::new(1900, 2).expect("month").days_in_month(), 28);
        assert_eq!(MonthKey::new(2000, 2).expect("month").days_in_month(), 29);
        assert_eq!(MonthKey::new(2024, 12).expect("month").days_in_month(), 31);
        assert_eq!(MonthKey::new(2024, 11).expect("month").days_in_month(), 30);
        let april = MonthKey::new(2024, 4).expect("month");
        assert_eq!(april.last_day(), NaiveDate::from_ymd_opt(2024, 4, 30).expect("date"));
        assert!(MonthKey::new(2024, 13).is_none());
    }

    #[test]
    fn month_key_orders_and_steps_back_across_years() {
        let jan = MonthKey::new(2024, 1).expect("month");
        let dec = jan.previous().expect("previous");
        assert_eq!(dec, MonthKey::new(2023, 12).expect("month"));
        assert!(dec < jan);
        assert_eq!(jan.to_string(), "2024-01");
    }

    #[test]
    fn tone_classifies_relative_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("date");
        assert_eq!(MonthKey::new(2024, 5).expect("month").tone(today), MonthTone::Past);
        assert_eq!(MonthKey::new(2024, 6).expect("month").tone(today), MonthTone::Current);
        assert_eq!(MonthKey::new(2025, 1).expect("month").tone(today), MonthTone::Future);
    }
}
