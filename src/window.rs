use chrono::{Datelike, Utc};

/// A calendar date with no time-of-day component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Closed UTC bounds handed to the commits endpoint as `since`/`until`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub since: String,
    pub until: String,
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

impl CivilDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        CivilDate { year, month, day }
    }

    pub fn today() -> Self {
        let now = Utc::now();
        CivilDate::new(now.year(), now.month(), now.day())
    }

    pub fn previous_day(self) -> Self {
        let CivilDate {
            mut year,
            mut month,
            mut day,
        } = self;
        if day > 1 {
            day -= 1;
        } else {
            if month == 1 {
                year -= 1;
                month = 12;
            } else {
                month -= 1;
            }
            day = last_day_of_month(year, month);
        }
        CivilDate { year, month, day }
    }

    pub fn next_day(self) -> Self {
        let CivilDate {
            mut year,
            mut month,
            mut day,
        } = self;
        if day < last_day_of_month(year, month) {
            day += 1;
        } else {
            day = 1;
            if month == 12 {
                month = 1;
                year += 1;
            } else {
                month += 1;
            }
        }
        CivilDate { year, month, day }
    }

    /// Zero-padded `YYYY-MM-DD`.
    pub fn iso_date(self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

/// Bounds covering a single calendar day.
pub fn day_window(date: CivilDate) -> FetchWindow {
    FetchWindow {
        since: format!("{}T00:00:00Z", date.iso_date()),
        until: format!("{}T23:59:59Z", date.iso_date()),
    }
}

/// Bounds covering a whole calendar month.
pub fn month_window(year: i32, month: u32) -> FetchWindow {
    let first = CivilDate::new(year, month, 1);
    let last = CivilDate::new(year, month, last_day_of_month(year, month));
    FetchWindow {
        since: format!("{}T00:00:00Z", first.iso_date()),
        until: format!("{}T23:59:59Z", last.iso_date()),
    }
}
