//! Calendar and fiscal period helpers.
//!
//! The fiscal year runs from July 1 to June 30 and is labelled by the
//! calendar year it starts in, e.g. `FY 2024-25`. Fiscal quarters are
//! numbered from July: Jul–Sep is Q1 and Apr–Jun is Q4.

use std::{collections::HashMap, fmt, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::Error;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Fiscal quarter for each calendar month, January first.
const FISCAL_QUARTERS: [u8; 12] = [3, 3, 3, 4, 4, 4, 1, 1, 1, 2, 2, 2];

/// A calendar month, displayed as `YYYY-MM`.
///
/// Month keys order chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    year: i32,
    month: u8,
}

impl MonthKey {
    /// Create a month key, returning `None` if `month` is not in `1..=12`.
    pub fn new(year: i32, month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The calendar month, 1 for January through 12 for December.
    pub fn month(&self) -> u8 {
        self.month
    }

    /// The fiscal year this month belongs to.
    pub fn fiscal_year(&self) -> FiscalYear {
        if self.month >= 7 {
            FiscalYear::new(self.year)
        } else {
            FiscalYear::new(self.year - 1)
        }
    }

    /// A short human readable label, e.g. "Jul 2024".
    pub fn pretty(&self) -> String {
        format!(
            "{} {}",
            MONTH_ABBREVIATIONS[usize::from(self.month - 1)],
            self.year
        )
    }
}

impl From<Date> for MonthKey {
    fn from(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMonthKey(text.to_owned());

        let (year, month) = text.trim().split_once('-').ok_or_else(invalid)?;

        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }

        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;

        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

/// A fiscal year running from July 1 of `start_year` to June 30 of the next year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalYear {
    start_year: i32,
}

impl FiscalYear {
    /// The fiscal year starting in July of `start_year`.
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    /// The fiscal year that contains `date`.
    pub fn containing(date: Date) -> Self {
        MonthKey::from(date).fiscal_year()
    }

    /// The fiscal year immediately before this one.
    pub fn previous(&self) -> Self {
        Self::new(self.start_year - 1)
    }

    /// The twelve months of the fiscal year, July through June.
    pub fn months(&self) -> Vec<MonthKey> {
        (7..=12)
            .map(|month| MonthKey {
                year: self.start_year,
                month,
            })
            .chain((1..=6).map(|month| MonthKey {
                year: self.start_year + 1,
                month,
            }))
            .collect()
    }

    /// The dates from July 1 to June 30 inclusive.
    ///
    /// Returns `None` if either end falls outside the supported calendar.
    pub fn date_range(&self) -> Option<RangeInclusive<Date>> {
        let start = Date::from_calendar_date(self.start_year, Month::July, 1).ok()?;
        let end = Date::from_calendar_date(self.start_year + 1, Month::June, 30).ok()?;

        Some(start..=end)
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FY {}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }
}

impl FromStr for FiscalYear {
    type Err = Error;

    /// Parses labels like "FY 2024-25". Only the start year is significant.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidFiscalYear(text.to_owned());

        let rest = text.trim().strip_prefix("FY").ok_or_else(invalid)?;
        if !rest.starts_with(char::is_whitespace) {
            return Err(invalid());
        }

        let (start, suffix) = rest.trim_start().split_once('-').ok_or_else(invalid)?;

        let is_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|byte| byte.is_ascii_digit())
        };

        if !is_digits(start, 4) || !is_digits(suffix, 2) {
            return Err(invalid());
        }

        start.parse().map(FiscalYear::new).map_err(|_| invalid())
    }
}

/// The fiscal quarter (1 to 4) for a calendar month (1 to 12).
///
/// # Panics
/// Panics if `month` is not in `1..=12`.
pub fn fiscal_quarter(month: u8) -> u8 {
    FISCAL_QUARTERS[usize::from(month - 1)]
}

/// A quarter of a fiscal year, displayed as e.g. "FY 2024-25 Q1".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalQuarter {
    fiscal_year: FiscalYear,
    quarter: u8,
}

impl From<MonthKey> for FiscalQuarter {
    fn from(month: MonthKey) -> Self {
        Self {
            fiscal_year: month.fiscal_year(),
            quarter: fiscal_quarter(month.month),
        }
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.fiscal_year, self.quarter)
    }
}

const ISO_DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

const GENERIC_DATE_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]/[month]/[day]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
    format_description!(
        "[month repr:long case_sensitive:false] [day padding:none], [year]"
    ),
    format_description!(
        "[month repr:short case_sensitive:false] [day padding:none], [year]"
    ),
    format_description!("[month repr:short case_sensitive:false] [day padding:none] [year]"),
    format_description!("[day padding:none] [month repr:long case_sensitive:false] [year]"),
    format_description!("[day padding:none] [month repr:short case_sensitive:false] [year]"),
];

const GENERIC_DATE_TIME_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

/// Parse a date written in one of the loosely structured formats found in
/// the sales sheet.
///
/// Tries, in order:
/// 1. ISO `YYYY-MM-DD`,
/// 2. a set of common date and date-time layouts (`2024/07/15`, `7/15/2024`,
///    `July 15, 2024`, `15 Jul 2024`, RFC 3339, ...),
/// 3. `D-Month-YY` or `D-Month-YYYY`, where the month is a name (only the
///    first three letters count) or a number and a two digit year means 20YY.
///
/// Returns `None` if no format matches or the date does not exist.
pub fn parse_loose_date(text: &str) -> Option<Date> {
    let text = text.trim();

    if text.is_empty() {
        return None;
    }

    if is_iso_date(text) {
        return Date::parse(text, ISO_DATE_FORMAT).ok();
    }

    parse_generic_date(text).or_else(|| parse_day_month_year(text))
}

fn is_iso_date(text: &str) -> bool {
    let bytes = text.as_bytes();

    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn parse_generic_date(text: &str) -> Option<Date> {
    if let Ok(date_time) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(date_time.date());
    }

    GENERIC_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(text, format).ok())
        .map(|date_time| date_time.date())
        .or_else(|| {
            GENERIC_DATE_FORMATS
                .iter()
                .find_map(|format| Date::parse(text, format).ok())
        })
}

fn parse_day_month_year(text: &str) -> Option<Date> {
    let mut parts = text.split(['-', '/']);
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);

    if parts.next().is_some() {
        return None;
    }

    if day.is_empty() || day.len() > 2 || !day.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    if !(2..=4).contains(&year.len()) || !year.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let day: u8 = day.parse().ok()?;
    let year: i32 = match year.parse::<i32>().ok()? {
        short_year if year.len() == 2 => 2000 + short_year,
        full_year => full_year,
    };

    Date::from_calendar_date(year, parse_month(month)?, day).ok()
}

fn parse_month(text: &str) -> Option<Month> {
    if !text.is_empty() && text.len() <= 2 && text.bytes().all(|byte| byte.is_ascii_digit()) {
        return text.parse::<u8>().ok().and_then(|month| Month::try_from(month).ok());
    }

    if text.len() < 3 || !text.chars().all(char::is_alphabetic) {
        return None;
    }

    let prefix = text.get(..3)?.to_ascii_lowercase();

    MONTH_ABBREVIATIONS
        .iter()
        .position(|abbreviation| abbreviation.to_ascii_lowercase() == prefix)
        .and_then(|index| Month::try_from(index as u8 + 1).ok())
}

/// Memoizes [parse_loose_date] for one batch of rows.
///
/// The cache lives as long as the parser.
#[derive(Debug, Default)]
pub struct DateParser {
    cache: HashMap<String, Option<Date>>,
}

impl DateParser {
    /// Create a parser with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text`, reusing the result from an earlier call with the same text.
    pub fn parse(&mut self, text: &str) -> Option<Date> {
        if let Some(date) = self.cache.get(text) {
            return *date;
        }

        let date = parse_loose_date(text);
        self.cache.insert(text.to_owned(), date);
        date
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
