//! Translate a date selection into IMAP search terms or a sequence window.

use chrono::{Days, NaiveDate};
use std::fmt;

use crate::error::{MailError, Result};

/// Which messages a list request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    SingleDate(NaiveDate),
    /// Inclusive on both ends. Build with [`Selection::range`].
    DateRange { start: NaiveDate, end: NaiveDate },
    /// No filter: the last messages by sequence number.
    Recent,
}

impl Selection {
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(MailError::InvalidRange { start, end });
        }
        Ok(Selection::DateRange { start, end })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTerm {
    Since(NaiveDate),
    Before(NaiveDate),
}

/// `5-Mar-2024`: day without padding, English month abbreviation.
pub fn imap_date(d: NaiveDate) -> String {
    d.format("%-d-%b-%Y").to_string()
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTerm::Since(d) => write!(f, "SINCE {}", imap_date(*d)),
            SearchTerm::Before(d) => write!(f, "BEFORE {}", imap_date(*d)),
        }
    }
}

/// What the fetcher has to do for one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Nothing to fetch.
    Empty,
    /// Sequence numbers `start:*`.
    Window { start: u32 },
    Search(Vec<SearchTerm>),
}

impl FetchPlan {
    pub fn search_query(terms: &[SearchTerm]) -> String {
        terms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn day_after(d: NaiveDate) -> Result<NaiveDate> {
    d.checked_add_days(Days::new(1))
        .ok_or_else(|| MailError::Search(format!("no day after {d}")))
}

/// Build the plan for `selection`. `exists` is the folder's message count
/// and `limit` the size of the recent window.
///
/// The window is computed from the count read at EXAMINE time; mail arriving
/// between that read and the fetch shifts it. That race is accepted.
pub fn plan(selection: Selection, exists: u32, limit: u32) -> Result<FetchPlan> {
    match selection {
        Selection::SingleDate(d) => Ok(FetchPlan::Search(vec![
            SearchTerm::Since(d),
            SearchTerm::Before(day_after(d)?),
        ])),
        Selection::DateRange { start, end } => {
            if start > end {
                return Err(MailError::InvalidRange { start, end });
            }
            Ok(FetchPlan::Search(vec![
                SearchTerm::Since(start),
                SearchTerm::Before(day_after(end)?),
            ]))
        }
        Selection::Recent => {
            if exists == 0 {
                return Ok(FetchPlan::Empty);
            }
            let start = exists.saturating_sub(limit).saturating_add(1).max(1);
            Ok(FetchPlan::Window { start })
        }
    }
}
