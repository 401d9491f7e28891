//! Row-scanning state machine shared by fixture and result extraction.
//!
//! Upstream tables interleave date-header rows with match-card rows; each
//! card belongs to the most recent header above it.  The scanner walks the
//! rows in document order, carrying the current date, and hands every card
//! to an extractor together with that date.  It knows nothing about HTML:
//! rows arrive already classified as `RowKind`.

use chrono::NaiveDate;

/// What a single table row turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind<C> {
    /// Header naming the date of the following cards
    DateHeader(String),
    MatchCard(C),
    Other,
}

/// Date context carried between rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateState {
    NoDate,
    HasDate { raw: String, iso: Option<NaiveDate> },
}

impl DateState {
    pub fn raw(&self) -> &str {
        match self {
            DateState::NoDate => "",
            DateState::HasDate { raw, .. } => raw,
        }
    }

    pub fn iso(&self) -> Option<NaiveDate> {
        match self {
            DateState::NoDate => None,
            DateState::HasDate { iso, .. } => *iso,
        }
    }
}

/// Scan `rows`, emitting whatever `extract` builds from each match card.
///
/// Cards seen before any header get `DateState::NoDate`. Cards for which
/// `extract` returns `None` are dropped without affecting the date state.
pub fn scan_rows<C, R, I, F>(rows: I, mut extract: F) -> Vec<R>
where
    I: IntoIterator<Item = RowKind<C>>,
    F: FnMut(C, &DateState) -> Option<R>,
{
    let mut state = DateState::NoDate;
    let mut records = Vec::new();

    for row in rows {
        match row {
            RowKind::DateHeader(raw) => {
                let iso = normalize_date(&raw);
                state = DateState::HasDate { raw, iso };
            }
            RowKind::MatchCard(card) => {
                if let Some(record) = extract(card, &state) {
                    records.push(record);
                }
            }
            RowKind::Other => {}
        }
    }

    records
}

/// Parse an upstream date header such as `"Sunday 09 November 2025"`.
///
/// Returns `None` for anything else, including a weekday that does not
/// match the date.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDate::parse_from_str(&collapsed, "%A %d %B %Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(s: &str) -> RowKind<&'static str> {
        RowKind::DateHeader(s.to_string())
    }

    fn collect(rows: Vec<RowKind<&'static str>>) -> Vec<(String, Option<NaiveDate>, &'static str)> {
        scan_rows(rows, |card, date| {
            Some((date.raw().to_string(), date.iso(), card))
        })
    }

    #[test]
    fn test_normalize_valid_date() {
        assert_eq!(
            normalize_date("Sunday 09 November 2025"),
            NaiveDate::from_ymd_opt(2025, 11, 9)
        );
        assert_eq!(
            normalize_date("Saturday 01 March 2025"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_date("  Sunday   09\n November 2025 "),
            NaiveDate::from_ymd_opt(2025, 11, 9)
        );
    }

    #[test]
    fn test_normalize_rejects_other_formats() {
        assert_eq!(normalize_date("2025-11-09"), None);
        assert_eq!(normalize_date("TBC"), None);
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("Sunday 32 November 2025"), None);
    }

    #[test]
    fn test_normalize_rejects_inconsistent_weekday() {
        assert_eq!(normalize_date("Monday 09 November 2025"), None);
    }

    #[test]
    fn test_cards_take_most_recent_header() {
        let rows = vec![
            header("Saturday 08 November 2025"),
            RowKind::MatchCard("a"),
            RowKind::Other,
            RowKind::MatchCard("b"),
            header("Sunday 09 November 2025"),
            RowKind::MatchCard("c"),
        ];
        let out = collect(rows);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].0, "Saturday 08 November 2025");
        assert_eq!(out[1].1, NaiveDate::from_ymd_opt(2025, 11, 8));
        assert_eq!(out[2].1, NaiveDate::from_ymd_opt(2025, 11, 9));
        assert_eq!(out[2].2, "c");
    }

    #[test]
    fn test_card_before_any_header_has_empty_date() {
        let out = collect(vec![RowKind::MatchCard("early"), header("Sunday 09 November 2025")]);
        assert_eq!(out, vec![(String::new(), None, "early")]);
    }

    #[test]
    fn test_unparseable_header_keeps_raw_text() {
        let out = collect(vec![header("Date TBC"), RowKind::MatchCard("x")]);
        assert_eq!(out, vec![("Date TBC".to_string(), None, "x")]);
    }

    #[test]
    fn test_rejected_cards_are_skipped() {
        let rows = vec![
            header("Sunday 09 November 2025"),
            RowKind::MatchCard(""),
            RowKind::MatchCard("ok"),
        ];
        let out = scan_rows(rows, |card, _| (!card.is_empty()).then_some(card));
        assert_eq!(out, vec!["ok"]);
    }

    #[test]
    fn test_no_rows_no_records() {
        assert!(collect(vec![]).is_empty());
    }
}
