use crate::error::{ReceiptSearchError, Result};
use chrono::{Datelike, Months, NaiveDate};

/// Anchor date for the `offset`-th month of a search starting at `start`.
///
/// The day of `start` is kept where the target month has it and clamped to the
/// month's last day otherwise. Every anchor is computed from `start` directly, so
/// a short month never drags later anchors to an earlier day.
pub fn month_anchor(start: NaiveDate, offset: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(offset))
}

/// The date with the given day inside the month of `anchor`, or `None` when that
/// month has no such day (e.g. the 31st of April).
pub fn candidate_date(anchor: NaiveDate, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(anchor.year(), anchor.month(), day)
}

/// Formats a date the way the document service expects it: `DD/MM/YYYY`.
pub fn format_receipt_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ReceiptSearchError::InvalidDate(value.to_string()))
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_anchor_clamps_without_drift() {
        let start = ymd(2024, 1, 31);
        assert_eq!(month_anchor(start, 0), Some(ymd(2024, 1, 31)));
        assert_eq!(month_anchor(start, 1), Some(ymd(2024, 2, 29)));
        // Clamping in February must not leak into March.
        assert_eq!(month_anchor(start, 2), Some(ymd(2024, 3, 31)));
        assert_eq!(month_anchor(start, 3), Some(ymd(2024, 4, 30)));
        assert_eq!(month_anchor(start, 12), Some(ymd(2025, 1, 31)));
    }

    #[test]
    fn test_candidate_date_rejects_missing_days() {
        let april = ymd(2024, 4, 11);
        assert_eq!(candidate_date(april, 30), Some(ymd(2024, 4, 30)));
        assert_eq!(candidate_date(april, 31), None);
        assert_eq!(candidate_date(ymd(2023, 2, 1), 29), None);
        assert_eq!(candidate_date(ymd(2024, 2, 1), 29), Some(ymd(2024, 2, 29)));
    }

    #[test]
    fn test_format_receipt_date() {
        assert_eq!(format_receipt_date(ymd(2024, 3, 5)), "05/03/2024");
        assert_eq!(format_receipt_date(ymd(2024, 12, 11)), "11/12/2024");
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_iso_date("2024-03-12").unwrap(), ymd(2024, 3, 12));
        assert_eq!(parse_iso_date(" 2024-03-12 ").unwrap(), ymd(2024, 3, 12));
        assert!(matches!(
            parse_iso_date("12/03/2024"),
            Err(ReceiptSearchError::InvalidDate(_))
        ));
        assert!(parse_iso_date("2024-02-30").is_err());
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(ymd(2024, 3, 12), ymd(2024, 4, 11)), 30);
        assert_eq!(days_between(ymd(2024, 4, 11), ymd(2024, 3, 12)), -30);
    }
}
