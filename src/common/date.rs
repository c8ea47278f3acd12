//! Canonical date handling.
//!
//! Dates enter and leave the gateway as strings in one fixed format. Any
//! other input format is rejected rather than coerced.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use super::errors::{GatewayError, GatewayResult};

/// The only date format accepted from and returned to callers
pub const ACCEPTED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a date for JSON output, dropping its timezone
pub fn datetime_to_str(date: &DateTime<FixedOffset>) -> String {
    date.naive_local().format(ACCEPTED_DATE_FORMAT).to_string()
}

/// Parse a caller-supplied date string
///
/// The result carries a zero offset; the catalog does not use timezones.
pub fn str_to_datetime(data: &str) -> GatewayResult<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(data, ACCEPTED_DATE_FORMAT).map_err(|_| {
        GatewayError::bad_request(format!(
            "Bad request made, the date entered is not in the correct format. Use the \
             {} format to submit dates to the API",
            ACCEPTED_DATE_FORMAT
        ))
    })?;
    Ok(Utc.from_utc_datetime(&naive).fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let date = str_to_datetime("2020-01-01 00:00:00").unwrap();
        assert_eq!(datetime_to_str(&date), "2020-01-01 00:00:00");
    }

    #[test]
    fn test_timezone_is_stripped() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let date = offset.with_ymd_and_hms(2019, 6, 11, 10, 30, 0).unwrap();
        assert_eq!(datetime_to_str(&date), "2019-06-11 10:30:00");
    }

    #[test]
    fn test_wrong_format_is_bad_request() {
        let result = str_to_datetime("2020-01-01T00:00:00Z");
        assert!(matches!(result, Err(GatewayError::BadRequest(_))));
        assert!(str_to_datetime("01/01/2020").is_err());
    }
}
