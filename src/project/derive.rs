use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,2}):([0-9]{2}) (AM|PM)$").unwrap());

/// First digit of a free-text credit-hours field ("1 TO 4 hours." → 1).
/// Ranges are not split into min/max; no digit means no data, not zero.
pub fn parse_credits(credit_hours: Option<&str>) -> Option<i64> {
    credit_hours?
        .bytes()
        .find(|b| b.is_ascii_digit())
        .map(|b| i64::from(b - b'0'))
}

/// "H:MM AM|PM" → zero-padded "HH:MM"; anything else is `None`.
pub fn to_24_hour(time12: Option<&str>) -> Option<String> {
    let caps = TIME_RE.captures(time12?.trim())?;
    let hours: u32 = caps[1].parse().ok()?;
    if hours == 0 || hours > 12 {
        return None;
    }
    let hours = (hours % 12) + if &caps[3] == "PM" { 12 } else { 0 };
    Some(format!("{:02}:{}", hours, &caps[2]))
}

/// Colon-joined, colon-terminated gen-ed code string: ["US","CS"] → "US:CS:".
/// Input order is preserved, nothing is deduplicated, no codes means `None`.
pub fn gen_ed_string(codes: &[String]) -> Option<String> {
    if codes.is_empty() {
        return None;
    }
    let mut out = String::new();
    for code in codes {
        out.push_str(code);
        out.push(':');
    }
    Some(out)
}

/// Normalize a section start/end date ("2020-08-24-05:00", "2020-08-24Z",
/// plain "2020-08-24") to ISO "YYYY-MM-DD". Unparsable input is no data.
pub fn parse_date(raw: Option<&str>) -> Option<String> {
    let head = raw?.trim().get(..10)?;
    chrono::NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .ok()
        .map(|d| d.to_string())
}

/// Split a compound course identifier ("CS 411") into its numeric id.
/// A missing or non-numeric second token would corrupt a primary key, so it
/// is a shape error rather than a default.
pub fn course_numeric_id(compound: &str) -> Result<i64> {
    let mut tokens = compound.split_whitespace();
    let subject = tokens.next();
    match (subject, tokens.next()) {
        (Some(_), Some(number)) => match number.parse() {
            Ok(n) => Ok(n),
            Err(_) => bail!("non-numeric course token in {:?}", compound),
        },
        _ => bail!("compound course id {:?} has no numeric token", compound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_take_first_digit_only() {
        assert_eq!(parse_credits(Some("3 hours.")), Some(3));
        assert_eq!(parse_credits(Some("1 TO 4 hours.")), Some(1));
        assert_eq!(parse_credits(Some("3 OR 4 hours.")), Some(3));
        assert_eq!(parse_credits(Some("variable")), None);
        assert_eq!(parse_credits(None), None);
    }

    #[test]
    fn time_conversion() {
        assert_eq!(to_24_hour(Some("9:00 AM")).as_deref(), Some("09:00"));
        assert_eq!(to_24_hour(Some("12:30 PM")).as_deref(), Some("12:30"));
        assert_eq!(to_24_hour(Some("12:15 AM")).as_deref(), Some("00:15"));
        assert_eq!(to_24_hour(Some("11:50 PM")).as_deref(), Some("23:50"));
    }

    #[test]
    fn time_rejects_anything_else() {
        assert_eq!(to_24_hour(Some("noon")), None);
        assert_eq!(to_24_hour(Some("9:00")), None);
        assert_eq!(to_24_hour(Some("13:00 PM")), None);
        assert_eq!(to_24_hour(Some("9:00 AM extra")), None);
        assert_eq!(to_24_hour(None), None);
    }

    #[test]
    fn gen_ed_concatenation() {
        assert_eq!(gen_ed_string(&[]), None);
        assert_eq!(gen_ed_string(&["US".into()]).as_deref(), Some("US:"));
        assert_eq!(
            gen_ed_string(&["US".into(), "CS".into()]).as_deref(),
            Some("US:CS:")
        );
        // order preserved, duplicates kept
        assert_eq!(
            gen_ed_string(&["CS".into(), "CS".into(), "US".into()]).as_deref(),
            Some("CS:CS:US:")
        );
    }

    #[test]
    fn dates_normalize_to_iso() {
        assert_eq!(
            parse_date(Some("2020-08-24-05:00")).as_deref(),
            Some("2020-08-24")
        );
        assert_eq!(parse_date(Some("2020-12-11Z")).as_deref(), Some("2020-12-11"));
        assert_eq!(parse_date(Some("2020-08-24")).as_deref(), Some("2020-08-24"));
        assert_eq!(parse_date(Some("fall")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn compound_id_splits_or_errors() {
        assert_eq!(course_numeric_id("CS 411").unwrap(), 411);
        assert_eq!(course_numeric_id("AAS 100").unwrap(), 100);
        assert!(course_numeric_id("CS").is_err());
        assert!(course_numeric_id("CS foo").is_err());
        assert!(course_numeric_id("").is_err());
    }
}
