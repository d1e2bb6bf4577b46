//! Stateless value parsing and conversion helpers.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;

static RE_DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+?)\s+(?:-|–|to)\s+(.+?)\s*$").expect("valid date range regex")
});

const L_DATE_FORMATS: [&str; 6] = [
    "%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y", "%Y/%m/%d", "%d-%b-%Y",
];
const L_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

////////////////////////////////////////////////////////////////////////////////
// #region NumberParsing

/// Parse spreadsheet-style numeric text.
///
/// Accepts surrounding whitespace, a leading `$`, `,` thousands separators,
/// and accounting negatives such as `(12.50)`. Rejects `NaN`/`inf` spellings.
pub fn parse_number_text(text: &str) -> Option<f64> {
    let mut c_text = text.trim();
    if c_text.is_empty() {
        return None;
    }

    let mut if_negative = false;
    if let Some(inner) = c_text
        .strip_prefix('(')
        .and_then(|val| val.strip_suffix(')'))
    {
        if_negative = true;
        c_text = inner.trim();
    }

    let c_clean: String = c_text
        .chars()
        .filter(|chr| *chr != ',' && *chr != '$')
        .collect();
    if !c_clean.chars().any(|chr| chr.is_ascii_digit()) {
        return None;
    }

    let n_value = c_clean.parse::<f64>().ok().filter(|val| val.is_finite())?;
    Some(if if_negative { -n_value } else { n_value })
}

/// Render a number the way a spreadsheet "General" format would.
pub fn format_number_general(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let c_text = format!("{value:.10}");
        c_text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DateParsing

/// Parse date or date-time text in the common payroll export layouts.
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let c_text = text.trim();
    if c_text.is_empty() {
        return None;
    }
    for c_fmt in L_DATETIME_FORMATS {
        if let Ok(val) = NaiveDateTime::parse_from_str(c_text, c_fmt) {
            return Some(val);
        }
    }
    for c_fmt in L_DATE_FORMATS {
        if let Ok(val) = NaiveDate::parse_from_str(c_text, c_fmt) {
            return val.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse `"<date> - <date>"` (or `to`) into an ordered pair of dates.
pub fn parse_date_range_text(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    let caps = RE_DATE_RANGE.captures(text)?;
    let dt_start = parse_date_text(caps.get(1)?.as_str())?;
    let dt_end = parse_date_text(caps.get(2)?.as_str())?;
    Some((dt_start.date(), dt_end.date()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExcelSerialDates

fn derive_excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Convert an Excel serial day number (1900 system) to a date-time.
pub fn convert_excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let n_millis = (serial * 86_400_000.0).round() as i64;
    derive_excel_epoch()?.checked_add_signed(TimeDelta::try_milliseconds(n_millis)?)
}

/// Convert a date-time to an Excel serial day number (1900 system).
pub fn convert_datetime_to_excel_serial(value: &NaiveDateTime) -> f64 {
    let Some(dt_epoch) = derive_excel_epoch() else {
        return 0.0;
    };
    (*value - dt_epoch).num_milliseconds() as f64 / 86_400_000.0
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DatePatterns

/// Translate an Excel date format code (`MM/DD/YYYY`, `d-mmm-yy h:mm AM/PM`)
/// to a chrono format string.
///
/// `m`/`mm` directly after an hour token are minutes, as in Excel.
pub fn translate_excel_date_pattern(pattern: &str) -> String {
    let l_chars: Vec<char> = pattern.chars().collect();
    let mut c_out = String::new();
    let mut if_after_hour = false;
    let mut n_idx = 0;

    while n_idx < l_chars.len() {
        let chr = l_chars[n_idx];

        if chr == '"' {
            n_idx += 1;
            while n_idx < l_chars.len() && l_chars[n_idx] != '"' {
                push_literal(&mut c_out, l_chars[n_idx]);
                n_idx += 1;
            }
            n_idx += 1;
            continue;
        }
        if chr == '\\' && n_idx + 1 < l_chars.len() {
            push_literal(&mut c_out, l_chars[n_idx + 1]);
            n_idx += 2;
            continue;
        }

        let c_rest: String = l_chars[n_idx..].iter().collect::<String>().to_ascii_uppercase();
        if c_rest.starts_with("AM/PM") {
            c_out.push_str("%p");
            n_idx += 5;
            continue;
        }

        let chr_lower = chr.to_ascii_lowercase();
        if !matches!(chr_lower, 'y' | 'm' | 'd' | 'h' | 's') {
            push_literal(&mut c_out, chr);
            n_idx += 1;
            continue;
        }

        let mut n_run = 1;
        while n_idx + n_run < l_chars.len() && l_chars[n_idx + n_run].to_ascii_lowercase() == chr_lower
        {
            n_run += 1;
        }

        let c_token = match (chr_lower, n_run) {
            ('y', 1..=2) => "%y",
            ('y', _) => "%Y",
            ('m', 1) if if_after_hour => "%-M",
            ('m', 2) if if_after_hour => "%M",
            ('m', 1) => "%-m",
            ('m', 2) => "%m",
            ('m', 3) => "%b",
            ('m', _) => "%B",
            ('d', 1) => "%-d",
            ('d', 2) => "%d",
            ('d', 3) => "%a",
            ('d', _) => "%A",
            ('h', 1) => "%-H",
            ('h', _) => "%H",
            ('s', 1) => "%-S",
            _ => "%S",
        };
        c_out.push_str(c_token);
        if_after_hour = chr_lower == 'h';
        n_idx += n_run;
    }

    c_out
}

fn push_literal(c_out: &mut String, chr: char) {
    if chr == '%' {
        c_out.push_str("%%");
    } else {
        c_out.push(chr);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellReferences

/// Largest zero-based row index in a worksheet.
pub const N_ROW_IDX_MAX: u32 = 1_048_575;
/// Largest zero-based column index in a worksheet.
pub const N_COL_IDX_MAX: u16 = 16_383;

/// Parse an A1-style cell reference into zero-based `(row, col)`.
pub fn parse_cell_ref(text: &str) -> Option<(u32, u16)> {
    let c_text = text.trim().to_ascii_uppercase();
    let n_split = c_text.find(|chr: char| chr.is_ascii_digit())?;
    let (c_col, c_row) = c_text.split_at(n_split);
    if c_col.is_empty() || !c_col.chars().all(|chr| chr.is_ascii_uppercase()) {
        return None;
    }
    if !c_row.chars().all(|chr| chr.is_ascii_digit()) {
        return None;
    }

    let n_row: u32 = c_row.parse().ok()?;
    let n_col = c_col
        .bytes()
        .try_fold(0u32, |acc, byte| acc.checked_mul(26)?.checked_add(u32::from(byte - b'A') + 1))?;
    if n_row == 0 || n_row - 1 > N_ROW_IDX_MAX || n_col == 0 || n_col - 1 > u32::from(N_COL_IDX_MAX) {
        return None;
    }
    Some((n_row - 1, u16::try_from(n_col - 1).ok()?))
}

/// Parse a six-digit hex RGB color with an optional leading `#`.
pub fn parse_hex_color(text: &str) -> Option<u32> {
    let c_hex = text.trim().trim_start_matches('#');
    if c_hex.len() != 6 || !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(c_hex, 16).ok()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_text_handles_currency_and_accounting() {
        assert_eq!(parse_number_text(" 1,234.50 "), Some(1234.5));
        assert_eq!(parse_number_text("$12"), Some(12.0));
        assert_eq!(parse_number_text("(7.25)"), Some(-7.25));
        assert_eq!(parse_number_text("-3"), Some(-3.0));
        assert_eq!(parse_number_text("N/A"), None);
        assert_eq!(parse_number_text("NaN"), None);
        assert_eq!(parse_number_text(""), None);
    }

    #[test]
    fn format_number_general_drops_integral_fraction() {
        assert_eq!(format_number_general(93.0), "93");
        assert_eq!(format_number_general(-0.5), "-0.5");
        assert_eq!(format_number_general(1.25), "1.25");
    }

    #[test]
    fn parse_date_text_two_and_four_digit_years() {
        let dt = parse_date_text("01/15/24").expect("short year");
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let dt = parse_date_text("01/15/2024").expect("long year");
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let dt = parse_date_text("2024-03-01 08:30:00").expect("iso datetime");
        assert_eq!(dt.format("%H:%M").to_string(), "08:30");
        assert!(parse_date_text("Employee").is_none());
    }

    #[test]
    fn parse_date_range_text_accepts_dash_separator() {
        let (start, end) = parse_date_range_text("01/01/2024 - 01/15/2024").expect("range");
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(parse_date_range_text("2024-01-01").is_none());
        assert!(parse_date_range_text("Gross - Tax").is_none());
    }

    #[test]
    fn excel_serial_conversion_both_ways() {
        let dt = convert_excel_serial_to_datetime(45306.5).expect("serial");
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
        assert_eq!(convert_datetime_to_excel_serial(&dt), 45306.5);
        assert!(convert_excel_serial_to_datetime(-1.0).is_none());
    }

    #[test]
    fn translate_excel_date_pattern_tokens() {
        assert_eq!(translate_excel_date_pattern("MM/DD/YYYY"), "%m/%d/%Y");
        assert_eq!(translate_excel_date_pattern("d-mmm-yy"), "%-d-%b-%y");
        assert_eq!(translate_excel_date_pattern("hh:mm AM/PM"), "%H:%M %p");
        assert_eq!(translate_excel_date_pattern("yyyy\"年\""), "%Y年");
    }

    #[test]
    fn parse_cell_ref_zero_based() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("b3"), Some((2, 1)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("XFD1048576"), Some((1_048_575, 16_383)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("3B"), None);
        assert_eq!(parse_cell_ref("XFE1"), None);
        assert_eq!(parse_cell_ref(""), None);
    }

    #[test]
    fn parse_hex_color_accepts_optional_hash() {
        assert_eq!(parse_hex_color("366092"), Some(0x366092));
        assert_eq!(parse_hex_color("#ffffff"), Some(0xFFFFFF));
        assert_eq!(parse_hex_color("blue"), None);
        assert_eq!(parse_hex_color("12345"), None);
    }
}
