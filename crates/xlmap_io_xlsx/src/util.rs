//! Stateless helper utilities used by the XLSX reader and writer.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use xlmap_core::util::{format_number_general, parse_cell_ref, translate_excel_date_pattern};
use xlmap_core::{EnumCellValue, EnumFreezePanes};

use crate::conf::{
    C_DATE_RANGE_SEPARATOR, N_HEADER_KEYWORDS_MIN, N_HEADER_SCAN_ROWS,
    N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL, TUP_HEADER_KEYWORDS,
};
use crate::spec::{SpecColumnFormatPlan, SpecXlsxValuePolicy};
use crate::style::select_body_format;

////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Resolve the frozen split `(row, col)` against the written column order.
///
/// `None` when nothing is frozen.
pub fn plan_freeze_panes(
    freeze_panes: Option<&EnumFreezePanes>,
    columns: &[String],
) -> Option<(u32, u16)> {
    let (n_row, n_col) = match freeze_panes? {
        EnumFreezePanes::CellRef(c_ref) => parse_cell_ref(c_ref)?,
        EnumFreezePanes::Spec(spec) => {
            let n_col = spec
                .freeze_columns
                .iter()
                .filter_map(|name| columns.iter().position(|col| col == name))
                .max()
                .map_or(0, |idx_col| idx_col + 1);
            (u32::from(spec.freeze_header), u16::try_from(n_col).ok()?)
        }
    };
    if n_row == 0 && n_col == 0 {
        return None;
    }
    Some((n_row, n_col))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellText

/// Estimate displayed width units; non-ASCII glyphs count as 1.6.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Text shown for a date range: each end formatted with a chrono pattern.
pub fn render_date_range(
    dt_start: &chrono::NaiveDate,
    dt_end: &chrono::NaiveDate,
    pattern: &str,
) -> String {
    use std::fmt::Write;

    let mut c_out = String::new();
    if write!(
        c_out,
        "{}{C_DATE_RANGE_SEPARATOR}{}",
        dt_start.format(pattern),
        dt_end.format(pattern)
    )
    .is_err()
    {
        c_out = format!(
            "{}{C_DATE_RANGE_SEPARATOR}{}",
            dt_start.format("%Y-%m-%d"),
            dt_end.format("%Y-%m-%d")
        );
    }
    c_out
}

/// Convert `NaN`/`Inf` to policy string; return error for finite values.
pub fn convert_nan_inf_to_str(x: f64, value_policy: &SpecXlsxValuePolicy) -> Result<String, String> {
    if x.is_nan() {
        return Ok(value_policy.nan_str.clone());
    }
    if x.is_infinite() {
        return Ok(if x.is_sign_positive() {
            value_policy.posinf_str.clone()
        } else {
            value_policy.neginf_str.clone()
        });
    }
    Err("Input is neither NaN nor Inf.".to_string())
}

/// Text Excel shows for `value` under the column's planned formats.
///
/// Used for autofit measurement; number formats are rendered approximately.
pub fn render_cell_text(
    value: &EnumCellValue,
    plan: &SpecColumnFormatPlan,
    value_policy: &SpecXlsxValuePolicy,
) -> String {
    match value {
        EnumCellValue::Blank => String::new(),
        EnumCellValue::Text(val) => val.clone(),
        EnumCellValue::Number(val) => convert_nan_inf_to_str(*val, value_policy).unwrap_or_else(|_| {
            render_number_text(*val, select_body_format(plan, value).num_format.as_deref())
        }),
        EnumCellValue::Date(dt) => {
            let spec = if dt.time() == chrono::NaiveTime::MIN {
                &plan.fmt_date
            } else {
                &plan.fmt_datetime
            };
            spec.num_format
                .as_deref()
                .and_then(|c_fmt| render_datetime_text(dt, &translate_excel_date_pattern(c_fmt)))
                .unwrap_or_else(|| value.to_string())
        }
        EnumCellValue::DateRange(dt_start, dt_end) => {
            render_date_range(dt_start, dt_end, &plan.date_range_pattern)
        }
    }
}

fn render_datetime_text(dt: &NaiveDateTime, pattern: &str) -> Option<String> {
    use std::fmt::Write;

    let mut c_out = String::new();
    write!(c_out, "{}", dt.format(pattern)).ok()?;
    Some(c_out)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EnumNumberToken {
    Literal(char),
    Digit(char),
    Point,
    Comma,
}

fn tokenize_number_format(section: &str) -> Vec<EnumNumberToken> {
    let mut l_tokens = Vec::new();
    let mut iter_chars = section.chars();
    while let Some(chr) = iter_chars.next() {
        match chr {
            '"' => {
                for chr_quoted in iter_chars.by_ref() {
                    if chr_quoted == '"' {
                        break;
                    }
                    l_tokens.push(EnumNumberToken::Literal(chr_quoted));
                }
            }
            '[' => {
                for chr_tag in iter_chars.by_ref() {
                    if chr_tag == ']' {
                        break;
                    }
                }
            }
            '\\' => {
                if let Some(chr_escaped) = iter_chars.next() {
                    l_tokens.push(EnumNumberToken::Literal(chr_escaped));
                }
            }
            // `_x` pads by the width of `x`; `*x` repeats `x` to fill the cell.
            '_' => {
                if iter_chars.next().is_some() {
                    l_tokens.push(EnumNumberToken::Literal(' '));
                }
            }
            '*' => {
                iter_chars.next();
            }
            '0' | '#' | '?' => l_tokens.push(EnumNumberToken::Digit(chr)),
            '.' => l_tokens.push(EnumNumberToken::Point),
            ',' => l_tokens.push(EnumNumberToken::Comma),
            _ => l_tokens.push(EnumNumberToken::Literal(chr)),
        }
    }
    l_tokens
}

fn collect_literal_text(l_tokens: &[EnumNumberToken]) -> String {
    l_tokens
        .iter()
        .map(|token| match token {
            EnumNumberToken::Literal(chr) | EnumNumberToken::Digit(chr) => *chr,
            EnumNumberToken::Point => '.',
            EnumNumberToken::Comma => ',',
        })
        .collect()
}

fn group_thousands(c_int: &str) -> String {
    let l_digits: Vec<char> = c_int.chars().collect();
    let mut c_out = String::with_capacity(l_digits.len() + l_digits.len() / 3);
    for (idx, chr) in l_digits.iter().enumerate() {
        if idx > 0 && (l_digits.len() - idx) % 3 == 0 {
            c_out.push(',');
        }
        c_out.push(*chr);
    }
    c_out
}

/// Render a number the way an Excel number format code displays it.
///
/// Covers digit placeholders, thousands grouping and scaling, percent,
/// quoted or escaped literals and a separate negative section. Falls back to
/// the General rendering for `None`, `General` and text-only codes.
pub fn render_number_text(value: f64, num_format: Option<&str>) -> String {
    let Some(c_format) = num_format
        .map(str::trim)
        .filter(|c_fmt| !c_fmt.is_empty() && !c_fmt.eq_ignore_ascii_case("general"))
    else {
        return format_number_general(value);
    };

    let l_sections: Vec<&str> = c_format.split(';').collect();
    let (c_section, if_minus) = match l_sections.get(1) {
        Some(c_negative) if value < 0.0 && !c_negative.is_empty() => (*c_negative, false),
        _ => (l_sections[0], value < 0.0),
    };

    let l_tokens = tokenize_number_format(c_section);
    let is_digit = |token: &EnumNumberToken| matches!(token, EnumNumberToken::Digit(_));
    let (Some(idx_first), Some(idx_last)) = (
        l_tokens.iter().position(is_digit),
        l_tokens.iter().rposition(is_digit),
    ) else {
        return format_number_general(value);
    };

    let l_span = &l_tokens[idx_first..=idx_last];
    let n_scale_commas = l_tokens[idx_last + 1..]
        .iter()
        .take_while(|token| **token == EnumNumberToken::Comma)
        .count();
    let l_suffix = &l_tokens[idx_last + 1 + n_scale_commas..];
    let c_prefix = collect_literal_text(&l_tokens[..idx_first]);
    let c_suffix = collect_literal_text(l_suffix);

    let idx_point = l_span.iter().position(|token| *token == EnumNumberToken::Point);
    let (l_int, l_frac) = match idx_point {
        Some(idx) => (&l_span[..idx], &l_span[idx + 1..]),
        None => (l_span, &l_span[..0]),
    };
    let if_grouping = l_int.contains(&EnumNumberToken::Comma);
    let n_int_min = l_int
        .iter()
        .filter(|token| **token == EnumNumberToken::Digit('0'))
        .count();
    let n_frac_max = l_frac.iter().filter(|token| matches!(token, EnumNumberToken::Digit(_))).count();
    let n_frac_min = l_frac
        .iter()
        .filter(|token| **token == EnumNumberToken::Digit('0'))
        .count();

    let n_percent = c_prefix.matches('%').count() + c_suffix.matches('%').count();
    let mut n_abs = value.abs();
    for _ in 0..n_percent {
        n_abs *= 100.0;
    }
    for _ in 0..n_scale_commas {
        n_abs /= 1000.0;
    }

    let c_fixed = format!("{n_abs:.n_frac_max$}");
    let (c_int_raw, c_frac_raw) = c_fixed.split_once('.').unwrap_or((c_fixed.as_str(), ""));
    let mut c_int = c_int_raw.trim_start_matches('0').to_string();
    while c_int.len() < n_int_min {
        c_int.insert(0, '0');
    }
    if if_grouping {
        c_int = group_thousands(&c_int);
    }
    let mut c_frac = c_frac_raw.to_string();
    while c_frac.len() > n_frac_min && c_frac.ends_with('0') {
        c_frac.pop();
    }

    let mut c_out = String::new();
    if if_minus && (c_int.chars().any(|chr| chr.is_ascii_digit() && chr != '0')
        || c_frac.chars().any(|chr| chr != '0'))
    {
        c_out.push('-');
    }
    c_out.push_str(&c_prefix);
    c_out.push_str(&c_int);
    if idx_point.is_some() {
        c_out.push('.');
        c_out.push_str(&c_frac);
    }
    c_out.push_str(&c_suffix);
    c_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeaderDetection

/// First row within the scan window whose text contains enough payroll keywords.
pub fn detect_header_row(grid: &[Vec<EnumCellValue>]) -> Option<usize> {
    grid.iter()
        .take(N_HEADER_SCAN_ROWS)
        .position(|row| {
            let c_row = row
                .iter()
                .filter(|val| !val.is_blank())
                .map(|val| val.to_string().to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            TUP_HEADER_KEYWORDS
                .iter()
                .filter(|keyword| c_row.contains(*keyword))
                .count()
                >= N_HEADER_KEYWORDS_MIN
        })
}

/// Trim header names, name empty ones `Unnamed: <idx>` and suffix duplicates `.1`, `.2`.
pub fn derive_unique_column_names(l_raw: &[String]) -> Vec<String> {
    let mut set_seen: BTreeSet<String> = BTreeSet::new();
    let mut l_names = Vec::with_capacity(l_raw.len());

    for (idx_col, c_raw) in l_raw.iter().enumerate() {
        let c_base = match c_raw.trim() {
            "" => format!("Unnamed: {idx_col}"),
            c_trimmed => c_trimmed.to_string(),
        };

        let mut c_name = c_base.clone();
        let mut n_dup = 0usize;
        while set_seen.contains(&c_name) {
            n_dup += 1;
            c_name = format!("{c_base}.{n_dup}");
        }
        set_seen.insert(c_name.clone());
        l_names.push(c_name);
    }
    l_names
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use xlmap_core::SpecFreezePanes;

    use super::*;

    fn names(l_names: &[&str]) -> Vec<String> {
        l_names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Pay/Roll [Q1]", "_"), "Pay_Roll _Q1_");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }

    #[test]
    fn test_plan_freeze_panes_cell_ref_and_structured() {
        let columns = names(&["Name", "Dept", "Net"]);
        let cell_ref = EnumFreezePanes::CellRef("B3".to_string());
        assert_eq!(plan_freeze_panes(Some(&cell_ref), &columns), Some((2, 1)));

        let structured = EnumFreezePanes::Spec(SpecFreezePanes {
            freeze_header: true,
            freeze_columns: names(&["Dept"]),
        });
        assert_eq!(plan_freeze_panes(Some(&structured), &columns), Some((1, 2)));

        let none = EnumFreezePanes::Spec(SpecFreezePanes::default());
        assert_eq!(plan_freeze_panes(Some(&none), &columns), None);
        assert_eq!(plan_freeze_panes(None, &columns), None);
    }

    #[test]
    fn test_estimate_unicode_string_width() {
        assert_eq!(estimate_unicode_string_width("Gross"), 5);
        assert_eq!(estimate_unicode_string_width("工资"), 3);
    }

    fn money_date_plan() -> SpecColumnFormatPlan {
        let mut config = xlmap_core::default_config();
        config.output_columns = vec![xlmap_core::SpecColumnConfig {
            formatting: xlmap_core::SpecColumnFormatting {
                number_format: Some("#,##0.00".to_string()),
                negative_format: Some("(#,##0.00)".to_string()),
                date_format: Some("MM/DD/YYYY".to_string()),
                ..Default::default()
            },
            ..xlmap_core::SpecColumnConfig::new("Net", "Net")
        }];
        crate::style::plan_column_formats(&config, &[0], &Default::default()).remove(0)
    }

    #[test]
    fn test_render_number_text() {
        assert_eq!(render_number_text(1234.5, Some("#,##0.00")), "1,234.50");
        assert_eq!(render_number_text(1234.5, None), "1234.5");
        assert_eq!(render_number_text(1234.5, Some("General")), "1234.5");
        assert_eq!(render_number_text(-1234.5, Some("#,##0.00")), "-1,234.50");
        assert_eq!(render_number_text(-1234.5, Some("#,##0.00;(#,##0.00)")), "(1,234.50)");
        assert_eq!(render_number_text(1234567.0, Some("$#,##0")), "$1,234,567");
        assert_eq!(render_number_text(0.125, Some("0.0%")), "12.5%");
        assert_eq!(render_number_text(5.0, Some("#.##")), "5.");
        assert_eq!(render_number_text(0.5, Some("0.00")), "0.50");
        assert_eq!(render_number_text(2500000.0, Some("#,##0.0,,\"M\"")), "2.5M");
        assert_eq!(render_number_text(7.0, Some("\"USD \"0.00_)")), "USD 7.00 ");
        assert_eq!(render_number_text(-0.001, Some("0.00")), "0.00");
        assert_eq!(render_number_text(3.0, Some("@")), "3");
    }

    #[test]
    fn test_render_cell_text_uses_planned_formats() {
        let plan = money_date_plan();
        let policy = SpecXlsxValuePolicy::default();

        assert_eq!(render_cell_text(&EnumCellValue::Number(1234.5), &plan, &policy), "1,234.50");
        assert_eq!(render_cell_text(&EnumCellValue::Number(-20.0), &plan, &policy), "-(20.00)");
        assert_eq!(render_cell_text(&EnumCellValue::Number(f64::NAN), &plan, &policy), "NaN");
        assert_eq!(
            render_cell_text(&EnumCellValue::Number(f64::NEG_INFINITY), &plan, &policy),
            "-Inf"
        );

        let dt = NaiveDate::from_ymd_opt(2024, 1, 19)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(render_cell_text(&EnumCellValue::Date(dt), &plan, &policy), "01/19/2024");

        let value = EnumCellValue::DateRange(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        assert_eq!(render_cell_text(&value, &plan, &policy), "2024-01-01 - 2024-01-15");
        assert_eq!(render_cell_text(&EnumCellValue::Blank, &plan, &policy), "");
    }

    #[test]
    fn test_convert_nan_inf_to_str() {
        let policy = SpecXlsxValuePolicy::default();
        assert_eq!(convert_nan_inf_to_str(f64::INFINITY, &policy), Ok("Inf".to_string()));
        assert!(convert_nan_inf_to_str(1.0, &policy).is_err());
    }

    #[test]
    fn test_detect_header_row_skips_title_block() {
        let grid = vec![
            vec!["ACME Corp Payroll Register".into(), EnumCellValue::Blank],
            vec![EnumCellValue::Blank, EnumCellValue::Blank],
            vec!["Employee Name".into(), "Gross Pay".into(), "Net Pay".into()],
            vec!["Ann".into(), 100.0.into(), 80.0.into()],
        ];
        assert_eq!(detect_header_row(&grid), Some(2));

        let grid = vec![vec![EnumCellValue::from("A"), EnumCellValue::from("B")]];
        assert_eq!(detect_header_row(&grid), None);
    }

    #[test]
    fn test_derive_unique_column_names() {
        let l_raw = names(&[" Name ", "", "Tax", "Tax", "Tax", "Tax.1"]);
        assert_eq!(
            derive_unique_column_names(&l_raw),
            names(&["Name", "Unnamed: 1", "Tax", "Tax.1", "Tax.2", "Tax.1.1"])
        );
    }
}
