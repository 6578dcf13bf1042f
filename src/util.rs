// Utility helpers for parsing spreadsheet cells, ordering names and
// formatting numbers.
//
// This module centralizes all the "dirty" cell handling so the rest of the
// code can assume clean, typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

/// Parse a spreadsheet cell into `f64`.
///
/// - Accepts `Option<&str>` so callers can pass through missing cells.
/// - Strips all whitespace, including the non-breaking spaces used as
///   thousands separators in exported sheets.
/// - Accepts either `,` or `.` as decimal separator. When both appear the
///   last one is the decimal separator and the other is dropped.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s: String = s?.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(c), Some(p)) if c > p => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s,
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Spreadsheet checkbox/marker cells: "TRUE", "1", "да", "x", "✓" and friends.
pub fn parse_bool_safe(s: Option<&str>) -> bool {
    let Some(s) = s else { return false };
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "истина" | "да" | "yes" | "y" | "x" | "х" | "+" | "✓" | "✔"
    )
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // Sheets export either `dd.mm.yyyy` or ISO dates.
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

/// Trimmed cell text, or `None` when the cell is missing or blank.
pub fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Numeric-aware, case-insensitive string ordering ("Литер 2" < "Литер 10").
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = cmp_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(c) = it.peek().copied().filter(|c| c.is_ascii_digit()) {
        out.push(c);
        it.next();
    }
    out
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    // Compare by magnitude without parsing, so long runs cannot overflow.
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Descending order for floats; NaN compares equal.
pub fn desc_f64(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Share of `part` in `whole`, in percent rounded to one decimal.
/// A zero whole yields 0 instead of dividing by zero.
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole.abs() < f64::EPSILON {
        return 0.0;
    }
    let p = round1(part / whole * 100.0);
    if p.is_finite() {
        p
    } else {
        0.0
    }
}

/// "42.9" style rendering; whole numbers drop the fraction ("0", "100").
pub fn format_percent(p: f64) -> String {
    let p = round1(p);
    if p.fract() == 0.0 {
        format!("{}", p as i64)
    } else {
        format!("{:.1}", p)
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages.
    n.to_formatted_string(&Locale::en)
}
