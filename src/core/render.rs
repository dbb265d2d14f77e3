//! Text rendering of SQLite values and rows.
//!
//! Rows are rendered the way the `sqlite3` shell prints them in its default
//! list mode: columns joined by `|`, `NULL` as an empty field.

use rusqlite::types::ValueRef;

/// Column separator of list mode.
pub const SEPARATOR: &str = "|";

/// Significant digits used for REAL values.
const REAL_DIGITS: i32 = 15;

/// Render one column value.
pub fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => render_real(f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

/// Render a full row, terminated by a newline.
pub fn render_row<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = ValueRef<'a>>,
{
    let fields: Vec<String> = values.into_iter().map(render_value).collect();
    let mut line = fields.join(SEPARATOR);
    line.push('\n');
    line
}

/// Render a REAL with 15 significant digits, keeping a decimal point.
///
/// Matches printf's `%!.15g` as used by SQLite.
pub fn render_real(f: f64) -> String {
    if f.is_nan() {
        return String::new();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:.*e}", (REAL_DIGITS - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= REAL_DIGITS {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exp.unsigned_abs()
        )
    } else {
        let decimals = (REAL_DIGITS - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, f))
    }
}

/// Drop trailing zeros of a fraction, leaving at least one digit after the point.
fn trim_fraction(s: &str) -> String {
    if !s.contains('.') {
        return format!("{s}.0");
    }
    let trimmed = s.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}
