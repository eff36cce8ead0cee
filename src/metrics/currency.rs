//! Brazilian real formatting.

/// Format a value with `.` as thousands separator and `,` as decimal
/// separator, always with two decimals: `1234.5` becomes `"1.234,50"`.
pub fn format_brl(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u128;
    let integer = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{},{:02}", sign, grouped, fraction)
}

/// Parse a string produced by [`format_brl`] back into a number.
#[cfg(test)]
pub fn parse_brl(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_prefix("R$").map(str::trim).unwrap_or(text);
    let (integer, fraction) = match text.split_once(',') {
        Some((i, f)) => (i, Some(f)),
        None => (text, None),
    };

    let (negative, integer) = match integer.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, integer),
    };

    let groups: Vec<&str> = integer.split('.').collect();
    let well_grouped = !groups[0].is_empty()
        && groups[0].len() <= 3
        && groups[1..].iter().all(|g| g.len() == 3);
    if !well_grouped || !groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    if let Some(f) = fraction {
        if f.is_empty() || !f.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let plain = match fraction {
        Some(f) => format!("{}.{}", groups.concat(), f),
        None => groups.concat(),
    };
    let value: f64 = plain.parse().ok()?;
    Some(if negative { -value } else { value })
}
