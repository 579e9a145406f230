/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use health_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let fixed = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    // "-0.0" is printed as "0.0".
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a capacity figure in gigabytes, e.g. `"1,520 GB"`.
pub fn format_capacity_gb(gb: f64) -> String {
    let decimals = if gb.fract() == 0.0 { 0 } else { 2 };
    format!("{} GB", format_number(gb, decimals))
}

/// Format a percentage with two decimals, e.g. `"52.00%"`.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Format a score contribution with an explicit sign, e.g. `"+12.0 pts"`.
///
/// ```
/// use health_core::formatting::format_impact;
///
/// assert_eq!(format_impact(12.0), "+12.0 pts");
/// assert_eq!(format_impact(0.0), "+0.0 pts");
/// assert_eq!(format_impact(-7.5), "-7.5 pts");
/// ```
pub fn format_impact(impact: f64) -> String {
    if impact >= 0.0 {
        format!("+{:.1} pts", impact)
    } else {
        format!("{:.1} pts", impact)
    }
}

/// `(part / whole) * 100`, rounded to `decimal_places`; `0.0` when `whole` is zero.
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    round_to((part / whole) * 100.0, decimal_places)
}

/// Round `value` to `decimal_places`.
pub fn round_to(value: f64, decimal_places: u32) -> f64 {
    let factor = 10_f64.powi(decimal_places as i32);
    (value * factor).round() / factor
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
