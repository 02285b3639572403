use std::time::SystemTime;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Human readable byte count using powers of 1024.
///
/// The value is truncated, not rounded, to two decimals so that a size just
/// below a unit boundary never displays as the next unit (`1048575` is
/// `1023.99 KB`, not `1024 KB`). Digits are not grouped.
pub fn format_size(bytes: u64) -> String {
    let mut unit = 0;
    while unit + 1 < UNITS.len() && bytes >= 1u64 << (10 * (unit + 1)) {
        unit += 1;
    }

    let divisor = 1u128 << (10 * unit);
    // Hundredths, computed in integers to avoid float truncation surprises.
    let hundredths = (bytes as u128 * 100) / divisor;
    let whole = hundredths / 100;
    let fraction = hundredths % 100;

    let mut number = whole.to_string();
    if fraction != 0 {
        let digits = format!("{:02}", fraction);
        number.push('.');
        number.push_str(digits.trim_end_matches('0'));
    }

    format!("{} {}", number, UNITS[unit])
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_timestamp(time: SystemTime) -> String {
    let rfc3339 = humantime::format_rfc3339_seconds(time).to_string();
    rfc3339.replacen('T', " ", 1).chars().take(19).collect()
}
