//! Version assignment: when the caller does not pass a literal version,
//! the loader derives one.

use chrono::NaiveDate;

/// Derive the next version string given today's UTC date and the most
/// recent prior version for this dataset, if any.
///
/// - No prior version: `YYYYMMDDnn` for today, `nn = 01`.
/// - Prior version is today's `YYYYMMDDnn`: increment `nn`.
/// - Prior version ends with two digits: increment them, zero-padded.
/// - Otherwise: append `1`.
pub fn next_version(today: NaiveDate, prior: Option<&str>) -> String {
    let today_str = today.format("%Y%m%d").to_string();

    let Some(prior) = prior else {
        return format!("{today_str}01");
    };

    if prior.len() == 10 && prior.starts_with(&today_str) && prior[8..].bytes().all(|b| b.is_ascii_digit()) {
        let nn: u32 = prior[8..].parse().unwrap_or(0);
        return format!("{today_str}{:02}", nn + 1);
    }

    if prior.len() >= 2 && prior[prior.len() - 2..].bytes().all(|b| b.is_ascii_digit()) {
        let split = prior.len() - 2;
        let prefix = &prior[..split];
        let nn: u32 = prior[split..].parse().unwrap_or(0);
        return format!("{prefix}{:02}", nn + 1);
    }

    format!("{prior}1")
}
