use std::fs;

const HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";
const OS_TYPE_PATH: &str = "/proc/sys/kernel/ostype";
const OS_RELEASE_PATH: &str = "/proc/sys/kernel/osrelease";
const UPTIME_PATH: &str = "/proc/uptime";

const UNKNOWN: &str = "Unknown";

pub fn hostname() -> String {
    read_trimmed(HOSTNAME_PATH).unwrap_or_else(|| UNKNOWN.to_string())
}

/// Kernel name as the kernel spells it, e.g. `Linux`.
pub fn system() -> String {
    read_trimmed(OS_TYPE_PATH).unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn os_release() -> String {
    read_trimmed(OS_RELEASE_PATH).unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn uptime() -> String {
    read_trimmed(UPTIME_PATH)
        .and_then(|s| parse_uptime_seconds(&s))
        .map(format_uptime)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn read_trimmed(path: &str) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn parse_uptime_seconds(contents: &str) -> Option<u64> {
    let seconds: f64 = contents.split_whitespace().next()?.parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds as u64)
}

/// `H:MM:SS`, prefixed with `N day(s), ` once past a day.
fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = total_seconds % 86_400 / 3_600;
    let minutes = total_seconds % 3_600 / 60;
    let seconds = total_seconds % 60;

    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        _ => format!("{days} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}
