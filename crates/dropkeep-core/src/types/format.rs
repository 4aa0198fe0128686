//! Human-readable sizes and durations for messages and reports.

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * KIB;
const GIB: f64 = 1024.0 * MIB;

/// Format a byte count with one decimal, e.g. `"1.5 MiB"`.
pub fn human_size(bytes: f64) -> String {
    let (symbol, divider) = if bytes >= GIB {
        ("GiB", GIB)
    } else if bytes >= MIB {
        ("MiB", MIB)
    } else if bytes >= KIB {
        ("KiB", KIB)
    } else {
        ("B", 1.0)
    };
    format!("{:.1} {}", bytes / divider, symbol)
}

/// Format whole seconds as `"1d 2h 3m 4s"`, omitting zero parts.
pub fn human_time(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// `"1 file"` / `"3 files"`.
pub fn plural(n: u64, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Neutralize backticks so names cannot break Markdown code spans.
pub fn escape_md(s: &str) -> String {
    s.replace('`', "ʼ")
}
