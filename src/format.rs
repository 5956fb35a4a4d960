/// Truncates `text` to `max_chars` characters, marking the cut with "...".
pub fn shortener(text: Option<&str>, max_chars: usize) -> String {
    let Some(text) = text else {
        return String::new();
    };
    let mut short: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        short.push_str("...");
    }
    short
}

/// `mm:ss`, or `hh:mm:ss` once the hour mark is passed.
///
/// The minutes field is always printed past the hour mark, so one hour and five
/// seconds reads `01:00:05` rather than a bare `05`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours == 0 {
        format!("{:02}:{:02}", minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}
