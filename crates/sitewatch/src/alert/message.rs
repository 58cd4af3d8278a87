use chrono::SecondsFormat;

use super::decision::AlertKind;
use crate::types::CheckResult;

/// Render the Markdown notification text for one result.
pub fn format_alert(result: &CheckResult, kind: AlertKind) -> String {
    let (title, availability) = if result.is_up() {
        ("✅ *Website Available*", "✅ Available")
    } else {
        ("🚨 *Website Alert!*", "❌ Unavailable")
    };

    let mut msg = format!(
        "{}{}\n\n🌐 *URL*: {}\n📊 *Status*: {} ({})\n⏱ *Response time*: {} ms\n🕒 *Timestamp*: {}",
        title,
        match kind {
            AlertKind::Reminder if result.is_up() => " (still up)",
            AlertKind::Reminder => " (still down)",
            _ => "",
        },
        result.url,
        availability,
        result.status_code,
        result.response_time_ms,
        result.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    if result.has_error() {
        // a stray backtick would end the code span early
        msg.push_str(&format!("\n⚠️ *Error*: `{}`", result.error_message.replace('`', "'")));
    }

    msg
}
