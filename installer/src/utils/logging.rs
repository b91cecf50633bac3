// Logging utilities
// Phase/step extraction for structured log lines, plus secret masking.

use log::Level;
use serde_json::json;

/// Keep the first and last four characters of longer values; hide short ones entirely.
pub fn mask_sensitive(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", start, end)
}

/// Mask credentials in a connection URL (`mysql://`, `postgres://`, ...) or an
/// ADO-style `Key=Value;` string. Host and database stay visible.
pub fn mask_connection_string(conn_str: &str) -> String {
    let s = conn_str.trim();
    if s.is_empty() {
        return String::new();
    }

    if s.contains("://") {
        return mask_url_userinfo(s).unwrap_or_else(|| "***".to_string());
    }

    s.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(mask_kv_part)
        .collect::<Vec<_>>()
        .join(";")
}

fn mask_kv_part(part: &str) -> String {
    let Some((k, v)) = part.split_once('=') else {
        return part.to_string();
    };
    let key = k.trim();

    match key.to_ascii_lowercase().replace([' ', '_'], "").as_str() {
        "password" | "pwd" => format!("{}=***", key),
        "userid" | "user" | "username" | "uid" => format!("{}={}", key, mask_sensitive(v.trim())),
        _ => part.to_string(),
    }
}

fn mask_url_userinfo(url: &str) -> Option<String> {
    let (scheme, after_scheme) = url.split_once("://")?;

    // The last '@' before the path separates userinfo from host.
    let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
    let Some(at) = after_scheme[..authority_end].rfind('@') else {
        return Some(url.to_string());
    };
    let (userinfo, rest) = (&after_scheme[..at], &after_scheme[at + 1..]);

    let (user, has_password) = match userinfo.split_once(':') {
        Some((u, _)) => (u, true),
        None => (userinfo, false),
    };
    let user = if user.is_empty() {
        String::new()
    } else {
        mask_sensitive(user)
    };

    Some(if has_password {
        format!("{scheme}://{user}:***@{rest}")
    } else {
        format!("{scheme}://{user}@{rest}")
    })
}

/// Split `[PHASE: x]` and `[STEP: y]` tags off a log message.
/// Returns (phase, step, remaining message).
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let (phase, rest) = take_tag(message, "[PHASE:");
    let (step, rest) = take_tag(&rest, "[STEP:");
    (phase, step, rest)
}

fn take_tag(message: &str, open: &str) -> (Option<String>, String) {
    let Some(start) = message.find(open) else {
        return (None, message.to_string());
    };
    let Some(len) = message[start..].find(']') else {
        return (None, message.to_string());
    };

    let value = message[start + open.len()..start + len].trim().to_string();
    let rest = format!("{} {}", &message[..start], &message[start + len + 1..])
        .trim()
        .to_string();
    (Some(value), rest)
}

/// One JSON object per line for the `.log` file.
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        entry["phase"] = json!(phase);
    }
    if let Some(step) = step {
        entry["step"] = json!(step);
    }

    serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut line = format!("[{}] [{}]", timestamp, level.as_str());
    if let Some(phase) = phase {
        line.push_str(&format!(" [PHASE: {}]", phase));
    }
    if let Some(step) = step {
        line.push_str(&format!(" [STEP: {}]", step));
    }
    line.push_str(&format!(" [{}] {}", target, message));
    line
}
