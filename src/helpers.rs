use chrono::{DateTime, Utc};

pub fn human_bytes(b: u64) -> String {
    if b == 0 {
        return "0 B".to_string();
    }
    const UNIT: u64 = 1024;
    if b < UNIT {
        return format!("{} B", b);
    }
    let suffixes = ["KB", "MB", "GB", "TB"];
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = b / UNIT;
    while n >= UNIT && exp < suffixes.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}", b as f64 / div as f64, suffixes[exp])
}

pub fn human_time(t: Option<DateTime<Utc>>) -> String {
    let t = match t {
        Some(t) => t,
        None => return "unknown".to_string(),
    };

    let d = Utc::now() - t;
    let secs = d.num_seconds();

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        let m = d.num_minutes();
        if m == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{} minutes ago", m)
        }
    } else if secs < 86400 {
        let h = d.num_hours();
        if h == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", h)
        }
    } else if secs < 30 * 86400 {
        let days = d.num_days();
        if days == 1 {
            "1 day ago".to_string()
        } else {
            format!("{} days ago", days)
        }
    } else {
        t.format("%b %e, %Y").to_string()
    }
}

/// First 12 hex characters of an engine id, without any `sha256:` prefix.
pub fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(12).collect()
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn connection_suggestion(error_message: &str) -> &'static str {
    let e = error_message.to_lowercase();
    if e.contains("connection refused") {
        "Docker daemon may not be running or the port may be incorrect"
    } else if e.contains("timeout") || e.contains("timed out") {
        "Network connectivity issue or Docker daemon is not responding"
    } else if e.contains("permission denied") {
        "Check Docker socket permissions or TLS certificate configuration"
    } else if e.contains("no such file") {
        "Docker socket path may be incorrect"
    } else if e.contains("certificate") || e.contains("tls") {
        "Check TLS certificate configuration and paths"
    } else {
        "Check Docker daemon configuration and network connectivity"
    }
}
