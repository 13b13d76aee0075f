//! HTML rendering of a [`StatsSnapshot`].

use std::fmt::Write;

use bastion_core::stats::StatsSnapshot;

const STYLE: &str = "\
body { font-family: sans-serif; padding: 20px; }
table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
h2 { border-bottom: 2px solid #333; }";

/// Render the dashboard page. The page refreshes itself every three seconds.
pub fn render_html(snapshot: &StatsSnapshot) -> String {
    let mut rows = String::new();
    for b in &snapshot.backends {
        let (color, label) = if b.alive {
            ("green", "ONLINE")
        } else {
            ("red", "OFFLINE")
        };
        // Writing into a String cannot fail.
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td style='color:{color}'><b>{label}</b></td><td>{}</td></tr>",
            escape(&b.address),
            b.weight,
            b.requests,
        );
    }

    let mut banned = String::new();
    if snapshot.banned.is_empty() {
        banned.push_str("<tr><td colspan='2'>No banned clients</td></tr>");
    }
    for ban in &snapshot.banned {
        let _ = write!(
            banned,
            "<tr><td style='color:red'>{}</td><td>{} seconds</td></tr>",
            escape(&ban.client),
            ban.remaining_secs,
        );
    }

    format!(
        "<html>
<head><title>LB Dashboard</title>
<meta http-equiv=\"refresh\" content=\"3\">
<style>
{STYLE}
</style>
</head>
<body>
<h1>Bastion Load Balancer</h1>
<h2>Backend Status (Weighted)</h2>
<p><b>Alive:</b> {alive} / {total}</p>
<table>
<tr><th>Server</th><th>Weight</th><th>Status</th><th>Total Requests</th></tr>
{rows}
</table>
<h2>Cache</h2>
<p><b>Active Cached Pages:</b> {cache_entries}</p>
<p><b>Cache Timeout:</b> {ttl} seconds</p>
<h2>Security</h2>
<p><b>Tracked Clients:</b> {tracked}</p>
<table>
<tr><th>Banned Client</th><th>Time Remaining</th></tr>
{banned}
</table>
<h2>Routing</h2>
<p><b>Pinned Path Fallbacks:</b> {fallbacks}</p>
</body>
</html>
",
        alive = snapshot.alive_backends(),
        total = snapshot.backends.len(),
        cache_entries = snapshot.cache_entries,
        ttl = snapshot.cache_ttl_secs,
        tracked = snapshot.tracked_clients,
        fallbacks = snapshot.pinned_fallbacks,
    )
}

/// A complete `200 OK` HTTP/1.1 response carrying the dashboard, ready to write to a raw socket.
///
/// With `head_only` the headers are sent without the body, as a `HEAD` request expects.
pub fn http_response(snapshot: &StatsSnapshot, head_only: bool) -> Vec<u8> {
    let body = render_html(snapshot);
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    if !head_only {
        response.extend_from_slice(body.as_bytes());
    }
    response
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::stats::{BackendStats, BannedClient};

    fn snapshot() -> StatsSnapshot {
        StatsSnapshot {
            backends: vec![
                BackendStats {
                    id: 0,
                    address: "127.0.0.1:9001".to_string(),
                    weight: 3,
                    alive: true,
                    requests: 42,
                },
                BackendStats {
                    id: 1,
                    address: "<evil>:9002".to_string(),
                    weight: 1,
                    alive: false,
                    requests: 0,
                },
            ],
            cache_entries: 7,
            cache_ttl_secs: 4,
            tracked_clients: 3,
            banned: vec![BannedClient {
                client: "10.0.0.9".to_string(),
                remaining_secs: 12,
            }],
            pinned_fallbacks: 5,
        }
    }

    #[test]
    fn renders_backend_rows_and_summaries() {
        let html = render_html(&snapshot());
        assert!(html.contains("<td>127.0.0.1:9001</td><td>3</td>"));
        assert!(html.contains("ONLINE"));
        assert!(html.contains("OFFLINE"));
        assert!(html.contains("<td>42</td>"));
        assert!(html.contains("Active Cached Pages:</b> 7"));
        assert!(html.contains("Cache Timeout:</b> 4 seconds"));
        assert!(html.contains("10.0.0.9"));
        assert!(html.contains("12 seconds"));
        assert!(html.contains("Pinned Path Fallbacks:</b> 5"));
        assert!(html.contains("Alive:</b> 1 / 2"));
    }

    #[test]
    fn escapes_addresses() {
        let html = render_html(&snapshot());
        assert!(html.contains("&lt;evil&gt;:9002"));
        assert!(!html.contains("<evil>"));
    }

    #[test]
    fn http_response_has_matching_length() {
        let raw = http_response(&snapshot(), false);
        let text = String::from_utf8(raw).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
    }

    #[test]
    fn head_response_has_no_body() {
        let raw = http_response(&snapshot(), true);
        assert!(raw.ends_with(b"\r\n\r\n"));
    }
}
