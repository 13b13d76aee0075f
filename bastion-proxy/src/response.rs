//! Literal responses generated by the proxy itself.

/// `503` sent when no backend is alive.
pub fn no_servers_available() -> Vec<u8> {
    plain("503 Service Unavailable", &[], "no servers available")
}

/// `429` sent to a banned client.
///
/// The body names the remaining ban time; `newly_banned` distinguishes the
/// request that triggered the ban from later ones.
pub fn rate_limited(retry_after_secs: u64, newly_banned: bool) -> Vec<u8> {
    let body = if newly_banned {
        format!("Rate limit exceeded. Banned for {retry_after_secs}s.")
    } else {
        format!("BANNED (Wait {retry_after_secs}s)")
    };
    let retry_after = retry_after_secs.to_string();
    plain(
        "429 Too Many Requests",
        &[("Retry-After", retry_after.as_str())],
        &body,
    )
}

fn plain(status: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(body);
    out.into_bytes()
}
