use std::fmt::Write;

use crate::classifier::Resolution;
use crate::types::RequestEnv;

/// Serialize a [`RequestEnv`] to a JSON object keyed by variable name.
///
/// When `pretty` is `true` the output is indented for readability.
pub fn format_json(env: &RequestEnv, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(env)
    } else {
        serde_json::to_string(env)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Render a [`RequestEnv`] as `KEY=value` lines, one per variable, in key
/// order.
pub fn format_env(env: &RequestEnv) -> String {
    let mut out = String::with_capacity(32 * env.len());
    for (key, value) in env.iter() {
        let _ = writeln!(out, "{key}={value}");
    }
    out
}

/// Render a [`RequestEnv`] in a human-readable debug format.
pub fn format_debug(env: &RequestEnv) -> String {
    let mut out = String::with_capacity(256);

    out.push_str("=== HTTP Request ===\n");
    let line = |v: Option<&str>| v.unwrap_or("-").to_owned();
    let _ = writeln!(out, "Method:   {}", line(env.request_method()));
    let _ = writeln!(out, "URI:      {}", line(env.request_uri()));
    let _ = writeln!(out, "Path:     {}", line(env.request_path()));
    if let Some(query) = env.query_string() {
        let _ = writeln!(out, "Query:    {query}");
    }
    if let Some(fragment) = env.fragment() {
        let _ = writeln!(out, "Fragment: {fragment}");
    }
    let _ = writeln!(out, "Protocol: {}", line(env.server_protocol()));

    let headers: Vec<_> = env.headers().collect();
    let _ = writeln!(out, "\n--- Headers ({}) ---", headers.len());
    for (name, value) in headers {
        let _ = writeln!(out, "  {name}: {value}");
    }

    let body = env.initial_body();
    match env.body_start() {
        Some(start) if !body.is_empty() => {
            let _ = writeln!(out, "\n--- Body ({} bytes at offset {start}) ---", body.len());
            match std::str::from_utf8(body) {
                Ok(s) => out.push_str(s),
                Err(_) => {
                    let _ = write!(out, "<binary data: {} bytes>", body.len());
                }
            }
            out.push('\n');
        }
        Some(start) => {
            let _ = writeln!(out, "\n--- No Body (headers end at {start}) ---");
        }
        None => out.push_str("\n--- Headers incomplete ---\n"),
    }

    out.push_str("====================\n");
    out
}

/// Render a classifier hit as `SCRIPT_NAME` / `PATH_INFO` lines.
pub fn format_resolution<H>(resolution: &Resolution<'_, H>) -> String {
    format!(
        "SCRIPT_NAME={}\nPATH_INFO={}\n",
        resolution.script_name, resolution.path_info
    )
}
