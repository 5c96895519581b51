use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::state::AppState;

/// Renders the blacklisted-address form. Unauthenticated, as in the
/// original (spec.md §4.3): the admin page is meant to sit behind a
/// reverse proxy in deployment.
pub async fn show(State(state): State<AppState>) -> Result<Response, AppError> {
    let filtering = &state.filtering;
    let addresses = filtering.blacklist.list().await?;
    Ok(render(&addresses, filtering.observe).into_response())
}

/// Unblocks every checked address and clears its counters.
pub async fn unblock(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let filtering = &state.filtering;
    let form = String::from_utf8_lossy(&body);
    for addr in checked_addresses(&form) {
        filtering.blacklist.remove(&addr).await?;
        filtering.counter.remove(&addr).await?;
        filtering.br_counter.remove(&addr).await?;
    }
    let addresses = filtering.blacklist.list().await?;
    Ok(render(&addresses, filtering.observe).into_response())
}

/// Parses `application/x-www-form-urlencoded` checkbox fields named after
/// the address itself (`1.2.3.4=on`), matching the original's
/// `cgi.FieldStorage` handling in `IPFiltering.admin`.
fn checked_addresses(form: &str) -> Vec<String> {
    // Address field names are dotted-decimal or hex IPs, both unreserved in
    // form encoding, so no percent-decoding is needed here.
    form.split('&')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (value == "on").then(|| name.to_string())
        })
        .collect()
}

/// Escapes the characters that matter inside an HTML text node or a
/// double-quoted attribute value. `addresses` ultimately comes from
/// client-supplied `X-Forwarded-For` data (`extract_address` in
/// `middleware.rs`), so it is never safe to interpolate verbatim even
/// though that function now discards tokens that don't parse as an IP.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render(addresses: &[String], observe: bool) -> impl IntoResponse {
    let mut rows = String::new();
    for addr in addresses {
        let addr = escape_html(addr);
        rows.push_str(&format!(
            "<tr><td>{addr}</td><td><input type=\"checkbox\" name=\"{addr}\"></td></tr>\n"
        ));
    }
    let banner = if observe {
        "<p><em>Observe mode: addresses are tracked but not rejected.</em></p>"
    } else {
        ""
    };
    let html = format!(
        "<!doctype html>\n<html><head><title>Blacklisted addresses</title></head><body>\n\
         <h1>Blacklisted addresses</h1>\n{banner}\n\
         <form method=\"post\">\n<table>\n<tr><th>Address</th><th>Unblock</th></tr>\n{rows}</table>\n\
         <input type=\"submit\" value=\"Unblock selected\">\n</form>\n</body></html>\n"
    );
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checked_boxes_only() {
        let form = "1.2.3.4=on&5.6.7.8=&9.9.9.9=on";
        assert_eq!(
            checked_addresses(form),
            vec!["1.2.3.4".to_string(), "9.9.9.9".to_string()]
        );
    }

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            escape_html("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
        assert_eq!(escape_html("\"onmouseover=\"x"), "&quot;onmouseover=&quot;x");
        assert_eq!(escape_html("1.2.3.4"), "1.2.3.4");
    }
}
