//! Session cookie serialization.
//!
//! Builds and clears the `mw_session` cookie and parses incoming `Cookie`
//! headers. Parsing is lenient: missing header means no cookies, malformed
//! pairs are skipped, and invalid percent-escapes pass through unchanged.

use std::collections::HashMap;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "mw_session";

/// `Set-Cookie` value carrying a session token.
///
/// `secure` should be set when the request arrived over TLS (directly or
/// per a trusted `x-forwarded-proto` header).
pub fn session_cookie(token: &str, secure: bool, max_age_secs: u64) -> String {
    let secure_attr = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict{secure_attr}; Max-Age={max_age_secs}"
    )
}

/// `Set-Cookie` value that expires the session cookie immediately.
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
}

/// Parse a `Cookie` header into name/value pairs.
///
/// Keys and values are trimmed of surrounding whitespace; values are
/// percent-decoded. Pairs without `=` or with an empty name are skipped.
pub fn parse_cookies(header: Option<&str>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(header) = header else {
        return out;
    };
    for part in header.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        out.insert(key.to_owned(), percent_decode(value.trim()));
    }
    out
}

// Lenient %XX decoding; anything that is not a valid escape is kept as-is.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).copied().and_then(hex_val),
                bytes.get(i + 2).copied().and_then(hex_val),
            ) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
