//! HTTP Basic (RFC 7617) and Digest (RFC 7616, MD5 only) authentication.

use std::collections::HashMap;

use base64::Engine;
use rand::Rng;

/// State of a Digest challenge, reused across requests until the server
/// sends a new one.
#[derive(Debug, Clone)]
pub struct DigestAuth {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// True when the server offered `qop=auth`.
    pub qop_auth: bool,
    pub algorithm: String,
    nc: u32,
}

impl DigestAuth {
    /// Parses a `WWW-Authenticate: Digest ...` challenge.
    ///
    /// Returns `None` for other schemes or when `realm`/`nonce` is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, rest) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let mut params = parse_auth_params(rest);
        let realm = params.remove("realm")?;
        let nonce = params.remove("nonce")?;
        let qop_auth = params
            .get("qop")
            .is_some_and(|qop| qop.split(',').any(|q| q.trim() == "auth"));

        Some(Self {
            realm,
            nonce,
            opaque: params.remove("opaque"),
            qop_auth,
            algorithm: params
                .remove("algorithm")
                .unwrap_or_else(|| "MD5".to_string()),
            nc: 0,
        })
    }

    /// Builds the `Authorization` header for one request and bumps the
    /// nonce count.
    pub fn authorize(&mut self, method: &str, uri: &str, username: &str, password: &str) -> String {
        self.nc += 1;
        let nc = format!("{:08x}", self.nc);
        let cnonce = generate_cnonce();

        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let response = if self.qop_auth {
            md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        };

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm={}",
            username, self.realm, self.nonce, uri, response, self.algorithm
        );
        if self.qop_auth {
            header.push_str(&format!(", qop=auth, nc={}, cnonce=\"{}\"", nc, cnonce));
        }
        if let Some(ref opaque) = self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }
}

/// Builds a Basic `Authorization` header.
pub fn basic_auth(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

/// Parses `key=value, key="quoted, value"` pairs. Keys are lowercased.
fn parse_auth_params(content: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = content.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_lowercase();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                match (escaped, c) {
                    (true, c) => {
                        value.push(c);
                        escaped = false;
                    }
                    (false, '\\') => escaped = true,
                    (false, '"') => break,
                    (false, c) => value.push(c),
                }
            }
        } else {
            value = chars
                .by_ref()
                .take_while(|c| *c != ',' && !c.is_whitespace())
                .collect();
        }

        params.insert(key, value);
    }

    params
}

fn generate_cnonce() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_challenge() {
        let auth = DigestAuth::parse(
            r#"Digest realm="contacts", nonce="n0nce", qop="auth,auth-int", opaque="xyz""#,
        )
        .unwrap();

        assert_eq!(auth.realm, "contacts");
        assert_eq!(auth.nonce, "n0nce");
        assert!(auth.qop_auth);
        assert_eq!(auth.opaque.as_deref(), Some("xyz"));
        assert_eq!(auth.algorithm, "MD5");
    }

    #[test]
    fn parse_is_case_insensitive_on_scheme() {
        assert!(DigestAuth::parse(r#"digest realm="r", nonce="n""#).is_some());
    }

    #[test]
    fn parse_rejects_other_schemes_and_incomplete_challenges() {
        assert!(DigestAuth::parse(r#"Basic realm="contacts""#).is_none());
        assert!(DigestAuth::parse(r#"Digest realm="contacts""#).is_none());
    }

    #[test]
    fn quoted_values_keep_commas() {
        let params = parse_auth_params(r#"realm="a, b", nonce=abc"#);
        assert_eq!(params["realm"], "a, b");
        assert_eq!(params["nonce"], "abc");
    }

    #[test]
    fn authorize_without_qop_is_deterministic() {
        let mut auth = DigestAuth::parse(r#"Digest realm="contacts", nonce="n0nce""#).unwrap();
        let header = auth.authorize("REPORT", "/addressbooks/alice/contacts/", "alice", "s3cret");

        assert!(header.contains(r#"response="9c3bf70739f5d60eeed085a37552ad37""#));
        assert!(!header.contains("qop="));
    }

    #[test]
    fn authorize_with_qop_counts_nonces() {
        let mut auth = DigestAuth::parse(r#"Digest realm="r", nonce="n", qop="auth""#).unwrap();

        let first = auth.authorize("GET", "/", "u", "p");
        let second = auth.authorize("GET", "/", "u", "p");

        assert!(first.contains("nc=00000001"));
        assert!(second.contains("nc=00000002"));
        assert!(first.contains("cnonce=\""));
    }

    #[test]
    fn basic_header() {
        assert_eq!(basic_auth("alice", "s3cret"), "Basic YWxpY2U6czNjcmV0");
    }
}
