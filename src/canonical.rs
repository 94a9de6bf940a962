//! URL canonicalization.
//!
//! Every link surfaced by this crate passes through [`Canonicalizer::canonicalize`].
//! A canonical URL:
//!
//! - has no surrounding whitespace or quotes, no trailing periods and no
//!   redundant trailing slashes (a single path-terminating `/` is kept);
//! - encodes internal spaces as `%20`;
//! - uses the `https://` scheme (rewritten from `http://`, a bare `://`
//!   prefix, or a bare `www` host);
//! - matches no blacklist fragment;
//! - is syntactically valid and points at a publicly routable host.
//!
//! Rejections are reported as [`InvalidUrl`] carrying the offending input.
//! Callers log them and drop the candidate.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use url::{Host, Url};

use crate::blacklist::Blacklist;

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    Blacklisted,
    UnsupportedScheme(String),
    Malformed(String),
    NotPublic(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "empty after trimming"),
            RejectReason::Blacklisted => write!(f, "matches blacklist"),
            RejectReason::UnsupportedScheme(s) => write!(f, "unsupported scheme '{}'", s),
            RejectReason::Malformed(e) => write!(f, "malformed: {}", e),
            RejectReason::NotPublic(host) => write!(f, "host '{}' is not public", host),
        }
    }
}

/// A raw candidate failed canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid URL {url:?}: {reason}")]
pub struct InvalidUrl {
    /// The raw input as it was handed to the canonicalizer.
    pub url: String,
    pub reason: RejectReason,
}

/// Normalizes and validates raw URL strings against a shared blacklist.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    blacklist: Arc<Blacklist>,
}

impl Canonicalizer {
    pub fn new(blacklist: Arc<Blacklist>) -> Self {
        Self { blacklist }
    }

    /// Canonicalizer with an empty blacklist.
    pub fn permissive() -> Self {
        Self::new(Arc::new(Blacklist::empty()))
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Canonicalize one raw candidate, or reject it.
    pub fn canonicalize(&self, raw: &str) -> Result<String, InvalidUrl> {
        let reject = |reason| InvalidUrl {
            url: raw.to_string(),
            reason,
        };

        let sanitized = sanitize(raw);
        if sanitized.is_empty() {
            return Err(reject(RejectReason::Empty));
        }
        if sanitized.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(reject(RejectReason::Malformed(
                "contains whitespace or control characters".to_string(),
            )));
        }
        let url = normalize_scheme(sanitized);

        if self.blacklist.is_match(&url) {
            return Err(reject(RejectReason::Blacklisted));
        }
        check_public_url(&url).map_err(reject)?;

        Ok(url)
    }
}

/// Strip surrounding junk and encode internal spaces.
fn sanitize(raw: &str) -> String {
    let mut s = raw;
    let mut keep_slash = false;
    loop {
        s = s.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
        let body = s.trim_end_matches(['.', '/']);
        if body.len() == s.len() {
            break;
        }
        keep_slash = s[body.len()..].starts_with('/');
        s = body;
    }

    let mut out = s.replace(' ', "%20");
    if keep_slash && !out.is_empty() {
        out.push('/');
    }
    out
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Rewrite the scheme prefix to `https://`. Only the prefix is touched.
fn normalize_scheme(url: String) -> String {
    if starts_with_ignore_case(&url, "https://") {
        format!("https://{}", &url["https://".len()..])
    } else if starts_with_ignore_case(&url, "http://") {
        format!("https://{}", &url["http://".len()..])
    } else if let Some(rest) = url.strip_prefix("://") {
        format!("https://{}", rest)
    } else if starts_with_ignore_case(&url, "www") {
        format!("https://{}", url)
    } else {
        url
    }
}

/// TLDs that never resolve on the public internet.
const PRIVATE_TLDS: &[&str] = &[
    "localhost",
    "local",
    "localdomain",
    "internal",
    "intranet",
    "lan",
    "home",
    "corp",
    "test",
    "invalid",
];

/// Host as written in the candidate's authority, without userinfo or port.
fn written_host(candidate: &str) -> &str {
    let rest = candidate.split_once("://").map_or(candidate, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    if host_port.starts_with('[') {
        host_port.find(']').map_or(host_port, |i| &host_port[..=i])
    } else {
        host_port.split_once(':').map_or(host_port, |(h, _)| h)
    }
}

/// The returned string is the candidate itself, so the host the parser saw
/// must be the one written there.
fn check_written_host(written: &str, parsed: &str) -> Result<(), RejectReason> {
    if written.is_empty() {
        return Err(RejectReason::Malformed("empty authority".to_string()));
    }
    // Non-ASCII hosts are compared after IDNA by the parser; leave them be.
    if written.is_ascii() && !written.eq_ignore_ascii_case(parsed) {
        return Err(RejectReason::Malformed(format!(
            "host '{}' parses as '{}'",
            written, parsed
        )));
    }
    Ok(())
}

fn check_public_url(candidate: &str) -> Result<(), RejectReason> {
    let parsed = Url::parse(candidate).map_err(|e| RejectReason::Malformed(e.to_string()))?;
    if parsed.scheme() != "https" {
        return Err(RejectReason::UnsupportedScheme(parsed.scheme().to_string()));
    }
    let written = written_host(candidate);
    match parsed.host() {
        None => Err(RejectReason::Malformed("missing host".to_string())),
        Some(Host::Domain(domain)) => {
            check_written_host(written, domain)?;
            check_domain(domain)
        }
        Some(Host::Ipv4(ip)) => {
            check_written_host(written, &ip.to_string())?;
            if is_public_ipv4(ip) {
                Ok(())
            } else {
                Err(RejectReason::NotPublic(ip.to_string()))
            }
        }
        Some(Host::Ipv6(ip)) => {
            check_written_host(written, &format!("[{}]", ip))?;
            if is_public_ipv6(ip) {
                Ok(())
            } else {
                Err(RejectReason::NotPublic(ip.to_string()))
            }
        }
    }
}

fn check_domain(domain: &str) -> Result<(), RejectReason> {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(RejectReason::NotPublic(domain.to_string()));
    }
    for label in &labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(RejectReason::Malformed(format!(
                "invalid host label '{}'",
                label
            )));
        }
    }

    let tld = labels[labels.len() - 1];
    let tld_ok = tld.starts_with("xn--")
        || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));
    if !tld_ok {
        return Err(RejectReason::Malformed(format!("invalid TLD '{}'", tld)));
    }
    if PRIVATE_TLDS.contains(&tld) {
        return Err(RejectReason::NotPublic(domain.to_string()));
    }
    Ok(())
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        || ip.is_multicast()
        || a == 0
        || a >= 240
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64))
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(v4);
    }
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(raw: &str) -> Result<String, InvalidUrl> {
        Canonicalizer::permissive().canonicalize(raw)
    }

    #[test]
    fn test_http_rewritten_rest_untouched() {
        assert_eq!(canon("http://EXAMPLE.com/").unwrap(), "https://EXAMPLE.com/");
    }

    #[test]
    fn test_bare_www_gets_scheme() {
        assert_eq!(
            canon("  www.example.com  ").unwrap(),
            "https://www.example.com"
        );
    }

    #[test]
    fn test_https_left_alone() {
        assert_eq!(
            canon("https://example.com/a?b=c#d").unwrap(),
            "https://example.com/a?b=c#d"
        );
    }

    #[test]
    fn test_bare_scheme_separator() {
        assert_eq!(
            canon("://example.org/paper").unwrap(),
            "https://example.org/paper"
        );
    }

    #[test]
    fn test_uppercase_scheme() {
        assert_eq!(canon("HTTP://example.org").unwrap(), "https://example.org");
    }

    #[test]
    fn test_trims_quotes_and_trailing_punctuation() {
        assert_eq!(
            canon("\"https://example.com/page\".").unwrap(),
            "https://example.com/page"
        );
        assert_eq!(
            canon("'https://example.com/dir/'").unwrap(),
            "https://example.com/dir/"
        );
        assert_eq!(
            canon("https://example.com/dir//...").unwrap(),
            "https://example.com/dir/"
        );
        assert_eq!(
            canon("https://example.com./").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_internal_spaces_encoded() {
        assert_eq!(
            canon("https://example.com/my file.pdf").unwrap(),
            "https://example.com/my%20file.pdf"
        );
    }

    #[test]
    fn test_blacklisted_rejected() {
        let blacklist = Blacklist::parse("doubleclick\\.net\n").unwrap();
        let c = Canonicalizer::new(Arc::new(blacklist));
        let err = c
            .canonicalize("http://ad.DoubleClick.net/x")
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::Blacklisted);
        assert_eq!(err.url, "http://ad.DoubleClick.net/x");
        assert!(c.canonicalize("https://example.net/x").is_ok());
    }

    #[test]
    fn test_private_and_loopback_rejected() {
        for raw in [
            "http://localhost:8080/",
            "https://127.0.0.1/admin",
            "https://10.1.2.3",
            "https://192.168.0.10/router",
            "https://[::1]/",
            "https://[fd00::1]/",
            "https://printer.local/",
        ] {
            let err = canon(raw).unwrap_err();
            assert!(
                matches!(err.reason, RejectReason::NotPublic(_)),
                "{} -> {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_public_ip_accepted() {
        assert!(canon("https://8.8.8.8/dns").is_ok());
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(canon("https://exa mple").is_err());
        assert!(canon("https://-bad-.com").is_err());
        assert!(canon("https://example.c0m").is_err());
        assert!(canon("not a url at all").is_err());
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let err = canon("ftp://example.com/file").unwrap_err();
        assert!(matches!(err.reason, RejectReason::UnsupportedScheme(_)));
        let err = canon("mailto:someone@example.com").unwrap_err();
        assert!(matches!(err.reason, RejectReason::UnsupportedScheme(_)));
    }

    #[test]
    fn test_empty_rejected() {
        let err = canon("  \"./ ").unwrap_err();
        assert_eq!(err.reason, RejectReason::Empty);
    }

    #[test]
    fn test_embedded_control_characters_rejected() {
        for raw in [
            "https://exa\tmple.com/x",
            "https://example.com/a\nb",
            "http://www.exam\rple.org",
            "https://example.com/\u{7f}x",
        ] {
            let err = canon(raw).unwrap_err();
            assert!(
                matches!(err.reason, RejectReason::Malformed(_)),
                "{:?} -> {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_empty_authority_rejected() {
        let err = canon("https:///example.com").unwrap_err();
        assert!(matches!(err.reason, RejectReason::Malformed(_)));
        assert!(canon("http:////example.com/x").is_err());
    }

    #[test]
    fn test_host_rewritten_by_parser_rejected() {
        assert!(canon("https://ex%61mple.com/").is_err());
        assert!(canon("https://0x08.8.8.8/").is_err());
    }

    #[test]
    fn test_userinfo_and_port_keep_host_check() {
        assert_eq!(
            canon("https://user@Example.com:8443/a").unwrap(),
            "https://user@Example.com:8443/a"
        );
        assert!(canon("https://[2606:4700::1111]/").is_ok());
    }

    #[test]
    fn test_idempotent() {
        let once = canon("http://www.example.com/a b/").unwrap();
        assert_eq!(canon(&once).unwrap(), once);
    }
}
