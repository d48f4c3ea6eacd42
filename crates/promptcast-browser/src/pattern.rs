//! Extension-style URL match patterns (`https://chatgpt.com/*`).
//!
//! Grammar: `<all_urls>` or `<scheme>://<host><path>` where scheme is `*`
//! (http or https) or a literal scheme, host is `*`, `*.<domain>` or a
//! literal host, and path is a glob in which `*` matches any run of
//! characters. Ports are ignored on the URL side.

use regex::Regex;

use promptcast_core::{Error, Result};

#[derive(Debug, Clone)]
enum SchemeMatch {
    HttpOrHttps,
    Exact(String),
}

#[derive(Debug, Clone)]
enum HostMatch {
    Any,
    /// Domain and all of its subdomains.
    Suffix(String),
    Exact(String),
}

/// A compiled URL match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    raw: String,
    scheme: SchemeMatch,
    host: HostMatch,
    path: Regex,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern == "<all_urls>" {
            return Ok(Self {
                raw: pattern.to_string(),
                scheme: SchemeMatch::HttpOrHttps,
                host: HostMatch::Any,
                path: glob_to_regex("/*").map_err(|e| invalid(&e))?,
            });
        }

        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme separator"))?;
        let scheme = match scheme {
            "*" => SchemeMatch::HttpOrHttps,
            "" => return Err(invalid("empty scheme")),
            s if s.contains('*') => return Err(invalid("wildcard scheme must be '*'")),
            s => SchemeMatch::Exact(s.to_lowercase()),
        };

        let slash = rest.find('/').ok_or_else(|| invalid("missing path"))?;
        let (host, path) = rest.split_at(slash);
        let host = match host {
            "*" => HostMatch::Any,
            "" if matches!(&scheme, SchemeMatch::Exact(s) if s == "file") => HostMatch::Any,
            "" => return Err(invalid("empty host")),
            h if h.starts_with("*.") && !h[2..].contains('*') => {
                HostMatch::Suffix(h[2..].to_lowercase())
            }
            h if h.contains('*') => {
                return Err(invalid("'*' in host must be the whole host or a leading '*.'"))
            }
            h => HostMatch::Exact(h.to_lowercase()),
        };

        Ok(Self {
            raw: pattern.to_string(),
            scheme,
            host,
            path: glob_to_regex(path).map_err(|e| invalid(&e))?,
        })
    }

    /// Whether `url` is matched by this pattern.
    pub fn matches(&self, url: &str) -> bool {
        let Some((scheme, rest)) = url.split_once("://") else {
            return false;
        };
        let scheme = scheme.to_lowercase();

        let scheme_ok = match &self.scheme {
            SchemeMatch::HttpOrHttps => scheme == "http" || scheme == "https",
            SchemeMatch::Exact(s) => *s == scheme,
        };
        if !scheme_ok {
            return false;
        }

        let authority_end = rest
            .find(|c| matches!(c, '/' | '?' | '#'))
            .unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);
        let host = authority
            .rsplit_once('@')
            .map_or(authority, |(_, h)| h)
            .to_lowercase();
        let host = strip_port(&host);

        let host_ok = match &self.host {
            HostMatch::Any => true,
            HostMatch::Exact(h) => host == h,
            HostMatch::Suffix(domain) => {
                host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        };
        if !host_ok {
            return false;
        }

        let path = tail.split('#').next().unwrap_or("");
        let path = if path.is_empty() || path.starts_with('?') {
            format!("/{path}")
        } else {
            path.to_string()
        };
        self.path.is_match(&path)
    }
}

impl std::fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets; a port follows the closing bracket.
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.rsplit_once(':').map_or(host, |(h, _)| h)
}

fn glob_to_regex(glob: &str) -> std::result::Result<Regex, String> {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).map_err(|e| e.to_string())
}
