//! URL parsing and rebuilding
//!
//! A small, lossless splitter for the URL shapes that show up in WordPress
//! markup: absolute, protocol-relative (`//host/path`), host-relative
//! (`/wp-content/...`) and bare relative paths. Host case is preserved and
//! nothing is normalized, so `build(parse(u))` gives back `u`.

use std::fmt;

use crate::error::RewriteError;

/// A URL split into its components
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl ParsedUrl {
    /// Split `input` into components.
    ///
    /// An empty input is not an error: it yields an empty structure, which
    /// builds back into an empty string.
    pub fn parse(input: &str) -> Result<Self, RewriteError> {
        let mut parsed = ParsedUrl::default();
        if input.is_empty() {
            return Ok(parsed);
        }

        let rest = match input.split_once('#') {
            Some((rest, fragment)) => {
                parsed.fragment = Some(fragment.to_string());
                rest
            }
            None => input,
        };
        let rest = match rest.split_once('?') {
            Some((rest, query)) => {
                parsed.query = Some(query.to_string());
                rest
            }
            None => rest,
        };

        let path = if let Some(after) = rest.strip_prefix("//") {
            parsed.parse_authority(after, input)?
        } else if let Some((scheme, after)) = split_scheme(rest) {
            parsed.scheme = Some(scheme.to_string());
            match after.strip_prefix("//") {
                Some(after) => parsed.parse_authority(after, input)?,
                None => after,
            }
        } else {
            rest
        };

        parsed.path = path.to_string();
        Ok(parsed)
    }

    /// Consume `user:pass@host:port` and return what follows (the path).
    fn parse_authority<'a>(&mut self, after: &'a str, input: &str) -> Result<&'a str, RewriteError> {
        let (authority, path) = match after.find('/') {
            Some(pos) => (&after[..pos], &after[pos..]),
            None => (after, ""),
        };

        let host_port = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                match userinfo.split_once(':') {
                    Some((user, pass)) => {
                        self.user = Some(user.to_string());
                        self.pass = Some(pass.to_string());
                    }
                    None => self.user = Some(userinfo.to_string()),
                }
                host_port
            }
            None => authority,
        };

        // IPv6 literals keep their brackets as part of the host
        let port_sep = if host_port.starts_with('[') {
            host_port
                .find(']')
                .and_then(|end| host_port[end..].find(':').map(|p| end + p))
        } else {
            host_port.rfind(':')
        };

        let host = match port_sep {
            Some(pos) => {
                let port = &host_port[pos + 1..];
                if !port.is_empty() {
                    let port = port
                        .parse::<u16>()
                        .map_err(|_| RewriteError::MalformedUrl(input.to_string()))?;
                    self.port = Some(port);
                }
                &host_port[..pos]
            }
            None => host_port,
        };

        if host.is_empty() {
            return Err(RewriteError::MalformedUrl(input.to_string()));
        }
        self.host = Some(host.to_string());
        Ok(path)
    }

    /// True for `//host/path` references, which inherit the page's scheme.
    pub fn is_protocol_relative(&self) -> bool {
        self.scheme.is_none() && self.host.is_some()
    }

    /// The last path segment, e.g. `photo-400x300.png`
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Rebuild the URL string.
    ///
    /// A structure with only a scheme builds to `scheme:`; an empty one to `""`.
    pub fn build(&self) -> String {
        let mut out = String::new();

        if let Some(scheme) = &self.scheme {
            out.push_str(scheme);
            out.push(':');
        }
        if let Some(host) = &self.host {
            out.push_str("//");
            if let Some(user) = &self.user {
                out.push_str(user);
                if let Some(pass) = &self.pass {
                    out.push(':');
                    out.push_str(pass);
                }
                out.push('@');
            }
            out.push_str(host);
            if let Some(port) = self.port {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }
        out.push_str(&self.path);
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }

        out
    }
}

/// `http:rest` -> `("http", "rest")`. A `host:8080` prefix is a port, not a scheme.
fn split_scheme(input: &str) -> Option<(&str, &str)> {
    let colon = input.find(':')?;
    let (scheme, after) = (&input[..colon], &input[colon + 1..]);

    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid || after.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    Some((scheme, after))
}

/// Ordered query parameters.
///
/// Keys written without `=` (`?flag`) keep that shape when rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, Option<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(query: &str) -> Self {
        let pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (pair.to_string(), None),
            })
            .collect();

        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Append without checking for an existing key
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), Some(value.into())));
    }

    /// Replace the first `key` in place (dropping any later repeats), or append it
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.pairs[pos].1 = value;
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    index += 1;
                    index - 1 <= pos || k != key
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// `self` followed by `existing`, dropping existing keys that `self` already sets
    pub fn merged_before(mut self, existing: &QueryParams) -> Self {
        for (key, value) in &existing.pairs {
            if !self.contains_key(key) {
                self.pairs.push((key.clone(), value.clone()));
            }
        }
        self
    }

    /// Join as a query string and glue the raw `existing` query after it.
    ///
    /// Keys are not compared, so a key present in both shows up twice.
    /// Returns `None` when there is nothing at all to put after `?`.
    pub fn prepend_to(&self, existing: Option<&str>) -> Option<String> {
        let fresh = self.to_string();
        match existing.filter(|q| !q.is_empty()) {
            Some(existing) if fresh.is_empty() => Some(existing.to_string()),
            Some(existing) => Some(format!("{}&{}", fresh, existing)),
            None if fresh.is_empty() => None,
            None => Some(fresh),
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            f.write_str(key)?;
            if let Some(value) = value {
                write!(f, "={}", value)?;
            }
        }
        Ok(())
    }
}
