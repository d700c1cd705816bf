//! Path templates.
//!
//! A template is a `/`-separated list of segments. Each segment is a literal,
//! a `{name}` parameter that captures one path segment, or (last only) a `*`
//! wildcard that captures the remainder of the path.

use std::cmp::Reverse;
use std::fmt;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// A path template that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid path template {template:?}: {reason}")]
pub struct TemplateError {
    pub template: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path template such as `/users/{id}/files/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

/// Ordering key; larger is more specific.
pub type Specificity = (usize, bool, Reverse<usize>);

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let fail = |reason: &str| TemplateError {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        if !template.starts_with('/') {
            return Err(fail("must start with '/'"));
        }

        let parts: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut wildcard = false;

        for (index, part) in parts.iter().enumerate() {
            if *part == "*" {
                if index + 1 != parts.len() {
                    return Err(fail("'*' is only allowed as the last segment"));
                }
                wildcard = true;
                continue;
            }
            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(fail("parameter names must be non-empty and unbraced"));
                }
                segments.push(Segment::Param(name.to_string()));
                continue;
            }
            if part.contains(['{', '}', '*']) {
                return Err(fail("'{', '}' and '*' must form whole segments"));
            }
            segments.push(Segment::Literal(part.to_string()));
        }

        let mut raw = String::new();
        for segment in &segments {
            raw.push('/');
            match segment {
                Segment::Literal(s) => raw.push_str(s),
                Segment::Param(name) => {
                    raw.push('{');
                    raw.push_str(name);
                    raw.push('}');
                }
            }
        }
        if wildcard {
            raw.push_str("/*");
        }
        if raw.is_empty() {
            raw.push('/');
        }

        Ok(Self {
            raw,
            segments,
            wildcard,
        })
    }

    /// The canonical form, with empty segments removed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning the captured parameters on success.
    ///
    /// The wildcard capture is stored under `*`.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        // Segments are split before decoding so an encoded '/' stays inside one.
        let parts: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();
        if parts.len() < self.segments.len() {
            return None;
        }
        if !self.wildcard && parts.len() != self.segments.len() {
            return None;
        }

        let mut captured = Vec::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => captured.push((name.clone(), part.clone())),
            }
        }
        if self.wildcard {
            captured.push(("*".to_string(), parts[self.segments.len()..].join("/")));
        }
        Some(captured)
    }

    /// More literal segments first, then no wildcard, then fewer parameters.
    pub fn specificity(&self) -> Specificity {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let params = self.segments.len() - literals;
        (literals, !self.wildcard, Reverse(params))
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_template() {
        let t = PathTemplate::parse("/hello//world/").unwrap();
        assert_eq!(t.as_str(), "/hello/world");
        assert_eq!(t.matches("/hello/world"), Some(vec![]));
        assert_eq!(t.matches("/hello/world/"), Some(vec![]));
        assert_eq!(t.matches("/hello"), None);
        assert_eq!(t.matches("/hello/world/again"), None);
    }

    #[test]
    fn test_root_template() {
        let t = PathTemplate::parse("/").unwrap();
        assert_eq!(t.as_str(), "/");
        assert!(t.matches("/").is_some());
        assert!(t.matches("/x").is_none());
    }

    #[test]
    fn test_params_and_wildcard() {
        let t = PathTemplate::parse("/users/{id}/files/*").unwrap();
        let captured = t.matches("/users/42/files/a/b.txt").unwrap();
        assert_eq!(
            captured,
            vec![
                ("id".to_string(), "42".to_string()),
                ("*".to_string(), "a/b.txt".to_string()),
            ]
        );
        let empty_tail = t.matches("/users/42/files").unwrap();
        assert_eq!(empty_tail[1], ("*".to_string(), String::new()));
    }

    #[test]
    fn test_captures_are_percent_decoded() {
        let t = PathTemplate::parse("/files/{name}/*").unwrap();
        let captured = t.matches("/files/a%20b+c/x%2Fy/z").unwrap();
        assert_eq!(
            captured,
            vec![
                ("name".to_string(), "a b+c".to_string()),
                ("*".to_string(), "x/y/z".to_string()),
            ]
        );

        let literal = PathTemplate::parse("/caf\u{e9}").unwrap();
        assert!(literal.matches("/caf%C3%A9").is_some());
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert!(PathTemplate::parse("users").is_err());
        assert!(PathTemplate::parse("/a/*/b").is_err());
        assert!(PathTemplate::parse("/a/{}").is_err());
        assert!(PathTemplate::parse("/a/x{id}").is_err());
        assert!(PathTemplate::parse("/a/{id").is_err());
    }

    #[test]
    fn test_specificity_ordering() {
        let literal = PathTemplate::parse("/users/me").unwrap();
        let param = PathTemplate::parse("/users/{id}").unwrap();
        let wildcard = PathTemplate::parse("/users/*").unwrap();
        assert!(literal.specificity() > param.specificity());
        assert!(param.specificity() > wildcard.specificity());
        assert!(
            PathTemplate::parse("/users").unwrap().specificity() > wildcard.specificity()
        );
    }
}
