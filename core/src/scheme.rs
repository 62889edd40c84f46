//! Virtual URL schemes and URL classification.
//!
//! # Design
//! The registry is filled once while the bridge is built and then shared
//! behind an `Arc` without locks; `classify` takes `&self` only. A scheme is
//! identified by its (name, domain) pair, compared case-insensitively. An
//! empty domain matches any host.

use url::Url;

use crate::error::SchemeError;

/// What the engine should do with URLs of a scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlSchemeType {
    /// Requests routed to application handlers by this bridge.
    LocalRequest,
    /// Files served from the local file system.
    LocalResource,
    /// Resources embedded in the application binary.
    EmbeddedResource,
    /// Requests forwarded to a real remote endpoint.
    ExternalRequest,
}

/// A registered virtual scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlScheme {
    name: String,
    domain: String,
    scheme_type: UrlSchemeType,
}

impl UrlScheme {
    pub fn new(name: &str, domain: &str, scheme_type: UrlSchemeType) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
            domain: domain.trim().to_ascii_lowercase(),
            scheme_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn scheme_type(&self) -> UrlSchemeType {
        self.scheme_type
    }

    /// True if `url` uses this scheme name and (unless the domain is empty)
    /// this host.
    pub fn matches(&self, url: &Url) -> bool {
        if !url.scheme().eq_ignore_ascii_case(&self.name) {
            return false;
        }
        if self.domain.is_empty() {
            return true;
        }
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.domain))
    }

    fn same_identity(&self, other: &UrlScheme) -> bool {
        self.name == other.name && self.domain == other.domain
    }
}

/// Registered schemes, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    schemes: Vec<UrlScheme>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: UrlScheme) -> Result<(), SchemeError> {
        if scheme.name.is_empty() {
            return Err(SchemeError::EmptyName);
        }
        if self.schemes.iter().any(|s| s.same_identity(&scheme)) {
            return Err(SchemeError::Duplicate {
                name: scheme.name,
                domain: scheme.domain,
            });
        }
        self.schemes.push(scheme);
        Ok(())
    }

    /// Find the scheme that owns `url`.
    ///
    /// A `LocalRequest` match takes precedence; otherwise the first match in
    /// registration order is returned. Unparseable URLs match nothing.
    pub fn classify(&self, url: &str) -> Option<&UrlScheme> {
        let parsed = Url::parse(url).ok()?;
        self.classify_url(&parsed)
    }

    pub fn classify_url(&self, url: &Url) -> Option<&UrlScheme> {
        let mut matching = self.schemes.iter().filter(|s| s.matches(url));
        let first = matching.next()?;
        if first.scheme_type == UrlSchemeType::LocalRequest {
            return Some(first);
        }
        matching
            .find(|s| s.scheme_type == UrlSchemeType::LocalRequest)
            .or(Some(first))
    }

    /// True if `url` belongs to a registered `LocalRequest` scheme.
    pub fn is_local_request(&self, url: &str) -> bool {
        self.classify(url)
            .is_some_and(|s| s.scheme_type == UrlSchemeType::LocalRequest)
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}
