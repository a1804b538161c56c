//! Conditional request evaluation (RFC 9110, section 13).

use axum::http::HeaderMap;
use axum::http::header::{IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_UNMODIFIED_SINCE};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Outcome of evaluating a request's conditional headers.
///
/// Ordered so that the combined outcome of several headers is their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum PreconditionState {
    /// No conditional headers applied
    Unspecified,
    /// The client's copy is current
    NotModified,
    /// Conditions hold; serve the representation
    ShouldProcess,
    /// A precondition does not hold
    PreconditionFailed,
}

/// An entity tag, strong or weak.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag {
    weak: bool,
    tag: String,
}

impl EntityTag {
    /// Strong validator.
    pub fn strong(tag: impl Into<String>) -> Self {
        Self {
            weak: false,
            tag: tag.into(),
        }
    }

    /// Weak validator.
    pub fn weak(tag: impl Into<String>) -> Self {
        Self {
            weak: true,
            tag: tag.into(),
        }
    }

    /// Validator for a stored asset, derived from its modification time and size.
    pub fn for_asset(last_modified: &DateTime<Utc>, length: u64) -> Self {
        Self::weak(format!(
            "{:x}-{:x}",
            last_modified.timestamp().max(0),
            length
        ))
    }

    /// Whether this is a weak validator.
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Strong comparison: both strong and identical.
    pub fn strong_eq(&self, other: &Self) -> bool {
        !self.weak && !other.weak && self.tag == other.tag
    }

    /// Weak comparison: identical opaque tags.
    pub fn weak_eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl std::fmt::Display for EntityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.weak {
            write!(f, "W/\"{}\"", self.tag)
        } else {
            write!(f, "\"{}\"", self.tag)
        }
    }
}

/// Value of an `If-Match` or `If-None-Match` header.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TagCondition {
    Any,
    Tags(Vec<EntityTag>),
}

impl TagCondition {
    fn parse(headers: &HeaderMap, name: &axum::http::HeaderName) -> Option<Self> {
        let mut tags = Vec::new();
        let mut present = false;

        for value in headers.get_all(name) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            present = true;
            if value.trim() == "*" {
                return Some(Self::Any);
            }
            tags.extend(parse_tag_list(value));
        }

        present.then_some(Self::Tags(tags))
    }

    fn matches(&self, etag: &EntityTag, strong: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Tags(tags) => tags.iter().any(|candidate| {
                if strong {
                    candidate.strong_eq(etag)
                } else {
                    candidate.weak_eq(etag)
                }
            }),
        }
    }
}

/// Parse a comma-separated list of entity tags, stopping at the first malformed one.
fn parse_tag_list(value: &str) -> Vec<EntityTag> {
    let mut tags = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_ascii_whitespace());
        if rest.is_empty() {
            break;
        }

        let (weak, quoted) = match rest.strip_prefix("W/") {
            Some(quoted) => (true, quoted),
            None => (false, rest),
        };
        let Some(quoted) = quoted.strip_prefix('"') else {
            break;
        };
        let Some(end) = quoted.find('"') else {
            break;
        };

        let tag = &quoted[..end];
        tags.push(if weak {
            EntityTag::weak(tag)
        } else {
            EntityTag::strong(tag)
        });
        rest = &quoted[end + 1..];
    }

    tags
}

/// Conditional headers captured from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    if_match: Option<TagCondition>,
    if_none_match: Option<TagCondition>,
    if_modified_since: Option<DateTime<Utc>>,
    if_unmodified_since: Option<DateTime<Utc>>,
}

impl ConditionalHeaders {
    /// Capture the conditional headers; unparseable dates are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            if_match: TagCondition::parse(headers, &IF_MATCH),
            if_none_match: TagCondition::parse(headers, &IF_NONE_MATCH),
            if_modified_since: header_date(headers, &IF_MODIFIED_SINCE),
            if_unmodified_since: header_date(headers, &IF_UNMODIFIED_SINCE),
        }
    }

    /// Whether any conditional header was present.
    pub fn is_empty(&self) -> bool {
        self.if_match.is_none()
            && self.if_none_match.is_none()
            && self.if_modified_since.is_none()
            && self.if_unmodified_since.is_none()
    }

    /// Evaluate against an asset's validators at the current time.
    pub fn evaluate(&self, last_modified: &DateTime<Utc>, etag: &EntityTag) -> PreconditionState {
        self.evaluate_at(last_modified, etag, Utc::now())
    }

    /// Evaluate against an asset's validators.
    ///
    /// `If-Unmodified-Since` only applies without `If-Match`, and
    /// `If-Modified-Since` only without `If-None-Match`. Dates compare at
    /// one-second resolution; `If-Modified-Since` dates after `now` are ignored.
    pub fn evaluate_at(
        &self,
        last_modified: &DateTime<Utc>,
        etag: &EntityTag,
        now: DateTime<Utc>,
    ) -> PreconditionState {
        let modified = last_modified.timestamp();

        let if_match = match (&self.if_match, &self.if_unmodified_since) {
            (Some(condition), _) => {
                if condition.matches(etag, true) {
                    PreconditionState::ShouldProcess
                } else {
                    PreconditionState::PreconditionFailed
                }
            }
            (None, Some(since)) => {
                if modified <= since.timestamp() {
                    PreconditionState::ShouldProcess
                } else {
                    PreconditionState::PreconditionFailed
                }
            }
            (None, None) => PreconditionState::Unspecified,
        };

        let if_none_match = match (&self.if_none_match, &self.if_modified_since) {
            (Some(condition), _) => {
                if condition.matches(etag, false) {
                    PreconditionState::NotModified
                } else {
                    PreconditionState::ShouldProcess
                }
            }
            (None, Some(since)) if *since <= now => {
                if modified > since.timestamp() {
                    PreconditionState::ShouldProcess
                } else {
                    PreconditionState::NotModified
                }
            }
            (None, _) => PreconditionState::Unspecified,
        };

        if_match.max(if_none_match)
    }
}

fn header_date(headers: &HeaderMap, name: &axum::http::HeaderName) -> Option<DateTime<Utc>> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
}

/// Parse an HTTP date in IMF-fixdate, RFC 850 or asctime form.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }

    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as an IMF-fixdate.
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
