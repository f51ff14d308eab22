//! Remote document ratings
//!
//! The rating store lives behind an HTTP endpoint. A visitor reads the
//! aggregate for a document with a GET and rates it with a JSON POST.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use log::{debug, warn};

use crate::capabilities::Capabilities;

pub const DEFAULT_RETRIES: u32 = 2;
pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RatingsError {
    #[error("rating must be between 0 and 5, got {0}")]
    InvalidRating(u8),

    #[error("ratings endpoint is not configured")]
    NoEndpoint,

    #[error("ratings are not available in the free variant")]
    Disabled,

    #[error("ratings service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("ratings service unreachable: {0}")]
    Transport(String),

    #[error("unexpected ratings response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RatingsError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A star rating; zero removes the visitor's rating
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const REMOVE: Rating = Rating(0);
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, RatingsError> {
        if stars > Self::MAX {
            return Err(RatingsError::InvalidRating(stars));
        }
        Ok(Self(stars))
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    pub fn is_removal(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_removal() {
            write!(f, "no rating")
        } else {
            write!(f, "{}/{}", self.0, Self::MAX)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RatingSummary {
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub user_rating: Option<u8>,
}

#[derive(Debug, Serialize)]
struct RatingSubmission<'a> {
    document_id: &'a str,
    visitor_id: &'a str,
    rating: Rating,
}

pub struct RatingsClient {
    endpoint: String,
    visitor_id: String,
    retries: u32,
    backoff: Duration,
    agent: ureq::Agent,
}

impl RatingsClient {
    pub fn new(endpoint: impl Into<String>, visitor_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            visitor_id: visitor_id.into(),
            retries: DEFAULT_RETRIES,
            backoff: RETRY_BACKOFF,
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    /// Client for the configured endpoint and persisted visitor id.
    ///
    /// Fails with [`RatingsError::Disabled`] in the free variant.
    pub fn from_settings(capabilities: Capabilities) -> Result<Self, RatingsError> {
        if !capabilities.ratings_enabled() {
            return Err(RatingsError::Disabled);
        }
        let endpoint = crate::settings::get_ratings_endpoint().ok_or(RatingsError::NoEndpoint)?;
        Ok(Self::new(endpoint, crate::settings::visitor_id()))
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    pub fn fetch(&self, document_id: &str) -> Result<RatingSummary, RatingsError> {
        let body = self.with_retry(|| {
            let resp = self
                .agent
                .get(&self.endpoint)
                .query("document_id", document_id)
                .query("visitor_id", &self.visitor_id)
                .call()
                .map_err(map_ureq_error)?;
            resp.into_string()
                .map_err(|e| RatingsError::Transport(e.to_string()))
        })?;
        parse_summary(&body)
    }

    /// Submit `rating` and return the updated aggregate
    pub fn submit(&self, document_id: &str, rating: Rating) -> Result<RatingSummary, RatingsError> {
        let payload = submission_body(document_id, &self.visitor_id, rating)?;
        let body = self.with_retry(|| {
            let resp = self
                .agent
                .post(&self.endpoint)
                .set("Content-Type", "application/json")
                .send_string(&payload)
                .map_err(map_ureq_error)?;
            resp.into_string()
                .map_err(|e| RatingsError::Transport(e.to_string()))
        })?;
        parse_summary(&body)
    }

    fn with_retry<T>(
        &self,
        mut attempt: impl FnMut() -> Result<T, RatingsError>,
    ) -> Result<T, RatingsError> {
        let mut tries = 0;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && tries < self.retries => {
                    tries += 1;
                    warn!("Ratings request failed ({e}), retry {tries}/{}", self.retries);
                    std::thread::sleep(self.backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn map_ureq_error(err: ureq::Error) -> RatingsError {
    match err {
        ureq::Error::Status(status, resp) => RatingsError::Status {
            status,
            body: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => RatingsError::Transport(t.to_string()),
    }
}

fn submission_body(
    document_id: &str,
    visitor_id: &str,
    rating: Rating,
) -> Result<String, RatingsError> {
    Ok(serde_json::to_string(&RatingSubmission {
        document_id,
        visitor_id,
        rating,
    })?)
}

/// Empty bodies are treated as "no ratings yet"
fn parse_summary(body: &str) -> Result<RatingSummary, RatingsError> {
    if body.trim().is_empty() {
        debug!("Empty ratings response");
        return Ok(RatingSummary::default());
    }
    let mut summary: RatingSummary = serde_json::from_str(body)?;
    if summary.user_rating == Some(0) {
        summary.user_rating = None;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_range() {
        assert!(Rating::new(0).expect("zero").is_removal());
        assert_eq!(Rating::new(5).expect("five").stars(), 5);
        assert!(matches!(Rating::new(6), Err(RatingsError::InvalidRating(6))));
        assert_eq!(Rating::new(4).expect("four").to_string(), "4/5");
    }

    #[test]
    fn submission_wire_format() {
        let body = submission_body("doc-1", "visitor", Rating::new(3).expect("valid"))
            .expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"document_id": "doc-1", "visitor_id": "visitor", "rating": 3})
        );
    }

    #[test]
    fn parses_summary() {
        let summary =
            parse_summary(r#"{"average": 4.5, "count": 2, "user_rating": 5}"#).expect("parse");
        assert_eq!(summary.count, 2);
        assert_eq!(summary.user_rating, Some(5));

        let unrated = parse_summary(r#"{"average": 0, "count": 0, "user_rating": 0}"#)
            .expect("parse");
        assert_eq!(unrated.user_rating, None);

        assert_eq!(parse_summary("  ").expect("empty"), RatingSummary::default());
        assert!(matches!(parse_summary("<html>"), Err(RatingsError::Decode(_))));
    }

    #[test]
    fn free_variant_has_no_client() {
        assert!(matches!(
            RatingsClient::from_settings(Capabilities::free()),
            Err(RatingsError::Disabled)
        ));
    }

    #[test]
    fn retries_only_transient_errors() {
        let client = RatingsClient::new("http://localhost", "v").with_retries(2, Duration::ZERO);

        let mut calls = 0;
        let result: Result<(), _> = client.with_retry(|| {
            calls += 1;
            Err(RatingsError::Transport("refused".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);

        let mut calls = 0;
        let result: Result<(), _> = client.with_retry(|| {
            calls += 1;
            Err(RatingsError::Status {
                status: 400,
                body: String::new(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);

        let mut calls = 0;
        let result = client.with_retry(|| {
            calls += 1;
            if calls < 2 {
                Err(RatingsError::Status {
                    status: 503,
                    body: String::new(),
                })
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.expect("second try"), 2);
    }
}
