//! # Odds API client
//!
//! Fetches scores and fixtures from The Odds API v4. Every request gets a
//! bounded number of immediate attempts; a pass over several sports fails only
//! when every request in it failed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::SportsConfig;
use crate::sports::matches::{Match, OddsEvent};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("odds API key is not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("all {attempted} upstream requests failed, last error: {last}")]
    AllFailed { attempted: usize, last: String },
}

/// Source of match data behind the scores cache.
#[async_trait]
pub trait ScoresSource: Send + Sync {
    /// Recent results and in-play matches across the configured sports.
    async fn fetch_scores(&self) -> Result<Vec<Match>, UpstreamError>;

    /// Upcoming fixtures for a reduced set of sports.
    async fn fetch_upcoming(&self) -> Result<Vec<Match>, UpstreamError>;
}

/// [`ScoresSource`] backed by The Odds API.
#[derive(Debug, Clone)]
pub struct OddsApiClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    sports: Vec<String>,
    fallback_sports: usize,
    max_attempts: u32,
}

impl OddsApiClient {
    pub fn new(config: &SportsConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: Url::parse(&config.odds_api_base)?,
            api_key: config.odds_api_key.clone(),
            sports: config.sports.clone(),
            fallback_sports: config.fallback_sports,
            max_attempts: config.max_attempts.max(1),
        })
    }

    fn endpoint(&self, sport: &str, resource: &str) -> Result<Url, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::NotConfigured)?;
        let mut url = self
            .base_url
            .join(&format!("/v4/sports/{sport}/{resource}"))?;
        url.query_pairs_mut().append_pair("apiKey", api_key);
        if resource == "scores" {
            url.query_pairs_mut().append_pair("daysFrom", "1");
        }
        Ok(url)
    }

    async fn get_events(&self, url: Url) -> Result<Vec<OddsEvent>, UpstreamError> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.try_get(url.clone()).await {
                Ok(events) => return Ok(events),
                Err(err) => {
                    debug!(attempt, path = url.path(), error = %err, "Odds API request failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(UpstreamError::AllFailed {
            attempted: 0,
            last: "no attempts made".to_string(),
        }))
    }

    async fn try_get(&self, url: Url) -> Result<Vec<OddsEvent>, UpstreamError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// Fetch `resource` for each sport; fails only if every sport failed.
    async fn fetch_pass(&self, sports: &[String], resource: &str) -> Result<Vec<Match>, UpstreamError> {
        if self.api_key.is_none() {
            return Err(UpstreamError::NotConfigured);
        }

        let mut matches = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for sport in sports {
            let outcome = match self.endpoint(sport, resource) {
                Ok(url) => self.get_events(url).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(events) => matches.extend(events.into_iter().map(Match::from)),
                Err(err) => {
                    warn!(sport = %sport, resource, error = %err, "Odds API sport fetch failed");
                    failures += 1;
                    last_error = Some(err.to_string());
                }
            }
        }

        if !sports.is_empty() && failures == sports.len() {
            return Err(UpstreamError::AllFailed {
                attempted: failures,
                last: last_error.unwrap_or_default(),
            });
        }
        Ok(matches)
    }
}

#[async_trait]
impl ScoresSource for OddsApiClient {
    async fn fetch_scores(&self) -> Result<Vec<Match>, UpstreamError> {
        self.fetch_pass(&self.sports, "scores").await
    }

    async fn fetch_upcoming(&self) -> Result<Vec<Match>, UpstreamError> {
        let limit = self.fallback_sports.min(self.sports.len());
        self.fetch_pass(&self.sports[..limit], "events").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str, sports: &[&str]) -> SportsConfig {
        SportsConfig {
            odds_api_key: Some("test-key".to_string()),
            odds_api_base: base.to_string(),
            sports: sports.iter().map(|s| s.to_string()).collect(),
            fallback_sports: 1,
            timeout_seconds: 2,
            max_attempts: 2,
            ..SportsConfig::default()
        }
    }

    fn event(id: &str, sport: &str) -> serde_json::Value {
        json!({
            "id": id,
            "sport_key": sport,
            "sport_title": "League",
            "commence_time": "2025-03-09T15:00:00Z",
            "completed": false,
            "home_team": "Home",
            "away_team": "Away",
            "scores": null
        })
    }

    #[tokio::test]
    async fn fetches_scores_for_each_sport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_epl/scores"))
            .and(query_param("apiKey", "test-key"))
            .and(query_param("daysFrom", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([event("e1", "soccer_epl")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_spain_la_liga/scores"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                event("s1", "soccer_spain_la_liga"),
                event("s2", "soccer_spain_la_liga")
            ])))
            .mount(&server)
            .await;

        let client =
            OddsApiClient::new(&config(&server.uri(), &["soccer_epl", "soccer_spain_la_liga"]))
                .unwrap();
        let matches = client.fetch_scores().await.unwrap();

        assert_eq!(matches.len(), 3);
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_epl/scores"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_epl/scores"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([event("e1", "soccer_epl")])))
            .mount(&server)
            .await;

        let client = OddsApiClient::new(&config(&server.uri(), &["soccer_epl"])).unwrap();

        assert_eq!(client.fetch_scores().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_failure_still_succeeds_but_total_failure_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_epl/scores"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([event("e1", "soccer_epl")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_italy_serie_a/scores"))
            .respond_with(ResponseTemplate::new(503))
            // two attempts for each of the two passes below
            .expect(4)
            .mount(&server)
            .await;

        let partial =
            OddsApiClient::new(&config(&server.uri(), &["soccer_epl", "soccer_italy_serie_a"]))
                .unwrap();
        assert_eq!(partial.fetch_scores().await.unwrap().len(), 1);

        let broken = OddsApiClient::new(&config(&server.uri(), &["soccer_italy_serie_a"])).unwrap();
        let err = broken.fetch_scores().await;
        assert!(matches!(err, Err(UpstreamError::AllFailed { attempted: 1, .. })));
    }

    #[tokio::test]
    async fn upcoming_uses_reduced_sport_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_epl/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([event("u1", "soccer_epl")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/sports/soccer_spain_la_liga/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client =
            OddsApiClient::new(&config(&server.uri(), &["soccer_epl", "soccer_spain_la_liga"]))
                .unwrap();

        assert_eq!(client.fetch_upcoming().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let mut cfg = config("http://127.0.0.1:9", &["soccer_epl"]);
        cfg.odds_api_key = None;
        let client = OddsApiClient::new(&cfg).unwrap();

        assert!(matches!(
            client.fetch_scores().await,
            Err(UpstreamError::NotConfigured)
        ));
    }
}
