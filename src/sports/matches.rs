//! Match records as served by the API, plus the wire shape of the odds API.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("slug filter pattern is valid"));
static SEPARATOR_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").expect("separator pattern is valid"));

/// A fixture or result, normalized from the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Match {
    pub id: String,
    pub sport_key: String,
    pub sport_title: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub commence_time: DateTime<Utc>,
    pub completed: bool,
    /// `{home}-vs-{away}-{YYYY-MM-DD}`, slugified
    pub slug: String,
}

impl Match {
    /// Started and not yet finished.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.commence_time <= now
    }
}

/// One event from `/v4/sports/{sport}/scores` or `/v4/sports/{sport}/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    pub sport_key: String,
    #[serde(default)]
    pub sport_title: Option<String>,
    pub commence_time: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub scores: Option<Vec<OddsScore>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsScore {
    pub name: String,
    pub score: String,
}

impl From<OddsEvent> for Match {
    fn from(event: OddsEvent) -> Self {
        let score_of = |team: &str| {
            event
                .scores
                .as_ref()?
                .iter()
                .find(|s| s.name == team)
                .and_then(|s| s.score.trim().parse().ok())
        };
        let home_score = score_of(&event.home_team);
        let away_score = score_of(&event.away_team);
        let slug = match_slug(&event.home_team, &event.away_team, event.commence_time);

        Self {
            sport_title: event
                .sport_title
                .unwrap_or_else(|| event.sport_key.clone()),
            id: event.id,
            sport_key: event.sport_key,
            home_team: event.home_team,
            away_team: event.away_team,
            home_score,
            away_score,
            commence_time: event.commence_time,
            completed: event.completed,
            slug,
        }
    }
}

/// URL-safe slug with Turkish letters folded to ASCII.
pub fn slugify(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(|c| match c {
            'ı' | 'İ' => 'i',
            'ş' | 'Ş' => 's',
            'ğ' | 'Ğ' => 'g',
            'ü' | 'Ü' => 'u',
            'ö' | 'Ö' => 'o',
            'ç' | 'Ç' => 'c',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();

    let kept = NON_SLUG_CHARS.replace_all(&folded, "");
    SEPARATOR_RUN
        .replace_all(&kept, "-")
        .trim_matches('-')
        .to_string()
}

pub fn match_slug(home: &str, away: &str, commence_time: DateTime<Utc>) -> String {
    slugify(&format!(
        "{home}-vs-{away}-{}",
        commence_time.format("%Y-%m-%d")
    ))
}

/// Live matches first, then finished ones newest first, then upcoming ones
/// soonest first.
pub fn arrange_matches(matches: Vec<Match>, now: DateTime<Utc>) -> Vec<Match> {
    let (mut completed, rest): (Vec<_>, Vec<_>) = matches.into_iter().partition(|m| m.completed);
    let (live, mut upcoming): (Vec<_>, Vec<_>) = rest.into_iter().partition(|m| m.is_live(now));

    completed.sort_by(|a, b| b.commence_time.cmp(&a.commence_time));
    upcoming.sort_by_key(|m| m.commence_time);

    let mut arranged = live;
    arranged.extend(completed);
    arranged.extend(upcoming);
    arranged
}

#[cfg(test)]
pub(crate) fn sample_match(id: &str, commence_time: DateTime<Utc>, completed: bool) -> Match {
    Match {
        id: id.to_string(),
        sport_key: "soccer_turkey_super_league".to_string(),
        sport_title: "Turkey Super League".to_string(),
        home_team: format!("{id} Home"),
        away_team: format!("{id} Away"),
        home_score: None,
        away_score: None,
        commence_time,
        completed,
        slug: match_slug(&format!("{id} Home"), &format!("{id} Away"), commence_time),
    }
}
