use super::RatingSource;
use crate::error::{PredictorError, Result};
use crate::models::ScrapedRating;
use crate::utils::data::parse_rating;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

pub const CLUBELO_URL: &str = "http://clubelo.com/ENG";

/// Marker text of the table row that introduces the top division
const LEVEL_ONE_HEADER: &str = "Level 1 (20 teams)";
const LEVEL_ONE_TEAMS: usize = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Scrapes the English league ranking table from clubelo.com
pub struct ClubEloScraper {
    client: reqwest::Client,
    url: String,
}

impl ClubEloScraper {
    pub fn new() -> Self {
        Self::with_url(CLUBELO_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.into(),
        }
    }

    /// Fetch the ranking page and extract the top-flight ratings
    pub async fn fetch_ratings_page(&self) -> Result<Vec<ScrapedRating>> {
        let html = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_ratings_html(&html)
    }
}

impl Default for ClubEloScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RatingSource for ClubEloScraper {
    fn name(&self) -> &str {
        "clubelo.com"
    }

    async fn fetch_ratings(&self) -> Result<Vec<ScrapedRating>> {
        self.fetch_ratings_page().await
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| PredictorError::ExternalFetch(format!("Invalid selector {}: {}", css, e)))
}

/// Parse the ranking table.
///
/// The page is one big table where each division starts with a header row
/// holding an `<i>Level N (M teams)</i>` label; team rows carry the club
/// link and the rating in a `td.r` cell.
pub fn parse_ratings_html(html: &str) -> Result<Vec<ScrapedRating>> {
    let document = Html::parse_document(html);
    let label_selector = selector("i")?;
    let link_selector = selector("a")?;
    let rating_selector = selector("td.r")?;

    let header = document
        .select(&label_selector)
        .find(|el| el.text().collect::<String>().contains(LEVEL_ONE_HEADER))
        .ok_or_else(|| {
            PredictorError::ExternalFetch(format!(
                "Could not find the '{}' header",
                LEVEL_ONE_HEADER
            ))
        })?;

    let header_row = header
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr")
        .ok_or_else(|| {
            PredictorError::ExternalFetch("Division header is not inside a table row".to_string())
        })?;

    let mut ratings = Vec::new();
    let rows = header_row
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .take(LEVEL_ONE_TEAMS);

    for row in rows {
        // The next division's header ends the table we want
        if row.select(&label_selector).next().is_some() {
            break;
        }

        let team = row
            .select(&link_selector)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string());
        let rating = row
            .select(&rating_selector)
            .next()
            .and_then(|td| parse_rating(&td.text().collect::<String>()));

        match (team, rating) {
            (Some(team), Some(elo)) if !team.is_empty() => {
                debug!("Parsed {}: {}", team, elo);
                ratings.push(ScrapedRating { team, elo });
            }
            _ => continue,
        }
    }

    if ratings.is_empty() {
        return Err(PredictorError::ExternalFetch(
            "No team ratings found under the division header".to_string(),
        ));
    }
    if ratings.len() != LEVEL_ONE_TEAMS {
        warn!(
            "Expected {} teams but found {}",
            LEVEL_ONE_TEAMS,
            ratings.len()
        );
    }

    Ok(ratings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKING_PAGE: &str = r#"
        <html><body>
        <table class="ranking">
          <tr><th>Rank</th><th>Club</th><th>Elo</th></tr>
          <tr><td colspan="3"><i>Level 1 (20 teams)</i></td></tr>
          <tr><td class="l">1</td><td><a href="/Liverpool">Liverpool</a></td><td class="r">2015</td></tr>
          <tr><td class="l">2</td><td><a href="/Arsenal"> Arsenal </a></td><td class="r">1,987</td></tr>
          <tr><td class="l">3</td><td><a href="/ManCity">Man City</a></td><td class="r">1917</td></tr>
          <tr><td class="l">-</td><td>Unranked note</td><td class="r">-</td></tr>
          <tr><td colspan="3"><i>Level 2 (24 teams)</i></td></tr>
          <tr><td class="l">1</td><td><a href="/Leeds">Leeds</a></td><td class="r">1702</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_ratings_html() {
        let ratings = parse_ratings_html(RANKING_PAGE).unwrap();

        assert_eq!(
            ratings,
            vec![
                ScrapedRating {
                    team: "Liverpool".to_string(),
                    elo: 2015
                },
                ScrapedRating {
                    team: "Arsenal".to_string(),
                    elo: 1987
                },
                ScrapedRating {
                    team: "Man City".to_string(),
                    elo: 1917
                },
            ]
        );
    }

    #[test]
    fn test_parse_stops_at_next_division() {
        let ratings = parse_ratings_html(RANKING_PAGE).unwrap();
        assert!(ratings.iter().all(|r| r.team != "Leeds"));
    }

    #[test]
    fn test_parse_missing_header() {
        let html = "<table><tr><td><a>Liverpool</a></td><td class=\"r\">2015</td></tr></table>";
        assert!(matches!(
            parse_ratings_html(html),
            Err(PredictorError::ExternalFetch(_))
        ));
    }

    #[test]
    fn test_parse_header_without_teams() {
        let html = "<table><tr><td><i>Level 1 (20 teams)</i></td></tr></table>";
        assert!(parse_ratings_html(html).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_ratings() {
        let scraper = ClubEloScraper::new();
        let ratings = scraper.fetch_ratings().await.unwrap();
        assert_eq!(ratings.len(), 20);
        println!("Fetched {} team ratings", ratings.len());
    }
}
