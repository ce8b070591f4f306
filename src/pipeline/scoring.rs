//! Recency scoring.
//!
//! An article published today scores 10; it loses one point per 30 elapsed
//! days and bottoms out at 0. Dates are parsed from the free-form strings
//! PMC uses in summaries (`2024 Mar 5`, `2023 Jan-Feb`, `2022 Spring`, ...).

use chrono::{Datelike, NaiveDate};

use crate::models::ArticleMetadata;

/// Score of an article published today
pub const MAX_RECENCY_SCORE: f64 = 10.0;

const DAYS_PER_POINT: i64 = 30;

/// Score for an article published `elapsed_days` ago.
///
/// Uses integer division, so 0-29 days score 10, 30-59 score 9 and so on.
/// Future dates count as published today.
pub fn recency_score(elapsed_days: i64) -> f64 {
    let lost = elapsed_days.max(0) / DAYS_PER_POINT;
    (MAX_RECENCY_SCORE - lost as f64).max(0.0)
}

/// Recency score of the article relative to `today`.
///
/// Missing or unparseable dates score 0.
pub fn calculate_score(metadata: &ArticleMetadata, today: NaiveDate) -> f64 {
    match parse_publication_date(&metadata.publication_date) {
        Some(published) => recency_score((today - published).num_days()),
        None => {
            tracing::debug!(
                "Unparseable publication date {:?} for {}",
                metadata.publication_date,
                metadata.external_id
            );
            0.0
        }
    }
}

/// Set `score` on every article
pub fn score_articles(articles: &mut [ArticleMetadata], today: NaiveDate) {
    for article in articles.iter_mut() {
        article.score = calculate_score(article, today);
    }
}

/// Sort by score, highest first; ties keep their current order
pub fn sort_by_score(articles: &mut [ArticleMetadata]) {
    articles.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Parse a PMC publication date.
///
/// Accepts `YYYY Mon DD`, `YYYY Mon`, `YYYY Mon-Mon`, `YYYY Season`, `YYYY`,
/// `YYYY-MM-DD` and `YYYY/MM/DD`. A missing day is the 1st and a missing
/// month is January; month ranges resolve to their first month.
pub fn parse_publication_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    let mut tokens = raw.split_whitespace();
    let year = parse_year(tokens.next()?)?;

    let month = match tokens.next() {
        Some(token) => parse_month(token)?,
        None => return NaiveDate::from_ymd_opt(year, 1, 1),
    };

    let day = tokens
        .next()
        .and_then(|token| {
            let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(1);

    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
}

fn parse_year(token: &str) -> Option<i32> {
    if token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// Month number from a name, abbreviation, range (`Jan-Feb`) or season
fn parse_month(token: &str) -> Option<u32> {
    let first = token.split(['-', '/']).next()?.trim_end_matches('.');
    let lower = first.to_ascii_lowercase();

    let season = match lower.as_str() {
        "winter" => Some(1),
        "spring" => Some(4),
        "summer" => Some(7),
        "fall" | "autumn" => Some(10),
        _ => None,
    };
    if season.is_some() {
        return season;
    }

    let abbreviation = lower.get(..3)?;
    NaiveDate::parse_from_str(&format!("2000 {} 1", abbreviation), "%Y %b %d")
        .ok()
        .map(|date| date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn meta(date: &str) -> ArticleMetadata {
        ArticleMetadata::builder("PMC1").publication_date(date).build()
    }

    #[test]
    fn test_recency_score_steps() {
        assert_eq!(recency_score(0), 10.0);
        assert_eq!(recency_score(29), 10.0);
        assert_eq!(recency_score(30), 9.0);
        assert_eq!(recency_score(45), 9.0);
        assert_eq!(recency_score(299), 1.0);
        assert_eq!(recency_score(300), 0.0);
        assert_eq!(recency_score(5000), 0.0);
        assert_eq!(recency_score(-12), 10.0);
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_publication_date("2024 Mar 5"), Some(date(2024, 3, 5)));
        assert_eq!(parse_publication_date("2024 Mar"), Some(date(2024, 3, 1)));
        assert_eq!(parse_publication_date("2023 Jan-Feb"), Some(date(2023, 1, 1)));
        assert_eq!(parse_publication_date("2022 Summer"), Some(date(2022, 7, 1)));
        assert_eq!(parse_publication_date("2021"), Some(date(2021, 1, 1)));
        assert_eq!(parse_publication_date("2020-11-30"), Some(date(2020, 11, 30)));
        assert_eq!(parse_publication_date("2020/02/01"), Some(date(2020, 2, 1)));
        assert_eq!(parse_publication_date("2024 September 9"), Some(date(2024, 9, 9)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_publication_date(""), None);
        assert_eq!(parse_publication_date("unknown"), None);
        assert_eq!(parse_publication_date("24 Mar"), None);
        assert_eq!(parse_publication_date("2024 Xyz"), None);
    }

    #[test]
    fn test_calculate_score() {
        let today = date(2024, 6, 1);
        assert_eq!(calculate_score(&meta("2024 Jun 1"), today), 10.0);
        assert_eq!(calculate_score(&meta("2024 May 1"), today), 9.0);
        assert_eq!(calculate_score(&meta("2020"), today), 0.0);
        assert_eq!(calculate_score(&meta(""), today), 0.0);
        assert_eq!(calculate_score(&meta("2025 Jan"), today), 10.0);
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let mut articles: Vec<ArticleMetadata> = [("A", 5.0), ("B", 8.0), ("C", 5.0), ("D", 9.0)]
            .into_iter()
            .map(|(id, score)| ArticleMetadata::builder(id).score(score).build())
            .collect();

        sort_by_score(&mut articles);

        let ids: Vec<_> = articles.iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(ids, vec!["D", "B", "A", "C"]);
    }
}
