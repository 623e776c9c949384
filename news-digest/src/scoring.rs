use crate::config::QualityConfig;
use crate::types::{RawArticle, ScoredArticle};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::debug;

/// Pure scoring of raw articles against the configured keywords and
/// thresholds. `now` is always passed in so results are reproducible.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
    keywords: Vec<String>,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in &config.keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        Self { config, keywords }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn score(&self, article: &RawArticle, now: DateTime<Utc>) -> ScoredArticle {
        let body_len = article.body_text.chars().count();
        if body_len < self.config.min_content_length {
            return ScoredArticle {
                article: article.clone(),
                quality_score: 0.0,
                admitted: false,
                reasons: vec![format!(
                    "body too short ({} < {} chars)",
                    body_len, self.config.min_content_length
                )],
            };
        }

        let mut score = 1.0;
        let mut reasons = vec!["base 1.00".to_string()];

        let title = article.title.to_lowercase();
        let body = article.body_text.to_lowercase();
        for keyword in &self.keywords {
            if title.contains(keyword.as_str()) {
                score += self.config.title_keyword_weight;
                reasons.push(format!(
                    "keyword '{}' in title +{:.2}",
                    keyword, self.config.title_keyword_weight
                ));
            } else if body.contains(keyword.as_str()) {
                score += self.config.body_keyword_weight;
                reasons.push(format!(
                    "keyword '{}' in body +{:.2}",
                    keyword, self.config.body_keyword_weight
                ));
            }
        }

        if let Some(bonus) = self.recency_bonus(article.published_at, now) {
            score += bonus;
            reasons.push(format!("recency +{:.2}", bonus));
        }

        let admitted = score > self.config.min_score;
        if !admitted {
            reasons.push(format!(
                "below minimum score {:.2}",
                self.config.min_score
            ));
        }

        ScoredArticle {
            article: article.clone(),
            quality_score: score,
            admitted,
            reasons,
        }
    }

    /// Linear bonus from `recency_max_bonus` for an article published now down
    /// to zero at the edge of the window. Future dates count as now.
    fn recency_bonus(&self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
        let window = self.config.recency_window_hours;
        let max_bonus = self.config.recency_max_bonus;
        if window <= 0.0 || max_bonus <= 0.0 {
            return None;
        }

        let published_at = published_at?;
        let age_hours = ((now - published_at).num_seconds() as f64 / 3600.0).max(0.0);
        if age_hours >= window {
            return None;
        }
        Some(max_bonus * (1.0 - age_hours / window))
    }

    /// Scores a batch and enforces the per-run admission cap. The result is in
    /// rank order; articles past the cap are marked not admitted.
    pub fn score_all(
        &self,
        articles: &[RawArticle],
        now: DateTime<Utc>,
        max_per_run: usize,
    ) -> Vec<ScoredArticle> {
        let scored = articles.iter().map(|a| self.score(a, now)).collect();
        apply_admission_cap(scored, max_per_run)
    }
}

/// Sorts into rank order and keeps at most `max_per_run` admitted articles.
pub fn apply_admission_cap(mut scored: Vec<ScoredArticle>, max_per_run: usize) -> Vec<ScoredArticle> {
    scored.sort_by(rank_order);

    let mut admitted = 0;
    for article in &mut scored {
        if !article.admitted {
            continue;
        }
        if admitted < max_per_run {
            admitted += 1;
        } else {
            article.admitted = false;
            article
                .reasons
                .push(format!("over per-run cap of {}", max_per_run));
        }
    }

    debug!(
        "Admitted {} of {} scored articles (cap {})",
        admitted,
        scored.len(),
        max_per_run
    );
    scored
}

/// Score descending, then newest first (undated last), then source name,
/// then url.
pub fn rank_order(a: &ScoredArticle, b: &ScoredArticle) -> Ordering {
    b.quality_score
        .total_cmp(&a.quality_score)
        .then_with(|| match (a.article.published_at, b.article.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.article.source_name.cmp(&b.article.source_name))
        .then_with(|| a.article.url.cmp(&b.article.url))
}
