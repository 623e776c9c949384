mod common;

use common::*;
use news_digest::config::TrendConfig;
use news_digest::TrendAggregator;
use std::collections::BTreeSet;

fn summary(url: &str, synopsis: &str) -> Summary {
    Summary {
        article_ref: url.to_string(),
        headline: "Headline".to_string(),
        synopsis: synopsis.to_string(),
        key_points: Vec::new(),
        relevance_tags: BTreeSet::new(),
    }
}

fn ten_summaries() -> Vec<Summary> {
    (0..10)
        .map(|i| {
            let url = format!("https://news.example.com/{}", i);
            let text = match i {
                0..=5 => "a new LLM topped the leaderboard.",
                6 | 7 => "vendors shipped another GPU generation.",
                _ => "markets were calm today.",
            };
            summary(&url, text)
        })
        .collect()
}

#[test]
fn test_trend_strength_orders_topics() {
    let aggregator = TrendAggregator::new(
        &TrendConfig {
            min_articles: 1,
            max_topics: 10,
        },
        &["LLM".to_string(), "GPU".to_string()],
    );

    let topics = aggregator.aggregate(&ten_summaries());

    assert_eq!(topics[0].term, "LLM");
    assert!((topics[0].strength - 0.6).abs() < 1e-9);
    assert_eq!(topics[0].article_refs.len(), 6);

    let gpu = topics.iter().find(|t| t.term == "GPU").expect("GPU topic");
    assert!((gpu.strength - 0.2).abs() < 1e-9);
    assert!(topics.iter().position(|t| t.term == "GPU") > Some(0));
}

#[test]
fn test_floor_drops_rare_terms() {
    let aggregator = TrendAggregator::new(
        &TrendConfig {
            min_articles: 3,
            max_topics: 10,
        },
        &["LLM".to_string(), "GPU".to_string()],
    );

    let topics = aggregator.aggregate(&ten_summaries());
    let terms: Vec<&str> = topics.iter().map(|t| t.term.as_str()).collect();
    assert_eq!(terms, vec!["LLM"]);
}

#[test]
fn test_repeated_mentions_count_once_per_article() {
    let aggregator = TrendAggregator::new(
        &TrendConfig {
            min_articles: 1,
            max_topics: 10,
        },
        &["LLM".to_string()],
    );

    let mut noisy = summary("https://news.example.com/a", "the LLM and the LLM and the LLM.");
    noisy.key_points = vec!["another LLM mention".to_string()];
    let quiet = summary("https://news.example.com/b", "nothing relevant here.");

    let topics = aggregator.aggregate(&[noisy, quiet]);
    let llm = topics.iter().find(|t| t.term == "LLM").expect("LLM topic");
    assert_eq!(llm.article_refs.len(), 1);
    assert!((llm.strength - 0.5).abs() < 1e-9);
}

#[test]
fn test_no_summaries_no_topics() {
    let aggregator = TrendAggregator::new(&TrendConfig::default(), &[]);
    assert!(aggregator.aggregate(&[]).is_empty());
}
