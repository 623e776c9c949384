use crate::config::TrendConfig;
use crate::types::{Summary, TrendTopic};
use crate::utils::is_stop_word;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Finds terms shared across the summaries of one run.
///
/// Candidate terms come from each summary's synopsis and key points:
/// capitalized multi-word phrases, acronyms, capitalized words that do not
/// start a sentence, and configured keywords. Relevance tags count too.
/// A term's strength is the fraction of summaries mentioning it; one verbose
/// article counts once.
#[derive(Debug, Clone)]
pub struct TrendAggregator {
    keywords: Vec<String>,
    min_articles: usize,
    max_topics: usize,
}

#[derive(Default)]
struct TermTally {
    display: String,
    articles: BTreeSet<String>,
}

impl TrendAggregator {
    pub fn new(config: &TrendConfig, keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            min_articles: config.min_articles.max(1),
            max_topics: config.max_topics,
        }
    }

    pub fn aggregate(&self, summaries: &[Summary]) -> Vec<TrendTopic> {
        if summaries.is_empty() {
            return Vec::new();
        }

        let total = summaries.len() as f64;
        let mut tallies: BTreeMap<String, TermTally> = BTreeMap::new();

        for summary in summaries {
            for (key, display) in self.extract_terms(summary) {
                let tally = tallies.entry(key).or_default();
                if tally.display.is_empty() || display < tally.display {
                    tally.display = display;
                }
                tally.articles.insert(summary.article_ref.clone());
            }
        }

        let mut topics: Vec<TrendTopic> = tallies
            .into_values()
            .filter(|t| t.articles.len() >= self.min_articles)
            .map(|t| TrendTopic {
                strength: t.articles.len() as f64 / total,
                term: t.display,
                article_refs: t.articles,
            })
            .collect();

        topics.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| a.term.to_lowercase().cmp(&b.term.to_lowercase()))
                .then_with(|| a.term.cmp(&b.term))
        });
        if self.max_topics > 0 {
            topics.truncate(self.max_topics);
        }

        debug!(
            "Found {} trend topics across {} summaries",
            topics.len(),
            summaries.len()
        );
        topics
    }

    /// Candidate terms of one summary as `lowercase key -> display form`.
    pub fn extract_terms(&self, summary: &Summary) -> BTreeMap<String, String> {
        let mut terms = BTreeMap::new();
        let mut add = |term: &str| {
            let term = term.trim();
            if term.chars().count() < 2 {
                return;
            }
            let key = term.to_lowercase();
            let entry = terms.entry(key).or_insert_with(|| term.to_string());
            if term < entry.as_str() {
                *entry = term.to_string();
            }
        };

        let mut text = summary.synopsis.clone();
        for point in &summary.key_points {
            text.push_str(" .\n");
            text.push_str(point);
        }

        for phrase in capitalized_terms(&text) {
            add(&phrase);
        }

        let lower = text.to_lowercase();
        for keyword in &self.keywords {
            if contains_word(&lower, &keyword.to_lowercase()) {
                add(keyword);
            }
        }

        for tag in &summary.relevance_tags {
            add(tag);
        }

        terms
    }
}

fn is_acronym(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

fn starts_uppercase(word: &str) -> bool {
    word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Whole-word, case-sensitive match of `needle` inside `haystack`.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.map(char::is_alphanumeric).unwrap_or(false)
            && !after.map(char::is_alphanumeric).unwrap_or(false)
    })
}

/// Runs of capitalized words with surrounding stop words trimmed. Single
/// words qualify when they are acronyms or do not open a sentence.
fn capitalized_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut run: Vec<String> = Vec::new();
    let mut run_at_sentence_start = false;
    let mut sentence_start = true;

    let flush = |run: &mut Vec<String>, at_start: bool, terms: &mut Vec<String>| {
        while run.first().map(|w| is_stop_word(w)).unwrap_or(false) {
            run.remove(0);
        }
        while run.last().map(|w| is_stop_word(w)).unwrap_or(false) {
            run.pop();
        }
        match run.len() {
            0 => {}
            1 => {
                let word = &run[0];
                if is_acronym(word) || (!at_start && word.chars().count() >= 3) {
                    terms.push(word.clone());
                }
            }
            _ => terms.push(run.join(" ")),
        }
        run.clear();
    };

    for raw in text.split_whitespace() {
        let core = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let ends_clause = raw.ends_with(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | '"'));
        let ends_sentence = raw.ends_with(|c: char| matches!(c, '.' | '!' | '?'));

        if !core.is_empty() && starts_uppercase(core) {
            if run.is_empty() {
                run_at_sentence_start = sentence_start;
            }
            run.push(core.to_string());
            if is_acronym(core) {
                terms.push(core.to_string());
            }
        } else {
            flush(&mut run, run_at_sentence_start, &mut terms);
        }

        if ends_clause {
            flush(&mut run, run_at_sentence_start, &mut terms);
        }
        if !core.is_empty() || ends_sentence {
            sentence_start = ends_sentence;
        }
    }
    flush(&mut run, run_at_sentence_start, &mut terms);

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_phrases_and_acronyms() {
        let terms = capitalized_terms(
            "The European Union approved new LLM rules. Researchers at Google DeepMind agreed, and Nvidia shipped.",
        );
        assert!(terms.contains(&"European Union".to_string()));
        assert!(terms.contains(&"LLM".to_string()));
        assert!(terms.contains(&"Google DeepMind".to_string()));
        assert!(terms.contains(&"Nvidia".to_string()));
        assert!(!terms.contains(&"Researchers".to_string()));
        assert!(!terms.contains(&"The".to_string()));
    }

    #[test]
    fn keyword_matches_whole_words_only() {
        assert!(contains_word("new ai chips", "ai"));
        assert!(!contains_word("said the chair", "ai"));
    }
}
