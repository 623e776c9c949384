/// Check if a word is a common stop word
pub fn is_stop_word(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "the" | "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of" | "with" | "by" |
        "a" | "an" | "is" | "are" | "was" | "were" | "be" | "been" | "have" | "has" | "had" |
        "do" | "does" | "did" | "will" | "would" | "could" | "should" | "may" | "might" | "must" |
        "can" | "this" | "that" | "these" | "those" | "it" | "its" | "as" | "from" | "new" |
        "after" | "before" | "over" | "into" | "how" | "why" | "what" | "when" | "who" | "we" |
        "our" | "you" | "your" | "they" | "their" | "he" | "she" | "i" | "if" | "not" | "no"
    )
}

/// Text processing utilities
pub mod text {
    use scraper::Html;

    /// Collapse every run of whitespace into a single space and trim.
    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Lower-cased, whitespace-collapsed form used for fingerprints.
    pub fn normalize(text: &str) -> String {
        collapse_whitespace(&text.to_lowercase())
    }

    /// Plain text of an HTML fragment. Input without markup is only collapsed.
    pub fn strip_html(html: &str) -> String {
        if !html.contains('<') {
            return collapse_whitespace(html);
        }
        let fragment = Html::parse_fragment(html);
        let text: Vec<&str> = fragment.root_element().text().collect();
        collapse_whitespace(&text.join(" "))
    }

    /// At most `max_chars` characters, cut at the last word boundary when one
    /// exists. Never splits a character.
    pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            None => text,
            Some((cut, _)) => {
                let head = &text[..cut];
                match head.rfind(char::is_whitespace) {
                    Some(space) if space > 0 => head[..space].trim_end(),
                    _ => head,
                }
            }
        }
    }

    /// Like `truncate_chars` but marks the cut with "..." and keeps the total
    /// within `max_chars`.
    pub fn smart_truncate(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let budget = max_chars.saturating_sub(3);
        format!("{}...", truncate_chars(text, budget))
    }

    /// Sentences split on terminal punctuation followed by whitespace.
    pub fn split_sentences(text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map(|n| n.is_whitespace()).unwrap_or(true);
            if at_boundary {
                let sentence = collapse_whitespace(&current);
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }

        let tail = collapse_whitespace(&current);
        if !tail.is_empty() {
            sentences.push(tail);
        }
        sentences
    }

    /// File-name friendly form of a title or niche.
    pub fn slugify(text: &str) -> String {
        let mut slug = String::new();
        for c in text.to_lowercase().chars() {
            if c.is_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        truncate_chars(slug, 60).trim_end_matches('-').to_string()
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S"];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

    /// Parses the date shapes commonly found on article pages. Naive values are
    /// taken as UTC.
    pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt.and_utc());
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::text::*;
    use super::time::parse_date;
    use chrono::{Datelike, Timelike};

    #[test]
    fn strip_html_keeps_text_only() {
        let html = "<p>Hello <b>world</b></p>\n<p>Second   line</p>";
        assert_eq!(strip_html(html), "Hello world Second line");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld again";
        assert_eq!(truncate_chars(text, 100), text);
        assert_eq!(truncate_chars(text, 8), "héllo");
        assert_eq!(smart_truncate(text, 10), "héllo...");
        assert!(smart_truncate(text, 10).chars().count() <= 10);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let sentences = split_sentences("First one. Second? Third! Version 2.0 ships");
        assert_eq!(
            sentences,
            vec!["First one.", "Second?", "Third!", "Version 2.0 ships"]
        );
    }

    #[test]
    fn slugify_produces_dashed_lowercase() {
        assert_eq!(slugify("AI & Machine Learning!"), "ai-machine-learning");
    }

    #[test]
    fn parses_listed_date_formats() {
        let d = parse_date("March 5, 2024").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 3, 5));

        let d = parse_date("5 Mar 2024").unwrap();
        assert_eq!(d.day(), 5);

        let d = parse_date("2024-03-05T10:30:00").unwrap();
        assert_eq!(d.hour(), 10);

        let d = parse_date("2024-03-05T10:30:00+02:00").unwrap();
        assert_eq!(d.hour(), 8);

        assert!(parse_date("yesterday").is_none());
    }
}
