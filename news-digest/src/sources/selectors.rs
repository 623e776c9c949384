//! Compiles configured selectors. CSS goes straight to `scraper`; XPath is
//! accepted for the location-path subset that has a CSS equivalent.

use crate::types::{FetchError, Selector};
use crate::utils::text::collapse_whitespace;
use scraper::{ElementRef, Html};

#[derive(Debug, Clone)]
pub struct CompiledSelector {
    selector: scraper::Selector,
    /// Set when an XPath ends in `/@attr`.
    attribute: Option<String>,
}

impl CompiledSelector {
    pub fn compile(selector: &Selector) -> Result<Self, FetchError> {
        match selector {
            Selector::Css(css) => Ok(Self {
                selector: parse_css(css)?,
                attribute: None,
            }),
            Selector::XPath(xpath) => {
                let (css, attribute) = xpath_to_css(xpath)?;
                Ok(Self {
                    selector: parse_css(&css)?,
                    attribute,
                })
            }
        }
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn select<'a, 'b>(&'b self, html: &'a Html) -> scraper::html::Select<'a, 'b> {
        html.select(&self.selector)
    }

    /// Text of the first match, or the selected attribute when the selector
    /// names one. Empty values count as missing.
    pub fn first_value(&self, html: &Html) -> Option<String> {
        self.select(html)
            .filter_map(|element| self.value_of(element))
            .next()
    }

    pub fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        let value = match &self.attribute {
            Some(attr) => element.value().attr(attr).map(|v| v.trim().to_string()),
            None => Some(element_text(element)),
        };
        value.filter(|v| !v.is_empty())
    }
}

pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn parse_css(css: &str) -> Result<scraper::Selector, FetchError> {
    scraper::Selector::parse(css).map_err(|e| FetchError::Selector {
        selector: css.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Translates an XPath location path into a CSS selector plus an optional
/// trailing attribute name.
pub fn xpath_to_css(xpath: &str) -> Result<(String, Option<String>), FetchError> {
    let unsupported = |reason: String| FetchError::Selector {
        selector: xpath.to_string(),
        reason,
    };

    let mut path = xpath.trim();
    let mut attribute = None;
    if let Some(stripped) = path.strip_suffix("/text()") {
        path = stripped;
    } else if let Some(idx) = path.rfind("/@") {
        let name = &path[idx + 2..];
        if is_name(name) {
            attribute = Some(name.to_string());
            path = &path[..idx];
        }
    }

    if !path.starts_with('/') {
        return Err(unsupported("XPath must start with '/'".to_string()));
    }

    let chars: Vec<char> = path.chars().collect();
    let mut css = String::new();
    let mut i = 0;

    while i < chars.len() {
        let combinator = match (chars[i], chars.get(i + 1)) {
            ('/', Some('/')) => {
                i += 2;
                " "
            }
            ('/', _) => {
                i += 1;
                " > "
            }
            (c, _) => return Err(unsupported(format!("unexpected '{}'", c))),
        };
        if !css.is_empty() {
            css.push_str(combinator);
        }

        let start = i;
        while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '-' | '_' | '*')) {
            i += 1;
        }
        let name: String = chars[start..i].iter().collect();
        if name.is_empty() || (name.contains('*') && name != "*") {
            return Err(unsupported(format!("unsupported step at position {}", start)));
        }
        css.push_str(&name);

        while i < chars.len() && chars[i] == '[' {
            let close = closing_bracket(&chars, i)
                .ok_or_else(|| unsupported("unbalanced '['".to_string()))?;
            let predicate: String = chars[i + 1..close].iter().collect();
            let translated = predicate_to_css(predicate.trim())
                .ok_or_else(|| unsupported(format!("unsupported predicate [{}]", predicate)))?;
            css.push_str(&translated);
            i = close + 1;
        }
    }

    Ok((css, attribute))
}

fn closing_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, &c) in chars[open + 1..].iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ']' => return Some(open + 1 + offset),
            None => {}
        }
    }
    None
}

fn predicate_to_css(predicate: &str) -> Option<String> {
    if let Ok(position) = predicate.parse::<u32>() {
        return Some(format!(":nth-of-type({})", position));
    }

    if let Some(attr) = predicate.strip_prefix('@') {
        return match attr.split_once('=') {
            None if is_name(attr.trim()) => Some(format!("[{}]", attr.trim())),
            Some((name, value)) if is_name(name.trim()) => {
                let value = unquote(value.trim())?;
                Some(format!("[{}=\"{}\"]", name.trim(), value))
            }
            _ => None,
        };
    }

    for (function, operator) in [("contains", "*="), ("starts-with", "^=")] {
        let Some(args) = predicate
            .strip_prefix(function)
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('('))
            .and_then(|rest| rest.strip_suffix(')'))
        else {
            continue;
        };
        let (name, value) = args.split_once(',')?;
        let name = name.trim().strip_prefix('@')?;
        if !is_name(name) {
            return None;
        }
        let value = unquote(value.trim())?;
        return Some(format!("[{}{}\"{}\"]", name, operator, value));
    }

    None
}

fn unquote(value: &str) -> Option<&str> {
    let inner = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))?;
    if inner.contains('"') {
        return None;
    }
    Some(inner)
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':'))
}
