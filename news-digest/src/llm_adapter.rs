use crate::config::{ProviderKind, SummarizationConfig};
use crate::traits::Summarizer;
use crate::types::{DigestError, RawArticle, Result, SummarizationError, Summary};
use crate::utils::text::{smart_truncate, split_sentences, truncate_chars};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Rough characters-per-token ratio used to cap article bodies.
pub const CHARS_PER_TOKEN: usize = 4;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Builds the summarizer named by the configuration. Reads the provider key
/// from the environment; a missing key is a configuration error.
pub fn summarizer_from_config(
    config: &SummarizationConfig,
    niche: &str,
    keywords: &[String],
) -> Result<Arc<dyn Summarizer>> {
    match config.provider {
        ProviderKind::Anthropic => {
            let api_key = config.resolve_api_key()?.ok_or_else(|| {
                DigestError::Config(format!("environment variable {} is not set", config.api_key_env))
            })?;
            info!("Using Anthropic summarizer with model {}", config.model);
            Ok(Arc::new(AnthropicSummarizer::new(config, api_key, niche)?))
        }
        ProviderKind::Extractive => {
            info!("Using extractive summarizer");
            Ok(Arc::new(ExtractiveSummarizer::new(keywords.to_vec())))
        }
    }
}

/// Calls the Anthropic Messages API and expects a JSON summary back.
pub struct AnthropicSummarizer {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    max_input_chars: usize,
    max_output_tokens: u32,
    niche: String,
}

impl AnthropicSummarizer {
    pub fn new(config: &SummarizationConfig, api_key: String, niche: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| DigestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_input_chars: config.token_budget.saturating_mul(CHARS_PER_TOKEN),
            max_output_tokens: config.max_output_tokens,
            niche: niche.to_string(),
        })
    }

    fn build_prompt(&self, article: &RawArticle) -> String {
        let body = truncate_chars(&article.body_text, self.max_input_chars);
        format!(
            "You are curating a {niche} news digest. Summarize the article below.\n\n\
             Title: {title}\nSource: {source}\nURL: {url}\n\n\
             Article:\n{body}\n\n\
             Respond with only a JSON object with these keys:\n\
             \"headline\": a concise headline,\n\
             \"synopsis\": 2-4 sentences capturing the key information,\n\
             \"key_points\": 3-5 short key insights,\n\
             \"tags\": 3-5 lowercase topic tags relevant to {niche}.",
            niche = self.niche,
            title = article.title,
            source = article.source_name,
            url = article.url,
            body = body,
        )
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    fn name(&self) -> String {
        format!("anthropic ({})", self.model)
    }

    async fn summarize(&self, article: &RawArticle) -> std::result::Result<Summary, SummarizationError> {
        debug!("Summarizing {} with {}", article.url, self.model);

        let request = json!({
            "model": self.model,
            "max_tokens": self.max_output_tokens,
            "messages": [{ "role": "user", "content": self.build_prompt(article) }],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummarizationError::MalformedResponse(e.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        parse_summary(&text, article)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> SummarizationError {
    let message = smart_truncate(body.trim(), 300);
    let lower = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return SummarizationError::RateLimited;
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lower.contains("credit balance")
        || lower.contains("quota")
    {
        return SummarizationError::QuotaExhausted(message);
    }
    SummarizationError::Provider {
        status: Some(status.as_u16()),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    headline: Option<String>,
    #[serde(alias = "short_summary", alias = "summary")]
    synopsis: String,
    #[serde(default, alias = "key_insights")]
    key_points: Vec<String>,
    #[serde(default, alias = "relevance_tags")]
    tags: Vec<String>,
}

/// Reads the JSON object out of a model reply, tolerating code fences and
/// prose around it.
pub fn parse_summary(reply: &str, article: &RawArticle) -> std::result::Result<Summary, SummarizationError> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Err(SummarizationError::MalformedResponse(
            "reply contains no JSON object".to_string(),
        ));
    };
    if end < start {
        return Err(SummarizationError::MalformedResponse(
            "reply contains no JSON object".to_string(),
        ));
    }

    let payload: SummaryPayload = serde_json::from_str(&reply[start..=end])
        .map_err(|e| SummarizationError::MalformedResponse(e.to_string()))?;

    let synopsis = payload.synopsis.trim().to_string();
    if synopsis.is_empty() {
        return Err(SummarizationError::MalformedResponse("empty synopsis".to_string()));
    }

    let headline = payload
        .headline
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| article.title.clone());

    Ok(Summary {
        article_ref: article.url.clone(),
        headline,
        synopsis,
        key_points: payload
            .key_points
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        relevance_tags: payload
            .tags
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

/// Offline summarizer: lead sentences as the synopsis, the following ones as
/// key points, matched keywords as tags. Deterministic.
#[derive(Debug, Clone, Default)]
pub struct ExtractiveSummarizer {
    keywords: Vec<String>,
}

impl ExtractiveSummarizer {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn name(&self) -> String {
        "extractive".to_string()
    }

    async fn summarize(&self, article: &RawArticle) -> std::result::Result<Summary, SummarizationError> {
        let sentences = split_sentences(&article.body_text);
        if sentences.is_empty() {
            return Err(SummarizationError::MalformedResponse(format!(
                "no text to summarize for {}",
                article.url
            )));
        }

        let lead = sentences.len().min(3);
        let synopsis = smart_truncate(&sentences[..lead].join(" "), 600);
        let key_points = sentences[lead..]
            .iter()
            .take(3)
            .map(|s| smart_truncate(s, 200))
            .collect();

        let haystack = format!("{} {}", article.title, article.body_text).to_lowercase();
        let relevance_tags: BTreeSet<String> = self
            .keywords
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .cloned()
            .collect();

        Ok(Summary {
            article_ref: article.url.clone(),
            headline: article.title.clone(),
            synopsis,
            key_points,
            relevance_tags,
        })
    }
}
