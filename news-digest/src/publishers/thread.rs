use crate::config::{seconds, SocialConfig};
use crate::traits::{PublishReceipt, Publisher};
use crate::types::{DigestDocument, DigestError, PublishError, Result};
use crate::utils::text::smart_truncate;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Builds the posts of a digest thread. Every post fits `max_post_length`
/// characters; the first one carries the thread marker. An empty digest
/// produces no posts.
pub fn compose_thread(digest: &DigestDocument, config: &SocialConfig) -> Vec<String> {
    if digest.is_empty() {
        return Vec::new();
    }

    let limit = config.max_post_length;
    let mut posts = Vec::new();

    let marker = format!(" {}", config.thread_marker);
    let opening = format!("📰 {}\n\n{}", digest.title, digest.introduction);
    let budget = limit.saturating_sub(marker.chars().count());
    posts.push(format!("{}{}", smart_truncate(&opening, budget), marker));

    for (i, entry) in digest.entries.iter().take(3).enumerate() {
        let link = format!("\n\nRead more: {}", entry.article.article.url);
        let head = format!("{}. {}\n\n{}", i + 1, entry.summary.headline, entry.summary.synopsis);
        let budget = limit.saturating_sub(link.chars().count());
        posts.push(format!("{}{}", smart_truncate(&head, budget), link));
    }

    if !digest.trend_topics.is_empty() {
        let mut trends = String::from("📈 Today's Trends:\n");
        for topic in digest.trend_topics.iter().take(3) {
            trends.push_str(&format!("\n• {}", topic.term));
        }
        posts.push(smart_truncate(&trends, limit));
    }

    if let Some(url) = &config.newsletter_url {
        let closing = format!(
            "📖 Read the full newsletter with {} articles and detailed analysis:\n{}",
            digest.entries.len(),
            url
        );
        posts.push(smart_truncate(&closing, limit));
    }

    posts
}

/// Posts the thread to a Twitter-style API: `POST {api_base}/tweets`, each
/// post replying to the previous one.
pub struct ThreadPublisher {
    client: Client,
    config: SocialConfig,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
}

impl ThreadPublisher {
    pub fn new(config: &SocialConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DigestError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn post(
        &self,
        token: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> std::result::Result<String, PublishError> {
        let mut body = json!({ "text": text });
        if let Some(parent) = reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": parent });
        }

        let response = self
            .client
            .post(format!("{}/tweets", self.config.api_base.trim_end_matches('/')))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: smart_truncate(&response.text().await.unwrap_or_default(), 300),
            });
        }

        let parsed: PostResponse = response.json().await?;
        Ok(parsed.data.id)
    }
}

#[async_trait]
impl Publisher for ThreadPublisher {
    fn channel(&self) -> String {
        "social".to_string()
    }

    async fn publish(&self, digest: &DigestDocument) -> std::result::Result<PublishReceipt, PublishError> {
        let posts = compose_thread(digest, &self.config);
        if posts.is_empty() {
            info!("Empty digest, nothing to post");
            return Ok(PublishReceipt {
                channel: self.channel(),
                locations: Vec::new(),
            });
        }

        let token = std::env::var(&self.config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PublishError::MissingCredential(self.config.token_env.clone()))?;

        let delay = seconds(self.config.post_delay);
        let mut ids: Vec<String> = Vec::new();
        for (i, text) in posts.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let id = self.post(&token, text, ids.last().map(String::as_str)).await?;
            debug!("Posted {}/{} as {}", i + 1, posts.len(), id);
            ids.push(id);
        }

        info!("Published thread with {} posts", ids.len());
        Ok(PublishReceipt {
            channel: self.channel(),
            locations: ids,
        })
    }
}
