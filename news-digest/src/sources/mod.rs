pub mod rss_feed;
pub mod selectors;
pub mod web_page;

pub use rss_feed::RssFeedAdapter;
pub use selectors::CompiledSelector;
pub use web_page::WebPageAdapter;

use crate::traits::FetchAdapter;
use std::sync::Arc;

/// One adapter per source kind.
pub fn default_adapters() -> Vec<Arc<dyn FetchAdapter>> {
    vec![Arc::new(RssFeedAdapter::new()), Arc::new(WebPageAdapter::new())]
}
