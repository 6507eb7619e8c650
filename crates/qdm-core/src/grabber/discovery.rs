//! Page discovery contract.
//!
//! The HTML scraper is an external collaborator; the grabber only depends
//! on this trait and converts whatever it yields into candidate items.

use async_trait::async_trait;

use super::ItemKind;

/// One link a discovery implementation found on a page.
#[derive(Debug, Clone)]
pub struct DiscoveredLink {
    pub url: String,
    pub kind: ItemKind,
    pub size: Option<u64>,
    pub title: Option<String>,
}

/// Everything discovered on one page.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    pub links: Vec<DiscoveredLink>,
    pub page_title: Option<String>,
    pub total_found: usize,
    pub total_filtered: usize,
}

/// Yields candidate URLs from an HTML page.
#[async_trait]
pub trait PageDiscovery: Send + Sync {
    async fn discover(&self, url: &str) -> anyhow::Result<PageLinks>;
}

/// Placeholder used when no scraper is wired in: every page yields nothing.
pub struct NoDiscovery;

#[async_trait]
impl PageDiscovery for NoDiscovery {
    async fn discover(&self, _url: &str) -> anyhow::Result<PageLinks> {
        Ok(PageLinks::default())
    }
}
