//! `qdm discover <url>` – classify a URL and list candidate downloads.

use std::sync::Arc;

use anyhow::Result;
use qdm_core::config::QdmConfig;
use qdm_core::grabber::{Grabber, NoDiscovery};
use qdm_core::http::HttpClient;

pub async fn run_discover(cfg: &QdmConfig, url: &str) -> Result<()> {
    let http = Arc::new(HttpClient::new(cfg));
    let grabber = Grabber::new(http, Arc::new(NoDiscovery));
    let result = grabber.grab(url).await;

    println!("{} [{}]", result.source_url, result.kind.as_str());
    if let Some(title) = &result.page_title {
        println!("Title: {}", title);
    }
    if result.items.is_empty() {
        println!("No downloadable candidates found.");
        return Ok(());
    }
    println!(
        "Found {} candidate(s) ({} before filtering):",
        result.items.len(),
        result.total_found
    );
    for (i, item) in result.items.iter().enumerate() {
        let size = item
            .size
            .map(|s| format!("{} bytes", s))
            .unwrap_or_else(|| "size unknown".to_string());
        let label = item.title.clone().or_else(|| item.filename.clone());
        match label {
            Some(label) => println!("  {}. {} ({}) {}", i + 1, label, size, item.url),
            None => println!("  {}. ({}) {}", i + 1, size, item.url),
        }
    }
    Ok(())
}
