//! Capability probe: resumability, length, and content metadata.

use std::cell::RefCell;
use std::time::Duration;

use crate::error::{QdmError, QdmResult};

use super::parse::HeaderCollector;

/// Result of a metadata probe.
#[derive(Debug, Clone)]
pub struct Probe {
    /// `accept_ranges && has_length && !chunked`.
    pub resumable: bool,
    pub has_length: bool,
    pub length: Option<u64>,
    pub accept_ranges: bool,
    pub chunked: bool,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

pub(super) fn probe(url: &str, user_agent: &str, timeout: Duration) -> QdmResult<Probe> {
    match head_request(url, user_agent, timeout)? {
        HeadOutcome::Ok(probe) => Ok(probe),
        HeadOutcome::MethodRejected => get_headers_only(url, user_agent, timeout),
    }
}

enum HeadOutcome {
    Ok(Probe),
    /// Server returned 405/501 for HEAD; caller retries via GET.
    MethodRejected,
}

fn head_request(url: &str, user_agent: &str, timeout: Duration) -> QdmResult<HeadOutcome> {
    let collector = RefCell::new(HeaderCollector::default());

    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, url, user_agent, timeout)?;
    easy.nobody(true).map_err(transport)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                collector.borrow_mut().push(data);
                true
            })
            .map_err(transport)?;
        transfer
            .perform()
            .map_err(|e| QdmError::Transport(format!("HEAD {}: {}", url, e)))?;
    }

    let code = easy.response_code().map_err(transport)?;
    if code == 405 || code == 501 {
        return Ok(HeadOutcome::MethodRejected);
    }
    if !(200..300).contains(&code) {
        return Err(QdmError::Transport(format!("HEAD {} returned HTTP {}", url, code)));
    }
    Ok(HeadOutcome::Ok(probe_from(&collector.into_inner())))
}

/// Streaming GET aborted after the first body byte; only headers are kept.
fn get_headers_only(url: &str, user_agent: &str, timeout: Duration) -> QdmResult<Probe> {
    let collector = RefCell::new(HeaderCollector::default());

    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, url, user_agent, timeout)?;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                collector.borrow_mut().push(data);
                true
            })
            .map_err(transport)?;
        transfer
            .write_function(|_| Ok(0)) // headers are in; stop the body
            .map_err(transport)?;
        transfer.perform()
    };

    let block = collector.into_inner().block();
    if let Err(e) = perform_result {
        // The deliberate body abort surfaces as a write error; anything else
        // is a real transport failure.
        if !e.is_write_error() {
            return Err(QdmError::Transport(format!("GET {}: {}", url, e)));
        }
    }
    if !(200..300).contains(&block.status) {
        return Err(QdmError::Transport(format!(
            "GET {} returned HTTP {}",
            url, block.status
        )));
    }

    Ok(probe_from_block(block))
}

fn probe_from(collector: &HeaderCollector) -> Probe {
    probe_from_block(collector.block())
}

fn probe_from_block(block: super::parse::HeaderBlock) -> Probe {
    let has_length = block.content_length.is_some();
    Probe {
        resumable: block.accept_ranges && has_length && !block.chunked,
        has_length,
        length: block.content_length,
        accept_ranges: block.accept_ranges,
        chunked: block.chunked,
        content_type: block.content_type,
        content_disposition: block.content_disposition,
    }
}

fn configure(
    easy: &mut curl::easy::Easy,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> QdmResult<()> {
    easy.url(url)
        .map_err(|_| QdmError::InvalidInput(format!("invalid URL: {}", url)))?;
    easy.useragent(user_agent).map_err(transport)?;
    easy.follow_location(true).map_err(transport)?;
    easy.max_redirections(10).map_err(transport)?;
    easy.connect_timeout(timeout).map_err(transport)?;
    easy.timeout(timeout).map_err(transport)?;
    Ok(())
}

fn transport(e: curl::Error) -> QdmError {
    QdmError::Transport(e.to_string())
}
