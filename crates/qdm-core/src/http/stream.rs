//! Streaming GET with pause-cooperative chunk delivery.
//!
//! The transfer runs on a blocking thread and pushes events through a
//! bounded channel; the worker owns the receive loop, so pause and
//! cancellation are loop control rather than callback flags.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{QdmError, QdmResult};

use super::parse::HeaderCollector;
use super::{CHUNK_SIZE, USER_AGENT};

/// One event on a download stream. `Meta` always precedes the first `Data`;
/// `Data` chunks arrive in strict byte order; `Ended` is last.
#[derive(Debug)]
pub enum StreamEvent {
    /// Total transfer size once response headers are in (None when the
    /// server did not reveal a usable length).
    Meta { total: Option<u64> },
    Data(Vec<u8>),
    Ended(StreamEnd),
}

/// Terminal state of a download stream.
#[derive(Debug)]
pub enum StreamEnd {
    /// Transfer ran to the end of the body.
    Complete,
    /// The pause token tripped; the transfer stopped cleanly. Not an error.
    Paused,
    /// Transport or HTTP failure.
    Failed(String),
}

/// Receiver half of a streaming download.
pub struct ChunkStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl ChunkStream {
    /// Next event, or None once `Ended` has been consumed.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

pub(super) fn download(
    url: String,
    user_agent: String,
    start_byte: u64,
    pause: Arc<AtomicBool>,
) -> ChunkStream {
    let (tx, rx) = mpsc::channel::<StreamEvent>(16);
    tokio::task::spawn_blocking(move || {
        let end = perform_stream(&url, &user_agent, start_byte, &pause, &tx);
        let _ = tx.blocking_send(StreamEvent::Ended(end));
    });
    ChunkStream { rx }
}

struct StreamCtx {
    headers: HeaderCollector,
    meta_sent: bool,
    paused: bool,
    bad_status: Option<u32>,
    receiver_gone: bool,
}

fn perform_stream(
    url: &str,
    user_agent: &str,
    start_byte: u64,
    pause: &AtomicBool,
    tx: &mpsc::Sender<StreamEvent>,
) -> StreamEnd {
    let mut easy = curl::easy::Easy::new();
    if easy.url(url).is_err() {
        return StreamEnd::Failed(format!("invalid URL: {}", url));
    }
    let setup = (|| -> Result<(), curl::Error> {
        easy.useragent(user_agent)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(Duration::from_secs(30))?;
        // Abort if throughput drops below 1 KiB/s for 60 s; no hard
        // wall-clock timeout for large bodies.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;
        easy.buffer_size(CHUNK_SIZE)?;
        if start_byte > 0 {
            easy.range(&format!("{}-", start_byte))?;
        }
        Ok(())
    })();
    if let Err(e) = setup {
        return StreamEnd::Failed(e.to_string());
    }

    let ctx = RefCell::new(StreamCtx {
        headers: HeaderCollector::default(),
        meta_sent: false,
        paused: false,
        bad_status: None,
        receiver_gone: false,
    });

    let perform_result = {
        let mut transfer = easy.transfer();
        if let Err(e) = transfer.header_function(|data| {
            ctx.borrow_mut().headers.push(data);
            true
        }) {
            return StreamEnd::Failed(e.to_string());
        }
        if let Err(e) = transfer.write_function(|data| {
            let mut ctx = ctx.borrow_mut();
            if pause.load(Ordering::Relaxed) {
                ctx.paused = true;
                return Ok(0);
            }
            if !ctx.meta_sent {
                let block = ctx.headers.block();
                if !(200..300).contains(&block.status) {
                    ctx.bad_status = Some(block.status);
                    return Ok(0);
                }
                let total = block.total_hint(start_byte);
                if tx.blocking_send(StreamEvent::Meta { total }).is_err() {
                    ctx.receiver_gone = true;
                    return Ok(0);
                }
                ctx.meta_sent = true;
            }
            if tx.blocking_send(StreamEvent::Data(data.to_vec())).is_err() {
                ctx.receiver_gone = true;
                return Ok(0);
            }
            Ok(data.len())
        }) {
            return StreamEnd::Failed(e.to_string());
        }
        transfer.perform()
    };

    let ctx = ctx.into_inner();
    match perform_result {
        Err(e) => {
            if ctx.paused {
                StreamEnd::Paused
            } else if let Some(code) = ctx.bad_status {
                StreamEnd::Failed(format!("GET {} returned HTTP {}", url, code))
            } else if ctx.receiver_gone {
                StreamEnd::Failed("stream receiver dropped".to_string())
            } else {
                StreamEnd::Failed(format!("GET {}: {}", url, e))
            }
        }
        Ok(()) => {
            let code = easy.response_code().unwrap_or(0);
            if !(200..300).contains(&code) {
                return StreamEnd::Failed(format!("GET {} returned HTTP {}", url, code));
            }
            if !ctx.meta_sent {
                // Empty body: the write callback never fired.
                let total = ctx.headers.block().total_hint(start_byte);
                let _ = tx.blocking_send(StreamEvent::Meta { total });
            }
            StreamEnd::Complete
        }
    }
}

/// Whole-body GET for small resources. Blocking.
pub(super) fn fetch_bytes(url: &str, user_agent: &str) -> QdmResult<Vec<u8>> {
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)
        .map_err(|_| QdmError::InvalidInput(format!("invalid URL: {}", url)))?;
    let setup = (|| -> Result<(), curl::Error> {
        easy.useragent(user_agent)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(Duration::from_secs(10))?;
        easy.timeout(Duration::from_secs(60))?;
        Ok(())
    })();
    setup.map_err(|e| QdmError::Transport(e.to_string()))?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(|e| QdmError::Transport(e.to_string()))?;
        transfer
            .perform()
            .map_err(|e| QdmError::Transport(format!("GET {}: {}", url, e)))?;
    }

    let code = easy
        .response_code()
        .map_err(|e| QdmError::Transport(e.to_string()))?;
    if !(200..300).contains(&code) {
        return Err(QdmError::Transport(format!(
            "GET {} returned HTTP {}",
            url, code
        )));
    }
    Ok(body)
}
