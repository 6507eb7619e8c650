//! HLS: playlist parsing, stream analysis, and segment download/merge.

mod analyze;
mod download;
mod parse;
mod types;

pub use analyze::{HlsAnalyzer, HlsSummary};
pub use download::HlsDownloader;
pub use types::{quality_label, HlsManifest, HlsSegment, HlsVariant, StreamType};
