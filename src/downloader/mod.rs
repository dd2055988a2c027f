// Acquisition side of the pipeline - backend trait, yt-dlp implementation,
// and the idempotent gate in front of it

pub mod errors;
pub mod gate;
pub mod models;
pub mod traits;
pub mod utils;
pub mod ytdlp;

pub use errors::BackendError;
pub use gate::{AcquisitionGate, GateOutcome, SkipReason};
pub use models::{newest_first, Artifact, DownloadOptions, VideoCandidate};
pub use traits::AcquisitionBackend;
pub use ytdlp::YtDlpAcquisition;
