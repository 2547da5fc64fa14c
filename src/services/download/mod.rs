mod chunked;
mod direct;
mod progress;

pub use chunked::{ChunkedDownloader, ChunkedRequest, MediaDownload};
pub use direct::DirectStreamDownloader;
pub use progress::{ConsoleProgress, DownloadProgress, LogProgress, NoProgress, ProgressReporter, ProgressTracker, TransferBuffer, TransferState};
