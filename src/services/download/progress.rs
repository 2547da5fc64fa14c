use std::time::Duration;
use bytes::{Bytes, BytesMut};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;

/// Status reported after each chunk of a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub resumable_progress: u64,
    /// Size of the whole object, when the server reported one.
    pub total_size: Option<u64>,
    pub done: bool,
}

impl DownloadProgress {
    pub fn new(resumable_progress: u64, total_size: Option<u64>, done: bool) -> Self {
        Self { resumable_progress, total_size, done }
    }

    /// Completed fraction in `[0, 1]`. Unknown or zero totals report `0`
    /// until the transfer is done.
    pub fn progress(&self) -> f64 {
        if self.done {
            return 1.0
        }
        match self.total_size {
            Some(total) if total > 0 => (self.resumable_progress as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    InProgress,
    Done,
}

/// Monotonic view over the statuses of one transfer.
#[derive(Debug)]
pub struct ProgressTracker {
    state: TransferState,
    last: Option<DownloadProgress>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: TransferState::Pending,
            last: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn fraction(&self) -> f64 {
        self.last.map(|last| last.progress()).unwrap_or(0.0)
    }

    /// Records `status` and returns the status to report, which never
    /// regresses below an earlier one.
    pub fn advance(&mut self, status: &DownloadProgress) -> DownloadProgress {
        let reported = match self.last {
            Some(last) if status.progress() < last.progress() => DownloadProgress { done: status.done, ..last },
            _ => *status,
        };
        self.last = Some(reported);
        self.state = if reported.done {
            TransferState::Done
        } else {
            TransferState::InProgress
        };
        reported
    }
}

/// Observer of a transfer.
pub trait ProgressReporter: Send {
    fn update(&mut self, progress: &DownloadProgress);

    fn finish(&mut self, _progress: &DownloadProgress) {}
}

/// Discards every update.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&mut self, _progress: &DownloadProgress) {}
}

/// Reports through `log` at each whole percent.
pub struct LogProgress {
    label: String,
    last_percent: Option<u64>,
}

impl LogProgress {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            last_percent: None,
        }
    }
}

impl ProgressReporter for LogProgress {
    fn update(&mut self, progress: &DownloadProgress) {
        let percent = (progress.progress() * 100.0) as u64;
        if self.last_percent != Some(percent) {
            info!("Download {} {}% ({} bytes)", self.label, percent, progress.resumable_progress);
            self.last_percent = Some(percent);
        }
    }

    fn finish(&mut self, progress: &DownloadProgress) {
        info!("Download {} complete ({} bytes)", self.label, progress.resumable_progress);
    }
}

const RUNNING_TEMPLATE: &str = "{msg} [{bar:40.yellow}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const DONE_TEMPLATE: &str = "{msg} [{bar:40.green}] {bytes}/{total_bytes}";
const SPINNER_TEMPLATE: &str = "{spinner:.yellow} {msg} {bytes} ({bytes_per_sec})";
const SPINNER_DONE_TEMPLATE: &str = "{msg} {bytes:.green}";

/// Terminal progress bar, yellow while running and green once finished.
///
/// Falls back to a spinner while the total size is unknown.
pub struct ConsoleProgress {
    label: String,
    draw_target: fn() -> ProgressDrawTarget,
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            draw_target: ProgressDrawTarget::stderr,
            bar: None,
        }
    }

    fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
        ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
    }

    fn bar(&mut self, progress: &DownloadProgress) -> &ProgressBar {
        let total = progress.total_size.filter(|total| *total > 0);
        let label = &self.label;
        let draw_target = self.draw_target;

        let bar = self.bar.get_or_insert_with(|| match total {
            Some(total) => {
                let bar = ProgressBar::with_draw_target(Some(total), draw_target());
                bar.set_style(Self::style(RUNNING_TEMPLATE, ProgressStyle::default_bar));
                bar.set_message(label.clone());
                bar
            },
            None => {
                let bar = ProgressBar::with_draw_target(None, draw_target());
                bar.set_style(Self::style(SPINNER_TEMPLATE, ProgressStyle::default_spinner));
                bar.set_message(label.clone());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            },
        });

        if let Some(total) = total {
            if bar.length() != Some(total) {
                bar.set_length(total);
                bar.set_style(Self::style(RUNNING_TEMPLATE, ProgressStyle::default_bar));
            }
        }
        bar
    }
}

impl ProgressReporter for ConsoleProgress {
    fn update(&mut self, progress: &DownloadProgress) {
        self.bar(progress).set_position(progress.resumable_progress);
    }

    fn finish(&mut self, progress: &DownloadProgress) {
        let message = format!("Downloaded {}", self.label);
        let bar = self.bar(progress);
        bar.set_position(progress.resumable_progress);
        if bar.length().is_some() {
            bar.set_style(Self::style(DONE_TEMPLATE, ProgressStyle::default_bar));
        } else {
            bar.set_style(Self::style(SPINNER_DONE_TEMPLATE, ProgressStyle::default_spinner));
        }
        bar.finish_with_message(message);
    }
}

/// Growable in-memory sink for one transfer.
#[derive(Debug, Default)]
pub struct TransferBuffer {
    inner: BytesMut,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: BytesMut::with_capacity(capacity) }
    }

    pub fn write(&mut self, chunk: &[u8]) {
        self.inner.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Seals the buffer.
    pub fn finish(self) -> Bytes {
        self.inner.freeze()
    }
}
