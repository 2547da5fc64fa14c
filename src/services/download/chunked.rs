use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info, warn};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use crate::config::{ChunkErrorPolicy, TransferConfig, DEFAULT_CHUNK_SIZE};
use crate::errors::DriveError::{InvalidArgumentError, ParseError};
use crate::errors::{DriveError, DriveResult};
use crate::services::download::progress::{DownloadProgress, ProgressReporter, ProgressTracker, TransferBuffer};
use crate::services::google_drive::{FilesApi, FilesGetMediaParams};
use crate::services::request::{send_with_retry_accepting, HttpRequest, LazyRequest};
use crate::utils::parser::{byte_range, parse_content_range};

/// Transfer that proceeds one bounded chunk per call.
#[async_trait]
pub trait ChunkedRequest: Send {
    /// Fetches the next chunk. `done` is true only once the whole object
    /// has been received.
    async fn next_chunk(&mut self) -> DriveResult<(DownloadProgress, bool)>;

    /// Hands out the assembled content. Fails unless the transfer is done.
    fn finish(self) -> DriveResult<Bytes> where Self: Sized;
}

/// Ranged download of a media request into memory.
pub struct MediaDownload {
    request: HttpRequest<Bytes>,
    chunksize: u64,
    num_retries: u32,
    buffer: TransferBuffer,
    progress: u64,
    total_size: Option<u64>,
    done: bool,
}

impl MediaDownload {
    pub fn new(request: HttpRequest<Bytes>, chunksize: usize) -> DriveResult<Self> {
        if chunksize == 0 {
            return Err(InvalidArgumentError("Chunk size must be greater than 0".to_string()));
        }

        Ok(Self {
            request,
            chunksize: chunksize as u64,
            num_retries: 0,
            buffer: TransferBuffer::new(),
            progress: 0,
            total_size: None,
            done: false,
        })
    }

    pub fn num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    fn status(&self) -> DownloadProgress {
        DownloadProgress::new(self.progress, self.total_size, self.done)
    }
}

#[async_trait]
impl ChunkedRequest for MediaDownload {
    async fn next_chunk(&mut self) -> DriveResult<(DownloadProgress, bool)> {
        if self.done {
            return Ok((self.status(), true))
        }

        let operation = self.request.operation();
        let range = byte_range(self.progress, self.chunksize);
        debug!("{} requesting {}", operation, range);

        let response = send_with_retry_accepting(operation, self.num_retries, &[StatusCode::RANGE_NOT_SATISFIABLE], || {
            Ok(self.request.builder(None)?.header(RANGE, range.as_str()))
        }).await?;

        let status = response.status();
        let content_range = match response.headers().get(CONTENT_RANGE) {
            Some(value) => {
                let value = value.to_str()
                    .map_err(|e| ParseError(format!("Content-Range is not ASCII: {:?}", e)))?;
                Some(parse_content_range(value)?)
            },
            None => None,
        };

        // Nothing is left past the current offset.
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            let total = content_range
                .and_then(|content_range| content_range.total)
                .or(self.total_size)
                .unwrap_or(self.progress);
            if total != self.progress {
                error!("{} rejected {} with {} of {} bytes received", operation, range, self.progress, total);
                return Err(DriveError::transport(operation, Some(status.as_u16()),
                    format!("Range {} not satisfiable after {} of {} bytes", range, self.progress, total)));
            }
            debug!("{} complete at {} bytes", operation, self.progress);
            self.total_size = Some(total);
            self.done = true;
            return Ok((self.status(), true))
        }

        let chunk = response.bytes()
            .await
            .map_err(|e| DriveError::transport(operation, None, format!("Failed to read chunk: {}", e)))?;
        let length = chunk.len() as u64;

        match content_range {
            Some(content_range) => {
                if let Some((start, end)) = content_range.range {
                    if start != self.progress || end + 1 - start != length {
                        error!("{} returned bytes {}-{} ({} bytes) for {}", operation, start, end, length, range);
                        return Err(DriveError::transport(operation, Some(status.as_u16()),
                            format!("Expected a chunk at offset {} but got bytes {}-{} with {} bytes", self.progress, start, end, length)));
                    }
                }
                if let Some(total) = content_range.total {
                    self.total_size = Some(total);
                }
            },
            // A full response is only acceptable for the first chunk.
            None if status != StatusCode::PARTIAL_CONTENT && self.progress == 0 => self.total_size = Some(length),
            None => {
                return Err(DriveError::transport(operation, Some(status.as_u16()),
                    format!("Response to {} has no Content-Range", range)));
            },
        }

        let progress = self.progress + length;
        if let Some(total) = self.total_size {
            if progress > total {
                error!("{} overran the object: {} of {} bytes", operation, progress, total);
                return Err(DriveError::transport(operation, Some(status.as_u16()),
                    format!("Received {} bytes for an object of {} bytes", progress, total)));
            }
        }
        self.buffer.write(&chunk);
        self.progress = progress;

        self.done = match self.total_size {
            Some(total) => self.progress == total,
            None => length < self.chunksize,
        };

        Ok((self.status(), self.done))
    }

    fn finish(self) -> DriveResult<Bytes> {
        if !self.done {
            return Err(InvalidArgumentError(
                format!("Download of {} is not finished ({} bytes received)", self.request.operation(), self.progress)));
        }
        Ok(self.buffer.finish())
    }
}

/// Downloads whole objects chunk by chunk.
#[derive(Debug, Clone)]
pub struct ChunkedDownloader {
    chunksize: usize,
    num_retries: u32,
    policy: ChunkErrorPolicy,
}

impl Default for ChunkedDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedDownloader {
    pub fn new(chunksize: usize) -> Self {
        Self {
            chunksize,
            num_retries: 0,
            policy: ChunkErrorPolicy::default(),
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            chunksize: config.chunksize,
            num_retries: config.num_retries,
            policy: config.chunk_error_policy,
        }
    }

    pub fn chunksize(mut self, chunksize: usize) -> Self {
        self.chunksize = chunksize;
        self
    }

    pub fn num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    pub fn policy(mut self, policy: ChunkErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Downloads `file_id` through `files.get_media`.
    ///
    /// Under `ChunkErrorPolicy::FailSoft` a failed chunk is logged and the
    /// result is `Ok(None)`; otherwise the error is returned.
    pub async fn download<F: FilesApi + ?Sized>(&self, files: &F, file_id: &str, reporter: &mut dyn ProgressReporter) -> DriveResult<Option<Bytes>> {
        let request = files.get_media(FilesGetMediaParams::new(file_id))?;
        let media = MediaDownload::new(request, self.chunksize)?.num_retries(self.num_retries);

        match self.drive(media, reporter).await {
            Ok(content) => Ok(Some(content)),
            Err(e) => match self.policy {
                ChunkErrorPolicy::FailFast => Err(e),
                ChunkErrorPolicy::FailSoft => {
                    error!("An error occurred while downloading {}: {}", file_id, e);
                    Ok(None)
                },
            },
        }
    }

    /// Calls `next_chunk` until the transfer is done and returns the content.
    pub async fn drive<C: ChunkedRequest>(&self, mut request: C, reporter: &mut dyn ProgressReporter) -> DriveResult<Bytes> {
        let mut tracker = ProgressTracker::new();
        let mut chunks = 0;

        loop {
            let (status, done) = request.next_chunk().await?;
            chunks += 1;

            let reported = tracker.advance(&status);
            if status.progress() < reported.progress() {
                warn!("Progress regressed to {:.3}; keeping {:.3}", status.progress(), reported.progress());
            }
            reporter.update(&reported);

            if done {
                reporter.finish(&reported);
                info!("Download finished in {} chunk(s), {} bytes", chunks, status.resumable_progress);
                break
            }
        }

        request.finish()
    }
}
