//! Declarative bindings over the Google Drive v3 API.
//!
//! Operations are registered once in a dispatcher and exposed through the
//! typed `FilesApi` and `DrivesApi` groups. Calling an operation only builds
//! a [`services::request::HttpRequest`]; nothing is sent until `execute`.
//! Whole files are fetched with the ranged [`ChunkedDownloader`] or, for
//! `files.download` operations, the [`DirectStreamDownloader`].
//!
//! ```no_run
//! use drive_binding::{DriveSession, FilesApi, FilesListParams, LazyRequest, StaticCredential, TransferConfig};
//!
//! # async fn run() -> drive_binding::errors::DriveResult<()> {
//! let config = TransferConfig::new("auth");
//! let credential = StaticCredential::from_access_token("ya29...", &config.scopes);
//! let session = DriveSession::connect(config, &credential).await?;
//! let listing = session.files().list(FilesListParams::new("name = 'train.csv'"))?.execute(None, 3).await?;
//! for file in &listing.files {
//!     println!("{}", file.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod services;
pub mod types;
pub mod utils;

pub use config::{ChunkErrorPolicy, TransferConfig};
pub use errors::{DriveError, DriveResult};
pub use services::dispatcher::{OperationId, RequestDispatcher};
pub use services::download::{ChunkedDownloader, ConsoleProgress, DirectStreamDownloader, DownloadProgress, LogProgress, NoProgress, ProgressReporter};
pub use services::google_drive::{DrivesApi, FilesApi, FilesDownloadParams, FilesGetMediaParams, FilesGetParams, FilesListParams, DrivesGetParams, DrivesListParams};
pub use services::request::LazyRequest;
pub use services::{DriveSession, SessionCell};
pub use types::ResourceRef;
pub use utils::credential::{Authenticator, GoogleDriveToken, StaticCredential};
#[cfg(feature = "google_oauth2")]
pub use utils::oauth2::InstalledAppFlow;
