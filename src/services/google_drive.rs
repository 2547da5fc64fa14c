//! Resource groups of the Drive v3 API.
//!
//! Each group is declared as a trait whose methods carry the operation's
//! parameter set and result type. `Files` and `Drives` implement them by
//! dispatching through the session's operation registry.

use std::sync::Arc;
use bytes::Bytes;
use serde_json::Value;
use crate::errors::DriveResult;
use crate::services::dispatcher::operations::{DRIVES_GET, DRIVES_LIST, FILES_DOWNLOAD, FILES_GET, FILES_GET_MEDIA, FILES_LIST};
use crate::services::dispatcher::{IntoKwArgs, KwArgs};
use crate::services::download::{ChunkedDownloader, LogProgress};
use crate::services::request::HttpRequest;
use crate::services::DriveSession;
use crate::types::google_drive::{DriveList, FileList};

pub trait FilesApi: Send + Sync {
    fn list(&self, params: FilesListParams) -> DriveResult<HttpRequest<FileList>>;
    fn get(&self, params: FilesGetParams) -> DriveResult<HttpRequest<Value>>;
    fn get_media(&self, params: FilesGetMediaParams) -> DriveResult<HttpRequest<Bytes>>;
    /// Starts a download operation whose response carries a `downloadUri`.
    fn download(&self, params: FilesDownloadParams) -> DriveResult<HttpRequest<Value>>;
}

pub trait DrivesApi: Send + Sync {
    fn list(&self, params: DrivesListParams) -> DriveResult<HttpRequest<DriveList>>;
    fn get(&self, params: DrivesGetParams) -> DriveResult<HttpRequest<Value>>;
}

pub struct Files {
    session: Arc<DriveSession>,
}

impl Files {
    pub(crate) fn new(session: Arc<DriveSession>) -> Self {
        Self { session }
    }

    /// Downloads the whole file by chunks of `chunksize` bytes.
    ///
    /// Returns `Ok(None)` only when the session is configured with
    /// `ChunkErrorPolicy::FailSoft` and a chunk could not be fetched.
    pub async fn get_contents_of(&self, id: &str, chunksize: usize) -> DriveResult<Option<Bytes>> {
        ChunkedDownloader::from_config(self.session.config())
            .chunksize(chunksize)
            .download(self, id, &mut LogProgress::new(id))
            .await
    }
}

impl FilesApi for Files {
    fn list(&self, params: FilesListParams) -> DriveResult<HttpRequest<FileList>> {
        self.session.dispatch(FILES_LIST, params)
    }

    fn get(&self, params: FilesGetParams) -> DriveResult<HttpRequest<Value>> {
        self.session.dispatch(FILES_GET, params)
    }

    fn get_media(&self, params: FilesGetMediaParams) -> DriveResult<HttpRequest<Bytes>> {
        self.session.dispatch(FILES_GET_MEDIA, params)
    }

    fn download(&self, params: FilesDownloadParams) -> DriveResult<HttpRequest<Value>> {
        self.session.dispatch(FILES_DOWNLOAD, params)
    }
}

pub struct Drives {
    session: Arc<DriveSession>,
}

impl Drives {
    pub(crate) fn new(session: Arc<DriveSession>) -> Self {
        Self { session }
    }
}

impl DrivesApi for Drives {
    fn list(&self, params: DrivesListParams) -> DriveResult<HttpRequest<DriveList>> {
        self.session.dispatch(DRIVES_LIST, params)
    }

    fn get(&self, params: DrivesGetParams) -> DriveResult<HttpRequest<Value>> {
        self.session.dispatch(DRIVES_GET, params)
    }
}

/// Parameters of `files.list`. Unset fields are not sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesListParams {
    pub q: String,
    pub fields: Option<String>,
    pub include_items_from_all_drives: Option<bool>,
    pub supports_all_drives: Option<bool>,
    pub drive_id: Option<String>,
    pub corpora: Option<String>,
    pub page_size: Option<u32>,
    pub order_by: Option<String>,
    pub page_token: Option<String>,
    pub spaces: Option<String>,
    pub include_permissions_for_view: Option<String>,
    pub include_labels: Option<String>,
}

impl FilesListParams {
    pub fn new(q: &str) -> Self {
        Self {
            q: q.to_string(),
            fields: Some("*".to_string()),
            include_items_from_all_drives: Some(false),
            supports_all_drives: Some(false),
            drive_id: None,
            corpora: None,
            page_size: None,
            order_by: None,
            page_token: None,
            spaces: None,
            include_permissions_for_view: None,
            include_labels: None,
        }
    }

    pub fn fields(mut self, fields: Option<&str>) -> Self {
        self.fields = fields.map(String::from);
        self
    }

    /// Searches shared drives as well: sets both all-drives flags.
    pub fn all_drives(mut self, enabled: bool) -> Self {
        self.include_items_from_all_drives = Some(enabled);
        self.supports_all_drives = Some(enabled);
        self
    }

    pub fn drive_id(mut self, drive_id: &str) -> Self {
        self.drive_id = Some(drive_id.to_string());
        self
    }

    pub fn corpora(mut self, corpora: &str) -> Self {
        self.corpora = Some(corpora.to_string());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn order_by(mut self, order_by: &str) -> Self {
        self.order_by = Some(order_by.to_string());
        self
    }

    pub fn page_token(mut self, page_token: Option<&str>) -> Self {
        self.page_token = page_token.map(String::from);
        self
    }

    pub fn spaces(mut self, spaces: &str) -> Self {
        self.spaces = Some(spaces.to_string());
        self
    }
}

impl IntoKwArgs for FilesListParams {
    fn into_kwargs(self) -> KwArgs {
        vec![
            ("q", self.q.into()),
            ("fields", self.fields.into()),
            ("includeItemsFromAllDrives", self.include_items_from_all_drives.into()),
            ("supportsAllDrives", self.supports_all_drives.into()),
            ("driveId", self.drive_id.into()),
            ("corpora", self.corpora.into()),
            ("pageSize", self.page_size.into()),
            ("orderBy", self.order_by.into()),
            ("pageToken", self.page_token.into()),
            ("spaces", self.spaces.into()),
            ("includePermissionsForView", self.include_permissions_for_view.into()),
            ("includeLabels", self.include_labels.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilesGetParams {
    pub file_id: String,
    pub fields: Option<String>,
    pub acknowledge_abuse: Option<bool>,
    pub supports_all_drives: Option<bool>,
    pub supports_team_drives: Option<bool>,
    pub include_permissions_for_view: Option<String>,
    pub include_labels: Option<String>,
}

impl FilesGetParams {
    pub fn new(file_id: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            ..Default::default()
        }
    }

    pub fn fields(mut self, fields: &str) -> Self {
        self.fields = Some(fields.to_string());
        self
    }

    pub fn supports_all_drives(mut self, enabled: bool) -> Self {
        self.supports_all_drives = Some(enabled);
        self
    }
}

impl IntoKwArgs for FilesGetParams {
    fn into_kwargs(self) -> KwArgs {
        vec![
            ("fileId", self.file_id.into()),
            ("fields", self.fields.into()),
            ("acknowledgeAbuse", self.acknowledge_abuse.into()),
            ("supportsAllDrives", self.supports_all_drives.into()),
            ("supportsTeamDrives", self.supports_team_drives.into()),
            ("includePermissionsForView", self.include_permissions_for_view.into()),
            ("includeLabels", self.include_labels.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilesGetMediaParams {
    pub file_id: String,
    pub acknowledge_abuse: Option<bool>,
    pub supports_all_drives: Option<bool>,
}

impl FilesGetMediaParams {
    pub fn new(file_id: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            ..Default::default()
        }
    }

    pub fn acknowledge_abuse(mut self, acknowledge: bool) -> Self {
        self.acknowledge_abuse = Some(acknowledge);
        self
    }
}

impl IntoKwArgs for FilesGetMediaParams {
    fn into_kwargs(self) -> KwArgs {
        vec![
            ("fileId", self.file_id.into()),
            ("acknowledgeAbuse", self.acknowledge_abuse.into()),
            ("supportsAllDrives", self.supports_all_drives.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilesDownloadParams {
    pub file_id: String,
    pub mime_type: Option<String>,
    pub revision_id: Option<String>,
}

impl FilesDownloadParams {
    pub fn new(file_id: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            ..Default::default()
        }
    }

    pub fn mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn revision_id(mut self, revision_id: &str) -> Self {
        self.revision_id = Some(revision_id.to_string());
        self
    }
}

impl IntoKwArgs for FilesDownloadParams {
    fn into_kwargs(self) -> KwArgs {
        vec![
            ("fileId", self.file_id.into()),
            ("mimeType", self.mime_type.into()),
            ("revisionId", self.revision_id.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrivesListParams {
    pub q: Option<String>,
    pub fields: Option<String>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl Default for DrivesListParams {
    fn default() -> Self {
        Self {
            q: None,
            fields: Some("*".to_string()),
            page_size: None,
            page_token: None,
        }
    }
}

impl DrivesListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn q(mut self, q: &str) -> Self {
        self.q = Some(q.to_string());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page_token(mut self, page_token: Option<&str>) -> Self {
        self.page_token = page_token.map(String::from);
        self
    }
}

impl IntoKwArgs for DrivesListParams {
    fn into_kwargs(self) -> KwArgs {
        vec![
            ("q", self.q.into()),
            ("fields", self.fields.into()),
            ("pageSize", self.page_size.into()),
            ("pageToken", self.page_token.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrivesGetParams {
    pub drive_id: String,
    pub use_domain_admin_access: Option<bool>,
}

impl DrivesGetParams {
    pub fn new(drive_id: &str) -> Self {
        Self {
            drive_id: drive_id.to_string(),
            ..Default::default()
        }
    }
}

impl IntoKwArgs for DrivesGetParams {
    fn into_kwargs(self) -> KwArgs {
        vec![
            ("driveId", self.drive_id.into()),
            ("useDomainAdminAccess", self.use_domain_admin_access.into()),
        ]
    }
}
