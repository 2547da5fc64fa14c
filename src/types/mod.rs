pub mod google_drive;

pub use google_drive::{DownloadOperation, DriveFile, DriveList, FileList, ResourceRef, SharedDrive};
