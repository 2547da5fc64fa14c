use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::errors::DriveError::ValidationError;
use crate::errors::{DriveError, DriveResult};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub mime_type: Option<String>,
    pub trashed: Option<bool>,
    pub parents: Option<Vec<String>>,
    // Google Drive API returns the size as a JSON string.
    size: Option<String>,
}

impl DriveFile {
    pub fn size(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse::<u64>().ok())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub incomplete_search: bool,
}

impl FileList {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SharedDrive {
    pub id: String,
    pub name: String,
    pub created_time: Option<String>,
    pub hidden: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DriveList {
    #[serde(default)]
    pub drives: Vec<SharedDrive>,
    pub next_page_token: Option<String>,
}

impl DriveList {
    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }
}

/// Raw record as it arrives from the API, before the parent list is collapsed.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct RawResourceRef {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trashed: Option<bool>,
    #[serde(default)]
    parents: Option<Vec<String>>,
}

/// Reference to a file which lives in exactly one folder.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(try_from = "RawResourceRef", into = "RawResourceRef")]
pub struct ResourceRef {
    id: String,
    name: String,
    mime_type: Option<String>,
    trashed: Option<bool>,
    parent: String,
}

impl ResourceRef {
    pub fn new(id: &str, name: &str, mime_type: Option<&str>, trashed: Option<bool>, parents: &[String]) -> DriveResult<Self> {
        if parents.len() != 1 {
            return Err(ValidationError(
                format!("Resource '{}' needs exactly one parent but found {}", id_summary(id), parents.len())));
        }

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.map(String::from),
            trashed,
            parent: parents[0].clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn trashed(&self) -> Option<bool> {
        self.trashed
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn to_value(&self) -> Value {
        // Plain strings and bools always serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl TryFrom<RawResourceRef> for ResourceRef {
    type Error = DriveError;

    fn try_from(raw: RawResourceRef) -> Result<Self, Self::Error> {
        let parents = raw.parents.unwrap_or_default();
        Self::new(&raw.id, &raw.name, raw.mime_type.as_deref(), raw.trashed, &parents)
    }
}

impl From<ResourceRef> for RawResourceRef {
    fn from(value: ResourceRef) -> Self {
        Self {
            id: value.id,
            name: value.name,
            mime_type: value.mime_type,
            trashed: value.trashed,
            parents: Some(vec![value.parent]),
        }
    }
}

impl TryFrom<&DriveFile> for ResourceRef {
    type Error = DriveError;

    fn try_from(file: &DriveFile) -> Result<Self, Self::Error> {
        let parents = file.parents.clone().unwrap_or_default();
        Self::new(&file.id, &file.name, file.mime_type.as_deref(), file.trashed, &parents)
    }
}

impl TryFrom<Value> for ResourceRef {
    type Error = DriveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
            .map_err(|e| ValidationError(format!("Invalid resource record: {}", e)))
    }
}

impl Hash for ResourceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceRef(id={}, name='{}', parent={})",
               id_summary(&self.id), self.name, id_summary(&self.parent))
    }
}

// Ids are credentials-adjacent, so Debug shares the abbreviated form.
impl Debug for ResourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Abbreviates an id to its first and last three characters.
pub fn id_summary(id: &str) -> String {
    let chars = id.chars().collect::<Vec<_>>();
    let head = chars.iter().take(3).collect::<String>();
    let tail = chars.iter().skip(chars.len().saturating_sub(3)).collect::<String>();
    format!("{}*{}", head, tail)
}

/// Long-running operation returned by `files.download`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadOperation {
    pub name: String,
    pub metadata: OperationMetadata,
    pub done: bool,
    pub response: DownloadResponse,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OperationMetadata {
    #[serde(rename = "@type")]
    pub type_url: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub download_uri: String,
    pub partial_download_allowed: bool,
}

impl TryFrom<&Value> for DownloadOperation {
    type Error = DriveError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        DownloadOperation::deserialize(value)
            .map_err(|e| ValidationError(format!("Unexpected download operation payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use serde_json::json;
    use super::*;

    #[test]
    fn test_resource_ref_single_parent() {
        let value = json!({
            "id": "1rmRBMDEMurxCBwmpVj47THuYuDVDsco",
            "name": "train.csv",
            "mimeType": "text/csv",
            "parents": ["0AHRtPNDr1lZUk9PVA"]
        });

        let resource = ResourceRef::try_from(value).unwrap();
        assert_eq!(resource.parent(), "0AHRtPNDr1lZUk9PVA");
        assert_eq!(resource.mime_type(), Some("text/csv"));
        assert_eq!(resource.trashed(), None);
        assert_eq!(resource.to_string(), "ResourceRef(id=1rm*sco, name='train.csv', parent=0AH*PVA)");
    }

    #[test]
    fn test_resource_ref_rejects_parent_count() {
        for parents in [json!([]), json!(["a", "b"]), Value::Null] {
            let value = json!({"id": "abc", "name": "x", "parents": parents});
            let result = ResourceRef::try_from(value);
            assert!(matches!(result, Err(ValidationError(_))), "parents: {:?}", result);
        }

        let result = ResourceRef::try_from(json!({"id": "abc", "name": "x"}));
        assert!(matches!(result, Err(ValidationError(_))));
    }

    #[test]
    fn test_resource_ref_serializes_parent_list() {
        let resource = ResourceRef::new("abc", "x", None, Some(false), &["parent".to_string()]).unwrap();
        assert_eq!(resource.to_value(), json!({"id": "abc", "name": "x", "trashed": false, "parents": ["parent"]}));
    }

    #[test]
    fn test_resource_ref_hash_by_id() {
        let a = ResourceRef::new("abc", "x", None, None, &["p".to_string()]).unwrap();
        let b = ResourceRef::new("abc", "x", None, None, &["p".to_string()]).unwrap();
        let set = [a, b].into_iter().collect::<HashSet<_>>();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_id_summary_short_id() {
        assert_eq!(id_summary("abcdef"), "abc*def");
        assert_eq!(id_summary("ab"), "ab*ab");
    }

    #[test]
    fn test_file_list_into_resource_refs() {
        let list: FileList = serde_json::from_value(json!({
            "files": [
                {"id": "f1", "name": "a.txt", "parents": ["root"], "size": "12"},
                {"id": "f2", "name": "b.txt"}
            ],
            "nextPageToken": "token"
        })).unwrap();

        assert_eq!(list.files[0].size(), Some(12));
        assert!(ResourceRef::try_from(&list.files[0]).is_ok());
        assert!(ResourceRef::try_from(&list.files[1]).is_err());
        assert_eq!(list.next_page_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_download_operation_shape() {
        let payload = json!({
            "name": "operations/download-1",
            "metadata": {"@type": "type.googleapis.com/google.apps.drive.v3.DownloadFileMetadata"},
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.apps.drive.v3.DownloadFileResponse",
                "downloadUri": "https://example.com/download",
                "partialDownloadAllowed": false
            }
        });
        let operation = DownloadOperation::try_from(&payload).unwrap();
        assert_eq!(operation.response.download_uri, "https://example.com/download");

        let mut broken = payload.clone();
        broken["response"].as_object_mut().unwrap().remove("downloadUri");
        assert!(matches!(DownloadOperation::try_from(&broken), Err(ValidationError(_))));
    }
}
