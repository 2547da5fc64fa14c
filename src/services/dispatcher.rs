//! Operation registry and argument binding.
//!
//! Every remote operation is registered once under its `group.method`
//! identity. Binding an operation filters out unset arguments, fills the path
//! template and moves the remaining arguments to the query string. Binding
//! never touches the network.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use log::{debug, error};
use reqwest::Method;
use crate::errors::DriveError::InvalidArgumentError;
use crate::errors::DriveResult;

/// Value of a keyword argument. `Unset` arguments are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParamValue {
    #[default]
    Unset,
    Str(String),
    Bool(bool),
    Int(i64),
}

impl ParamValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    fn as_query_value(&self) -> Option<String> {
        match self {
            Self::Unset => None,
            Self::Str(value) => Some(value.clone()),
            Self::Bool(value) => Some(value.to_string()),
            Self::Int(value) => Some(value.to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(value as i64)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Unset)
    }
}

/// Keyword arguments in declaration order, keyed by their API name.
pub type KwArgs = Vec<(&'static str, ParamValue)>;

/// Conversion of a typed parameter set into keyword arguments.
pub trait IntoKwArgs {
    fn into_kwargs(self) -> KwArgs;
}

impl IntoKwArgs for KwArgs {
    fn into_kwargs(self) -> KwArgs {
        self
    }
}

/// Drops every unset argument and keeps the rest untouched and in order.
pub fn filter_unset(args: KwArgs) -> KwArgs {
    args.into_iter()
        .filter(|(_, value)| !value.is_unset())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId {
    pub group: &'static str,
    pub method: &'static str,
}

impl OperationId {
    pub const fn new(group: &'static str, method: &'static str) -> Self {
        Self { group, method }
    }
}

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group, self.method)
    }
}

pub mod operations {
    use super::OperationId;

    pub const FILES_LIST: OperationId = OperationId::new("files", "list");
    pub const FILES_GET: OperationId = OperationId::new("files", "get");
    pub const FILES_GET_MEDIA: OperationId = OperationId::new("files", "get_media");
    pub const FILES_DOWNLOAD: OperationId = OperationId::new("files", "download");
    pub const DRIVES_LIST: OperationId = OperationId::new("drives", "list");
    pub const DRIVES_GET: OperationId = OperationId::new("drives", "get");
}

/// How an operation maps onto the REST API.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub http_method: Method,
    /// Path relative to the API base, with `{param}` placeholders.
    pub path: &'static str,
    /// Media operations return the raw object body (`alt=media`).
    pub media: bool,
}

impl OperationSpec {
    pub fn new(http_method: Method, path: &'static str) -> Self {
        Self { http_method, path, media: false }
    }

    pub fn media(mut self) -> Self {
        self.media = true;
        self
    }
}

/// Operation resolved against the registry with its arguments bound.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRequest {
    pub operation: OperationId,
    pub http_method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestDispatcher {
    groups: HashMap<&'static str, HashMap<&'static str, OperationSpec>>,
}

impl RequestDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Drive v3 operations this crate declares.
    pub fn drive_v3() -> Self {
        use operations::*;

        let mut dispatcher = Self::new();
        dispatcher
            .register(FILES_LIST, OperationSpec::new(Method::GET, "/files"))
            .register(FILES_GET, OperationSpec::new(Method::GET, "/files/{fileId}"))
            .register(FILES_GET_MEDIA, OperationSpec::new(Method::GET, "/files/{fileId}").media())
            .register(FILES_DOWNLOAD, OperationSpec::new(Method::POST, "/files/{fileId}/download"))
            .register(DRIVES_LIST, OperationSpec::new(Method::GET, "/drives"))
            .register(DRIVES_GET, OperationSpec::new(Method::GET, "/drives/{driveId}"));
        dispatcher
    }

    pub fn register(&mut self, operation: OperationId, spec: OperationSpec) -> &mut Self {
        self.groups
            .entry(operation.group)
            .or_default()
            .insert(operation.method, spec);
        self
    }

    pub fn resolve(&self, operation: OperationId) -> DriveResult<&OperationSpec> {
        let group = self.groups.get(operation.group)
            .ok_or_else(|| {
                error!("Unknown resource group: {}", operation.group);
                InvalidArgumentError(format!("Resource group '{}' is not registered", operation.group))
            })?;

        group.get(operation.method)
            .ok_or_else(|| {
                error!("Unknown operation: {}", operation);
                InvalidArgumentError(format!("Operation '{}' is not registered", operation))
            })
    }

    pub fn bind<A: IntoKwArgs>(&self, operation: OperationId, args: A) -> DriveResult<BoundRequest> {
        let spec = self.resolve(operation)?;
        let mut remaining = filter_unset(args.into_kwargs());

        let path = fill_path(spec.path, &mut remaining)
            .map_err(|name| InvalidArgumentError(
                format!("Operation '{}' requires argument '{}'", operation, name)))?;

        let mut query = remaining
            .into_iter()
            .filter_map(|(name, value)| value.as_query_value().map(|value| (name.to_string(), value)))
            .collect::<Vec<_>>();
        if spec.media {
            query.push(("alt".to_string(), "media".to_string()));
        }
        debug!("Bound {} to {} {} with {} query argument(s)", operation, spec.http_method, path, query.len());

        Ok(BoundRequest {
            operation,
            http_method: spec.http_method.clone(),
            path,
            query,
        })
    }
}

/// Replaces `{name}` placeholders, taking the arguments out of `args`.
/// Returns the name of the first missing argument on failure.
fn fill_path(template: &str, args: &mut KwArgs) -> Result<String, String> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let close = match rest[open..].find('}') {
            Some(close) => open + close,
            None => break,
        };
        let name = &rest[open + 1..close];
        let position = args.iter().position(|(arg, _)| *arg == name).ok_or_else(|| name.to_string())?;
        let (_, value) = args.remove(position);
        let value = value.as_query_value().ok_or_else(|| name.to_string())?;

        path.push_str(&rest[..open]);
        path.push_str(&urlencoding::encode(&value));
        rest = &rest[close + 1..];
    }
    path.push_str(rest);

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::operations::*;

    #[test]
    fn test_filter_unset_keeps_set_arguments() {
        let args: KwArgs = vec![
            ("q", "name = 'a'".into()),
            ("driveId", ParamValue::Unset),
            ("supportsAllDrives", false.into()),
            ("pageSize", Some(10u32).into()),
            ("pageToken", None::<String>.into()),
        ];

        assert_eq!(filter_unset(args), vec![
            ("q", ParamValue::Str("name = 'a'".to_string())),
            ("supportsAllDrives", ParamValue::Bool(false)),
            ("pageSize", ParamValue::Int(10)),
        ]);
    }

    #[test]
    fn test_bind_moves_arguments_to_query() {
        let dispatcher = RequestDispatcher::drive_v3();
        let bound = dispatcher.bind(FILES_LIST, vec![
            ("q", ParamValue::from("trashed = false")),
            ("fields", ParamValue::Unset),
            ("includeItemsFromAllDrives", true.into()),
        ]).unwrap();

        assert_eq!(bound.http_method, Method::GET);
        assert_eq!(bound.path, "/files");
        assert_eq!(bound.query, vec![
            ("q".to_string(), "trashed = false".to_string()),
            ("includeItemsFromAllDrives".to_string(), "true".to_string()),
        ]);
    }

    #[test]
    fn test_bind_fills_path_and_media_flag() {
        let dispatcher = RequestDispatcher::drive_v3();
        let bound = dispatcher.bind(FILES_GET_MEDIA, vec![
            ("fileId", ParamValue::from("abc/123")),
            ("acknowledgeAbuse", ParamValue::Unset),
        ]).unwrap();

        assert_eq!(bound.path, "/files/abc%2F123");
        assert_eq!(bound.query, vec![("alt".to_string(), "media".to_string())]);

        let bound = dispatcher.bind(FILES_DOWNLOAD, vec![("fileId", ParamValue::from("abc"))]).unwrap();
        assert_eq!(bound.http_method, Method::POST);
        assert_eq!(bound.path, "/files/abc/download");
    }

    #[test]
    fn test_bind_percent_encodes_path_segment() {
        let dispatcher = RequestDispatcher::drive_v3();
        let bound = dispatcher.bind(FILES_GET, vec![("fileId", ParamValue::from("a b+c"))]).unwrap();

        assert_eq!(bound.path, "/files/a%20b%2Bc");
    }

    #[test]
    fn test_bind_missing_path_argument() {
        let dispatcher = RequestDispatcher::drive_v3();
        let result = dispatcher.bind(FILES_GET, vec![("fileId", ParamValue::Unset)]);
        assert!(matches!(result, Err(InvalidArgumentError(_))));
    }

    #[test]
    fn test_resolve_unknown_operation() {
        let dispatcher = RequestDispatcher::drive_v3();
        assert!(matches!(
            dispatcher.resolve(OperationId::new("permissions", "list")),
            Err(InvalidArgumentError(_))));
        assert!(matches!(
            dispatcher.resolve(OperationId::new("files", "delete")),
            Err(InvalidArgumentError(_))));
    }

    #[test]
    fn test_register_custom_operation() {
        let mut dispatcher = RequestDispatcher::new();
        let about = OperationId::new("about", "get");
        dispatcher.register(about, OperationSpec::new(Method::GET, "/about"));

        let bound = dispatcher.bind(about, vec![("fields", ParamValue::from("user"))]).unwrap();
        assert_eq!(bound.operation.to_string(), "about.get");
        assert_eq!(bound.query, vec![("fields".to_string(), "user".to_string())]);
    }
}
