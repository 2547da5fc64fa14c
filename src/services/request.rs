use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::errors::DriveError::ParseError;
use crate::errors::{DriveError, DriveResult};
use crate::services::dispatcher::{BoundRequest, OperationId};
use crate::services::DriveSession;
use crate::types::google_drive::{DriveFile, DriveList, FileList};

const MAX_BACKOFF: Duration = Duration::from_secs(64);

/// Deferred remote operation.
///
/// Building a request performs no I/O. Each `execute` call performs one
/// round trip, or a bounded sequence of retried round trips.
#[async_trait]
pub trait LazyRequest: Send + Sync {
    type Output: Send;

    fn operation(&self) -> OperationId;

    /// Executes the request.
    ///
    /// `transport` replaces the session client for this call. `num_retries`
    /// is the number of retries with randomized exponential backoff; `0`
    /// attempts the request exactly once.
    async fn execute(&self, transport: Option<&Client>, num_retries: u32) -> DriveResult<Self::Output>;
}

/// Decoding of a successful response into the operation's result type.
#[async_trait]
pub trait ResponseBody: Sized + Send {
    async fn from_response(operation: OperationId, response: Response) -> DriveResult<Self>;
}

#[async_trait]
impl ResponseBody for Bytes {
    async fn from_response(operation: OperationId, response: Response) -> DriveResult<Self> {
        response.bytes()
            .await
            .map_err(|e| DriveError::transport(operation, None, format!("Failed to read body: {}", e)))
    }
}

async fn json_body<T: DeserializeOwned>(operation: OperationId, response: Response) -> DriveResult<T> {
    let body = Bytes::from_response(operation, response).await?;
    serde_json::from_slice::<T>(&body)
        .map_err(|e| ParseError(format!("Failed to parse response of {}: {}", operation, e)))
}

macro_rules! json_response_body {
    ($($ty:ty),* $(,)?) => {
        $(
            #[async_trait]
            impl ResponseBody for $ty {
                async fn from_response(operation: OperationId, response: Response) -> DriveResult<Self> {
                    json_body(operation, response).await
                }
            }
        )*
    };
}

json_response_body!(Value, FileList, DriveList, DriveFile);

/// Request bound to a live session.
pub struct HttpRequest<T> {
    session: Arc<DriveSession>,
    bound: BoundRequest,
    _output: PhantomData<fn() -> T>,
}

impl<T> HttpRequest<T> {
    pub(crate) fn new(session: Arc<DriveSession>, bound: BoundRequest) -> Self {
        Self {
            session,
            bound,
            _output: PhantomData,
        }
    }

    pub fn bound(&self) -> &BoundRequest {
        &self.bound
    }

    /// Builds the request on the session client, or on `transport` with the
    /// session token attached.
    pub(crate) fn builder(&self, transport: Option<&Client>) -> DriveResult<RequestBuilder> {
        let url = self.session.endpoint(&self.bound.path)?;
        let builder = match transport {
            Some(client) => client
                .request(self.bound.http_method.clone(), url)
                .header(AUTHORIZATION, self.session.auth_header()?),
            None => self.session.client().request(self.bound.http_method.clone(), url),
        };

        Ok(builder.query(&self.bound.query))
    }
}

impl<T> Debug for HttpRequest<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("bound", &self.bound)
            .finish()
    }
}

#[async_trait]
impl<T: ResponseBody + 'static> LazyRequest for HttpRequest<T> {
    type Output = T;

    fn operation(&self) -> OperationId {
        self.bound.operation
    }

    async fn execute(&self, transport: Option<&Client>, num_retries: u32) -> DriveResult<T> {
        let operation = self.operation();
        let response = send_with_retry(operation, num_retries, || self.builder(transport)).await?;
        T::from_response(operation, response).await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `rand[0,1) * 2^attempt` seconds, capped.
pub(crate) fn backoff(attempt: u32) -> Duration {
    let seconds = fastrand::f64() * 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64(seconds).min(MAX_BACKOFF)
}

/// Sends the request built by `build`, retrying connection errors, 429 and
/// 5xx responses up to `num_retries` times.
pub(crate) async fn send_with_retry<F>(operation: OperationId, num_retries: u32, build: F) -> DriveResult<Response>
where
    F: Fn() -> DriveResult<RequestBuilder> + Send + Sync,
{
    send_with_retry_accepting(operation, num_retries, &[], build).await
}

/// Like [`send_with_retry`], but responses with a status in `accepted` are
/// returned as is for the caller to interpret.
pub(crate) async fn send_with_retry_accepting<F>(operation: OperationId,
                                                 num_retries: u32,
                                                 accepted: &[StatusCode],
                                                 build: F) -> DriveResult<Response>
where
    F: Fn() -> DriveResult<RequestBuilder> + Send + Sync,
{
    let mut attempt = 0;

    loop {
        let result = build()?.send().await;

        let failure = match result {
            Ok(response) if response.status().is_success() || accepted.contains(&response.status()) => {
                debug!("{} answered with status {}", operation, response.status());
                return Ok(response)
            },
            Ok(response) => {
                let status = response.status();
                if !is_retryable(status) || attempt >= num_retries {
                    let message = response.text().await.unwrap_or_default();
                    error!("Request {} failed with status {}: {}", operation, status, message);
                    return Err(DriveError::transport(operation, Some(status.as_u16()), message));
                }
                format!("status {}", status)
            },
            Err(e) => {
                if attempt >= num_retries {
                    error!("Failed to send request {}: {:?}", operation, e);
                    return Err(DriveError::transport(operation, None, e));
                }
                e.to_string()
            },
        };

        let wait = backoff(attempt);
        attempt += 1;
        warn!("Request {} failed (attempt {}/{}): {}, retrying in {}ms",
              operation, attempt, num_retries + 1, failure, wait.as_millis());
        tokio::time::sleep(wait).await;
    }
}
