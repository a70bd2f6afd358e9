//! The request descriptor: everything needed to issue one request.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::context::CompletionContext;
use crate::error::ClassifiedError;
use crate::http::HttpMethod;

/// Timeout applied when a descriptor does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// MIME type a descriptor expects unless told otherwise.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Shortest URL path, leading slash included, that `submit` accepts.
pub const MIN_PATH_LEN: usize = 5;

/// Immutable description of one HTTP request.
///
/// Built with [`RequestDescriptor::new`] or [`RequestDescriptor::parse`]
/// followed by the `with_*` methods, then handed to
/// `RequestManager::submit`.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    url: Url,
    method: HttpMethod,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
    expected_mime_type: String,
    completion_context: Option<CompletionContext>,
    log_failures: bool,
}

impl RequestDescriptor {
    pub fn new(url: Url, method: HttpMethod) -> Self {
        Self {
            url,
            method,
            headers: HashMap::new(),
            timeout: None,
            expected_mime_type: DEFAULT_MIME_TYPE.to_string(),
            completion_context: None,
            log_failures: false,
        }
    }

    /// Parse `url` as an absolute URL; anything else is `SetupInvalidUrl`.
    pub fn parse(url: &str, method: HttpMethod) -> Result<Self, ClassifiedError> {
        let url = Url::parse(url).map_err(|_| ClassifiedError::SetupInvalidUrl)?;
        Ok(Self::new(url, method))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_expected_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.expected_mime_type = mime_type.into();
        self
    }

    pub fn with_completion_context(mut self, context: impl Into<CompletionContext>) -> Self {
        self.completion_context = Some(context.into());
        self
    }

    pub fn with_log_failures(mut self, log_failures: bool) -> Self {
        self.log_failures = log_failures;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The configured timeout, or [`DEFAULT_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn expected_mime_type(&self) -> &str {
        &self.expected_mime_type
    }

    pub fn completion_context(&self) -> Option<&CompletionContext> {
        self.completion_context.as_ref()
    }

    pub fn log_failures(&self) -> bool {
        self.log_failures
    }

    /// Checks the path-length invariant enforced at submission.
    pub fn validate(&self) -> Result<(), ClassifiedError> {
        if self.url.path().chars().count() < MIN_PATH_LEN {
            return Err(ClassifiedError::SetupInvalidUrl);
        }
        Ok(())
    }
}
