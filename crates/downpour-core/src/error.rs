//! Structured error model shared by every component boundary.
//!
//! Each error carries the originating operation name, a sentinel
//! [`ErrorKind`], an optional stable code consumed by the UI, an optional
//! user-facing message, and the underlying cause. Callers match on
//! [`CoreError::kind`], which walks the cause chain, so wrapping never
//! hides a sentinel.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Sentinel error kinds.
///
/// Callers test membership by identity (`err.kind() == ErrorKind::NotFound`),
/// never by string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The requested entity does not exist.
    NotFound,
    /// The entity already exists (e.g. duplicate active download).
    AlreadyExists,
    /// The supplied URL failed validation.
    InvalidUrl,
    /// The extractor does not support the target site.
    UnsupportedPlatform,
    /// A required external binary is missing.
    DependencyMissing,
    /// The download itself failed.
    DownloadFailed,
    /// A media conversion failed.
    ConversionFailed,
    /// Filesystem or OS permission denied.
    PermissionDenied,
    /// An operation exceeded its deadline.
    Timeout,
    /// The operation was cancelled cooperatively.
    Cancelled,
    /// A rate limiter rejected the operation.
    RateLimited,
    /// The target site requires authentication (cookies/login).
    AuthRequired,
    /// Uncategorized internal error.
    Internal,
}

impl ErrorKind {
    /// Stable error code consumed by the UI layer.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "ERR_NOT_FOUND",
            Self::AlreadyExists => "ERR_ALREADY_EXISTS",
            Self::InvalidUrl => "ERR_INVALID_URL",
            Self::UnsupportedPlatform => "ERR_UNSUPPORTED",
            Self::DependencyMissing => "ERR_DEPENDENCY",
            Self::DownloadFailed => "ERR_DOWNLOAD",
            Self::ConversionFailed => "ERR_CONVERSION",
            Self::PermissionDenied => "ERR_PERMISSION",
            Self::Timeout => "ERR_TIMEOUT",
            Self::Cancelled => "ERR_CANCELLED",
            Self::RateLimited => "ERR_RATE_LIMIT",
            Self::AuthRequired => "ERR_AUTH",
            Self::Internal => "ERR_INTERNAL",
        }
    }

    /// Default user-facing message for this kind.
    #[must_use]
    pub const fn default_user_message(self) -> &'static str {
        match self {
            Self::NotFound => "The requested item was not found.",
            Self::AlreadyExists => "This item already exists.",
            Self::InvalidUrl => "The URL is not valid.",
            Self::UnsupportedPlatform => "This site is not supported.",
            Self::DependencyMissing => "A required component is not installed.",
            Self::DownloadFailed => "The download failed.",
            Self::ConversionFailed => "The conversion failed.",
            Self::PermissionDenied => "Permission denied.",
            Self::Timeout => "The operation timed out.",
            Self::Cancelled => "The operation was cancelled.",
            Self::RateLimited => "Too many requests. Please wait a moment.",
            Self::AuthRequired => "This site requires you to be signed in.",
            Self::Internal => "An unexpected error occurred.",
        }
    }
}

/// Error value propagated across component boundaries.
///
/// Construction goes through the kind-specific helpers or [`CoreError::wrap`].
/// Wrapping is idempotent with respect to the sentinel kind: wrapping a
/// `CoreError` preserves its chain, and [`CoreError::kind`] finds the first
/// non-[`ErrorKind::Internal`] sentinel anywhere in that chain.
#[derive(Error)]
#[error("{op}: {message}")]
pub struct CoreError {
    op: Cow<'static, str>,
    kind: ErrorKind,
    message: String,
    code: Option<&'static str>,
    user_message: Option<String>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl CoreError {
    /// Create a new error with an explicit kind.
    pub fn new(
        kind: ErrorKind,
        op: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            op: op.into(),
            kind,
            message: message.into(),
            code: None,
            user_message: None,
            source: None,
        }
    }

    /// Wrap an underlying error with an operation name.
    ///
    /// If the source is itself a `CoreError`, its sentinel kind and user
    /// message are inherited so the wrap is transparent to matchers.
    pub fn wrap<E>(op: impl Into<Cow<'static, str>>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = Box::new(source);
        let (kind, user_message) = match boxed.downcast_ref::<Self>() {
            Some(inner) => (inner.kind(), inner.user_message.clone()),
            None => (ErrorKind::Internal, None),
        };
        Self {
            op: op.into(),
            kind,
            message: boxed.to_string(),
            code: None,
            user_message,
            source: Some(boxed),
        }
    }

    /// The sentinel kind, discovered anywhere in the cause chain.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        if self.kind != ErrorKind::Internal {
            return self.kind;
        }
        let mut cause: Option<&(dyn StdError + 'static)> =
            self.source.as_deref().map(|s| s as &(dyn StdError + 'static));
        while let Some(err) = cause {
            if let Some(core) = err.downcast_ref::<Self>() {
                if core.kind != ErrorKind::Internal {
                    return core.kind;
                }
            }
            cause = err.source();
        }
        ErrorKind::Internal
    }

    /// The operation that produced this error (e.g. `VideoHandler.AddToQueue`).
    #[must_use]
    pub fn op(&self) -> &str {
        &self.op
    }

    /// Stable code for the UI: an explicit override, or derived from the kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code.unwrap_or_else(|| self.kind().code())
    }

    /// Short localizable message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.user_message
            .clone()
            .unwrap_or_else(|| self.kind().default_user_message().to_string())
    }

    /// Attach an explicit stable code, overriding the kind-derived one.
    #[must_use]
    pub const fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a user-facing message.
    #[must_use]
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    /// Attach an underlying cause without changing the kind.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// True when the sentinel (anywhere in the chain) matches `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    // Kind-specific constructors. These keep call sites terse and the
    // operation name mandatory.

    /// A `NotFound` error.
    pub fn not_found(op: impl Into<Cow<'static, str>>, what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, op, what)
    }

    /// An `AlreadyExists` error.
    pub fn already_exists(op: impl Into<Cow<'static, str>>, what: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, op, what)
    }

    /// An `InvalidUrl` error.
    pub fn invalid_url(op: impl Into<Cow<'static, str>>, url: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidUrl, op, format!("invalid url: {}", url.into()))
    }

    /// An `UnsupportedPlatform` error.
    pub fn unsupported(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedPlatform, op, detail)
    }

    /// A `DependencyMissing` error.
    pub fn dependency_missing(op: impl Into<Cow<'static, str>>, binary: impl Into<String>) -> Self {
        let binary = binary.into();
        Self::new(
            ErrorKind::DependencyMissing,
            op,
            format!("missing dependency: {binary}"),
        )
    }

    /// A `DownloadFailed` error.
    pub fn download_failed(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::DownloadFailed, op, detail)
    }

    /// A `ConversionFailed` error.
    pub fn conversion_failed(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConversionFailed, op, detail)
    }

    /// A `PermissionDenied` error.
    pub fn permission_denied(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, op, detail)
    }

    /// A `Timeout` error.
    pub fn timeout(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, op, detail)
    }

    /// A `Cancelled` error.
    pub fn cancelled(op: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Cancelled, op, "operation cancelled")
    }

    /// A `RateLimited` error.
    pub fn rate_limited(op: impl Into<Cow<'static, str>>, limiter: impl Into<String>) -> Self {
        let limiter = limiter.into();
        Self::new(ErrorKind::RateLimited, op, format!("rate limited: {limiter}"))
    }

    /// An `AuthRequired` error.
    pub fn auth_required(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRequired, op, detail)
    }

    /// An `Internal` error.
    pub fn internal(op: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, op, detail)
    }
}

impl fmt::Debug for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreError")
            .field("op", &self.op)
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("code", &self.code())
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

/// Convenience result alias used across the workspace.
pub type CoreResult<T> = Result<T, CoreError>;
