use async_trait::async_trait;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Identity used to diff one fetch against the previous snapshot.
pub trait Keyed {
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Full replacement of the collection.
    Fresh(Vec<T>),
    /// Upstream reported no change since the last fetch.
    NotModified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Status,
    Malformed,
    Other,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Transport => "transport",
            Self::Status => "status",
            Self::Malformed => "malformed",
            Self::Other => "other",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, message)
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Status, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Malformed, message)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[async_trait]
pub trait CollectionSource: Send + Sync + 'static {
    type Item: Keyed + Clone + Send + Sync + 'static;

    async fn fetch(&self) -> Result<FetchOutcome<Self::Item>, FetchError>;
}

#[async_trait]
impl<S: CollectionSource + ?Sized> CollectionSource for Arc<S> {
    type Item = S::Item;

    async fn fetch(&self) -> Result<FetchOutcome<Self::Item>, FetchError> {
        (**self).fetch().await
    }
}
