//! HTTP clients for the dispatch backend, LocationIQ and media storage.

pub mod api;
pub mod geocode;
pub mod media;
pub mod sources;
pub mod wire;

pub use api::{ApiClient, ApiError, Page};
pub use geocode::{AddressCandidate, GeocodeError, LocationIqClient, MIN_QUERY_CHARS};
pub use media::{
    MediaFile, MediaStore, UploadError, UploadProgress, media_content_type, object_name,
};
pub use sources::{
    ConfirmedReportsSource, NotificationsSource, PendingReportsSource, ResolvedReportsSource,
    TeamLocationsSource,
};
