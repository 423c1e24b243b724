pub mod domain;
pub mod error;
pub mod ids;
pub mod time;

pub use dispatch_geo::Coordinate;
pub use domain::{
    DispatchCode, NewReport, Notification, Report, ReportKind, ReportStage, ReportState,
    TeamLocation,
};
pub use error::{DispatchError, DispatchResult, ErrorCode};
pub use ids::{NotificationId, ReportName, TeamId, UserId};
pub use time::{TimeWindow, Timestamp};
