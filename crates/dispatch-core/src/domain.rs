use crate::error::{DispatchError, DispatchResult};
use crate::ids::{NotificationId, ReportName, TeamId, UserId};
use crate::time::Timestamp;
use dispatch_geo::Coordinate;
use dispatch_reconciler::Keyed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Complaint,
    Emergency,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complaint => "complaint",
            Self::Emergency => "emergency",
        }
    }

    /// Backend collection segment, e.g. `complaints/confirm/{name}`.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Complaint => "complaints",
            Self::Emergency => "emergencies",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "complaint" | "complaints" => Ok(Self::Complaint),
            "emergency" | "emergencies" => Ok(Self::Emergency),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DispatchCode {
    #[serde(rename = "Code Red")]
    Red,
    #[serde(rename = "Code Yellow")]
    Yellow,
    #[serde(rename = "Code Blue")]
    Blue,
}

impl DispatchCode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Red => "Code Red",
            Self::Yellow => "Code Yellow",
            Self::Blue => "Code Blue",
        }
    }
}

impl fmt::Display for DispatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DispatchCode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let color = normalized
            .strip_prefix("code")
            .map(str::trim)
            .unwrap_or(normalized.as_str());
        match color {
            "red" => Ok(Self::Red),
            "yellow" => Ok(Self::Yellow),
            "blue" => Ok(Self::Blue),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    Pending,
    Confirmed,
    Resolved,
}

impl fmt::Display for ReportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Resolved => "resolved",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ReportState {
    Pending,
    Confirmed {
        code: Option<DispatchCode>,
        confirmed_at: Option<Timestamp>,
    },
    Resolved {
        code: Option<DispatchCode>,
        confirmed_at: Option<Timestamp>,
        resolved_at: Timestamp,
        resolved_by: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub name: ReportName,
    pub kind: ReportKind,
    pub category: String,
    pub address: String,
    pub description: String,
    pub location: Option<Coordinate>,
    pub media_url: Option<String>,
    pub state: ReportState,
}

impl Report {
    pub fn stage(&self) -> ReportStage {
        match self.state {
            ReportState::Pending => ReportStage::Pending,
            ReportState::Confirmed { .. } => ReportStage::Confirmed,
            ReportState::Resolved { .. } => ReportStage::Resolved,
        }
    }

    pub fn dispatch_code(&self) -> Option<DispatchCode> {
        match &self.state {
            ReportState::Pending => None,
            ReportState::Confirmed { code, .. } | ReportState::Resolved { code, .. } => *code,
        }
    }

    /// Reports without a code are treated as the lowest priority.
    pub fn effective_code(&self) -> DispatchCode {
        self.dispatch_code().unwrap_or(DispatchCode::Blue)
    }

    pub fn confirmed_at(&self) -> Option<Timestamp> {
        match &self.state {
            ReportState::Pending => None,
            ReportState::Confirmed { confirmed_at, .. }
            | ReportState::Resolved { confirmed_at, .. } => *confirmed_at,
        }
    }

    pub fn resolved_at(&self) -> Option<Timestamp> {
        match &self.state {
            ReportState::Resolved { resolved_at, .. } => Some(*resolved_at),
            _ => None,
        }
    }

    pub fn resolved_by(&self) -> Option<&str> {
        match &self.state {
            ReportState::Resolved { resolved_by, .. } => Some(resolved_by.as_str()),
            _ => None,
        }
    }

    pub fn confirm(&mut self, code: DispatchCode, at: Timestamp) -> DispatchResult<()> {
        match self.state {
            ReportState::Pending => {
                self.state = ReportState::Confirmed {
                    code: Some(code),
                    confirmed_at: Some(at),
                };
                Ok(())
            }
            _ => Err(DispatchError::invalid_transition(format!(
                "{} '{}' is {} and cannot be confirmed",
                self.kind,
                self.name,
                self.stage()
            ))),
        }
    }

    pub fn resolve(&mut self, resolver: &str, at: Timestamp) -> DispatchResult<()> {
        let resolver = resolver.trim();
        if resolver.is_empty() {
            return Err(DispatchError::invalid_input("resolver name is required"));
        }
        let (code, confirmed_at) = match &self.state {
            ReportState::Confirmed { code, confirmed_at } => (*code, *confirmed_at),
            _ => {
                return Err(DispatchError::invalid_transition(format!(
                    "{} '{}' is {} and cannot be resolved",
                    self.kind,
                    self.name,
                    self.stage()
                )));
            }
        };
        self.state = ReportState::Resolved {
            code,
            confirmed_at,
            resolved_at: at,
            resolved_by: resolver.to_string(),
        };
        Ok(())
    }

    pub fn ensure_deletable(&self) -> DispatchResult<()> {
        match self.state {
            ReportState::Pending | ReportState::Confirmed { .. } => Ok(()),
            ReportState::Resolved { .. } => Err(DispatchError::invalid_transition(format!(
                "{} '{}' is resolved and cannot be deleted",
                self.kind, self.name
            ))),
        }
    }
}

impl Keyed for Report {
    type Key = ReportName;

    fn key(&self) -> Self::Key {
        self.name.clone()
    }
}

/// Payload of the complainant submission form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub kind: ReportKind,
    pub name: ReportName,
    pub address: String,
    pub category: String,
    pub description: String,
    pub location: Coordinate,
    pub media_url: String,
    pub submitter: UserId,
}

impl NewReport {
    pub fn validate(&self) -> DispatchResult<()> {
        if self.name.is_blank() {
            return Err(DispatchError::invalid_input("name is required"));
        }
        if self.address.trim().is_empty() {
            return Err(DispatchError::invalid_input("address is required"));
        }
        if self.category.trim().is_empty() {
            return Err(DispatchError::invalid_input(format!(
                "{} type is required",
                self.kind
            )));
        }
        if !self.location.is_valid() {
            return Err(DispatchError::invalid_input("location is out of range"));
        }
        if self.media_url.trim().is_empty() {
            return Err(DispatchError::invalid_input(
                "an uploaded image or video is required",
            ));
        }
        if self.submitter.is_blank() {
            return Err(DispatchError::invalid_input("submitter id is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamLocation {
    pub team_id: TeamId,
    pub coordinate: Coordinate,
    pub recorded_at: Option<Timestamp>,
}

impl Keyed for TeamLocation {
    type Key = TeamId;

    fn key(&self) -> Self::Key {
        self.team_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub created_at: Option<Timestamp>,
}

impl Keyed for Notification {
    type Key = NotificationId;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}
