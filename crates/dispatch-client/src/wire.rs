//! Backend JSON records and their conversion into domain types.
//!
//! The backend is loosely typed: coordinates arrive as numbers or strings,
//! timestamps as RFC 3339 strings, epoch milliseconds or Firestore
//! `{_seconds, _nanoseconds}` objects, and team ids as strings or numbers.

use chrono::{DateTime, TimeZone, Utc};
use dispatch_core::{
    Coordinate, DispatchCode, NewReport, Notification, NotificationId, Report, ReportKind,
    ReportName, ReportStage, ReportState, TeamId, TeamLocation, Timestamp,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRecord {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Address", default)]
    pub address: Option<String>,
    #[serde(rename = "ComplaintType", default)]
    pub complaint_type: Option<String>,
    #[serde(rename = "EmergencyType", default)]
    pub emergency_type: Option<String>,
    #[serde(rename = "Type", default)]
    pub generic_type: Option<String>,
    #[serde(rename = "ComplaintText", default)]
    pub complaint_text: Option<String>,
    #[serde(rename = "EmergencyText", default)]
    pub emergency_text: Option<String>,
    #[serde(rename = "Text", default)]
    pub generic_text: Option<String>,
    #[serde(rename = "Latitude", default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(rename = "MediaUrl", default)]
    pub media_url: Option<String>,
    #[serde(rename = "EmergencyCode", alias = "EmergencyCodee", default)]
    pub emergency_code: Option<String>,
    #[serde(rename = "ConfirmedAt", default, deserialize_with = "lenient_timestamp")]
    pub confirmed_at: Option<Timestamp>,
    #[serde(rename = "ResolvedAt", default, deserialize_with = "lenient_timestamp")]
    pub resolved_at: Option<Timestamp>,
    #[serde(rename = "ResolvedBy", default)]
    pub resolved_by: Option<String>,
}

impl ReportRecord {
    /// Kind implied by the type/text field names, if any.
    pub fn inferred_kind(&self) -> Option<ReportKind> {
        if self.emergency_type.is_some() || self.emergency_text.is_some() {
            Some(ReportKind::Emergency)
        } else if self.complaint_type.is_some() || self.complaint_text.is_some() {
            Some(ReportKind::Complaint)
        } else {
            None
        }
    }

    pub fn into_report(self, kind: ReportKind, stage: ReportStage) -> Result<Report, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("report record without a Name".to_string());
        }
        let code = self
            .emergency_code
            .as_deref()
            .and_then(|value| value.parse::<DispatchCode>().ok());
        let state = match stage {
            ReportStage::Pending => ReportState::Pending,
            ReportStage::Confirmed => ReportState::Confirmed {
                code,
                confirmed_at: self.confirmed_at,
            },
            ReportStage::Resolved => {
                let resolved_at = self
                    .resolved_at
                    .ok_or_else(|| format!("resolved report '{name}' has no ResolvedAt"))?;
                let resolved_by = non_blank(self.resolved_by)
                    .ok_or_else(|| format!("resolved report '{name}' has no ResolvedBy"))?;
                ReportState::Resolved {
                    code,
                    confirmed_at: self.confirmed_at,
                    resolved_at,
                    resolved_by,
                }
            }
        };
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                Some(Coordinate::new(latitude, longitude)).filter(Coordinate::is_valid)
            }
            _ => None,
        };
        // prefer the field matching the kind, then the generic one
        let (category, description) = match kind {
            ReportKind::Complaint => (
                first_text([self.complaint_type, self.generic_type, self.emergency_type]),
                first_text([self.complaint_text, self.generic_text, self.emergency_text]),
            ),
            ReportKind::Emergency => (
                first_text([self.emergency_type, self.generic_type, self.complaint_type]),
                first_text([self.emergency_text, self.generic_text, self.complaint_text]),
            ),
        };
        Ok(Report {
            name: ReportName::new(name),
            kind,
            category,
            address: self.address.unwrap_or_default(),
            description,
            location,
            media_url: non_blank(self.media_url),
            state,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmedEnvelope {
    #[serde(default)]
    pub complaints: Vec<ReportRecord>,
    #[serde(default)]
    pub emergencies: Vec<ReportRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolvedEnvelope {
    #[serde(rename = "resolvedReports", default)]
    pub resolved_reports: Vec<ReportRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamLocationRecord {
    #[serde(rename = "teamId", default, deserialize_with = "lenient_string")]
    pub team_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<Timestamp>,
}

impl TeamLocationRecord {
    pub fn into_location(self) -> Option<TeamLocation> {
        let team_id = self.team_id?;
        let coordinate = Coordinate::new(self.latitude?, self.longitude?);
        if !coordinate.is_valid() {
            return None;
        }
        Some(TeamLocation {
            team_id: TeamId::new(team_id),
            coordinate,
            recorded_at: self.timestamp,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub locations: Vec<TeamLocationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(
        rename = "createdAt",
        alias = "timestamp",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<Timestamp>,
}

impl NotificationRecord {
    pub fn into_notification(self) -> Option<Notification> {
        Some(Notification {
            id: NotificationId::new(self.id?),
            message: self.message,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsEnvelope {
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
}

/// Acknowledgement body returned by mutations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct SubmitBody<'a> {
    pub name: &'a str,
    pub address: &'a str,
    #[serde(rename = "complaintType", skip_serializing_if = "Option::is_none")]
    pub complaint_type: Option<&'a str>,
    #[serde(rename = "emergencyType", skip_serializing_if = "Option::is_none")]
    pub emergency_type: Option<&'a str>,
    #[serde(rename = "complaintText", skip_serializing_if = "Option::is_none")]
    pub complaint_text: Option<&'a str>,
    #[serde(rename = "emergencyText", skip_serializing_if = "Option::is_none")]
    pub emergency_text: Option<&'a str>,
    pub location: LatLng,
    #[serde(rename = "mediaUrl")]
    pub media_url: &'a str,
    #[serde(rename = "userId")]
    pub user_id: &'a str,
}

impl<'a> SubmitBody<'a> {
    pub fn new(report: &'a NewReport) -> Self {
        let (complaint, emergency) = match report.kind {
            ReportKind::Complaint => (true, false),
            ReportKind::Emergency => (false, true),
        };
        let category = report.category.as_str();
        let text = report.description.as_str();
        Self {
            name: report.name.as_str(),
            address: report.address.as_str(),
            complaint_type: complaint.then_some(category),
            emergency_type: emergency.then_some(category),
            complaint_text: complaint.then_some(text),
            emergency_text: emergency.then_some(text),
            location: LatLng {
                lat: report.location.latitude,
                lng: report.location.longitude,
            },
            media_url: report.media_url.as_str(),
            user_id: report.submitter.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmBody<'a> {
    #[serde(rename = "emergencyCode")]
    pub emergency_code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ResolveBody<'a> {
    pub name: &'a str,
    #[serde(rename = "resolverName")]
    pub resolver_name: &'a str,
    #[serde(rename = "resolvedAt")]
    pub resolved_at: String,
}

#[derive(Debug, Serialize)]
pub struct LocationBody<'a> {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "teamId")]
    pub team_id: &'a str,
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn value_as_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    text.parse::<i64>()
                        .ok()
                        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                })
        }
        Value::Object(map) => {
            let seconds = map.get("_seconds").or_else(|| map.get("seconds"))?.as_i64()?;
            let nanos = match map.get("_nanoseconds").or_else(|| map.get("nanoseconds")) {
                Some(nanos) => u32::try_from(nanos.as_u64()?).ok()?,
                None => 0,
            };
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}

pub(crate) fn lenient_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Timestamp>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_timestamp))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        _ => return Ok(None),
    };
    Ok(non_blank(Some(text)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn first_text<const N: usize>(candidates: [Option<String>; N]) -> String {
    candidates
        .into_iter()
        .find_map(non_blank)
        .unwrap_or_default()
}
