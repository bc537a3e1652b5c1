use chrono::{DateTime, Datelike, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Media type required by the regulations endpoint.
pub(crate) const REGULATIONS_CONTENT_TYPE: &str = "application/vnd.segment.v1alpha+json";

/// Outcome of a deletion-regulation request, as reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDeletionStatus {
    Ok,
    Error,
    /// The vendor-side state of a previously created regulation; stale
    /// until re-queried.
    Unknown,
}

/// Result of [request_data_deletion](crate::client::MetricsClient::request_data_deletion).
///
/// This is the one operation whose failure the caller must branch on, so
/// the outcome is returned rather than logged away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDeletionResult {
    pub status: DataDeletionStatus,
    pub error: Option<String>,
}

impl DataDeletionResult {
    pub(crate) fn ok() -> Self {
        Self {
            status: DataDeletionStatus::Ok,
            error: None,
        }
    }

    pub(crate) fn error(detail: Option<String>) -> Self {
        Self {
            status: DataDeletionStatus::Error,
            error: detail,
        }
    }
}

/// A previously created deletion regulation.
///
/// The id and creation date never change once persisted; only the
/// vendor-side status goes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRegulation {
    pub regulation_id: String,
    /// UTC creation date, `day/month/year`.
    pub requested_date: String,
    pub status: DataDeletionStatus,
}

/// Failure modes of the regulation-creation call.
#[derive(Debug, thiserror::Error)]
pub enum RegulationError {
    /// The installation identifier has not been loaded yet, so there is no
    /// subject to regulate.
    #[error("analytics identity is not initialized")]
    MissingIdentity,

    /// The request never produced a response.
    #[error("regulation request failed: {0:#}")]
    Transport(#[from] anyhow::Error),

    /// The endpoint answered with something other than 200.
    #[error("regulation request rejected with status {0}")]
    UnexpectedStatus(StatusCode),

    /// A 200 response whose body did not carry a regulation id.
    #[error("malformed regulation response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// Wire body for the regulation-creation endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegulationRequest<'a> {
    regulation_type: &'static str,
    subject_type: &'static str,
    subject_ids: [&'a str; 1],
}

impl<'a> RegulationRequest<'a> {
    pub(crate) fn delete_only(subject_id: &'a str) -> Self {
        Self {
            regulation_type: "DELETE_ONLY",
            subject_type: "USER_ID",
            subject_ids: [subject_id],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegulationResponse {
    pub data: RegulationData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegulationData {
    #[serde(rename = "regulateId")]
    pub regulate_id: String,
}

/// Regulation creation date, `day/month/year` in UTC, unpadded.
pub(crate) fn regulation_date(now: DateTime<Utc>) -> String {
    format!("{}/{}/{}", now.day(), now.month(), now.year())
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_wire_format() {
        let body = serde_json::to_value(RegulationRequest::delete_only("0xabc")).unwrap();
        assert_eq!(
            json!({
                "regulationType": "DELETE_ONLY",
                "subjectType": "USER_ID",
                "subjectIds": ["0xabc"],
            }),
            body
        );
    }

    #[test]
    fn response_carries_the_regulation_id() {
        let response: RegulationResponse =
            serde_json::from_value(json!({"data": {"regulateId": "R123"}})).unwrap();
        assert_eq!("R123", response.data.regulate_id);
    }

    #[test]
    fn response_without_id_is_rejected() {
        assert!(serde_json::from_value::<RegulationResponse>(json!({"data": {}})).is_err());
    }

    #[test]
    fn date_is_unpadded_day_month_year() {
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!("1/1/1970", regulation_date(epoch));

        let end_of_year = DateTime::from_timestamp(1_703_980_800, 0).unwrap();
        assert_eq!("31/12/2023", regulation_date(end_of_year));
    }
}
