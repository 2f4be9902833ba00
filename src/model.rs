use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of a batch. Declaration order is the lifecycle order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BatchStatus {
    Upcoming,
    Running,
    Closed,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 3] = [BatchStatus::Upcoming, BatchStatus::Running, BatchStatus::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Upcoming => "Upcoming",
            BatchStatus::Running => "Running",
            BatchStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown batch status '{0}'")]
pub struct UnknownStatus(pub String);

/// Status scope of a list query. `All` is the unfiltered key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    All,
    Only(BatchStatus),
}

impl StatusFilter {
    pub fn status(&self) -> Option<BatchStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(*status),
        }
    }
}

impl From<Option<BatchStatus>> for StatusFilter {
    fn from(status: Option<BatchStatus>) -> Self {
        status.map_or(StatusFilter::All, StatusFilter::Only)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => status.fmt(f),
        }
    }
}

/// Opaque batch identifier. Upstream data sends either strings or numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for BatchId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for BatchId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Ok(BatchId(s)),
            RawId::Number(n) => Ok(BatchId(n.to_string())),
        }
    }
}

/// A batch as seen by the lifecycle manager. Everything except identity,
/// status and enrolment is carried through untouched in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBatch", into = "RawBatch")]
pub struct Batch {
    pub id: BatchId,
    pub status: BatchStatus,
    pub enrolled_count: u32,
    pub payload: Map<String, Value>,
}

impl Batch {
    pub fn new(id: impl Into<BatchId>, status: BatchStatus, enrolled_count: u32) -> Self {
        Self {
            id: id.into(),
            status,
            enrolled_count,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }
}

/// Wire shape of a batch. `studentsActive` is the legacy name for
/// `enrolledCount`; the latter wins when both are present.
#[derive(Serialize, Deserialize)]
struct RawBatch {
    #[serde(alias = "_id")]
    id: BatchId,
    status: BatchStatus,
    #[serde(rename = "enrolledCount", default, skip_serializing_if = "Option::is_none")]
    enrolled_count: Option<u32>,
    #[serde(rename = "studentsActive", default, skip_serializing)]
    students_active: Option<u32>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl From<RawBatch> for Batch {
    fn from(raw: RawBatch) -> Self {
        Self {
            id: raw.id,
            status: raw.status,
            enrolled_count: raw.enrolled_count.or(raw.students_active).unwrap_or(0),
            payload: raw.payload,
        }
    }
}

impl From<Batch> for RawBatch {
    fn from(batch: Batch) -> Self {
        Self {
            id: batch.id,
            status: batch.status,
            enrolled_count: Some(batch.enrolled_count),
            students_active: None,
            payload: batch.payload,
        }
    }
}

/// Partial update sent to the remote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BatchStatus>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BatchPatch {
    pub fn status(status: BatchStatus) -> Self {
        Self {
            status: Some(status),
            fields: Map::new(),
        }
    }

    /// Split a free-form JSON object into a patch, lifting out `status`.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, UnknownStatus> {
        let status = match fields.remove("status") {
            Some(Value::String(s)) => Some(s.parse()?),
            Some(other) => return Err(UnknownStatus(other.to_string())),
            None => None,
        };
        Ok(Self { status, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enrolled_count_prefers_primary_name() {
        let batch: Batch = serde_json::from_value(json!({
            "id": "b1",
            "status": "Upcoming",
            "enrolledCount": 3,
            "studentsActive": 9
        }))
        .unwrap();
        assert_eq!(batch.enrolled_count, 3);
    }

    #[test]
    fn enrolled_count_falls_back_to_legacy_name() {
        let batch: Batch = serde_json::from_value(json!({
            "id": 7,
            "status": "Running",
            "studentsActive": 12
        }))
        .unwrap();
        assert_eq!(batch.id, BatchId::from(7));
        assert_eq!(batch.enrolled_count, 12);
    }

    #[test]
    fn missing_enrolment_reads_as_zero() {
        let batch: Batch =
            serde_json::from_value(json!({ "_id": "abc", "status": "Closed" })).unwrap();
        assert_eq!(batch.id.as_str(), "abc");
        assert_eq!(batch.enrolled_count, 0);
    }

    #[test]
    fn payload_passes_through() {
        let input = json!({
            "id": "b2",
            "status": "Upcoming",
            "enrolledCount": 0,
            "name": "Evening cohort",
            "course": { "id": 4, "title": "Rust" }
        });
        let batch: Batch = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(batch.payload["name"], "Evening cohort");
        assert_eq!(serde_json::to_value(&batch).unwrap(), input);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let res = serde_json::from_value::<Batch>(json!({ "id": "x", "status": "Paused" }));
        assert!(res.is_err());
        assert!("paused".parse::<BatchStatus>().is_err());
        assert_eq!("running".parse::<BatchStatus>().unwrap(), BatchStatus::Running);
    }

    #[test]
    fn patch_lifts_status_out_of_fields() {
        let fields = json!({ "status": "Running", "name": "n" });
        let patch = BatchPatch::from_fields(fields.as_object().unwrap().clone()).unwrap();
        assert_eq!(patch.status, Some(BatchStatus::Running));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "status": "Running", "name": "n" })
        );
    }
}
