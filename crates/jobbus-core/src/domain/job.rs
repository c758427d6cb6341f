//! Job: a unit of work with a stable identity and a data payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::JobBusError;
use super::hash::structural_hash;
use super::ids::JobId;

/// JSON object payload (`data` of a job, `success` of a response).
pub type JsonObject = serde_json::Map<String, Value>;

/// A job as it travels in a request envelope.
///
/// Immutable once built; the fields are only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    data: JsonObject,
}

impl Job {
    /// Build a job whose id is the structural hash of `data`.
    pub fn new(data: JsonObject) -> Self {
        let id = JobId::new_unchecked(structural_hash(&Value::Object(data.clone())));
        Self { id, data }
    }

    /// Build a job with a caller-supplied id.
    pub fn with_id(id: impl Into<String>, data: JsonObject) -> Result<Self, JobBusError> {
        Ok(Self {
            id: JobId::parse(id)?,
            data,
        })
    }

    /// Build a job from arbitrary JSON, rejecting anything that is not an object.
    ///
    /// `id = None` derives the id from the data.
    pub fn from_value(data: Value, id: Option<&str>) -> Result<Self, JobBusError> {
        let Value::Object(data) = data else {
            return Err(JobBusError::InvalidArgument(
                "Invalid job data (not an object)".to_string(),
            ));
        };
        match id {
            Some(id) => Self::with_id(id, data),
            None => Ok(Self::new(data)),
        }
    }

    pub(crate) fn from_parts(id: JobId, data: JsonObject) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn data(&self) -> &JsonObject {
        &self.data
    }

    pub fn into_data(self) -> JsonObject {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn derived_ids_match_for_equal_data() {
        let a = Job::from_value(json!({"a": 123, "b": 567}), None).unwrap();
        let b = Job::from_value(json!({"b": 567, "a": 123}), None).unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn supplied_id_is_kept() {
        let job = Job::from_value(json!({"a": 123}), Some("abc")).unwrap();
        assert_eq!(job.id().as_str(), "abc");
        assert_eq!(job.data()["a"], json!(123));
    }

    #[rstest]
    #[case::number(json!(123))]
    #[case::null(json!(null))]
    #[case::string(json!("abc"))]
    #[case::array(json!([1, 2, 3]))]
    fn non_object_data_is_rejected(#[case] data: Value) {
        let err = Job::from_value(data, None).unwrap_err();
        assert!(matches!(err, JobBusError::InvalidArgument(_)));
    }

    #[test]
    fn empty_supplied_id_is_rejected() {
        let err = Job::from_value(json!({"a": 1}), Some("")).unwrap_err();
        assert!(matches!(err, JobBusError::InvalidArgument(_)));
    }
}
