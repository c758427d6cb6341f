//! Domain model (IDs, jobs, envelopes, events, errors).

pub mod envelope;
pub mod errors;
pub mod events;
pub mod hash;
pub mod ids;
pub mod job;

pub use envelope::{
    JOB_FAILED_MESSAGE, JobErrorBody, JobOutcome, JobRequestEnvelope, JobResponse,
    JobResponseEnvelope,
};
pub use errors::{JobBusError, JobFailure};
pub use events::{ConsumerEvent, EventKind};
pub use hash::structural_hash;
pub use ids::{JobId, MessageId, ReceiptHandle};
pub use job::{Job, JsonObject};
