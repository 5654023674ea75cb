pub mod job_record;

pub use job_record::{ApplicationStatus, StructuredRecord};
