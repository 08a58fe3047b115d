pub mod offer;
pub mod raw;
pub mod request;

pub use offer::{CustomStatus, Offer, RefillableStatus};
pub use raw::{RawCandidate, RawValue};
pub use request::{Attachment, AttachmentData, AttachmentSource, IngestRequest};
