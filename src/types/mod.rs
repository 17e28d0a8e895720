// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent digest and id confusion at compile time.

mod id;
mod image_id;
mod operation;

pub use id::{DigestMarker, Id, JobId, LayerDigest, ManifestDigest};
pub use image_id::{ImageId, ParseImageIdError};
pub use operation::{OperationId, OperationNameError, OperationType};
