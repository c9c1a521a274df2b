pub mod format;
pub mod mutate;
pub mod store;
pub mod sync;
pub mod validate;

pub use format::{load_document, save_document, LoadError};
pub use store::{ChangeSet, DocChange, DocError, DocStore, Origin};
pub use sync::{SyncError, Update};
pub use validate::{
    validate_document, validate_invariants, validate_schema, InvariantViolation, SchemaError,
};
