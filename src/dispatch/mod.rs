pub mod args;
pub mod dispatcher;
pub mod operation;

pub use args::Args;
pub use dispatcher::{validate_and_build_payload, ValidationFailure};
pub use operation::{OperationDefinition, OperationTable, Payload, RequiredField};
