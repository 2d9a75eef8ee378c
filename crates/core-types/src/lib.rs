//! Shared primitives for the formflow engine
//!
//! This crate holds the data model every other layer speaks:
//! - Flow definitions and their steps (immutable once loaded)
//! - The case payload used to fill a flow
//! - Step and run results, including the failure reason taxonomy
//! - Progress events pushed to a supervising context
//! - The form profile describing the hosted form's markup conventions

pub mod errors;
pub mod file;
pub mod flow;
pub mod payload;
pub mod profile;
pub mod progress;
pub mod reason;
pub mod result;

pub use errors::FlowDefinitionError;
pub use file::RemoteFile;
pub use flow::{
    ConditionRule, ConditionalSpec, CustomPredicate, DependentDropdown, FlowDefinition,
    InputKind, LocatorSpec, PayloadPredicate, RecordField, RecordFieldKind, RetrySpec, Step,
    StepKind, StepOptions,
};
pub use payload::{is_truthy, value_as_text, Payload};
pub use profile::FormProfile;
pub use progress::{ProgressEvent, ProgressStage, FILLING_STATUS};
pub use reason::ReasonCode;
pub use result::{RunResult, RunStatus, StepResult};
