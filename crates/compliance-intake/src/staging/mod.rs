//! Pre-upload holding area: each candidate file is classified and validated
//! when it is added, and stays editable until it is uploaded or removed.

pub mod file;
pub mod registry;
pub mod validator;

pub use file::{CandidateFile, ManualOverride, StagedFile, StagedFilePatch};
pub use registry::StagingRegistry;
pub use validator::{CategoryRulesValidator, Validator};
