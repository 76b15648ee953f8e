//! Run configuration supplied alongside a job.
//!
//! - [`path_mapping`] - `pathmapping-1.0` rule documents
//! - [`task_params`] - task parameter override arguments

mod document;
pub mod path_mapping;
pub mod task_params;

pub use path_mapping::{parse_path_mapping_rules, PathFormat, PathMappingRule};
pub use task_params::parse_task_parameter_args;
