pub mod context;
pub mod error;
pub mod qacct;
pub mod script;
pub mod script_builder;
pub mod task_status;
pub mod tasks;

pub use context::ExecutionContext;
pub use error::{ErrorKind, SgeError};
pub use qacct::{AccountingRecord, Qacct};
pub use script::{Dependency, SgeScript};
pub use script_builder::SgeScriptBuilder;
pub use tasks::TaskSpec;
