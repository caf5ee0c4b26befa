/// Outcome of one task, taken from its accounting `exit_status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn from_exit_status(exit_status: &str) -> TaskStatus {
        if exit_status == "0" {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        }
    }
}
