use crate::error::SgeError;

/// The task range of an array job, as handed to `#$ -t`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskSpec {
    /// Passed through untouched, e.g. `"7-9"`.
    Range(String),
    /// `N` tasks, rendered as `1-N`.
    Count(u32),
    /// Rendered as `start-end`.
    Bounds(u32, u32),
    /// Only valid with exactly two entries, treated as [`TaskSpec::Bounds`].
    List(Vec<u32>),
}

impl TaskSpec {
    pub fn render(&self) -> Result<String, SgeError> {
        match self {
            TaskSpec::Range(range) => {
                if range.trim().is_empty() {
                    return Err(SgeError::InvalidTaskRange(String::from("empty range")));
                }
                if range.contains(['\n', '\r']) {
                    return Err(SgeError::InvalidTaskRange(format!("{:?}", range)));
                }
                Ok(range.clone())
            }
            TaskSpec::Count(0) => Err(SgeError::InvalidTaskRange(String::from("0 tasks"))),
            TaskSpec::Count(count) => Ok(format!("1-{}", count)),
            TaskSpec::Bounds(start, end) => {
                if *start == 0 || start > end {
                    return Err(SgeError::InvalidTaskRange(format!("{}-{}", start, end)));
                }
                Ok(format!("{}-{}", start, end))
            }
            TaskSpec::List(list) => match list.as_slice() {
                [start, end] => TaskSpec::Bounds(*start, *end).render(),
                _ => Err(SgeError::InvalidTaskRange(format!("{:?}", list))),
            },
        }
    }
}

impl From<&str> for TaskSpec {
    fn from(range: &str) -> Self {
        TaskSpec::Range(range.to_string())
    }
}

impl From<String> for TaskSpec {
    fn from(range: String) -> Self {
        TaskSpec::Range(range)
    }
}

impl From<u32> for TaskSpec {
    fn from(count: u32) -> Self {
        TaskSpec::Count(count)
    }
}

impl From<(u32, u32)> for TaskSpec {
    fn from((start, end): (u32, u32)) -> Self {
        TaskSpec::Bounds(start, end)
    }
}

impl From<[u32; 2]> for TaskSpec {
    fn from([start, end]: [u32; 2]) -> Self {
        TaskSpec::Bounds(start, end)
    }
}

impl From<Vec<u32>> for TaskSpec {
    fn from(list: Vec<u32>) -> Self {
        TaskSpec::List(list)
    }
}

impl From<&[u32]> for TaskSpec {
    fn from(list: &[u32]) -> Self {
        TaskSpec::List(list.to_vec())
    }
}
