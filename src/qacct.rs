//! Parse `qacct -j` output and find the tasks of an array job that failed.

use crate::context::ExecutionContext;
use crate::error::SgeError;
use crate::task_status::TaskStatus;
use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::process::Command;

/// Width of the `=` line qacct prints in front of every task.
pub const TASK_SEPARATOR_WIDTH: usize = 62;

/// `qsub_time`, `start_time` and `end_time` formats, classic and newer qacct.
const QACCT_TIME_FORMATS: [&str; 2] = ["%a %b %e %H:%M:%S %Y", "%m/%d/%Y %H:%M:%S%.f"];

/// The accounting fields of one task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountingRecord {
    task_id: u32,
    fields: BTreeMap<String, String>,
}

impl AccountingRecord {
    fn from_lines(lines: &[String]) -> Result<AccountingRecord, SgeError> {
        let task_id = lines
            .iter()
            .filter_map(|line| split_field(line))
            .find(|(key, _)| *key == "taskid")
            .map(|(_, value)| value)
            .ok_or_else(|| SgeError::Parse(String::from("task block without taskid")))?;
        let task_id = match task_id.parse::<u32>() {
            Ok(task_id) if task_id > 0 => task_id,
            _ => {
                return Err(SgeError::Parse(format!(
                    "taskid must be a positive integer, got '{}'",
                    task_id
                )));
            }
        };

        let mut fields = BTreeMap::new();
        for (key, value) in lines.iter().filter_map(|line| split_field(line)) {
            fields.insert(key.to_string(), value.to_string());
        }
        if !fields.contains_key("exit_status") {
            return Err(SgeError::Parse(format!(
                "task {} has no exit_status",
                task_id
            )));
        }
        Ok(AccountingRecord { task_id, fields })
    }

    pub fn task_id(&self) -> u32 {
        self.task_id
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn exit_status(&self) -> &str {
        self.get("exit_status").unwrap_or_default()
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_exit_status(self.exit_status())
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.get("start_time").and_then(parse_qacct_time)
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.get("end_time").and_then(parse_qacct_time)
    }

    pub fn elapsed(&self) -> Option<TimeDelta> {
        Some(self.end_time()? - self.start_time()?)
    }
}

/// Split a normalised line into its key and the (possibly empty) rest.
fn split_field(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(line.split_once(' ').unwrap_or((line, "")))
}

fn parse_qacct_time(s: &str) -> Option<NaiveDateTime> {
    QACCT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

/// Split the report into task blocks of whitespace-normalised lines.
fn split_tasks(report: &str) -> Vec<Vec<String>> {
    let separator = "=".repeat(TASK_SEPARATOR_WIDTH) + "\n";
    report
        .replace("\r\n", "\n")
        .split(separator.as_str())
        .skip(1)
        .map(|task| {
            let mut lines: Vec<String> = task
                .split('\n')
                .map(|line| line.split_whitespace().collect::<Vec<&str>>().join(" "))
                .collect();
            if lines.last().is_some_and(|line| line.is_empty()) {
                lines.pop();
            }
            lines
        })
        .collect()
}

/// Parsed accounting report of one job, one record per task in report order.
#[derive(Clone, Debug)]
pub struct Qacct {
    job_name: Option<String>,
    records: Vec<AccountingRecord>,
}

impl Display for Qacct {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.job_name {
            Some(job_name) => write!(f, "qacct: {}", job_name),
            None => write!(f, "qacct: {} tasks", self.records.len()),
        }
    }
}

impl Qacct {
    pub fn parse(report: &str) -> Result<Qacct, SgeError> {
        let mut records: Vec<AccountingRecord> = Vec::new();
        for lines in split_tasks(report) {
            let record = AccountingRecord::from_lines(&lines)?;
            // a rerun under the same job name reports the task again, the later run wins
            match records.iter_mut().find(|r| r.task_id == record.task_id) {
                Some(existing) => {
                    debug!("task {} reported again, keeping the later run", record.task_id);
                    *existing = record;
                }
                None => records.push(record),
            }
        }
        if records.is_empty() {
            warn!("accounting report contains no tasks");
        }
        debug!("parsed {} accounting records", records.len());
        Ok(Qacct {
            job_name: None,
            records,
        })
    }

    /// Run `qacct -j job_name` and parse what it prints.
    pub fn query(job_name: &str, ctx: &ExecutionContext) -> Result<Qacct, SgeError> {
        let output = Command::new(&ctx.qacct_program)
            .args(["-j", job_name])
            .output()
            .map_err(|source| SgeError::Command {
                command: ctx.qacct_program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(SgeError::CommandFailed {
                command: ctx.qacct_program.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let mut qacct = Qacct::parse(&String::from_utf8_lossy(&output.stdout))?;
        qacct.job_name = Some(job_name.to_string());
        Ok(qacct)
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job_name.as_deref()
    }

    pub fn records(&self) -> &[AccountingRecord] {
        &self.records
    }

    pub fn record(&self, task_id: u32) -> Option<&AccountingRecord> {
        self.records.iter().find(|record| record.task_id == task_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Task ids whose exit status is anything but `0`, ascending.
    pub fn failed_tasks(&self) -> Vec<u32> {
        let mut failed: Vec<u32> = self
            .records
            .iter()
            .filter(|record| record.status() == TaskStatus::Failed)
            .map(AccountingRecord::task_id)
            .collect();
        failed.sort();
        failed
    }

    /// The lines of `commands_path` that the failed tasks ran, task `n` being line `n`.
    pub fn failed_commands(
        &self,
        commands_path: impl AsRef<Path>,
    ) -> Result<Vec<String>, SgeError> {
        let commands_path = commands_path.as_ref();
        let content =
            fs::read_to_string(commands_path).map_err(|e| SgeError::io(commands_path, e))?;
        let commands: Vec<&str> = content.lines().collect();
        self.failed_tasks()
            .into_iter()
            .map(|task| {
                commands
                    .get(task as usize - 1)
                    .map(|command| command.to_string())
                    .ok_or(SgeError::TaskOutOfRange {
                        task,
                        count: commands.len(),
                    })
            })
            .collect()
    }

    pub fn write_failed_commands(
        &self,
        commands_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<(), SgeError> {
        let output_path = output_path.as_ref();
        let failed = self.failed_commands(commands_path)?;
        let mut content = String::new();
        for command in &failed {
            content += command.as_str();
            content += "\n";
        }
        fs::write(output_path, content).map_err(|e| SgeError::io(output_path, e))?;
        info!(
            "wrote {} failed commands to {}",
            failed.len(),
            output_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn task_block(task_id: &str, exit_status: &str) -> String {
        let mut ret = "=".repeat(TASK_SEPARATOR_WIDTH);
        ret += "\n";
        ret += "qname        staging\n";
        ret += "hostname     node1b12.ecdf.ed.ac.uk\n";
        ret += "jobname      analysis\n";
        ret += "jobnumber    4321\n";
        ret += format!("taskid       {}\n", task_id).as_str();
        ret += "qsub_time    Mon Jan 15 09:59:00 2024\n";
        ret += "start_time   Mon Jan 15 10:00:00 2024\n";
        ret += "end_time     Mon Jan 15 11:30:15 2024\n";
        ret += "failed       0    \n";
        ret += format!("exit_status  {}\n", exit_status).as_str();
        ret += "ru_wallclock 5415s\n";
        ret += " \n";
        ret
    }

    fn report() -> String {
        task_block("1", "0") + &task_block("2", "1") + &task_block("3", "0")
    }

    fn commands_file(dir: &tempfile::TempDir, commands: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join("commands.txt");
        fs::write(&path, commands.join("\n") + "\n").unwrap();
        path
    }

    #[test]
    fn parse_three_tasks() {
        let qacct = Qacct::parse(&report()).unwrap();
        assert_eq!(qacct.len(), 3);
        let ids: Vec<u32> = qacct.records().iter().map(|r| r.task_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn whitespace_is_normalised() {
        let qacct = Qacct::parse(&report()).unwrap();
        let record = qacct.record(2).unwrap();
        assert_eq!(record.get("hostname"), Some("node1b12.ecdf.ed.ac.uk"));
        assert_eq!(record.get("start_time"), Some("Mon Jan 15 10:00:00 2024"));
        assert_eq!(record.get("failed"), Some("0"));
        assert_eq!(record.exit_status(), "1");
        assert_eq!(record.status(), TaskStatus::Failed);
        assert!(!record.fields().contains_key(""));
    }

    #[test]
    fn failed_tasks_sorted_and_repeatable() {
        let report = task_block("5", "137") + &task_block("1", "0") + &task_block("3", "1");
        let qacct = Qacct::parse(&report).unwrap();
        assert_eq!(qacct.failed_tasks(), vec![3, 5]);
        assert_eq!(qacct.failed_tasks(), qacct.failed_tasks());
    }

    #[test]
    fn failed_commands_uses_task_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = commands_file(&dir, &["echo one", "echo two", "echo three"]);
        let qacct = Qacct::parse(&report()).unwrap();
        assert_eq!(qacct.failed_tasks(), vec![2]);
        assert_eq!(qacct.failed_commands(&path).unwrap(), vec!["echo two"]);
    }

    #[test]
    fn failed_task_beyond_commands_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = commands_file(&dir, &["echo one"]);
        let qacct = Qacct::parse(&report()).unwrap();
        let err = qacct.failed_commands(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert!(matches!(err, SgeError::TaskOutOfRange { task: 2, count: 1 }));
    }

    #[test]
    fn write_failed_commands_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = commands_file(&dir, &["echo one", "echo two", "echo three"]);
        let output = dir.path().join("failed.txt");
        let report = task_block("1", "2") + &task_block("2", "0") + &task_block("3", "1");
        let qacct = Qacct::parse(&report).unwrap();
        qacct.write_failed_commands(&path, &output).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "echo one\necho three\n"
        );
    }

    #[test]
    fn write_failed_commands_out_of_range_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = commands_file(&dir, &["echo one"]);
        let output = dir.path().join("failed.txt");
        let qacct = Qacct::parse(&report()).unwrap();
        assert!(qacct.write_failed_commands(&path, &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn missing_taskid_is_parse_error() {
        let report = task_block("1", "0").replace("taskid       1\n", "");
        let err = Qacct::parse(&report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn undefined_taskid_is_parse_error() {
        let err = Qacct::parse(&task_block("undefined", "0")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(Qacct::parse(&task_block("0", "0")).is_err());
    }

    #[test]
    fn missing_exit_status_is_parse_error() {
        let report = task_block("1", "0").replace("exit_status  0\n", "");
        let err = Qacct::parse(&report).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn rerun_task_replaces_earlier_record() {
        let report = task_block("1", "0") + &task_block("2", "1") + &task_block("2", "0");
        let qacct = Qacct::parse(&report).unwrap();
        assert_eq!(qacct.len(), 2);
        assert!(qacct.failed_tasks().is_empty());
        let ids: Vec<u32> = qacct.records().iter().map(|r| r.task_id()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(qacct.record(2).unwrap().exit_status(), "0");
    }

    #[test]
    fn rerun_keeps_first_position() {
        let report = task_block("2", "0") + &task_block("1", "0") + &task_block("2", "137");
        let qacct = Qacct::parse(&report).unwrap();
        let ids: Vec<u32> = qacct.records().iter().map(|r| r.task_id()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(qacct.failed_tasks(), vec![2]);
    }

    #[test]
    fn crlf_report_is_parsed() {
        let report = report().replace('\n', "\r\n");
        let qacct = Qacct::parse(&report).unwrap();
        assert_eq!(qacct.len(), 3);
        assert_eq!(qacct.failed_tasks(), vec![2]);
        assert_eq!(qacct.record(1).unwrap().get("jobname"), Some("analysis"));
    }

    #[test]
    fn empty_report_has_no_tasks() {
        let qacct = Qacct::parse("").unwrap();
        assert!(qacct.is_empty());
        assert!(qacct.failed_tasks().is_empty());
    }

    #[test]
    fn times_are_parsed() {
        let qacct = Qacct::parse(&report()).unwrap();
        let record = qacct.record(1).unwrap();
        let start = record.start_time().unwrap();
        assert_eq!(start.format("%Y-%m-%dT%H:%M:%S").to_string(), "2024-01-15T10:00:00");
        assert_eq!(record.elapsed(), Some(TimeDelta::seconds(5415)));
    }

    #[test]
    fn newer_time_format_is_parsed() {
        let report = task_block("1", "0").replace(
            "start_time   Mon Jan 15 10:00:00 2024",
            "start_time   01/15/2024 10:00:00.250",
        );
        let record = Qacct::parse(&report).unwrap().record(1).unwrap().clone();
        assert_eq!(
            record.start_time().unwrap().format("%H:%M:%S%.3f").to_string(),
            "10:00:00.250"
        );
    }

    #[test]
    fn unfinished_task_has_no_end_time() {
        let report = task_block("1", "0").replace("Mon Jan 15 11:30:15 2024", "-/-");
        let qacct = Qacct::parse(&report).unwrap();
        assert!(qacct.record(1).unwrap().end_time().is_none());
        assert!(qacct.record(1).unwrap().elapsed().is_none());
    }

    #[test]
    fn query_records_job_name() {
        // `echo -j analysis` succeeds and prints no task blocks
        let ctx = ExecutionContext::local().with_qacct_program("echo".to_string());
        let qacct = Qacct::query("analysis", &ctx).unwrap();
        assert!(qacct.is_empty());
        assert_eq!(qacct.job_name(), Some("analysis"));
        assert_eq!(qacct.to_string(), "qacct: analysis");
    }

    #[test]
    fn query_failing_program() {
        let ctx = ExecutionContext::local().with_qacct_program("false".to_string());
        let err = Qacct::query("analysis", &ctx).unwrap_err();
        assert!(matches!(err, SgeError::CommandFailed { .. }));
    }

    #[test]
    fn query_missing_program() {
        let ctx = ExecutionContext::local().with_qacct_program("nonexistent_qacct_12345".to_string());
        let err = Qacct::query("analysis", &ctx).unwrap_err();
        assert!(matches!(err, SgeError::Command { .. }));
    }

    #[test]
    fn display() {
        let qacct = Qacct::parse(&report()).unwrap();
        assert_eq!(qacct.to_string(), "qacct: 3 tasks");
        assert!(qacct.job_name().is_none());
    }
}
