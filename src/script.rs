use crate::context::ExecutionContext;
use crate::error::SgeError;
use crate::tasks::TaskSpec;
use log::{debug, info};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub(crate) const SHEBANG: &str = "#!/bin/sh";

/// What an SGE job waits for before it may start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dependency {
    /// `-hold_jid`: wait for the whole job to finish.
    Job(String),
    /// `-hold_jid_ad`: task `n` waits for task `n` of the other array job.
    ArrayTask(String),
}

impl Dependency {
    fn directive(&self) -> String {
        match self {
            Dependency::Job(job) => format!("#$ -hold_jid {}", job),
            Dependency::ArrayTask(job) => format!("#$ -hold_jid_ad {}", job),
        }
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::Job(job) => write!(f, "job {}", job),
            Dependency::ArrayTask(job) => write!(f, "array tasks of {}", job),
        }
    }
}

/// An SGE submission script, built with [`crate::script_builder::SgeScriptBuilder`].
///
/// Directive lines and body lines are kept apart and only turned into text by
/// [`SgeScript::template`], directives first then a blank line then the body,
/// each in the order they were added.
#[derive(Clone, Debug)]
pub struct SgeScript {
    pub(crate) name: String,
    pub(crate) user: String,
    pub(crate) memory: String,
    pub(crate) runtime: String, // HH:MM:SS
    pub(crate) output: String,
    pub(crate) tasks: Option<String>,
    pub(crate) dependency: Option<Dependency>,
    pub(crate) parallel_environment: Option<String>,
    pub(crate) directives: Vec<String>,
    pub(crate) body: Vec<String>,
    pub(crate) save_path: Option<PathBuf>,
}

impl Display for SgeScript {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.template().as_str())
    }
}

impl SgeScript {
    pub(crate) fn base(
        name: String,
        user: String,
        memory: String,
        runtime: String,
        output: String,
    ) -> SgeScript {
        let directives = vec![
            format!("#$ -N {}", name),
            format!("#$ -l h_vmem={}", memory),
            format!("#$ -l h_rt={}", runtime),
            format!("#$ -o {}", output),
            String::from("#$ -j y"),
        ];
        SgeScript {
            name,
            user,
            memory,
            runtime,
            output,
            tasks: None,
            dependency: None,
            parallel_environment: None,
            directives,
            body: Vec::new(),
            save_path: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn tasks(&self) -> Option<&str> {
        self.tasks.as_deref()
    }

    pub fn dependency(&self) -> Option<&Dependency> {
        self.dependency.as_ref()
    }

    pub fn parallel_environment(&self) -> Option<&str> {
        self.parallel_environment.as_deref()
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn is_array(&self) -> bool {
        self.tasks.is_some()
    }

    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// Turn this into an array job. A script has at most one task range.
    pub fn with_tasks(mut self, tasks: impl Into<TaskSpec>) -> Result<SgeScript, SgeError> {
        if let Some(existing) = &self.tasks {
            return Err(SgeError::TasksAlreadySet(existing.clone()));
        }
        let range = tasks.into().render()?;
        self.directives.push(format!("#$ -t {}", range));
        self.tasks = Some(range);
        Ok(self)
    }

    /// Hold the job until `hold_jid` finishes, or until the matching task of
    /// `hold_jid_ad` does. Passing neither leaves the script alone.
    pub fn with_dependency(
        mut self,
        hold_jid: Option<&str>,
        hold_jid_ad: Option<&str>,
    ) -> Result<SgeScript, SgeError> {
        let dependency = match (hold_jid, hold_jid_ad) {
            (Some(_), Some(_)) => return Err(SgeError::ConflictingDependency),
            (Some(job), None) => Dependency::Job(job.to_string()),
            (None, Some(job)) => Dependency::ArrayTask(job.to_string()),
            (None, None) => return Ok(self),
        };
        if let Some(existing) = &self.dependency {
            return Err(SgeError::DependencyAlreadySet(existing.to_string()));
        }
        match &dependency {
            Dependency::Job(job) | Dependency::ArrayTask(job) => {
                SgeError::check_single_line("dependency", job)?
            }
        }
        self.directives.push(dependency.directive());
        self.dependency = Some(dependency);
        Ok(self)
    }

    pub fn with_parallel_environment(mut self, pe: &str) -> Result<SgeScript, SgeError> {
        SgeError::check_single_line("parallel environment", pe)?;
        self.directives.push(format!("#$ -pe {}", pe));
        self.parallel_environment = Some(pe.to_string());
        Ok(self)
    }

    pub fn push_directive(mut self, directive: &str) -> SgeScript {
        self.directives.push(directive.to_string());
        self
    }

    pub fn push_line(mut self, line: &str) -> SgeScript {
        self.body.push(line.to_string());
        self
    }

    /// Run line `$SGE_TASK_ID` of `input_file` as the command of each array task.
    pub fn loop_through_file(mut self, input_file: &str) -> Result<SgeScript, SgeError> {
        if !self.is_array() {
            return Err(SgeError::NotAnArrayJob("loop_through_file"));
        }
        SgeError::check_single_line("input file", input_file)?;
        self.body.push(format!("SEEDFILE=\"{}\"", input_file));
        self.body
            .push(String::from("SEED=$(awk \"NR==$SGE_TASK_ID\" \"$SEEDFILE\")"));
        self.body.push(String::from("$SEED"));
        Ok(self)
    }

    pub fn template(&self) -> String {
        let mut ret = String::from(SHEBANG);
        ret += "\n\n";
        for directive in &self.directives {
            ret += directive.as_str();
            ret += "\n";
        }
        if !self.body.is_empty() {
            ret += "\n";
            for line in &self.body {
                ret += line.as_str();
                ret += "\n";
            }
        }
        ret
    }

    /// Write the script to `path` and remember it for [`SgeScript::submit`].
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), SgeError> {
        let path = path.as_ref();
        let content = self.template() + "\n";
        fs::write(path, content).map_err(|e| SgeError::io(path, e))?;
        debug!("saved script {} to {}", self.name, path.display());
        self.save_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Hand the saved script to `qsub` without waiting for it.
    #[allow(clippy::zombie_processes)]
    pub fn submit(&self, ctx: &ExecutionContext) -> Result<(), SgeError> {
        if !ctx.is_login_node() {
            return Err(SgeError::NotOnLoginNode);
        }
        let path = self.save_path.as_ref().ok_or(SgeError::NotSaved)?;
        let path = std::path::absolute(path).map_err(|e| SgeError::io(path, e))?;
        let child = Command::new(&ctx.qsub_program)
            .arg(&path)
            .spawn()
            .map_err(|source| SgeError::Command {
                command: ctx.qsub_program.clone(),
                source,
            })?;
        info!(
            "submitted {} with {} (pid {})",
            path.display(),
            ctx.qsub_program,
            child.id()
        );
        Ok(())
    }

    /// Alias for [`SgeScript::submit`].
    pub fn run(&self, ctx: &ExecutionContext) -> Result<(), SgeError> {
        self.submit(ctx)
    }
}
