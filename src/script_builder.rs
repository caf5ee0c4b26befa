use crate::context::ExecutionContext;
use crate::script::SgeScript;
use crate::error::SgeError;
use log::debug;
use uuid::Uuid;

pub const DEFAULT_MEMORY: &str = "2G";
pub const DEFAULT_RUNTIME: &str = "06:00:00";
pub const MODULES_INIT: &str = ". /etc/profile.d/modules.sh";

pub struct SgeScriptBuilder {
    name: Option<String>,
    user: Option<String>,
    memory: String,
    runtime: String,
    output: Option<String>,
    queue: Option<String>,
    load_modules: bool,
}

impl Default for SgeScriptBuilder {
    fn default() -> Self {
        SgeScriptBuilder::new()
    }
}

impl SgeScriptBuilder {
    pub fn new() -> SgeScriptBuilder {
        SgeScriptBuilder {
            name: None,
            user: None,
            memory: String::from(DEFAULT_MEMORY),
            runtime: String::from(DEFAULT_RUNTIME),
            output: None,
            queue: None,
            load_modules: false,
        }
    }

    /// Preset for analysis jobs, which load environment modules before running anything.
    pub fn analysis() -> SgeScriptBuilder {
        SgeScriptBuilder::new().load_modules()
    }

    /// Preset for jobs moving data onto the cluster, which run on the staging queue.
    pub fn staging() -> SgeScriptBuilder {
        SgeScriptBuilder::new().set_queue(String::from("staging"))
    }

    pub fn destaging() -> SgeScriptBuilder {
        SgeScriptBuilder::new()
    }

    pub fn set_name(mut self, name: String) -> SgeScriptBuilder {
        self.name = Some(name);
        self
    }

    pub fn set_user(mut self, user: String) -> SgeScriptBuilder {
        self.user = Some(user);
        self
    }

    /// Anything `-l h_vmem` accepts.
    pub fn set_memory(mut self, memory: String) -> SgeScriptBuilder {
        self.memory = memory;
        self
    }

    /// Anything `-l h_rt` accepts.
    pub fn set_runtime(mut self, runtime: String) -> SgeScriptBuilder {
        self.runtime = runtime;
        self
    }

    pub fn set_output(mut self, output: String) -> SgeScriptBuilder {
        self.output = Some(output);
        self
    }

    pub fn set_queue(mut self, queue: String) -> SgeScriptBuilder {
        self.queue = Some(queue);
        self
    }

    pub fn load_modules(mut self) -> SgeScriptBuilder {
        self.load_modules = true;
        self
    }

    pub fn build(&self, ctx: &ExecutionContext) -> Result<SgeScript, SgeError> {
        let user = ctx.resolve_user(self.user.as_deref())?;
        let name = self.name.clone().unwrap_or_else(generate_random_hex);
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output(&user));
        SgeError::check_single_line("name", &name)?;
        SgeError::check_single_line("user", &user)?;
        SgeError::check_single_line("memory", &self.memory)?;
        SgeError::check_single_line("runtime", &self.runtime)?;
        SgeError::check_single_line("output", &output)?;
        if let Some(queue) = &self.queue {
            SgeError::check_single_line("queue", queue)?;
        }
        debug!("building script {} for user {}", name, user);
        let mut script = SgeScript::base(
            name,
            user,
            self.memory.clone(),
            self.runtime.clone(),
            output,
        );
        if let Some(queue) = &self.queue {
            script = script.push_directive(format!("#$ -q {}", queue).as_str());
        }
        if self.load_modules {
            script = script.push_line(MODULES_INIT);
        }
        Ok(script)
    }
}

/// Scratch space of `user`, where stdout and stderr files go by default.
pub fn default_output(user: &str) -> String {
    format!("/exports/eddie/scratch/{}/", user)
}

/// Six lowercase hex characters, the first always a letter since job names
/// must not start with a digit.
pub fn generate_random_hex() -> String {
    let uuid = Uuid::new_v4();
    let first = char::from(b"abcdef"[(uuid.as_bytes()[0] % 6) as usize]);
    let rest = uuid.simple().to_string();
    let mut ret = String::with_capacity(6);
    ret.push(first);
    ret.push_str(&rest[1..6]);
    ret
}
