use crate::error::SgeError;
use log::debug;

/// Value of `$KEYNAME` on every node of the cluster (login, staging and compute).
pub const CLUSTER_KEYNAME: &str = "id_alcescluster";

const KEYNAME_VAR: &str = "KEYNAME";
// only set on login nodes
const LOGIN_NODE_VAR: &str = "SGE_ROOT";
const USER_VAR: &str = "USER";

/// Where the current process is running and which external commands to call.
///
/// Scripts never read the environment themselves, they are handed one of these.
/// Use [`ExecutionContext::from_env`] for the real thing, the other constructors
/// describe a fixed location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    pub(crate) on_cluster: bool,
    pub(crate) login_node: bool,
    pub(crate) user: Option<String>,
    pub(crate) qsub_program: String,
    pub(crate) qacct_program: String,
}

impl ExecutionContext {
    fn new(on_cluster: bool, login_node: bool, user: Option<String>) -> ExecutionContext {
        ExecutionContext {
            on_cluster,
            login_node,
            user,
            qsub_program: String::from("qsub"),
            qacct_program: String::from("qacct"),
        }
    }

    pub fn from_env() -> ExecutionContext {
        let on_cluster = std::env::var(KEYNAME_VAR)
            .map(|keyname| keyname == CLUSTER_KEYNAME)
            .unwrap_or(false);
        let login_node = on_cluster && std::env::var_os(LOGIN_NODE_VAR).is_some();
        let user = std::env::var(USER_VAR).ok();
        debug!(
            "detected execution context: cluster={} login_node={} user={:?}",
            on_cluster, login_node, user
        );
        ExecutionContext::new(on_cluster, login_node, user)
    }

    /// Off the cluster, e.g. a laptop.
    pub fn local() -> ExecutionContext {
        ExecutionContext::new(false, false, None)
    }

    pub fn login_node(user: String) -> ExecutionContext {
        ExecutionContext::new(true, true, Some(user))
    }

    pub fn compute_node(user: String) -> ExecutionContext {
        ExecutionContext::new(true, false, Some(user))
    }

    pub fn with_qsub_program(mut self, program: String) -> ExecutionContext {
        self.qsub_program = program;
        self
    }

    pub fn with_qacct_program(mut self, program: String) -> ExecutionContext {
        self.qacct_program = program;
        self
    }

    pub fn on_cluster(&self) -> bool {
        self.on_cluster
    }

    pub fn is_login_node(&self) -> bool {
        self.on_cluster && self.login_node
    }

    /// The explicit user if given, else the detected one when running on the cluster.
    pub fn resolve_user(&self, explicit: Option<&str>) -> Result<String, SgeError> {
        match (explicit, &self.user) {
            (Some(user), _) => Ok(user.to_string()),
            (None, Some(user)) if self.on_cluster => Ok(user.clone()),
            (None, None) if self.on_cluster => Err(SgeError::UserNotDetected),
            _ => Err(SgeError::MissingUser),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::from_env()
    }
}
