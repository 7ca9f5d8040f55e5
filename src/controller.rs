//! Collaborator interfaces to the controller transport.
//!
//! The vendor session library is not part of this crate. Anything that can
//! scan for controllers, open a link, and drive a RAPID task implements
//! [`Transport`], [`ControllerLink`], [`RapidTask`] and [`RapidData`]; the
//! [`session`](crate::session) and [`execution`](crate::execution) modules
//! only talk to these traits.
//!
//! Implementations own their timeouts. A call that cannot complete must
//! return a [`TransportError`] rather than block forever.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// An addressable controller as returned by a network scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// System name reported by the controller.
    pub name: String,
    /// Network address, e.g. `192.168.125.1`.
    pub address: String,
    pub is_virtual: bool,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Principal used to log on to a controller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// The service principal every controller ships with.
    pub fn default_user() -> Self {
        Self::new("Default User", "robotics")
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::default_user()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Controller operating mode as selected on the cabinet key switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Automatic. The only mode that accepts remote execution.
    Automatic,
    /// Manual, reduced speed (teach mode).
    ManualReducedSpeed,
    /// Manual, full speed.
    ManualFullSpeed,
    /// Mode change pending acknowledgement.
    AutoChangeRequested,
    /// Controller starting up.
    Init,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Automatic => "automatic",
            Self::ManualReducedSpeed => "manual reduced speed",
            Self::ManualFullSpeed => "manual full speed",
            Self::AutoChangeRequested => "auto change requested",
            Self::Init => "init",
        };
        f.write_str(name)
    }
}

/// How a program or module load treats what is already in the task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    /// Discard the task's current program first.
    Replace,
    /// Add to the task's current program.
    Add,
}

/// Scans the network and opens links to controllers.
pub trait Transport {
    type Link: ControllerLink;

    /// Lists reachable controllers in discovery order.
    fn scan(&mut self) -> Result<Vec<Endpoint>, TransportError>;

    /// Opens an unauthenticated link. Dropping the link disconnects.
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Self::Link, TransportError>;
}

/// An open connection to one controller.
pub trait ControllerLink {
    fn logon(&mut self, credentials: &Credentials) -> Result<(), TransportError>;

    fn logoff(&mut self) -> Result<(), TransportError>;

    /// Requests write mastership over the RAPID domain.
    ///
    /// Must fail with [`TransportError::MastershipHeld`] instead of waiting when
    /// another client holds it.
    fn request_mastership(&mut self) -> Result<(), TransportError>;

    fn release_mastership(&mut self) -> Result<(), TransportError>;

    fn operating_mode(&mut self) -> Result<OperatingMode, TransportError>;

    /// Controller-side directory that receives uploaded files.
    fn remote_directory(&mut self) -> Result<String, TransportError>;

    /// Copies a local file to `remote_path` on controller storage.
    fn put_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), TransportError>;

    /// Looks up a RAPID task by name.
    fn task(&mut self, name: &str) -> Result<Box<dyn RapidTask + '_>, TransportError>;
}

/// A RAPID execution task on the controller.
pub trait RapidTask {
    /// Loads a program descriptor from controller storage.
    fn load_program(&mut self, remote_path: &str, mode: LoadMode) -> Result<(), TransportError>;

    /// Loads a single module file from controller storage.
    fn load_module(&mut self, remote_path: &str, mode: LoadMode) -> Result<(), TransportError>;

    /// Moves the program pointer to the entry routine.
    fn reset_program_pointer(&mut self) -> Result<(), TransportError>;

    /// Starts execution. Returns once the controller accepted the request.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Looks up a data declaration in one of the task's modules.
    fn data(&mut self, module: &str, name: &str)
    -> Result<Box<dyn RapidData + '_>, TransportError>;
}

/// A RAPID data declaration (`VAR`, `PERS` or `CONST`) inside a task.
pub trait RapidData {
    /// Declared RAPID type, e.g. `robtarget` or `num`.
    fn type_name(&self) -> &str;

    /// Current value in RAPID literal syntax.
    fn value(&self) -> Result<String, TransportError>;

    fn set_value(&mut self, literal: &str) -> Result<(), TransportError>;
}

/// Converts forward slashes to the controller's `\` separator.
pub fn normalize_remote_path(path: &str) -> String {
    path.replace('/', "\\")
}

/// Joins a controller directory and a file name with the controller separator.
pub fn remote_file_path(directory: &str, file_name: &str) -> String {
    let directory = normalize_remote_path(directory);
    if directory.is_empty() {
        return file_name.to_string();
    }
    let directory = directory.trim_end_matches('\\');
    format!("{directory}\\{file_name}")
}
