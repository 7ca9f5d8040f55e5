//! Program transfer and task execution.
//!
//! Both operations run under a [`MastershipGuard`] and pass the automatic-mode
//! gate before touching the controller:
//!
//! - [`MastershipGuard::upload_and_run`] copies a generated module and its
//!   descriptor to controller storage, replaces the task's program, resets the
//!   program pointer and starts the task.
//! - [`MastershipGuard::write_variable`] patches one `robtarget` in the loaded
//!   program and restarts the task from the top.
//!
//! [`deploy_program`] and [`patch_target`] wrap either operation in a complete
//! session: discover, connect, log on, lock, run, release, log off.

use crate::controller::{ControllerLink, LoadMode, RapidTask, Transport, remote_file_path};
use crate::error::{ControllerError, Result, TransportError};
use crate::program::ProgramFiles;
use crate::session::{ControllerConfig, ControllerSession, MastershipGuard};
use crate::target::{ROBTARGET_TYPE, Target};
use std::path::Path;
use tracing::{info, warn};

/// Remote locations of an uploaded program.
struct RemoteProgram {
    module: String,
    descriptor: String,
}

impl<T: Transport> MastershipGuard<'_, T> {
    /// Uploads a program and starts it in the configured task.
    ///
    /// Returns `Ok(false)` when copying to the controller failed; nothing has
    /// been loaded in that case and the caller may retry. Once the copy has
    /// succeeded, a rejected load or start is returned as
    /// [`ControllerError::Load`] or [`ControllerError::Start`].
    pub fn upload_and_run(&mut self, files: &ProgramFiles) -> Result<bool> {
        if !files.module_path.is_file() {
            return Err(ControllerError::FileNotFound(files.module_path.clone()));
        }
        self.ensure_automatic()?;

        let remote = match self.transfer(files) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "program transfer failed");
                return Ok(false);
            }
        };

        let task_name = self.config().task_name.clone();
        let mut task = self
            .link()?
            .task(&task_name)
            .map_err(|source| ControllerError::Load {
                file: remote.module.clone(),
                source,
            })?;
        load_and_start(task.as_mut(), &task_name, &remote)?;

        info!(task = %task_name, module = %remote.module, "program started");
        Ok(true)
    }

    /// Assigns `value_text` to the `robtarget` `module:name` and restarts the task.
    ///
    /// The data item is left untouched if it is not a `robtarget` or if
    /// `value_text` does not parse.
    ///
    /// The program pointer is reset before the task is started, so the task
    /// runs the new value from the entry routine. Resetting after `start`
    /// would move the pointer of a task that is already running.
    pub fn write_variable(&mut self, module: &str, name: &str, value_text: &str) -> Result<()> {
        self.ensure_automatic()?;

        let task_name = self.config().task_name.clone();
        let mut task = self.link()?.task(&task_name)?;
        {
            let mut data = task.data(module, name)?;
            if data.type_name() != ROBTARGET_TYPE {
                warn!(
                    module = %module,
                    variable = %name,
                    found = data.type_name(),
                    "refusing to assign target"
                );
                return Err(ControllerError::TypeMismatch {
                    module: module.to_string(),
                    name: name.to_string(),
                    found: data.type_name().to_string(),
                });
            }
            let target = Target::decode(value_text)?;
            data.set_value(&target.encode())?;
        }
        info!(task = %task_name, module = %module, variable = %name, "target updated");

        let start_error = |source| ControllerError::Start {
            task: task_name.clone(),
            source,
        };
        task.reset_program_pointer().map_err(start_error)?;
        task.start().map_err(start_error)?;

        info!(task = %task_name, "task restarted");
        Ok(())
    }

    /// Copies module and descriptor into the controller's remote directory.
    fn transfer(&mut self, files: &ProgramFiles) -> Result<RemoteProgram> {
        let link = self.link()?;
        let directory = link
            .remote_directory()
            .map_err(|source| ControllerError::Transfer {
                file: "remote directory".to_string(),
                source,
            })?;

        let mut put = |local: &Path| -> Result<String> {
            let remote = remote_file_path(&directory, &file_name(local));
            link.put_file(local, &remote, true)
                .map_err(|source| ControllerError::Transfer {
                    file: local.display().to_string(),
                    source,
                })?;
            info!(local = %local.display(), remote = %remote, "copied file to controller");
            Ok(remote)
        };

        Ok(RemoteProgram {
            module: put(&files.module_path)?,
            descriptor: put(&files.descriptor_path)?,
        })
    }
}

fn load_and_start(task: &mut dyn RapidTask, task_name: &str, remote: &RemoteProgram) -> Result<()> {
    let load_error = |file: &str| {
        let file = file.to_string();
        move |source: TransportError| ControllerError::Load { file, source }
    };
    task.load_program(&remote.descriptor, LoadMode::Replace)
        .map_err(load_error(&remote.descriptor))?;
    task.load_module(&remote.module, LoadMode::Add)
        .map_err(load_error(&remote.module))?;

    let start_error = |source| ControllerError::Start {
        task: task_name.to_string(),
        source,
    };
    task.reset_program_pointer().map_err(start_error)?;
    task.start().map_err(start_error)?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs a full session that uploads `files` and starts them.
///
/// The session is logged off and mastership released on every path.
pub fn deploy_program<T: Transport>(
    transport: T,
    config: &ControllerConfig,
    files: &ProgramFiles,
) -> Result<bool> {
    if !files.module_path.is_file() {
        return Err(ControllerError::FileNotFound(files.module_path.clone()));
    }
    let mut session = ControllerSession::open(transport, config.clone())?;
    let outcome = session
        .acquire_lock()
        .and_then(|mut lock| lock.upload_and_run(files));
    session.close();
    outcome
}

/// Runs a full session that assigns `value_text` to a `robtarget` and restarts the task.
pub fn patch_target<T: Transport>(
    transport: T,
    config: &ControllerConfig,
    module: &str,
    name: &str,
    value_text: &str,
) -> Result<()> {
    let mut session = ControllerSession::open(transport, config.clone())?;
    let outcome = session
        .acquire_lock()
        .and_then(|mut lock| lock.write_variable(module, name, value_text));
    session.close();
    outcome
}
