// tests/common/mod.rs
//! In-memory controller used by the integration tests.
#![allow(dead_code)]

use rapid_bridge::{
    ControllerLink, Credentials, Endpoint, LoadMode, OperatingMode, RapidData, RapidTask,
    Transport, TransportError,
};
use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

pub const MODULE: &str = "MainModule";

/// Observable controller state shared by every handle.
#[derive(Debug)]
pub struct ControllerState {
    pub endpoints: Vec<Endpoint>,
    pub mode: OperatingMode,
    pub remote_directory: String,
    pub tasks: Vec<String>,
    pub password: String,

    pub connected: bool,
    pub logged_on: bool,
    /// Mastership held by our link.
    pub mastership: bool,
    /// Mastership held by some other client.
    pub mastership_held_elsewhere: bool,

    /// Remote path -> file contents.
    pub files: BTreeMap<String, String>,
    /// (module, name) -> (type, value).
    pub data: BTreeMap<(String, String), (String, String)>,
    /// Every mutating call and logoff, in order.
    pub calls: Vec<String>,

    pub unreachable: bool,
    pub fail_put: bool,
    pub fail_load: bool,
    pub fail_start: bool,
}

impl ControllerState {
    pub fn data_value(&self, module: &str, name: &str) -> Option<String> {
        self.data
            .get(&(module.to_string(), name.to_string()))
            .map(|(_, value)| value.clone())
    }

    pub fn declare(&mut self, module: &str, name: &str, type_name: &str, value: &str) {
        self.data.insert(
            (module.to_string(), name.to_string()),
            (type_name.to_string(), value.to_string()),
        );
    }

    fn require_mastership(&self) -> Result<(), TransportError> {
        if self.mastership {
            Ok(())
        } else {
            Err(TransportError::Rejected("mastership required".to_string()))
        }
    }
}

#[derive(Clone)]
pub struct VirtualController {
    state: Rc<RefCell<ControllerState>>,
}

impl VirtualController {
    pub fn new() -> Self {
        let state = ControllerState {
            endpoints: vec![Endpoint {
                name: "IRB1200_Lab".to_string(),
                address: "127.0.0.1".to_string(),
                is_virtual: true,
            }],
            mode: OperatingMode::Automatic,
            remote_directory: "HOME/rapid".to_string(),
            tasks: vec!["T_ROB1".to_string()],
            password: "robotics".to_string(),
            connected: false,
            logged_on: false,
            mastership: false,
            mastership_held_elsewhere: false,
            files: BTreeMap::new(),
            data: BTreeMap::new(),
            calls: Vec::new(),
            unreachable: false,
            fail_put: false,
            fail_load: false,
            fail_start: false,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn state(&self) -> RefMut<'_, ControllerState> {
        self.state.borrow_mut()
    }
}

impl Transport for VirtualController {
    type Link = VirtualLink;

    fn scan(&mut self) -> Result<Vec<Endpoint>, TransportError> {
        Ok(self.state().endpoints.clone())
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<VirtualLink, TransportError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(TransportError::Unreachable(endpoint.address.clone()));
        }
        state.connected = true;
        Ok(VirtualLink {
            state: self.state.clone(),
        })
    }
}

pub struct VirtualLink {
    state: Rc<RefCell<ControllerState>>,
}

// Disconnecting does not log off or release mastership, so a session that
// skips either leaves it visible in the state.
impl Drop for VirtualLink {
    fn drop(&mut self) {
        self.state.borrow_mut().connected = false;
    }
}

impl ControllerLink for VirtualLink {
    fn logon(&mut self, credentials: &Credentials) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if credentials.password != state.password {
            return Err(TransportError::Rejected("invalid credentials".to_string()));
        }
        state.logged_on = true;
        Ok(())
    }

    fn logoff(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.logged_on = false;
        state.calls.push("logoff".to_string());
        Ok(())
    }

    fn request_mastership(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.mastership_held_elsewhere || state.mastership {
            return Err(TransportError::MastershipHeld);
        }
        state.mastership = true;
        Ok(())
    }

    fn release_mastership(&mut self) -> Result<(), TransportError> {
        self.state.borrow_mut().mastership = false;
        Ok(())
    }

    fn operating_mode(&mut self) -> Result<OperatingMode, TransportError> {
        Ok(self.state.borrow().mode)
    }

    fn remote_directory(&mut self) -> Result<String, TransportError> {
        Ok(self.state.borrow().remote_directory.clone())
    }

    fn put_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.fail_put {
            return Err(TransportError::Rejected("disk full".to_string()));
        }
        if !overwrite && state.files.contains_key(remote_path) {
            return Err(TransportError::Rejected(format!("{remote_path} exists")));
        }
        let contents = std::fs::read_to_string(local_path)?;
        state.files.insert(remote_path.to_string(), contents);
        state.calls.push(format!("put {remote_path}"));
        Ok(())
    }

    fn task(&mut self, name: &str) -> Result<Box<dyn RapidTask + '_>, TransportError> {
        if !self.state.borrow().tasks.iter().any(|t| t == name) {
            return Err(TransportError::NotFound(name.to_string()));
        }
        Ok(Box::new(VirtualTask {
            state: self.state.clone(),
        }))
    }
}

struct VirtualTask {
    state: Rc<RefCell<ControllerState>>,
}

impl RapidTask for VirtualTask {
    fn load_program(&mut self, remote_path: &str, mode: LoadMode) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.require_mastership()?;
        if state.fail_load || !state.files.contains_key(remote_path) {
            return Err(TransportError::Rejected(format!("cannot load {remote_path}")));
        }
        state.calls.push(format!("load_program {mode:?} {remote_path}"));
        Ok(())
    }

    fn load_module(&mut self, remote_path: &str, mode: LoadMode) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.require_mastership()?;
        if state.fail_load || !state.files.contains_key(remote_path) {
            return Err(TransportError::Rejected(format!("cannot load {remote_path}")));
        }
        state.calls.push(format!("load_module {mode:?} {remote_path}"));
        Ok(())
    }

    fn reset_program_pointer(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.require_mastership()?;
        state.calls.push("reset_program_pointer".to_string());
        Ok(())
    }

    fn start(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.require_mastership()?;
        if state.fail_start {
            return Err(TransportError::Rejected("motors off".to_string()));
        }
        state.calls.push("start".to_string());
        Ok(())
    }

    fn data(
        &mut self,
        module: &str,
        name: &str,
    ) -> Result<Box<dyn RapidData + '_>, TransportError> {
        let key = (module.to_string(), name.to_string());
        let type_name = match self.state.borrow().data.get(&key) {
            Some((type_name, _)) => type_name.clone(),
            None => return Err(TransportError::NotFound(format!("{module}:{name}"))),
        };
        Ok(Box::new(VirtualData {
            state: self.state.clone(),
            key,
            type_name,
        }))
    }
}

struct VirtualData {
    state: Rc<RefCell<ControllerState>>,
    key: (String, String),
    type_name: String,
}

impl RapidData for VirtualData {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn value(&self) -> Result<String, TransportError> {
        self.state
            .borrow()
            .data
            .get(&self.key)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| TransportError::NotFound(self.key.1.clone()))
    }

    fn set_value(&mut self, literal: &str) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.require_mastership()?;
        if let Some((_, value)) = state.data.get_mut(&self.key) {
            *value = literal.to_string();
        }
        state.calls.push(format!("set {}:{}", self.key.0, self.key.1));
        Ok(())
    }
}
