//! Controller session state machine.
//!
//! A [`ControllerSession`] walks `Disconnected → Discovering → Connected →
//! Authenticated`, hands out write mastership as a [`MastershipGuard`], and
//! logs off when closed or dropped. Mutating operations live on the guard, so
//! they cannot be called without mastership held.

use crate::controller::{ControllerLink, Credentials, Endpoint, OperatingMode, Transport};
use crate::error::{ControllerError, Result, TransportError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Configuration for controller sessions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Index into the scan result of the controller to use.
    ///
    /// Defaults to 0: the first controller that answers is taken without any
    /// disambiguation, which assumes a single controller on the network.
    pub controller_index: usize,
    /// RAPID task targeted by every operation.
    pub task_name: String,
    /// Principal used by [`ControllerSession::open`].
    pub credentials: Credentials,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            controller_index: 0,
            task_name: "T_ROB1".to_string(),
            credentials: Credentials::default_user(),
        }
    }
}

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Disconnected,
    Discovering,
    /// Link open, not logged on.
    Connected,
    Authenticated,
    /// A [`MastershipGuard`] is alive.
    LockAcquired,
    /// Logged off and disconnected. Terminal.
    Closed,
}

/// A session with one controller.
pub struct ControllerSession<T: Transport> {
    transport: T,
    config: ControllerConfig,
    state: SessionState,
    endpoint: Option<Endpoint>,
    link: Option<T::Link>,
}

impl<T: Transport> ControllerSession<T> {
    pub fn new(transport: T, config: ControllerConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            endpoint: None,
            link: None,
        }
    }

    /// Discovers, connects and logs on with `config.credentials`.
    pub fn open(transport: T, config: ControllerConfig) -> Result<Self> {
        let mut session = Self::new(transport, config);
        let endpoint = session.discover()?;
        session.connect(&endpoint)?;
        let credentials = session.config.credentials.clone();
        session.authenticate(&credentials)?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Scans the network and selects the controller at `config.controller_index`.
    pub fn discover(&mut self) -> Result<Endpoint> {
        self.expect_state(SessionState::Disconnected)?;
        self.state = SessionState::Discovering;

        let scanned = self.transport.scan();
        self.state = SessionState::Disconnected;
        let mut controllers = scanned.inspect_err(|e| warn!(error = %e, "controller scan failed"))?;

        if controllers.len() > 1 {
            warn!(
                found = controllers.len(),
                index = self.config.controller_index,
                "multiple controllers found, selecting by configured index"
            );
        }
        let index = self.config.controller_index;
        if index >= controllers.len() {
            warn!(found = controllers.len(), index, "no controller at configured index");
            return Err(ControllerError::NoControllerFound);
        }
        let endpoint = controllers.swap_remove(index);

        info!(controller = %endpoint, "discovered controller");
        Ok(endpoint)
    }

    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.expect_state(SessionState::Disconnected)?;

        let link = self
            .transport
            .connect(endpoint)
            .map_err(|source| ControllerError::Connection {
                endpoint: endpoint.to_string(),
                source,
            })?;
        self.link = Some(link);
        self.endpoint = Some(endpoint.clone());
        self.state = SessionState::Connected;

        info!(controller = %endpoint, "connected");
        Ok(())
    }

    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.expect_state(SessionState::Connected)?;
        let link = self.link_mut()?;

        link.logon(credentials)
            .map_err(|source| ControllerError::Auth {
                user: credentials.user.clone(),
                source,
            })?;
        self.state = SessionState::Authenticated;

        info!(user = %credentials.user, "logged on");
        Ok(())
    }

    /// Requests write mastership.
    ///
    /// Fails with [`ControllerError::LockUnavailable`] if another client holds
    /// it; this never waits. Mastership is released when the guard drops.
    pub fn acquire_lock(&mut self) -> Result<MastershipGuard<'_, T>> {
        self.expect_state(SessionState::Authenticated)?;
        let link = self.link_mut()?;

        link.request_mastership().map_err(|e| match e {
            TransportError::MastershipHeld => ControllerError::LockUnavailable,
            other => ControllerError::Transport(other),
        })?;
        self.state = SessionState::LockAcquired;

        debug!("mastership acquired");
        Ok(MastershipGuard { session: self })
    }

    /// Logs off and disconnects. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut link) = self.link.take() {
            if matches!(
                self.state,
                SessionState::Authenticated | SessionState::LockAcquired
            ) && let Err(e) = link.logoff()
            {
                warn!(error = %e, "logoff failed");
            }
            drop(link);
            info!("disconnected");
        }
        self.state = SessionState::Closed;
    }

    fn expect_state(&self, required: SessionState) -> Result<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(ControllerError::SessionState {
                required,
                actual: self.state,
            })
        }
    }

    fn link_mut(&mut self) -> Result<&mut T::Link> {
        let actual = self.state;
        self.link.as_mut().ok_or(ControllerError::SessionState {
            required: SessionState::Connected,
            actual,
        })
    }
}

impl<T: Transport> Drop for ControllerSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Scoped write mastership over the controller's RAPID domain.
///
/// Dropping the guard releases mastership, including on early returns and
/// error paths.
pub struct MastershipGuard<'s, T: Transport> {
    session: &'s mut ControllerSession<T>,
}

impl<T: Transport> MastershipGuard<'_, T> {
    pub fn config(&self) -> &ControllerConfig {
        &self.session.config
    }

    /// The open link. Present for as long as the guard lives.
    pub(crate) fn link(&mut self) -> Result<&mut T::Link> {
        self.session.link_mut()
    }

    pub fn operating_mode(&mut self) -> Result<OperatingMode> {
        Ok(self.link()?.operating_mode()?)
    }

    /// Fails with [`ControllerError::Mode`] unless the controller is in automatic mode.
    pub fn ensure_automatic(&mut self) -> Result<()> {
        let mode = self.operating_mode()?;
        if mode != OperatingMode::Automatic {
            warn!(%mode, "automatic mode is required to start execution from a remote client");
            return Err(ControllerError::Mode { mode });
        }
        Ok(())
    }
}

impl<T: Transport> Drop for MastershipGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(link) = self.session.link.as_mut() {
            match link.release_mastership() {
                Ok(()) => debug!("mastership released"),
                Err(e) => error!(error = %e, "failed to release mastership"),
            }
        }
        if self.session.state == SessionState::LockAcquired {
            self.session.state = SessionState::Authenticated;
        }
    }
}
