#![allow(dead_code)]

use std::cell::RefCell;

use kamal_provision::{Connection, ProvisionError, ProvisionResult, Remote, RemoteCommand};

type Handler = Box<dyn Fn(&Connection, &str) -> ProvisionResult<String>>;

/// Scripted [`Remote`] that records every command it is asked to
/// run. The handler sees the command rendered with `Display`.
pub struct MockRemote {
    calls: RefCell<Vec<(Connection, String)>>,
    handler: Handler,
}

impl MockRemote {
    pub fn new(handler: impl Fn(&Connection, &str) -> ProvisionResult<String> + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Every command succeeds with empty output.
    pub fn ok() -> Self {
        Self::new(|_, _| Ok(String::new()))
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn connections(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(conn, _)| conn.to_string())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Remote for MockRemote {
    fn capture(&self, connection: &Connection, command: &RemoteCommand) -> ProvisionResult<String> {
        let rendered = command.to_string();
        self.calls
            .borrow_mut()
            .push((connection.clone(), rendered.clone()));
        (self.handler)(connection, &rendered)
    }
}

pub fn command_failed(connection: &Connection, command: &str) -> ProvisionError {
    ProvisionError::RemoteCommand {
        destination: connection.to_string(),
        command: command.to_string(),
        status: Some(1),
        stderr: String::new(),
    }
}

pub fn auth_failed(connection: &Connection) -> ProvisionError {
    ProvisionError::AuthenticationFailed {
        destination: connection.to_string(),
    }
}

pub fn refused(connection: &Connection) -> ProvisionError {
    ProvisionError::ConnectionRefused {
        destination: connection.to_string(),
    }
}

pub fn render(command: &RemoteCommand) -> String {
    command.to_string()
}
