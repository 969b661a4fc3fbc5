use std::path::PathBuf;
use std::os::unix::net::{UnixListener, UnixStream};
use std::io::{Read, Write};
use serde::{Serialize, Deserialize};
use crate::error::{DdcswError, IpcError};
use crate::menu::{MenuItem, MenuState};
use crate::monitor::Monitor;
use crate::Result;

#[derive(Debug, Serialize, Deserialize)]
pub enum IpcCommand {
    Menu,
    Refresh,
    Select { display: u32, code: u16 },
    Activate { index: usize },
    Status,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum IpcResponse {
    Success { message: String },
    Error { message: String },
    Menu { items: Vec<MenuItem> },
    Status {
        state: MenuState,
        monitors: Vec<Monitor>,
    },
}

fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("ddcsw.sock")
}

pub struct IpcClient {
    socket_path: PathBuf,
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcClient {
    pub fn new() -> Self {
        Self { socket_path: default_socket_path() }
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn send_command(&self, command: &IpcCommand) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            DdcswError::Ipc(IpcError::Connection {
                path: self.socket_path.clone(),
                source: e,
            })
        })?;

        let command_json = serde_json::to_string(command)
            .map_err(|_| DdcswError::Ipc(IpcError::InvalidMessage))?;

        stream
            .write_all(command_json.as_bytes())
            .map_err(|_| DdcswError::Ipc(IpcError::Send))?;
        stream
            .shutdown(std::net::Shutdown::Write)
            .map_err(|_| DdcswError::Ipc(IpcError::Send))?;

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .map_err(|_| DdcswError::Ipc(IpcError::Receive))?;

        serde_json::from_str(&response).map_err(|_| DdcswError::Ipc(IpcError::InvalidMessage))
    }
}

pub struct IpcServer {
    socket_path: PathBuf,
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcServer {
    pub fn new() -> Self {
        Self { socket_path: default_socket_path() }
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn bind(&self) -> Result<UnixListener> {
        let bind_error = |e: std::io::Error| {
            DdcswError::Ipc(IpcError::SocketCreation {
                path: self.socket_path.clone(),
                source: e,
            })
        };

        // Remove a stale socket left by a previous daemon
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(bind_error)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(bind_error)?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(bind_error)?;
        log::info!("IPC server listening on {:?}", self.socket_path);
        Ok(listener)
    }

    /// Serves connections forever, one thread per connection.
    pub fn serve<F>(listener: UnixListener, handler: F)
    where
        F: Fn(IpcCommand) -> IpcResponse + Send + Clone + 'static,
    {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = handler.clone();
                    std::thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(stream, &handler) {
                            log::error!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Error accepting IPC connection: {}", e);
                }
            }
        }
    }

    fn handle_connection<F>(mut stream: UnixStream, handler: &F) -> Result<()>
    where
        F: Fn(IpcCommand) -> IpcResponse,
    {
        let mut command_json = String::new();
        stream
            .read_to_string(&mut command_json)
            .map_err(|_| DdcswError::Ipc(IpcError::Receive))?;

        let response = match serde_json::from_str::<IpcCommand>(&command_json) {
            Ok(command) => {
                log::debug!("IPC command: {:?}", command);
                handler(command)
            }
            Err(e) => IpcResponse::Error { message: format!("Invalid command: {}", e) },
        };

        let response_json = serde_json::to_string(&response)
            .map_err(|_| DdcswError::Ipc(IpcError::InvalidMessage))?;

        stream
            .write_all(response_json.as_bytes())
            .map_err(|_| DdcswError::Ipc(IpcError::Send))?;

        Ok(())
    }
}
