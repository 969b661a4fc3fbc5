use anyhow::Result;
use ddcsw_config::Config;
use ddcsw_common::{
    Activation, Applet, ErrorContext, ErrorReporting, IpcCommand, IpcResponse, IpcServer,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    log::info!("Starting ddcsw daemon...");

    // Load configuration
    let config = Config::load()
        .map_err(|e| {
            log::error!("Configuration error: {}", e.user_friendly_message());
            anyhow::anyhow!("Configuration error: {}", e.user_friendly_message())
        })?;

    let commands = config.command_builder();
    log::info!("Using {:?}", commands.tool());

    let applet = Arc::new(Applet::new(
        Arc::new(config.executor()),
        commands,
        config.applet_settings(),
    ));

    let listener = IpcServer::new()
        .bind()
        .describe("Failed to start IPC server")?;

    applet.start();

    // IPC connections are served on plain threads and block on the runtime for tool calls
    let ipc_applet = Arc::clone(&applet);
    let runtime = Handle::current();
    std::thread::spawn(move || {
        IpcServer::serve(listener, move |cmd| {
            handle_ipc_command(cmd, &ipc_applet, &runtime)
        });
    });

    log::info!("Daemon started");

    wait_for_shutdown(&applet).await?;

    log::info!("Shutting down ddcsw daemon");
    Ok(())
}

/// Runs until SIGINT or SIGTERM. SIGHUP re-detects monitors.
async fn wait_for_shutdown(applet: &Applet) -> Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                log::info!("SIGHUP received, refreshing monitors");
                applet.refresh();
            }
            _ = terminate.recv() => return Ok(()),
            result = tokio::signal::ctrl_c() => return result.map_err(Into::into),
        }
    }
}

fn handle_ipc_command(command: IpcCommand, applet: &Applet, runtime: &Handle) -> IpcResponse {
    match command {
        IpcCommand::Menu => IpcResponse::Menu { items: applet.menu() },
        IpcCommand::Refresh => {
            applet.refresh();
            IpcResponse::Success {
                message: "Refreshing monitor list".to_string(),
            }
        }
        IpcCommand::Select { display, code } => {
            match runtime.block_on(applet.select_input(display, code)) {
                Ok(()) => IpcResponse::Success {
                    message: format!("Display {} switched to input 0x{:02x}", display, code),
                },
                Err(e) => {
                    e.log_error("Input switch failed");
                    IpcResponse::Error { message: e.user_friendly_message() }
                }
            }
        }
        IpcCommand::Activate { index } => match runtime.block_on(applet.activate(index)) {
            Ok(Activation::InputSelected { display, code }) => IpcResponse::Success {
                message: format!("Display {} switched to input 0x{:02x}", display, code),
            },
            Ok(Activation::RefreshStarted) => IpcResponse::Success {
                message: "Refreshing monitor list".to_string(),
            },
            Err(e) => {
                e.log_error("Menu activation failed");
                IpcResponse::Error { message: e.user_friendly_message() }
            }
        },
        IpcCommand::Status => {
            let (state, monitors) = applet.status();
            IpcResponse::Status { state, monitors }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddcsw_common::{
        AppletSettings, CommandBuilder, MenuItem, MenuState, ToolOutput, ToolRunner,
    };
    use std::path::PathBuf;

    struct NoMonitors;

    #[async_trait]
    impl ToolRunner for NoMonitors {
        async fn run(&self, _args: &[String]) -> ddcsw_common::Result<ToolOutput> {
            Ok(ToolOutput {
                exit_code: 0,
                stdout: "No displays found.\n".to_string(),
                stderr: String::new(),
            })
        }

        fn tool_name(&self) -> String {
            "ddcutil".to_string()
        }
    }

    fn idle_applet(dir: &tempfile::TempDir) -> Arc<Applet> {
        Arc::new(Applet::new(
            Arc::new(NoMonitors),
            CommandBuilder::new(PathBuf::from("ddcutil")),
            AppletSettings {
                use_cache: false,
                cache_file: dir.path().join("monitors.json"),
                ..AppletSettings::default()
            },
        ))
    }

    #[test]
    fn test_ipc_commands_against_applet() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let applet = runtime.block_on(async {
            let applet = idle_applet(&dir);
            applet.start();
            applet.wait_idle().await;
            applet
        });
        let handle = runtime.handle().clone();

        match handle_ipc_command(IpcCommand::Status, &applet, &handle) {
            IpcResponse::Status { state, monitors } => {
                assert_eq!(state, MenuState::NoMonitors);
                assert!(monitors.is_empty());
            }
            other => panic!("Unexpected response {:?}", other),
        }

        match handle_ipc_command(IpcCommand::Menu, &applet, &handle) {
            IpcResponse::Menu { items } => assert_eq!(items.last(), Some(&MenuItem::Refresh)),
            other => panic!("Unexpected response {:?}", other),
        }

        match handle_ipc_command(IpcCommand::Select { display: 1, code: 0x0f }, &applet, &handle) {
            IpcResponse::Error { .. } => {}
            other => panic!("Expected error, got {:?}", other),
        }

        match handle_ipc_command(IpcCommand::Activate { index: 1 }, &applet, &handle) {
            IpcResponse::Success { message } => assert_eq!(message, "Refreshing monitor list"),
            other => panic!("Unexpected response {:?}", other),
        }
    }
}
