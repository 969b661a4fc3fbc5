use clap::{Parser, Subcommand};
use ddcsw_common::{
    parse_input_code, IpcClient, IpcCommand, IpcResponse, MenuItem, MenuState, Monitor,
};

#[derive(Parser)]
#[command(name = "ddcsw-cli")]
#[command(about = "ddcsw-cli (monitor input source switcher control)")]
#[command(version = "0.1.0")]
struct Cli {
    /// Print the raw daemon response as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ddcsw daemon
    Daemon,

    /// Show the input menu
    Menu,

    /// Activate a numbered menu entry
    Activate {
        /// Entry number as printed by `menu`
        index: usize,
    },

    /// Switch a display to an input source
    Select {
        /// ddcutil display number
        display: u32,

        /// Input code, e.g. 0x0f or 15
        #[arg(value_parser = parse_code)]
        code: u16,
    },

    /// Forget known monitors and detect them again
    Refresh,

    /// Show detection state and monitors
    Status,
}

fn parse_code(value: &str) -> Result<u16, String> {
    parse_input_code(value).map_err(|e| e.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Daemon => {
            println!("To start the daemon, run: ddcsw-daemon");
            println!("Or use systemctl --user start ddcsw if a user unit is installed");
            return Ok(());
        }
        Commands::Menu => IpcCommand::Menu,
        Commands::Activate { index } => IpcCommand::Activate { index },
        Commands::Select { display, code } => IpcCommand::Select { display, code },
        Commands::Refresh => IpcCommand::Refresh,
        Commands::Status => IpcCommand::Status,
    };

    let client = IpcClient::new();
    match client.send_command(&command) {
        Ok(response) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            if matches!(response, IpcResponse::Error { .. }) {
                std::process::exit(1);
            }
        }
        Ok(response) => print_response(response),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Is ddcsw-daemon running?");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_response(response: IpcResponse) {
    match response {
        IpcResponse::Success { message } => {
            println!("✓ {}", message);
        }

        IpcResponse::Error { message } => {
            eprintln!("✗ Error: {}", message);
            std::process::exit(1);
        }

        IpcResponse::Menu { items } => {
            for line in render_menu(&items) {
                println!("{}", line);
            }
        }

        IpcResponse::Status { state, monitors } => {
            for line in render_status(state, &monitors) {
                println!("{}", line);
            }
        }
    }
}

/// Menu as text; selectable entries are numbered for `activate`.
fn render_menu(items: &[MenuItem]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut index = 0;

    for item in items {
        if item.is_selectable() {
            index += 1;
        }
        match item {
            MenuItem::Header { label } => lines.push(label.clone()),
            MenuItem::Separator => lines.push(String::new()),
            MenuItem::Input { label, active, .. } => {
                let marker = if *active { "●" } else { " " };
                lines.push(format!("{:>3}. {} {}", index, marker, label));
            }
            MenuItem::Placeholder { label } => lines.push(format!("       {}", label)),
            MenuItem::Message { text } => lines.push(text.clone()),
            MenuItem::Refresh => lines.push(format!("{:>3}.   Refresh", index)),
        }
    }

    lines
}

fn render_status(state: MenuState, monitors: &[Monitor]) -> Vec<String> {
    let mut lines = vec![
        "ddcsw Status:".to_string(),
        "=============".to_string(),
        format!("State: {}", state),
    ];

    if monitors.is_empty() {
        lines.push("No monitors".to_string());
        return lines;
    }

    lines.push(String::new());
    for monitor in monitors {
        let current = match monitor.current_input {
            Some(code) => monitor
                .input_name(code)
                .map(|name| format!("{} (0x{:02x})", name, code))
                .unwrap_or_else(|| format!("0x{:02x}", code)),
            None => "unknown".to_string(),
        };
        let inputs = if monitor.initialized {
            monitor.inputs().len().to_string()
        } else {
            "pending".to_string()
        };

        lines.push(format!(
            "Display {}: {} | input: {} | inputs: {}",
            monitor.number,
            monitor.display_name(),
            current,
            inputs
        ));
    }

    lines
}
