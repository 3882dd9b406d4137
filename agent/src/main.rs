//! Polling OTA update agent - Entry Point
//!
//! Checks in with a deployment server on a server-controlled interval,
//! downloads advertised update artifacts, hands them to an installer and
//! reports the outcome back.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use otagent::app::options::{AppOptions, ServerOptions, StateOptions};
use otagent::app::run::run;
use otagent::channel::http;
use otagent::engine::process;
use otagent::logs::{init_logging, LogOptions};
use otagent::storage::layout::StorageLayout;
use otagent::storage::settings::Settings;
use otagent::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Write an initial settings file
    if cli_args.contains_key("install") {
        return install(&cli_args).await;
    }

    // Run the agent starting here

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = layout.settings_file();
    let settings = match settings_file.read_json::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            eprintln!("Run: otagent --install --url=<server_url> --tenant=<tenant>");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Run the agent
    let options = AppOptions {
        server: ServerOptions {
            base_url: settings.server.base_url.clone(),
            tenant: settings.server.tenant.clone(),
            controller_id: settings.server.controller_id.clone(),
            polling_interval: Duration::from_secs(settings.polling_interval_secs),
        },
        channel: http::Options {
            target_token: settings.server.target_token.clone(),
            ..Default::default()
        },
        state: StateOptions {
            backend: settings.state.backend,
            key: settings.state.key.clone(),
            env_path: settings.state.env_path.clone(),
        },
        engine: process::Options {
            command: settings.engine.command.clone(),
            args: settings.engine.args.clone(),
            timeout: settings.engine.timeout_secs.map(Duration::from_secs),
        },
        ..Default::default()
    };

    info!("Running update agent with options: {:?}", options);
    let result = run(version.version, options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the agent: {e}");
    }
}

/// Write an initial settings file from the install flags
async fn install(cli_args: &HashMap<String, String>) {
    println!("Update Agent Installer");
    println!("======================");
    println!();

    let layout = StorageLayout::default();
    println!("Setting up storage at: {:?}", layout.base_dir);
    if let Err(e) = layout.setup().await {
        eprintln!("\n[ERROR] Failed to set up storage: {}", e);
        std::process::exit(1);
    }

    let mut settings = Settings::default();
    if let Some(url) = cli_args.get("url") {
        settings.server.base_url = url.clone();
    }
    if let Some(tenant) = cli_args.get("tenant") {
        settings.server.tenant = tenant.clone();
    }
    if let Some(token) = cli_args.get("token") {
        settings.server.target_token = Some(token.clone());
    }
    settings.server.controller_id = cli_args
        .get("controller")
        .cloned()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("Server URL: {}", settings.server.base_url);
    println!("Tenant: {}", settings.server.tenant);
    println!("Controller id: {}", settings.server.controller_id);
    println!();

    let settings_file = layout.settings_file();
    if let Err(e) = settings_file.write_json(&settings).await {
        eprintln!("\n[ERROR] Failed to write settings: {}", e);
        std::process::exit(1);
    }
    println!("Settings saved to: {:?}", settings_file.path());

    println!();
    println!("[SUCCESS] Update agent installed successfully!");
    println!("Start the agent with: systemctl start otagent");
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
