use std::{
    io,
    path::PathBuf,
    process::ExitCode,
    time::Duration,
    };
use clap::Parser;
use log::*;

use bettylink::gateway::{self, Gateway, Config, TcpConnector, AdapterReset};


/// relay mpd commands between the remote control radio adapter and a music player daemon
#[derive(Parser, Debug)]
#[command(name = "mpdtool", version)]
struct Cli {
    /// serial device the adapter is tethered to
    serial_device: PathBuf,
    /// host running mpd
    host: String,
    /// tcp port of mpd
    port: u16,
    /// baud rate of the serial tether
    #[arg(long, default_value = "38400")]
    baud: u32,
    /// seconds without command before the remote is considered silent
    #[arg(long, default_value = "61")]
    idle_timeout: u64,
    /// milliseconds allowed for mpd to connect and greet
    #[arg(long, default_value = "1000")]
    greeting_timeout: u64,
    /// shell command resetting the adapter after repeated silences
    #[arg(long)]
    reset_command: Option<String>,
}

/// resets the adapter by running an external program
struct CommandReset(Option<String>);

impl AdapterReset for CommandReset {
    async fn reset(&mut self) -> io::Result<()> {
        let Some(command) = &self.0
            else {return ().reset().await};
        info!("running reset command: {}", command);
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status().await?;
        if !status.success() {
            return Err(io::Error::other(format!("reset command exited with {}", status)));
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            error!("failed to create runtime: {}", error);
            return ExitCode::FAILURE;
        },
    };
    runtime.block_on(async move {
        let serial = match gateway::open_serial(&cli.serial_device, cli.baud) {
            Ok(serial) => serial,
            Err(error) => {
                error!("cannot open {}: {}", cli.serial_device.display(), error);
                return ExitCode::FAILURE;
            },
        };
        info!("tethered to {} at {} baud, mpd at {}:{}", cli.serial_device.display(), cli.baud, cli.host, cli.port);

        let config = Config {
            idle_timeout: Duration::from_secs(cli.idle_timeout),
            greeting_timeout: Duration::from_millis(cli.greeting_timeout),
            .. Default::default()
        };
        let mut gateway = Gateway::new(
            serial,
            TcpConnector::new(cli.host, cli.port),
            CommandReset(cli.reset_command),
            config,
            );
        let Err(error) = gateway.run().await;
        error!("gateway stopped: {}", error);
        ExitCode::FAILURE
    })
}
