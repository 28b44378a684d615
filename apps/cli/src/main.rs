use std::fmt;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nolo_core::client::NoloClient;
use nolo_core::config::FlasherConfig;
use nolo_core::discovery::DeviceDiscovery;
use nolo_core::events::{NoloEvent, NoloObserver};
use nolo_core::protocol::RdFlagSet;
use nolo_core::transport::{NusbHost, UsbDeviceHandle};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "NOLO maintenance tool for Nokia internet tablets", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log register writes instead of sending them
    #[arg(long, global = true)]
    simulate: bool,

    /// Load settings from a TOML file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show device identification, versions and register state
    Info,

    /// Boot the kernel ("update" as cmdline boots to update mode)
    Boot {
        /// Kernel command line
        cmdline: Option<String>,
    },

    /// Reboot the device
    Reboot,

    /// Show or replace the R&D flags
    RdFlags {
        /// New flag set, comma-separated (an empty list clears all flags)
        #[arg(long, value_name = "FLAGS")]
        set: Option<String>,
    },
}

/// Renders discovery progress as a replace-in-place status line.
struct ConsoleObserver;

impl NoloObserver for ConsoleObserver {
    fn on_event(&self, event: &NoloEvent) {
        match event {
            NoloEvent::ScanTick { spinner } => {
                eprint!("\r{:<60}", format!("Waiting for USB device... {spinner}"));
                let _ = std::io::stderr().flush();
            }
            NoloEvent::DeviceFound { summary, .. } => {
                eprintln!("\r{:<60}", format!("Found {summary}"));
            }
            NoloEvent::Setup { step } => {
                eprint!("\r{:<60}", format!("Setting up device ({step})"));
                let _ = std::io::stderr().flush();
            }
            NoloEvent::SessionOpened { .. } => {
                eprintln!("\r{:<60}", "USB device ready");
            }
        }
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting NOLO maintenance tool (nusb backend)...");

    if let Err(e) = run(args) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => FlasherConfig::load_from_file(path)?,
        None => FlasherConfig::default(),
    };
    let simulate = args.simulate || config.simulate;
    if simulate {
        info!("Simulation: register writes will be logged, not sent");
    }

    let mut discovery = DeviceDiscovery::with_observer(NusbHost::new(), Arc::new(ConsoleObserver));
    discovery.set_poll_interval(config.poll_interval());
    let session = discovery.discover_and_open()?;

    let mut client = NoloClient::with_simulation(session, simulate);
    client.initialize()?;

    match args.command {
        Commands::Info => print_info(&mut client),
        Commands::Boot { cmdline } => client.boot(cmdline.as_deref())?,
        Commands::Reboot => client.reboot()?,
        Commands::RdFlags { set: Some(list) } => {
            client.set_rd_flags(RdFlagSet::from_text(&list))?
        }
        Commands::RdFlags { set: None } => {
            println!("R&D flags: {}", flag_list(client.rd_flags()?));
        }
    }

    client.close();
    Ok(())
}

fn print_info<H: UsbDeviceHandle>(client: &mut NoloClient<H>) {
    report("Device", client.device_model());
    report("HW revision", client.hardware_revision());
    report("NOLO version", client.nolo_version());
    report("Kernel version", client.kernel_version());
    report("Software release", client.software_release());
    report("Content version", client.content_version());
    report("Root device", client.root_device());
    report("USB host mode", client.usb_host_mode().map(on_off));
    report("R&D mode", client.rd_mode().map(on_off));
    report("R&D flags", client.rd_flags().map(flag_list));
}

/// Print one labelled field; a field the device cannot answer is logged
/// and skipped rather than aborting the whole report.
fn report<T: fmt::Display>(label: &str, result: Result<T>) {
    match result {
        Ok(value) => println!("{label}: {value}"),
        Err(err) => warn!("{label}: {err}"),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

fn flag_list(flags: RdFlagSet) -> String {
    if flags.is_empty() {
        "<none>".to_string()
    } else {
        flags.to_string()
    }
}
