use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use nanomodem_client::StopSignal;
use nanomodem_modem::{
    DynModem, LinkSettings, ModemModel, ModemRegistry, NetworkProtocol, SimulatedConfig,
    SimulatedModem,
};

use crate::exit::{modem_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod models;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the messaging control loop until Ctrl-C or --duration.
    Run(RunArgs),
    /// Send a payload as a chunked large transfer.
    Send(SendArgs),
    /// List known modem models.
    Models(ModelsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Models(args) => models::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Network variant reported by the simulated modem.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum NetworkArg {
    Idp,
    Ogx,
}

impl From<NetworkArg> for NetworkProtocol {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Idp => NetworkProtocol::Idp,
            NetworkArg::Ogx => NetworkProtocol::Ogx,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ModemArgs {
    /// Modem model to drive.
    #[arg(
        long,
        env = "NANOMODEM_MODEL",
        default_value = "simulated",
        value_parser = parse_model
    )]
    pub model: ModemModel,
    /// Serial device the modem is attached to.
    #[arg(long, env = "NANOMODEM_PORT", default_value = "/dev/ttyUSB0")]
    pub port: String,
    /// Serial baud rate.
    #[arg(long, env = "NANOMODEM_BAUDRATE", default_value_t = 9600)]
    pub baudrate: u32,
    /// Network reported by the simulated modem.
    #[arg(long, env = "NANOMODEM_SIM_NETWORK", value_enum, default_value = "ogx")]
    pub sim_network: NetworkArg,
}

impl ModemArgs {
    pub fn link(&self) -> LinkSettings {
        LinkSettings {
            port: self.port.clone(),
            baudrate: self.baudrate,
        }
    }

    /// Build the modem capability for the selected model.
    pub fn build(&self) -> CliResult<DynModem> {
        let mut registry = ModemRegistry::with_builtin();
        let network = NetworkProtocol::from(self.sim_network);
        registry.register(ModemModel::Simulated, move |_| {
            let config = SimulatedConfig {
                network,
                ..SimulatedConfig::default()
            };
            Ok(Box::new(SimulatedModem::new(config)) as DynModem)
        });
        registry
            .create(self.model, &self.link())
            .map_err(|err| modem_error("modem setup failed", err))
    }
}

fn parse_model(input: &str) -> Result<ModemModel, String> {
    ModemModel::from_name(input).ok_or_else(|| {
        let known: Vec<&str> = ModemModel::ALL.iter().map(|model| model.name()).collect();
        format!("unknown model {input:?} (known: {})", known.join(", "))
    })
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub modem: ModemArgs,
    /// Heartbeat interval in seconds; 0 waits for a remote reconfiguration.
    #[arg(
        long,
        env = "NANOMODEM_HEARTBEAT_INTERVAL",
        default_value_t = 0,
        value_parser = clap::value_parser!(u32).range(0..=86_400)
    )]
    pub heartbeat_interval: u32,
    /// Minimum time between active event mask polls (e.g. 5s, 500ms).
    #[arg(long, env = "NANOMODEM_MASK_POLL_INTERVAL", default_value = "5s")]
    pub mask_poll_interval: String,
    /// Time between acquisition summaries.
    #[arg(long, env = "NANOMODEM_SUMMARY_INTERVAL", default_value = "30s")]
    pub summary_interval: String,
    /// Pause after an idle tick.
    #[arg(long, env = "NANOMODEM_IDLE_PAUSE", default_value = "50ms")]
    pub idle_pause: String,
    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
    /// Do not drain leftover message queues on the first tick.
    #[arg(long)]
    pub no_queue_sweep: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["file", "size"])))]
pub struct SendArgs {
    #[command(flatten)]
    pub modem: ModemArgs,
    /// Read the payload from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Send a generated test pattern of this many bytes.
    #[arg(long)]
    pub size: Option<usize>,
    /// Data bytes per chunk. Defaults to the network's maximum.
    #[arg(long, env = "NANOMODEM_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,
    /// Minimum time between completion polls.
    #[arg(long, default_value = "5s")]
    pub poll_interval: String,
    /// Sleep between completion checks.
    #[arg(long, default_value = "1s")]
    pub wait_step: String,
}

#[derive(Args, Debug, Default)]
pub struct ModelsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Raise `stop` on Ctrl-C.
pub fn install_ctrlc_handler(stop: StopSignal) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use nanomodem_modem::SatelliteModem;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn model_names_parse_case_insensitively() {
        assert_eq!(parse_model("Simulated"), Ok(ModemModel::Simulated));
        assert!(parse_model("iridium").unwrap_err().contains("quectel-cc200a"));
    }

    #[test]
    fn simulated_modem_reports_selected_network() {
        let args = ModemArgs {
            model: ModemModel::Simulated,
            port: "/dev/null".to_string(),
            baudrate: 9600,
            sim_network: NetworkArg::Idp,
        };
        let mut modem = args.build().expect("simulated modem should build");
        modem.connect().unwrap();
        assert_eq!(modem.get_network().unwrap(), NetworkProtocol::Idp);
    }

    #[test]
    fn unregistered_model_is_a_usage_error() {
        let args = ModemArgs {
            model: ModemModel::SkywaveSt2Ogx,
            port: "/dev/null".to_string(),
            baudrate: 9600,
            sim_network: NetworkArg::Ogx,
        };
        let err = args.build().err().expect("no vendor registered");
        assert_eq!(err.code, USAGE);
    }
}
