mod publish;
mod subscribe;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sv")]
#[command(about = "IEC 61850-9-2 Sampled Values publisher and subscriber demos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Publish a synthesised three-phase sample stream.
    Publish {
        /// Egress interface (empty for auto-detect).
        #[arg(long, default_value = "")]
        interface: String,

        #[arg(long, default_value = "SV01")]
        svid: String,

        #[arg(long, default_value_t = 0x4000)]
        appid: u16,

        /// 0 disables the 802.1Q tag.
        #[arg(long, default_value_t = 0)]
        vlan: u16,

        /// Sample rate in Hz.
        #[arg(long, default_value_t = 4000)]
        rate: u16,

        /// How long to publish, in seconds.
        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        /// RMS phase current in amperes.
        #[arg(long, default_value_t = 100.0)]
        current: f64,

        /// RMS phase voltage in volts.
        #[arg(long, default_value_t = 230.0)]
        voltage: f64,

        /// Inject a fault of this many amperes after half the run.
        #[arg(long)]
        fault_current: Option<f64>,
    },
    /// Capture SV frames and run them through differential protection.
    Subscribe {
        /// Capture interface (empty for auto-detect).
        #[arg(long, default_value = "")]
        interface: String,

        /// How long to listen, in seconds.
        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        /// Stats reporting interval in seconds.
        #[arg(long, default_value_t = 5.0)]
        stats_interval: f64,

        /// Differential instantaneous threshold in amperes.
        #[arg(long, default_value_t = 400.0)]
        inst_threshold: f64,

        /// Breaker overcurrent rating in amperes.
        #[arg(long, default_value_t = 500.0)]
        max_current: f64,
    },
}

fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    match args.command {
        Commands::Publish {
            interface,
            svid,
            appid,
            vlan,
            rate,
            duration,
            current,
            voltage,
            fault_current,
        } => publish::run(publish::PublishArgs {
            interface,
            svid,
            appid,
            vlan,
            rate,
            duration,
            current,
            voltage,
            fault_current,
        }),
        Commands::Subscribe {
            interface,
            duration,
            stats_interval,
            inst_threshold,
            max_current,
        } => subscribe::run(subscribe::SubscribeArgs {
            interface,
            duration,
            stats_interval,
            inst_threshold,
            max_current,
        }),
    }
}
