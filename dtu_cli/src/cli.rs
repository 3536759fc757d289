//! Argument schema for the `dtu` binary, kept separate from `main` in a
//! small `Args`/`Subcommand` derive module since this CLI has one
//! subcommand per catalog operation rather than a single fixed routine.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dtu", about = "Talk to a Hoymiles-style DTU gateway over its TCP protocol")]
pub struct Cli {
    /// Device hostname or IPv4 address.
    #[arg(long, global = true)]
    pub host: String,

    /// Local address to bind the outbound TCP socket to, e.g. "0.0.0.0:0".
    #[arg(long, global = true)]
    pub local_addr: Option<String>,

    /// 32-character hex string: the out-of-band AES-128-GCM shared secret
    /// (EncRand). When supplied, encrypt-exempt commands are still sent
    /// in the clear; everything else is sealed.
    #[arg(long, global = true)]
    pub enc_rand: Option<String>,

    /// Print the decoded response as JSON instead of Rust debug output.
    #[arg(long, global = true)]
    pub as_json: bool,

    /// Skip the confirmation prompt before a non-default firmware update.
    #[arg(long, global = true)]
    pub disable_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a heartbeat and print the device's reply.
    Heartbeat,
    /// Read a v1 real-data telemetry snapshot.
    RealData,
    /// Read the paginated real-data-new telemetry snapshot.
    RealDataNew,
    /// Read the device's current configuration.
    Config,
    /// Write new WiFi credentials (reads current config first, then writes).
    SetWifi { ssid: String, password: String },
    /// Read WiFi/RF network info.
    NetworkInfo,
    /// Read app-info-data (hardware/software version, encryption capability).
    AppInfo,
    /// Read historical power data for a given day offset (0 = today).
    HistPower { day: i32 },
    /// Set the inverter power limit as a percent (0..=100).
    SetPowerLimit { percent: u32 },
    /// Read the active alarm list.
    AlarmList,
    /// Trigger a firmware update, optionally from a non-default URL.
    FirmwareUpdate { url: Option<String> },
    /// Reboot the DTU gateway.
    Reboot,
    /// Restart (turn on) the given micro-inverters (hex serial numbers).
    InverterOn { serial: Vec<String> },
    /// Shut down (turn off) the given micro-inverters (hex serial numbers).
    InverterOff { serial: Vec<String> },
    /// Read extended-frame gateway info for the given DTU serial number.
    GatewayInfo { dtu_sn: u64 },
    /// Read extended-frame gateway network info.
    GatewayNetInfo { dtu_sn: u64 },
    /// Read the energy-storage (battery) registry.
    EsRegistry { dtu_sn: u64 },
    /// Read energy-storage (battery) telemetry.
    EsData { dtu_sn: u64 },
    /// Write a BMS working mode (1..=8) for a battery. Economic mode
    /// (2) requires at least one `--tariff-window`.
    EsSetWorkingMode {
        dtu_sn: u64,
        battery_sn: u64,
        mode: i32,
        /// A tariff window as `type:start_minute:end_minute`, e.g.
        /// "0:0:360" for tariff type 0 from minute 0 to minute 360.
        /// Repeatable; only consulted for Economic mode.
        #[arg(long = "tariff-window")]
        tariff_windows: Vec<String>,
    },
}
