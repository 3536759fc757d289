//! Command-line front end for `dtu_client`: one subcommand per typed
//! `DtuClient` operation, `--host`/`--local-addr` to build the
//! `DeviceEndpoint`, `--as-json` to print the decoded response as JSON
//! instead of `{:#?}`, and `--disable-interactive` to suppress the one
//! confirmation prompt (firmware update to a non-default URL).

mod cli;

use std::io::{self, Write};
use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use dtu_client::{DeviceEndpoint, DtuClient};

use cli::{Cli, Command};

fn init_logging() {
    let level = std::env::var("LOGLEVEL").unwrap_or_else(|_| "INFO".to_string());
    let filter = match level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn build_endpoint(cli: &Cli) -> Result<DeviceEndpoint> {
    let mut endpoint = DeviceEndpoint::new(cli.host.clone());

    if let Some(local_addr) = &cli.local_addr {
        let addr: SocketAddr = local_addr
            .parse()
            .with_context(|| format!("invalid --local-addr value {local_addr:?}"))?;
        endpoint = endpoint.with_local_addr(addr);
    }

    if let Some(enc_rand_hex) = &cli.enc_rand {
        let bytes = hex::decode(enc_rand_hex).with_context(|| "--enc-rand must be 32 hex characters (16 bytes)")?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("--enc-rand must decode to exactly 16 bytes"))?;
        endpoint = endpoint.with_encryption(arr);
    }

    Ok(endpoint)
}

/// Prompts the operator for an explicit "yes" before sending a
/// firmware-update request with a non-default URL. Suppressed entirely
/// by `--disable-interactive`.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "YES"))
}

fn print_result<T: std::fmt::Debug + serde::Serialize>(value: Option<T>, as_json: bool) -> ExitCode {
    match value {
        Some(v) if as_json => {
            match serde_json::to_string_pretty(&v) {
                Ok(s) => println!("{s}"),
                Err(e) => {
                    eprintln!("failed to serialize response: {e}");
                    return ExitCode::from(2);
                }
            }
            ExitCode::SUCCESS
        }
        Some(v) => {
            println!("{v:#?}");
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("no response from device");
            ExitCode::from(2)
        }
    }
}

fn main() -> ExitCode {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let as_json = cli.as_json;
    let disable_interactive = cli.disable_interactive;
    let endpoint = build_endpoint(&cli)?;
    let client = DtuClient::new(endpoint);

    let code = match cli.command {
        Command::Heartbeat => print_result(client.heartbeat(), as_json),
        Command::RealData => print_result(client.real_data(), as_json),
        Command::RealDataNew => print_result(client.real_data_new(), as_json),
        Command::Config => print_result(client.get_config(), as_json),
        Command::SetWifi { ssid, password } => {
            let base = client.get_config().context("could not read current config before writing wifi settings")?;
            print_result(client.set_wifi(&base, &ssid, &password), as_json)
        }
        Command::NetworkInfo => print_result(client.network_info(), as_json),
        Command::AppInfo => print_result(client.app_information_data(), as_json),
        Command::HistPower { day } => print_result(client.historical_power(day), as_json),
        Command::SetPowerLimit { percent } => print_result(client.set_power_limit(percent)?, as_json),
        Command::AlarmList => print_result(client.alarm_list(), as_json),
        Command::FirmwareUpdate { url } => {
            let is_default = url.is_none();
            if !is_default && !disable_interactive {
                let target = url.as_deref().unwrap_or(dtu_client::FIRMWARE_DEFAULT_URL);
                if !confirm(&format!("Send firmware update from non-default URL {target}?"))? {
                    bail!("firmware update cancelled by operator");
                }
            }
            print_result(client.firmware_update(url.as_deref()), as_json)
        }
        Command::Reboot => print_result(client.reboot(), as_json),
        Command::InverterOn { serial } => {
            let refs: Vec<&str> = serial.iter().map(String::as_str).collect();
            print_result(client.inverter_on(&refs)?, as_json)
        }
        Command::InverterOff { serial } => {
            let refs: Vec<&str> = serial.iter().map(String::as_str).collect();
            print_result(client.inverter_off(&refs)?, as_json)
        }
        Command::GatewayInfo { dtu_sn } => print_result(client.gateway_info(dtu_sn), as_json),
        Command::GatewayNetInfo { dtu_sn } => print_result(client.gateway_net_info(dtu_sn), as_json),
        Command::EsRegistry { dtu_sn } => print_result(client.es_registry(dtu_sn), as_json),
        Command::EsData { dtu_sn } => print_result(client.es_data(dtu_sn), as_json),
        Command::EsSetWorkingMode {
            dtu_sn,
            battery_sn,
            mode,
            tariff_windows,
        } => {
            let mode = dtu_core::catalog::BmsWorkingMode::from_i32(mode)
                .ok_or_else(|| anyhow::anyhow!("working mode must be 1..=8, got {mode}"))?;
            let tariff_windows = tariff_windows
                .iter()
                .map(|w| parse_tariff_window(w))
                .collect::<Result<Vec<_>>>()?;
            print_result(client.es_set_working_mode(dtu_sn, battery_sn, mode, tariff_windows)?, as_json)
        }
    };

    Ok(code)
}

/// Parses a `--tariff-window type:start_minute:end_minute` argument.
fn parse_tariff_window(raw: &str) -> Result<dtu_core::proto::TariffWindow> {
    let mut parts = raw.splitn(3, ':');
    let (Some(tariff_type), Some(start_minute), Some(end_minute), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("--tariff-window must be TYPE:START:END, got {raw:?}");
    };

    Ok(dtu_core::proto::TariffWindow {
        tariff_type: tariff_type
            .parse()
            .with_context(|| format!("invalid tariff type in {raw:?}"))?,
        start_minute: start_minute
            .parse()
            .with_context(|| format!("invalid start minute in {raw:?}"))?,
        end_minute: end_minute
            .parse()
            .with_context(|| format!("invalid end minute in {raw:?}"))?,
    })
}
