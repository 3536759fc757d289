//! `DtuClient`: the stable, typed high-level API. Each public method
//! populates the small set of request fields every operation needs
//! (current time, the fixed `offset = 28800`, `tid`, command-specific
//! scalars), hands the serialized payload to the request engine, and
//! decodes the reply as one synchronous round trip.

use dtu_core::catalog::{self, BmsWorkingMode, EncryptionPolicy};
use dtu_core::FrameError;
use dtu_core::proto::{
    AppGetHistPowerReqDto, AppGetHistPowerResDto, AppInfoDataReqDto, AppInfoDataResDto, CommandReqDto, CommandResDto,
    EsDataReqDto, EsDataResDto, EsRegReqDto, EsRegResDto, EsUserSetReqDto, EsUserSetResDto, GetConfigReqDto,
    GetConfigResDto, GwInfoReqDto, GwInfoResDto, GwNetInfoReqDto, GwNetInfoResDto, HbReqDto, HbResDto,
    NetworkInfoReqDto, NetworkInfoResDto, RealDataNewReqDto, RealDataNewResDto, RealDataReqDto, RealDataResDto,
    SetConfigReqDto, SetConfigResDto, TariffWindow,
};

use crate::endpoint::{ConnectionState, DeviceEndpoint};
use crate::engine::RequestEngine;
use crate::error::ClientError;
use crate::paging;

/// Fixed +08:00 offset baked into the protocol; not a
/// local-time conversion, emitted regardless of the host's timezone.
pub const TIME_OFFSET_SECONDS: i32 = 28800;

/// "number" parameter used for aggregate extended-frame reads; per-item
/// reads use 1 instead of the default 255.
const AGGREGATE_EXTENDED_NUMBER: u16 = 0x00FF;
const PER_ITEM_EXTENDED_NUMBER: u16 = 1;

/// Hard-coded default firmware URL; the CLI lets the caller override it
/// but preserves the trailing `\r` terminator either way.
pub const FIRMWARE_DEFAULT_URL: &str = "http://fwupdate.hoymiles.com/cfs/bin/2311/06/,1488725943932555264.bin";

fn now_epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

fn now_ymd_hms() -> Vec<u8> {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string().into_bytes()
}

/// Parses a hex-string inverter/micro-inverter serial into its 64-bit
/// wire representation.
pub fn parse_serial_hex(serial: &str) -> Result<u64, ClientError> {
    u64::from_str_radix(serial, 16).map_err(|_| ClientError::InvalidSerialNumber(serial.to_string()))
}

/// Decodes a plaintext response payload, logging the spec's Decode error
/// taxonomy at DEBUG rather than silently swallowing it.
fn decode_payload<Res: prost::Message + Default>(raw: &[u8]) -> Option<Res> {
    match Res::decode(raw) {
        Ok(message) => Some(message),
        Err(e) => {
            log::debug!("{}", FrameError::Decode(e.to_string()));
            None
        }
    }
}

pub struct DtuClient {
    engine: RequestEngine,
}

impl DtuClient {
    pub fn new(endpoint: DeviceEndpoint) -> Self {
        Self {
            engine: RequestEngine::new(endpoint),
        }
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        self.engine.endpoint()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.engine.connection_state()
    }

    fn is_encrypt_exempt(command_id: u16) -> bool {
        catalog::by_command_id(command_id).is_none_or(|d| matches!(d.encryption, EncryptionPolicy::Exempt))
    }

    fn send_standard<Req, Res>(&self, command_id: u16, request: &Req) -> Option<Res>
    where
        Req: prost::Message,
        Res: prost::Message + Default,
    {
        let payload = request.encode_to_vec();
        let raw = self.engine.execute_standard(command_id, &payload, Self::is_encrypt_exempt(command_id))?;
        decode_payload(&raw)
    }

    fn send_extended<Req, Res>(&self, command_id: u16, dtu_serial_number: u64, number: u16, request: &Req) -> Option<Res>
    where
        Req: prost::Message,
        Res: prost::Message + Default,
    {
        let payload = request.encode_to_vec();
        let raw = self.engine.execute_extended(command_id, dtu_serial_number, number, &payload)?;
        decode_payload(&raw)
    }

    /// Reads a v1 real-data telemetry snapshot.
    pub fn real_data(&self) -> Option<RealDataReqDto> {
        let request = RealDataResDto {
            time_ymd_hms: now_ymd_hms(),
            time: now_epoch_seconds(),
            offset: TIME_OFFSET_SECONDS,
            error_code: 0,
        };
        self.send_standard(catalog::CMD_REAL_DATA_RES_DTO, &request)
    }

    /// Reads the newer, paginated real-data telemetry format, assembling
    /// every advertised continuation page.
    pub fn real_data_new(&self) -> Option<RealDataNewReqDto> {
        let first = self.fetch_real_data_new_page(0)?;
        paging::assemble(first, |page| self.fetch_real_data_new_page(page))
    }

    fn fetch_real_data_new_page(&self, cp: i32) -> Option<RealDataNewReqDto> {
        let request = RealDataNewResDto {
            time_ymd_hms: now_ymd_hms(),
            offset: TIME_OFFSET_SECONDS,
            time: now_epoch_seconds(),
            cp,
        };
        self.send_standard(catalog::CMD_REAL_RES_DTO, &request)
    }

    pub fn get_config(&self) -> Option<GetConfigReqDto> {
        let request = GetConfigResDto {
            offset: TIME_OFFSET_SECONDS,
            time: now_epoch_seconds(),
        };
        self.send_standard(catalog::CMD_GET_CONFIG, &request)
    }

    /// Writes a new configuration by copying every field of a prior
    /// `get_config()` reply and applying `mutate` to override the
    /// fields actually being changed — grounded in
    /// `hoymiles_wifi/dtu.py`'s `initialize_set_config`, which performs
    /// the same full-field copy before flipping the fields a given
    /// write operation cares about.
    pub fn set_config(&self, base: &GetConfigReqDto, mutate: impl FnOnce(&mut SetConfigResDto)) -> Option<SetConfigReqDto> {
        let mut request = set_config_request_from(base);
        mutate(&mut request);
        request.time = now_epoch_seconds();
        request.offset = TIME_OFFSET_SECONDS;
        self.send_standard(catalog::CMD_SET_CONFIG, &request)
    }

    /// Convenience wrapper over `set_config` for the common "change the
    /// WiFi credentials" write.
    pub fn set_wifi(&self, base: &GetConfigReqDto, ssid: &str, password: &str) -> Option<SetConfigReqDto> {
        self.set_config(base, |req| {
            req.wifi_ssid = ssid.as_bytes().to_vec();
            req.wifi_password = password.as_bytes().to_vec();
        })
    }

    pub fn network_info(&self) -> Option<NetworkInfoReqDto> {
        let request = NetworkInfoResDto {
            offset: TIME_OFFSET_SECONDS,
            time: now_epoch_seconds(),
        };
        self.send_standard(catalog::CMD_NETWORK_INFO_RES, &request)
    }

    pub fn app_information_data(&self) -> Option<AppInfoDataReqDto> {
        let request = AppInfoDataResDto {
            time_ymd_hms: now_ymd_hms(),
            offset: TIME_OFFSET_SECONDS,
            time: now_epoch_seconds(),
        };
        self.send_standard(catalog::CMD_APP_INFO_DATA_RES_DTO, &request)
    }

    /// Deprecated alias kept for callers migrating from the older name,
    /// mirroring `hoymiles_wifi/inverter.py`'s `update_state` ->
    /// `get_real_data_hms` deprecated-delegation pattern.
    #[deprecated(note = "use app_information_data instead")]
    pub fn get_information_data(&self) -> Option<AppInfoDataReqDto> {
        self.app_information_data()
    }

    /// Reads historical power data for `requested_day` (days before
    /// today), assembling every continuation page.
    pub fn historical_power(&self, requested_day: i32) -> Option<AppGetHistPowerReqDto> {
        let first = self.fetch_historical_power_page(requested_day, 0)?;
        paging::assemble(first, |page| self.fetch_historical_power_page(requested_day, page))
    }

    fn fetch_historical_power_page(&self, requested_day: i32, cp: i32) -> Option<AppGetHistPowerReqDto> {
        let request = AppGetHistPowerResDto {
            control_point: 0,
            offset: TIME_OFFSET_SECONDS,
            requested_time: now_epoch_seconds(),
            requested_day,
            cp,
        };
        self.send_standard(catalog::CMD_APP_GET_HIST_POWER_RES, &request)
    }

    fn send_action(&self, command_id: u16, action: i32, data: Vec<u8>, mi_to_sn: Vec<u64>) -> Option<CommandReqDto> {
        let request = CommandResDto {
            time: now_epoch_seconds(),
            action,
            package_nub: 1,
            tid: now_epoch_seconds(),
            data,
            dev_kind: 0,
            mi_to_sn,
        };
        self.send_standard(command_id, &request)
    }

    /// Sets the inverter power limit as a percent (0..=100). The
    /// transport multiplies by 10 and emits `"A:<value>,B:0,C:0\r"`
    /// on the wire.
    pub fn set_power_limit(&self, percent: u32) -> Result<Option<CommandReqDto>, ClientError> {
        if percent > 100 {
            return Err(ClientError::InvalidPowerLimit(percent));
        }
        let data = format!("A:{},B:0,C:0\r", percent * 10).into_bytes();
        Ok(self.send_action(catalog::CMD_COMMAND_RES_DTO, catalog::CMD_ACTION_LIMIT_POWER, data, vec![]))
    }

    pub fn alarm_list(&self) -> Option<CommandReqDto> {
        self.send_action(catalog::CMD_COMMAND_RES_DTO, catalog::CMD_ACTION_ALARM_LIST, vec![], vec![])
    }

    /// Requests a firmware update from `url`, or the hard-coded default
    /// if `None`. The terminator `\r` is always preserved.
    pub fn firmware_update(&self, url: Option<&str>) -> Option<CommandReqDto> {
        let mut data = url.unwrap_or(FIRMWARE_DEFAULT_URL).as_bytes().to_vec();
        data.push(b'\r');
        self.send_action(catalog::CMD_CLOUD_COMMAND_RES_DTO, catalog::CMD_ACTION_DTU_UPGRADE, data, vec![])
    }

    pub fn reboot(&self) -> Option<CommandReqDto> {
        self.send_action(catalog::CMD_CLOUD_COMMAND_RES_DTO, catalog::CMD_ACTION_DTU_REBOOT, vec![], vec![])
    }

    /// Restarts the given micro-inverters (by hex serial number).
    pub fn inverter_on(&self, serials: &[&str]) -> Result<Option<CommandReqDto>, ClientError> {
        let mi_to_sn = serials.iter().map(|s| parse_serial_hex(s)).collect::<Result<Vec<_>, _>>()?;
        Ok(self.send_action(catalog::CMD_CLOUD_COMMAND_RES_DTO, catalog::CMD_ACTION_MI_START, vec![], mi_to_sn))
    }

    /// Shuts down the given micro-inverters (by hex serial number).
    pub fn inverter_off(&self, serials: &[&str]) -> Result<Option<CommandReqDto>, ClientError> {
        let mi_to_sn = serials.iter().map(|s| parse_serial_hex(s)).collect::<Result<Vec<_>, _>>()?;
        Ok(self.send_action(catalog::CMD_CLOUD_COMMAND_RES_DTO, catalog::CMD_ACTION_MI_SHUTDOWN, vec![], mi_to_sn))
    }

    pub fn heartbeat(&self) -> Option<HbReqDto> {
        let request = HbResDto {
            time_ymd_hms: now_ymd_hms(),
            offset: TIME_OFFSET_SECONDS,
            time: now_epoch_seconds(),
        };
        self.send_standard(catalog::CMD_HB_RES_DTO, &request)
    }

    pub fn gateway_info(&self, dtu_serial_number: u64) -> Option<GwInfoReqDto> {
        self.send_extended(catalog::CMD_GW_INFO_RES_DTO, dtu_serial_number, AGGREGATE_EXTENDED_NUMBER, &GwInfoResDto {})
    }

    pub fn gateway_net_info(&self, dtu_serial_number: u64) -> Option<GwNetInfoReqDto> {
        self.send_extended(catalog::CMD_GW_NET_INFO_RES, dtu_serial_number, AGGREGATE_EXTENDED_NUMBER, &GwNetInfoResDto {})
    }

    pub fn es_registry(&self, dtu_serial_number: u64) -> Option<EsRegReqDto> {
        self.send_extended(catalog::CMD_ES_REG_RES_DTO, dtu_serial_number, AGGREGATE_EXTENDED_NUMBER, &EsRegResDto {})
    }

    pub fn es_data(&self, dtu_serial_number: u64) -> Option<EsDataReqDto> {
        self.send_extended(catalog::CMD_ES_DATA_DTO, dtu_serial_number, PER_ITEM_EXTENDED_NUMBER, &EsDataResDto {})
    }

    /// Writes the BMS working mode for the battery addressed by
    /// `battery_sn`. Economic mode requires at least
    /// one tariff window.
    pub fn es_set_working_mode(
        &self,
        dtu_serial_number: u64,
        battery_sn: u64,
        mode: BmsWorkingMode,
        tariff_windows: Vec<TariffWindow>,
    ) -> Result<Option<EsUserSetReqDto>, ClientError> {
        if mode == BmsWorkingMode::Economic && tariff_windows.is_empty() {
            return Err(ClientError::MissingTariffWindows);
        }
        let request = EsUserSetResDto {
            battery_sn,
            working_mode: mode as i32,
            tariff_windows,
        };
        Ok(self.send_extended(catalog::CMD_ES_USER_SET_RES_DTO, dtu_serial_number, PER_ITEM_EXTENDED_NUMBER, &request))
    }
}

fn set_config_request_from(base: &GetConfigReqDto) -> SetConfigResDto {
    SetConfigResDto {
        lock_password: base.lock_password,
        lock_time: base.lock_time,
        limit_power_mypower: base.limit_power_mypower,
        zero_export_433_addr: base.zero_export_433_addr.clone(),
        zero_export_enable: base.zero_export_enable,
        netmode_select: base.netmode_select,
        channel_select: base.channel_select,
        server_send_time: base.server_send_time,
        serverport: base.serverport,
        apn_set: base.apn_set,
        meter_kind: base.meter_kind,
        meter_interface: base.meter_interface,
        wifi_ssid: base.wifi_ssid.clone(),
        wifi_password: base.wifi_password.clone(),
        server_domain_name: base.server_domain_name.clone(),
        inv_type: base.inv_type,
        dtu_sn: base.dtu_sn,
        access_model: base.access_model,
        mac_0: base.mac_0,
        mac_1: base.mac_1,
        mac_2: base.mac_2,
        mac_3: base.mac_3,
        mac_4: base.mac_4,
        mac_5: base.mac_5,
        dhcp_switch: base.dhcp_switch,
        ip_addr_0: base.ip_addr_0,
        ip_addr_1: base.ip_addr_1,
        ip_addr_2: base.ip_addr_2,
        ip_addr_3: base.ip_addr_3,
        subnet_mask_0: base.subnet_mask_0,
        subnet_mask_1: base.subnet_mask_1,
        subnet_mask_2: base.subnet_mask_2,
        subnet_mask_3: base.subnet_mask_3,
        default_gateway_0: base.default_gateway_0,
        default_gateway_1: base.default_gateway_1,
        default_gateway_2: base.default_gateway_2,
        default_gateway_3: base.default_gateway_3,
        apn_name: base.apn_name.clone(),
        apn_password: base.apn_password.clone(),
        sub1g_sweep_switch: base.sub1g_sweep_switch,
        sub1g_work_channel: base.sub1g_work_channel,
        cable_dns_0: base.cable_dns_0,
        cable_dns_1: base.cable_dns_1,
        cable_dns_2: base.cable_dns_2,
        cable_dns_3: base.cable_dns_3,
        dtu_ap_ssid: base.dtu_ap_ssid.clone(),
        dtu_ap_pass: base.dtu_ap_pass.clone(),
        time: 0,
        offset: 0,
        app_page: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serial_hex_accepts_hex_string() {
        assert_eq!(parse_serial_hex("114172123456").unwrap(), 0x114172123456);
    }

    #[test]
    fn parse_serial_hex_rejects_garbage() {
        assert!(matches!(parse_serial_hex("not-hex"), Err(ClientError::InvalidSerialNumber(_))));
    }

    #[test]
    fn set_power_limit_rejects_out_of_range() {
        let client = DtuClient::new(DeviceEndpoint::new("127.0.0.1"));
        assert_eq!(client.set_power_limit(101), Err(ClientError::InvalidPowerLimit(101)));
    }

    #[test]
    fn es_set_working_mode_requires_tariff_windows_for_economic() {
        let client = DtuClient::new(DeviceEndpoint::new("127.0.0.1"));
        let result = client.es_set_working_mode(0x1122334455667788, 1, BmsWorkingMode::Economic, vec![]);
        assert_eq!(result, Err(ClientError::MissingTariffWindows));
    }
}
