//! The command catalog: a pure data table mapping each operation to its
//! command id, frame layout, and encryption/paging properties. Kept as a
//! flat `&'static` table rather than a trait hierarchy or class per
//! command, since nothing here carries behavior.
//!
//! `CMD_HB_RES_DTO` (`0x0030`) is the one command id confirmed against a
//! real device; the remaining ids are assigned in catalog order. See
//! DESIGN.md.

/// Per-battery BMS working mode.
/// Valid range is 1..=8; `EsUserSetResDto.tariff_windows` only applies
/// when the mode is `Economic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BmsWorkingMode {
    SelfConsumption = 1,
    Economic = 2,
    Backup = 3,
    OffGrid = 4,
    ForceCharge = 5,
    ForceDischarge = 6,
    PeakShaving = 7,
    TimeOfUse = 8,
}

impl BmsWorkingMode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::SelfConsumption),
            2 => Some(Self::Economic),
            3 => Some(Self::Backup),
            4 => Some(Self::OffGrid),
            5 => Some(Self::ForceCharge),
            6 => Some(Self::ForceDischarge),
            7 => Some(Self::PeakShaving),
            8 => Some(Self::TimeOfUse),
            _ => None,
        }
    }
}

/// Which wire frame layout a command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayout {
    Standard,
    Extended,
}

/// Whether a standard-framed command is sent in the clear even when the
/// session is encrypted. The exempt set is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionPolicy {
    /// Sealed when the session is encrypted.
    FollowsSession,
    /// Always sent/received in the clear regardless of session state.
    Exempt,
    /// Not applicable: extended frames are never encrypted.
    NotApplicable,
}

/// Whether a reply to this command may advertise continuation pages
/// (see `dtu_client::paging`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    SinglePage,
    MultiPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub command_id: u16,
    pub layout: FrameLayout,
    pub encryption: EncryptionPolicy,
    pub paging: Paging,
}

pub const CMD_REAL_DATA_RES_DTO: u16 = 0x002b;
pub const CMD_REAL_RES_DTO: u16 = 0x002c;
pub const CMD_GET_CONFIG: u16 = 0x002f;
pub const CMD_SET_CONFIG: u16 = 0x0010;
pub const CMD_NETWORK_INFO_RES: u16 = 0x0011;
pub const CMD_APP_INFO_DATA_RES_DTO: u16 = 0x0012;
pub const CMD_APP_GET_HIST_POWER_RES: u16 = 0x0013;
pub const CMD_COMMAND_RES_DTO: u16 = 0x0014;
pub const CMD_CLOUD_COMMAND_RES_DTO: u16 = 0x0015;
pub const CMD_HB_RES_DTO: u16 = 0x0030;
pub const CMD_GW_INFO_RES_DTO: u16 = 0x0041;
pub const CMD_GW_NET_INFO_RES: u16 = 0x0042;
pub const CMD_ES_REG_RES_DTO: u16 = 0x0043;
pub const CMD_ES_DATA_DTO: u16 = 0x0044;
pub const CMD_ES_USER_SET_RES_DTO: u16 = 0x0045;

/// "Generic command" sub-action codes (`CMD_COMMAND_RES_DTO`): limit
/// power, alarm list. Assigned in source order; the upstream numeric
/// values were not available when this catalog was built. See DESIGN.md.
pub const CMD_ACTION_LIMIT_POWER: i32 = 0x01;
pub const CMD_ACTION_ALARM_LIST: i32 = 0x02;

/// "Cloud command" sub-action codes (the `CMD_CLOUD_COMMAND_RES_DTO`
/// row): firmware upgrade, reboot, inverter start/shutdown. Inverter
/// on/off rides this same channel and these same action codes per
/// `hoymiles_wifi/dtu.py`'s `async_turn_on_inverter`/
/// `async_turn_off_inverter` — there is no separate "turn on"/"turn off"
/// action distinct from Mi start/shutdown.
pub const CMD_ACTION_DTU_UPGRADE: i32 = 0x01;
pub const CMD_ACTION_DTU_REBOOT: i32 = 0x02;
pub const CMD_ACTION_MI_START: i32 = 0x03;
pub const CMD_ACTION_MI_SHUTDOWN: i32 = 0x04;

pub const CATALOG: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: "real_data",
        command_id: CMD_REAL_DATA_RES_DTO,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "real_data_new",
        command_id: CMD_REAL_RES_DTO,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::MultiPage,
    },
    CommandDescriptor {
        name: "get_config",
        command_id: CMD_GET_CONFIG,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::Exempt,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "set_config",
        command_id: CMD_SET_CONFIG,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::Exempt,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "network_info",
        command_id: CMD_NETWORK_INFO_RES,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "app_information_data",
        command_id: CMD_APP_INFO_DATA_RES_DTO,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::Exempt,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "historical_power",
        command_id: CMD_APP_GET_HIST_POWER_RES,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::MultiPage,
    },
    CommandDescriptor {
        name: "command",
        command_id: CMD_COMMAND_RES_DTO,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "cloud_command",
        command_id: CMD_CLOUD_COMMAND_RES_DTO,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "heartbeat",
        command_id: CMD_HB_RES_DTO,
        layout: FrameLayout::Standard,
        encryption: EncryptionPolicy::FollowsSession,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "gateway_info",
        command_id: CMD_GW_INFO_RES_DTO,
        layout: FrameLayout::Extended,
        encryption: EncryptionPolicy::NotApplicable,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "gateway_net_info",
        command_id: CMD_GW_NET_INFO_RES,
        layout: FrameLayout::Extended,
        encryption: EncryptionPolicy::NotApplicable,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "es_registry",
        command_id: CMD_ES_REG_RES_DTO,
        layout: FrameLayout::Extended,
        encryption: EncryptionPolicy::NotApplicable,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "es_data",
        command_id: CMD_ES_DATA_DTO,
        layout: FrameLayout::Extended,
        encryption: EncryptionPolicy::NotApplicable,
        paging: Paging::SinglePage,
    },
    CommandDescriptor {
        name: "es_user_set",
        command_id: CMD_ES_USER_SET_RES_DTO,
        layout: FrameLayout::Extended,
        encryption: EncryptionPolicy::NotApplicable,
        paging: Paging::SinglePage,
    },
];

pub fn by_name(name: &str) -> Option<&'static CommandDescriptor> {
    CATALOG.iter().find(|d| d.name == name)
}

pub fn by_command_id(command_id: u16) -> Option<&'static CommandDescriptor> {
    CATALOG.iter().find(|d| d.command_id == command_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_fifteen_operations() {
        assert_eq!(CATALOG.len(), 15);
    }

    #[test]
    fn heartbeat_command_id_matches_spec_scenario() {
        assert_eq!(CMD_HB_RES_DTO, 0x0030);
        assert_eq!(by_name("heartbeat").unwrap().command_id, 0x0030);
    }

    #[test]
    fn extended_commands_are_not_applicable_for_encryption() {
        for d in CATALOG.iter().filter(|d| d.layout == FrameLayout::Extended) {
            assert_eq!(d.encryption, EncryptionPolicy::NotApplicable);
        }
    }

    #[test]
    fn command_ids_are_unique() {
        let mut ids: Vec<u16> = CATALOG.iter().map(|d| d.command_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn bms_working_mode_round_trips() {
        for raw in 1..=8 {
            assert_eq!(BmsWorkingMode::from_i32(raw).map(|m| m as i32), Some(raw));
        }
        assert_eq!(BmsWorkingMode::from_i32(0), None);
        assert_eq!(BmsWorkingMode::from_i32(9), None);
    }
}
