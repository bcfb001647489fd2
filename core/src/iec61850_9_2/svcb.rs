//! Sampled Value Control Block: the configuration record for one stream.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::common::{ConfigError, SmpSynch, SvDataType, DEFAULT_APP_ID, DEFAULT_SMP_RATE};
use super::mac::MacAddress;

/// Default scaling: primary amperes are carried as milliamp counts.
pub const CURRENT_SCALING_DEFAULT: i32 = 1000;
/// Default scaling: primary volts are carried as 10 mV counts.
pub const VOLTAGE_SCALING_DEFAULT: i32 = 100;

/// Samples per nominal power-system cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplesPerPeriod {
    #[default]
    S80,
    S256,
}

impl SamplesPerPeriod {
    pub const fn count(self) -> u16 {
        match self {
            SamplesPerPeriod::S80 => 80,
            SamplesPerPeriod::S256 => 256,
        }
    }
}

/// Nominal signal frequency, stored in tenths of a hertz as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignalFrequency {
    /// 16.7 Hz (railway traction grids).
    Hz16_7,
    Hz25,
    #[default]
    Hz50,
    Hz60,
}

impl SignalFrequency {
    pub const fn deci_hertz(self) -> u16 {
        match self {
            SignalFrequency::Hz16_7 => 167,
            SignalFrequency::Hz25 => 250,
            SignalFrequency::Hz50 => 500,
            SignalFrequency::Hz60 => 600,
        }
    }

    pub fn hertz(self) -> f64 {
        self.deci_hertz() as f64 / 10.0
    }
}

impl fmt::Display for SignalFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hertz())
    }
}

/// Configuration for one SV stream. The `name` doubles as the on-wire
/// svID. Fields are public; `validate` is the gate the publisher and
/// subscriber factories run before using a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledValueControlBlock {
    pub name: String,
    pub destination: MacAddress,
    pub app_id: u16,
    pub smp_rate: u16,
    pub data_set: String,
    pub conf_rev: u32,
    pub smp_synch: SmpSynch,
    /// 0 disables the 802.1Q tag.
    pub vlan_id: u16,
    pub user_priority: u8,
    pub simulate: bool,
    pub samples_per_period: SamplesPerPeriod,
    pub signal_frequency: SignalFrequency,
    pub gm_identity: Option<[u8; 8]>,
    pub data_type: SvDataType,
    pub current_scaling: i32,
    pub voltage_scaling: i32,
}

impl SampledValueControlBlock {
    pub fn new(name: impl Into<String>) -> Self {
        SampledValueControlBlock {
            name: name.into(),
            destination: MacAddress::sv_multicast_base(),
            app_id: DEFAULT_APP_ID,
            smp_rate: DEFAULT_SMP_RATE,
            data_set: String::new(),
            conf_rev: 1,
            smp_synch: SmpSynch::None,
            vlan_id: 0,
            user_priority: 4,
            simulate: false,
            samples_per_period: SamplesPerPeriod::default(),
            signal_frequency: SignalFrequency::default(),
            gm_identity: None,
            data_type: SvDataType::default(),
            current_scaling: CURRENT_SCALING_DEFAULT,
            voltage_scaling: VOLTAGE_SCALING_DEFAULT,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || self.name.len() > super::common::SV_ID_WIRE_LENGTH
            || !self.name.chars().all(|c| c.is_ascii_graphic() || c == ' ')
        {
            return Err(ConfigError::InvalidSvId(self.name.clone()));
        }
        if !(super::common::SV_APP_ID_MIN..=super::common::SV_APP_ID_MAX).contains(&self.app_id) {
            return Err(ConfigError::InvalidAppId(self.app_id));
        }
        if !(1..=7).contains(&self.user_priority) {
            return Err(ConfigError::InvalidUserPriority(self.user_priority));
        }
        if self.vlan_id > 0x0FFF {
            return Err(ConfigError::InvalidVlanId(self.vlan_id));
        }
        if self.smp_rate == 0 {
            return Err(ConfigError::InvalidSmpRate(self.smp_rate));
        }
        Ok(())
    }
}
