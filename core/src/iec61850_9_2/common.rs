//! Shared protocol constants, enumerations and the quality bitfield.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EtherType assigned to IEC 61850-9-2 Sampled Values.
pub const SV_ETHER_TYPE: u16 = 0x88BA;
/// 802.1Q tag protocol identifier.
pub const VLAN_TPID: u16 = 0x8100;

/// APPID range reserved for SV streams.
pub const SV_APP_ID_MIN: u16 = 0x4000;
pub const SV_APP_ID_MAX: u16 = 0x7FFF;
pub const DEFAULT_APP_ID: u16 = 0x4000;

pub const DEFAULT_SMP_RATE: u16 = 4000;

/// Every ASDU carries four currents (A, B, C, neutral) and four voltages.
pub const VALUES_PER_ASDU: usize = 8;
/// Upper bound on ASDUs framed into one message.
pub const MAX_ASDUS_PER_MESSAGE: usize = 8;
/// Wire width of the NUL-padded svID field.
pub const SV_ID_WIRE_LENGTH: usize = 64;

/// Errors raised while parsing or emitting SV frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// EtherType is not 0x88BA; the frame belongs to another protocol.
    NotSampledValues,
    /// numASDUs outside [1, 8].
    InvalidAsduCount(u8),
    /// Fewer than eight (value, quality) pairs survived the read.
    InvalidValueCount(usize),
    /// The decoded ASDU failed its final validation.
    InvalidAsdu,
    /// The ASDU handed to the encoder failed its preconditions.
    InvalidEmitAsdu,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::NotSampledValues => write!(f, "not a Sampled Values frame"),
            FrameError::InvalidAsduCount(n) => write!(f, "invalid ASDU count: {}", n),
            FrameError::InvalidValueCount(n) => {
                write!(f, "invalid number of dataset values: {}", n)
            }
            FrameError::InvalidAsdu => write!(f, "decoded ASDU failed validation"),
            FrameError::InvalidEmitAsdu => write!(f, "ASDU rejected by encoder preconditions"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Errors raised when constructing or validating configuration records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidSvId(String),
    InvalidAppId(u16),
    InvalidUserPriority(u8),
    InvalidVlanId(u16),
    InvalidSmpRate(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSvId(id) => {
                write!(f, "svID must be 1..=64 printable characters, got {:?}", id)
            }
            ConfigError::InvalidAppId(id) => {
                write!(f, "APPID {:#06X} outside SV range [0x4000, 0x7FFF]", id)
            }
            ConfigError::InvalidUserPriority(p) => {
                write!(f, "user priority {} outside [1, 7]", p)
            }
            ConfigError::InvalidVlanId(v) => write!(f, "VLAN id {} exceeds 12 bits", v),
            ConfigError::InvalidSmpRate(r) => write!(f, "sample rate {} Hz is not usable", r),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Synchronisation source of the sample clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmpSynch {
    #[default]
    None,
    Local,
    Global,
}

impl SmpSynch {
    pub const fn as_u8(self) -> u8 {
        match self {
            SmpSynch::None => 0,
            SmpSynch::Local => 1,
            SmpSynch::Global => 2,
        }
    }

    /// Wire byte to enum. Out-of-range values are reported as `None` so a
    /// misconfigured publisher does not take the stream down; callers log
    /// the original byte.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SmpSynch::None),
            1 => Some(SmpSynch::Local),
            2 => Some(SmpSynch::Global),
            _ => None,
        }
    }
}

impl fmt::Display for SmpSynch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmpSynch::None => write!(f, "none"),
            SmpSynch::Local => write!(f, "local"),
            SmpSynch::Global => write!(f, "global"),
        }
    }
}

/// On-wire representation of a dataset value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SvDataType {
    #[default]
    Int32,
    UInt32,
    Float32,
}

impl SvDataType {
    /// All three encodings occupy four bytes on the wire.
    pub const fn value_size(self) -> usize {
        4
    }
}

impl fmt::Display for SvDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvDataType::Int32 => write!(f, "INT32"),
            SvDataType::UInt32 => write!(f, "UINT32"),
            SvDataType::Float32 => write!(f, "FLOAT32"),
        }
    }
}

/// Two-bit validity field of the quality word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Validity {
    #[default]
    Good,
    Invalid,
    Reserved,
    Questionable,
}

impl Validity {
    pub const fn as_u32(self) -> u32 {
        match self {
            Validity::Good => 0,
            Validity::Invalid => 1,
            Validity::Reserved => 2,
            Validity::Questionable => 3,
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => Validity::Good,
            1 => Validity::Invalid,
            2 => Validity::Reserved,
            _ => Validity::Questionable,
        }
    }
}

const QUALITY_WIRE_MASK: u32 = 0x3FFF;

/// IEC 61850 quality word.
///
/// Bit layout (bit 0 = LSB): validity occupies bits 0-1, then one flag per
/// bit in the order overflow, out-of-range, bad-reference, oscillatory,
/// failure, old-data, inconsistent, inaccurate, source (substituted), test,
/// operator-blocked, derived. Bits 14..31 are reserved and emitted as zero.
///
/// Stored as an explicit `u32` with mask/shift accessors so the layout
/// never depends on field ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quality(u32);

macro_rules! quality_flag {
    ($get:ident, $set:ident, $bit:expr) => {
        pub const fn $get(&self) -> bool {
            self.0 & (1 << $bit) != 0
        }

        pub fn $set(&mut self, value: bool) {
            if value {
                self.0 |= 1 << $bit;
            } else {
                self.0 &= !(1 << $bit);
            }
        }
    };
}

impl Quality {
    pub const fn good() -> Self {
        Quality(0)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Quality(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Raw value with the reserved bits masked off, as written to the wire.
    pub const fn wire_raw(&self) -> u32 {
        self.0 & QUALITY_WIRE_MASK
    }

    pub const fn validity(&self) -> Validity {
        Validity::from_bits(self.0)
    }

    pub fn set_validity(&mut self, validity: Validity) {
        self.0 = (self.0 & !0x3) | validity.as_u32();
    }

    pub const fn is_good(&self) -> bool {
        matches!(self.validity(), Validity::Good)
    }

    quality_flag!(overflow, set_overflow, 2);
    quality_flag!(out_of_range, set_out_of_range, 3);
    quality_flag!(bad_reference, set_bad_reference, 4);
    quality_flag!(oscillatory, set_oscillatory, 5);
    quality_flag!(failure, set_failure, 6);
    quality_flag!(old_data, set_old_data, 7);
    quality_flag!(inconsistent, set_inconsistent, 8);
    quality_flag!(inaccurate, set_inaccurate, 9);
    quality_flag!(substituted, set_substituted, 10);
    quality_flag!(test, set_test, 11);
    quality_flag!(operator_blocked, set_operator_blocked, 12);
    quality_flag!(derived, set_derived, 13);
}
