//! Data carriers for the SV payload: analog values, ASDUs and messages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::common::{
    Quality, SmpSynch, MAX_ASDUS_PER_MESSAGE, SV_APP_ID_MAX, SV_APP_ID_MIN, VALUES_PER_ASDU,
};
use super::ptp::PtpTimestamp;

/// One sampled value in its wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SampleValue {
    Int32(i32),
    UInt32(u32),
    Float32(f32),
}

impl Default for SampleValue {
    fn default() -> Self {
        SampleValue::Int32(0)
    }
}

/// A sampled value together with its quality word.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalogValue {
    pub value: SampleValue,
    pub quality: Quality,
}

impl AnalogValue {
    pub const fn new(value: SampleValue, quality: Quality) -> Self {
        AnalogValue { value, quality }
    }

    /// A good-quality INT32 sample, the most common wire form.
    pub const fn int32(value: i32) -> Self {
        AnalogValue {
            value: SampleValue::Int32(value),
            quality: Quality::good(),
        }
    }

    pub const fn uint32(value: u32) -> Self {
        AnalogValue {
            value: SampleValue::UInt32(value),
            quality: Quality::good(),
        }
    }

    pub const fn float32(value: f32) -> Self {
        AnalogValue {
            value: SampleValue::Float32(value),
            quality: Quality::good(),
        }
    }

    /// Integer view of the sample, truncating for floats.
    pub fn as_int(&self) -> i64 {
        match self.value {
            SampleValue::Int32(v) => v as i64,
            SampleValue::UInt32(v) => v as i64,
            SampleValue::Float32(v) => v as i64,
        }
    }

    /// Floating-point view of the sample.
    pub fn as_float(&self) -> f64 {
        match self.value {
            SampleValue::Int32(v) => v as f64,
            SampleValue::UInt32(v) => v as f64,
            SampleValue::Float32(v) => v as f64,
        }
    }
}

/// One Application Service Data Unit: the unit a protection algorithm
/// consumes. Dataset convention: indices 0-3 are phase currents A, B, C
/// plus neutral, 4-7 the corresponding voltages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Asdu {
    pub sv_id: String,
    pub smp_cnt: u16,
    pub conf_rev: u32,
    pub smp_synch: SmpSynch,
    /// PTP grandmaster identity, present iff `smp_synch` is `Global`.
    pub gm_identity: Option<[u8; 8]>,
    pub data_set: Vec<AnalogValue>,
    pub timestamp: PtpTimestamp,
}

impl Asdu {
    pub fn is_valid(&self) -> bool {
        self.sv_id.len() >= 2
            && self.sv_id.len() <= super::common::SV_ID_WIRE_LENGTH
            && self.data_set.len() == VALUES_PER_ASDU
    }
}

impl fmt::Display for Asdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "svID={} smpCnt={} confRev={} synch={} values={}",
            self.sv_id,
            self.smp_cnt,
            self.conf_rev,
            self.smp_synch,
            self.data_set.len()
        )
    }
}

/// 802.1Q tag content carried by a VLAN-tagged frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanTag {
    pub id: u16,
    pub priority: u8,
}

/// A decoded SV message: one or more ASDUs behind a common Ethernet
/// header and APPID.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SvMessage {
    pub app_id: u16,
    pub simulate: bool,
    pub vlan: Option<VlanTag>,
    pub asdus: Vec<Asdu>,
}

impl SvMessage {
    pub fn is_valid(&self) -> bool {
        (SV_APP_ID_MIN..=SV_APP_ID_MAX).contains(&self.app_id)
            && !self.asdus.is_empty()
            && self.asdus.len() <= MAX_ASDUS_PER_MESSAGE
            && self.asdus.iter().all(Asdu::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iec61850_9_2::common::Validity;

    fn sample_asdu() -> Asdu {
        Asdu {
            sv_id: "SV01".to_string(),
            smp_cnt: 7,
            conf_rev: 1,
            smp_synch: SmpSynch::Local,
            gm_identity: None,
            data_set: vec![AnalogValue::int32(1000); 8],
            timestamp: PtpTimestamp::from_nanos(1_700_000_000_000_000_000),
        }
    }

    #[test]
    fn test_analog_value_views() {
        let av = AnalogValue::int32(-1500);
        assert_eq!(av.as_int(), -1500);
        assert_eq!(av.as_float(), -1500.0);

        let av = AnalogValue::uint32(3_000_000_000);
        assert_eq!(av.as_int(), 3_000_000_000);

        let av = AnalogValue::float32(2.5);
        assert_eq!(av.as_int(), 2);
        assert_eq!(av.as_float(), 2.5);
        assert!(av.quality.is_good());
    }

    #[test]
    fn test_asdu_validity() {
        let asdu = sample_asdu();
        assert!(asdu.is_valid());

        let mut short_id = sample_asdu();
        short_id.sv_id = "S".to_string();
        assert!(!short_id.is_valid());

        let mut empty_id = sample_asdu();
        empty_id.sv_id.clear();
        assert!(!empty_id.is_valid());

        let mut short_set = sample_asdu();
        short_set.data_set.pop();
        assert!(!short_set.is_valid());

        let mut long_set = sample_asdu();
        long_set.data_set.push(AnalogValue::int32(0));
        assert!(!long_set.is_valid());
    }

    #[test]
    fn test_message_validity() {
        let msg = SvMessage {
            app_id: 0x4000,
            simulate: false,
            vlan: None,
            asdus: vec![sample_asdu()],
        };
        assert!(msg.is_valid());

        let mut below_range = msg.clone();
        below_range.app_id = 0x3FFF;
        assert!(!below_range.is_valid());

        let mut above_range = msg.clone();
        above_range.app_id = 0x8000;
        assert!(!above_range.is_valid());

        let mut empty = msg.clone();
        empty.asdus.clear();
        assert!(!empty.is_valid());

        let mut overfull = msg;
        overfull.asdus = vec![sample_asdu(); 9];
        assert!(!overfull.is_valid());
    }

    #[test]
    fn test_quality_travels_with_value() {
        let mut quality = Quality::good();
        quality.set_validity(Validity::Questionable);
        quality.set_oscillatory(true);

        let av = AnalogValue::new(SampleValue::Int32(42), quality);
        assert!(!av.quality.is_good());
        assert!(av.quality.oscillatory());
    }
}
