//! SV frame parsing: raw Ethernet frame bytes to a decoded message.

use log::warn;

use super::asdu::{AnalogValue, Asdu, SampleValue, SvMessage, VlanTag};
use super::buffer::BufferReader;
use super::common::{
    FrameError, Quality, SmpSynch, SvDataType, MAX_ASDUS_PER_MESSAGE, SV_ETHER_TYPE,
    SV_ID_WIRE_LENGTH, VALUES_PER_ASDU, VLAN_TPID,
};
use super::ptp::PtpTimestamp;

/// Parses one Ethernet frame into an [`SvMessage`].
///
/// The read path is tolerant: truncated input yields zero bytes from the
/// buffer reader and the per-ASDU validation at the end decides whether
/// the frame is dropped. `data_type` selects the wire width interpretation
/// of the dataset values; subscribers that have no configuration use
/// [`SvDataType::Int32`], the most common case.
///
/// Every ASDU announced in the header (1..=8) is decoded; delivery order
/// matches wire order.
pub fn decode_frame(bytes: &[u8], data_type: SvDataType) -> Result<SvMessage, FrameError> {
    let mut reader = BufferReader::new(bytes);
    reader.skip(12); // destination + source MAC

    let mut ether_type = reader.read_u16();
    let mut vlan = None;

    if ether_type == VLAN_TPID {
        let tci = reader.read_u16();
        vlan = Some(VlanTag {
            id: tci & 0x0FFF,
            priority: ((tci >> 13) & 0x07) as u8,
        });
        ether_type = reader.read_u16();
    }

    if ether_type != SV_ETHER_TYPE {
        return Err(FrameError::NotSampledValues);
    }

    let app_id = reader.read_u16();
    let _length = reader.read_u16();
    let reserved1 = reader.read_u16();
    let simulate = reserved1 & 0x8000 != 0;
    reader.skip(2); // reserved 2

    let num_asdus = reader.read_u8();
    if num_asdus == 0 || num_asdus as usize > MAX_ASDUS_PER_MESSAGE {
        return Err(FrameError::InvalidAsduCount(num_asdus));
    }

    let mut asdus = Vec::with_capacity(num_asdus as usize);
    for _ in 0..num_asdus {
        asdus.push(decode_asdu(&mut reader, data_type)?);
    }

    Ok(SvMessage {
        app_id,
        simulate,
        vlan,
        asdus,
    })
}

fn decode_asdu(reader: &mut BufferReader<'_>, data_type: SvDataType) -> Result<Asdu, FrameError> {
    let sv_id = reader
        .read_fixed_string(SV_ID_WIRE_LENGTH)
        .trim_end_matches(' ')
        .to_string();

    let smp_cnt = reader.read_u16();
    let conf_rev = reader.read_u32();

    let synch_byte = reader.read_u8();
    let smp_synch = match SmpSynch::from_u8(synch_byte) {
        Some(synch) => synch,
        None => {
            warn!(
                "svID {}: smpSynch byte {} out of range, treating as unsynchronised",
                sv_id, synch_byte
            );
            SmpSynch::None
        }
    };

    let gm_identity = if smp_synch == SmpSynch::Global {
        let mut identity = [0u8; 8];
        reader.read_bytes(&mut identity);
        Some(identity)
    } else {
        None
    };

    let pair_size = data_type.value_size() + 4;
    let mut data_set = Vec::with_capacity(VALUES_PER_ASDU);
    while data_set.len() < VALUES_PER_ASDU && reader.remaining() >= pair_size {
        let value = match data_type {
            SvDataType::Int32 => SampleValue::Int32(reader.read_i32()),
            SvDataType::UInt32 => SampleValue::UInt32(reader.read_u32()),
            SvDataType::Float32 => SampleValue::Float32(reader.read_f32()),
        };
        let quality = Quality::from_raw(reader.read_u32());
        data_set.push(AnalogValue::new(value, quality));
    }

    if data_set.len() != VALUES_PER_ASDU {
        return Err(FrameError::InvalidValueCount(data_set.len()));
    }

    let timestamp = if reader.remaining() >= 8 {
        PtpTimestamp::from_nanos(reader.read_u64())
    } else {
        warn!("svID {}: timestamp missing, substituting wall clock", sv_id);
        PtpTimestamp::now()
    };

    let asdu = Asdu {
        sv_id,
        smp_cnt,
        conf_rev,
        smp_synch,
        gm_identity,
        data_set,
        timestamp,
    };

    if !asdu.is_valid() {
        return Err(FrameError::InvalidAsdu);
    }
    Ok(asdu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iec61850_9_2::encoder::encode_frame;
    use crate::iec61850_9_2::mac::MacAddress;
    use crate::iec61850_9_2::svcb::SampledValueControlBlock;

    fn test_svcb() -> SampledValueControlBlock {
        let mut svcb = SampledValueControlBlock::new("SV01");
        svcb.destination = MacAddress::parse("01:0C:CD:04:00:01").unwrap();
        svcb
    }

    fn test_asdu() -> Asdu {
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
    fn test_round_trip_preserves_all_fields() {
        let svcb = test_svcb();
        let asdu = test_asdu();

        let frame = encode_frame(&svcb, &asdu, MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::Int32).unwrap();

        assert_eq!(message.app_id, 0x4000);
        assert!(!message.simulate);
        assert!(message.vlan.is_none());
        assert_eq!(message.asdus.len(), 1);
        assert_eq!(message.asdus[0], asdu);
    }

    #[test]
    fn test_rejects_non_sv_ethertype() {
        // A plausible IPv4 frame header.
        let mut frame = vec![0u8; 64];
        frame[12] = 0x08;
        frame[13] = 0x00;
        assert_eq!(
            decode_frame(&frame, SvDataType::Int32),
            Err(FrameError::NotSampledValues)
        );
    }

    #[test]
    fn test_vlan_transparency() {
        let asdu = test_asdu();
        let plain = encode_frame(&test_svcb(), &asdu, MacAddress::default()).unwrap();

        let mut tagged_svcb = test_svcb();
        tagged_svcb.vlan_id = 1;
        let tagged = encode_frame(&tagged_svcb, &asdu, MacAddress::default()).unwrap();

        let from_plain = decode_frame(&plain, SvDataType::Int32).unwrap();
        let from_tagged = decode_frame(&tagged, SvDataType::Int32).unwrap();

        assert_eq!(from_plain.asdus, from_tagged.asdus);
        assert_eq!(
            from_tagged.vlan,
            Some(VlanTag { id: 1, priority: 4 })
        );
    }

    #[test]
    fn test_decodes_vlan_tagged_frame_fields() {
        let mut svcb = test_svcb();
        svcb.vlan_id = 1;
        svcb.user_priority = 4;
        let frame = encode_frame(&svcb, &test_asdu(), MacAddress::default()).unwrap();

        let message = decode_frame(&frame, SvDataType::Int32).unwrap();
        let vlan = message.vlan.unwrap();
        assert_eq!(vlan.id, 1);
        assert_eq!(vlan.priority, 4);
        assert_eq!(message.asdus[0], test_asdu());
    }

    #[test]
    fn test_invalid_asdu_count_rejected() {
        let mut frame = encode_frame(&test_svcb(), &test_asdu(), MacAddress::default()).unwrap();
        frame[22] = 0;
        assert_eq!(
            decode_frame(&frame, SvDataType::Int32),
            Err(FrameError::InvalidAsduCount(0))
        );
        frame[22] = 9;
        assert_eq!(
            decode_frame(&frame, SvDataType::Int32),
            Err(FrameError::InvalidAsduCount(9))
        );
    }

    #[test]
    fn test_truncated_frame_dropped_without_panic() {
        let frame = encode_frame(&test_svcb(), &test_asdu(), MacAddress::default()).unwrap();

        // Cut into the dataset: fewer than eight pairs survive.
        let result = decode_frame(&frame[..100], SvDataType::Int32);
        assert!(matches!(result, Err(FrameError::InvalidValueCount(_))));

        // Cut before the payload entirely.
        let result = decode_frame(&frame[..20], SvDataType::Int32);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_timestamp_substitutes_wall_clock() {
        let frame = encode_frame(&test_svcb(), &test_asdu(), MacAddress::default()).unwrap();
        // Strip the 8-byte timestamp trailer.
        let message = decode_frame(&frame[..frame.len() - 8], SvDataType::Int32).unwrap();

        let now = PtpTimestamp::now();
        let asdu = &message.asdus[0];
        assert!(asdu.timestamp.seconds() > 1_000_000_000);
        assert!(asdu.timestamp.seconds() <= now.seconds() + 1);
    }

    #[test]
    fn test_out_of_range_smp_synch_maps_to_none() {
        let mut frame = encode_frame(&test_svcb(), &test_asdu(), MacAddress::default()).unwrap();
        frame[93] = 7;
        let message = decode_frame(&frame, SvDataType::Int32).unwrap();
        assert_eq!(message.asdus[0].smp_synch, SmpSynch::None);
    }

    #[test]
    fn test_svid_trailing_spaces_trimmed() {
        let mut svcb = test_svcb();
        svcb.name = "MU7  ".to_string();
        let mut asdu = test_asdu();
        asdu.sv_id = "MU7  ".to_string();

        let frame = encode_frame(&svcb, &asdu, MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::Int32).unwrap();
        assert_eq!(message.asdus[0].sv_id, "MU7");
    }

    #[test]
    fn test_simulate_flag_round_trip() {
        let mut svcb = test_svcb();
        svcb.simulate = true;
        let frame = encode_frame(&svcb, &test_asdu(), MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::Int32).unwrap();
        assert!(message.simulate);
    }

    #[test]
    fn test_global_sync_round_trip_with_identity() {
        let mut asdu = test_asdu();
        asdu.smp_synch = SmpSynch::Global;
        asdu.gm_identity = Some([1, 2, 3, 4, 5, 6, 7, 8]);

        let frame = encode_frame(&test_svcb(), &asdu, MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::Int32).unwrap();
        assert_eq!(message.asdus[0], asdu);
    }

    #[test]
    fn test_float_round_trip() {
        let mut svcb = test_svcb();
        svcb.data_type = SvDataType::Float32;
        let mut asdu = test_asdu();
        asdu.data_set = (0..8)
            .map(|i| AnalogValue::float32(i as f32 * 1.5 - 3.0))
            .collect();

        let frame = encode_frame(&svcb, &asdu, MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::Float32).unwrap();
        assert_eq!(message.asdus[0], asdu);
    }

    #[test]
    fn test_uint32_round_trip() {
        let mut svcb = test_svcb();
        svcb.data_type = SvDataType::UInt32;
        let mut asdu = test_asdu();
        asdu.data_set = vec![AnalogValue::uint32(3_000_000_000); 8];

        let frame = encode_frame(&svcb, &asdu, MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::UInt32).unwrap();
        assert_eq!(message.asdus[0], asdu);
    }

    #[test]
    fn test_quality_round_trip_within_wire_bits() {
        let mut asdu = test_asdu();
        for (i, analog) in asdu.data_set.iter_mut().enumerate() {
            analog.quality = Quality::from_raw((i as u32) * 0x111 & 0x3FFF);
        }

        let frame = encode_frame(&test_svcb(), &asdu, MacAddress::default()).unwrap();
        let message = decode_frame(&frame, SvDataType::Int32).unwrap();
        for (decoded, original) in message.asdus[0].data_set.iter().zip(&asdu.data_set) {
            assert_eq!(decoded.quality, original.quality);
        }
    }

    #[test]
    fn test_empty_input_is_not_sv() {
        assert!(decode_frame(&[], SvDataType::Int32).is_err());
        assert!(decode_frame(&[0u8; 14], SvDataType::Int32).is_err());
    }
}
