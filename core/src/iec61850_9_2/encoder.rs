//! SV frame emission: control block + ASDU to raw Ethernet frame bytes.

use super::asdu::{AnalogValue, Asdu, SampleValue};
use super::buffer::BufferWriter;
use super::common::{FrameError, SmpSynch, SvDataType, SV_ETHER_TYPE, SV_ID_WIRE_LENGTH, VLAN_TPID};
use super::mac::MacAddress;
use super::svcb::SampledValueControlBlock;

/// Builds one Ethernet frame carrying a single ASDU.
///
/// The layout is fixed (big-endian throughout): MAC header, optional
/// 802.1Q tag when the block carries a VLAN id, EtherType 0x88BA, APPID,
/// a Length field holding the number of bytes that follow it, two
/// reserved words (bit 15 of the first is the simulate flag), then the
/// savPdu body. The Length field is back-patched once the body is done.
///
/// Emission is strict: an ASDU that fails its invariants is rejected
/// here so nothing malformed reaches the wire.
pub fn encode_frame(
    svcb: &SampledValueControlBlock,
    asdu: &Asdu,
    source_mac: MacAddress,
) -> Result<Vec<u8>, FrameError> {
    if !asdu.is_valid() {
        return Err(FrameError::InvalidEmitAsdu);
    }

    let mut writer = BufferWriter::new();

    writer.write_bytes(svcb.destination.as_bytes());
    writer.write_bytes(source_mac.as_bytes());

    if svcb.vlan_id > 0 {
        writer.write_u16(VLAN_TPID);
        writer.write_u16(((svcb.user_priority as u16) << 13) | (svcb.vlan_id & 0x0FFF));
    }

    writer.write_u16(SV_ETHER_TYPE);
    writer.write_u16(svcb.app_id);

    let length_pos = writer.reserve(2);

    // Reserved 1 carries the simulate flag in bit 15; reserved 2 is zero.
    writer.write_u16(if svcb.simulate { 0x8000 } else { 0 });
    writer.write_u16(0);

    writer.write_u8(1); // one ASDU per frame
    encode_asdu(&mut writer, asdu, svcb.data_type);

    let length = (writer.len() - length_pos - 2) as u16;
    writer.write_u16_at(length_pos, length);

    Ok(writer.into_bytes())
}

fn encode_asdu(writer: &mut BufferWriter, asdu: &Asdu, data_type: SvDataType) {
    writer.write_fixed_string(&asdu.sv_id, SV_ID_WIRE_LENGTH);
    writer.write_u16(asdu.smp_cnt);
    writer.write_u32(asdu.conf_rev);
    writer.write_u8(asdu.smp_synch.as_u8());

    // The flat layout has no presence tag, so the grandmaster identity
    // rides along exactly when the stream claims global sync.
    if asdu.smp_synch == SmpSynch::Global {
        match asdu.gm_identity {
            Some(identity) => writer.write_bytes(&identity),
            None => writer.write_bytes(&[0u8; 8]),
        }
    }

    for analog in &asdu.data_set {
        encode_value(writer, analog, data_type);
        writer.write_u32(analog.quality.wire_raw());
    }

    writer.write_u64(asdu.timestamp.as_nanos());
}

fn encode_value(writer: &mut BufferWriter, analog: &AnalogValue, data_type: SvDataType) {
    match data_type {
        SvDataType::Int32 => {
            let v = match analog.value {
                SampleValue::Int32(v) => v,
                SampleValue::UInt32(v) => v as i32,
                SampleValue::Float32(v) => v as i32,
            };
            writer.write_i32(v);
        }
        SvDataType::UInt32 => {
            let v = match analog.value {
                SampleValue::Int32(v) => v as u32,
                SampleValue::UInt32(v) => v,
                SampleValue::Float32(v) => v as u32,
            };
            writer.write_u32(v);
        }
        SvDataType::Float32 => {
            let v = match analog.value {
                SampleValue::Int32(v) => v as f32,
                SampleValue::UInt32(v) => v as f32,
                SampleValue::Float32(v) => v,
            };
            writer.write_f32(v);
        }
    }
}
