use crate::crc::{Crc3, Crc7, Crc8};
use crate::wire::{type_octet, write_dynamic_chain, write_static_chain, ChainDynamics, Ext3};
use crate::{ProfileId, UncompHeaders};

/// Upper bound of a serialized header block (two IPv6 headers, UDP,
/// RTP).
pub(crate) const MAX_HEADER_BLOCK: usize = 100;

/// CRC-3 over the reconstructed header block, as carried by UO-0 and
/// the UO-1 family.
pub(crate) fn crc3_over_headers(headers: &UncompHeaders) -> u8 {
    let mut buf = [0u8; MAX_HEADER_BLOCK];
    let len = headers.write_into(&mut buf);
    Crc3::new().add_slice(&buf[..len]).value()
}

/// CRC-7 over the reconstructed header block, as carried by UOR-2 and
/// the ROHCv2 PT-2/co_common/co_repair formats.
pub(crate) fn crc7_over_headers(headers: &UncompHeaders) -> u8 {
    let mut buf = [0u8; MAX_HEADER_BLOCK];
    let len = headers.write_into(&mut buf);
    Crc7::new().add_slice(&buf[..len]).value()
}

fn push_profile(out: &mut Vec<u8>, profile: ProfileId) {
    out.extend_from_slice(&profile.0.to_be_bytes());
}

/// IR: type octet, profile, CRC-8, static chain, dynamic chain. The
/// CRC-8 covers the whole body with its own field zeroed (the CID
/// encoding is inserted later and not covered).
pub(crate) fn write_ir(
    out: &mut Vec<u8>,
    profile: ProfileId,
    headers: &UncompHeaders,
    dynamics: &ChainDynamics,
    compat_pre_erratum: bool,
) {
    let start = out.len();
    out.push(type_octet::IR);
    push_profile(out, profile);
    let crc_at = out.len();
    out.push(0);
    write_static_chain(out, profile, headers);
    write_dynamic_chain(out, profile, headers, dynamics, compat_pre_erratum);
    out[crc_at] = Crc8::new().add_slice(&out[start..]).value();
}

/// IR-DYN: like IR without the static chain.
pub(crate) fn write_ir_dyn(
    out: &mut Vec<u8>,
    profile: ProfileId,
    headers: &UncompHeaders,
    dynamics: &ChainDynamics,
    compat_pre_erratum: bool,
) {
    let start = out.len();
    out.push(type_octet::IR_DYN);
    push_profile(out, profile);
    let crc_at = out.len();
    out.push(0);
    write_dynamic_chain(out, profile, headers, dynamics, compat_pre_erratum);
    out[crc_at] = Crc8::new().add_slice(&out[start..]).value();
}

/// UO-0 / pt_0_crc3: `0 sn(4) crc3(3)`.
pub(crate) fn write_uo0(out: &mut Vec<u8>, sn: u32, crc3: u8) {
    out.push(((sn as u8 & 0x0f) << 3) | (crc3 & 0x07));
}

/// Non-RTP UO-1: `10 ipid(6)` + `sn(5) crc3(3)`.
pub(crate) fn write_uo1(out: &mut Vec<u8>, ip_id_offset: u16, sn: u32, crc3: u8) {
    out.push(0b1000_0000 | (ip_id_offset as u8 & 0x3f));
    out.push(((sn as u8 & 0x1f) << 3) | (crc3 & 0x07));
}

/// UO-1-RTP: `10 ts(6)` + `M sn(4) crc3(3)`.
pub(crate) fn write_uo1_rtp(out: &mut Vec<u8>, ts: u32, marker: bool, sn: u32, crc3: u8) {
    out.push(0b1000_0000 | (ts as u8 & 0x3f));
    out.push(marker_bit(marker) | ((sn as u8 & 0x0f) << 3) | (crc3 & 0x07));
}

/// UO-1-TS: `10 1 ts(5)` + `M sn(4) crc3(3)`.
pub(crate) fn write_uo1_ts(out: &mut Vec<u8>, ts: u32, marker: bool, sn: u32, crc3: u8) {
    out.push(0b1010_0000 | (ts as u8 & 0x1f));
    out.push(marker_bit(marker) | ((sn as u8 & 0x0f) << 3) | (crc3 & 0x07));
}

/// UO-1-ID: `10 0 ipid(5)` + `M sn(4) crc3(3)`.
pub(crate) fn write_uo1_id(out: &mut Vec<u8>, ip_id_offset: u16, marker: bool, sn: u32, crc3: u8) {
    out.push(0b1000_0000 | (ip_id_offset as u8 & 0x1f));
    out.push(marker_bit(marker) | ((sn as u8 & 0x0f) << 3) | (crc3 & 0x07));
}

/// Non-RTP UOR-2: `110 sn(5)` + `X crc7`.
pub(crate) fn write_uor2(out: &mut Vec<u8>, sn: u32, ext3: Option<&Ext3>, crc7: u8) {
    let sn = sn_with_ext(sn, ext3);
    out.push(0b1100_0000 | (sn as u8 & 0x1f));
    push_x_crc7(out, ext3, crc7);
}

/// UOR-2-RTP: `110 ts(5)` + `ts(1) M sn(6)` + `X crc7`; only on
/// contexts without a sequential IPv4 header.
pub(crate) fn write_uor2_rtp(
    out: &mut Vec<u8>,
    ts: u32,
    marker: bool,
    sn: u32,
    ext3: Option<&Ext3>,
    crc7: u8,
) {
    let sn = sn_with_ext(sn, ext3);
    let ts = if ext3.map(|e| e.ts.is_some()).unwrap_or(false) {
        0
    } else {
        ts
    };
    out.push(0b1100_0000 | ((ts >> 1) as u8 & 0x1f));
    out.push(((ts as u8 & 0x01) << 7) | ((marker as u8) << 6) | (sn as u8 & 0x3f));
    push_x_crc7(out, ext3, crc7);
}

/// UOR-2-TS: `110 ts(5)` + `1 M sn(6)` + `X crc7`.
pub(crate) fn write_uor2_ts(
    out: &mut Vec<u8>,
    ts: u32,
    marker: bool,
    sn: u32,
    ext3: Option<&Ext3>,
    crc7: u8,
) {
    let sn = sn_with_ext(sn, ext3);
    let ts = if ext3.map(|e| e.ts.is_some()).unwrap_or(false) {
        0
    } else {
        ts
    };
    out.push(0b1100_0000 | (ts as u8 & 0x1f));
    out.push(0b1000_0000 | ((marker as u8) << 6) | (sn as u8 & 0x3f));
    push_x_crc7(out, ext3, crc7);
}

/// UOR-2-ID: `110 ipid(5)` + `0 M sn(6)` + `X crc7`.
pub(crate) fn write_uor2_id(
    out: &mut Vec<u8>,
    ip_id_offset: u16,
    marker: bool,
    sn: u32,
    ext3: Option<&Ext3>,
    crc7: u8,
) {
    let sn = sn_with_ext(sn, ext3);
    let ip_id = if ext3.map(|e| e.ip_id_offset.is_some()).unwrap_or(false) {
        0
    } else {
        ip_id_offset
    };
    out.push(0b1100_0000 | (ip_id as u8 & 0x1f));
    out.push(((marker as u8) << 6) | (sn as u8 & 0x3f));
    push_x_crc7(out, ext3, crc7);
}

/// ROHCv2 pt_1: `10 msn(6)` + `ipid(5) crc3` (the IP-ID bits are
/// reserved zero on contexts without a sequential IP-ID).
pub(crate) fn write_pt1(out: &mut Vec<u8>, msn: u32, ip_id_offset: Option<u16>, crc3: u8) {
    out.push(0b1000_0000 | (msn as u8 & 0x3f));
    out.push(((ip_id_offset.unwrap_or(0) as u8 & 0x1f) << 3) | (crc3 & 0x07));
}

/// ROHCv2 pt_2: `110 msn(5)` + `ipid(8)` + `0 crc7`.
pub(crate) fn write_pt2(out: &mut Vec<u8>, msn: u32, ip_id_offset: Option<u16>, crc7: u8) {
    out.push(0b1100_0000 | (msn as u8 & 0x1f));
    out.push(ip_id_offset.unwrap_or(0) as u8);
    out.push(crc7 & 0x7f);
}

/// ROHCv2 co_common: flags, full MSN, optional updates, control CRC-3
/// and header CRC-7.
pub(crate) fn write_co_common(
    out: &mut Vec<u8>,
    msn: u16,
    ip_id_offset: Option<u16>,
    control_crc3: u8,
    crc7: u8,
) {
    out.push(type_octet::CO_COMMON);
    let mut flags = 0u8;
    if ip_id_offset.is_some() {
        flags |= 0b0000_1000;
    }
    out.push(flags);
    out.extend_from_slice(&msn.to_be_bytes());
    if let Some(offset) = ip_id_offset {
        out.extend_from_slice(&offset.to_be_bytes());
    }
    out.push(control_crc3 & 0x07);
    out.push(crc7 & 0x7f);
}

/// ROHCv2 co_repair: header CRC-7 plus the full dynamic chain (whose
/// control block carries its own CRC-3).
pub(crate) fn write_co_repair(
    out: &mut Vec<u8>,
    profile: ProfileId,
    headers: &UncompHeaders,
    dynamics: &ChainDynamics,
    crc7: u8,
    compat_pre_erratum: bool,
) {
    out.push(type_octet::CO_REPAIR);
    out.push(crc7 & 0x7f);
    write_dynamic_chain(out, profile, headers, dynamics, compat_pre_erratum);
}

#[inline]
fn marker_bit(marker: bool) -> u8 {
    (marker as u8) << 7
}

/// Base header SN bits sit above the 8 LSBs an Extension 3 carries.
#[inline]
fn sn_with_ext(sn: u32, ext3: Option<&Ext3>) -> u32 {
    match ext3 {
        Some(ext) if ext.sn8.is_some() => sn >> 8,
        _ => sn,
    }
}

fn push_x_crc7(out: &mut Vec<u8>, ext3: Option<&Ext3>, crc7: u8) {
    let x = ext3.map(|e| !e.is_empty()).unwrap_or(false);
    out.push(((x as u8) << 7) | (crc7 & 0x7f));
    if let Some(ext3) = ext3 {
        if !ext3.is_empty() {
            ext3.write(out);
        }
    }
}
