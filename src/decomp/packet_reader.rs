use crate::decomp::{ExtractedBits, TsBits};
use crate::wire::{Ext3, ReadCursor};
use crate::{PacketFormat, PacketKind};

/// What the reader needs to know about the context to parse a
/// compressed packet (the `(profile, CID)` pair fixes the
/// interpretation of every byte).
#[derive(Clone, Copy, Debug)]
pub(crate) struct ReaderContext {
    pub is_rtp: bool,
    pub is_v2: bool,
    /// Number of IPv4 headers with a sequential IP-ID behavior.
    pub seq_v4_count: u8,
    /// Number of IPv4 headers with random IP-IDs (they carry their
    /// IP-ID verbatim behind the base header).
    pub rand_v4_count: u8,
    /// True if the flow carries UDP checksums irregularly.
    pub udp_checksum_used: bool,
}

/// Parses the bits of a compressed (non-chain) packet. `None` on
/// truncation or reserved-bit violations.
pub(crate) fn read_co_packet(
    kind: PacketKind,
    first: u8,
    cursor: &mut ReadCursor<'_>,
    ctx: ReaderContext,
) -> Option<ExtractedBits> {
    let mut bits = ExtractedBits::default();
    match kind {
        PacketKind::Pt0 => read_pt0(first, ctx, &mut bits),
        PacketKind::Pt1 => read_pt1(first, cursor, ctx, &mut bits)?,
        PacketKind::Pt2 => read_pt2(first, cursor, ctx, &mut bits)?,
        PacketKind::CoCommon | PacketKind::CoCommonAlias => {
            read_co_common(cursor, ctx, &mut bits)?
        }
        _ => return None,
    }
    read_irregular(cursor, ctx, &mut bits)?;
    Some(bits)
}

/// UO-0 / pt_0_crc3: `0 sn(4) crc3`.
fn read_pt0(first: u8, ctx: ReaderContext, bits: &mut ExtractedBits) {
    bits.format = Some(if ctx.is_v2 {
        PacketFormat::Pt0Crc3
    } else {
        PacketFormat::Uo0
    });
    bits.sn = Some((u32::from((first >> 3) & 0x0f), 4));
    bits.crc3 = Some(first & 0x07);
}

/// The UO-1 / pt_1 family; the variant is fixed by the context.
fn read_pt1(
    first: u8,
    cursor: &mut ReadCursor<'_>,
    ctx: ReaderContext,
    bits: &mut ExtractedBits,
) -> Option<()> {
    let second = cursor.u8()?;
    if ctx.is_v2 {
        bits.format = Some(PacketFormat::Pt1);
        bits.sn = Some((u32::from(first & 0x3f), 6));
        if ctx.seq_v4_count > 0 {
            bits.ip_id = Some((u32::from(second >> 3), 5));
        } else if second >> 3 != 0 {
            // reserved bits
            return None;
        }
        bits.crc3 = Some(second & 0x07);
        return Some(());
    }
    if ctx.is_rtp {
        bits.marker = Some(second & 0x80 != 0);
        bits.sn = Some((u32::from((second >> 3) & 0x0f), 4));
        bits.crc3 = Some(second & 0x07);
        if ctx.seq_v4_count == 0 {
            bits.format = Some(PacketFormat::Uo1Rtp);
            bits.ts = Some(TsBits {
                value: u32::from(first & 0x3f),
                bits: 6,
                scaled: None,
            });
        } else if first & 0b0010_0000 != 0 {
            bits.format = Some(PacketFormat::Uo1Ts);
            bits.ts = Some(TsBits {
                value: u32::from(first & 0x1f),
                bits: 5,
                scaled: None,
            });
        } else {
            bits.format = Some(PacketFormat::Uo1Id);
            bits.ip_id = Some((u32::from(first & 0x1f), 5));
        }
    } else {
        bits.format = Some(PacketFormat::Uo1);
        bits.ip_id = Some((u32::from(first & 0x3f), 6));
        bits.sn = Some((u32::from(second >> 3), 5));
        bits.crc3 = Some(second & 0x07);
    }
    Some(())
}

/// The UOR-2 / pt_2 family.
fn read_pt2(
    first: u8,
    cursor: &mut ReadCursor<'_>,
    ctx: ReaderContext,
    bits: &mut ExtractedBits,
) -> Option<()> {
    if ctx.is_v2 {
        bits.format = Some(PacketFormat::Pt2);
        bits.sn = Some((u32::from(first & 0x1f), 5));
        let ip_id = cursor.u8()?;
        if ctx.seq_v4_count > 0 {
            bits.ip_id = Some((u32::from(ip_id), 8));
        } else if ip_id != 0 {
            return None;
        }
        let crc_octet = cursor.u8()?;
        if crc_octet & 0x80 != 0 {
            return None;
        }
        bits.crc7 = Some(crc_octet & 0x7f);
        return Some(());
    }
    if ctx.is_rtp {
        let second = cursor.u8()?;
        bits.sn = Some((u32::from(second & 0x3f), 6));
        if ctx.seq_v4_count == 0 {
            bits.format = Some(PacketFormat::Uor2Rtp);
            bits.marker = Some(second & 0x40 != 0);
            bits.ts = Some(TsBits {
                value: (u32::from(first & 0x1f) << 1) | u32::from(second >> 7),
                bits: 6,
                scaled: None,
            });
        } else {
            bits.marker = Some(second & 0x40 != 0);
            if second & 0x80 != 0 {
                bits.format = Some(PacketFormat::Uor2Ts);
                bits.ts = Some(TsBits {
                    value: u32::from(first & 0x1f),
                    bits: 5,
                    scaled: None,
                });
            } else {
                bits.format = Some(PacketFormat::Uor2Id);
                bits.ip_id = Some((u32::from(first & 0x1f), 5));
            }
        }
    } else {
        bits.format = Some(PacketFormat::Uor2);
        bits.sn = Some((u32::from(first & 0x1f), 5));
    }
    let crc_octet = cursor.u8()?;
    bits.crc7 = Some(crc_octet & 0x7f);
    if crc_octet & 0x80 != 0 {
        let ext = Ext3::parse(cursor)?;
        apply_ext3(&ext, bits);
    }
    Some(())
}

/// ROHCv2 co_common behind the discriminator octet.
fn read_co_common(
    cursor: &mut ReadCursor<'_>,
    ctx: ReaderContext,
    bits: &mut ExtractedBits,
) -> Option<()> {
    if !ctx.is_v2 {
        return None;
    }
    bits.format = Some(PacketFormat::CoCommon);
    let flags = cursor.u8()?;
    if flags & 0b0011_0111 != 0 {
        // only the defined indicator bits may be set
        return None;
    }
    let ttl_present = flags & 0b1000_0000 != 0;
    let tos_present = flags & 0b0100_0000 != 0;
    let ip_id_present = flags & 0b0000_1000 != 0;
    bits.msn16 = Some(cursor.u16()?);
    if ttl_present {
        // applied verbatim to the innermost header
        bits.co_common_ttl = Some(cursor.u8()?);
    }
    if tos_present {
        bits.co_common_tos = Some(cursor.u8()?);
    }
    if ip_id_present {
        bits.ip_id = Some((u32::from(cursor.u16()?), 16));
    }
    let control = cursor.u8()?;
    if control & 0b1111_1000 != 0 {
        return None;
    }
    bits.crc3 = Some(control & 0x07);
    let crc_octet = cursor.u8()?;
    if crc_octet & 0x80 != 0 {
        return None;
    }
    bits.crc7 = Some(crc_octet & 0x7f);
    Some(())
}

/// Irregular fields behind base header and extension: verbatim random
/// IP-IDs, then the UDP checksum.
fn read_irregular(
    cursor: &mut ReadCursor<'_>,
    ctx: ReaderContext,
    bits: &mut ExtractedBits,
) -> Option<()> {
    for _ in 0..ctx.rand_v4_count {
        bits.rand_ip_ids.push(cursor.u16()?);
    }
    if ctx.udp_checksum_used {
        bits.udp_checksum = Some(cursor.u16()?);
    }
    Some(())
}

fn apply_ext3(ext: &Ext3, bits: &mut ExtractedBits) {
    if let Some(sn8) = ext.sn8 {
        if let Some((sn, count)) = bits.sn {
            bits.sn = Some(((sn << 8) | u32::from(sn8), count + 8));
        }
    }
    if let Some((value, ts_bits, scaled)) = ext.ts {
        bits.ts = Some(TsBits {
            value,
            bits: ts_bits,
            scaled: Some(scaled),
        });
    }
    if let Some(offset) = ext.ip_id_offset {
        bits.ip_id = Some((u32::from(offset), 16));
    }
}
