use crate::comp::{crc3_over_headers, crc7_over_headers};
use crate::context_table::ContextTable;
use crate::decomp::{
    read_co_packet, Candidate, DecodeTweak, DecompressorContext, DecompressorState,
    ExtractedBits,
};
use crate::err::{ConfigError, DecompressError};
use crate::wire::{
    build_feedback2, control_crc3, parse_dynamic_chain, parse_static_chain, split_cid,
    ReadCursor,
};
use crate::{
    detect_packet_kind, AckType, CidType, EngineStats, Features, PacketFormat, PacketKind,
    ProfileId, RohcMode,
};
use crate::crc::Crc8;
use log::{debug, trace, warn};
use std::collections::VecDeque;

/// Result of one successful decompression.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecompressedPacket {
    /// Bytes written to the output buffer.
    pub len: usize,
    /// Offset of the payload within the output.
    pub payload_offset: usize,
    pub cid: u16,
    pub profile: ProfileId,
    pub format: PacketFormat,
    /// True if the packet only decompressed after a repair attempt.
    pub repaired: bool,
}

/// The ROHC decompressor engine: one instance per flow direction.
pub struct Decompressor {
    cid_type: CidType,
    contexts: ContextTable<DecompressorContext>,
    mode: RohcMode,
    enabled: Vec<ProfileId>,
    features: Features,
    feedback: VecDeque<Vec<u8>>,
    stats: EngineStats,
}

impl Decompressor {
    /// Creates a decompressor operating in `mode` for up to
    /// `max_contexts` flows.
    pub fn new(
        cid_type: CidType,
        max_contexts: usize,
        mode: RohcMode,
    ) -> Result<Decompressor, ConfigError> {
        if max_contexts == 0 {
            return Err(ConfigError::ZeroContexts);
        }
        if max_contexts > cid_type.cid_space() {
            return Err(ConfigError::TooManyContexts {
                requested: max_contexts,
                cid_space: cid_type.cid_space(),
            });
        }
        Ok(Decompressor {
            cid_type,
            contexts: ContextTable::new(max_contexts),
            mode,
            enabled: vec![ProfileId::UNCOMPRESSED],
            features: Features::NONE,
            feedback: VecDeque::new(),
            stats: EngineStats::default(),
        })
    }

    /// Enables additional profiles; an IR announcing a disabled
    /// profile is rejected.
    pub fn enable_profiles(&mut self, profiles: &[ProfileId]) -> Result<(), ConfigError> {
        for profile in profiles {
            if !profile.is_implemented() {
                return Err(ConfigError::ProfileNotImplemented { profile: *profile });
            }
        }
        for profile in profiles {
            if !self.enabled.contains(profile) {
                self.enabled.push(*profile);
            }
        }
        Ok(())
    }

    pub fn set_features(&mut self, features: Features) {
        self.features = features;
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Next feedback element for the peer compressor, if any. The
    /// caller hands the bytes to `Compressor::deliver_feedback` on the
    /// return channel.
    pub fn emit_feedback(&mut self) -> Option<Vec<u8>> {
        self.feedback.pop_front()
    }

    /// Decompresses one ROHC packet into `out`. A CRC failure leaves
    /// the context fields untouched (only confidence counters move).
    pub fn decompress(
        &mut self,
        rohc: &[u8],
        out: &mut [u8],
    ) -> Result<DecompressedPacket, DecompressError> {
        let result = self.decompress_inner(rohc, out);
        match &result {
            Ok(meta) => {
                self.stats.packets += 1;
                self.stats.bytes_in += rohc.len() as u64;
                self.stats.bytes_out += meta.len as u64;
                match meta.format {
                    PacketFormat::Ir => self.stats.ir_packets += 1,
                    PacketFormat::IrDyn | PacketFormat::CoRepair => {
                        self.stats.refresh_packets += 1
                    }
                    _ => self.stats.co_packets += 1,
                }
            }
            Err(_) => self.stats.packets_failed += 1,
        }
        result
    }

    fn decompress_inner(
        &mut self,
        rohc: &[u8],
        out: &mut [u8],
    ) -> Result<DecompressedPacket, DecompressError> {
        if self.features.contains(Features::DUMP_PACKETS) {
            trace!("decompressing {} bytes: {:02x?}", rohc.len(), rohc);
        }
        let (cid, type_octet, rest) = split_cid(self.cid_type, rohc)?;
        if usize::from(cid) >= self.contexts.capacity() {
            return Err(DecompressError::NoContext { cid });
        }
        let kind = detect_packet_kind(type_octet).ok_or(DecompressError::UnknownPacketType {
            packet_type: type_octet,
        })?;
        if kind == PacketKind::Segment {
            return Err(DecompressError::Segment);
        }
        if kind == PacketKind::Ir {
            return self.handle_ir(cid, type_octet, rest, out);
        }

        // passthrough contexts: everything after the CID is the packet
        if let Some(context) = self.contexts.get(cid) {
            if context.profile == ProfileId::UNCOMPRESSED {
                return self.handle_normal(cid, type_octet, rest, out);
            }
        }

        match kind {
            PacketKind::IrDyn => self.handle_refresh(cid, type_octet, rest, false, out),
            PacketKind::CoRepair => self.handle_refresh(cid, type_octet, rest, true, out),
            _ => self.handle_co(cid, kind, type_octet, rest, out),
        }
    }

    fn handle_ir(
        &mut self,
        cid: u16,
        type_octet: u8,
        rest: &[u8],
        out: &mut [u8],
    ) -> Result<DecompressedPacket, DecompressError> {
        let mut cursor = ReadCursor::new(rest);
        let profile = ProfileId(cursor.u16().ok_or(DecompressError::Malformed)?);
        let received_crc = cursor.u8().ok_or(DecompressError::Malformed)?;
        if !profile.is_implemented() || !self.enabled.contains(&profile) {
            return Err(DecompressError::ProfileNotEnabled { profile });
        }
        let compat = self.features.contains(Features::COMPAT_PRE_ERRATUM);
        let mut headers = parse_static_chain(&mut cursor, profile)
            .ok_or(DecompressError::Malformed)?;
        let dynamics = parse_dynamic_chain(&mut cursor, profile, &mut headers, compat)
            .ok_or(DecompressError::Malformed)?;

        let chains = &rest[3..rest.len() - cursor.remaining().len()];
        let crc = Crc8::new()
            .add_slice(&[type_octet, (profile.0 >> 8) as u8, profile.0 as u8, 0])
            .add_slice(chains)
            .value();
        if crc != received_crc {
            warn!("IR with bad CRC-8 on cid {}", cid);
            return Err(DecompressError::BadCrc { cid });
        }

        let payload = cursor.remaining();
        headers.set_payload_len(payload.len());
        let required = headers.serialized_len() + payload.len();
        if out.len() < required {
            return Err(DecompressError::OutputTooSmall {
                required,
                available: out.len(),
            });
        }

        if self.contexts.get(cid).is_some() {
            debug!("re-keying context {} from IR ({})", cid, profile);
        }
        let context = DecompressorContext::from_chains(cid, profile, headers, &dynamics);
        let msn = context.sn_ref;
        let header_len = context.headers.write_into(out);
        out[header_len..header_len + payload.len()].copy_from_slice(payload);
        self.contexts.insert(cid, context);
        self.contexts.touch(cid);

        self.queue_ack(cid, msn);
        Ok(DecompressedPacket {
            len: header_len + payload.len(),
            payload_offset: header_len,
            cid,
            profile,
            format: PacketFormat::Ir,
            repaired: false,
        })
    }

    /// IR-DYN and co_repair: a full dynamic refresh on an existing
    /// context.
    fn handle_refresh(
        &mut self,
        cid: u16,
        type_octet: u8,
        rest: &[u8],
        co_repair: bool,
        out: &mut [u8],
    ) -> Result<DecompressedPacket, DecompressError> {
        let compat = self.features.contains(Features::COMPAT_PRE_ERRATUM);
        let context = match self.contexts.get(cid) {
            Some(context) => context,
            None => {
                self.queue_nack(cid, AckType::StaticNack, 0);
                return Err(DecompressError::NoContext { cid });
            }
        };
        let profile = context.profile;
        if co_repair != profile.is_v2() {
            return Err(DecompressError::Malformed);
        }
        let mut cursor = ReadCursor::new(rest);
        let mut headers = context.headers.clone();
        let (received_crc8, received_crc7);
        if co_repair {
            received_crc8 = None;
            let crc7 = cursor.u8().ok_or(DecompressError::Malformed)?;
            if crc7 & 0x80 != 0 {
                return Err(DecompressError::Malformed);
            }
            received_crc7 = Some(crc7);
        } else {
            let profile_octets = cursor.u16().ok_or(DecompressError::Malformed)?;
            if profile_octets != profile.0 {
                return Err(DecompressError::Malformed);
            }
            received_crc8 = Some(cursor.u8().ok_or(DecompressError::Malformed)?);
            received_crc7 = None;
        }
        let dynamics = parse_dynamic_chain(&mut cursor, profile, &mut headers, compat)
            .ok_or(DecompressError::Malformed)?;
        let payload = cursor.remaining();
        headers.set_payload_len(payload.len());

        if let Some(received) = received_crc8 {
            let chains_end = rest.len() - cursor.remaining().len();
            let crc = Crc8::new()
                .add_slice(&[type_octet, (profile.0 >> 8) as u8, profile.0 as u8, 0])
                .add_slice(&rest[3..chains_end])
                .value();
            if crc != received {
                let fell = self
                    .contexts
                    .get_mut(cid)
                    .and_then(|c| c.record_crc_result(true));
                self.note_fall(cid, fell);
                return Err(DecompressError::BadCrc { cid });
            }
        }
        if let Some(received) = received_crc7 {
            if crc7_over_headers(&headers) != received {
                let fell = self
                    .contexts
                    .get_mut(cid)
                    .and_then(|c| c.record_crc_result(true));
                self.note_fall(cid, fell);
                return Err(DecompressError::BadCrc { cid });
            }
        }

        let required = headers.serialized_len() + payload.len();
        if out.len() < required {
            return Err(DecompressError::OutputTooSmall {
                required,
                available: out.len(),
            });
        }
        let header_len = headers.write_into(out);
        out[header_len..header_len + payload.len()].copy_from_slice(payload);

        let context = self.contexts.get_mut(cid).expect("context checked above");
        context.headers = headers;
        context.apply_dynamics(&dynamics);
        context.state = DecompressorState::FullContext;
        context.record_crc_result(false);
        let msn = context.sn_ref;
        self.contexts.touch(cid);
        self.queue_ack(cid, msn);
        Ok(DecompressedPacket {
            len: header_len + payload.len(),
            payload_offset: header_len,
            cid,
            profile,
            format: if co_repair {
                PacketFormat::CoRepair
            } else {
                PacketFormat::IrDyn
            },
            repaired: false,
        })
    }

    fn handle_normal(
        &mut self,
        cid: u16,
        type_octet: u8,
        rest: &[u8],
        out: &mut [u8],
    ) -> Result<DecompressedPacket, DecompressError> {
        let required = 1 + rest.len();
        if out.len() < required {
            return Err(DecompressError::OutputTooSmall {
                required,
                available: out.len(),
            });
        }
        out[0] = type_octet;
        out[1..required].copy_from_slice(rest);
        self.contexts.touch(cid);
        Ok(DecompressedPacket {
            len: required,
            payload_offset: 0,
            cid,
            profile: ProfileId::UNCOMPRESSED,
            format: PacketFormat::Normal,
            repaired: false,
        })
    }

    fn handle_co(
        &mut self,
        cid: u16,
        kind: PacketKind,
        type_octet: u8,
        rest: &[u8],
        out: &mut [u8],
    ) -> Result<DecompressedPacket, DecompressError> {
        let compat = self.features.contains(Features::COMPAT_PRE_ERRATUM);
        let context = match self.contexts.get(cid) {
            Some(context) => context,
            None => {
                self.queue_nack(cid, AckType::StaticNack, 0);
                return Err(DecompressError::NoContext { cid });
            }
        };
        match context.state {
            DecompressorState::NoContext => {
                self.queue_nack(cid, AckType::StaticNack, 0);
                return Err(DecompressError::NoContext { cid });
            }
            DecompressorState::StaticContext => {
                // only the 7 bit CRC formats are trusted without a
                // dynamic context
                if !matches!(kind, PacketKind::Pt2 | PacketKind::CoCommon | PacketKind::CoCommonAlias)
                {
                    let msn = context.sn_ref;
                    self.queue_nack(cid, AckType::Nack, msn);
                    return Err(DecompressError::InsufficientState { cid });
                }
            }
            DecompressorState::FullContext => {}
        }
        if matches!(kind, PacketKind::CoCommon | PacketKind::CoCommonAlias)
            && !context.profile.is_v2()
        {
            return Err(DecompressError::UnknownPacketType {
                packet_type: type_octet,
            });
        }

        let mut cursor = ReadCursor::new(rest);
        let bits = read_co_packet(kind, type_octet, &mut cursor, context.reader_context())
            .ok_or(DecompressError::Malformed)?;
        let payload = cursor.remaining();

        let mut accepted: Option<(Candidate, bool)> = None;
        for (attempt, tweak) in repair_plan(context, &bits).into_iter().enumerate() {
            let tweak = match tweak {
                Some(tweak) => tweak,
                None => continue,
            };
            if let Some(candidate) = context.decode(&bits, payload.len(), tweak) {
                if self.crc_matches(context, &bits, &candidate, compat) {
                    if attempt > 0 {
                        debug!("context {} repaired with attempt {}", cid, attempt);
                    }
                    accepted = Some((candidate, attempt > 0));
                    break;
                }
            }
        }

        let profile = context.profile;
        match accepted {
            Some((candidate, repaired)) => {
                let required = candidate.headers.serialized_len() + payload.len();
                if out.len() < required {
                    return Err(DecompressError::OutputTooSmall {
                        required,
                        available: out.len(),
                    });
                }
                let header_len = candidate.headers.write_into(out);
                out[header_len..header_len + payload.len()].copy_from_slice(payload);
                let msn = candidate.sn_value;
                let format = bits.format.unwrap_or(PacketFormat::Uo0);
                let context = self.contexts.get_mut(cid).expect("context checked above");
                context.commit(candidate);
                context.record_crc_result(false);
                self.contexts.touch(cid);
                if repaired {
                    self.stats.repairs += 1;
                }
                if self.mode == RohcMode::BidirectionalReliable {
                    self.queue_ack(cid, msn);
                }
                Ok(DecompressedPacket {
                    len: header_len + payload.len(),
                    payload_offset: header_len,
                    cid,
                    profile,
                    format,
                    repaired,
                })
            }
            None => {
                let msn = context.sn_ref;
                let was_static = context.state == DecompressorState::StaticContext;
                let fell = self
                    .contexts
                    .get_mut(cid)
                    .and_then(|c| c.record_crc_result(true));
                self.note_fall(cid, fell);
                if was_static || fell == Some(DecompressorState::StaticContext) {
                    self.queue_nack(cid, AckType::StaticNack, msn);
                } else {
                    self.queue_nack(cid, AckType::Nack, msn);
                }
                Err(DecompressError::BadCrc { cid })
            }
        }
    }

    fn crc_matches(
        &self,
        context: &DecompressorContext,
        bits: &ExtractedBits,
        candidate: &Candidate,
        compat: bool,
    ) -> bool {
        if let Some(received) = bits.crc7 {
            if crc7_over_headers(&candidate.headers) != received {
                return false;
            }
        }
        if let Some(received) = bits.crc3 {
            if bits.msn16.is_some() {
                // co_common carries a control field CRC instead
                let expected = control_crc3(
                    context.reorder_ratio,
                    candidate.msn,
                    &context.behaviors,
                    compat,
                );
                if expected != received {
                    return false;
                }
            } else if crc3_over_headers(&candidate.headers) != received {
                return false;
            }
        }
        bits.crc3.is_some() || bits.crc7.is_some()
    }

    fn note_fall(&mut self, cid: u16, fell: Option<DecompressorState>) {
        if let Some(state) = fell {
            warn!("context {} fell to {:?}", cid, state);
            if state == DecompressorState::NoContext {
                self.contexts.remove(cid);
            }
        }
    }

    fn queue_ack(&mut self, cid: u16, msn: u32) {
        if self.mode == RohcMode::Unidirectional {
            return;
        }
        let with_crc = self.mode == RohcMode::BidirectionalReliable;
        let element = build_feedback2(
            self.cid_type,
            cid,
            AckType::Ack,
            self.mode,
            msn & 0xfffff,
            with_crc,
        );
        self.feedback.push_back(element);
        self.stats.feedback_elements += 1;
    }

    fn queue_nack(&mut self, cid: u16, ack_type: AckType, msn: u32) {
        if self.mode == RohcMode::Unidirectional {
            return;
        }
        let element = build_feedback2(
            self.cid_type,
            cid,
            ack_type,
            self.mode,
            msn & 0xfffff,
            true,
        );
        self.feedback.push_back(element);
        self.stats.feedback_elements += 1;
    }
}

/// The decode attempts in order: plain, sequence number wrap
/// correction, timestamp clock correction, reference rollback.
/// Repairs only run on full contexts and only for formats carrying
/// the 7 bit CRC; a 3 bit CRC accepts a wrong repair once in eight
/// tries, which is worse than dropping the packet.
fn repair_plan(
    context: &DecompressorContext,
    bits: &ExtractedBits,
) -> [Option<DecodeTweak>; 4] {
    let mut plan = [None; 4];
    plan[0] = Some(DecodeTweak::default());
    if context.state != DecompressorState::FullContext || bits.crc7.is_none() {
        return plan;
    }
    if let Some((_, sn_bits)) = bits.sn {
        if sn_bits < context.sn_field_bits {
            plan[1] = Some(DecodeTweak {
                sn_ref_add: 1 << sn_bits,
                ..Default::default()
            });
        }
    }
    if bits.ts.is_none() && context.ts_stride != 0 {
        plan[2] = Some(DecodeTweak {
            ts_extra_stride: true,
            ..Default::default()
        });
    }
    if context.headers_prev.is_some() {
        plan[3] = Some(DecodeTweak {
            use_prev: true,
            ..Default::default()
        });
    }
    plan
}
