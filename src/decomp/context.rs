use crate::coding::{lsb_decode, LsbShift, ReorderRatio};
use crate::comp::swap16;
use crate::decomp::ExtractedBits;
use crate::decomp::ReaderContext;
use crate::wire::ChainDynamics;
use crate::{
    IpHeader, IpIdBehavior, ProfileId, TransportHeader, UncompHeaders,
};
use arrayvec::ArrayVec;

/// Decompression state of one context (RFC 3095 §4.3.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecompressorState {
    /// Nothing trustworthy; only IR packets are accepted.
    NoContext,
    /// The static part is valid, the dynamic part is not.
    StaticContext,
    /// Full context; all packet kinds are accepted.
    FullContext,
}

/// CRC failure thresholds: `k` failures within the last `n` attempts
/// demote the state.
pub(crate) const FC_FAILURES: u8 = 2;
pub(crate) const FC_WINDOW: u8 = 8;
pub(crate) const SC_FAILURES: u8 = 16;
pub(crate) const SC_WINDOW: u8 = 16;

/// Sliding success/failure window.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RingCounter {
    bits: u32,
    len: u8,
}

impl RingCounter {
    pub(crate) fn record(&mut self, failed: bool, capacity: u8) {
        self.bits = (self.bits << 1) | u32::from(failed);
        if self.len < capacity {
            self.len += 1;
        }
        self.bits &= (1u32 << capacity) - 1;
    }

    pub(crate) fn failures(&self, capacity: u8) -> u8 {
        (self.bits & ((1u32 << capacity) - 1)).count_ones() as u8
    }

    pub(crate) fn reset(&mut self) {
        self.bits = 0;
        self.len = 0;
    }
}

/// Which reference a decode attempt uses and which repair is applied.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct DecodeTweak {
    /// Use `REF_MINUS_1` instead of the latest reference.
    pub use_prev: bool,
    /// Added to the sequence number reference (SN wrap repair uses
    /// `2^k`).
    pub sn_ref_add: u32,
    /// Assume one extra timestamp stride (clock repair).
    pub ts_extra_stride: bool,
}

/// A fully reconstructed packet candidate, pending CRC verification.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub headers: UncompHeaders,
    pub sn_value: u32,
    pub msn: u16,
    pub ipid_offsets: [u16; 2],
}

/// Per-flow state of the decompressor.
#[derive(Clone, Debug)]
pub(crate) struct DecompressorContext {
    pub cid: u16,
    pub profile: ProfileId,
    pub state: DecompressorState,
    /// Headers of the last accepted packet (`REF_0`).
    pub headers: UncompHeaders,
    /// Headers of the packet before that (`REF_MINUS_1`).
    pub headers_prev: Option<UncompHeaders>,
    pub sn_ref: u32,
    pub sn_prev: Option<u32>,
    pub sn_field_bits: u8,
    pub sn_shift: LsbShift,
    /// Timestamp scaling parameters; a stride of zero means raw
    /// timestamps.
    pub ts_stride: u32,
    pub ts_offset: u32,
    pub behaviors: ArrayVec<Option<IpIdBehavior>, 2>,
    pub ipid_offset_ref: [u16; 2],
    pub ipid_offset_prev: [u16; 2],
    pub udp_checksum_used: bool,
    pub reorder_ratio: ReorderRatio,
    pub(crate) fc_ring: RingCounter,
    pub(crate) sc_ring: RingCounter,
}

impl DecompressorContext {
    /// Builds a context from the chains of an accepted IR packet.
    pub(crate) fn from_chains(
        cid: u16,
        profile: ProfileId,
        headers: UncompHeaders,
        dynamics: &ChainDynamics,
    ) -> DecompressorContext {
        let sn_shift = if profile.is_v2() {
            LsbShift::Msn(dynamics.reorder_ratio)
        } else {
            LsbShift::RtpSn
        };
        let sn_field_bits = if profile == ProfileId::ESP { 32 } else { 16 };
        let mut ctx = DecompressorContext {
            cid,
            profile,
            state: DecompressorState::FullContext,
            headers,
            headers_prev: None,
            sn_ref: 0,
            sn_prev: None,
            sn_field_bits,
            sn_shift,
            ts_stride: 0,
            ts_offset: 0,
            behaviors: dynamics.behaviors.clone(),
            ipid_offset_ref: [0; 2],
            ipid_offset_prev: [0; 2],
            udp_checksum_used: false,
            reorder_ratio: dynamics.reorder_ratio,
            fc_ring: RingCounter::default(),
            sc_ring: RingCounter::default(),
        };
        ctx.apply_dynamics(dynamics);
        ctx
    }

    /// Re-applies a dynamic chain (IR, IR-DYN, co_repair) to the
    /// context whose header skeleton was already updated.
    pub(crate) fn apply_dynamics(&mut self, dynamics: &ChainDynamics) {
        self.behaviors = dynamics.behaviors.clone();
        self.reorder_ratio = dynamics.reorder_ratio;
        if self.profile.is_v2() {
            self.sn_shift = LsbShift::Msn(dynamics.reorder_ratio);
        }
        self.sn_ref = match self.profile {
            p if p == ProfileId::RTP => self
                .headers
                .rtp
                .as_ref()
                .map(|rtp| u32::from(rtp.sequence_number))
                .unwrap_or(0),
            p if p == ProfileId::ESP => match &self.headers.transport {
                Some(TransportHeader::Esp(esp)) => esp.sequence_number,
                _ => 0,
            },
            _ => u32::from(dynamics.msn.unwrap_or(0)),
        };
        self.sn_prev = None;
        match dynamics.ts_stride {
            Some(stride) => {
                self.ts_stride = stride;
                self.ts_offset = self
                    .headers
                    .rtp
                    .as_ref()
                    .map(|rtp| rtp.timestamp % stride)
                    .unwrap_or(0);
            }
            None => {
                self.ts_stride = 0;
                self.ts_offset = 0;
            }
        }
        self.udp_checksum_used = match &self.headers.transport {
            Some(TransportHeader::Udp(udp)) => udp.checksum != 0,
            Some(TransportHeader::UdpLite(_)) => true,
            _ => false,
        };
        for (idx, header) in self.headers.ip.iter().enumerate() {
            if let IpHeader::V4(v4) = header {
                let behavior = self.behaviors.get(idx).copied().flatten();
                let msn = self.sn_ref as u16;
                self.ipid_offset_ref[idx] = match behavior {
                    Some(IpIdBehavior::Sequential) => v4.identification.wrapping_sub(msn),
                    Some(IpIdBehavior::SequentialSwapped) => {
                        swap16(v4.identification).wrapping_sub(msn)
                    }
                    _ => 0,
                };
            }
        }
        self.ipid_offset_prev = self.ipid_offset_ref;
    }

    /// What the packet reader needs to know about this context.
    pub(crate) fn reader_context(&self) -> ReaderContext {
        let mut seq = 0u8;
        let mut rand = 0u8;
        for behavior in self.behaviors.iter().copied().flatten() {
            match behavior {
                IpIdBehavior::Sequential | IpIdBehavior::SequentialSwapped => seq += 1,
                IpIdBehavior::Random => rand += 1,
                IpIdBehavior::Zero => {}
            }
        }
        ReaderContext {
            is_rtp: self.profile == ProfileId::RTP,
            is_v2: self.profile.is_v2(),
            seq_v4_count: seq,
            rand_v4_count: rand,
            udp_checksum_used: self.udp_checksum_used,
        }
    }

    /// Index of the innermost IPv4 header with a sequential IP-ID (the
    /// one whose offset compressed packets carry).
    fn innermost_seq_idx(&self) -> Option<usize> {
        self.behaviors
            .iter()
            .rposition(|b| b.map(|b| b.is_sequential()).unwrap_or(false))
    }

    /// Reconstructs a packet candidate from staged bits. `None` when
    /// the bits are unusable (malformed counts, missing references).
    pub(crate) fn decode(
        &self,
        bits: &ExtractedBits,
        payload_len: usize,
        tweak: DecodeTweak,
    ) -> Option<Candidate> {
        let base_headers = if tweak.use_prev {
            self.headers_prev.as_ref()?
        } else {
            &self.headers
        };
        let base_sn_ref = if tweak.use_prev {
            self.sn_prev?
        } else {
            self.sn_ref
        };
        let sn_ref = base_sn_ref.wrapping_add(tweak.sn_ref_add);
        let ipid_refs = if tweak.use_prev {
            self.ipid_offset_prev
        } else {
            self.ipid_offset_ref
        };

        let sn_value = match (bits.msn16, bits.sn) {
            (Some(msn16), _) => u32::from(msn16),
            (None, Some((lsb, count))) => {
                lsb_decode(lsb, count, sn_ref, self.sn_shift, self.sn_field_bits)?
            }
            (None, None) => return None,
        };
        let msn = sn_value as u16;
        // field deltas (timestamp inference) run from the real last
        // accepted packet, not from a wrap-corrected reference
        let msn_delta = msn.wrapping_sub(base_sn_ref as u16);

        let mut headers = base_headers.clone();

        if let Some(ttl) = bits.co_common_ttl {
            match headers.ip.last_mut()? {
                IpHeader::V4(v4) => v4.time_to_live = ttl,
                IpHeader::V6(v6) => v6.hop_limit = ttl,
            }
        }
        if let Some(tos) = bits.co_common_tos {
            match headers.ip.last_mut()? {
                IpHeader::V4(v4) => {
                    v4.dscp = tos >> 2;
                    v4.ecn = tos & 0b11;
                }
                IpHeader::V6(v6) => v6.traffic_class = tos,
            }
        }

        // sequence number & marker
        if let Some(rtp) = headers.rtp.as_mut() {
            rtp.sequence_number = msn;
            rtp.marker = bits.marker.unwrap_or(false);
        }
        if let Some(TransportHeader::Esp(esp)) = headers.transport.as_mut() {
            if self.profile == ProfileId::ESP {
                esp.sequence_number = sn_value;
            }
        }

        // timestamp
        self.apply_ts(&mut headers, bits, msn_delta, tweak)?;

        // IP-IDs
        let mut ipid_offsets = ipid_refs;
        let seq_idx = self.innermost_seq_idx();
        if let (Some((lsb, count)), Some(idx)) = (bits.ip_id, seq_idx) {
            let offset = if count >= 16 {
                lsb as u16
            } else {
                lsb_decode(lsb, count, u32::from(ipid_refs[idx]), LsbShift::IpId, 16)? as u16
            };
            ipid_offsets[idx] = offset;
        }
        let mut rand_at = 0usize;
        for (idx, header) in headers.ip.iter_mut().enumerate() {
            if let IpHeader::V4(v4) = header {
                match self.behaviors.get(idx).copied().flatten() {
                    Some(IpIdBehavior::Sequential) => {
                        v4.identification = msn.wrapping_add(ipid_offsets[idx]);
                    }
                    Some(IpIdBehavior::SequentialSwapped) => {
                        v4.identification = swap16(msn.wrapping_add(ipid_offsets[idx]));
                    }
                    Some(IpIdBehavior::Zero) => {
                        v4.identification = 0;
                    }
                    Some(IpIdBehavior::Random) => {
                        v4.identification = *bits.rand_ip_ids.get(rand_at)?;
                        rand_at += 1;
                    }
                    None => {}
                }
            }
        }

        // irregular transport fields
        match headers.transport.as_mut() {
            Some(TransportHeader::Udp(udp)) => {
                udp.checksum = bits.udp_checksum.unwrap_or(0);
            }
            Some(TransportHeader::UdpLite(udp_lite)) => {
                if let Some(checksum) = bits.udp_checksum {
                    udp_lite.checksum = checksum;
                }
            }
            _ => {}
        }

        headers.set_payload_len(payload_len);

        Some(Candidate {
            headers,
            sn_value,
            msn,
            ipid_offsets,
        })
    }

    fn apply_ts(
        &self,
        headers: &mut UncompHeaders,
        bits: &ExtractedBits,
        msn_delta: u16,
        tweak: DecodeTweak,
    ) -> Option<()> {
        let rtp = match headers.rtp.as_mut() {
            Some(rtp) => rtp,
            None => return Some(()),
        };
        let ts_ref = rtp.timestamp;
        let scaled_mode = self.ts_stride != 0;
        let new_ts = match bits.ts {
            Some(ts_bits) => {
                let in_scaled_domain = ts_bits.scaled.unwrap_or(scaled_mode);
                if in_scaled_domain && scaled_mode {
                    let scaled_ref = ts_ref.wrapping_sub(self.ts_offset) / self.ts_stride;
                    let scaled = lsb_decode(
                        ts_bits.value,
                        ts_bits.bits,
                        scaled_ref,
                        LsbShift::Ts,
                        32,
                    )?;
                    scaled
                        .wrapping_mul(self.ts_stride)
                        .wrapping_add(self.ts_offset)
                } else {
                    lsb_decode(ts_bits.value, ts_bits.bits, ts_ref, LsbShift::Ts, 32)?
                }
            }
            None => {
                if scaled_mode {
                    let mut steps = u32::from(msn_delta);
                    if tweak.ts_extra_stride {
                        steps = steps.wrapping_add(1);
                    }
                    ts_ref.wrapping_add(steps.wrapping_mul(self.ts_stride))
                } else {
                    ts_ref
                }
            }
        };
        rtp.timestamp = new_ts;
        Some(())
    }

    /// Accepts a verified candidate: the references roll forward.
    pub(crate) fn commit(&mut self, candidate: Candidate) {
        self.headers_prev = Some(core::mem::replace(&mut self.headers, candidate.headers));
        self.sn_prev = Some(self.sn_ref);
        self.sn_ref = candidate.sn_value;
        self.ipid_offset_prev = self.ipid_offset_ref;
        self.ipid_offset_ref = candidate.ipid_offsets;
        self.state = DecompressorState::FullContext;
    }

    /// Records a CRC verdict and applies the confidence thresholds.
    /// Returns the state the context fell to, if it fell.
    pub(crate) fn record_crc_result(&mut self, failed: bool) -> Option<DecompressorState> {
        match self.state {
            DecompressorState::FullContext => {
                self.fc_ring.record(failed, FC_WINDOW);
                if self.fc_ring.failures(FC_WINDOW) >= FC_FAILURES {
                    self.state = DecompressorState::StaticContext;
                    self.fc_ring.reset();
                    self.sc_ring.reset();
                    return Some(DecompressorState::StaticContext);
                }
            }
            DecompressorState::StaticContext => {
                self.sc_ring.record(failed, SC_WINDOW);
                if self.sc_ring.failures(SC_WINDOW) >= SC_FAILURES {
                    self.state = DecompressorState::NoContext;
                    self.sc_ring.reset();
                    return Some(DecompressorState::NoContext);
                }
            }
            DecompressorState::NoContext => {}
        }
        None
    }
}
