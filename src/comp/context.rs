use crate::coding::{LsbShift, ReorderRatio, WlsbWindow};
use crate::comp::{FieldBudget, IpIdState, TsStride};
use crate::{
    IpHeader, IpIdBehavior, ProfileId, RohcMode, TransportHeader, UncompHeaders,
};
use arrayvec::ArrayVec;

/// Compression state of one context (RFC 3095 §4.3.1).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompressorState {
    /// Initialization & Refresh: only IR packets leave the context.
    Ir,
    /// First Order: the static part is established, dynamic fields are
    /// still being learned.
    Fo,
    /// Second Order: fully converged.
    So,
}

/// Number of IR packets before the compressor optimistically assumes
/// the decompressor holds the static context.
pub const MAX_IR_COUNT: u8 = 3;

/// Number of consecutive first-order packets before the compressor
/// advances to second order.
pub const MAX_FO_COUNT: u8 = 6;

/// U-mode periodic refresh intervals, in packets.
pub const IR_REFRESH_PACKETS: u32 = 70;
pub const FO_REFRESH_PACKETS: u32 = 30;

/// Extra IR refresh interval with `TIME_BASED_REFRESHES`.
pub const IR_REFRESH_MILLIS: u64 = 1000;

/// Everything one `compress` call computed about a packet before any
/// context mutation: the new field values, the re-evaluated trackers
/// and the bit budget. Committed only after the packet bytes are
/// written.
pub(crate) struct PacketVars {
    pub msn: u16,
    /// Value the sequence number window tracks: the MSN, except for
    /// ESP where the full 32 bit sequence number is coded.
    pub sn_value: u32,
    /// Timestamp value as it would be transmitted (scaled once scaling
    /// flows), if the packet has an RTP header.
    pub ts_value: Option<u32>,
    /// IP-ID offsets relative to the new MSN, per IP header.
    pub ipid_offsets: [u16; 2],
    pub budget: FieldBudget,
    pub ts: Option<TsStride>,
    pub ip_id: ArrayVec<Option<IpIdState>, 2>,
    /// Effective state the packet is emitted in (periodic refreshes
    /// and static changes can demote the context for this packet).
    pub state: CompressorState,
    pub udp_checksum_used: bool,
}

/// Per-flow state of the compressor.
#[derive(Clone, Debug)]
pub(crate) struct CompressorContext {
    pub cid: u16,
    pub profile: ProfileId,
    pub mode: RohcMode,
    pub state: CompressorState,
    /// Headers of the last committed packet.
    pub headers: UncompHeaders,
    pub msn: u16,
    pub sn_window: WlsbWindow,
    pub ts: Option<TsStride>,
    pub ip_id: ArrayVec<Option<IpIdState>, 2>,
    /// Behaviors last announced in a dynamic chain.
    pub announced_behaviors: ArrayVec<Option<IpIdBehavior>, 2>,
    pub udp_checksum_used: bool,
    pub reorder_ratio: ReorderRatio,
    ir_count: u8,
    fo_count: u8,
    packets_since_ir: u32,
    packets_since_fo_refresh: u32,
    last_ir_millis: u64,
    /// Per-context refresh jitter so contexts do not refresh in
    /// lockstep.
    refresh_jitter: u32,
    /// A negative acknowledgement arrived; the next packet must carry
    /// a dynamic refresh.
    pending_refresh: bool,
}

impl CompressorContext {
    pub(crate) fn new(
        cid: u16,
        profile: ProfileId,
        headers: UncompHeaders,
        window_width: u8,
        initial_msn: u16,
        reorder_ratio: ReorderRatio,
        refresh_jitter: u32,
        now_millis: u64,
    ) -> CompressorContext {
        let sn_shift = if profile.is_v2() {
            LsbShift::Msn(reorder_ratio)
        } else {
            LsbShift::RtpSn
        };
        let sn_field_bits = if profile == ProfileId::ESP { 32 } else { 16 };
        let msn = match msn_of(profile, &headers) {
            Some(msn) => msn,
            None => initial_msn,
        };
        let ts = headers
            .rtp
            .as_ref()
            .map(|rtp| TsStride::new(window_width, rtp.timestamp));
        let mut ip_id: ArrayVec<Option<IpIdState>, 2> = ArrayVec::new();
        let mut announced_behaviors = ArrayVec::new();
        for header in &headers.ip {
            match header {
                IpHeader::V4(v4) => {
                    let state = IpIdState::new(window_width, v4.identification);
                    announced_behaviors.push(Some(state.behavior));
                    ip_id.push(Some(state));
                }
                IpHeader::V6(_) => {
                    announced_behaviors.push(None);
                    ip_id.push(None);
                }
            }
        }
        let udp_checksum_used = match &headers.transport {
            Some(TransportHeader::Udp(udp)) => udp.checksum != 0,
            _ => false,
        };
        CompressorContext {
            cid,
            profile,
            mode: RohcMode::Unidirectional,
            state: CompressorState::Ir,
            headers,
            msn,
            sn_window: WlsbWindow::new(window_width, sn_field_bits, sn_shift),
            ts,
            ip_id,
            announced_behaviors,
            udp_checksum_used,
            reorder_ratio,
            ir_count: 0,
            fo_count: 0,
            packets_since_ir: 0,
            packets_since_fo_refresh: 0,
            last_ir_millis: now_millis,
            refresh_jitter,
            pending_refresh: false,
        }
    }

    /// True if the packet belongs to this context's flow (same profile
    /// and static chain).
    pub(crate) fn matches_flow(&self, profile: ProfileId, headers: &UncompHeaders) -> bool {
        if self.profile != profile {
            return false;
        }
        if profile == ProfileId::UNCOMPRESSED {
            // one passthrough context per engine is enough
            return true;
        }
        if !static_chain_equal(&self.headers, headers) {
            return false;
        }
        match (&self.headers.rtp, &headers.rtp) {
            (Some(a), Some(b)) => a.ssrc == b.ssrc,
            (None, None) => true,
            _ => false,
        }
    }

    /// Analyzes one packet against the context: new master sequence
    /// number, re-evaluated trackers, bit budget and the state the
    /// packet will be emitted in. Leaves the context untouched.
    pub(crate) fn analyze(
        &self,
        headers: &UncompHeaders,
        now_millis: u64,
        time_based_refresh: bool,
    ) -> PacketVars {
        if self.profile == ProfileId::UNCOMPRESSED {
            // passthrough: no field analysis, no state demotions
            return PacketVars {
                msn: self.msn.wrapping_add(1),
                sn_value: u32::from(self.msn.wrapping_add(1)),
                ts_value: None,
                ipid_offsets: [0; 2],
                budget: FieldBudget::default(),
                ts: None,
                ip_id: ArrayVec::new(),
                state: self.state,
                udp_checksum_used: false,
            };
        }

        let msn = match msn_of(self.profile, headers) {
            Some(msn) => msn,
            None => self.msn.wrapping_add(1),
        };
        let msn_delta = msn.wrapping_sub(self.msn);
        let sn_value = match &headers.transport {
            Some(TransportHeader::Esp(esp)) if self.profile == ProfileId::ESP => {
                esp.sequence_number
            }
            _ => u32::from(msn),
        };

        let mut budget = FieldBudget {
            nr_sn: self.sn_window.nr_bits_required(sn_value),
            ..Default::default()
        };
        budget.static_changed = !static_chain_equal(&self.headers, headers)
            || match (&self.headers.rtp, &headers.rtp) {
                (Some(a), Some(b)) => a.ssrc != b.ssrc,
                (None, None) => false,
                _ => true,
            };

        // RTP timestamp subsystem
        let mut ts_next = self.ts.clone();
        let mut ts_value = None;
        if let (Some(ts_state), Some(rtp)) = (&self.ts, &headers.rtp) {
            budget.ts_deducible = ts_state.is_deducible(rtp.timestamp, msn_delta);
            budget.nr_ts = ts_state.nr_bits(rtp.timestamp);
            ts_value = Some(ts_state.transmitted_value(rtp.timestamp));
            if let Some(ts_next) = ts_next.as_mut() {
                ts_next.observe(rtp.timestamp);
                budget.stride_announcing = ts_next.needs_announcement();
            }
        } else {
            budget.ts_deducible = true;
        }

        // IP-ID trackers; the first packet of a flow is the one the
        // trackers were seeded from and carries no delta to observe
        let first_packet = self.sn_window.is_empty();
        let mut ip_id_next = self.ip_id.clone();
        let mut ipid_offsets = [0u16; 2];
        for (idx, (tracker, header)) in
            ip_id_next.iter_mut().zip(headers.ip.iter()).enumerate()
        {
            if let (Some(tracker), IpHeader::V4(v4)) = (tracker.as_mut(), header) {
                let behavior = if first_packet {
                    tracker.behavior
                } else {
                    tracker.observe(v4.identification, msn_delta)
                };
                if Some(Some(behavior)) != self.announced_behaviors.get(idx).copied() {
                    budget.dyn_changed = true;
                }
                if behavior.is_sequential() {
                    budget.seq_v4_count += 1;
                    let offset = tracker.offset(v4.identification, msn);
                    ipid_offsets[idx] = offset;
                    budget.nr_ipid[idx] =
                        tracker.offset_window.nr_bits_required(u32::from(offset));
                }
            }
        }

        // dynamic fields no compressed format can carry
        budget.dyn_changed |= dynamic_fields_changed(&self.headers, headers);
        budget.dyn_changed |= self.pending_refresh;
        let udp_checksum_used = match &headers.transport {
            Some(TransportHeader::Udp(udp)) => udp.checksum != 0,
            _ => false,
        };
        if udp_checksum_used != self.udp_checksum_used {
            // checksum behavior flip re-initializes the context
            budget.static_changed = true;
        }
        if let Some(rtp) = &headers.rtp {
            budget.marker = rtp.marker;
        }

        // periodic refreshes keep the converged state; only real field
        // changes demote the context
        let mut state = self.state;
        if budget.static_changed {
            state = CompressorState::Ir;
        } else if self.mode == RohcMode::Unidirectional {
            if self.packets_since_ir >= IR_REFRESH_PACKETS + self.refresh_jitter {
                budget.refresh_ir = true;
            } else if state == CompressorState::So
                && self.packets_since_fo_refresh >= FO_REFRESH_PACKETS + self.refresh_jitter
            {
                budget.refresh_dyn = true;
            }
        }
        if time_based_refresh
            && now_millis.saturating_sub(self.last_ir_millis) >= IR_REFRESH_MILLIS
        {
            budget.refresh_ir = true;
        }

        PacketVars {
            msn,
            sn_value,
            ts_value,
            ipid_offsets,
            budget,
            ts: ts_next,
            ip_id: ip_id_next,
            state,
            udp_checksum_used,
        }
    }

    /// Applies a successfully written packet to the context.
    pub(crate) fn commit(
        &mut self,
        vars: PacketVars,
        headers: &UncompHeaders,
        format: crate::PacketFormat,
        now_millis: u64,
    ) {
        use crate::PacketFormat;

        self.state = vars.state;
        self.msn = vars.msn;
        self.ts = vars.ts;
        self.ip_id = vars.ip_id;
        self.udp_checksum_used = vars.udp_checksum_used;
        self.headers = headers.clone();

        self.sn_window.push(vars.sn_value);
        for (tracker, header) in self.ip_id.iter_mut().zip(self.headers.ip.iter()) {
            if let (Some(tracker), IpHeader::V4(v4)) = (tracker.as_mut(), header) {
                if tracker.behavior.is_sequential() {
                    let offset = tracker.offset(v4.identification, vars.msn);
                    tracker.offset_window.push(u32::from(offset));
                }
            }
        }

        self.packets_since_ir = self.packets_since_ir.wrapping_add(1);
        self.packets_since_fo_refresh = self.packets_since_fo_refresh.wrapping_add(1);

        if format.refreshes_dynamics() {
            self.pending_refresh = false;
            // the chain announced the current behaviors & stride
            self.announced_behaviors.clear();
            for tracker in &self.ip_id {
                self.announced_behaviors
                    .push(tracker.as_ref().map(|t| t.behavior));
            }
            if let Some(ts) = self.ts.as_mut() {
                if ts.announced_stride().is_some() {
                    ts.note_stride_sent();
                }
            }
            self.packets_since_fo_refresh = 0;
        }

        match format {
            PacketFormat::Ir => {
                self.packets_since_ir = 0;
                self.last_ir_millis = now_millis;
                if self.profile == ProfileId::UNCOMPRESSED {
                    // nothing to learn; pass packets through from now on
                    self.state = CompressorState::So;
                } else if self.state == CompressorState::Ir {
                    self.ir_count = self.ir_count.saturating_add(1);
                    if self.ir_count >= MAX_IR_COUNT {
                        self.state = CompressorState::Fo;
                        self.fo_count = 0;
                        self.ir_count = 0;
                    }
                }
            }
            PacketFormat::Normal => {
                // passthrough context converges immediately
                self.state = CompressorState::So;
            }
            PacketFormat::IrDyn | PacketFormat::CoRepair => {
                if (vars.budget.dyn_changed || vars.budget.stride_announcing)
                    && self.state == CompressorState::So
                {
                    self.state = CompressorState::Fo;
                }
                self.fo_count = 0;
            }
            _ => {
                if self.state == CompressorState::Fo {
                    self.fo_count = self.fo_count.saturating_add(1);
                    if self.fo_count >= MAX_FO_COUNT {
                        self.state = CompressorState::So;
                    }
                }
            }
        }
    }

    /// Positive acknowledgement from the peer.
    pub(crate) fn ack(&mut self, sn: u32, sn_bits: u8) {
        self.sn_window.ack_lsb(sn, sn_bits);
        if self.state == CompressorState::Ir {
            self.state = CompressorState::Fo;
            self.fo_count = 0;
        }
    }

    /// Negative acknowledgement: dynamic context damage.
    pub(crate) fn nack(&mut self) {
        if self.state == CompressorState::So {
            self.state = CompressorState::Fo;
            self.fo_count = 0;
        }
        self.pending_refresh = true;
    }

    /// Static context damage: start over with IR packets.
    pub(crate) fn static_nack(&mut self) {
        self.state = CompressorState::Ir;
        self.ir_count = 0;
        self.sn_window.clear();
        self.pending_refresh = true;
    }
}

/// Master sequence number carried by the packet itself, if the profile
/// has one.
fn msn_of(profile: ProfileId, headers: &UncompHeaders) -> Option<u16> {
    if profile == ProfileId::RTP {
        headers.rtp.as_ref().map(|rtp| rtp.sequence_number)
    } else if profile == ProfileId::ESP {
        match &headers.transport {
            Some(TransportHeader::Esp(esp)) => Some(esp.sequence_number as u16),
            _ => None,
        }
    } else {
        None
    }
}

fn static_chain_equal(a: &UncompHeaders, b: &UncompHeaders) -> bool {
    if a.ip.len() != b.ip.len() {
        return false;
    }
    for (ha, hb) in a.ip.iter().zip(b.ip.iter()) {
        let equal = match (ha, hb) {
            (IpHeader::V4(a), IpHeader::V4(b)) => {
                a.source == b.source && a.destination == b.destination && a.protocol == b.protocol
            }
            (IpHeader::V6(a), IpHeader::V6(b)) => {
                a.source == b.source
                    && a.destination == b.destination
                    && a.next_header == b.next_header
                    && a.flow_label == b.flow_label
            }
            _ => false,
        };
        if !equal {
            return false;
        }
    }
    match (&a.transport, &b.transport) {
        (Some(TransportHeader::Udp(a)), Some(TransportHeader::Udp(b))) => {
            a.source_port == b.source_port && a.destination_port == b.destination_port
        }
        (Some(TransportHeader::UdpLite(a)), Some(TransportHeader::UdpLite(b))) => {
            a.source_port == b.source_port && a.destination_port == b.destination_port
        }
        (Some(TransportHeader::Esp(a)), Some(TransportHeader::Esp(b))) => a.spi == b.spi,
        (None, None) => true,
        _ => false,
    }
}

/// Dynamic fields only refresh packets can update.
fn dynamic_fields_changed(old: &UncompHeaders, new: &UncompHeaders) -> bool {
    for (ha, hb) in old.ip.iter().zip(new.ip.iter()) {
        let changed = match (ha, hb) {
            (IpHeader::V4(a), IpHeader::V4(b)) => {
                a.time_to_live != b.time_to_live
                    || a.dscp != b.dscp
                    || a.ecn != b.ecn
                    || a.dont_fragment != b.dont_fragment
            }
            (IpHeader::V6(a), IpHeader::V6(b)) => {
                a.hop_limit != b.hop_limit || a.traffic_class != b.traffic_class
            }
            _ => true,
        };
        if changed {
            return true;
        }
    }
    match (&old.transport, &new.transport) {
        (Some(TransportHeader::UdpLite(a)), Some(TransportHeader::UdpLite(b))) => {
            if a.checksum_coverage != b.checksum_coverage {
                return true;
            }
        }
        _ => {}
    }
    match (&old.rtp, &new.rtp) {
        (Some(a), Some(b)) => a.payload_type != b.payload_type,
        (None, None) => false,
        _ => true,
    }
}
