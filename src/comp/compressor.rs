use crate::coding::ReorderRatio;
use crate::comp::{
    crc3_over_headers, crc7_over_headers, decide_packet, write_co_common, write_co_repair,
    write_ir, write_ir_dyn, write_pt1, write_pt2, write_uo0, write_uo1, write_uo1_id,
    write_uo1_rtp, write_uo1_ts, write_uor2, write_uor2_id, write_uor2_rtp, write_uor2_ts,
    CompressorContext, PacketVars, TsStridePhase,
};
use crate::context_table::ContextTable;
use crate::err::{CompressError, ConfigError, FeedbackError};
use crate::wire::{
    control_crc3, insert_cid, parse_feedback_element, split_feedback_stream, ChainDynamics, Ext3,
    FeedbackKind,
};
use crate::{
    AckType, CidType, EngineStats, Features, IpHeader, PacketFormat, ProfileId, TransportHeader,
    UdpHeader, UncompHeaders,
};
use arrayvec::ArrayVec;
use log::{debug, trace, warn};

/// Caller-supplied RTP classifier over a UDP header and its payload.
pub type RtpDetector = Box<dyn Fn(&UdpHeader, &[u8]) -> bool>;

/// Result of one successful compression.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompressedPacket {
    /// Bytes written to the output buffer.
    pub len: usize,
    /// Offset of the (untouched) payload within the output.
    pub payload_offset: usize,
    pub cid: u16,
    pub profile: ProfileId,
    pub format: PacketFormat,
}

/// The ROHC compressor engine: one instance per flow direction.
pub struct Compressor {
    cid_type: CidType,
    contexts: ContextTable<CompressorContext>,
    enabled: Vec<ProfileId>,
    window_width: u8,
    features: Features,
    reorder_ratio: ReorderRatio,
    rng: Box<dyn FnMut() -> u32>,
    rtp_detector: Option<RtpDetector>,
    stats: EngineStats,
    scratch: Vec<u8>,
}

impl Compressor {
    /// Creates a compressor for `max_contexts` simultaneous flows.
    /// `rng` feeds the unpredictable fields (initial generated MSNs,
    /// refresh jitter).
    pub fn new(
        cid_type: CidType,
        max_contexts: usize,
        rng: impl FnMut() -> u32 + 'static,
    ) -> Result<Compressor, ConfigError> {
        if max_contexts == 0 {
            return Err(ConfigError::ZeroContexts);
        }
        if max_contexts > cid_type.cid_space() {
            return Err(ConfigError::TooManyContexts {
                requested: max_contexts,
                cid_space: cid_type.cid_space(),
            });
        }
        Ok(Compressor {
            cid_type,
            contexts: ContextTable::new(max_contexts),
            enabled: vec![ProfileId::UNCOMPRESSED],
            window_width: 4,
            features: Features::NONE,
            reorder_ratio: ReorderRatio::None,
            rng: Box::new(rng),
            rtp_detector: None,
            stats: EngineStats::default(),
            scratch: Vec::with_capacity(256),
        })
    }

    /// Enables additional profiles (only the Uncompressed profile is
    /// enabled at construction). Applies to new flows.
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

    /// Sets the W-LSB window width (a power of two in 1..=64) for
    /// contexts created from now on.
    pub fn set_wlsb_width(&mut self, width: u8) -> Result<(), ConfigError> {
        if width == 0 || width > 64 || !width.is_power_of_two() {
            return Err(ConfigError::UnsupportedWindowWidth { width });
        }
        self.window_width = width;
        Ok(())
    }

    pub fn set_features(&mut self, features: Features) {
        self.features = features;
    }

    /// Expected reordering announced to ROHCv2 contexts created from
    /// now on.
    pub fn set_reorder_ratio(&mut self, ratio: ReorderRatio) {
        self.reorder_ratio = ratio;
    }

    /// Installs the RTP classifier; without one, UDP flows are never
    /// matched against the RTP profile.
    pub fn set_rtp_detector(&mut self, detector: RtpDetector) {
        self.rtp_detector = Some(detector);
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Compresses one fully assembled packet (starting at the IP
    /// header) into `out`, returning where the ROHC bytes and payload
    /// landed. A failed call leaves every context untouched.
    pub fn compress(
        &mut self,
        uncompressed: &[u8],
        now_millis: u64,
        out: &mut [u8],
    ) -> Result<CompressedPacket, CompressError> {
        let result = self.compress_inner(uncompressed, now_millis, out);
        match &result {
            Ok(meta) => {
                self.stats.packets += 1;
                self.stats.bytes_in += uncompressed.len() as u64;
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

    fn compress_inner(
        &mut self,
        uncompressed: &[u8],
        now_millis: u64,
        out: &mut [u8],
    ) -> Result<CompressedPacket, CompressError> {
        if self.features.contains(Features::DUMP_PACKETS) {
            trace!("compressing {} bytes: {:02x?}", uncompressed.len(), uncompressed);
        }
        let parsed = UncompHeaders::from_slice(uncompressed);
        let (headers, profile) = self.classify(uncompressed, parsed)?;

        let cid = match self.find_context(profile, &headers) {
            Some(cid) => cid,
            None => self.allocate_context(profile, &headers, now_millis),
        };
        self.contexts.touch(cid);
        let compat = self.features.contains(Features::COMPAT_PRE_ERRATUM);
        let time_based = self.features.contains(Features::TIME_BASED_REFRESHES);
        let context = self
            .contexts
            .get_mut(cid)
            .expect("context allocated above");

        let vars = context.analyze(&headers, now_millis, time_based);
        let mut format = decide_packet(vars.state, profile, &vars.budget);
        if needs_outer_refresh(&vars, &headers) && !format.refreshes_dynamics()
            && format != PacketFormat::Ir
            && format != PacketFormat::Normal
        {
            // compressed formats only carry the innermost IP-ID offset
            format = if profile.is_v2() {
                PacketFormat::CoRepair
            } else {
                PacketFormat::IrDyn
            };
        }

        let payload = &uncompressed[headers.header_len..];
        self.scratch.clear();
        let mut body = core::mem::take(&mut self.scratch);
        write_packet(&mut body, format, profile, &headers, &vars, compat);

        // irregular fields behind the base compressed header
        if !format.refreshes_dynamics()
            && format != PacketFormat::Ir
            && format != PacketFormat::Normal
        {
            append_irregular(&mut body, &headers, &vars);
        }
        if format == PacketFormat::Normal {
            body.clear();
            body.extend_from_slice(uncompressed);
        } else {
            body.extend_from_slice(payload);
        }
        insert_cid(self.cid_type, cid, &mut body);

        if body.len() > out.len() {
            let required = body.len();
            self.scratch = body;
            return Err(CompressError::OutputTooSmall {
                required,
                available: out.len(),
            });
        }
        out[..body.len()].copy_from_slice(&body);
        let len = body.len();
        let payload_len = if format == PacketFormat::Normal {
            uncompressed.len()
        } else {
            payload.len()
        };
        self.scratch = body;

        let context = self.contexts.get_mut(cid).expect("context exists");
        let old_state = context.state;
        context.commit(vars, &headers, format, now_millis);
        if context.state != old_state {
            debug!(
                "context {} ({}): {:?} -> {:?} after {:?}",
                cid, profile, old_state, context.state, format
            );
        }

        Ok(CompressedPacket {
            len,
            payload_offset: len - payload_len,
            cid,
            profile,
            format,
        })
    }

    /// Integrates feedback received from the decompressor. The buffer
    /// may hold one raw element or several size-prefixed ones.
    pub fn deliver_feedback(&mut self, data: &[u8]) -> Result<(), FeedbackError> {
        let mut first_error = None;
        for element in split_feedback_stream(data)? {
            match parse_feedback_element(self.cid_type, element) {
                Ok(feedback) => {
                    self.stats.feedback_elements += 1;
                    if let Err(err) = self.apply_feedback(feedback.cid, feedback.kind) {
                        warn!("feedback for cid {} dropped: {}", feedback.cid, err);
                        first_error.get_or_insert(err);
                    }
                }
                Err(err) => {
                    warn!("malformed feedback element: {}", err);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply_feedback(&mut self, cid: u16, kind: FeedbackKind) -> Result<(), FeedbackError> {
        let context = self
            .contexts
            .get_mut(cid)
            .ok_or(FeedbackError::UnknownCid { cid })?;
        match kind {
            FeedbackKind::Ack1 { sn_lsb } => {
                context.ack(u32::from(sn_lsb), 8);
            }
            FeedbackKind::Feedback2 {
                ack_type,
                mode,
                sn,
                sn_bits,
                sn_valid,
                rejected,
            } => {
                context.mode = mode;
                if rejected {
                    context.static_nack();
                    return Ok(());
                }
                match ack_type {
                    AckType::Ack => {
                        if sn_valid {
                            context.ack(sn, sn_bits);
                        } else {
                            context.ack(0, 0);
                        }
                    }
                    AckType::Nack => context.nack(),
                    AckType::StaticNack => context.static_nack(),
                }
            }
        }
        Ok(())
    }

    fn classify(
        &mut self,
        packet: &[u8],
        parsed: Result<UncompHeaders, crate::err::HeaderError>,
    ) -> Result<(UncompHeaders, ProfileId), CompressError> {
        let headers = match parsed {
            Ok(headers) => headers,
            Err(err) => {
                // unparseable packets can still pass through verbatim
                if self.enabled.contains(&ProfileId::UNCOMPRESSED) {
                    return Ok((
                        UncompHeaders {
                            ip: ArrayVec::new(),
                            transport: None,
                            rtp: None,
                            header_len: 0,
                        },
                        ProfileId::UNCOMPRESSED,
                    ));
                }
                return Err(CompressError::Header(err));
            }
        };
        // a header checksum the sender got wrong cannot be
        // reconstructed; such packets only pass through verbatim
        let checksums_ok = self.features.contains(Features::NO_IP_CHECKSUMS)
            || headers.ip.iter().all(|header| match header {
                IpHeader::V4(v4) => {
                    v4.options_len != 0
                        || v4.header_checksum == v4.calc_header_checksum()
                }
                IpHeader::V6(_) => true,
            });
        for profile in ProfileId::PRECEDENCE {
            if !self.enabled.contains(&profile) {
                continue;
            }
            if !checksums_ok && profile != ProfileId::UNCOMPRESSED {
                continue;
            }
            if profile == ProfileId::RTP {
                if let Some(rtp_headers) = self.try_rtp(packet, &headers) {
                    return Ok((rtp_headers, ProfileId::RTP));
                }
                continue;
            }
            if profile.matches(&headers) {
                return Ok((headers, profile));
            }
        }
        Err(CompressError::NoMatchingProfile)
    }

    fn try_rtp(&self, packet: &[u8], headers: &UncompHeaders) -> Option<UncompHeaders> {
        let detector = self.rtp_detector.as_ref()?;
        if !headers.ip_chain_compressible() {
            return None;
        }
        let udp = headers.udp()?;
        if !detector(udp, &packet[headers.header_len..]) {
            return None;
        }
        let mut rtp_headers = headers.clone();
        rtp_headers.attach_rtp(packet).ok()?;
        if !ProfileId::RTP.matches(&rtp_headers) {
            return None;
        }
        Some(rtp_headers)
    }

    fn find_context(&self, profile: ProfileId, headers: &UncompHeaders) -> Option<u16> {
        self.contexts
            .iter()
            .find(|(_, ctx)| ctx.matches_flow(profile, headers))
            .map(|(cid, _)| cid)
    }

    fn allocate_context(
        &mut self,
        profile: ProfileId,
        headers: &UncompHeaders,
        now_millis: u64,
    ) -> u16 {
        let cid = self.contexts.free_or_lru_cid();
        if self.contexts.get(cid).is_some() {
            debug!("evicting context {} for a new {} flow", cid, profile);
            self.contexts.remove(cid);
            self.stats.evictions += 1;
        }
        let initial_msn = (self.rng)() as u16;
        let refresh_jitter = (self.rng)() % 8;
        let context = CompressorContext::new(
            cid,
            profile,
            headers.clone(),
            self.window_width,
            initial_msn,
            self.reorder_ratio,
            refresh_jitter,
            now_millis,
        );
        debug!("new context {} for profile {}", cid, profile);
        self.contexts.insert(cid, context);
        cid
    }
}

/// True if an IP header other than the innermost sequential one needs
/// IP-ID offset bits (compressed formats cannot carry them).
fn needs_outer_refresh(vars: &PacketVars, headers: &UncompHeaders) -> bool {
    let innermost_seq = vars
        .ip_id
        .iter()
        .rposition(|t| t.as_ref().map(|t| t.behavior.is_sequential()).unwrap_or(false));
    for idx in 0..headers.ip.len() {
        if Some(idx) != innermost_seq && vars.budget.nr_ipid[idx] > 0 {
            return true;
        }
    }
    false
}

fn write_packet(
    body: &mut Vec<u8>,
    format: PacketFormat,
    profile: ProfileId,
    headers: &UncompHeaders,
    vars: &PacketVars,
    compat: bool,
) {
    let dynamics = chain_dynamics(profile, vars);
    let innermost_seq = vars
        .ip_id
        .iter()
        .rposition(|t| t.as_ref().map(|t| t.behavior.is_sequential()).unwrap_or(false));
    let ipid_offset = innermost_seq.map(|idx| vars.ipid_offsets[idx]);
    let nr_ipid = innermost_seq.map(|idx| vars.budget.nr_ipid[idx]).unwrap_or(0);
    match format {
        PacketFormat::Normal => {}
        PacketFormat::Ir => write_ir(body, profile, headers, &dynamics, compat),
        PacketFormat::IrDyn => write_ir_dyn(body, profile, headers, &dynamics, compat),
        PacketFormat::CoRepair => write_co_repair(
            body,
            profile,
            headers,
            &dynamics,
            crc7_over_headers(headers),
            compat,
        ),
        PacketFormat::Uo0 | PacketFormat::Pt0Crc3 => {
            write_uo0(body, vars.sn_value, crc3_over_headers(headers))
        }
        PacketFormat::Uo1 => write_uo1(
            body,
            ipid_offset.unwrap_or(0),
            vars.sn_value,
            crc3_over_headers(headers),
        ),
        PacketFormat::Uo1Rtp => write_uo1_rtp(
            body,
            vars.ts_value.unwrap_or(0),
            vars.budget.marker,
            vars.sn_value,
            crc3_over_headers(headers),
        ),
        PacketFormat::Uo1Ts => write_uo1_ts(
            body,
            vars.ts_value.unwrap_or(0),
            vars.budget.marker,
            vars.sn_value,
            crc3_over_headers(headers),
        ),
        PacketFormat::Uo1Id => write_uo1_id(
            body,
            ipid_offset.unwrap_or(0),
            vars.budget.marker,
            vars.sn_value,
            crc3_over_headers(headers),
        ),
        PacketFormat::Uor2 => {
            let ext3 = uor2_ext3(vars, 5, 0, false, nr_ipid, 0, ipid_offset);
            write_uor2(body, vars.sn_value, ext3.as_ref(), crc7_over_headers(headers));
        }
        PacketFormat::Uor2Rtp => {
            let ext3 = uor2_ext3(vars, 6, 6, true, 0, 0, None);
            write_uor2_rtp(
                body,
                vars.ts_value.unwrap_or(0),
                vars.budget.marker,
                vars.sn_value,
                ext3.as_ref(),
                crc7_over_headers(headers),
            );
        }
        PacketFormat::Uor2Ts => {
            let ext3 = uor2_ext3(vars, 6, 5, true, 0, 0, None);
            write_uor2_ts(
                body,
                vars.ts_value.unwrap_or(0),
                vars.budget.marker,
                vars.sn_value,
                ext3.as_ref(),
                crc7_over_headers(headers),
            );
        }
        PacketFormat::Uor2Id => {
            let ext3 = uor2_ext3(vars, 6, 0, true, nr_ipid, 5, ipid_offset);
            write_uor2_id(
                body,
                ipid_offset.unwrap_or(0),
                vars.budget.marker,
                vars.sn_value,
                ext3.as_ref(),
                crc7_over_headers(headers),
            );
        }
        PacketFormat::Pt1 => write_pt1(
            body,
            vars.sn_value,
            innermost_seq.map(|idx| vars.ipid_offsets[idx]),
            crc3_over_headers(headers),
        ),
        PacketFormat::Pt2 => write_pt2(
            body,
            vars.sn_value,
            innermost_seq.map(|idx| vars.ipid_offsets[idx]),
            crc7_over_headers(headers),
        ),
        PacketFormat::CoCommon => {
            let behaviors: Vec<Option<crate::IpIdBehavior>> = vars
                .ip_id
                .iter()
                .map(|t| t.as_ref().map(|t| t.behavior))
                .collect();
            let control =
                control_crc3(dynamics.reorder_ratio, vars.msn, &behaviors, compat);
            let offset = if nr_ipid > 0 { ipid_offset } else { None };
            write_co_common(body, vars.msn, offset, control, crc7_over_headers(headers));
        }
    }
}

/// The extension 3 a UOR-2 variant needs, if any. `base_ts_bits` /
/// `base_ipid_bits` are what the base header itself can carry (0 for
/// formats without the field).
fn uor2_ext3(
    vars: &PacketVars,
    base_sn_bits: u8,
    base_ts_bits: u8,
    has_ts: bool,
    nr_ipid: u8,
    base_ipid_bits: u8,
    ipid_offset: Option<u16>,
) -> Option<Ext3> {
    let mut ext = Ext3::default();
    if vars.budget.nr_sn > base_sn_bits {
        ext.sn8 = Some(vars.sn_value as u8);
    }
    if has_ts
        && !vars.budget.ts_deducible
        && (base_ts_bits == 0 || vars.budget.nr_ts > base_ts_bits)
    {
        // the decision tables never pick a UOR-2 format with a
        // timestamp beyond the SDVL ceiling of 29 bits
        debug_assert!(vars.budget.nr_ts <= 29);
        let bits = vars.budget.nr_ts.max(1);
        let scaled = vars
            .ts
            .as_ref()
            .map(|t| t.phase == TsStridePhase::SendScaled)
            .unwrap_or(false);
        ext.ts = Some((vars.ts_value.unwrap_or(0), bits, scaled));
    }
    if nr_ipid > base_ipid_bits {
        ext.ip_id_offset = ipid_offset;
    }
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

fn chain_dynamics(profile: ProfileId, vars: &PacketVars) -> ChainDynamics {
    let mut dynamics = ChainDynamics::default();
    for tracker in &vars.ip_id {
        dynamics.behaviors.push(tracker.as_ref().map(|t| t.behavior));
    }
    if profile.generates_msn() {
        dynamics.msn = Some(vars.msn);
    }
    if profile.is_v2() {
        dynamics.msn = Some(vars.msn);
    }
    if let Some(ts) = &vars.ts {
        dynamics.ts_stride = ts.announced_stride();
    }
    dynamics
}

/// Verbatim fields every compressed packet carries: random IP-IDs and
/// the UDP checksum of flows that use one.
fn append_irregular(body: &mut Vec<u8>, headers: &UncompHeaders, vars: &PacketVars) {
    for (tracker, header) in vars.ip_id.iter().zip(headers.ip.iter()) {
        if let (Some(tracker), IpHeader::V4(v4)) = (tracker.as_ref(), header) {
            if tracker.behavior == crate::IpIdBehavior::Random {
                body.extend_from_slice(&v4.identification.to_be_bytes());
            }
        }
    }
    match &headers.transport {
        Some(TransportHeader::Udp(udp)) if vars.udp_checksum_used => {
            body.extend_from_slice(&udp.checksum.to_be_bytes());
        }
        Some(TransportHeader::UdpLite(udp_lite)) => {
            body.extend_from_slice(&udp_lite.checksum.to_be_bytes());
        }
        _ => {}
    }
}
