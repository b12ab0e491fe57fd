use crate::{CompressorState, ProfileId};

/// The concrete packet format chosen for (or seen in) one ROHC
/// packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketFormat {
    /// IR with static and dynamic chains.
    Ir,
    /// IR-DYN with the dynamic chain only.
    IrDyn,
    /// Uncompressed profile passthrough.
    Normal,
    Uo0,
    /// Non-RTP UO-1.
    Uo1,
    Uo1Rtp,
    Uo1Ts,
    Uo1Id,
    /// Non-RTP UOR-2.
    Uor2,
    Uor2Rtp,
    Uor2Ts,
    Uor2Id,
    /// ROHCv2 pt_0_crc3.
    Pt0Crc3,
    /// ROHCv2 pt_1 (with or without sequential IP-ID bits).
    Pt1,
    /// ROHCv2 pt_2.
    Pt2,
    /// ROHCv2 co_common.
    CoCommon,
    /// ROHCv2 co_repair.
    CoRepair,
}

impl PacketFormat {
    /// True for the formats that refresh the full dynamic context.
    pub fn refreshes_dynamics(self) -> bool {
        matches!(
            self,
            PacketFormat::Ir | PacketFormat::IrDyn | PacketFormat::CoRepair
        )
    }

    /// True for the smallest formats a fully converged context emits
    /// (UO-0 / UO-1 family / PT-0 / PT-1).
    pub fn is_second_order(self) -> bool {
        matches!(
            self,
            PacketFormat::Uo0
                | PacketFormat::Uo1
                | PacketFormat::Uo1Rtp
                | PacketFormat::Uo1Ts
                | PacketFormat::Uo1Id
                | PacketFormat::Pt0Crc3
                | PacketFormat::Pt1
        )
    }
}

/// Per-packet bit requirements and change flags, computed against the
/// context's W-LSB windows before any context mutation.
#[derive(Clone, Debug, Default)]
pub(crate) struct FieldBudget {
    /// Bits of sequence number / MSN required.
    pub nr_sn: u8,
    /// Bits of (scaled or raw) RTP timestamp required.
    pub nr_ts: u8,
    /// True if the timestamp follows the sequence number linearly and
    /// needs no bits at all.
    pub ts_deducible: bool,
    /// Bits of IP-ID offset required, per IP header (0 for IPv6 and
    /// non-sequential behaviors).
    pub nr_ipid: [u8; 2],
    /// Number of IPv4 headers with a sequential IP-ID behavior.
    pub seq_v4_count: u8,
    /// RTP marker bit of the packet being compressed.
    pub marker: bool,
    /// A static chain field differs from the context.
    pub static_changed: bool,
    /// A dynamic field that compressed packets cannot carry changed
    /// (TTL, TOS, DF, IP-ID behavior, RTP payload type, UDP checksum
    /// presence).
    pub dyn_changed: bool,
    /// The timestamp stride subsystem needs refresh packets to repeat
    /// its announcement.
    pub stride_announcing: bool,
    /// Periodic IR refresh due (does not demote the context).
    pub refresh_ir: bool,
    /// Periodic dynamic refresh due (does not demote the context).
    pub refresh_dyn: bool,
}

impl FieldBudget {
    fn max_ipid(&self) -> u8 {
        self.nr_ipid[0].max(self.nr_ipid[1])
    }

    fn ipid_silent(&self) -> bool {
        self.max_ipid() == 0
    }
}

/// Largest sequence number field a UOR-2 with Extension 3 can carry.
const UOR2_RTP_MAX_SN: u8 = 6 + 8;
const UOR2_MAX_SN: u8 = 5 + 8;
/// Largest timestamp field an Extension 3 can carry (the SDVL ceiling).
const EXT3_MAX_TS: u8 = 29;
const PT1_MAX_MSN: u8 = 6;
const PT2_MAX_MSN: u8 = 5;

/// Chooses the packet format for one packet of an established flow.
///
/// The precedence within each table goes from the smallest format
/// upward; the first format that can carry every required bit wins.
pub(crate) fn decide_packet(
    state: CompressorState,
    profile: ProfileId,
    budget: &FieldBudget,
) -> PacketFormat {
    if profile == ProfileId::UNCOMPRESSED {
        return match state {
            CompressorState::Ir => PacketFormat::Ir,
            _ => PacketFormat::Normal,
        };
    }
    if budget.static_changed || budget.refresh_ir || state == CompressorState::Ir {
        return PacketFormat::Ir;
    }
    let refresh = if profile.is_v2() {
        PacketFormat::CoRepair
    } else {
        PacketFormat::IrDyn
    };
    if budget.dyn_changed || budget.stride_announcing || budget.refresh_dyn {
        return refresh;
    }
    if state == CompressorState::Fo {
        // first order: only formats with the 7 bit CRC (or a full
        // dynamic refresh) are trusted
        let co = if profile.is_v2() {
            decide_v2(budget, true)
        } else if profile == ProfileId::RTP {
            decide_rtp(budget, true)
        } else {
            decide_non_rtp(budget, true)
        };
        return co.unwrap_or(refresh);
    }
    let co = if profile.is_v2() {
        decide_v2(budget, false)
    } else if profile == ProfileId::RTP {
        decide_rtp(budget, false)
    } else {
        decide_non_rtp(budget, false)
    };
    co.unwrap_or(refresh)
}

/// RFC 3095 RTP profile table.
fn decide_rtp(budget: &FieldBudget, second_order_barred: bool) -> Option<PacketFormat> {
    if !second_order_barred {
        if budget.nr_sn <= 4
            && budget.ipid_silent()
            && budget.ts_deducible
            && !budget.marker
        {
            return Some(PacketFormat::Uo0);
        }
        if budget.seq_v4_count == 0 && budget.nr_sn <= 4 && budget.nr_ts <= 6 {
            return Some(PacketFormat::Uo1Rtp);
        }
        if budget.seq_v4_count == 1
            && budget.ipid_silent()
            && budget.nr_sn <= 4
            && budget.nr_ts <= 5
        {
            return Some(PacketFormat::Uo1Ts);
        }
        if budget.seq_v4_count == 1
            && budget.max_ipid() <= 5
            && budget.nr_sn <= 4
            && budget.ts_deducible
            && !budget.marker
        {
            return Some(PacketFormat::Uo1Id);
        }
    }
    if budget.nr_sn > UOR2_RTP_MAX_SN {
        return None;
    }
    if !budget.ts_deducible && budget.nr_ts > EXT3_MAX_TS {
        // beyond even the SDVL form; only a full refresh carries it
        return None;
    }
    if budget.seq_v4_count > 0 && budget.max_ipid() > 0 {
        // extension 3 carries the timestamp in SDVL form
        return Some(PacketFormat::Uor2Id);
    }
    if budget.seq_v4_count > 0 {
        return Some(PacketFormat::Uor2Ts);
    }
    Some(PacketFormat::Uor2Rtp)
}

/// Table for the UDP, UDP-Lite, ESP and IP-only profiles.
fn decide_non_rtp(budget: &FieldBudget, second_order_barred: bool) -> Option<PacketFormat> {
    if !second_order_barred {
        if budget.nr_sn <= 4 && budget.ipid_silent() {
            return Some(PacketFormat::Uo0);
        }
        if budget.nr_sn <= 5 && budget.max_ipid() <= 6 {
            return Some(PacketFormat::Uo1);
        }
    }
    if budget.nr_sn <= UOR2_MAX_SN {
        Some(PacketFormat::Uor2)
    } else {
        None
    }
}

/// Table for the ROHCv2 IP and UDP profiles.
fn decide_v2(budget: &FieldBudget, second_order_barred: bool) -> Option<PacketFormat> {
    if !second_order_barred {
        if budget.nr_sn <= 4 && budget.ipid_silent() {
            return Some(PacketFormat::Pt0Crc3);
        }
        if budget.nr_sn <= PT1_MAX_MSN && budget.max_ipid() <= 5 {
            return Some(PacketFormat::Pt1);
        }
    }
    if budget.nr_sn <= PT2_MAX_MSN && budget.max_ipid() <= 8 {
        return Some(PacketFormat::Pt2);
    }
    if budget.nr_sn <= 16 {
        // co_common carries the full MSN and IP-ID offset
        return Some(PacketFormat::CoCommon);
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    fn so_budget() -> FieldBudget {
        FieldBudget {
            nr_sn: 3,
            nr_ts: 0,
            ts_deducible: true,
            nr_ipid: [0, 0],
            seq_v4_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn stationary_rtp_stream_uses_uo0() {
        assert_eq!(
            PacketFormat::Uo0,
            decide_packet(CompressorState::So, ProfileId::RTP, &so_budget())
        );
    }

    #[test]
    fn marker_forbids_uo0() {
        let budget = FieldBudget {
            marker: true,
            ..so_budget()
        };
        let format = decide_packet(CompressorState::So, ProfileId::RTP, &budget);
        assert_ne!(PacketFormat::Uo0, format);
        assert_eq!(PacketFormat::Uo1Ts, format);
    }

    #[test]
    fn ts_jump_picks_a_ts_format() {
        let budget = FieldBudget {
            nr_ts: 5,
            ts_deducible: false,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Uo1Ts,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
        let budget = FieldBudget {
            nr_ts: 5,
            ts_deducible: false,
            seq_v4_count: 0,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Uo1Rtp,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
    }

    #[test]
    fn ipid_jump_picks_uo1id_then_uor2id() {
        let budget = FieldBudget {
            nr_ipid: [4, 0],
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Uo1Id,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
        let budget = FieldBudget {
            nr_ipid: [9, 0],
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Uor2Id,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
    }

    #[test]
    fn huge_sn_gap_falls_back_to_ir_dyn() {
        let budget = FieldBudget {
            nr_sn: 16,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::IrDyn,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
    }

    #[test]
    fn ts_beyond_sdvl_ceiling_falls_back_to_ir_dyn() {
        // a timestamp needing more bits than the 29 bit SDVL form can
        // carry must not be routed into an extension
        for nr_ts in [30u8, 31, 32] {
            let budget = FieldBudget {
                nr_ts,
                ts_deducible: false,
                ..so_budget()
            };
            assert_eq!(
                PacketFormat::IrDyn,
                decide_packet(CompressorState::So, ProfileId::RTP, &budget)
            );
        }
        // deducible timestamps need no bits at all, whatever the
        // window says
        let budget = FieldBudget {
            nr_ts: 32,
            ts_deducible: true,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Uo0,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
    }

    #[test]
    fn static_change_forces_ir() {
        let budget = FieldBudget {
            static_changed: true,
            ..so_budget()
        };
        for profile in [ProfileId::RTP, ProfileId::UDP, ProfileId::UDP_V2] {
            assert_eq!(
                PacketFormat::Ir,
                decide_packet(CompressorState::So, profile, &budget)
            );
        }
    }

    #[test]
    fn fo_state_avoids_crc3_formats() {
        assert_eq!(
            PacketFormat::Uor2Rtp,
            decide_packet(
                CompressorState::Fo,
                ProfileId::RTP,
                &FieldBudget {
                    seq_v4_count: 0,
                    ..so_budget()
                }
            )
        );
        assert_eq!(
            PacketFormat::Uor2,
            decide_packet(CompressorState::Fo, ProfileId::UDP, &so_budget())
        );
    }

    #[test]
    fn v2_menu() {
        assert_eq!(
            PacketFormat::Pt0Crc3,
            decide_packet(CompressorState::So, ProfileId::UDP_V2, &so_budget())
        );
        let budget = FieldBudget {
            nr_ipid: [5, 0],
            nr_sn: 6,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Pt1,
            decide_packet(CompressorState::So, ProfileId::UDP_V2, &budget)
        );
        let budget = FieldBudget {
            nr_ipid: [8, 0],
            nr_sn: 5,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::Pt2,
            decide_packet(CompressorState::So, ProfileId::UDP_V2, &budget)
        );
        let budget = FieldBudget {
            nr_sn: 12,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::CoCommon,
            decide_packet(CompressorState::So, ProfileId::IP_V2, &budget)
        );
    }

    #[test]
    fn stride_announcement_forces_refresh() {
        let budget = FieldBudget {
            stride_announcing: true,
            ..so_budget()
        };
        assert_eq!(
            PacketFormat::IrDyn,
            decide_packet(CompressorState::So, ProfileId::RTP, &budget)
        );
    }

    #[test]
    fn uncompressed_profile_emits_ir_then_normal() {
        let budget = FieldBudget::default();
        assert_eq!(
            PacketFormat::Ir,
            decide_packet(CompressorState::Ir, ProfileId::UNCOMPRESSED, &budget)
        );
        assert_eq!(
            PacketFormat::Normal,
            decide_packet(CompressorState::So, ProfileId::UNCOMPRESSED, &budget)
        );
    }
}
