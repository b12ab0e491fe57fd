use arrayvec::ArrayVec;

/// Maximum number of references a W-LSB window can hold.
pub const MAX_WINDOW_WIDTH: usize = 64;

/// Expected degree of packet reordering on the channel, as negotiated
/// for ROHCv2 contexts. Determines the interpretation offset of the
/// master sequence number.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReorderRatio {
    /// No reordering expected.
    #[default]
    None,
    /// Up to a quarter of the interpretation interval.
    Quarter,
    /// Up to half of the interpretation interval.
    Half,
    /// Up to three quarters of the interpretation interval.
    ThreeQuarters,
}

impl ReorderRatio {
    /// The 2 bit wire value.
    pub fn to_bits(self) -> u8 {
        match self {
            ReorderRatio::None => 0,
            ReorderRatio::Quarter => 1,
            ReorderRatio::Half => 2,
            ReorderRatio::ThreeQuarters => 3,
        }
    }

    /// Decodes the 2 bit wire value (callers must mask to 2 bits).
    pub fn from_bits(bits: u8) -> ReorderRatio {
        match bits & 0b11 {
            0 => ReorderRatio::None,
            1 => ReorderRatio::Quarter,
            2 => ReorderRatio::Half,
            _ => ReorderRatio::ThreeQuarters,
        }
    }
}

/// Interpretation offset policy (`p`) of a W-LSB coded field.
///
/// The offset shifts the interpretation interval
/// `[v_ref - p, v_ref + 2^k - 1 - p]` to favor the direction in which
/// the field is expected to move.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LsbShift {
    /// RTP sequence numbers (small backward window for reordering).
    RtpSn,
    /// RTP timestamps (wrap-safe backward window).
    Ts,
    /// IP-ID offsets (ascending only).
    IpId,
    /// Sequence numbers under reliable feedback (R mode).
    ReliableSn,
    /// ROHCv2 master sequence numbers, shifted by the reorder ratio.
    Msn(ReorderRatio),
}

impl LsbShift {
    /// The interpretation offset for `k` transmitted bits.
    pub fn p(self, k: u8) -> i64 {
        match self {
            LsbShift::RtpSn => {
                if k <= 4 {
                    1
                } else {
                    (1i64 << (k - 5)) - 1
                }
            }
            LsbShift::Ts => {
                if k >= 2 {
                    (1i64 << (k - 2)) - 1
                } else {
                    1
                }
            }
            LsbShift::IpId => 0,
            LsbShift::ReliableSn => -1,
            LsbShift::Msn(ratio) => {
                let interval = 1i64 << k;
                match ratio {
                    ReorderRatio::None => 1,
                    ReorderRatio::Quarter => interval / 4 - 1,
                    ReorderRatio::Half => interval / 2 - 1,
                    ReorderRatio::ThreeQuarters => interval * 3 / 4 - 1,
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct WindowEntry {
    seq: u32,
    value: u32,
}

/// Sliding window of reference values for W-LSB encoding.
///
/// The compressor keeps one window per encoded field. Pushed values are
/// potential decompressor references until acknowledged (explicitly via
/// feedback or implicitly by the window sliding), so the number of bits
/// required for a new value must be valid against every live reference.
#[derive(Clone, Debug)]
pub struct WlsbWindow {
    /// Oldest first.
    entries: ArrayVec<WindowEntry, MAX_WINDOW_WIDTH>,
    width: usize,
    field_bits: u8,
    shift: LsbShift,
    next_seq: u32,
}

impl WlsbWindow {
    /// New empty window.
    ///
    /// `width` must be a power of two in `1..=64` (validated by the
    /// engine configuration) and `field_bits` the width of the encoded
    /// field (at most 32).
    pub fn new(width: u8, field_bits: u8, shift: LsbShift) -> WlsbWindow {
        debug_assert!(width >= 1 && usize::from(width) <= MAX_WINDOW_WIDTH);
        debug_assert!(field_bits >= 1 && field_bits <= 32);
        WlsbWindow {
            entries: ArrayVec::new(),
            width: usize::from(width),
            field_bits,
            shift,
            next_seq: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently pushed value.
    pub fn last(&self) -> Option<u32> {
        self.entries.last().map(|e| e.value)
    }

    /// Appends a transmitted value, sliding out the oldest reference
    /// once the configured width is reached.
    pub fn push(&mut self, value: u32) {
        if self.entries.len() >= self.width {
            self.entries.remove(0);
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push(WindowEntry { seq, value });
        // keep the arrayvec from overflowing if the width shrank
        while self.entries.len() > self.width {
            self.entries.remove(0);
        }
    }

    /// Acknowledgement of `value`: every reference older than the
    /// acknowledged one can no longer be the decompressor's reference
    /// and is discarded. Unknown values are ignored, so repeated
    /// delivery of the same acknowledgement is a no-op.
    pub fn ack(&mut self, value: u32) {
        let found = self
            .entries
            .iter()
            .rposition(|e| e.value == value);
        if let Some(idx) = found {
            let keep_seq = self.entries[idx].seq;
            self.entries.retain(|e| e.seq >= keep_seq);
        }
    }

    /// Acknowledgement carrying only `bits` LSBs of the value (as
    /// feedback elements do): the newest reference whose LSBs match is
    /// treated as acknowledged.
    pub fn ack_lsb(&mut self, lsb: u32, bits: u8) {
        if bits == 0 {
            return;
        }
        let mask = if bits >= 32 {
            u32::MAX
        } else {
            (1u32 << bits) - 1
        };
        let found = self
            .entries
            .iter()
            .rposition(|e| e.value & mask == lsb & mask);
        if let Some(idx) = found {
            let keep_seq = self.entries[idx].seq;
            self.entries.retain(|e| e.seq >= keep_seq);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Changes the window width (engine configuration). Oldest
    /// references are dropped if the window shrinks.
    pub fn set_width(&mut self, width: u8) {
        self.width = usize::from(width);
        while self.entries.len() > self.width {
            self.entries.remove(0);
        }
    }

    /// Minimum number of LSBs of `value` that decode unambiguously
    /// against every reference currently in the window.
    ///
    /// An empty window (nothing transmitted or everything lost beyond
    /// recovery) requires the full field width.
    pub fn nr_bits_required(&self, value: u32) -> u8 {
        if self.entries.is_empty() {
            return self.field_bits;
        }
        let mut required = 0u8;
        for entry in &self.entries {
            let k = min_k(value, entry.value, self.shift, self.field_bits);
            if k > required {
                required = k;
            }
        }
        required
    }
}

/// Smallest `k` such that `value` falls into the interpretation
/// interval around `reference`; `field_bits` if no smaller `k` works.
fn min_k(value: u32, reference: u32, shift: LsbShift, field_bits: u8) -> u8 {
    let modulus = 1i64 << field_bits;
    for k in 0..field_bits {
        let p = shift.p(k);
        let span = 1i64 << k;
        let lower = i64::from(reference) - p;
        let delta = (i64::from(value) - lower).rem_euclid(modulus);
        if delta < span {
            return k;
        }
    }
    field_bits
}

/// Decodes `received` (the `k` LSBs of the original value) against a
/// reference, returning the unique value in the interpretation interval
/// whose low `k` bits match.
///
/// Returns `None` only for malformed input (`k` exceeding the field
/// width).
pub fn lsb_decode(
    received: u32,
    k: u8,
    reference: u32,
    shift: LsbShift,
    field_bits: u8,
) -> Option<u32> {
    if k > field_bits {
        return None;
    }
    if k == 0 {
        // no bits: the value is the lower interval bound itself
        let modulus = 1i64 << field_bits;
        let v = (i64::from(reference) - shift.p(0)).rem_euclid(modulus);
        return Some(v as u32);
    }
    let modulus = 1i64 << field_bits;
    let span = 1i64 << k;
    let masked = i64::from(received) & (span - 1);
    let lower = i64::from(reference) - shift.p(k);
    let offset = (masked - lower).rem_euclid(span);
    let v = (lower + offset).rem_euclid(modulus);
    Some(v as u32)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_window_requires_full_width() {
        let w = WlsbWindow::new(4, 16, LsbShift::RtpSn);
        assert_eq!(16, w.nr_bits_required(0x1234));
    }

    #[test]
    fn unchanged_value_requires_no_bits_with_ip_id_shift() {
        let mut w = WlsbWindow::new(4, 16, LsbShift::IpId);
        w.push(100);
        assert_eq!(0, w.nr_bits_required(100));
    }

    #[test]
    fn small_increment_requires_few_bits() {
        let mut w = WlsbWindow::new(4, 16, LsbShift::RtpSn);
        w.push(50);
        assert!(w.nr_bits_required(51) <= 4);
        assert!(w.nr_bits_required(60) <= 5);
    }

    #[test]
    fn window_slides_out_old_references() {
        let mut w = WlsbWindow::new(2, 16, LsbShift::RtpSn);
        w.push(10);
        w.push(1000);
        w.push(1001);
        // 10 slid out, so only the close references constrain the count
        assert!(w.nr_bits_required(1002) <= 4);
    }

    #[test]
    fn ack_discards_older_references() {
        let mut w = WlsbWindow::new(8, 16, LsbShift::RtpSn);
        w.push(10);
        w.push(500);
        w.push(501);
        w.ack(500);
        assert!(w.nr_bits_required(502) <= 4);
        // acking again changes nothing
        let before = w.nr_bits_required(502);
        w.ack(500);
        assert_eq!(before, w.nr_bits_required(502));
    }

    #[test]
    fn sn_wraparound_decodes() {
        // SN 0xffff followed by 0x0000
        let k = 4;
        let decoded = lsb_decode(0x0, k, 0xffff, LsbShift::RtpSn, 16).unwrap();
        assert_eq!(0x0000, decoded);
    }

    #[test]
    fn reliable_sn_shift_infers_the_increment() {
        // p = -1: the interval starts one past the reference, so a
        // plain increment costs zero bits
        let mut w = WlsbWindow::new(4, 16, LsbShift::ReliableSn);
        w.push(10);
        assert_eq!(0, w.nr_bits_required(11));
        assert_eq!(11, lsb_decode(0, 0, 10, LsbShift::ReliableSn, 16).unwrap());
    }

    #[test]
    fn decode_rejects_oversized_k() {
        assert!(lsb_decode(0, 17, 0, LsbShift::RtpSn, 16).is_none());
        assert!(lsb_decode(0, 16, 0, LsbShift::RtpSn, 16).is_some());
    }

    #[test]
    fn ip_id_offset_interval_is_ascending_only() {
        // p = 0: the interval starts at the reference
        assert_eq!(5, lsb_decode(5, 4, 3, LsbShift::IpId, 16).unwrap());
        // a value "behind" the reference wraps all the way around
        assert_eq!(
            3 + 16 - 2,
            lsb_decode((3u32.wrapping_sub(2)) & 0xf, 4, 3, LsbShift::IpId, 16).unwrap()
        );
    }

    proptest! {
        /// encode/decode round-trip: k bits chosen by the window always
        /// decode back to the original value against any window ref.
        #[test]
        fn round_trip(reference in 0u32..=0xffff, delta in 0u32..16) {
            let mut w = WlsbWindow::new(4, 16, LsbShift::RtpSn);
            w.push(reference);
            let value = (reference + delta) & 0xffff;
            let k = w.nr_bits_required(value);
            let sent = value & (((1u64 << k) - 1) as u32);
            let decoded = lsb_decode(sent, k, reference, LsbShift::RtpSn, 16).unwrap();
            prop_assert_eq!(value, decoded);
        }

        #[test]
        fn round_trip_ts_32bit(reference in 0u32..=u32::MAX, delta in 0u32..100_000) {
            let mut w = WlsbWindow::new(4, 32, LsbShift::Ts);
            w.push(reference);
            let value = reference.wrapping_add(delta);
            let k = w.nr_bits_required(value);
            let sent = if k >= 32 { value } else { value & (((1u64 << k) - 1) as u32) };
            let decoded = lsb_decode(sent, k, reference, LsbShift::Ts, 32).unwrap();
            prop_assert_eq!(value, decoded);
        }
    }
}
