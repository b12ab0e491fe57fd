use crate::coding::{LsbShift, WlsbWindow};

/// Observed behavior of an IPv4 Identification field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IpIdBehavior {
    /// Increments in step with the master sequence number; coded as a
    /// W-LSB offset.
    Sequential,
    /// Sequential after swapping the two octets (sender stores the
    /// counter in little endian).
    SequentialSwapped,
    /// Constant zero; nothing is transmitted.
    Zero,
    /// No usable pattern; transmitted verbatim in every packet.
    Random,
}

impl IpIdBehavior {
    /// Wire value used in dynamic chains and control fields.
    pub fn to_bits(self) -> u8 {
        match self {
            IpIdBehavior::Sequential => 0,
            IpIdBehavior::SequentialSwapped => 1,
            IpIdBehavior::Random => 2,
            IpIdBehavior::Zero => 3,
        }
    }

    /// Decodes the 2 bit wire value (callers must mask to 2 bits).
    pub fn from_bits(bits: u8) -> IpIdBehavior {
        match bits & 0b11 {
            0 => IpIdBehavior::Sequential,
            1 => IpIdBehavior::SequentialSwapped,
            2 => IpIdBehavior::Random,
            _ => IpIdBehavior::Zero,
        }
    }

    /// True if the IP-ID travels as a W-LSB coded offset.
    #[inline]
    pub fn is_sequential(self) -> bool {
        matches!(self, IpIdBehavior::Sequential | IpIdBehavior::SequentialSwapped)
    }
}

#[inline]
pub(crate) fn swap16(value: u16) -> u16 {
    value.rotate_left(8)
}

/// Number of matching observations before a sequential classification
/// is trusted again after a divergence.
const RECLASSIFY_STREAK: u8 = 3;

/// Per IPv4 header IP-ID tracking on the compressor side.
#[derive(Clone, Debug)]
pub(crate) struct IpIdState {
    pub behavior: IpIdBehavior,
    /// Window over `ip_id - msn` offsets (after any byte swap).
    pub offset_window: WlsbWindow,
    last_ip_id: u16,
    seq_streak: u8,
    swap_streak: u8,
}

impl IpIdState {
    /// Initial classification from the first packet of the flow:
    /// optimistic, corrected by later observations.
    pub(crate) fn new(window_width: u8, first_ip_id: u16) -> IpIdState {
        IpIdState {
            behavior: if first_ip_id == 0 {
                IpIdBehavior::Zero
            } else {
                IpIdBehavior::Sequential
            },
            offset_window: WlsbWindow::new(window_width, 16, LsbShift::IpId),
            last_ip_id: first_ip_id,
            seq_streak: 0,
            swap_streak: 0,
        }
    }

    /// Offset of `ip_id` relative to the master sequence number under
    /// the current classification.
    pub(crate) fn offset(&self, ip_id: u16, msn: u16) -> u16 {
        match self.behavior {
            IpIdBehavior::Sequential => ip_id.wrapping_sub(msn),
            IpIdBehavior::SequentialSwapped => swap16(ip_id).wrapping_sub(msn),
            IpIdBehavior::Zero | IpIdBehavior::Random => 0,
        }
    }

    /// Re-evaluates the classification against a newly accepted
    /// packet. Returns the behavior the context should announce from
    /// now on (a change forces a refresh packet).
    pub(crate) fn observe(&mut self, ip_id: u16, msn_delta: u16) -> IpIdBehavior {
        let delta = ip_id.wrapping_sub(self.last_ip_id);
        let swapped_delta = swap16(ip_id).wrapping_sub(swap16(self.last_ip_id));

        if ip_id == 0 && self.last_ip_id == 0 {
            self.behavior = IpIdBehavior::Zero;
            self.seq_streak = 0;
            self.swap_streak = 0;
        } else if delta == msn_delta {
            self.swap_streak = 0;
            self.seq_streak = self.seq_streak.saturating_add(1);
            match self.behavior {
                IpIdBehavior::Sequential => {}
                _ if self.seq_streak >= RECLASSIFY_STREAK
                    || self.behavior == IpIdBehavior::Zero =>
                {
                    self.behavior = IpIdBehavior::Sequential;
                }
                _ => {}
            }
        } else if swapped_delta == msn_delta {
            self.seq_streak = 0;
            self.swap_streak = self.swap_streak.saturating_add(1);
            match self.behavior {
                IpIdBehavior::SequentialSwapped => {}
                _ if self.swap_streak >= RECLASSIFY_STREAK => {
                    self.behavior = IpIdBehavior::SequentialSwapped;
                }
                _ => {}
            }
        } else {
            self.seq_streak = 0;
            self.swap_streak = 0;
            self.behavior = IpIdBehavior::Random;
            self.offset_window.clear();
        }

        self.last_ip_id = ip_id;
        self.behavior
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_bits_round_trip() {
        for behavior in [
            IpIdBehavior::Sequential,
            IpIdBehavior::SequentialSwapped,
            IpIdBehavior::Random,
            IpIdBehavior::Zero,
        ] {
            assert_eq!(behavior, IpIdBehavior::from_bits(behavior.to_bits()));
        }
    }

    #[test]
    fn sequential_stream_keeps_classification() {
        let mut state = IpIdState::new(4, 100);
        for ip_id in [101u16, 102, 103, 104] {
            assert_eq!(IpIdBehavior::Sequential, state.observe(ip_id, 1));
        }
    }

    #[test]
    fn rollover_stays_sequential() {
        let mut state = IpIdState::new(4, 0xfffe);
        assert_eq!(IpIdBehavior::Sequential, state.observe(0xffff, 1));
        assert_eq!(IpIdBehavior::Sequential, state.observe(0x0000, 1));
        assert_eq!(IpIdBehavior::Sequential, state.observe(0x0001, 1));
    }

    #[test]
    fn swapped_stream_reclassifies() {
        // 0x0100, 0x0200, ... is 1, 2, ... in swapped byte order
        let mut state = IpIdState::new(4, 0x0100);
        let mut behavior = IpIdBehavior::Sequential;
        for ip_id in [0x0200u16, 0x0300, 0x0400, 0x0500] {
            behavior = state.observe(ip_id, 1);
        }
        assert_eq!(IpIdBehavior::SequentialSwapped, behavior);
    }

    #[test]
    fn jumping_ids_become_random() {
        let mut state = IpIdState::new(4, 10);
        assert_eq!(IpIdBehavior::Random, state.observe(5000, 1));
    }

    #[test]
    fn zero_ids_classify_zero() {
        let mut state = IpIdState::new(4, 0);
        assert_eq!(IpIdBehavior::Zero, state.behavior);
        assert_eq!(IpIdBehavior::Zero, state.observe(0, 1));
    }

    #[test]
    fn constant_offset_of_zero() {
        let state = IpIdState::new(4, 1);
        assert_eq!(0, state.offset(5, 5));
        assert_eq!(3, state.offset(8, 5));
    }
}
