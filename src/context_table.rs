//! Direct-indexed context storage shared by both engines.
//!
//! CIDs are dense small integers, so the table is a plain vector of
//! options. Recency for eviction is tracked by an intrusive
//! doubly-linked list of slot indices rather than timestamps.

const NONE: u16 = u16::MAX;

/// Intrusive LRU list over slot indices `0..capacity`.
#[derive(Clone, Debug)]
pub(crate) struct LruList {
    prev: Vec<u16>,
    next: Vec<u16>,
    head: u16,
    tail: u16,
}

impl LruList {
    pub(crate) fn new(capacity: usize) -> LruList {
        LruList {
            prev: vec![NONE; capacity],
            next: vec![NONE; capacity],
            head: NONE,
            tail: NONE,
        }
    }

    /// Moves `idx` to the front (most recently used), linking it in if
    /// it was not part of the list.
    pub(crate) fn touch(&mut self, idx: u16) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.prev[usize::from(idx)] = NONE;
        self.next[usize::from(idx)] = self.head;
        if self.head != NONE {
            self.prev[usize::from(self.head)] = idx;
        }
        self.head = idx;
        if self.tail == NONE {
            self.tail = idx;
        }
    }

    /// Unlinks `idx` from the list.
    pub(crate) fn remove(&mut self, idx: u16) {
        self.unlink(idx);
        self.prev[usize::from(idx)] = NONE;
        self.next[usize::from(idx)] = NONE;
    }

    /// Least recently used index, if the list is non-empty.
    pub(crate) fn lru(&self) -> Option<u16> {
        if self.tail == NONE {
            None
        } else {
            Some(self.tail)
        }
    }

    fn unlink(&mut self, idx: u16) {
        let i = usize::from(idx);
        let (p, n) = (self.prev[i], self.next[i]);
        if p != NONE {
            self.next[usize::from(p)] = n;
        } else if self.head == idx {
            self.head = n;
        }
        if n != NONE {
            self.prev[usize::from(n)] = p;
        } else if self.tail == idx {
            self.tail = p;
        }
    }
}

/// Context table: a slot per CID plus the LRU list.
#[derive(Clone, Debug)]
pub(crate) struct ContextTable<C> {
    slots: Vec<Option<C>>,
    lru: LruList,
    len: usize,
}

impl<C> ContextTable<C> {
    pub(crate) fn new(capacity: usize) -> ContextTable<C> {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        ContextTable {
            slots,
            lru: LruList::new(capacity),
            len: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn get(&self, cid: u16) -> Option<&C> {
        self.slots.get(usize::from(cid))?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, cid: u16) -> Option<&mut C> {
        self.slots.get_mut(usize::from(cid))?.as_mut()
    }

    /// Marks a context as just used.
    pub(crate) fn touch(&mut self, cid: u16) {
        if usize::from(cid) < self.slots.len() && self.slots[usize::from(cid)].is_some() {
            self.lru.touch(cid);
        }
    }

    /// Stores a context under `cid` (replacing any previous one) and
    /// marks it most recently used.
    pub(crate) fn insert(&mut self, cid: u16, context: C) {
        let slot = &mut self.slots[usize::from(cid)];
        if slot.is_none() {
            self.len += 1;
        }
        *slot = Some(context);
        self.lru.touch(cid);
    }

    pub(crate) fn remove(&mut self, cid: u16) -> Option<C> {
        let taken = self.slots.get_mut(usize::from(cid))?.take();
        if taken.is_some() {
            self.len -= 1;
            self.lru.remove(cid);
        }
        taken
    }

    /// First CID without a context, or the least recently used CID for
    /// eviction when the table is full.
    pub(crate) fn free_or_lru_cid(&self) -> u16 {
        for (idx, slot) in self.slots.iter().enumerate() {
            if slot.is_none() {
                return idx as u16;
            }
        }
        self.lru.lru().unwrap_or(0)
    }

    /// Iterates over `(cid, context)` pairs.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u16, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|c| (idx as u16, c)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut table: ContextTable<&str> = ContextTable::new(4);
        table.insert(2, "two");
        assert_eq!(Some(&"two"), table.get(2));
        assert_eq!(None, table.get(0));
        assert_eq!(1, table.len());
    }

    #[test]
    fn free_slot_preferred_over_eviction() {
        let mut table: ContextTable<u32> = ContextTable::new(3);
        table.insert(0, 0);
        table.insert(1, 1);
        assert_eq!(2, table.free_or_lru_cid());
    }

    #[test]
    fn lru_order_follows_touches() {
        let mut table: ContextTable<u32> = ContextTable::new(3);
        table.insert(0, 0);
        table.insert(1, 1);
        table.insert(2, 2);
        // 0 is the oldest
        assert_eq!(0, table.free_or_lru_cid());
        table.touch(0);
        // now 1 is the oldest
        assert_eq!(1, table.free_or_lru_cid());
    }

    #[test]
    fn remove_unlinks() {
        let mut table: ContextTable<u32> = ContextTable::new(3);
        table.insert(0, 0);
        table.insert(1, 1);
        table.insert(2, 2);
        table.remove(0);
        assert_eq!(2, table.len());
        assert_eq!(0, table.free_or_lru_cid());
        table.insert(0, 9);
        assert_eq!(1, table.free_or_lru_cid());
    }
}
