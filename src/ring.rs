use crate::format::Sample;

/// Number of samples held by a plane's ring dictionary
pub(crate) const RING_SIZE: usize = 0x1000;
const RING_MASK: usize = RING_SIZE - 1;

/// Reduce a position to a ring slot
#[inline]
pub(crate) const fn wrap(pos: usize) -> usize {
    pos & RING_MASK
}

/// The fixed size, circular sample history shared by the decoder and encoder.
///
/// `write` is where the next sample lands. `read` trails behind it and is only used
/// by the decoder to pull finished samples out in FIFO order. Old samples are never
/// removed; they are simply overwritten once `write` comes back around.
#[derive(Debug, Clone)]
pub(crate) struct RingDict<S> {
    slots: Box<[S]>,
    write: usize,
    read: usize,
}

impl<S: Sample> RingDict<S> {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![S::default(); RING_SIZE].into_boxed_slice(),
            write: 0,
            read: 0,
        }
    }

    /// current write slot
    #[inline]
    pub(crate) fn cursor(&self) -> usize {
        self.write
    }

    #[inline]
    pub(crate) fn get(&self, slot: usize) -> S {
        self.slots[wrap(slot)]
    }

    /// The `len` samples starting at `slot`, wrapping around the end of the ring
    pub(crate) fn run(&self, slot: usize, len: usize) -> impl Iterator<Item = S> + '_ {
        (slot..slot + len).map(move |s| self.get(s))
    }

    pub(crate) fn push(&mut self, sample: S) {
        self.slots[self.write] = sample;
        self.write = wrap(self.write + 1);
    }

    /// Slot that a copy-back with `offset` starts from
    #[inline]
    pub(crate) fn source_of(&self, offset: usize) -> usize {
        wrap(self.write.wrapping_sub(offset + 1))
    }

    /// Offset that refers back to `slot` from the current write position
    #[inline]
    pub(crate) fn offset_of(&self, slot: usize) -> usize {
        wrap(self.write.wrapping_sub(slot + 1))
    }

    /// Copy `length` samples from `offset + 1` slots behind the write position
    pub(crate) fn copy_back(&mut self, offset: usize, length: usize) {
        let src = self.source_of(offset);
        self.copy_from(src, length);
    }

    /// Copy `length` samples from `src` to the write position, one at a time,
    /// so an overlapping copy repeats what it just wrote
    pub(crate) fn copy_from(&mut self, mut src: usize, length: usize) {
        for _ in 0..length {
            self.slots[self.write] = self.slots[src];
            self.write = wrap(self.write + 1);
            src = wrap(src + 1);
        }
    }

    /// Place `samples` at and after the write position without moving it
    pub(crate) fn stage(&mut self, samples: &[S]) {
        for (k, &sample) in samples.iter().enumerate() {
            self.slots[wrap(self.write + k)] = sample;
        }
    }

    /// Move the next `count` samples from the read position into `out`
    pub(crate) fn drain_into(&mut self, out: &mut Vec<S>, count: usize) {
        out.extend(self.run(self.read, count));
        self.read = wrap(self.read + count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_wraps_around() {
        let mut ring = RingDict::<u8>::new();
        for i in 0..RING_SIZE + 2 {
            ring.push(i as u8);
        }

        assert_eq!(ring.cursor(), 2);
        assert_eq!(ring.get(0), RING_SIZE as u8);
        assert_eq!(ring.get(1), (RING_SIZE + 1) as u8);
        assert_eq!(ring.get(2), 2);
    }

    #[test]
    fn overlapping_copy_repeats() {
        let mut ring = RingDict::<u8>::new();
        ring.push(1);
        ring.push(2);
        // offset 1 => two slots behind
        ring.copy_back(1, 5);

        let mut out = Vec::new();
        ring.drain_into(&mut out, 7);
        assert_eq!(out, [1, 2, 1, 2, 1, 2, 1]);
    }

    #[test]
    fn copy_across_the_end() {
        let mut ring = RingDict::<u8>::new();
        for _ in 0..RING_SIZE - 3 {
            ring.push(0);
        }
        for b in 1..=3 {
            ring.push(b);
        }
        assert_eq!(ring.cursor(), 0);

        ring.copy_back(2, 3);
        assert_eq!(ring.cursor(), 3);
        assert_eq!(ring.run(0, 3).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn offsets_and_sources_agree() {
        let mut ring = RingDict::<u8>::new();
        assert_eq!(ring.source_of(0), RING_SIZE - 1);
        assert_eq!(ring.offset_of(RING_SIZE - 1), 0);

        ring.push(9);
        assert_eq!(ring.source_of(0), 0);
        assert_eq!(ring.offset_of(0), 0);
        assert_eq!(ring.offset_of(1), RING_SIZE - 1);
        assert_eq!(ring.source_of(RING_SIZE - 1), 1);
    }

    #[test]
    fn staging_keeps_cursor() {
        let mut ring = RingDict::<u8>::new();
        ring.push(5);
        ring.stage(&[6, 7]);

        assert_eq!(ring.cursor(), 1);
        assert_eq!(ring.run(0, 3).collect::<Vec<_>>(), [5, 6, 7]);
    }
}
