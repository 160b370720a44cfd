/// Per-PID 4-bit continuity counter.
///
/// Every TS packet carrying payload for a PID is stamped with the next value
/// of that PID's counter. Counters run for the lifetime of the stream, so they
/// are not reset at segment boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContinuityCounter(u8);

impl ContinuityCounter {
    /// Maximum counter value.
    pub const MAX: u8 = (1 << 4) - 1;

    /// Makes a new counter whose first stamped value is `0`.
    pub fn new() -> Self {
        ContinuityCounter(0)
    }

    /// Returns the value for the next packet and advances by one, modulo 16.
    ///
    /// ```
    /// use tspackager::format::ts::ContinuityCounter;
    ///
    /// let mut counter = ContinuityCounter::new();
    /// assert_eq!(counter.get_next(), 0);
    /// for _ in 0..14 { counter.get_next(); }
    /// assert_eq!(counter.get_next(), 15);
    /// assert_eq!(counter.get_next(), 0);
    /// ```
    pub fn get_next(&mut self) -> u8 {
        let value = self.0;
        self.0 = (self.0 + 1) & Self::MAX;
        value
    }

    /// The value the next packet will carry.
    pub fn peek(&self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_wraps_at_sixteen() {
        let mut counter = ContinuityCounter::new();
        let values: Vec<u8> = (0..34).map(|_| counter.get_next()).collect();

        assert_eq!(&values[..16], &(0..16).collect::<Vec<u8>>()[..]);
        assert_eq!(values[16], 0);
        assert_eq!(values[33], 1);
        assert_eq!(counter.peek(), 2);
    }

    #[quickcheck]
    fn prop_kth_value_is_offset_mod_16(skip: u8, n: u8) -> bool {
        let mut counter = ContinuityCounter::new();
        for _ in 0..skip {
            counter.get_next();
        }
        let initial = counter.peek();
        (0..n as usize).all(|k| counter.get_next() as usize == (initial as usize + k) % 16)
    }

    #[quickcheck]
    fn prop_copies_are_independent(steps: u8) -> bool {
        let mut counter = ContinuityCounter::new();
        let mut scratch = counter;
        for _ in 0..steps {
            scratch.get_next();
        }
        counter.get_next() == 0 && scratch.peek() == steps % 16
    }
}
