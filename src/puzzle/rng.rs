//! Deterministic daily selection helpers.
//!
//! The webview and the batch generator must land on the same line for a given
//! `(pack, date)`, so both use these exact integer semantics: a 31-multiplier
//! string hash in wrapping 32-bit arithmetic over UTF-16 units, and mulberry32.

/// `hash = hash * 31 + unit` in wrapping `i32`, returned as its absolute value.
pub fn hash_string(s: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in s.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// Seed for a pack's puzzle on a date.
pub fn daily_seed(pack_id: &str, date: &str) -> u32 {
    hash_string(date).wrapping_add(hash_string(pack_id))
}

/// mulberry32 PRNG yielding floats in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Uniform index into a collection of `len` items. `len` must be non-zero.
    pub fn pick(&mut self, len: usize) -> usize {
        ((self.next_f64() * len as f64) as usize).min(len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(hash_string(""), 0);
        assert_eq!(hash_string("a"), 97);
        assert_eq!(hash_string("2026-10-15"), 1_162_559_495);
        assert_eq!(hash_string("shrek"), 109_415_971);
    }

    #[test]
    fn seed_combines_date_and_pack() {
        assert_eq!(daily_seed("shrek", "2026-10-15"), 1_271_975_466);
    }

    #[test]
    fn mulberry32_matches_reference_sequence() {
        let mut rng = Mulberry32::new(0);
        assert!((rng.next_f64() - 0.266_429_208_684_712_65).abs() < 1e-15);
        assert!((rng.next_f64() - 0.000_329_745_700_582_861_9).abs() < 1e-15);

        let mut rng = Mulberry32::new(daily_seed("shrek", "2026-10-15"));
        assert!((rng.next_f64() - 0.172_835_578_443_482_48).abs() < 1e-15);
        assert!((rng.next_f64() - 0.261_966_464_349_549_44).abs() < 1e-15);
    }

    #[test]
    fn pick_stays_in_range() {
        let mut rng = Mulberry32::new(42);
        for len in 1..50 {
            assert!(rng.pick(len) < len);
        }
    }
}
