//! SipHash-2-4 keyed edge hash
//!
//! The Cuckoo graph derives both endpoints of every edge from this function. The
//! single-word form used here hashes one 64-bit input without the length block of
//! the byte-oriented SipHash, so it must be used only where the miner uses it too.

const INIT_V0: u64 = 0x736f_6d65_7073_6575;
const INIT_V1: u64 = 0x646f_7261_6e64_6f6d;
const INIT_V2: u64 = 0x6c79_6765_6e65_7261;
const INIT_V3: u64 = 0x7465_6462_7974_6573;

/// Internal SipHash state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SipState {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl SipState {
    #[inline(always)]
    fn new(k0: u64, k1: u64) -> Self {
        Self {
            v0: INIT_V0 ^ k0,
            v1: INIT_V1 ^ k1,
            v2: INIT_V2 ^ k0,
            v3: INIT_V3 ^ k1,
        }
    }

    #[inline(always)]
    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);

        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;

        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;

        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Absorb one message word with two compression rounds
    #[inline(always)]
    fn compress(&mut self, word: u64) {
        self.v3 ^= word;
        self.round();
        self.round();
        self.v0 ^= word;
    }

    #[inline(always)]
    fn finish(mut self) -> u64 {
        self.v2 ^= 0xff;
        self.round();
        self.round();
        self.round();
        self.round();
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

/// Hash a single 64-bit word under the key `(k0, k1)`
#[inline]
pub fn siphash24(input: u64, k0: u64, k1: u64) -> u64 {
    let mut state = SipState::new(k0, k1);
    state.compress(input);
    state.finish()
}
