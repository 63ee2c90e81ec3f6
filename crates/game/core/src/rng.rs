//! Named, deterministic random streams.
//!
//! Every consumer of randomness draws from a named stream obtained through
//! [`RngStreams::stream`]. A stream's seed is a pure function of the run seed
//! and the stream name, so draws on one stream never perturb another and two
//! runs with the same seed replay the same numbers.
//!
//! # Determinism
//!
//! There is no ambient or thread-local generator anywhere in the crate. The
//! only way to seed the streams is [`RngStreams::seed_run`] at run start.

use std::collections::BTreeMap;

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Name of the reserved stream used for empty or malformed names.
pub const DEFAULT_STREAM: &str = "default";

/// Name of the stream the damage pipeline rolls crits on.
pub const CRIT_STREAM: &str = "crit";

const MAX_STREAM_NAME_LEN: usize = 32;

/// Derive a stream seed from the run seed and a stream name.
///
/// SHA-256 over the little-endian run seed followed by the name bytes; the
/// first eight digest bytes are read back as a little-endian `u64`.
pub fn derive_stream_seed(run_seed: u64, name: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(run_seed.to_le_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Resolves a requested stream name to the name actually used.
///
/// Valid names are 1..=32 bytes of `[a-z0-9_.-]`. Anything else maps to
/// [`DEFAULT_STREAM`].
pub fn canonical_stream_name(name: &str) -> &str {
    let valid = !name.is_empty()
        && name.len() <= MAX_STREAM_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'.' | b'-'));

    if valid { name } else { DEFAULT_STREAM }
}

/// PCG random number generator (Permuted Congruential Generator).
///
/// PCG-XSH-RR: 64-bit LCG state, 32-bit permuted output.
///
/// # Properties
///
/// - **Deterministic**: Same seed always produces same sequence
/// - **Fast**: Single multiply + xorshift + rotate
/// - **Small state**: Only 64 bits
///
/// # References
///
/// - PCG paper: <https://www.pcg-random.org/>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRng {
    state: u64,
}

impl StreamRng {
    /// PCG multiplier constant.
    const MULTIPLIER: u64 = 6364136223846793005;

    /// PCG increment constant.
    const INCREMENT: u64 = 1442695040888963407;

    /// Create a generator from a stream seed.
    pub fn from_seed(seed: u64) -> Self {
        // Standard PCG initialization: step once from zero, mix in the seed, step again.
        let mut rng = Self { state: 0 };
        rng.step();
        rng.state = rng.state.wrapping_add(seed);
        rng.step();
        rng
    }

    #[inline]
    fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
    }

    /// XSH-RR output permutation of the pre-step state.
    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Uniform float in `[0, 1)` built from the top 24 bits of one draw.
    pub fn next_unit(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
    }

    /// Returns true with probability `chance` (clamped to `[0, 1]`).
    ///
    /// Always consumes exactly one draw so stream positions do not depend on
    /// the chance value.
    pub fn chance(&mut self, chance: f32) -> bool {
        let roll = self.next_unit();
        roll < chance.clamp(0.0, 1.0)
    }
}

impl RngCore for StreamRng {
    fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.step();
        Self::output(old)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Owner of every random stream in a run.
///
/// Streams are created on first request and cached; later requests for the
/// same name return the same generator, continuing its sequence.
#[derive(Clone, Debug)]
pub struct RngStreams {
    run_seed: u64,
    streams: BTreeMap<String, StreamRng>,
}

impl RngStreams {
    /// Seed the stream manager for a new run.
    ///
    /// This is the only seeding entry point; there is no way to reseed an
    /// existing manager mid-run.
    pub fn seed_run(run_seed: u64) -> Self {
        tracing::debug!(target: "combat::rng", run_seed, "seeded rng streams");
        Self {
            run_seed,
            streams: BTreeMap::new(),
        }
    }

    /// The seed this run was started with.
    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    /// Returns the generator for `name`, creating it on first use.
    ///
    /// Empty or malformed names resolve to the reserved default stream.
    pub fn stream(&mut self, name: &str) -> &mut StreamRng {
        let name = canonical_stream_name(name);
        let run_seed = self.run_seed;

        if !self.streams.contains_key(name) {
            let seed = derive_stream_seed(run_seed, name);
            tracing::trace!(target: "combat::rng", stream = name, seed, "created stream");
            self.streams
                .insert(name.to_owned(), StreamRng::from_seed(seed));
        }

        // Inserted above when missing.
        self.streams
            .get_mut(name)
            .unwrap_or_else(|| unreachable!("stream {name} was just inserted"))
    }

    /// Number of streams created so far.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
