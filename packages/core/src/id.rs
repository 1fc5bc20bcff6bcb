//! Time-ordered 64-bit identifiers and their allocator.
//!
//! Layout of an [`Identifier`]:
//!
//! ```text
//! | 63     | 62 .. 20                       | 19 .. 0                  |
//! | unused | tick: ms since epoch (43 bits) | random (20 bits)         |
//! ```
//!
//! Identifiers cross process boundaries as a fixed-width 13 character
//! Crockford-style base32 token, so lexicographic order of the token matches
//! numeric order of the value.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of bits holding the millisecond tick.
pub const TICK_BITS: u32 = 43;
/// Number of bits holding the random component.
pub const RANDOM_BITS: u32 = 20;
/// Length of the textual form.
pub const ENCODED_LEN: usize = 13;

const TICK_MASK: u64 = (1 << TICK_BITS) - 1;
const RANDOM_MASK: u32 = (1 << RANDOM_BITS) - 1;

/// Draws per tick before the allocator gives up on the current tick.
const MAX_ATTEMPTS: usize = 10;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const INVALID: u8 = u8::MAX;

/// ASCII lookup table: canonical symbols in both cases plus the
/// commonly confused letters `O` -> 0 and `I`/`L` -> 1.
const DECODE_TABLE: [u8; 128] = {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        let symbol = ALPHABET[i];
        table[symbol as usize] = i as u8;
        table[symbol.to_ascii_lowercase() as usize] = i as u8;
        i += 1;
    }
    table[b'O' as usize] = 0;
    table[b'o' as usize] = 0;
    table[b'I' as usize] = 1;
    table[b'i' as usize] = 1;
    table[b'L' as usize] = 1;
    table[b'l' as usize] = 1;
    table
};

/// Errors produced when decoding an identifier from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid encoding: unexpected character {ch:?} at position {position}")]
    InvalidEncoding { ch: char, position: usize },
    #[error("invalid length: expected 1 to 13 characters, got {0}")]
    InvalidLength(usize),
    #[error("identifier does not fit in 63 bits")]
    Overflow,
}

/// Unique, time-sortable identifier used as the primary key of durable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(i64);

impl Identifier {
    /// Compose an identifier from a tick and a random component.
    ///
    /// Both parts are masked to their field widths.
    pub fn from_parts(tick: u64, random: u32) -> Self {
        let value = ((tick & TICK_MASK) << RANDOM_BITS) | u64::from(random & RANDOM_MASK);
        Self(value as i64)
    }

    /// Wrap a raw value. Negative values are rejected since the sign bit is never set.
    pub fn from_i64(value: i64) -> Option<Self> {
        (value >= 0).then_some(Self(value))
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Millisecond tick the identifier was minted at.
    pub fn tick(self) -> u64 {
        (self.0 as u64) >> RANDOM_BITS
    }

    pub fn random(self) -> u32 {
        (self.0 as u64 & u64::from(RANDOM_MASK)) as u32
    }

    /// Wall-clock time of the tick.
    pub fn timestamp(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.tick() as i64)
    }

    /// Encode as the fixed-width 13 character token, left-padded with `0`.
    pub fn encode(self) -> String {
        let mut buf = [b'0'; ENCODED_LEN];
        let mut value = self.0 as u64;
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(value % 32) as usize];
            value /= 32;
        }
        buf.iter().map(|&b| b as char).collect()
    }

    /// Decode a token. Case-insensitive; `O` reads as `0`, `I` and `L` read as `1`.
    pub fn decode(input: &str) -> Result<Self, IdError> {
        let len = input.chars().count();
        if len == 0 || len > ENCODED_LEN {
            return Err(IdError::InvalidLength(len));
        }

        let mut value: u64 = 0;
        for (position, ch) in input.chars().enumerate() {
            let digit = decode_symbol(ch).ok_or(IdError::InvalidEncoding { ch, position })?;
            value = value
                .checked_mul(32)
                .and_then(|v| v.checked_add(u64::from(digit)))
                .ok_or(IdError::Overflow)?;
        }

        i64::try_from(value).map(Self).map_err(|_| IdError::Overflow)
    }
}

fn decode_symbol(ch: char) -> Option<u8> {
    if !ch.is_ascii() {
        return None;
    }
    match DECODE_TABLE[ch as usize] {
        INVALID => None,
        digit => Some(digit),
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Identifier {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Source of random values; only the low 20 bits are used.
pub trait RandomSource: Send + 'static {
    fn draw(&mut self) -> u32;
}

impl RandomSource for StdRng {
    fn draw(&mut self) -> u32 {
        self.next_u32()
    }
}

struct AllocatorState {
    last_tick: u64,
    used: HashSet<u32>,
    random: Box<dyn RandomSource>,
}

/// Mints [`Identifier`]s. Safe to share between threads.
///
/// Within one tick the allocator remembers the random values it handed out and
/// redraws on a repeat. When ten draws in a row collide it moves
/// on to the next tick instead of returning a duplicate, and its tick never
/// moves backwards, so identifiers from one allocator are unique.
pub struct IdAllocator {
    clock: Box<dyn Clock>,
    state: Mutex<AllocatorState>,
}

impl IdAllocator {
    /// Allocator backed by the system clock and an OS-seeded generator.
    pub fn new() -> Self {
        Self::with_sources(SystemClock, StdRng::from_os_rng())
    }

    pub fn with_sources(clock: impl Clock, random: impl RandomSource) -> Self {
        Self {
            clock: Box::new(clock),
            state: Mutex::new(AllocatorState {
                last_tick: 0,
                used: HashSet::new(),
                random: Box::new(random),
            }),
        }
    }

    /// Mint a new identifier. Never fails.
    pub fn allocate(&self) -> Identifier {
        let now = self.clock.now_millis() & TICK_MASK;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if now > state.last_tick {
            state.last_tick = now;
            state.used.clear();
        }

        loop {
            for _ in 0..MAX_ATTEMPTS {
                let random = state.random.draw() & RANDOM_MASK;
                if state.used.insert(random) {
                    return Identifier::from_parts(state.last_tick, random);
                }
            }

            tracing::debug!(tick = state.last_tick, "random space congested, advancing tick");
            state.last_tick += 1;
            state.used.clear();
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedClock(Arc<AtomicU64>);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Replays a script of values, repeating the last one forever.
    struct Scripted {
        values: Vec<u32>,
        next: usize,
    }

    impl Scripted {
        fn new(values: Vec<u32>) -> Self {
            Self { values, next: 0 }
        }
    }

    impl RandomSource for Scripted {
        fn draw(&mut self) -> u32 {
            let idx = self.next.min(self.values.len() - 1);
            self.next += 1;
            self.values[idx]
        }
    }

    fn fixed(tick: u64, values: Vec<u32>) -> (IdAllocator, Arc<AtomicU64>) {
        let now = Arc::new(AtomicU64::new(tick));
        let allocator = IdAllocator::with_sources(FixedClock(now.clone()), Scripted::new(values));
        (allocator, now)
    }

    #[test]
    fn test_layout() {
        let id = Identifier::from_parts(1_700_000_000_000, 0xABCDE);
        assert_eq!(id.tick(), 1_700_000_000_000);
        assert_eq!(id.random(), 0xABCDE);
        assert!(id.as_i64() >= 0);
        assert_eq!(
            id.timestamp().map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_random_field_is_masked() {
        let id = Identifier::from_parts(5, u32::MAX);
        assert_eq!(id.random(), RANDOM_MASK);
        assert_eq!(id.tick(), 5);
    }

    #[test]
    fn test_allocate_uses_current_time() {
        let before = Utc::now().timestamp_millis() as u64;
        let id = IdAllocator::new().allocate();
        let after = Utc::now().timestamp_millis() as u64;
        assert!(id.tick() >= before && id.tick() <= after + 1);
    }

    #[test]
    fn test_encode_roundtrip() {
        for value in [0, 1, 31, 32, 42, 123_456, 987_654_321, i64::MAX] {
            let id = Identifier(value);
            let encoded = id.encode();
            assert_eq!(encoded.len(), ENCODED_LEN);
            assert_eq!(Identifier::decode(&encoded), Ok(id));
        }
    }

    #[test]
    fn test_allocated_ids_roundtrip() {
        let allocator = IdAllocator::new();
        for _ in 0..1000 {
            let id = allocator.allocate();
            assert_eq!(id.to_string().parse::<Identifier>(), Ok(id));
        }
    }

    #[test]
    fn test_zero_is_padded() {
        assert_eq!(Identifier(0).encode(), "0000000000000");
        assert_eq!(Identifier(33).encode(), "0000000000011");
    }

    #[test]
    fn test_encoding_sorts_by_tick() {
        let older = Identifier::from_parts(1_000_000, RANDOM_MASK).encode();
        let newer = Identifier::from_parts(1_000_001, 0).encode();
        assert!(older < newer);
    }

    #[test]
    fn test_encoding_sorts_by_random_within_tick() {
        let small = Identifier::from_parts(1_000_000, 1).encode();
        let big = Identifier::from_parts(1_000_000, 2).encode();
        assert!(small < big);
    }

    #[test]
    fn test_decode_ambiguous_characters() {
        let canonical = Identifier(1_234_567_890).encode();
        assert!(canonical.contains('0') && canonical.contains('1'));
        let sloppy = canonical.replacen('0', "O", 2).replacen('1', "I", 1);
        let sloppy_l = canonical.replace('1', "l").replace('0', "o");

        let expected = Identifier::decode(&canonical);
        assert_eq!(Identifier::decode(&sloppy), expected);
        assert_eq!(Identifier::decode(&sloppy_l), expected);
        assert_eq!(Identifier::decode(&canonical.replace('1', "L")), expected);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let id = Identifier::from_parts(1_725_000_000_000, 0xFACE);
        let encoded = id.encode();
        assert_eq!(Identifier::decode(&encoded.to_lowercase()), Ok(id));
    }

    #[test]
    fn test_decode_invalid_character() {
        assert_eq!(
            Identifier::decode("!@#$"),
            Err(IdError::InvalidEncoding { ch: '!', position: 0 })
        );
        // U is not part of the alphabet
        assert!(matches!(
            Identifier::decode("000000000000U"),
            Err(IdError::InvalidEncoding { ch: 'U', position: 12 })
        ));
        assert!(matches!(
            Identifier::decode("00é"),
            Err(IdError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_decode_length_and_range() {
        assert_eq!(Identifier::decode(""), Err(IdError::InvalidLength(0)));
        assert_eq!(
            Identifier::decode("00000000000000"),
            Err(IdError::InvalidLength(14))
        );
        // 13 symbols can express 65 bits; anything past i64::MAX is rejected.
        assert_eq!(Identifier::decode("ZZZZZZZZZZZZZ"), Err(IdError::Overflow));
        assert_eq!(Identifier::decode("8000000000000"), Err(IdError::Overflow));
        assert_eq!(Identifier::decode("7ZZZZZZZZZZZZ"), Ok(Identifier(i64::MAX)));
    }

    #[test]
    fn test_from_i64_rejects_negative() {
        assert_eq!(Identifier::from_i64(-1), None);
        assert_eq!(Identifier::from_i64(7).map(Identifier::as_i64), Some(7));
    }

    #[test]
    fn test_json_is_string_form() {
        let id = Identifier::from_parts(1_725_000_000_000, 99);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.encode()));
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Identifier>("\"!!\"").is_err());
        assert!(serde_json::from_str::<Identifier>("42").is_err());
    }

    #[test]
    fn test_no_repeat_within_tick() {
        let (allocator, _) = fixed(1_000, vec![3, 3, 7, 3, 7, 9]);
        let ids: Vec<_> = (0..3).map(|_| allocator.allocate()).collect();
        assert_eq!(
            ids.iter().map(|id| id.random()).collect::<Vec<_>>(),
            vec![3, 7, 9]
        );
        assert!(ids.iter().all(|id| id.tick() == 1_000));
    }

    #[test]
    fn test_new_tick_resets_used_values() {
        let (allocator, now) = fixed(1_000, vec![5]);
        let first = allocator.allocate();
        now.store(1_001, Ordering::SeqCst);
        let second = allocator.allocate();
        assert_eq!((first.tick(), first.random()), (1_000, 5));
        assert_eq!((second.tick(), second.random()), (1_001, 5));
    }

    #[test]
    fn test_exhausted_tick_advances_instead_of_repeating() {
        let (allocator, _) = fixed(1_000, vec![5]);
        let first = allocator.allocate();
        let second = allocator.allocate();
        assert_ne!(first, second);
        assert_eq!(second.tick(), 1_001);
        assert!(first.encode() < second.encode());
    }

    #[test]
    fn test_clock_regression_does_not_rewind() {
        let (allocator, now) = fixed(2_000, vec![1, 2]);
        let first = allocator.allocate();
        now.store(1_500, Ordering::SeqCst);
        let second = allocator.allocate();
        assert_eq!(second.tick(), 2_000);
        assert_ne!(first, second);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        use std::thread;

        let allocator = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || (0..500).map(|_| allocator.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate identifier {id}");
            }
        }
        assert_eq!(all.len(), 4000);
    }
}
