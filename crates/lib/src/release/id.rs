//! Release ID generation.
//!
//! Release IDs are ULIDs: a 48-bit millisecond timestamp followed by 80 bits of
//! randomness, encoded as 26 Crockford base32 characters. IDs from one
//! generator sort lexically in creation order, including IDs created within
//! the same millisecond.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use thiserror::Error;

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const RANDOM_BITS: u32 = 80;
const RANDOM_MASK: u128 = (1u128 << RANDOM_BITS) - 1;
const MAX_TIMESTAMP_MS: u64 = (1u64 << 48) - 1;

pub const RELEASE_ID_LEN: usize = 26;

#[derive(Debug, Error)]
pub enum ReleaseIdError {
  #[error("generate release id: clock is before the unix epoch")]
  ClockBeforeEpoch,

  #[error("generate release id: timestamp out of range")]
  TimestampOverflow,

  #[error("generate release id: insufficient entropy")]
  EntropyExhausted,

  #[error("generate release id: generator lock poisoned")]
  Poisoned,
}

/// Source of fresh release IDs.
pub trait ReleaseIdSource: Send + Sync {
  fn next_id(&self, now: SystemTime) -> Result<String, ReleaseIdError>;
}

#[derive(Debug, Default)]
struct MonotonicState {
  last_ms: u64,
  last_random: u128,
}

/// Monotonic ULID generator.
///
/// Within one millisecond the random component is incremented instead of
/// redrawn, so IDs stay strictly increasing.
#[derive(Debug, Default)]
pub struct UlidGenerator {
  state: Mutex<MonotonicState>,
}

impl UlidGenerator {
  pub const fn new() -> Self {
    Self {
      state: Mutex::new(MonotonicState {
        last_ms: 0,
        last_random: 0,
      }),
    }
  }
}

static RELEASE_IDS: UlidGenerator = UlidGenerator::new();

/// Process-wide generator, so IDs stay ordered across engines.
pub fn default_id_source() -> &'static UlidGenerator {
  &RELEASE_IDS
}

impl ReleaseIdSource for UlidGenerator {
  fn next_id(&self, now: SystemTime) -> Result<String, ReleaseIdError> {
    let ms = now
      .duration_since(UNIX_EPOCH)
      .map_err(|_| ReleaseIdError::ClockBeforeEpoch)?
      .as_millis();
    let ms = u64::try_from(ms).map_err(|_| ReleaseIdError::TimestampOverflow)?;
    if ms > MAX_TIMESTAMP_MS {
      return Err(ReleaseIdError::TimestampOverflow);
    }

    let mut state = self.state.lock().map_err(|_| ReleaseIdError::Poisoned)?;
    let random = if ms <= state.last_ms && state.last_ms != 0 {
      let next = state.last_random + 1;
      if next > RANDOM_MASK {
        return Err(ReleaseIdError::EntropyExhausted);
      }
      next
    } else {
      let mut bytes = [0u8; 16];
      rand::thread_rng().fill_bytes(&mut bytes[6..]);
      u128::from_be_bytes(bytes) & RANDOM_MASK
    };
    let ms = ms.max(state.last_ms);
    state.last_ms = ms;
    state.last_random = random;

    Ok(encode(((ms as u128) << RANDOM_BITS) | random))
  }
}

fn encode(value: u128) -> String {
  (0..RELEASE_ID_LEN)
    .map(|i| {
      let shift = 125 - 5 * i as u32;
      CROCKFORD[((value >> shift) & 0x1f) as usize] as char
    })
    .collect()
}

/// Whether `id` has the shape of a release ID.
pub fn is_release_id(id: &str) -> bool {
  id.len() == RELEASE_ID_LEN && id.bytes().all(|b| CROCKFORD.contains(&b))
}
