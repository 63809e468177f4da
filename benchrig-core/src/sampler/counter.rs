//! Raw hardware counter access and wraparound arithmetic

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

/// Bit width of a free-running hardware counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterWidth {
    bits: u32,
}

impl CounterWidth {
    /// Widest supported counter
    pub const MAX_BITS: u32 = 64;

    /// Creates a width, rejecting 0 and anything above 64 bits
    #[must_use]
    pub const fn new(bits: u32) -> Option<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            None
        } else {
            Some(Self { bits })
        }
    }

    /// Number of bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// `2^bits`, the value at which the counter wraps to zero
    #[must_use]
    pub const fn modulus(self) -> u128 {
        1u128 << self.bits
    }

    /// Keeps the low `bits` of a reading
    #[must_use]
    pub const fn mask(self, value: u64) -> u64 {
        if self.bits >= Self::MAX_BITS {
            value
        } else {
            value & ((1u64 << self.bits) - 1)
        }
    }
}

impl Default for CounterWidth {
    fn default() -> Self {
        Self { bits: 32 }
    }
}

/// Counter increase between two reads, corrected for one wraparound
///
/// Both readings are first masked to `width`. Then `new - old` when
/// `new >= old`, otherwise `new + modulus - old`. A counter that wrapped more
/// than once between two reads cannot be told apart from one that wrapped
/// once.
#[must_use]
pub fn wrapping_delta(old: u64, new: u64, width: CounterWidth) -> u64 {
    let (old, new) = (width.mask(old), width.mask(new));
    if new >= old {
        new - old
    } else {
        let delta = u128::from(new) + width.modulus() - u128::from(old);
        u64::try_from(delta).unwrap_or(u64::MAX)
    }
}

/// Parses a counter value as written by the hwmon driver (`0x1f`, `1f`)
///
/// # Errors
///
/// Returns `CounterRead` naming `path` if `text` is not hexadecimal.
pub fn parse_hex_counter(text: &str, path: &Path) -> TelemetryResult<u64> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|e| TelemetryError::CounterRead {
        path: path.to_path_buf(),
        reason: format!("'{trimmed}' is not a hex counter: {e}"),
    })
}

/// Reads one counter file
///
/// # Errors
///
/// Returns `CounterRead` if the file cannot be read or parsed.
pub fn read_hex_counter(path: &Path) -> TelemetryResult<u64> {
    let text = std::fs::read_to_string(path).map_err(|e| TelemetryError::CounterRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_hex_counter(&text, path)
}
