// 🏷️ Token Ids - Marker-bit identifiers and the global mint counter
//
// Entitlement ids live in the top half of the u128 space: the high bit is
// always set, the low bits carry a strictly increasing sequence number.
// Burned ids are retired, never handed out again.

use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// High-order marker separating entitlement ids from balance values
pub const TOKEN_ID_MARKER: u128 = 1 << 127;

/// Highest sequence an uncapped allocator hands out
pub const SEQUENCE_LIMIT: u64 = u64::MAX >> 1;

// ============================================================================
// TOKEN ID
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(u128);

impl TokenId {
    /// Id for the given mint sequence number (1-based)
    pub fn from_sequence(sequence: u64) -> Self {
        TokenId(TOKEN_ID_MARKER | sequence as u128)
    }

    /// Accepts only values carrying the marker bit
    pub fn from_raw(raw: u128) -> Option<Self> {
        if raw & TOKEN_ID_MARKER != 0 {
            Some(TokenId(raw))
        } else {
            None
        }
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn sequence(&self) -> u64 {
        (self.0 & !TOKEN_ID_MARKER) as u64
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.sequence())
    }
}

// ============================================================================
// TOKEN ID ALLOCATOR
// ============================================================================

/// Global mint counter. Only ever moves forward.
#[derive(Debug)]
pub struct TokenIdAllocator {
    minted: AtomicU64,
    cap: Option<u64>,
}

impl TokenIdAllocator {
    pub fn new(cap: Option<u64>) -> Self {
        TokenIdAllocator {
            minted: AtomicU64::new(0),
            cap,
        }
    }

    /// Number of ids allocated so far
    pub fn minted(&self) -> u64 {
        self.minted.load(Ordering::Acquire)
    }

    pub fn cap(&self) -> Option<u64> {
        self.cap
    }

    /// Configured cap, or the sequence ceiling when uncapped
    fn limit(&self) -> u64 {
        self.cap.unwrap_or(SEQUENCE_LIMIT)
    }

    fn exhausted(&self, requested: u64) -> LedgerError {
        match self.cap {
            Some(cap) => LedgerError::MintCapExceeded { cap, requested },
            None => LedgerError::Overflow,
        }
    }

    /// Check that `count` more ids fit under the same limit `allocate` enforces
    pub fn ensure_capacity(&self, count: u64) -> LedgerResult<()> {
        let requested = self
            .minted()
            .checked_add(count)
            .ok_or(LedgerError::Overflow)?;

        if requested > self.limit() {
            return Err(self.exhausted(requested));
        }
        Ok(())
    }

    /// Allocate the next id with a compare-and-increment on the counter
    pub fn allocate(&self) -> LedgerResult<TokenId> {
        let cap = self.limit();

        let previous = self
            .minted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current < cap {
                    Some(current + 1)
                } else {
                    None
                }
            })
            .map_err(|current| self.exhausted(current + 1))?;

        Ok(TokenId::from_sequence(previous + 1))
    }
}

impl Clone for TokenIdAllocator {
    fn clone(&self) -> Self {
        TokenIdAllocator {
            minted: AtomicU64::new(self.minted()),
            cap: self.cap,
        }
    }
}
