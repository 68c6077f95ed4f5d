//! Leaf-layer primitives shared by every codec in the workspace: bit I/O,
//! the arithmetic range coder, checksums and the common error type.
//!
//! Nothing here depends on any other crate in the workspace; everything
//! else depends on this one.

pub mod bitio;
pub mod checksum;
pub mod error;
pub mod range_coder;

pub use bitio::{BitReader, BitWriter, ReverseBitReader, ReverseBitWriter};
pub use checksum::{CheckDigest, CheckType};
pub use error::{Error, Result};
pub use range_coder::{RangeDecoder, RangeEncoder, PROB_INIT};

/// A caller-supplied progress/cancellation hook. Returning `false` asks the
/// codec to stop at the next safe boundary, which surfaces as
/// [`Error::Cancelled`].
pub trait Progress {
    fn on_progress(&mut self, processed_in: u64, processed_out: u64) -> bool;
}

impl<F> Progress for F
where
    F: FnMut(u64, u64) -> bool,
{
    fn on_progress(&mut self, processed_in: u64, processed_out: u64) -> bool {
        self(processed_in, processed_out)
    }
}

/// A no-op progress sink for callers that do not need cancellation or
/// reporting.
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_progress(&mut self, _processed_in: u64, _processed_out: u64) -> bool {
        true
    }
}

/// Caller-imposed limits on a single codec call.
#[derive(Default)]
pub struct Limits {
    /// Hard ceiling on produced output bytes; exceeding it yields
    /// [`Error::LimitExceeded`] rather than an unbounded allocation.
    pub max_output_bytes: Option<u64>,
}

impl Limits {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_output_bytes(max_output_bytes: u64) -> Self {
        Self {
            max_output_bytes: Some(max_output_bytes),
        }
    }

    pub fn check(&self, produced: u64) -> Result<()> {
        if let Some(max) = self.max_output_bytes {
            if produced > max {
                return Err(Error::LimitExceeded);
            }
        }
        Ok(())
    }
}

/// Outcome of a codec call, mirroring the external interface contract:
/// callers get byte counts back, not just `()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub input_bytes: u64,
    pub output_bytes: u64,
}
