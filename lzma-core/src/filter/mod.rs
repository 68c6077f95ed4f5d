//! Reversible preprocessing filters applied before (and undone after) the
//! LZMA/LZMA2 entropy stage: [`delta`] for fixed-stride numeric data and the
//! [`bcj`]/[`bcj2`] branch-converters for executable code.

pub mod bcj;
pub mod bcj2;
pub mod delta;

pub use bcj::{BcjArch, BcjReader, BcjState, BcjWriter};
pub use bcj2::{read_framed, write_framed, Bcj2Decoder, Bcj2Encoder, Bcj2Streams};
pub use delta::{DeltaReader, DeltaWriter};
