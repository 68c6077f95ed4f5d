//! LZMA and LZMA2 codecs plus the Delta/BCJ/BCJ2 filter family that sits in
//! front of them in 7z and XZ streams.
//!
//! - [`lz`]: the shared LZ77 dictionary window and hash-chain match finder.
//! - [`lzma`]: the raw probability-coded literal/match/rep packet stream.
//! - [`lzma2`]: the chunked container around [`lzma`] that XZ and 7z embed.
//! - [`filter`]: reversible preprocessing passes ([`filter::delta`],
//!   [`filter::bcj`], [`filter::bcj2`]) applied before LZMA and undone after.

pub mod filter;
pub mod lz;
pub mod lzma;
pub mod lzma2;

pub use lzma::{LzmaEncoderState, LzmaProps, LzmaState, MATCH_MAX_LEN, MATCH_MIN_LEN};
pub use lzma2::{compress, decompress, Lzma2Encoder, Lzma2Reader};
