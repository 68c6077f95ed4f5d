//! Container-level plumbing that sits above the raw codecs in [`lzma_core`]
//! and [`ppmd_core`]: the XZ stream format, AES-256 encryption, solid-block
//! file grouping, and a small registry tying codec tags to implementations.

pub mod crypto;
pub mod registry;
pub mod solid;
pub mod xz;

pub use crypto::AesKey;
pub use registry::{CodecId, FilterChain};
pub use solid::{Entry, SolidBlockReader, SolidBlockWriter};
