//! XZ stream framing: header/footer, block header with filter flags, and
//! the index that ties block sizes together so the stream can be opened
//! from either end.
//!
//! Hand-frames the XZ wire format directly (no `liblzma` binding available
//! here), the same way `block.rs` frames 7z's own header structures by
//! hand.

use byteorder::{LittleEndian, WriteBytesExt};
use rc_core::checksum::{crc32_ieee, CheckType};
use rc_core::{Error, Result};

const STREAM_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const FOOTER_MAGIC: [u8; 2] = [0x59, 0x5A];
const MAX_FILTERS: usize = 4;

/// LZMA2, the only terminal codec this core frames into XZ blocks. Filter
/// IDs for the preprocessing passes ahead of it (Delta, the BCJ family).
pub mod filter_id {
    pub const DELTA: u64 = 0x03;
    pub const BCJ_X86: u64 = 0x04;
    pub const BCJ_POWERPC: u64 = 0x05;
    pub const BCJ_IA64: u64 = 0x06;
    pub const BCJ_ARM: u64 = 0x07;
    pub const BCJ_ARM_THUMB: u64 = 0x08;
    pub const BCJ_SPARC: u64 = 0x09;
    pub const BCJ_ARM64: u64 = 0x0A;
    pub const LZMA2: u64 = 0x21;
}

/// Writes a variable-length integer: 7 payload bits per byte, little-endian,
/// continuation signalled by the MSB.
pub fn write_vli(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Reads a VLI from `data` starting at `*pos`, advancing `*pos` past it.
pub fn read_vli(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..9 {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| Error::corrupt("xz: truncated VLI"))?;
        *pos += 1;
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::corrupt("xz: VLI too long"))
}

fn pad4(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

#[derive(Clone, Debug)]
pub struct FilterFlags {
    pub id: u64,
    pub props: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct BlockHeader {
    pub filters: Vec<FilterFlags>,
    pub compressed_size: Option<u64>,
    pub uncompressed_size: Option<u64>,
}

fn encode_block_header(header: &BlockHeader) -> Result<Vec<u8>> {
    if header.filters.is_empty() || header.filters.len() > MAX_FILTERS {
        return Err(Error::corrupt("xz: block must have 1..=4 filters"));
    }
    if header.filters.last().map(|f| f.id) != Some(filter_id::LZMA2) {
        return Err(Error::unsupported(
            "xz: terminal filter must be a real codec (lzma2)",
        ));
    }

    let mut body = Vec::new();
    let mut flags = (header.filters.len() as u8 - 1) & 0x03;
    if header.compressed_size.is_some() {
        flags |= 0x40;
    }
    if header.uncompressed_size.is_some() {
        flags |= 0x80;
    }
    body.push(flags);
    if let Some(sz) = header.compressed_size {
        write_vli(&mut body, sz);
    }
    if let Some(sz) = header.uncompressed_size {
        write_vli(&mut body, sz);
    }
    for f in &header.filters {
        write_vli(&mut body, f.id);
        write_vli(&mut body, f.props.len() as u64);
        body.extend_from_slice(&f.props);
    }
    let unpadded_len = 1 + body.len();
    let padded_len = unpadded_len + pad4(unpadded_len);
    let header_size_field = (padded_len / 4) as u8 - 1;

    let mut out = Vec::with_capacity(padded_len + 4);
    out.push(header_size_field);
    out.extend_from_slice(&body);
    out.resize(padded_len, 0);
    let crc = crc32_ieee(&out);
    out.write_u32::<LittleEndian>(crc).map_err(Error::Io)?;
    Ok(out)
}

fn decode_block_header(data: &[u8]) -> Result<(BlockHeader, usize)> {
    let size_field = *data
        .first()
        .ok_or_else(|| Error::corrupt("xz: empty block header"))?;
    if size_field == 0 {
        return Err(Error::corrupt("xz: zero-size block header"));
    }
    let real_size = (size_field as usize + 1) * 4;
    if data.len() < real_size + 4 {
        return Err(Error::corrupt("xz: block header truncated"));
    }
    let crc_stored = u32::from_le_bytes(
        data[real_size..real_size + 4]
            .try_into()
            .map_err(|_| Error::corrupt("xz: block header crc truncated"))?,
    );
    if crc32_ieee(&data[..real_size]) != crc_stored {
        return Err(Error::corrupt("xz: block header CRC mismatch"));
    }

    let flags = data[1];
    let num_filters = (flags & 0x03) as usize + 1;
    if num_filters > MAX_FILTERS {
        return Err(Error::corrupt("xz: block declares too many filters"));
    }
    let mut pos = 2usize;
    let compressed_size = if flags & 0x40 != 0 {
        Some(read_vli(data, &mut pos)?)
    } else {
        None
    };
    let uncompressed_size = if flags & 0x80 != 0 {
        Some(read_vli(data, &mut pos)?)
    } else {
        None
    };
    let mut filters = Vec::with_capacity(num_filters);
    for _ in 0..num_filters {
        let id = read_vli(data, &mut pos)?;
        let props_len = read_vli(data, &mut pos)? as usize;
        let props = data
            .get(pos..pos + props_len)
            .ok_or_else(|| Error::corrupt("xz: filter properties truncated"))?
            .to_vec();
        pos += props_len;
        filters.push(FilterFlags { id, props });
    }
    if filters.last().map(|f| f.id) != Some(filter_id::LZMA2) {
        return Err(Error::unsupported(
            "xz: terminal filter must be a real codec (lzma2)",
        ));
    }

    Ok((
        BlockHeader {
            filters,
            compressed_size,
            uncompressed_size,
        },
        real_size + 4,
    ))
}

struct BlockRecord {
    unpadded_size: u64,
    uncompressed_size: u64,
}

/// Encodes `data` as a single-block XZ stream. A thin wrapper over
/// [`encode_stream_blocks`] with a block size covering the whole input.
pub fn encode_stream(
    data: &[u8],
    check: CheckType,
    filters: &[FilterFlags],
    lzma2_payload: impl Fn(&[u8]) -> Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    encode_stream_blocks(data, check, filters, data.len().max(1), lzma2_payload)
}

/// Encodes `data` as an XZ stream split into independently-compressed
/// blocks of at most `block_size` bytes each, matching the format's
/// documented N-blocks-to-N-workers parallel-decode split: every block
/// carries its own header, compressed payload and integrity check, and the
/// index records all of them. A `block_size` at least as large as `data`
/// produces the single-block case.
pub fn encode_stream_blocks(
    data: &[u8],
    check: CheckType,
    filters: &[FilterFlags],
    block_size: usize,
    lzma2_payload: impl Fn(&[u8]) -> Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    let block_size = block_size.max(1);
    let mut out = Vec::new();
    out.extend_from_slice(&STREAM_MAGIC);
    let flags = [0u8, check.id()];
    out.extend_from_slice(&flags);
    let flags_crc = crc32_ieee(&flags);
    out.write_u32::<LittleEndian>(flags_crc).map_err(Error::Io)?;

    let chunks: &[&[u8]] = &if data.is_empty() {
        Vec::new()
    } else {
        data.chunks(block_size).collect::<Vec<_>>()
    };
    let mut records = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let compressed = lzma2_payload(chunk)?;
        let header = BlockHeader {
            filters: filters.to_vec(),
            compressed_size: Some(compressed.len() as u64),
            uncompressed_size: Some(chunk.len() as u64),
        };
        let header_bytes = encode_block_header(&header)?;
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&compressed);
        let pad = pad4(compressed.len());
        out.resize(out.len() + pad, 0);

        let mut digest = check.digest();
        digest.update(chunk);
        out.extend_from_slice(&digest.finalize());

        // Per the index's definition: header + compressed payload + check,
        // excluding the block's own trailing padding to a 4-byte boundary.
        records.push(BlockRecord {
            unpadded_size: (header_bytes.len() + compressed.len() + check.size()) as u64,
            uncompressed_size: chunk.len() as u64,
        });
    }
    log::debug!(
        "xz encode_stream_blocks: {} block(s), block_size={block_size}",
        records.len()
    );

    let index_start = out.len();
    let mut index = Vec::new();
    index.push(0u8);
    write_vli(&mut index, records.len() as u64);
    for record in &records {
        write_vli(&mut index, record.unpadded_size);
        write_vli(&mut index, record.uncompressed_size);
    }
    let index_pad = pad4(index.len());
    index.resize(index.len() + index_pad, 0);
    let index_crc = crc32_ieee(&index);
    out.extend_from_slice(&index);
    out.write_u32::<LittleEndian>(index_crc).map_err(Error::Io)?;

    let backward_size = ((out.len() - index_start) / 4) as u32 - 1;
    out.write_u32::<LittleEndian>(0).map_err(Error::Io)?; // placeholder CRC, fixed below
    let footer_crc_pos = out.len() - 4;
    out.write_u32::<LittleEndian>(backward_size)
        .map_err(Error::Io)?;
    out.extend_from_slice(&flags);
    out.extend_from_slice(&FOOTER_MAGIC);

    let crc_input_start = footer_crc_pos + 4;
    let footer_crc = crc32_ieee(&out[crc_input_start..out.len() - 2]);
    out[footer_crc_pos..footer_crc_pos + 4].copy_from_slice(&footer_crc.to_le_bytes());

    Ok(out)
}

/// One parsed block: its header, raw (still-compressed) payload and the
/// trailing integrity check bytes, not yet verified against the decoded
/// plaintext (that needs the terminal codec to have run first).
pub struct ParsedBlock {
    pub header: BlockHeader,
    pub payload: Vec<u8>,
    pub check: Vec<u8>,
}

/// Decodes an XZ stream's framing: header, every block (without running
/// LZMA2 — left to the caller so each block can be handed to an
/// independent worker, the format's documented parallel-decode split),
/// and the index/footer, cross-checked against what was actually parsed.
pub fn decode_blocks(data: &[u8]) -> Result<(CheckType, Vec<ParsedBlock>)> {
    if data.len() < 12 || data[0..6] != STREAM_MAGIC {
        return Err(Error::corrupt("xz: bad stream header magic"));
    }
    let flags = [data[6], data[7]];
    let flags_crc = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    if crc32_ieee(&flags) != flags_crc {
        return Err(Error::corrupt("xz: stream header flags CRC mismatch"));
    }
    if flags[0] != 0 {
        return Err(Error::unsupported("xz: unsupported stream header flags"));
    }
    let check =
        CheckType::from_id(flags[1]).ok_or_else(|| Error::unsupported("xz: unknown check type"))?;

    let mut pos = 12usize;
    let mut blocks = Vec::new();
    let index_start = loop {
        if pos >= data.len() {
            return Err(Error::corrupt("xz: stream ends before index"));
        }
        if data[pos] == 0x00 {
            break pos;
        }
        let (header, header_len) = decode_block_header(&data[pos..])?;
        log::debug!(
            "xz block header at {pos}: {} filter(s), compressed_size={:?}, uncompressed_size={:?}",
            header.filters.len(),
            header.compressed_size,
            header.uncompressed_size
        );
        let compressed_size = header
            .compressed_size
            .ok_or_else(|| Error::corrupt("xz: block missing compressed size"))?
            as usize;
        let payload_start = pos + header_len;
        let payload_end = payload_start + compressed_size;
        let payload = data
            .get(payload_start..payload_end)
            .ok_or_else(|| Error::corrupt("xz: block payload truncated"))?
            .to_vec();
        let check_start = payload_end + pad4(compressed_size);
        let check_end = check_start + check.size();
        let check_bytes = data
            .get(check_start..check_end)
            .ok_or_else(|| Error::corrupt("xz: block check truncated"))?
            .to_vec();
        pos = check_end;
        blocks.push(ParsedBlock {
            header,
            payload,
            check: check_bytes,
        });
    };

    verify_index_and_footer(data, index_start, &blocks)?;
    Ok((check, blocks))
}

/// Parses the index starting at `index_start`, validates its own CRC32,
/// cross-checks every record against the blocks actually parsed, then
/// validates the footer's backward-size pointer and CRC32.
fn verify_index_and_footer(data: &[u8], index_start: usize, blocks: &[ParsedBlock]) -> Result<()> {
    let mut pos = index_start + 1;
    let num_records = read_vli(data, &mut pos)?;
    if num_records != blocks.len() as u64 {
        return Err(Error::corrupt("xz: index record count mismatch"));
    }
    for b in blocks {
        let unpadded_size = read_vli(data, &mut pos)?;
        let uncompressed_size = read_vli(data, &mut pos)?;
        let expected_unpadded = (b.payload.len() + b.check.len()) as u64
            + block_header_len(&b.header)? as u64;
        if unpadded_size != expected_unpadded
            || Some(uncompressed_size) != b.header.uncompressed_size
        {
            return Err(Error::corrupt("xz: index record mismatch"));
        }
    }
    let body_end = pos;
    let padded_end = index_start + (body_end - index_start) + pad4(body_end - index_start);
    let crc_bytes = data
        .get(padded_end..padded_end + 4)
        .ok_or_else(|| Error::corrupt("xz: index CRC truncated"))?;
    let crc_stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if crc32_ieee(&data[index_start..padded_end]) != crc_stored {
        return Err(Error::corrupt("xz: index CRC mismatch"));
    }

    let footer_start = padded_end + 4;
    let footer = data
        .get(footer_start..footer_start + 12)
        .ok_or_else(|| Error::corrupt("xz: footer truncated"))?;
    if footer[10..12] != FOOTER_MAGIC {
        return Err(Error::corrupt("xz: bad footer magic"));
    }
    let footer_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    if crc32_ieee(&footer[4..10]) != footer_crc {
        return Err(Error::corrupt("xz: footer CRC mismatch"));
    }
    let backward_size = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]);
    let index_total_len = (padded_end + 4) - index_start;
    if (backward_size as usize + 1) * 4 != index_total_len {
        return Err(Error::corrupt("xz: index/footer size mismatch"));
    }
    Ok(())
}

fn block_header_len(header: &BlockHeader) -> Result<usize> {
    Ok(encode_block_header(header)?.len())
}

/// Verifies a block's trailing integrity check against the decoded bytes.
/// Kept separate from [`decode_blocks`] since that function never runs the
/// terminal codec, and the check is computed over uncompressed data.
pub fn verify_block_check(check: CheckType, decoded: &[u8], stored: &[u8]) -> Result<()> {
    let mut digest = check.digest();
    digest.update(decoded);
    if digest.finalize() != stored {
        return Err(Error::corrupt("xz: block integrity check mismatch"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vli_roundtrip() {
        for &v in &[0u64, 1, 127, 128, 300, 1 << 20, 1 << 40, u64::MAX >> 1] {
            let mut buf = Vec::new();
            write_vli(&mut buf, v);
            let mut pos = 0;
            assert_eq!(read_vli(&buf, &mut pos).unwrap(), v);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn block_header_roundtrip() {
        let header = BlockHeader {
            filters: vec![FilterFlags {
                id: filter_id::LZMA2,
                props: vec![0x18],
            }],
            compressed_size: Some(42),
            uncompressed_size: Some(100),
        };
        let bytes = encode_block_header(&header).unwrap();
        let (decoded, len) = decode_block_header(&bytes).unwrap();
        assert_eq!(len, bytes.len());
        assert_eq!(decoded.compressed_size, Some(42));
        assert_eq!(decoded.uncompressed_size, Some(100));
        assert_eq!(decoded.filters[0].id, filter_id::LZMA2);
    }

    #[test]
    fn stream_roundtrip_crc32() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let filters = [FilterFlags {
            id: filter_id::LZMA2,
            props: vec![0x18],
        }];
        let stream = encode_stream(&data, CheckType::Crc32, &filters, |d| {
            lzma_core::compress(d, 3)
        })
        .unwrap();

        let (check, blocks) = decode_blocks(&stream).unwrap();
        assert_eq!(check, CheckType::Crc32);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        let decoded = lzma_core::decompress(&block.payload, 1 << 24).unwrap();
        assert_eq!(&decoded, &data);
        assert_eq!(block.header.uncompressed_size, Some(data.len() as u64));
        verify_block_check(check, &decoded, &block.check).unwrap();
    }

    #[test]
    fn multi_block_stream_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let filters = [FilterFlags {
            id: filter_id::LZMA2,
            props: vec![0x18],
        }];
        let block_size = data.len() / 4;
        let stream = encode_stream_blocks(&data, CheckType::Crc32, &filters, block_size, |d| {
            lzma_core::compress(d, 3)
        })
        .unwrap();

        let (check, blocks) = decode_blocks(&stream).unwrap();
        assert_eq!(check, CheckType::Crc32);
        assert!(blocks.len() > 1, "expected more than one block");
        let mut decoded = Vec::new();
        for block in &blocks {
            let chunk = lzma_core::decompress(&block.payload, 1 << 24).unwrap();
            verify_block_check(check, &chunk, &block.check).unwrap();
            decoded.extend_from_slice(&chunk);
        }
        assert_eq!(decoded, data);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode_blocks(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn rejects_non_lzma2_terminal_filter() {
        let header = BlockHeader {
            filters: vec![FilterFlags {
                id: filter_id::DELTA,
                props: vec![1],
            }],
            compressed_size: Some(1),
            uncompressed_size: Some(1),
        };
        assert!(encode_block_header(&header).is_err());
    }
}
