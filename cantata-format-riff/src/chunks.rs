// Cantata
// Copyright (c) 2025 The Project Cantata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chunk-level machinery shared by the WAV and AIFF dispatchers, and the specialized `fmt ` and
//! `COMM` decoders.

use cantata_core::errors::{invalid_field_error, truncated_error, Result};
use cantata_core::io::{BufReader, BufWriter, FiniteStream, ReadBytes};

use extended::Extended;

/// The byte order of a container's chunk size fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// RIFF containers (`WAVE`).
    LittleEndian,
    /// IFF containers (`AIFF`, `AIFC`).
    BigEndian,
}

/// An undecoded chunk: a four character identifier and its payload.
#[derive(Clone, Debug, PartialEq)]
pub struct RawChunk {
    /// The chunk identifier.
    pub id: [u8; 4],
    /// The chunk payload, without the pad byte.
    pub data: Vec<u8>,
}

impl RawChunk {
    /// Returns true if this chunk has the given identifier.
    pub fn is(&self, id: &[u8; 4]) -> bool {
        &self.id == id
    }
}

/// Read every chunk in a form body. Chunks are aligned to 2-byte boundaries; a chunk whose
/// declared size escapes the form is an error.
pub fn read_chunks(buf: &[u8], byte_order: ByteOrder) -> Result<Vec<RawChunk>> {
    let mut reader = BufReader::new(buf);
    let mut chunks = Vec::new();

    while reader.bytes_available() >= 8 {
        let id = reader.read_quad_bytes()?;

        let len = match byte_order {
            ByteOrder::LittleEndian => reader.read_u32()?,
            ByteOrder::BigEndian => reader.read_be_u32()?,
        };

        // The formulation of this conditional is critical because len is untrusted input and
        // may overflow if added to anything.
        if reader.bytes_available() < u64::from(len) {
            return truncated_error("riff: chunk length exceeds parent chunk length");
        }

        let data = reader.read_buf_bytes_ref(len as usize)?.to_vec();

        // Skip the pad byte after an odd-length chunk.
        if len & 1 == 1 && reader.bytes_available() > 0 {
            reader.ignore_bytes(1)?;
        }

        chunks.push(RawChunk { id, data });
    }

    Ok(chunks)
}

/// Emit one chunk with its pad byte.
pub fn write_chunk(out: &mut BufWriter, id: &[u8; 4], data: &[u8], byte_order: ByteOrder) {
    out.write_buf(id);

    match byte_order {
        ByteOrder::LittleEndian => out.write_u32(data.len() as u32),
        ByteOrder::BigEndian => out.write_be_u32(data.len() as u32),
    }

    out.write_buf(data);
    out.align(2);
}

/// The `WAVEFORMATEXTENSIBLE` extension of a `fmt ` chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveFormatExtensible {
    /// The number of valid bits in each sample container.
    pub valid_bits_per_sample: u16,
    /// The speaker position bitmask.
    pub channel_mask: u32,
    /// The sub-format GUID identifying the true sample format.
    pub sub_format: [u8; 16],
}

/// The format tag value indicating a `WAVEFORMATEXTENSIBLE` structure.
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// A decoded `fmt ` chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveFormat {
    /// The format tag.
    pub format_tag: u16,
    /// The number of channels.
    pub channels: u16,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The average number of bytes per second.
    pub avg_bytes_per_sec: u32,
    /// The block (frame) alignment in bytes.
    pub block_align: u16,
    /// The number of bits per sample.
    pub bits_per_sample: u16,
    /// The extension carried when the format tag is `WAVE_FORMAT_EXTENSIBLE`.
    pub extensible: Option<WaveFormatExtensible>,
}

impl WaveFormat {
    /// Decode a `fmt ` chunk payload.
    pub fn read(buf: &[u8]) -> Result<WaveFormat> {
        let mut reader = BufReader::new(buf);

        let format_tag = reader.read_u16()?;
        let channels = reader.read_u16()?;
        let sample_rate = reader.read_u32()?;
        let avg_bytes_per_sec = reader.read_u32()?;
        let block_align = reader.read_u16()?;
        let bits_per_sample = reader.read_u16()?;

        // The base structure may be followed by a cbSize field and, for the extensible format
        // tag, the WAVEFORMATEXTENSIBLE fields: valid bits, channel mask, and sub-format GUID.
        let mut extensible = None;

        if format_tag == WAVE_FORMAT_EXTENSIBLE {
            if reader.bytes_available() < 2 {
                return truncated_error("riff: extensible fmt chunk missing cbSize");
            }

            let cb_size = reader.read_u16()?;

            if cb_size < 22 || reader.bytes_available() < 22 {
                return invalid_field_error("riff: extensible fmt chunk extension too small");
            }

            let valid_bits_per_sample = reader.read_u16()?;
            let channel_mask = reader.read_u32()?;

            let mut sub_format = [0u8; 16];
            reader.read_buf_exact(&mut sub_format)?;

            extensible =
                Some(WaveFormatExtensible { valid_bits_per_sample, channel_mask, sub_format });
        }

        Ok(WaveFormat {
            format_tag,
            channels,
            sample_rate,
            avg_bytes_per_sec,
            block_align,
            bits_per_sample,
            extensible,
        })
    }
}

/// A decoded AIFF `COMM` chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct CommonChunk {
    /// The number of channels.
    pub channels: u16,
    /// The number of sample frames.
    pub sample_frames: u32,
    /// The sample size in bits.
    pub bits_per_sample: u16,
    /// The sample rate in Hz.
    pub sample_rate: f64,
    /// AIFC only: the compression type identifier and its Pascal-string name.
    pub compression: Option<([u8; 4], String)>,
}

impl CommonChunk {
    /// Decode a `COMM` chunk payload. AIFC appends a compression type and name to the AIFF
    /// layout.
    pub fn read(buf: &[u8], is_aifc: bool) -> Result<CommonChunk> {
        let mut reader = BufReader::new(buf);

        let channels = reader.read_be_u16()?;
        let sample_frames = reader.read_be_u32()?;
        let bits_per_sample = reader.read_be_u16()?;

        // The sample rate is an 80-bit IEEE-754 extended float.
        let mut rate_bytes = [0u8; 10];
        reader.read_buf_exact(&mut rate_bytes)?;

        let sample_rate = decode_extended_rate(rate_bytes);

        let compression = if is_aifc && reader.bytes_available() >= 5 {
            let ty = reader.read_quad_bytes()?;

            // The name is a Pascal string: a length byte, the characters, and a pad byte when
            // the total is odd.
            let name_len = u64::from(reader.read_u8()?).min(reader.bytes_available());
            let name_buf = reader.read_boxed_slice_exact(name_len as usize)?;
            let name = String::from_utf8_lossy(&name_buf).into_owned();

            Some((ty, name))
        }
        else {
            None
        };

        Ok(CommonChunk { channels, sample_frames, bits_per_sample, sample_rate, compression })
    }
}

/// Decode an 80-bit extended-precision sample rate, with fast paths for the ubiquitous CD and
/// DAT rates.
fn decode_extended_rate(bytes: [u8; 10]) -> f64 {
    const RATE_44100: [u8; 10] = [0x40, 0x0e, 0xac, 0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    const RATE_48000: [u8; 10] = [0x40, 0x0e, 0xbb, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    match bytes {
        RATE_44100 => 44100.0,
        RATE_48000 => 48000.0,
        _ => Extended::from_be_bytes(bytes).to_f64(),
    }
}

/// Encode a sample rate as an 80-bit extended-precision float.
///
/// Sample rates are normal positive values, so the conversion widens the 64-bit fraction and
/// re-biases the exponent (1023 to 16383) with the integer bit made explicit.
pub fn encode_extended_rate(rate: f64) -> [u8; 10] {
    if rate <= 0.0 || !rate.is_finite() {
        return [0; 10];
    }

    let bits = rate.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1023;
    let fraction = bits & 0x000f_ffff_ffff_ffff;

    let biased = (exponent + 16383) as u16;
    let mantissa = (1u64 << 63) | (fraction << 11);

    let mut out = [0u8; 10];
    out[0..2].copy_from_slice(&biased.to_be_bytes());
    out[2..10].copy_from_slice(&mantissa.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_chunk_round_trip() {
        let mut out = BufWriter::new();
        write_chunk(&mut out, b"odd ", &[1, 2, 3], ByteOrder::LittleEndian);
        write_chunk(&mut out, b"even", &[4, 5, 6, 7], ByteOrder::LittleEndian);

        let chunks = read_chunks(out.as_slice(), ByteOrder::LittleEndian).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0].id, b"odd ");
        assert_eq!(chunks[0].data, [1, 2, 3]);
        assert_eq!(&chunks[1].id, b"even");
        assert_eq!(chunks[1].data, [4, 5, 6, 7]);
    }

    #[test]
    fn verify_oversized_chunk_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&0xffff_fff0u32.to_le_bytes());
        buf.extend_from_slice(&[0; 8]);

        assert!(read_chunks(&buf, ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn verify_wave_format_pcm() {
        let mut out = BufWriter::new();
        out.write_u16(1);
        out.write_u16(2);
        out.write_u32(44100);
        out.write_u32(44100 * 4);
        out.write_u16(4);
        out.write_u16(16);

        let fmt = WaveFormat::read(out.as_slice()).unwrap();

        assert_eq!(fmt.format_tag, 1);
        assert_eq!(fmt.channels, 2);
        assert_eq!(fmt.sample_rate, 44100);
        assert_eq!(fmt.bits_per_sample, 16);
        assert!(fmt.extensible.is_none());
    }

    #[test]
    fn verify_wave_format_extensible() {
        let mut out = BufWriter::new();
        out.write_u16(WAVE_FORMAT_EXTENSIBLE);
        out.write_u16(6);
        out.write_u32(48000);
        out.write_u32(48000 * 18);
        out.write_u16(18);
        out.write_u16(24);
        out.write_u16(22);
        out.write_u16(20);
        out.write_u32(0x3f);
        out.write_buf(&[0xaa; 16]);

        let fmt = WaveFormat::read(out.as_slice()).unwrap();
        let ext = fmt.extensible.unwrap();

        assert_eq!(ext.valid_bits_per_sample, 20);
        assert_eq!(ext.channel_mask, 0x3f);
        assert_eq!(ext.sub_format, [0xaa; 16]);
    }

    #[test]
    fn verify_common_chunk_rates() {
        let mut out = BufWriter::new();
        out.write_be_u16(2);
        out.write_be_u32(88200);
        out.write_be_u16(16);
        out.write_buf(&[0x40, 0x0e, 0xac, 0x44, 0, 0, 0, 0, 0, 0]);

        let comm = CommonChunk::read(out.as_slice(), false).unwrap();

        assert_eq!(comm.channels, 2);
        assert_eq!(comm.sample_frames, 88200);
        assert_eq!(comm.sample_rate, 44100.0);
        assert!(comm.compression.is_none());

        // The generic decode path agrees with the fast path.
        assert_eq!(decode_extended_rate(encode_extended_rate(44100.0)), 44100.0);
        assert_eq!(decode_extended_rate(encode_extended_rate(22050.0)), 22050.0);
    }

    #[test]
    fn verify_aifc_compression() {
        let mut out = BufWriter::new();
        out.write_be_u16(2);
        out.write_be_u32(1000);
        out.write_be_u16(16);
        out.write_buf(&encode_extended_rate(48000.0));
        out.write_buf(b"NONE");
        out.write_u8(14);
        out.write_buf(b"not compressed");

        let comm = CommonChunk::read(out.as_slice(), true).unwrap();
        let (ty, name) = comm.compression.unwrap();

        assert_eq!(&ty, b"NONE");
        assert_eq!(name, "not compressed");
    }
}
