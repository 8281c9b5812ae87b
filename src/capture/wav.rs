//! Canonical WAV header construction
//!
//! The egress hands us raw PCM with no container, so we build the 44-byte
//! RIFF/WAVE/fmt/data header ourselves before writing to disk. The header's
//! declared data length must always equal the byte length of the payload it
//! precedes, or parsers will truncate or over-read the file.

use std::io;
use std::path::Path;

use crate::config::AudioFormat;

/// Size of the canonical header: RIFF chunk + fmt sub-chunk + data sub-chunk
/// preamble, no extension fields.
pub const HEADER_LEN: usize = 44;

/// Build a canonical 44-byte WAV header for `data_len` bytes of raw PCM.
///
/// Layout (all multi-byte fields little-endian):
///
/// | offset | bytes | field                              |
/// |--------|-------|------------------------------------|
/// | 0      | 4     | "RIFF"                             |
/// | 4      | 4     | chunk size = data_len + 36         |
/// | 8      | 4     | "WAVE"                             |
/// | 12     | 4     | "fmt "                             |
/// | 16     | 4     | sub-chunk 1 size = 16              |
/// | 20     | 2     | format tag = 1 (PCM)               |
/// | 22     | 2     | channels                           |
/// | 24     | 4     | sample rate                        |
/// | 28     | 4     | byte rate                          |
/// | 32     | 2     | block align                        |
/// | 34     | 2     | bits per sample                    |
/// | 36     | 4     | "data"                             |
/// | 40     | 4     | data_len                           |
pub fn wav_header(data_len: u32, format: &AudioFormat) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    // RIFF chunk size covers everything after this field: 36 header bytes
    // plus the payload.
    header[4..8].copy_from_slice(&(data_len + 36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    header
}

/// Write `data` as a WAV file at `path`: header followed by the raw payload.
pub fn write_wav(path: &Path, data: &[u8], format: &AudioFormat) -> io::Result<()> {
    let header = wav_header(data.len() as u32, format);

    let mut file = Vec::with_capacity(HEADER_LEN + data.len());
    file.extend_from_slice(&header);
    file.extend_from_slice(data);

    std::fs::write(path, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_u32(bytes: &[u8]) -> u32 {
        u32::from_le_bytes(bytes.try_into().unwrap())
    }

    fn le_u16(bytes: &[u8]) -> u16 {
        u16::from_le_bytes(bytes.try_into().unwrap())
    }

    #[test]
    fn test_header_length_fields() {
        let format = AudioFormat::default();

        for len in [0u32, 1, 20, 4800, 1_000_000] {
            let header = wav_header(len, &format);
            assert_eq!(header.len(), HEADER_LEN);
            assert_eq!(le_u32(&header[4..8]), len + 36, "chunk size for {}", len);
            assert_eq!(le_u32(&header[40..44]), len, "data size for {}", len);
        }
    }

    #[test]
    fn test_header_fixed_fields() {
        let header = wav_header(20, &AudioFormat::default());

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");

        assert_eq!(le_u32(&header[16..20]), 16); // fmt sub-chunk size
        assert_eq!(le_u16(&header[20..22]), 1); // PCM format tag
        assert_eq!(le_u16(&header[22..24]), 1); // mono
        assert_eq!(le_u32(&header[24..28]), 96_000);
        assert_eq!(le_u32(&header[28..32]), 192_000); // byte rate
        assert_eq!(le_u16(&header[32..34]), 2); // block align
        assert_eq!(le_u16(&header[34..36]), 16); // bits per sample
    }

    #[test]
    fn test_header_byte_exact_for_known_length() {
        // 20 payload bytes: chunk size 56 = 0x38, data size 20 = 0x14
        let header = wav_header(20, &AudioFormat::default());

        let expected: [u8; HEADER_LEN] = [
            b'R', b'I', b'F', b'F', 0x38, 0x00, 0x00, 0x00, //
            b'W', b'A', b'V', b'E', b'f', b'm', b't', b' ', //
            0x10, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, //
            0x00, 0x77, 0x01, 0x00, // 96000
            0x00, 0xee, 0x02, 0x00, // 192000
            0x02, 0x00, 0x10, 0x00, //
            b'd', b'a', b't', b'a', 0x14, 0x00, 0x00, 0x00,
        ];
        assert_eq!(header, expected);
    }

    #[test]
    fn test_written_file_parses_with_hound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        // Two 16-bit samples: 0x0102 and 0xfffe (-258)
        let payload = [0x02u8, 0x01, 0xfe, 0xff];
        write_wav(&path, &payload, &AudioFormat::default()).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 96_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0x0102, -258]);
    }

    #[test]
    fn test_empty_payload_is_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        write_wav(&path, &[], &AudioFormat::default()).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_LEN as u64);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
