// Canonical 44-byte RIFF/WAVE header for PCM segments
//
// Every field is little-endian. The header describes a single "data" chunk
// of `payload_bytes` immediately following it.

/// Length of the canonical PCM header
pub const WAV_HEADER_LEN: usize = 44;

/// Size of the "fmt " chunk body for plain PCM
const FMT_CHUNK_LEN: u32 = 16;

/// WAVE format tag for uncompressed PCM
const FORMAT_PCM: u16 = 1;

/// Build the header for a PCM payload of `payload_bytes`
pub fn wav_header(
    payload_bytes: u32,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> [u8; WAV_HEADER_LEN] {
    let chunk_size = payload_bytes.wrapping_add(36);
    let byte_rate = bits_per_sample as u32 * sample_rate * channels as u32 / 8;
    let block_align = channels * bits_per_sample / 8;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&payload_bytes.to_le_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(header: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(header[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(header: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(header[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_for_one_second_of_16khz_mono() {
        let header = wav_header(32_000, 16_000, 1, 16);

        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32_at(&header, 4), 32_036, "chunkSize");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(u32_at(&header, 16), 16);
        assert_eq!(u16_at(&header, 20), 1, "audioFormat");
        assert_eq!(u16_at(&header, 22), 1, "channels");
        assert_eq!(u32_at(&header, 24), 16_000, "sampleRate");
        assert_eq!(u32_at(&header, 28), 32_000, "byteRate");
        assert_eq!(u16_at(&header, 32), 2, "blockAlign");
        assert_eq!(u16_at(&header, 34), 16, "bitsPerSample");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32_at(&header, 40), 32_000, "payload");
    }

    #[test]
    fn test_header_stereo_48khz() {
        let header = wav_header(0, 48_000, 2, 16);

        assert_eq!(u32_at(&header, 4), 36);
        assert_eq!(u32_at(&header, 28), 192_000);
        assert_eq!(u16_at(&header, 32), 4);
        assert_eq!(u32_at(&header, 40), 0);
    }

    #[test]
    fn test_header_is_pure() {
        assert_eq!(wav_header(1234, 8000, 1, 16), wav_header(1234, 8000, 1, 16));
    }
}
