/// Uncompressed PCM (RIFF/WAVE) container parsing.
///
/// Walks the RIFF chunk list for `fmt ` and `data`, skipping anything
/// else (LIST, fact, ...). Only integer PCM with 8-bit unsigned or 16-bit
/// signed samples, mono or stereo, is accepted.
use crate::error::SoundError;

/// Sample layout from the `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }
}

/// Parsed header: the format plus where the sample data sits in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub format: PcmFormat,
    pub data_offset: usize,
    pub data_len: usize,
}

const WAVE_FORMAT_PCM: u16 = 1;

fn read_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Parse the RIFF header of an in-memory file.
pub fn parse_header(file: &[u8]) -> Result<WavInfo, SoundError> {
    if file.len() < 12 || &file[0..4] != b"RIFF" || &file[8..12] != b"WAVE" {
        return Err(SoundError::MalformedHeader("not a RIFF/WAVE file"));
    }

    let mut format = None;
    let mut pos = 12;
    while pos + 8 <= file.len() {
        let id = &file[pos..pos + 4];
        let size = read_u32(file, pos + 4) as usize;
        let body = pos + 8;

        match id {
            b"fmt " => {
                if size < 16 || body + 16 > file.len() {
                    return Err(SoundError::MalformedHeader("truncated fmt chunk"));
                }
                let audio_format = read_u16(file, body);
                let parsed = PcmFormat {
                    channels: read_u16(file, body + 2),
                    sample_rate: read_u32(file, body + 4),
                    bits_per_sample: read_u16(file, body + 14),
                };
                if audio_format != WAVE_FORMAT_PCM
                    || !matches!(parsed.channels, 1 | 2)
                    || !matches!(parsed.bits_per_sample, 8 | 16)
                {
                    return Err(SoundError::UnsupportedFormat {
                        bits: parsed.bits_per_sample,
                        channels: parsed.channels,
                    });
                }
                if parsed.sample_rate == 0 {
                    return Err(SoundError::MalformedHeader("zero sample rate"));
                }
                format = Some(parsed);
            }
            b"data" => {
                let format = format.ok_or(SoundError::MalformedHeader("data before fmt chunk"))?;
                // Tolerate a data size that overruns a truncated file
                let data_len = size.min(file.len() - body);
                let frame = format.bytes_per_sample() * format.channels as usize;
                return Ok(WavInfo {
                    format,
                    data_offset: body,
                    data_len: data_len - data_len % frame,
                });
            }
            _ => {}
        }

        // Chunks are word aligned
        pos = body.saturating_add(size).saturating_add(size & 1);
    }

    Err(SoundError::MalformedHeader("missing data chunk"))
}

/// Decode raw sample bytes into signed 16-bit samples. Returns the number
/// of samples written; stops at whichever of `raw` or `out` runs out first.
pub fn decode_samples(format: &PcmFormat, raw: &[u8], out: &mut [i16]) -> usize {
    match format.bits_per_sample {
        8 => {
            let n = raw.len().min(out.len());
            for (dst, &src) in out.iter_mut().zip(&raw[..n]) {
                *dst = ((src as i16) - 128) << 8;
            }
            n
        }
        _ => {
            let n = (raw.len() / 2).min(out.len());
            for (dst, pair) in out.iter_mut().zip(raw.chunks_exact(2)).take(n) {
                *dst = i16::from_le_bytes([pair[0], pair[1]]);
            }
            n
        }
    }
}
