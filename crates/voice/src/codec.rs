use crate::sample::Sample;

/// Codec carried in stream announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Codec {
    /// Little-endian PCM passthrough.
    RawPcm = 1,
}

impl Codec {
    pub fn from_u8(value: u8) -> Result<Self, VoiceError> {
        match value {
            1 => Ok(Self::RawPcm),
            other => Err(VoiceError::UnknownCodec(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Stream description exchanged when a voice is announced. Validated before
/// any worker thread starts, so a bad description can never leave a
/// half-constructed stream behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub codec: Codec,
    pub sampling_rate: u32,
    pub channels: u8,
    /// Samples per encoded frame.
    pub frame_size: usize,
}

impl VoiceInfo {
    pub fn raw_pcm(sampling_rate: u32, channels: u8, frame_size: usize) -> Self {
        Self {
            codec: Codec::RawPcm,
            sampling_rate,
            channels,
            frame_size,
        }
    }

    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.frame_size == 0 {
            return Err(VoiceError::InvalidInfo("frame size must be non-zero"));
        }
        if self.sampling_rate == 0 {
            return Err(VoiceError::InvalidInfo("sampling rate must be non-zero"));
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(VoiceError::InvalidInfo("channels must be 1 or 2"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("invalid voice info: {0}")]
    InvalidInfo(&'static str),
    #[error("unknown codec id {0}")]
    UnknownCodec(u8),
    #[error("no free voice ids")]
    IdsExhausted,
    #[error("worker thread failed to start: {0}")]
    Thread(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Codec failures are fatal to the one stream they occur on, never to the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

pub trait Encoder<T: Sample>: Send + 'static {
    fn encode(&mut self, frame: &[T]) -> Result<Vec<u8>, CodecError>;
}

/// Lost frames arrive as `None`; decoders produce best-effort output for
/// them (silence or concealment) so playback cadence is preserved.
pub trait Decoder<T: Sample>: Send + 'static {
    fn decode(&mut self, payload: Option<&[u8]>) -> Result<Vec<T>, CodecError>;
}

#[derive(Debug, Default)]
pub struct RawPcmEncoder;

impl<T: Sample> Encoder<T> for RawPcmEncoder {
    fn encode(&mut self, frame: &[T]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(frame.len() * T::BYTES);
        for sample in frame {
            sample.write_le(&mut out);
        }
        Ok(out)
    }
}

#[derive(Debug)]
pub struct RawPcmDecoder {
    frame_size: usize,
}

impl RawPcmDecoder {
    pub fn new(frame_size: usize) -> Self {
        Self { frame_size }
    }
}

impl<T: Sample> Decoder<T> for RawPcmDecoder {
    fn decode(&mut self, payload: Option<&[u8]>) -> Result<Vec<T>, CodecError> {
        match payload {
            None => Ok(vec![T::SILENCE; self.frame_size]),
            Some(bytes) => {
                if bytes.len() % T::BYTES != 0 {
                    return Err(CodecError::Decode(format!(
                        "payload length {} is not sample aligned",
                        bytes.len()
                    )));
                }
                Ok(bytes.chunks_exact(T::BYTES).map(T::read_le).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pcm_round_trip() {
        let frame: Vec<i16> = vec![0, 100, -100, 32767, -32768];
        let mut encoder = RawPcmEncoder;
        let mut decoder = RawPcmDecoder::new(frame.len());

        let payload = encoder.encode(&frame).unwrap();
        assert_eq!(payload.len(), frame.len() * 2);

        let decoded: Vec<i16> = decoder.decode(Some(&payload)).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn lost_frame_decodes_to_silence() {
        let mut decoder = RawPcmDecoder::new(4);
        let decoded: Vec<f32> = decoder.decode(None).unwrap();
        assert_eq!(decoded, vec![0.0; 4]);
    }

    #[test]
    fn misaligned_payload_is_an_error() {
        let mut decoder = RawPcmDecoder::new(4);
        let result: Result<Vec<f32>, _> = decoder.decode(Some(&[1, 2, 3]));
        assert!(result.is_err());
    }

    #[test]
    fn voice_info_validation_fails_fast() {
        assert!(VoiceInfo::raw_pcm(48000, 1, 480).validate().is_ok());
        assert!(VoiceInfo::raw_pcm(48000, 1, 0).validate().is_err());
        assert!(VoiceInfo::raw_pcm(0, 1, 480).validate().is_err());
        assert!(VoiceInfo::raw_pcm(48000, 0, 480).validate().is_err());
        assert!(VoiceInfo::raw_pcm(48000, 3, 480).validate().is_err());
    }

    #[test]
    fn unknown_codec_id_is_rejected() {
        assert!(Codec::from_u8(1).is_ok());
        assert!(matches!(
            Codec::from_u8(99),
            Err(VoiceError::UnknownCodec(99))
        ));
    }
}
