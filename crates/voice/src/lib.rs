pub mod codec;
pub mod framer;
pub mod local;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod remote;
pub mod sample;

pub use codec::{Codec, CodecError, Decoder, Encoder, RawPcmDecoder, RawPcmEncoder, VoiceError, VoiceInfo};
pub use framer::Framer;
pub use local::{FrameSink, LocalVoice, LocalVoiceCounters};
pub use processor::{
    LevelMeter, LevelReadout, LinearResampler, Pipeline, Processor, VadConfig, VadControl,
    VoiceActivityCalibration, VoiceActivityDetector,
};
pub use queue::{PushQueue, DEFAULT_QUEUE_CAPACITY};
pub use registry::{RemoteVoiceRegistry, VoiceIdPool};
pub use remote::{DecodedSink, RemoteVoice, RemoteVoiceKey};
pub use sample::Sample;
