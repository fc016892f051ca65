//! SA-Core: Foundation types for the ECG signal-averaging link
//!
//! Sample normalization, fixed-capacity sample histories, the inter-node
//! frame codec and the sample source seam shared by both nodes.

pub mod error;
pub mod sample;
pub mod history;
pub mod frame;
pub mod source;

pub use error::{SaError, SaResult};
pub use sample::*;
pub use history::History;
pub use frame::{
    encode_frame, decode_payload, DecodeOutcome, DecoderStats, FrameDecoder, LatestSample,
    FRAME_LEN, PAYLOAD_LEN, TERMINATOR,
};
pub use source::{IterSource, SampleSource};
