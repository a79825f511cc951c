//! # mediatag-codecs
//!
//! Codec-level parsers for the mediatag metadata library. These read frame
//! and configuration headers just far enough to derive technical parameters
//! (bitrate, sample rate, duration, codec id); no sample data is decoded.

pub mod adts;
pub mod av1;
pub mod avc;
pub mod mpegaudio;

pub use adts::AdtsHeader;
pub use av1::{Av1ConfigRecord, IvfHeader};
pub use avc::AvcConfigRecord;
pub use mpegaudio::{MpegAudioFrame, MpegChannelMode, VbriHeader, XingHeader};
