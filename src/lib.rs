//! Adaptive layer model for a selective forwarding unit (SFU), in Sans I/O style.
//!
//! An SFU relays (not decodes) RTP streams and must continuously decide, per
//! receiver, which simulcast encoding and SVC layer of each media source to
//! forward. This crate is the data model behind that decision: it holds the
//! graph of forwardable quality layers per source, tracks each layer's live
//! receive bitrate, aggregates dependency-inclusive bitrates, and reconciles
//! the graph against structure actually observed on the wire.
//!
//! Like the rest of a Sans I/O design, nothing in here talks to the network,
//! spawns threads or blocks. Everything happens from calls of the public API:
//!
//! * The signaling path applies the currently negotiated sources through
//!   [`MediaSources::set_sources`].
//! * The packet receive path feeds sizes into layers
//!   ([`RtpLayerDesc::update_bitrate`]) and runs every VP9 packet's parsed
//!   descriptor through [`Vp9Parser::observe`], which patches the layer
//!   graph when keyframes declare a new scalability structure.
//! * The forwarding-decision path asks a source what bitrate is available at
//!   a quality index ([`MediaSourceDesc::bitrate_at`]), which transparently
//!   falls back to the best currently active lower layer.
//!
//! Layers are ranked by a packed subjective quality index ([`LayerIndex`]):
//! encoding id above spatial id above temporal id, with `-1` as the
//! "suspended" sentinel.
//!
//! The [`packet`] module holds the two bitstream utilities this model needs:
//! the VP9 payload descriptor decoder and the Opus packet duration decoder.
//! The [`bwe`] module defines the interface to the congestion-control
//! collaborator; the estimation algorithms themselves are out of scope.

#[macro_use]
extern crate tracing;

mod rtp;
pub use rtp::{Bitrate, DataSize, Ssrc};

mod util;
pub use util::BitrateTracker;

pub mod packet;

mod source;
pub use source::{LayerIndex, LayerSnapshot, MediaSourceDesc, MediaSources};
pub use source::{RtpEncodingDesc, RtpLayerDesc};

mod parser;
pub use parser::{Config, Vp9Parser};

pub mod bwe;

/// Various error types.
pub mod error {
    pub use crate::packet::PacketError;
    pub use crate::source::LayerError;
}
