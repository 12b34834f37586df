use std::fmt;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::rtp::{Bitrate, DataSize};
use crate::util::BitrateTracker;

/// Errors validating layer construction.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("Invalid temporal ID {0}")]
    InvalidTemporalId(u8),
    #[error("Invalid spatial ID {0}")]
    InvalidSpatialId(u8),
}

/// Packed subjective quality index of one forwardable layer.
///
/// Layout is `(eid << 6) | (sid << 3) | tid` with absent spatial/temporal ids
/// collapsing to 0, so a flat encoding and an explicit S0/T0 layer share an
/// index. The ordering ranks forwardable layers across an entire source:
/// higher encoding ids above higher spatial ids above higher temporal ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LayerIndex(i32);

impl LayerIndex {
    /// The index representing that forwarding is suspended.
    pub const SUSPENDED: LayerIndex = LayerIndex(-1);

    /// The encoding id representing that forwarding is suspended.
    pub const SUSPENDED_EID: i32 = -1;

    pub fn from_parts(eid: u8, sid: Option<u8>, tid: Option<u8>) -> Self {
        let e = eid as i32;
        let s = sid.unwrap_or(0) as i32;
        let t = tid.unwrap_or(0) as i32;

        LayerIndex((e << 6) | (s << 3) | t)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Encoding id of this index.
    ///
    /// The arithmetic shift makes `SUSPENDED.eid()` come out as
    /// [`LayerIndex::SUSPENDED_EID`].
    pub fn eid(&self) -> i32 {
        self.0 >> 6
    }

    pub fn sid(&self) -> u8 {
        ((self.0 & 0x38) >> 3) as u8
    }

    pub fn tid(&self) -> u8 {
        (self.0 & 0x7) as u8
    }
}

impl From<i32> for LayerIndex {
    fn from(v: i32) -> Self {
        LayerIndex(v)
    }
}

impl fmt::Display for LayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::SUSPENDED {
            write!(f, "SUSP")
        } else {
            write!(f, "E{}S{}T{}", self.eid(), self.sid(), self.tid())
        }
    }
}

/// One forwardable quality level (encoding x spatial x temporal).
///
/// Keeps track of its subjective quality index, its live receive bitrate and
/// which other layers it requires, for adaptivity/routing decisions.
#[derive(Debug, Clone)]
pub struct RtpLayerDesc {
    /// The index of the owning encoding in the source encoding array.
    eid: u8,
    /// The spatial layer ID of this instance. `None` when not applicable.
    sid: Option<u8>,
    /// The temporal layer ID of this instance. `None` when not applicable.
    tid: Option<u8>,
    /// The max height of the bitstream that this instance represents. The
    /// actual height may be less due to bad network or system load.
    height: Option<u16>,
    /// The max frame rate (in fps) of the bitstream that this instance
    /// represents. The actual frame rate may be less due to bad network or
    /// system load.
    frame_rate: Option<f64>,
    /// Positions in the owning encoding's layer array this layer always
    /// requires.
    depends_on: Vec<usize>,
    /// Positions this layer possibly requires. (The intended use case is
    /// K-SVC mode.)
    soft_depends_on: Vec<usize>,
    /// Whether the soft dependencies count toward the cumulative bitrate.
    use_soft_dependencies: bool,
    /// Tracker for the receiving bitrate of this RTP layer.
    tracker: BitrateTracker,
}

impl RtpLayerDesc {
    pub fn new(
        eid: u8,
        sid: Option<u8>,
        tid: Option<u8>,
        height: Option<u16>,
        frame_rate: Option<f64>,
    ) -> Result<Self, LayerError> {
        if let Some(t) = tid {
            if t > 7 {
                return Err(LayerError::InvalidTemporalId(t));
            }
        }
        if let Some(s) = sid {
            if s > 7 {
                return Err(LayerError::InvalidSpatialId(s));
            }
        }

        Ok(RtpLayerDesc {
            eid,
            sid,
            tid,
            height,
            frame_rate,
            depends_on: Vec::new(),
            soft_depends_on: Vec::new(),
            use_soft_dependencies: true,
            tracker: BitrateTracker::default(),
        })
    }

    pub fn with_dependencies(mut self, hard: Vec<usize>, soft: Vec<usize>) -> Self {
        self.depends_on = hard;
        self.soft_depends_on = soft;
        self
    }

    /// Clone this layer with a new encoding id, inheriting its statistics.
    pub fn with_eid(&self, eid: u8) -> Self {
        let mut copy = self.clone();
        copy.eid = eid;
        copy
    }

    pub fn eid(&self) -> u8 {
        self.eid
    }

    pub fn sid(&self) -> Option<u8> {
        self.sid
    }

    pub fn tid(&self) -> Option<u8> {
        self.tid
    }

    pub fn height(&self) -> Option<u16> {
        self.height
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// The subjective quality index of this layer within its source.
    pub fn index(&self) -> LayerIndex {
        LayerIndex::from_parts(self.eid, self.sid, self.tid)
    }

    /// The id of this layer within its encoding, ignoring which simulcast
    /// stream it belongs to.
    pub fn layer_id(&self) -> LayerIndex {
        LayerIndex::from_parts(0, self.sid, self.tid)
    }

    pub fn depends_on(&self) -> &[usize] {
        &self.depends_on
    }

    pub fn soft_depends_on(&self) -> &[usize] {
        &self.soft_depends_on
    }

    pub fn use_soft_dependencies(&self) -> bool {
        self.use_soft_dependencies
    }

    pub fn set_use_soft_dependencies(&mut self, v: bool) {
        self.use_soft_dependencies = v;
    }

    /// Account one packet's size toward this layer's receive rate.
    ///
    /// This should run after padding termination, for packets actually
    /// accounted to this layer.
    pub fn update_bitrate(&mut self, size: DataSize, now: Instant) {
        self.tracker.update(size, now);
    }

    /// This layer's own windowed receive rate, excluding dependencies.
    pub fn bitrate(&self, now: Instant) -> Bitrate {
        self.tracker.rate(now)
    }

    /// Replace the bitrate tracker.
    pub fn inherit_statistics(&mut self, tracker: BitrateTracker) {
        self.tracker = tracker;
    }

    /// Take over another layer's accumulated statistics and flag state.
    ///
    /// Used when an encoding's layer array is rebuilt mid-session: the new
    /// node must not reset rate history accumulated by its predecessor.
    pub fn inherit_from(&mut self, other: &RtpLayerDesc) {
        self.tracker = other.tracker.clone();
        self.use_soft_dependencies = other.use_soft_dependencies;
    }
}

impl fmt::Display for RtpLayerDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subjective_quality={},temporal_id={},spatial_id={}",
            self.index().as_i32(),
            self.tid.map(i32::from).unwrap_or(-1),
            self.sid.map(i32::from).unwrap_or(-1),
        )
    }
}

/// Diagnostics record of one layer, for observability export.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSnapshot {
    pub index: LayerIndex,
    pub tid: Option<u8>,
    pub sid: Option<u8>,
    pub height: Option<u16>,
    pub frame_rate: Option<f64>,
    /// Dependency-inclusive receive rate in bits per second.
    pub bitrate_bps: u64,
}
