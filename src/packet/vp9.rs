use super::{ByteReader, PacketError};
use crate::source::{LayerIndex, RtpLayerDesc};

const MAX_SPATIAL_LAYERS: usize = 8;
const MAX_VP9REF_PICS: usize = 3;

/// Parsed VP9 RTP payload descriptor.
///
/// This is the per-packet header preceding the VP9 payload, carrying picture
/// ids, layer indices and (in keyframes) the scalability structure (SS) that
/// declares the stream's spatial/temporal shape.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Vp9Descriptor {
    /// picture ID is present
    pub i: bool,
    /// inter-picture predicted frame.
    pub p: bool,
    /// layer indices present
    pub l: bool,
    /// flexible mode
    pub f: bool,
    /// start of frame. beginning of new vp9 frame
    pub b: bool,
    /// end of frame
    pub e: bool,
    /// scalability structure (SS) present
    pub v: bool,
    /// Not a reference frame for upper spatial layers
    pub z: bool,

    /// 15 bit (extended) picture id in use
    pub m: bool,
    /// 7 or 16 bits, picture ID.
    pub picture_id: u16,

    /// Temporal layer ID
    pub tid: u8,
    /// Switching up point
    pub u: bool,
    /// Spatial layer ID
    pub sid: u8,
    /// Inter-layer dependency used
    pub d: bool,

    /// Reference index (F=1)
    pub pdiff: Vec<u8>,
    /// Temporal layer zero index (F=0)
    pub tl0picidx: u8,

    /// N_S + 1 indicates the number of spatial layers present in the VP9 stream
    pub ns: u8,
    /// Each spatial layer's frame resolution present
    pub y: bool,
    /// PG description present flag.
    pub g: bool,
    /// N_G indicates the number of pictures in a Picture Group (PG)
    pub ng: u8,
    pub width: [Option<u16>; MAX_SPATIAL_LAYERS],
    pub height: [Option<u16>; MAX_SPATIAL_LAYERS],
    /// Temporal layer ID of pictures in a Picture Group
    pub pgtid: Vec<u8>,
    /// Switching up point of pictures in a Picture Group
    pub pgu: Vec<bool>,
    /// Reference indices of pictures in a Picture Group
    pub pgpdiff: Vec<Vec<u8>>,

    /// Offset of the VP9 payload after the descriptor.
    pub header_len: usize,
}

impl Vp9Descriptor {
    /// Parse the descriptor from the start of an RTP payload.
    ///
    /// ```text
    ///  Flexible mode (F=1)                Non-flexible mode (F=0)
    ///        0 1 2 3 4 5 6 7                    0 1 2 3 4 5 6 7
    ///       +-+-+-+-+-+-+-+-+                  +-+-+-+-+-+-+-+-+
    ///       |I|P|L|F|B|E|V|Z| (REQUIRED)       |I|P|L|F|B|E|V|Z| (REQUIRED)
    ///       +-+-+-+-+-+-+-+-+                  +-+-+-+-+-+-+-+-+
    ///  I:   |M| PICTURE ID  | (REQUIRED)  I:   |M| PICTURE ID  | (RECOMMENDED)
    ///       +-+-+-+-+-+-+-+-+                  +-+-+-+-+-+-+-+-+
    ///  M:   | EXTENDED PID  | (RECOMMENDED)    | EXTENDED PID  | (RECOMMENDED)
    ///       +-+-+-+-+-+-+-+-+                  +-+-+-+-+-+-+-+-+
    ///  L:   | tid |U| SID |D| (COND REC.)      | tid |U| SID |D| (COND REC.)
    ///       +-+-+-+-+-+-+-+-+        -\        +-+-+-+-+-+-+-+-+
    ///  P,F: | P_DIFF      |N| up to 3 times    |   tl0picidx   | (COND REQ.)
    ///       +-+-+-+-+-+-+-+-+        -/        +-+-+-+-+-+-+-+-+
    ///  V:   | SS            |             V:   | SS            |
    ///       | ..            |                  | ..            |
    ///       +-+-+-+-+-+-+-+-+                  +-+-+-+-+-+-+-+-+
    /// ```
    pub fn parse(packet: &[u8]) -> Result<Self, PacketError> {
        if packet.is_empty() {
            return Err(PacketError::ErrShortPacket);
        }

        let mut desc = Vp9Descriptor::default();
        let mut reader = ByteReader::new(packet);

        let b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

        desc.i = (b & 0x80) != 0;
        desc.p = (b & 0x40) != 0;
        desc.l = (b & 0x20) != 0;
        desc.f = (b & 0x10) != 0;
        desc.b = (b & 0x08) != 0;
        desc.e = (b & 0x04) != 0;
        desc.v = (b & 0x02) != 0;
        desc.z = (b & 0x01) != 0;

        if desc.i {
            desc.parse_picture_id(&mut reader)?;
        }

        if desc.l {
            desc.parse_layer_info(&mut reader)?;
        }

        if desc.f && desc.p {
            desc.parse_ref_indices(&mut reader)?;
        }

        if desc.v {
            desc.parse_ssdata(&mut reader)?;
        }

        desc.header_len = reader.pos();

        Ok(desc)
    }

    /// Whether this packet carries a scalability structure.
    pub fn has_scalability_structure(&self) -> bool {
        self.v
    }

    /// The number of spatial layers the scalability structure declares.
    pub fn num_spatial_layers(&self) -> Option<u8> {
        self.v.then_some(self.ns + 1)
    }

    pub fn has_picture_id(&self) -> bool {
        self.i
    }

    pub fn has_extended_picture_id(&self) -> bool {
        self.i && self.m
    }

    pub fn is_inter_picture_predicted(&self) -> bool {
        self.p
    }

    /// Whether this frame codes against the lower spatial layer (D bit).
    pub fn uses_inter_layer_dependency(&self) -> bool {
        self.d
    }

    /// Id of the layer this packet belongs to, within its encoding.
    pub fn layer_id(&self) -> LayerIndex {
        if self.l {
            LayerIndex::from_parts(0, Some(self.sid), Some(self.tid))
        } else {
            LayerIndex::from_parts(0, None, None)
        }
    }

    pub fn is_keyframe(&self) -> bool {
        !self.p && (self.sid == 0 || !self.l) && self.b
    }

    /// Build the layer grid the scalability structure declares.
    ///
    /// Temporal layers depend hard on the next lower temporal tier within the
    /// same spatial layer. Spatial layers depend softly on the next lower
    /// spatial layer (K-SVC: the dependency only holds at keyframes). Layer
    /// array positions follow `sid * num_temporal + tid`.
    pub fn scalability_layers(
        &self,
        eid: u8,
        base_frame_rate: f64,
    ) -> Option<Vec<RtpLayerDesc>> {
        if !self.v {
            return None;
        }

        let num_spatial = (self.ns + 1) as usize;
        let num_temporal = self
            .pgtid
            .iter()
            .copied()
            .max()
            .map(|t| t as usize + 1)
            .unwrap_or(1);

        let mut layers = Vec::with_capacity(num_spatial * num_temporal);

        for s in 0..num_spatial {
            for t in 0..num_temporal {
                let mut hard = Vec::new();
                let mut soft = Vec::new();
                if t > 0 {
                    hard.push(s * num_temporal + t - 1);
                }
                if s > 0 {
                    soft.push((s - 1) * num_temporal + t);
                }

                let sid = (num_spatial > 1).then_some(s as u8);
                let tid = (num_temporal > 1).then_some(t as u8);
                let frame_rate = base_frame_rate / (1 << (num_temporal - 1 - t)) as f64;

                let layer = RtpLayerDesc::new(eid, sid, tid, self.height[s], Some(frame_rate))
                    .ok()?
                    .with_dependencies(hard, soft);

                layers.push(layer);
            }
        }

        Some(layers)
    }

    // Picture ID:
    //
    //      +-+-+-+-+-+-+-+-+
    // I:   |M| PICTURE ID  |   M:0 => picture id is 7 bits.
    //      +-+-+-+-+-+-+-+-+   M:1 => picture id is 15 bits.
    // M:   | EXTENDED PID  |
    //      +-+-+-+-+-+-+-+-+
    //
    fn parse_picture_id(&mut self, reader: &mut ByteReader) -> Result<(), PacketError> {
        let b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

        self.m = (b & 0x80) != 0;
        if self.m {
            // M == 1, PID is 15bit
            let x = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;
            self.picture_id = (((b & 0x7f) as u16) << 8) | (x as u16);
        } else {
            self.picture_id = (b & 0x7f) as u16;
        }

        Ok(())
    }

    // Layer indices:
    //
    //      +-+-+-+-+-+-+-+-+
    // L:   |  T  |U|  S  |D|
    //      +-+-+-+-+-+-+-+-+
    //      |   tl0picidx   |   (non-flexible mode only)
    //      +-+-+-+-+-+-+-+-+
    //
    fn parse_layer_info(&mut self, reader: &mut ByteReader) -> Result<(), PacketError> {
        let b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

        self.tid = b >> 5;
        self.u = b & 0x10 != 0;
        self.sid = (b >> 1) & 0x7;
        self.d = b & 0x01 != 0;

        if !self.f {
            self.tl0picidx = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;
        }

        Ok(())
    }

    // Reference indices:
    //
    //      +-+-+-+-+-+-+-+-+                P=1,F=1: At least one reference index
    // P,F: | P_DIFF      |N|  up to 3 times          has to be specified.
    //      +-+-+-+-+-+-+-+-+                    N=1: An additional P_DIFF follows
    //                                                current P_DIFF.
    //
    fn parse_ref_indices(&mut self, reader: &mut ByteReader) -> Result<(), PacketError> {
        let mut b = 1u8;
        while (b & 0x1) != 0 {
            b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

            self.pdiff.push(b >> 1);
            if self.pdiff.len() > MAX_VP9REF_PICS {
                return Err(PacketError::ErrTooManyPDiff);
            }
        }

        Ok(())
    }

    // Scalability structure (SS):
    //
    //      +-+-+-+-+-+-+-+-+
    // V:   | N_S |Y|G|-|-|-|
    //      +-+-+-+-+-+-+-+-+              -|
    // Y:   |     WIDTH     | (OPTIONAL)    .
    //      +               +               .
    //      |               | (OPTIONAL)    .
    //      +-+-+-+-+-+-+-+-+               . N_S + 1 times
    //      |     HEIGHT    | (OPTIONAL)    .
    //      +               +               .
    //      |               | (OPTIONAL)    .
    //      +-+-+-+-+-+-+-+-+              -|
    // G:   |      N_G      | (OPTIONAL)
    //      +-+-+-+-+-+-+-+-+                           -|
    // N_G: |  T  |U| R |-|-| (OPTIONAL)                 .
    //      +-+-+-+-+-+-+-+-+              -|            . N_G times
    //      |    P_DIFF     | (OPTIONAL)    . R times    .
    //      +-+-+-+-+-+-+-+-+              -|           -|
    //
    fn parse_ssdata(&mut self, reader: &mut ByteReader) -> Result<(), PacketError> {
        let b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

        self.ns = b >> 5;
        self.y = b & 0x10 != 0;
        self.g = b & 0x08 != 0;

        let ns = (self.ns + 1) as usize;
        self.ng = 0;

        if self.y {
            if reader.remaining() < 4 * ns {
                return Err(PacketError::ErrShortPacket);
            }

            for i in 0..ns {
                self.width[i] = Some(reader.get_u16().ok_or(PacketError::ErrShortPacket)?);
                self.height[i] = Some(reader.get_u16().ok_or(PacketError::ErrShortPacket)?);
            }
        }

        if self.g {
            self.ng = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;
        }

        for i in 0..self.ng as usize {
            let b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

            self.pgtid.push(b >> 5);
            self.pgu.push(b & 0x10 != 0);

            let r = ((b >> 2) & 0x3) as usize;
            if reader.remaining() < r {
                return Err(PacketError::ErrShortPacket);
            }

            self.pgpdiff.push(vec![]);
            for _ in 0..r {
                let b = reader.get_u8().ok_or(PacketError::ErrShortPacket)?;

                self.pgpdiff[i].push(b);
            }
        }

        Ok(())
    }
}
