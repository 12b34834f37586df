use std::fmt;
use std::time::Instant;

use crate::rtp::{Bitrate, Ssrc};

use super::{LayerIndex, LayerSnapshot, RtpEncodingDesc, RtpLayerDesc};

/// One logical media source (e.g. a participant's camera), made up of one or
/// more encodings (simulcast).
#[derive(Debug, Clone)]
pub struct MediaSourceDesc {
    owner: String,
    encodings: Vec<RtpEncodingDesc>,
}

impl MediaSourceDesc {
    pub fn new(encodings: Vec<RtpEncodingDesc>, owner: impl Into<String>) -> Self {
        MediaSourceDesc {
            owner: owner.into(),
            encodings,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn encodings(&self) -> &[RtpEncodingDesc] {
        &self.encodings
    }

    pub fn encodings_mut(&mut self) -> &mut [RtpEncodingDesc] {
        &mut self.encodings
    }

    /// All layers of all encodings, in encoding order.
    pub fn layers(&self) -> impl Iterator<Item = &RtpLayerDesc> {
        self.encodings.iter().flat_map(|e| e.layers().iter())
    }

    pub fn has_layers(&self) -> bool {
        self.layers().next().is_some()
    }

    pub fn num_layers(&self) -> usize {
        self.layers().count()
    }

    /// Whether the given SSRC belongs to this source.
    pub fn matches(&self, ssrc: Ssrc) -> bool {
        self.encodings.iter().any(|e| e.primary_ssrc() == ssrc)
    }

    pub fn ssrcs(&self) -> impl Iterator<Item = Ssrc> + '_ {
        self.encodings.iter().map(|e| e.primary_ssrc())
    }

    pub fn find_encoding(&self, ssrc: Ssrc) -> Option<&RtpEncodingDesc> {
        self.encodings.iter().find(|e| e.primary_ssrc() == ssrc)
    }

    pub fn find_encoding_mut(&mut self, ssrc: Ssrc) -> Option<&mut RtpEncodingDesc> {
        self.encodings.iter_mut().find(|e| e.primary_ssrc() == ssrc)
    }

    pub fn find_layer(&self, ssrc: Ssrc, layer_id: LayerIndex) -> Option<&RtpLayerDesc> {
        self.find_encoding(ssrc)?.find_layer(layer_id)
    }

    pub fn find_layer_mut(
        &mut self,
        ssrc: Ssrc,
        layer_id: LayerIndex,
    ) -> Option<&mut RtpLayerDesc> {
        self.find_encoding_mut(ssrc)?.find_layer_mut(layer_id)
    }

    /// Replace the layer array of the encoding with the given SSRC.
    ///
    /// The encoding record itself (and its primary SSRC) stays. No-op when no
    /// encoding matches.
    pub fn set_encoding_layers(&mut self, layers: Vec<RtpLayerDesc>, ssrc: Ssrc) {
        if let Some(enc) = self.find_encoding_mut(ssrc) {
            enc.set_layers(layers);
        }
    }

    /// The available bitrate at the given quality index.
    ///
    /// When the exact layer is inactive (cumulative bitrate zero), this falls
    /// back to the closest active layer strictly below `target`, scanning all
    /// encodings in descending index order. The caller gets the best currently
    /// live substitute instead of a hard zero.
    pub fn bitrate_at(&self, now: Instant, target: LayerIndex) -> Bitrate {
        if let Some(rate) = self.cumulative_at(now, target) {
            if rate.as_f64() > 0.0 {
                return rate;
            }
        }

        let mut below: Vec<(&RtpEncodingDesc, &RtpLayerDesc)> = self
            .encodings
            .iter()
            .flat_map(|e| e.layers().iter().map(move |l| (e, l)))
            .filter(|(_, l)| l.index() < target)
            .collect();
        below.sort_by(|a, b| b.1.index().cmp(&a.1.index()));

        for (enc, layer) in below {
            let rate = enc.cumulative_bitrate(layer, now);
            if rate.as_f64() > 0.0 {
                return rate;
            }
        }

        Bitrate::ZERO
    }

    /// Per-layer diagnostics records for observability export.
    pub fn snapshots(&self, now: Instant) -> Vec<LayerSnapshot> {
        self.encodings
            .iter()
            .flat_map(|enc| {
                enc.layers().iter().map(move |l| LayerSnapshot {
                    index: l.index(),
                    tid: l.tid(),
                    sid: l.sid(),
                    height: l.height(),
                    frame_rate: l.frame_rate(),
                    bitrate_bps: enc.cumulative_bitrate(l, now).as_u64(),
                })
            })
            .collect()
    }

    fn cumulative_at(&self, now: Instant, target: LayerIndex) -> Option<Bitrate> {
        for enc in &self.encodings {
            if let Some(layer) = enc.layers().iter().find(|l| l.index() == target) {
                return Some(enc.cumulative_bitrate(layer, now));
            }
        }
        None
    }
}

impl fmt::Display for MediaSourceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaSourceDesc owner={}, ssrcs=[", self.owner)?;
        for (i, ssrc) in self.ssrcs().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ssrc}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::rtp::DataSize;
    use crate::util::BitrateTracker;

    use super::*;

    /// Simulcast source with `temporal_len` temporal layers per encoding,
    /// temporal layer k depending on layer k-1 of the same encoding.
    fn create_source(
        ssrcs: &[u32],
        temporal_len: usize,
        owner: &str,
    ) -> MediaSourceDesc {
        let mut height = 720;
        let encodings = ssrcs
            .iter()
            .enumerate()
            .map(|(eid, &ssrc)| {
                let mut frame_rate = 30.0 / (1 << (temporal_len - 1)) as f64;
                let layers = (0..temporal_len)
                    .map(|t| {
                        let tid = (temporal_len > 1).then_some(t as u8);
                        let deps = if t > 0 { vec![t - 1] } else { vec![] };
                        let l = RtpLayerDesc::new(
                            eid as u8,
                            None,
                            tid,
                            Some(height),
                            Some(frame_rate),
                        )
                        .unwrap()
                        .with_dependencies(deps, vec![]);
                        frame_rate *= 2.0;
                        l
                    })
                    .collect();
                height *= 2;
                RtpEncodingDesc::new(ssrc.into(), layers)
            })
            .collect();

        MediaSourceDesc::new(encodings, owner)
    }

    fn set_rate(source: &mut MediaSourceDesc, eid: usize, t: usize, rate: u64, now: Instant) {
        let mut tracker = BitrateTracker::with_window(Duration::from_secs(1));
        tracker.update(DataSize::bits(rate), now);
        source.encodings_mut()[eid].layers_mut()[t].inherit_statistics(tracker);
    }

    fn idx(eid: u8, sid: u8, tid: u8) -> LayerIndex {
        LayerIndex::from_parts(eid, Some(sid), Some(tid))
    }

    #[test]
    fn structure() {
        let ssrcs = [0xdeadbeef_u32, 0xcafebabe, 0x01234567];
        let source = create_source(&ssrcs, 3, "Fake owner");

        assert_eq!(source.owner(), "Fake owner");
        assert_eq!(source.encodings().len(), 3);
        assert_eq!(source.num_layers(), 9);
        assert!(source.has_layers());
        assert!(source.matches(0xdeadbeef.into()));
        assert!(!source.matches(0x55555555.into()));

        for (i, enc) in source.encodings().iter().enumerate() {
            assert_eq!(enc.primary_ssrc(), ssrcs[i].into());
            assert_eq!(enc.layers().len(), 3);
            for (j, l) in enc.layers().iter().enumerate() {
                assert_eq!(l.eid(), i as u8);
                assert_eq!(l.tid(), Some(j as u8));
                assert_eq!(l.sid(), None);
            }
        }
    }

    #[test]
    fn bitrate_accumulation_and_fallback() {
        let now = Instant::now();
        let ssrcs = [0xdeadbeef_u32, 0xcafebabe, 0x01234567];
        let mut source = create_source(&ssrcs, 3, "Fake owner");

        // Non-zero rates for (0,0), (0,1), (1,0), (1,1) and (2,2); a bitmask
        // so it's unambiguous which layers get summed.
        set_rate(&mut source, 0, 0, 0x1, now);
        set_rate(&mut source, 0, 1, 0x2, now);
        set_rate(&mut source, 1, 0, 0x8, now);
        set_rate(&mut source, 1, 1, 0x10, now);
        set_rate(&mut source, 2, 2, 0x100, now);

        // Rates accumulate across dependencies.
        assert_eq!(source.bitrate_at(now, idx(0, 0, 0)).as_u64(), 0x1);
        assert_eq!(source.bitrate_at(now, idx(0, 0, 1)).as_u64(), 0x3);
        assert_eq!(source.bitrate_at(now, idx(0, 0, 2)).as_u64(), 0x3);

        assert_eq!(source.bitrate_at(now, idx(1, 0, 0)).as_u64(), 0x8);
        assert_eq!(source.bitrate_at(now, idx(1, 0, 1)).as_u64(), 0x18);
        assert_eq!(source.bitrate_at(now, idx(1, 0, 2)).as_u64(), 0x18);

        // A layer with rate zero falls back to the next lower non-zero rate.
        assert_eq!(source.bitrate_at(now, idx(2, 0, 0)).as_u64(), 0x18);
        assert_eq!(source.bitrate_at(now, idx(2, 0, 1)).as_u64(), 0x18);

        assert_eq!(source.bitrate_at(now, idx(2, 0, 2)).as_u64(), 0x100);
    }

    #[test]
    fn unknown_index_is_zero() {
        let now = Instant::now();
        let source = create_source(&[1000], 1, "owner");

        let rate = source.bitrate_at(now, LayerIndex::from_parts(3, Some(5), Some(5)));
        assert_eq!(rate.as_u64(), 0);
    }

    #[test]
    fn set_encoding_layers_keeps_identity() {
        let now = Instant::now();
        let mut source = create_source(&[1000, 2000], 3, "owner");
        set_rate(&mut source, 1, 0, 64, now);

        source.set_encoding_layers(
            vec![RtpLayerDesc::new(1, None, None, None, None).unwrap()],
            2000.into(),
        );

        let enc = source.find_encoding(2000.into()).unwrap();
        assert_eq!(enc.primary_ssrc(), 2000.into());
        assert_eq!(enc.layers().len(), 1);
        // layer_id (0,-,-) matches the old t0 layer, statistics carry over.
        assert_eq!(enc.layers()[0].bitrate(now).as_u64(), 64);

        // Unknown SSRC is a no-op.
        source.set_encoding_layers(vec![], 9999.into());
        assert_eq!(source.num_layers(), 4);
    }

    #[test]
    fn snapshots_serialize() {
        let now = Instant::now();
        let mut source = create_source(&[1000], 2, "owner");
        set_rate(&mut source, 0, 0, 500, now);

        let snapshots = source.snapshots(now);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].bitrate_bps, 500);

        let json = serde_json::to_string(&snapshots).unwrap();
        assert!(json.contains("\"bitrate_bps\":500"));
    }
}
