//! The layer graph: layers, encodings, sources and the session-wide source set.

use std::mem;
use std::time::Instant;

use crate::rtp::Ssrc;

mod desc;
mod encoding;
mod layer;

pub use desc::MediaSourceDesc;
pub use encoding::RtpEncodingDesc;
pub use layer::{LayerError, LayerIndex, LayerSnapshot, RtpLayerDesc};

/// The currently signaled media sources of one session.
///
/// Holds the ordered source array between signaling updates. Replacement
/// builds a fresh array and swaps it in wholesale; the outgoing array is never
/// mutated in place, so a reader holding the previous array always sees a
/// fully formed set.
#[derive(Debug, Default)]
pub struct MediaSources {
    sources: Vec<MediaSourceDesc>,
}

impl MediaSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[MediaSourceDesc] {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut [MediaSourceDesc] {
        &mut self.sources
    }

    /// Apply a new signaled source array.
    ///
    /// A new source matching a currently held one (same constituent SSRCs,
    /// order-independent) is replaced by the held instance, preserving the
    /// accumulated statistics inside its layers. Held sources with no match
    /// are dropped. Returns whether the resulting array differs from the
    /// previous one in membership or order; repeating the same input reports
    /// no change.
    pub fn set_sources(&mut self, new_sources: Vec<MediaSourceDesc>) -> bool {
        let old = mem::take(&mut self.sources);

        let mut changed = new_sources.len() != old.len();
        let mut old_slots: Vec<Option<MediaSourceDesc>> = old.into_iter().map(Some).collect();
        let mut result = Vec::with_capacity(new_sources.len());

        for (i, new_source) in new_sources.into_iter().enumerate() {
            let matched = old_slots.iter().position(|slot| {
                slot.as_ref()
                    .is_some_and(|held| sources_match(held, &new_source))
            });

            match matched.and_then(|j| old_slots[j].take().map(|held| (j, held))) {
                Some((j, held)) => {
                    if j != i {
                        changed = true;
                    }
                    result.push(held);
                }
                None => {
                    changed = true;
                    result.push(new_source);
                }
            }
        }

        self.sources = result;
        changed
    }

    /// Find the source owning the given SSRC.
    pub fn find_source(&self, ssrc: Ssrc) -> Option<&MediaSourceDesc> {
        self.sources.iter().find(|s| s.matches(ssrc))
    }

    pub fn find_source_mut(&mut self, ssrc: Ssrc) -> Option<&mut MediaSourceDesc> {
        self.sources.iter_mut().find(|s| s.matches(ssrc))
    }

    /// Find the layer a packet belongs to, across all sources.
    pub fn find_layer_mut(
        &mut self,
        ssrc: Ssrc,
        layer_id: LayerIndex,
    ) -> Option<&mut RtpLayerDesc> {
        self.sources
            .iter_mut()
            .find_map(|s| s.find_layer_mut(ssrc, layer_id))
    }

    /// Diagnostics records for all layers of all sources.
    pub fn snapshots(&self, now: Instant) -> Vec<LayerSnapshot> {
        self.sources.iter().flat_map(|s| s.snapshots(now)).collect()
    }
}

/// Same constituent SSRC membership, independent of encoding order.
fn sources_match(a: &MediaSourceDesc, b: &MediaSourceDesc) -> bool {
    let mut a_ssrcs: Vec<Ssrc> = a.ssrcs().collect();
    let mut b_ssrcs: Vec<Ssrc> = b.ssrcs().collect();
    a_ssrcs.sort();
    b_ssrcs.sort();
    a_ssrcs == b_ssrcs
}
