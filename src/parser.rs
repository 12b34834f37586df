use std::collections::HashSet;
use std::time::Duration;

use crate::packet::Vp9Descriptor;
use crate::rtp::Ssrc;
use crate::source::MediaSources;
use crate::util::{BitrateTracker, StateChange};

/// Tunables for the layer model.
#[derive(Debug, Clone)]
pub struct Config {
    bitrate_window: Duration,
    base_frame_rate: f64,
    clear_unseen_encodings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bitrate_window: Duration::from_secs(5),
            base_frame_rate: 30.0,
            clear_unseen_encodings: true,
        }
    }
}

impl Config {
    /// Averaging window for per-layer receive bitrates.
    pub fn set_bitrate_window(mut self, window: Duration) -> Self {
        self.bitrate_window = window;
        self
    }

    /// Frame rate assumed for the top temporal layer of structures declared
    /// on the wire, which carry no rate information themselves.
    pub fn set_base_frame_rate(mut self, fps: f64) -> Self {
        self.base_frame_rate = fps;
        self
    }

    /// Whether observing a scalability structure discards the layer arrays of
    /// sibling encodings not yet seen on the wire. Signaling-inferred
    /// structure is only trusted once a keyframe proves the real shape.
    pub fn set_clear_unseen_encodings(mut self, v: bool) -> Self {
        self.clear_unseen_encodings = v;
        self
    }
}

/// Reconciles the layer graph with what is actually observed on the wire.
///
/// Some VP9 fields cannot be determined from a single packet; notably the
/// scalability structure is only carried in keyframes. This observer rebuilds
/// the per-encoding layer arrays from structures as they appear, toggles
/// K-SVC soft dependencies per decoded frame, and diagnoses payload variants
/// a forwarder won't be able to route.
#[derive(Debug)]
pub struct Vp9Parser {
    config: Config,
    /// Spatial layer count last declared on the wire.
    num_spatial_layers: Option<u8>,
    /// SSRCs we've actually seen. Used to clear out signaling-inferred
    /// encoding information.
    ssrcs_seen: HashSet<Ssrc>,
    picture_id_state: StateChange,
    extended_picture_id_state: StateChange,
}

impl Default for Vp9Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Vp9Parser {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Vp9Parser {
            config,
            num_spatial_layers: None,
            ssrcs_seen: HashSet::new(),
            picture_id_state: StateChange::new("Missing picture id"),
            extended_picture_id_state: StateChange::new("Missing extended picture id"),
        }
    }

    /// Forget which SSRCs have been seen and what layering was declared.
    ///
    /// Call on renegotiation boundaries, where signaled structure starts over.
    pub fn reset_session(&mut self) {
        self.ssrcs_seen.clear();
        self.num_spatial_layers = None;
    }

    /// Observe one parsed VP9 packet.
    ///
    /// Returns whether the declared layering changed, a signal for downstream
    /// selection to re-evaluate. Lookups that fail (unknown SSRC, no matching
    /// layer) are silently ignored; the packet still counts for statistics
    /// elsewhere in the pipeline.
    pub fn observe(
        &mut self,
        ssrc: Ssrc,
        desc: &Vp9Descriptor,
        sources: &mut MediaSources,
    ) -> bool {
        self.ssrcs_seen.insert(ssrc);

        let mut layering_changed = false;

        if desc.has_scalability_structure() {
            if let Some(declared) = desc.num_spatial_layers() {
                if self.num_spatial_layers.is_some_and(|n| n != declared) {
                    debug!("Spatial layer count changed from {:?} to {declared}", self.num_spatial_layers);
                    layering_changed = true;
                }
                self.num_spatial_layers = Some(declared);
            }

            if let Some(source) = sources.find_source_mut(ssrc) {
                let enc_pos = source
                    .encodings()
                    .iter()
                    .position(|e| e.primary_ssrc() == ssrc);

                if let Some(pos) = enc_pos {
                    // Carry the encoding id forward from the existing top
                    // layer; an encoding cleared pending a keyframe falls
                    // back to its ordinal.
                    let eid = source.encodings()[pos]
                        .layers()
                        .first()
                        .map(|l| l.eid())
                        .unwrap_or(pos as u8);

                    let new_layers =
                        desc.scalability_layers(eid, self.config.base_frame_rate);
                    if let Some(mut new_layers) = new_layers {
                        for layer in &mut new_layers {
                            layer.inherit_statistics(BitrateTracker::with_window(
                                self.config.bitrate_window,
                            ));
                        }
                        trace!("New scalability structure on {ssrc}: {} layers", new_layers.len());
                        source.set_encoding_layers(new_layers, ssrc);
                    }

                    if self.config.clear_unseen_encodings {
                        let unseen: Vec<Ssrc> = source
                            .ssrcs()
                            .filter(|s| !self.ssrcs_seen.contains(s))
                            .collect();
                        for other in unseen {
                            source.set_encoding_layers(Vec::new(), other);
                        }
                    }
                }
            }
        }

        if desc.sid > 0 && desc.is_inter_picture_predicted() {
            // In K-SVC mode this entirely ignores the bitrate of lower-layer
            // keyframes when calculating layers' bitrates. Those values are
            // small enough this is probably fine, but revisit if it turns out
            // to be a problem.
            if let Some(layer) = sources.find_layer_mut(ssrc, desc.layer_id()) {
                layer.set_use_soft_dependencies(desc.uses_inter_layer_dependency());
            }
        }

        self.picture_id_state.set(!desc.has_picture_id(), || {
            format!("ssrc {ssrc}, descriptor: {desc:?}")
        });
        self.extended_picture_id_state
            .set(!desc.has_extended_picture_id(), || {
                format!("ssrc {ssrc}, descriptor: {desc:?}")
            });

        layering_changed
    }
}
