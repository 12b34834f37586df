use std::collections::HashMap;
use std::time::Instant;

use crate::rtp::{Bitrate, Ssrc};

use super::{LayerIndex, RtpLayerDesc};

/// One physical RTP stream (primary SSRC) and its SVC structure.
///
/// The layers form a DAG through their dependency positions; there are no
/// cross-encoding edges.
#[derive(Debug, Clone)]
pub struct RtpEncodingDesc {
    primary_ssrc: Ssrc,
    layers: Vec<RtpLayerDesc>,
}

impl RtpEncodingDesc {
    pub fn new(primary_ssrc: Ssrc, layers: Vec<RtpLayerDesc>) -> Self {
        RtpEncodingDesc {
            primary_ssrc,
            layers,
        }
    }

    pub fn primary_ssrc(&self) -> Ssrc {
        self.primary_ssrc
    }

    pub fn layers(&self) -> &[RtpLayerDesc] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [RtpLayerDesc] {
        &mut self.layers
    }

    /// Swap in a new layer array, keeping this encoding's identity.
    ///
    /// Incoming layers take over the accumulated statistics and flag state of
    /// any outgoing layer with the same id, so a structure rebuild does not
    /// reset rate history.
    pub fn set_layers(&mut self, mut new_layers: Vec<RtpLayerDesc>) {
        for new_layer in &mut new_layers {
            let old = self.layers.iter().find(|l| l.layer_id() == new_layer.layer_id());
            if let Some(old) = old {
                new_layer.inherit_from(old);
            }
        }

        self.layers = new_layers;
    }

    pub fn find_layer(&self, layer_id: LayerIndex) -> Option<&RtpLayerDesc> {
        self.layers.iter().find(|l| l.layer_id() == layer_id)
    }

    pub fn find_layer_mut(&mut self, layer_id: LayerIndex) -> Option<&mut RtpLayerDesc> {
        self.layers.iter_mut().find(|l| l.layer_id() == layer_id)
    }

    /// The cumulative bitrate of a layer and everything it depends on.
    ///
    /// Hard dependencies always count; soft dependencies count iff the layer
    /// has them enabled. Each reachable layer contributes exactly once, also
    /// when it is reachable over several paths.
    pub fn cumulative_bitrate(&self, layer: &RtpLayerDesc, now: Instant) -> Bitrate {
        let mut rates = HashMap::new();

        self.accumulate(layer, now, &mut rates);

        rates.into_values().sum()
    }

    fn accumulate(
        &self,
        layer: &RtpLayerDesc,
        now: Instant,
        rates: &mut HashMap<LayerIndex, Bitrate>,
    ) {
        if rates.contains_key(&layer.index()) {
            return;
        }
        rates.insert(layer.index(), layer.bitrate(now));

        for &dep in layer.depends_on() {
            if let Some(l) = self.layers.get(dep) {
                self.accumulate(l, now, rates);
            }
        }

        if layer.use_soft_dependencies() {
            for &dep in layer.soft_depends_on() {
                if let Some(l) = self.layers.get(dep) {
                    self.accumulate(l, now, rates);
                }
            }
        }
    }
}
