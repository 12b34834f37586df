//! Interface to the congestion-control collaborator.
//!
//! The estimators themselves (the delay-based and loss-based parts of a
//! Google CC style controller) live outside this crate. The layer model only
//! needs a fixed operation set: feed it transport observations, read the
//! current estimate, and adjust its bounds.

use std::time::{Duration, Instant};

use crate::rtp::{Bitrate, DataSize};

/// Default bounds for a bandwidth estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BweConfig {
    pub initial_bitrate: Bitrate,
    pub min_bitrate: Bitrate,
    pub max_bitrate: Bitrate,
}

impl Default for BweConfig {
    fn default() -> Self {
        BweConfig {
            initial_bitrate: Bitrate::kbps(2500),
            min_bitrate: Bitrate::kbps(30),
            max_bitrate: Bitrate::mbps(20),
        }
    }
}

/// Operations the packet pipeline invokes on a congestion controller.
///
/// Implementations typically combine several sub-estimators. Setting a bound
/// must propagate to every internal sub-estimator before the setter returns,
/// so no read of the estimate observes a half-applied bound.
pub trait BandwidthEstimator {
    /// Report that a packet arrived at the far end.
    ///
    /// `send_time`/`recv_time` are `None` when the corresponding report field
    /// was absent.
    fn report_arrival(
        &mut self,
        now: Instant,
        send_time: Option<Instant>,
        recv_time: Option<Instant>,
        seq: u16,
        size: DataSize,
    );

    /// Report that a packet was lost.
    fn report_loss(&mut self, now: Instant, send_time: Option<Instant>, seq: u16);

    /// Report a fresh round-trip time measurement.
    fn report_rtt(&mut self, now: Instant, rtt: Duration);

    /// The current bandwidth estimate.
    fn current_estimate(&self, now: Instant) -> Bitrate;

    /// Return to the initial state, including default bounds.
    fn reset(&mut self);

    fn min_bitrate(&self) -> Bitrate;

    fn set_min_bitrate(&mut self, value: Bitrate);

    fn max_bitrate(&self) -> Bitrate;

    fn set_max_bitrate(&mut self, value: Bitrate);

    fn initial_bitrate(&self) -> Bitrate;

    fn set_initial_bitrate(&mut self, value: Bitrate);
}

#[cfg(test)]
mod test {
    use super::*;

    /// Estimator stub clamping a fixed rate to its bounds.
    struct FixedEstimator {
        config: BweConfig,
        rate: Bitrate,
    }

    impl BandwidthEstimator for FixedEstimator {
        fn report_arrival(
            &mut self,
            _now: Instant,
            _send_time: Option<Instant>,
            _recv_time: Option<Instant>,
            _seq: u16,
            _size: DataSize,
        ) {
        }

        fn report_loss(&mut self, _now: Instant, _send_time: Option<Instant>, _seq: u16) {}

        fn report_rtt(&mut self, _now: Instant, _rtt: Duration) {}

        fn current_estimate(&self, _now: Instant) -> Bitrate {
            self.rate
                .clamp(self.config.min_bitrate, self.config.max_bitrate)
        }

        fn reset(&mut self) {
            self.config = BweConfig::default();
            self.rate = self.config.initial_bitrate;
        }

        fn min_bitrate(&self) -> Bitrate {
            self.config.min_bitrate
        }

        fn set_min_bitrate(&mut self, value: Bitrate) {
            self.config.min_bitrate = value;
        }

        fn max_bitrate(&self) -> Bitrate {
            self.config.max_bitrate
        }

        fn set_max_bitrate(&mut self, value: Bitrate) {
            self.config.max_bitrate = value;
        }

        fn initial_bitrate(&self) -> Bitrate {
            self.config.initial_bitrate
        }

        fn set_initial_bitrate(&mut self, value: Bitrate) {
            self.config.initial_bitrate = value;
        }
    }

    #[test]
    fn default_bounds() {
        let config = BweConfig::default();

        assert_eq!(config.initial_bitrate, Bitrate::kbps(2500));
        assert_eq!(config.min_bitrate, Bitrate::kbps(30));
        assert_eq!(config.max_bitrate, Bitrate::mbps(20));
    }

    #[test]
    fn usable_as_trait_object() {
        let now = Instant::now();

        let mut estimator = FixedEstimator {
            config: BweConfig::default(),
            rate: Bitrate::gbps(1),
        };

        let dyn_est: &mut dyn BandwidthEstimator = &mut estimator;
        dyn_est.set_max_bitrate(Bitrate::mbps(5));

        assert_eq!(dyn_est.current_estimate(now), Bitrate::mbps(5));
    }
}
