//! Seeded CAN bus endpoint with fault injection.
//!
//! Each node owns one `SimBus`. Frames the controller accepts are queued as
//! outbound traffic for the world to route; injected faults decide whether a
//! frame is rejected at the controller or silently lost on the wire.

use std::collections::VecDeque;

use leia_core::CanBus;
use leia_proto::Frame;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Fault probabilities, each in `[0, 1]`.
///
/// Out-of-range values are clamped; NaN counts as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaultConfig {
    /// Probability an accepted frame never reaches the peer.
    pub drop_rate: f64,
    /// Probability the controller rejects a transmit request.
    pub transmit_failure_rate: f64,
}

impl FaultConfig {
    /// Perfect bus.
    pub const NONE: Self = Self { drop_rate: 0.0, transmit_failure_rate: 0.0 };

    /// Bus that loses frames on the wire.
    pub fn lossy(drop_rate: f64) -> Self {
        Self { drop_rate, ..Self::NONE }
    }

    /// Bus whose controller rejects some transmissions.
    pub fn flaky(transmit_failure_rate: f64) -> Self {
        Self { transmit_failure_rate, ..Self::NONE }
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Controller rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimBusError {
    /// Injected transmit failure.
    #[error("controller rejected frame {id:#x}")]
    Rejected {
        /// Raw identifier of the rejected frame.
        id: u32,
    },
}

/// Simulated bus endpoint.
#[derive(Debug, Clone)]
pub struct SimBus {
    rng: ChaCha8Rng,
    faults: FaultConfig,
    outbound: VecDeque<Frame>,
    transmitted: u64,
    dropped: u64,
    rejected: u64,
}

impl SimBus {
    /// Fault-free endpoint.
    pub fn new() -> Self {
        Self::with_seed(0, FaultConfig::NONE)
    }

    /// Endpoint whose fault decisions are reproducible from `seed`.
    pub fn with_seed(seed: u64, faults: FaultConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            faults,
            outbound: VecDeque::new(),
            transmitted: 0,
            dropped: 0,
            rejected: 0,
        }
    }

    /// Change fault probabilities from now on.
    pub fn set_faults(&mut self, faults: FaultConfig) {
        self.faults = faults;
    }

    /// Next frame on the wire, oldest first.
    pub fn pop_outbound(&mut self) -> Option<Frame> {
        self.outbound.pop_front()
    }

    /// Discard everything still on the wire.
    pub fn clear_outbound(&mut self) -> usize {
        let n = self.outbound.len();
        self.outbound.clear();
        n
    }

    /// Frames accepted by the controller.
    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    /// Accepted frames lost on the wire.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Transmit requests the controller refused.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CanBus for SimBus {
    type Error = SimBusError;

    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        if self.rng.gen_bool(probability(self.faults.transmit_failure_rate)) {
            self.rejected += 1;
            return Err(SimBusError::Rejected { id: frame.raw_id() });
        }

        self.transmitted += 1;
        if self.rng.gen_bool(probability(self.faults.drop_rate)) {
            self.dropped += 1;
        } else {
            self.outbound.push_back(frame.clone());
        }
        Ok(())
    }
}
