use std::f64::consts::TAU;

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Yields standard normal draws (mean 0, std 1).
pub trait NormalSource {
    fn standard_normal(&mut self) -> f64;
}

/// Hands out one independent [`NormalSource`] per trial index.
///
/// Implementations must be pure in `trial`: asking twice for the same index
/// yields the same sequence. That is what makes fan-out order irrelevant.
pub trait TrialSources: Sync {
    type Source: NormalSource;

    fn for_trial(&self, trial: u32) -> Self::Source;
}

/// Box-Muller over any `RngCore`. Each pair of uniforms gives two normals;
/// the second is kept for the next call.
pub struct GaussianSource<R> {
    rng: R,
    spare: Option<f64>,
}

impl<R: RngCore> GaussianSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, spare: None }
    }
}

impl GaussianSource<Pcg64Mcg> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(Pcg64Mcg::seed_from_u64(seed))
    }
}

impl<R: RngCore> NormalSource for GaussianSource<R> {
    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }

        // gen() is in [0, 1); flip it so the log never sees zero.
        let u1 = 1.0 - self.rng.r#gen::<f64>();
        let u2: f64 = self.rng.r#gen();
        let radius = (-2.0 * u1.ln()).sqrt();
        let (sin, cos) = (TAU * u2).sin_cos();

        self.spare = Some(radius * sin);
        radius * cos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededTrials {
    seed: u64,
}

impl SeededTrials {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl TrialSources for SeededTrials {
    type Source = GaussianSource<Pcg64Mcg>;

    fn for_trial(&self, trial: u32) -> Self::Source {
        GaussianSource::seeded(trial_seed(self.seed, trial))
    }
}

/// Replays fixed z-score sequences. Trial `t` gets `paths[t % paths.len()]`,
/// cycling when a trial asks for more draws than its sequence holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedTrials {
    paths: Vec<Vec<f64>>,
}

impl ScriptedTrials {
    pub fn new(paths: Vec<Vec<f64>>) -> Self {
        Self { paths }
    }

    /// Every trial sees the same constant draw.
    pub fn constant(z: f64) -> Self {
        Self::new(vec![vec![z]])
    }
}

impl TrialSources for ScriptedTrials {
    type Source = ScriptedNormals;

    fn for_trial(&self, trial: u32) -> Self::Source {
        let values = if self.paths.is_empty() {
            Vec::new()
        } else {
            self.paths[trial as usize % self.paths.len()].clone()
        };
        ScriptedNormals { values, next: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedNormals {
    values: Vec<f64>,
    next: usize,
}

impl NormalSource for ScriptedNormals {
    fn standard_normal(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let z = self.values[self.next % self.values.len()];
        self.next += 1;
        z
    }
}

// seed_from_u64 scrambles its input, so spacing trials by an odd constant
// is enough to keep their streams apart.
fn trial_seed(base_seed: u64, trial: u32) -> u64 {
    base_seed.wrapping_add((trial as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
