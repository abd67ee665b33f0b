//! YAML profiler configuration.
//!
//! Two parameter profiles exist: `default` sweeps every variable, `stress`
//! only the radius to probe the scalability of the optimised convolution.
//! Within each profile the `fixed` set pins the controlled parameters; when a
//! run sweeps a variable, the corresponding fixed entry is ignored.

use serde::Deserialize;

use regsplat_util::linspace;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub seed: u64,
    /// CPU bitset applied to the worker pool.
    pub thread_affinity_mask: u64,
    #[serde(rename = "parameter set")]
    pub parameter_set: ParameterSet,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSet {
    pub default: DefaultProfile,
    pub stress: StressProfile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultProfile {
    pub fixed: DefaultFixed,
    pub variable: DefaultVariable,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultFixed {
    pub extent: [u32; 2],
    pub radius: u32,
    #[serde(rename = "region count")]
    pub region_count: u8,
    #[serde(rename = "centroid count")]
    pub centroid_count: u16,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultVariable {
    pub radius: Sweep<u32>,
    #[serde(rename = "region count")]
    pub region_count: Sweep<u8>,
    #[serde(rename = "centroid count")]
    pub centroid_count: Sweep<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StressProfile {
    pub fixed: StressFixed,
    pub variable: StressVariable,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StressFixed {
    pub extent: [u32; 2],
    #[serde(rename = "region count")]
    pub region_count: u8,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StressVariable {
    pub radius: Sweep<u32>,
}

/// A linear range of sweep values: `step` evenly spaced points over
/// `[from, to]` inclusive.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sweep<T> {
    pub from: T,
    pub to: T,
    pub step: u8,
}

macro_rules! impl_sweep_values {
    ($($t:ty),*) => {
        $(impl Sweep<$t> {
            pub fn values(&self) -> Vec<$t> {
                linspace(self.from as f64, self.to as f64, self.step as usize)
                    .map(|value| value.round() as $t)
                    .collect()
            }
        })*
    };
}
impl_sweep_values!(u8, u16, u32);

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = "\
seed: 2077477551066988490
thread_affinity_mask: 240
parameter set:
  default:
    fixed:
      extent: [96, 96]
      radius: 4
      region count: 8
      centroid count: 20
    variable:
      radius:
        from: 1
        to: 16
        step: 6
      region count:
        from: 2
        to: 32
        step: 4
      centroid count:
        from: 10
        to: 250
        step: 5
  stress:
    fixed:
      extent: [128, 128]
      region count: 4
    variable:
      radius:
        from: 8
        to: 64
        step: 8
";

    #[test]
    fn example_round_trips() {
        let config: Config = serde_yaml::from_str(EXAMPLE).unwrap();
        assert_eq!(config.seed, 2077477551066988490);
        assert_eq!(config.thread_affinity_mask, 0xF0);
        let default = &config.parameter_set.default;
        assert_eq!(default.fixed.extent, [96, 96]);
        assert_eq!(default.fixed.region_count, 8);
        assert_eq!(default.variable.radius.step, 6);
        assert_eq!(config.parameter_set.stress.fixed.extent, [128, 128]);
    }

    #[test]
    fn sweep_values_are_evenly_spaced() {
        let sweep = Sweep::<u32> {
            from: 1,
            to: 16,
            step: 6,
        };
        assert_eq!(sweep.values(), [1, 4, 7, 10, 13, 16]);

        let sweep = Sweep::<u8> {
            from: 2,
            to: 32,
            step: 4,
        };
        assert_eq!(sweep.values(), [2, 12, 22, 32]);

        let single = Sweep::<u16> {
            from: 9,
            to: 90,
            step: 1,
        };
        assert_eq!(single.values(), [9]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let broken = EXAMPLE.replace("thread_affinity_mask", "thread_mask");
        assert!(serde_yaml::from_str::<Config>(&broken).is_err());
    }
}
