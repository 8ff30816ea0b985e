use chrono::{DateTime, Utc};
use sysinfo::System;

use super::signal::{Sampler, SignalName, SignalSample};

/// Maps whole-machine CPU load to a focus hint: moderate load reads as
/// working, heavy load as something else competing for attention.
pub fn cpu_load_score(cpu_percent: f32) -> f64 {
    let load = f64::from(cpu_percent) / 100.0;
    if (0.3..=0.6).contains(&load) {
        0.8
    } else if load > 0.6 {
        0.4
    } else {
        0.5
    }
}

pub struct CpuSampler {
    system: System,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; establish the baseline now.
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for CpuSampler {
    fn signal(&self) -> SignalName {
        SignalName::CpuLoad
    }

    fn sample(&mut self, now: DateTime<Utc>) -> SignalSample {
        self.system.refresh_cpu_usage();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return SignalSample::unavailable(self.signal(), now);
        }

        let average = cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32;
        if !average.is_finite() {
            return SignalSample::unavailable(self.signal(), now);
        }
        SignalSample::measured(self.signal(), cpu_load_score(average), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderate_load_scores_highest() {
        assert_eq!(cpu_load_score(45.0), 0.8);
        assert_eq!(cpu_load_score(30.0), 0.8);
        assert_eq!(cpu_load_score(60.0), 0.8);
        assert_eq!(cpu_load_score(85.0), 0.4);
        assert_eq!(cpu_load_score(5.0), 0.5);
    }
}
