// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Suspend, resume and ratchet execution options.
//!
//! A suspended query leaves a checkpoint manifest behind (see
//! [`checkpoint`]). Resuming validates the manifest against the query and
//! runs the query to completion.

use std::path::PathBuf;
use std::time::Duration;

use datafusion::common::plan_err;
use datafusion::error::{DataFusionError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use structopt::StructOpt;

use crate::engine::ExecutionMode;

pub mod checkpoint;

pub use checkpoint::{Checkpoint, PartitionProgress};

/// Where and when to suspend a query
#[derive(Debug, Clone, PartialEq)]
pub struct SuspendOptions {
    /// File, or folder when `partitioned`, receiving the checkpoint
    pub location: PathBuf,
    /// Earliest suspend point, in seconds after the query starts
    pub start: f64,
    /// Latest suspend point, in seconds after the query starts
    pub end: f64,
    /// Write one checkpoint per output partition
    pub partitioned: bool,
}

impl SuspendOptions {
    pub fn try_new(
        location: impl Into<PathBuf>,
        start: f64,
        end: f64,
        partitioned: bool,
    ) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return plan_err!("Suspend window must be finite, got [{start}, {end}]");
        }
        if start < 0.0 {
            return plan_err!("Suspend start time must not be negative, got {start}");
        }
        if end >= Duration::MAX.as_secs_f64() {
            return plan_err!("Suspend end time {end} is too large");
        }
        if start > end {
            return plan_err!(
                "Suspend start time {start} is after suspend end time {end}"
            );
        }
        Ok(Self {
            location: location.into(),
            start,
            end,
            partitioned,
        })
    }

    /// Pick the suspend point uniformly from `[start, end]`
    pub fn sample_suspend_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = if self.start == self.end {
            self.start
        } else {
            rng.gen_range(self.start..=self.end)
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Where to find the checkpoint of a previously suspended query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOptions {
    pub location: PathBuf,
    pub partitioned: bool,
}

impl ResumeOptions {
    pub fn new(location: impl Into<PathBuf>, partitioned: bool) -> Self {
        Self {
            location: location.into(),
            partitioned,
        }
    }
}

/// Suspend with probability `probability`, otherwise run normally
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetOptions {
    pub suspend: SuspendOptions,
    pub probability: f64,
}

impl RatchetOptions {
    pub fn try_new(suspend: SuspendOptions, probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return plan_err!(
                "Ratchet probability must be within [0, 1], got {probability}"
            );
        }
        Ok(Self {
            suspend,
            probability,
        })
    }

    pub fn should_suspend<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.probability)
    }
}

/// Suspend/resume flags shared by the benchmark drivers
#[derive(Debug, Clone, Default, StructOpt)]
pub struct RatchetOpt {
    /// Suspend the query somewhere inside the suspend window
    #[structopt(long = "suspend")]
    pub suspend: bool,

    /// Start of the suspend window (seconds)
    #[structopt(long = "suspend-start")]
    pub suspend_start: Option<f64>,

    /// End of the suspend window (seconds)
    #[structopt(long = "suspend-end")]
    pub suspend_end: Option<f64>,

    /// File or folder receiving the checkpoint
    #[structopt(long = "suspend-location", parse(from_os_str))]
    pub suspend_location: Option<PathBuf>,

    /// Resume a previously suspended query
    #[structopt(short = "r", long = "resume")]
    pub resume: bool,

    /// File or folder holding the checkpoint to resume from
    #[structopt(long = "resume-location", parse(from_os_str))]
    pub resume_location: Option<PathBuf>,

    /// Use one checkpoint file per output partition
    #[structopt(long = "partitioned")]
    pub partitioned: bool,

    /// Suspend with this probability instead of always
    #[structopt(long = "ratchet")]
    pub ratchet_probability: Option<f64>,

    /// Seed for the ratchet decision
    #[structopt(long = "seed")]
    pub seed: Option<u64>,
}

impl RatchetOpt {
    /// Build the execution mode described by the flags
    pub fn mode(&self) -> Result<ExecutionMode> {
        if self.resume && (self.suspend || self.ratchet_probability.is_some()) {
            return plan_err!("--resume cannot be combined with --suspend or --ratchet");
        }
        if self.suspend && self.ratchet_probability.is_some() {
            return plan_err!("--suspend and --ratchet are mutually exclusive");
        }

        if self.resume {
            let Some(location) = &self.resume_location else {
                return missing("--resume-location");
            };
            return Ok(ExecutionMode::Resume(ResumeOptions::new(
                location,
                self.partitioned,
            )));
        }

        match self.ratchet_probability {
            Some(probability) => Ok(ExecutionMode::Ratchet(RatchetOptions::try_new(
                self.suspend_options()?,
                probability,
            )?)),
            None if self.suspend => Ok(ExecutionMode::Suspend(self.suspend_options()?)),
            None => Ok(ExecutionMode::Normal),
        }
    }

    /// Random source for the ratchet decision
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn suspend_options(&self) -> Result<SuspendOptions> {
        let (Some(start), Some(end)) = (self.suspend_start, self.suspend_end) else {
            return missing("--suspend-start and --suspend-end");
        };
        let Some(location) = &self.suspend_location else {
            return missing("--suspend-location");
        };
        SuspendOptions::try_new(location, start, end, self.partitioned)
    }
}

fn missing<T>(flag: &str) -> Result<T> {
    Err(DataFusionError::Configuration(format!("{flag} must be provided")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn opt(args: &[&str]) -> RatchetOpt {
        let args = std::iter::once("test").chain(args.iter().copied());
        RatchetOpt::from_iter(args)
    }

    #[test]
    fn window_is_validated() {
        assert!(SuspendOptions::try_new("a", 0.0, 0.0, false).is_ok());
        assert!(SuspendOptions::try_new("a", -1.0, 2.0, false).is_err());
        assert!(SuspendOptions::try_new("a", 3.0, 2.0, false).is_err());
        assert!(SuspendOptions::try_new("a", 0.0, f64::INFINITY, false).is_err());
        assert!(SuspendOptions::try_new("a", 1e20, 1e20, false).is_err());
        assert!(SuspendOptions::try_new("a", 0.0, 1e20, false).is_err());
        let large = SuspendOptions::try_new("a", 1e9, 1e12, false).unwrap();
        let point = large.sample_suspend_point(&mut StdRng::seed_from_u64(3));
        assert!(point >= Duration::from_secs(1_000_000_000));
    }

    #[test]
    fn suspend_point_stays_in_window() -> Result<()> {
        let options = SuspendOptions::try_new("a", 0.5, 1.5, false)?;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let point = options.sample_suspend_point(&mut rng).as_secs_f64();
            assert!((0.5..=1.5).contains(&point), "{point}");
        }

        let fixed = SuspendOptions::try_new("a", 2.0, 2.0, false)?;
        assert_eq!(
            fixed.sample_suspend_point(&mut StepRng::new(0, 1)),
            Duration::from_secs(2)
        );
        Ok(())
    }

    #[test]
    fn probability_bounds() -> Result<()> {
        let suspend = SuspendOptions::try_new("a", 0.0, 1.0, false)?;
        assert!(RatchetOptions::try_new(suspend.clone(), 1.5).is_err());
        assert!(RatchetOptions::try_new(suspend.clone(), -0.1).is_err());

        let mut rng = StdRng::seed_from_u64(1);
        let always = RatchetOptions::try_new(suspend.clone(), 1.0)?;
        let never = RatchetOptions::try_new(suspend, 0.0)?;
        assert!((0..20).all(|_| always.should_suspend(&mut rng)));
        assert!((0..20).all(|_| !never.should_suspend(&mut rng)));
        Ok(())
    }

    #[test]
    fn flags_to_mode() -> Result<()> {
        assert_eq!(opt(&[]).mode()?, ExecutionMode::Normal);

        let mode = opt(&[
            "--suspend",
            "--suspend-start",
            "1",
            "--suspend-end",
            "2.5",
            "--suspend-location",
            "/tmp/q1",
            "--partitioned",
        ])
        .mode()?;
        assert_eq!(
            mode,
            ExecutionMode::Suspend(SuspendOptions::try_new("/tmp/q1", 1.0, 2.5, true)?)
        );

        let mode = opt(&["-r", "--resume-location", "/tmp/q1"]).mode()?;
        assert_eq!(
            mode,
            ExecutionMode::Resume(ResumeOptions::new("/tmp/q1", false))
        );

        let mode = opt(&[
            "--ratchet",
            "0.25",
            "--suspend-start",
            "0",
            "--suspend-end",
            "1",
            "--suspend-location",
            "ckpt",
        ])
        .mode()?;
        assert!(matches!(mode, ExecutionMode::Ratchet(r) if r.probability == 0.25));
        Ok(())
    }

    #[test]
    fn invalid_flag_combinations() {
        assert!(opt(&["--suspend"]).mode().is_err());
        assert!(opt(&["-r"]).mode().is_err());
        assert!(opt(&["-r", "--resume-location", "x", "--suspend"]).mode().is_err());
        let err = opt(&["--suspend", "--suspend-start", "0", "--suspend-end", "1"])
            .mode()
            .unwrap_err();
        assert!(err.to_string().contains("--suspend-location"), "{err}");
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let opt = opt(&["--seed", "42"]);
        let a: Vec<u32> = (0..4).map(|_| opt.rng().gen()).collect();
        let b: Vec<u32> = (0..4).map(|_| opt.rng().gen()).collect();
        assert_eq!(a, b);
    }
}
