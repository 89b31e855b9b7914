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

use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use datafusion::error::{DataFusionError, Result};
use datafusion::execution::disk_manager::DiskManagerBuilder;
use datafusion::execution::memory_pool::{
    FairSpillPool, GreedyMemoryPool, MemoryPool, TrackConsumersPool,
};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::SessionConfig;
use structopt::StructOpt;

// Common benchmark options (don't use doc comments otherwise this doc
// shows up in help files)
#[derive(Debug, StructOpt, Clone)]
pub struct CommonOpt {
    /// Number of threads the engine uses to execute a query
    #[structopt(short = "t", long = "threads", default_value = "1")]
    pub threads: usize,

    /// Batch size when reading CSV or Parquet files
    #[structopt(short = "s", long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Folder for temporary files written by spilling operators, such as <exp/tmp>
    #[structopt(parse(from_os_str), long = "tmp-folder")]
    pub tmp_folder: Option<PathBuf>,

    /// The memory pool type to use, should be one of "fair" or "greedy"
    #[structopt(long = "mem-pool-type", default_value = "fair")]
    pub mem_pool_type: String,

    /// Memory limit (e.g. '100M', '1.5G'). If not specified, run with no memory limit.
    #[structopt(long = "memory-limit", parse(try_from_str = parse_memory_limit))]
    pub memory_limit: Option<usize>,

    /// Number of decimals used when printing floating point results
    #[structopt(long = "float-precision", default_value = "1")]
    pub float_precision: usize,

    /// Activate debug mode to see query plans
    #[structopt(long)]
    pub debug: bool,
}

impl Default for CommonOpt {
    fn default() -> Self {
        Self {
            threads: 1,
            batch_size: None,
            tmp_folder: None,
            mem_pool_type: "fair".to_string(),
            memory_limit: None,
            float_precision: 1,
            debug: false,
        }
    }
}

impl CommonOpt {
    /// Return an appropriately configured `SessionConfig`
    pub fn config(&self) -> Result<SessionConfig> {
        SessionConfig::from_env().and_then(|config| self.update_config(config))
    }

    /// Modify the existing config appropriately
    pub fn update_config(&self, mut config: SessionConfig) -> Result<SessionConfig> {
        if self.threads == 0 {
            return Err(DataFusionError::Configuration(
                "number of threads must be greater than zero".to_string(),
            ));
        }
        config = config.with_target_partitions(self.threads);

        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }

        Ok(config)
    }

    /// Return an appropriately configured `RuntimeEnvBuilder`
    pub fn runtime_env_builder(&self) -> Result<RuntimeEnvBuilder> {
        let mut rt_builder = RuntimeEnvBuilder::new();
        const NUM_TRACKED_CONSUMERS: usize = 5;
        if let Some(memory_limit) = self.memory_limit {
            let tracked = NonZeroUsize::new(NUM_TRACKED_CONSUMERS)
                .unwrap_or(NonZeroUsize::MIN);
            let pool: Arc<dyn MemoryPool> = match self.mem_pool_type.as_str() {
                "fair" => Arc::new(TrackConsumersPool::new(
                    FairSpillPool::new(memory_limit),
                    tracked,
                )),
                "greedy" => Arc::new(TrackConsumersPool::new(
                    GreedyMemoryPool::new(memory_limit),
                    tracked,
                )),
                _ => {
                    return Err(DataFusionError::Configuration(format!(
                        "Invalid memory pool type: {}",
                        self.mem_pool_type
                    )));
                }
            };
            rt_builder = rt_builder
                .with_memory_pool(pool)
                .with_disk_manager_builder(DiskManagerBuilder::default());
        }
        if let Some(tmp_folder) = &self.tmp_folder {
            fs::create_dir_all(tmp_folder)?;
            rt_builder = rt_builder.with_temp_file_path(tmp_folder);
        }
        Ok(rt_builder)
    }
}

/// Parse memory limit from string to number of bytes
/// e.g. '1.5G', '100M' -> 1572864
pub fn parse_memory_limit(limit: &str) -> Result<usize, String> {
    let Some((unit_start, _)) = limit.char_indices().last() else {
        return Err("Empty memory limit".to_string());
    };
    let (number, unit) = limit.split_at(unit_start);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("Failed to parse number from memory limit '{limit}'"))?;

    match unit {
        "K" => Ok((number * 1024.0) as usize),
        "M" => Ok((number * 1024.0 * 1024.0) as usize),
        "G" => Ok((number * 1024.0 * 1024.0 * 1024.0) as usize),
        _ => Err(format!(
            "Unsupported unit '{unit}' in memory limit '{limit}'"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory_limit_all() {
        assert_eq!(parse_memory_limit("100K").unwrap(), 102400);
        assert_eq!(parse_memory_limit("1.5M").unwrap(), 1572864);
        assert_eq!(parse_memory_limit("2G").unwrap(), 2147483648);

        assert!(parse_memory_limit("500X").is_err());
        assert!(parse_memory_limit("abcM").is_err());
        assert!(parse_memory_limit("").is_err());
        assert!(parse_memory_limit("1€").is_err());
        assert!(parse_memory_limit("€").is_err());
    }

    #[test]
    fn threads_become_target_partitions() -> Result<()> {
        let opt = CommonOpt {
            threads: 4,
            batch_size: Some(1024),
            ..Default::default()
        };
        let config = opt.update_config(SessionConfig::new())?;
        assert_eq!(config.target_partitions(), 4);
        assert_eq!(config.batch_size(), 1024);
        Ok(())
    }

    #[test]
    fn zero_threads_is_rejected() {
        let opt = CommonOpt {
            threads: 0,
            ..Default::default()
        };
        assert!(opt.update_config(SessionConfig::new()).is_err());
    }

    #[test]
    fn invalid_pool_type() {
        let opt = CommonOpt {
            memory_limit: Some(1024),
            mem_pool_type: "lifo".to_string(),
            ..Default::default()
        };
        assert!(opt.runtime_env_builder().is_err());
    }
}
