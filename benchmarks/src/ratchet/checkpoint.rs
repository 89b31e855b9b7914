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

//! Checkpoint manifests of suspended queries.
//!
//! A non-partitioned checkpoint is a single JSON file. A partitioned
//! checkpoint is a folder holding one `part-N.ratchet` file per output
//! partition.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use datafusion::common::exec_err;
use datafusion::error::{DataFusionError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Bumped whenever the manifest layout changes
pub const CHECKPOINT_VERSION: u32 = 1;

const PART_PREFIX: &str = "part-";
const PART_SUFFIX: &str = ".ratchet";

/// Progress of one output partition when the query was suspended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionProgress {
    pub partition: usize,
    pub rows: usize,
    pub batches: usize,
    pub finished: bool,
}

impl PartitionProgress {
    pub fn new(partition: usize) -> Self {
        Self {
            partition,
            rows: 0,
            batches: 0,
            finished: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Query text with whitespace collapsed
    pub sql: String,
    pub suspended_after_ms: u64,
    pub target_partitions: usize,
    pub partitions: Vec<PartitionProgress>,
    /// Seconds since the unix epoch
    pub created_at: u64,
}

impl Checkpoint {
    pub fn new(
        sql: &str,
        suspended_after: Duration,
        target_partitions: usize,
        partitions: Vec<PartitionProgress>,
    ) -> Self {
        let created_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            version: CHECKPOINT_VERSION,
            sql: normalize_sql(sql),
            suspended_after_ms: suspended_after.as_millis() as u64,
            target_partitions,
            partitions,
            created_at,
        }
    }

    pub fn rows(&self) -> usize {
        self.partitions.iter().map(|p| p.rows).sum()
    }

    /// Write the checkpoint to `location`, returning the files written
    pub fn write(&self, location: &Path, partitioned: bool) -> Result<Vec<PathBuf>> {
        if !partitioned {
            if let Some(parent) = location.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            write_manifest(location, self)?;
            return Ok(vec![location.to_path_buf()]);
        }

        fs::create_dir_all(location)?;
        remove_part_files(location)?;
        let mut written = Vec::with_capacity(self.partitions.len());
        for progress in &self.partitions {
            let part = Checkpoint {
                partitions: vec![progress.clone()],
                ..self.clone()
            };
            let path = location.join(part_file_name(progress.partition));
            write_manifest(&path, &part)?;
            written.push(path);
        }
        info!(
            "Wrote {} partition checkpoints to {}",
            written.len(),
            location.display()
        );
        Ok(written)
    }

    /// Load the checkpoint stored at `location`. Partition files are merged
    /// back into a single checkpoint.
    pub fn load(location: &Path, partitioned: bool) -> Result<Self> {
        if !location.exists() {
            return exec_err!("No checkpoint found at {}", location.display());
        }
        if !partitioned {
            if location.is_dir() {
                return exec_err!(
                    "Checkpoint {} is a folder, resume it as partitioned",
                    location.display()
                );
            }
            return read_manifest(location);
        }

        let mut parts = vec![];
        for entry in fs::read_dir(location)? {
            let path = entry?.path();
            let is_part = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(is_part_file_name)
                .unwrap_or(false);
            if is_part {
                parts.push(path);
            } else {
                debug!("Skipping {} while loading checkpoint", path.display());
            }
        }
        parts.sort();

        let mut manifests = parts
            .iter()
            .map(|p| read_manifest(p))
            .collect::<Result<Vec<_>>>()?
            .into_iter();
        let Some(mut merged) = manifests.next() else {
            return exec_err!(
                "No partition checkpoints found in {}",
                location.display()
            );
        };
        for part in manifests {
            if part.sql != merged.sql {
                return exec_err!(
                    "Partition checkpoints in {} disagree on the query",
                    location.display()
                );
            }
            merged.partitions.extend(part.partitions);
        }
        merged.partitions.sort_by_key(|p| p.partition);
        Ok(merged)
    }

    /// Check that this checkpoint was written for `sql`
    pub fn verify(&self, sql: &str) -> Result<()> {
        if self.version != CHECKPOINT_VERSION {
            return exec_err!(
                "Unsupported checkpoint version {}, expected {CHECKPOINT_VERSION}",
                self.version
            );
        }
        if self.sql != normalize_sql(sql) {
            return exec_err!("Checkpoint was written for a different query");
        }
        Ok(())
    }
}

/// Collapse runs of whitespace so formatting changes do not invalidate a
/// checkpoint
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn part_file_name(partition: usize) -> String {
    format!("{PART_PREFIX}{partition}{PART_SUFFIX}")
}

fn is_part_file_name(name: &str) -> bool {
    name.len() > PART_PREFIX.len() + PART_SUFFIX.len()
        && name.starts_with(PART_PREFIX)
        && name.ends_with(PART_SUFFIX)
}

/// Remove the partition files of an earlier suspension to `location`
fn remove_part_files(location: &Path) -> Result<()> {
    for entry in fs::read_dir(location)? {
        let path = entry?.path();
        let is_part = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(is_part_file_name)
            .unwrap_or(false);
        if is_part && path.is_file() {
            debug!("Removing stale checkpoint {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn write_manifest(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let json = serde_json::to_string_pretty(checkpoint)
        .map_err(|e| DataFusionError::External(Box::new(e)))?;
    fs::write(path, json)?;
    Ok(())
}

fn read_manifest(path: &Path) -> Result<Checkpoint> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        DataFusionError::Execution(format!(
            "Invalid checkpoint {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(partitions: usize) -> Checkpoint {
        let progress = (0..partitions)
            .map(|i| PartitionProgress {
                partition: i,
                rows: 10 * i,
                batches: i,
                finished: i == 0,
            })
            .collect();
        Checkpoint::new(
            "select *\n  from   lineitem",
            Duration::from_millis(1200),
            partitions,
            progress,
        )
    }

    #[test]
    fn single_file_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("nested").join("q1.ratchet");
        let expected = checkpoint(1);

        let written = expected.write(&location, false)?;
        assert_eq!(written, vec![location.clone()]);

        let loaded = Checkpoint::load(&location, false)?;
        assert_eq!(loaded, expected);
        assert_eq!(loaded.suspended_after_ms, 1200);
        loaded.verify("select * from lineitem")?;
        Ok(())
    }

    #[test]
    fn partitioned_layout_ignores_foreign_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("q3");
        let expected = checkpoint(3);
        expected.write(&location, true)?;

        fs::write(location.join("notes.txt"), "hello")?;
        fs::write(location.join("part-.ratchet"), "not json")?;

        let mut names = fs::read_dir(&location)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<_>>>()?;
        names.sort();
        assert_eq!(
            names,
            vec![
                "notes.txt",
                "part-.ratchet",
                "part-0.ratchet",
                "part-1.ratchet",
                "part-2.ratchet"
            ]
        );

        let loaded = Checkpoint::load(&location, true)?;
        assert_eq!(loaded.partitions, expected.partitions);
        assert_eq!(loaded.rows(), 30);
        Ok(())
    }

    #[test]
    fn rewriting_a_folder_drops_stale_partitions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("ckpt");
        checkpoint(4).write(&location, true)?;
        fs::write(location.join("notes.txt"), "kept")?;

        let second = Checkpoint::new(
            "select l_orderkey from lineitem order by l_orderkey",
            Duration::from_millis(5),
            4,
            vec![PartitionProgress::new(0)],
        );
        second.write(&location, true)?;

        let mut names = fs::read_dir(&location)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<_>>>()?;
        names.sort();
        assert_eq!(names, vec!["notes.txt", "part-0.ratchet"]);

        let loaded = Checkpoint::load(&location, true)?;
        assert_eq!(loaded.partitions, second.partitions);
        loaded.verify("select l_orderkey from lineitem order by l_orderkey")?;
        Ok(())
    }

    #[test]
    fn missing_or_mismatched_checkpoint() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("absent");
        assert!(Checkpoint::load(&location, false).is_err());
        assert!(Checkpoint::load(&location, true).is_err());

        fs::create_dir(&location)?;
        let err = Checkpoint::load(&location, true).unwrap_err();
        assert!(err.to_string().contains("No partition checkpoints"), "{err}");

        let err = checkpoint(1).verify("select 1").unwrap_err();
        assert!(err.to_string().contains("different query"), "{err}");
        Ok(())
    }

    #[test]
    fn corrupt_manifest() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let location = dir.path().join("q.ratchet");
        fs::write(&location, "{")?;
        let err = Checkpoint::load(&location, false).unwrap_err();
        assert!(err.to_string().contains("Invalid checkpoint"), "{err}");
        Ok(())
    }
}
