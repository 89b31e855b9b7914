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

//! Query dispatch over an engine that can suspend and resume queries

use std::path::PathBuf;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::common::plan_err;
use datafusion::error::Result;
use log::info;
use rand::Rng;

use crate::ratchet::{RatchetOptions, ResumeOptions, SuspendOptions};

/// What happened to a query executed with suspension enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendReport {
    /// Checkpoint file or folder
    pub location: PathBuf,
    /// Files written under `location`
    pub files: Vec<PathBuf>,
    pub suspended_after: Duration,
    /// Rows produced before the query was suspended
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Completed(Vec<RecordBatch>),
    Suspended(SuspendReport),
}

impl QueryOutcome {
    pub fn row_count(&self) -> usize {
        match self {
            Self::Completed(batches) => batches.iter().map(|b| b.num_rows()).sum(),
            Self::Suspended(_) => 0,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }
}

/// An engine running SQL text
#[async_trait]
pub trait QueryEngine {
    /// Run `sql` to completion
    async fn execute(&self, sql: &str) -> Result<Vec<RecordBatch>>;

    /// Run `sql`, suspending it at a point sampled from the suspend window
    async fn execute_suspend(
        &self,
        sql: &str,
        options: &SuspendOptions,
    ) -> Result<QueryOutcome>;

    /// Continue a query previously suspended by [`Self::execute_suspend`]
    async fn execute_resume(&self, sql: &str, options: &ResumeOptions)
        -> Result<QueryOutcome>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExecutionMode {
    #[default]
    Normal,
    Suspend(SuspendOptions),
    Resume(ResumeOptions),
    Ratchet(RatchetOptions),
}

impl ExecutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Suspend(_) => "suspend",
            Self::Resume(_) => "resume",
            Self::Ratchet(_) => "ratchet",
        }
    }
}

/// Run every statement but the last for its side effects, then run the last
/// one according to `mode`.
pub async fn run_statements<E, R>(
    engine: &E,
    statements: &[String],
    mode: &ExecutionMode,
    rng: &mut R,
) -> Result<QueryOutcome>
where
    E: QueryEngine + ?Sized,
    R: Rng + ?Sized,
{
    let Some((last, setup)) = statements.split_last() else {
        return plan_err!("No statements to execute");
    };
    for sql in setup {
        engine.execute(sql).await?;
    }

    match mode {
        ExecutionMode::Normal => Ok(QueryOutcome::Completed(engine.execute(last).await?)),
        ExecutionMode::Suspend(options) => engine.execute_suspend(last, options).await,
        ExecutionMode::Resume(options) => engine.execute_resume(last, options).await,
        ExecutionMode::Ratchet(options) => {
            if options.should_suspend(rng) {
                info!("Ratchet chose to suspend the query");
                engine.execute_suspend(last, &options.suspend).await
            } else {
                info!("Ratchet chose to run the query to completion");
                Ok(QueryOutcome::Completed(engine.execute(last).await?))
            }
        }
    }
}
