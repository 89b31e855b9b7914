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

//! Suspend / resume demo over the TPC-H tables

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use datafusion::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use structopt::StructOpt;

use crate::catalog::{QueryText, Substitutions};
use crate::database::{Database, DatabaseLocation, SourceFormat, TableSource};
use crate::engine::{ExecutionMode, QueryEngine, QueryOutcome};
use crate::ratchet::{ResumeOptions, SuspendOptions};
use crate::tpch::TPCH_TABLES;
use crate::util::{print_outcome, run_query_iterations, BenchmarkRun, CommonOpt};

/// Queries shipped with the demo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoQuery {
    /// Two aggregates over lineitem
    Slim,
    /// customer / orders / lineitem join with filters on every table
    Mid,
    /// orders / lineitem join grouped by order
    Join,
    /// TPC-H q2 scanning parquet files directly
    ScanQ2,
    /// TPC-H q11 scanning parquet files directly
    ScanQ11,
    /// TPC-H q19 scanning parquet files directly
    ScanQ19,
}

impl DemoQuery {
    pub const ALL: [DemoQuery; 6] = [
        DemoQuery::Slim,
        DemoQuery::Mid,
        DemoQuery::Join,
        DemoQuery::ScanQ2,
        DemoQuery::ScanQ11,
        DemoQuery::ScanQ19,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoQuery::Slim => "slim",
            DemoQuery::Mid => "mid",
            DemoQuery::Join => "join",
            DemoQuery::ScanQ2 => "scan-q2",
            DemoQuery::ScanQ11 => "scan-q11",
            DemoQuery::ScanQ19 => "scan-q19",
        }
    }

    fn text(&self) -> &'static str {
        match self {
            DemoQuery::Slim => include_str!("../queries/demo/slim.sql"),
            DemoQuery::Mid => include_str!("../queries/demo/mid.sql"),
            DemoQuery::Join => include_str!("../queries/demo/join.sql"),
            DemoQuery::ScanQ2 => include_str!("../queries/demo/scan_q2.sql"),
            DemoQuery::ScanQ11 => include_str!("../queries/demo/scan_q11.sql"),
            DemoQuery::ScanQ19 => include_str!("../queries/demo/scan_q19.sql"),
        }
    }

    pub fn query(&self) -> Result<QueryText> {
        QueryText::parse(self.name(), self.text())
    }
}

impl FromStr for DemoQuery {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DemoQuery::ALL
            .into_iter()
            .find(|q| q.name() == s)
            .ok_or_else(|| {
                let names = DemoQuery::ALL.map(|q| q.name()).join(", ");
                format!("Query '{s}' is not supported in demo, expected one of {names}")
            })
    }
}

impl fmt::Display for DemoQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run a demo query against an on-disk database, optionally suspending it
/// and resuming it right after
#[derive(Debug, StructOpt, Clone)]
pub struct RunOpt {
    /// Demo query: slim, mid, join, scan-q2, scan-q11 or scan-q19
    #[structopt(short, long)]
    query: DemoQuery,

    /// Path to the TPC-H data files, such as <tpch/dataset/parquet/sf1>
    #[structopt(parse(from_os_str), required = true, short = "d", long = "data-folder")]
    data_folder: PathBuf,

    /// Format of the data files: `parquet`, `csv` or `tbl`
    #[structopt(short = "f", long = "format", default_value = "parquet")]
    format: SourceFormat,

    /// Database location, `memory` or a folder
    #[structopt(long = "database", default_value = "demo.db")]
    database: DatabaseLocation,

    /// Drop and reload the tables
    #[structopt(short = "u", long = "update-table")]
    update_table: bool,

    /// Start of the suspend window (seconds)
    #[structopt(long = "suspend-start")]
    suspend_start: Option<f64>,

    /// End of the suspend window (seconds)
    #[structopt(long = "suspend-end")]
    suspend_end: Option<f64>,

    /// Checkpoint file written on suspension
    #[structopt(parse(from_os_str), long = "checkpoint", default_value = "demo.ratchet")]
    checkpoint: PathBuf,

    /// Scale factor substituted into the scan queries
    #[structopt(long = "scale-factor", default_value = "sf1")]
    scale_factor: String,

    /// Common options
    #[structopt(flatten)]
    common: CommonOpt,

    /// Path to machine readable output file
    #[structopt(parse(from_os_str), short = "o", long = "output")]
    output_path: Option<PathBuf>,
}

impl RunOpt {
    pub async fn run(self) -> Result<()> {
        let db = Database::open(self.database.clone(), &self.common)?;
        let source = TableSource::new(&self.data_folder, self.format);
        db.ensure_tables(TPCH_TABLES, &source, self.update_table)
            .await?;

        let query = self.query.query()?.render(
            &Substitutions::new()
                .with_data_path(self.data_folder.to_string_lossy())
                .with_scale_factor(&self.scale_factor),
        );
        let mode = self.mode()?;
        let float_precision = Some(self.common.float_precision);
        let mut rng = StdRng::from_entropy();
        let mut benchmark_run = BenchmarkRun::new();

        let start = Instant::now();
        benchmark_run.start_new_case(query.id(), mode.name());
        let outcome =
            run_query_iterations(&db, &query, &mode, &mut rng, 1, &mut benchmark_run)
                .await?;
        print_outcome(&outcome, float_precision)?;
        println!("Total Runtime: {}", start.elapsed().as_secs_f64());

        if let QueryOutcome::Suspended(report) = &outcome {
            let resume = ResumeOptions::new(&report.location, false);
            let start = Instant::now();
            let resumed = db
                .execute_resume(query.result_statement(), &resume)
                .await?;
            print_outcome(&resumed, float_precision)?;
            println!("Resumed Runtime: {}", start.elapsed().as_secs_f64());
        }

        benchmark_run.maybe_write_json(self.output_path.as_ref())?;
        Ok(())
    }

    fn mode(&self) -> Result<ExecutionMode> {
        Ok(match (self.suspend_start, self.suspend_end) {
            (Some(start), Some(end)) => ExecutionMode::Suspend(SuspendOptions::try_new(
                &self.checkpoint,
                start,
                end,
                false,
            )?),
            _ => ExecutionMode::Normal,
        })
    }
}
