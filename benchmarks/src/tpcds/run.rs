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

use std::path::PathBuf;
use std::time::Instant;

use datafusion::common::plan_err;
use datafusion::error::Result;
use log::info;
use structopt::StructOpt;

use super::{get_query, TPCDS_QUERY_END_ID, TPCDS_QUERY_START_ID, TPCDS_TABLES};
use crate::catalog::{parse_query_id, Substitutions};
use crate::database::{Database, DatabaseLocation, SourceFormat, TableSource};
use crate::engine::ExecutionMode;
use crate::ratchet::RatchetOpt;
use crate::util::{print_outcome, run_query_iterations, BenchmarkRun, CommonOpt};

/// Run the tpcds benchmark.
///
/// The query text is read from `--query-path`, one `q{n}.sql` (or
/// `{n}.sql`) file per query as written by `dsqgen`.
#[derive(Debug, StructOpt, Clone)]
#[structopt(verbatim_doc_comment)]
pub struct RunOpt {
    /// Query id, such as q64. If not specified, runs all queries
    #[structopt(short, long)]
    query: Option<String>,

    /// Database location, `memory` or a folder
    #[structopt(long = "database", default_value = "memory")]
    database: DatabaseLocation,

    /// Path to the TPC-DS data files
    #[structopt(parse(from_os_str), required = true, short = "d", long = "data-folder")]
    data_folder: PathBuf,

    /// Folder holding the query files
    #[structopt(parse(from_os_str), required = true, long = "query-path")]
    query_path: PathBuf,

    /// Format of the data files: `parquet`, `csv` or `dat`
    #[structopt(short = "f", long = "format", default_value = "parquet")]
    format: SourceFormat,

    /// Query the data files in place instead of loading them
    #[structopt(long = "direct-scan")]
    direct_scan: bool,

    /// Drop and reload the tables
    #[structopt(short = "u", long = "update-table")]
    update_table: bool,

    /// Number of iterations of each query
    #[structopt(short = "i", long = "iterations", default_value = "1")]
    iterations: usize,

    /// Common options
    #[structopt(flatten)]
    common: CommonOpt,

    /// Suspend / resume options
    #[structopt(flatten)]
    ratchet: RatchetOpt,

    /// Path to machine readable output file
    #[structopt(parse(from_os_str), short = "o", long = "output")]
    output_path: Option<PathBuf>,
}

impl RunOpt {
    pub async fn run(self) -> Result<()> {
        println!("Running benchmarks with the following options: {self:?}");
        let mode = self.ratchet.mode()?;
        let query_range = match &self.query {
            Some(query) => {
                let query_id = parse_query_id(query, TPCDS_QUERY_END_ID)?;
                query_id..=query_id
            }
            None if mode == ExecutionMode::Normal => {
                TPCDS_QUERY_START_ID..=TPCDS_QUERY_END_ID
            }
            None => return plan_err!("--query is required to {} a query", mode.name()),
        };
        // read every query up front so a missing file fails before loading data
        let queries = query_range
            .map(|query_id| get_query(&self.query_path, query_id))
            .collect::<Result<Vec<_>>>()?;

        let start = Instant::now();
        let db = Database::open(self.database.clone(), &self.common)?;
        let source = TableSource::new(&self.data_folder, self.format)
            .with_direct_scan(self.direct_scan);
        db.ensure_tables(TPCDS_TABLES, &source, self.update_table)
            .await?;
        info!("TPC-DS tables ready after {} ms", start.elapsed().as_millis());

        let substitutions =
            Substitutions::new().with_data_path(self.data_folder.to_string_lossy());
        let mut rng = self.ratchet.rng();
        let mut benchmark_run = BenchmarkRun::new();
        for query in queries {
            let query = query.render(&substitutions);
            benchmark_run.start_new_case(query.id(), mode.name());
            let outcome = run_query_iterations(
                &db,
                &query,
                &mode,
                &mut rng,
                self.iterations,
                &mut benchmark_run,
            )
            .await?;
            print_outcome(&outcome, Some(self.common.float_precision))?;
        }

        println!("Total Runtime: {}", start.elapsed().as_secs_f64());
        benchmark_run.maybe_write_json(self.output_path.as_ref())?;
        Ok(())
    }
}
