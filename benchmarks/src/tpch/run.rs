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

use super::{get_query, TPCH_QUERY_END_ID, TPCH_QUERY_START_ID, TPCH_TABLES};
use crate::catalog::{parse_query_id, Substitutions};
use crate::database::{Database, DatabaseLocation, SourceFormat, TableSource};
use crate::engine::ExecutionMode;
use crate::ratchet::RatchetOpt;
use crate::util::{print_outcome, run_query_iterations, BenchmarkRun, CommonOpt};

/// Run the tpch benchmark.
///
/// This benchmarks is derived from the [TPC-H][1] version
/// [2.17.1]. The data and answers are generated using `tpch-gen` from
/// [2].
///
/// [1]: http://www.tpc.org/tpch/
/// [2]: https://github.com/databricks/tpch-dbgen.git,
/// [2.17.1]: https://www.tpc.org/tpc_documents_current_versions/pdf/tpc-h_v2.17.1.pdf
#[derive(Debug, StructOpt, Clone)]
#[structopt(verbatim_doc_comment)]
pub struct RunOpt {
    /// Query id, such as q7. If not specified, runs all queries
    #[structopt(short, long)]
    query: Option<String>,

    /// Database location, `memory` or a folder
    #[structopt(long = "database", default_value = "memory")]
    database: DatabaseLocation,

    /// Path to the TPC-H data files, such as <exp/dataset/tpch/parquet-sf1>
    #[structopt(parse(from_os_str), required = true, short = "d", long = "data-folder")]
    data_folder: PathBuf,

    /// Format of the data files: `parquet`, `csv` or `tbl`
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

    /// Scale factor substituted into templated queries, such as sf1
    #[structopt(long = "scale-factor")]
    scale_factor: Option<String>,

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
                let query_id = parse_query_id(query, TPCH_QUERY_END_ID)?;
                query_id..=query_id
            }
            None if mode == ExecutionMode::Normal => {
                TPCH_QUERY_START_ID..=TPCH_QUERY_END_ID
            }
            None => return plan_err!("--query is required to {} a query", mode.name()),
        };

        let start = Instant::now();
        let db = Database::open(self.database.clone(), &self.common)?;
        let source = TableSource::new(&self.data_folder, self.format)
            .with_direct_scan(self.direct_scan);
        db.ensure_tables(TPCH_TABLES, &source, self.update_table)
            .await?;
        info!("TPC-H tables ready after {} ms", start.elapsed().as_millis());

        let substitutions = self.substitutions();
        let mut rng = self.ratchet.rng();
        let mut benchmark_run = BenchmarkRun::new();
        for query_id in query_range {
            benchmark_run.start_new_case(&format!("Query {query_id}"), mode.name());
            let query = get_query(query_id)?.render(&substitutions);
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

    fn substitutions(&self) -> Substitutions {
        let substitutions = Substitutions::new()
            .with_data_path(self.data_folder.to_string_lossy());
        match &self.scale_factor {
            Some(scale_factor) => substitutions.with_scale_factor(scale_factor),
            None => substitutions,
        }
    }
}
