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

//! Benchmark derived from TPC-DS. This is not an official TPC-DS benchmark.

use datafusion::error::Result;
use ratchet_benchmarks::convert::ConvertOpt;
use ratchet_benchmarks::database::SourceFormat;
use ratchet_benchmarks::tpcds::{self, TPCDS_TABLES};
use structopt::StructOpt;

#[cfg(all(feature = "snmalloc", feature = "mimalloc"))]
compile_error!(
    "feature \"snmalloc\" and feature \"mimalloc\" cannot be enabled at the same time"
);

#[cfg(feature = "snmalloc")]
#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, StructOpt)]
#[structopt(name = "TPC-DS", about = "TPC-DS Benchmarks.")]
enum TpcdsOpt {
    /// Run a query, optionally suspending or resuming it
    Benchmark(tpcds::RunOpt),
    /// Convert dsdgen `.dat` files into CSV or Parquet
    Convert(ConvertOpt),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    match TpcdsOpt::from_args() {
        TpcdsOpt::Benchmark(opt) => opt.run().await,
        TpcdsOpt::Convert(opt) => {
            opt.run(TPCDS_TABLES, SourceFormat::Dat).await.map(|_| ())
        }
    }
}
