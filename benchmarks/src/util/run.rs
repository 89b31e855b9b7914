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

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use datafusion::common::utils::get_available_parallelism;
use datafusion::error::{DataFusionError, Result};
use rand::Rng;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::catalog::QueryText;
use crate::engine::{run_statements, ExecutionMode, QueryEngine, QueryOutcome};

fn serialize_start_time<S>(start_time: &SystemTime, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let secs = start_time
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    ser.serialize_u64(secs)
}

fn serialize_elapsed<S>(elapsed: &Duration, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let ms = elapsed.as_secs_f64() * 1000.0;
    ser.serialize_f64(ms)
}

#[derive(Debug, Serialize)]
pub struct RunContext {
    /// Benchmark crate version
    pub benchmark_version: String,
    /// DataFusion crate version
    pub datafusion_version: String,
    /// Number of CPU cores
    pub num_cpus: usize,
    /// Start time
    #[serde(serialize_with = "serialize_start_time")]
    pub start_time: SystemTime,
    /// CLI arguments
    pub arguments: Vec<String>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            benchmark_version: env!("CARGO_PKG_VERSION").to_owned(),
            datafusion_version: datafusion::DATAFUSION_VERSION.to_owned(),
            num_cpus: get_available_parallelism(),
            start_time: SystemTime::now(),
            arguments: std::env::args().skip(1).collect::<Vec<String>>(),
        }
    }
}

/// A single iteration of a benchmark query
#[derive(Debug, Serialize)]
struct QueryIter {
    #[serde(serialize_with = "serialize_elapsed")]
    elapsed: Duration,
    row_count: usize,
    suspended: bool,
}

/// A single benchmark case
#[derive(Debug, Serialize)]
pub struct BenchQuery {
    query: String,
    mode: String,
    iterations: Vec<QueryIter>,
    #[serde(serialize_with = "serialize_start_time")]
    start_time: SystemTime,
}

/// Timing of one query execution as reported by a driver
#[derive(Debug, Clone, Copy)]
pub struct QueryResult {
    pub elapsed: Duration,
    pub row_count: usize,
    pub suspended: bool,
}

/// Collects benchmark run data and then serializes it at the end
#[derive(Debug)]
pub struct BenchmarkRun {
    context: RunContext,
    queries: Vec<BenchQuery>,
    current_case: Option<usize>,
}

impl Default for BenchmarkRun {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkRun {
    // create new
    pub fn new() -> Self {
        Self {
            context: RunContext::new(),
            queries: vec![],
            current_case: None,
        }
    }

    /// begin a new case. iterations added after this will be included in the new case
    pub fn start_new_case(&mut self, id: &str, mode: &str) {
        self.queries.push(BenchQuery {
            query: id.to_owned(),
            mode: mode.to_owned(),
            iterations: vec![],
            start_time: SystemTime::now(),
        });
        self.current_case = Some(self.queries.len() - 1);
    }

    /// Write a new iteration to the current case
    pub fn write_iter(&mut self, result: QueryResult) -> Result<()> {
        let Some(idx) = self.current_case else {
            return Err(DataFusionError::Internal(
                "no benchmark case was started".to_string(),
            ));
        };
        self.queries[idx].iterations.push(QueryIter {
            elapsed: result.elapsed,
            row_count: result.row_count,
            suspended: result.suspended,
        });
        Ok(())
    }

    /// Stringify data into formatted json
    pub fn to_json(&self) -> Result<String> {
        let mut output = HashMap::<&str, Value>::new();
        output.insert("context", to_value(&self.context)?);
        output.insert("queries", to_value(&self.queries)?);
        serde_json::to_string_pretty(&output)
            .map_err(|e| DataFusionError::External(Box::new(e)))
    }

    /// Write data as json into output path if it exists.
    pub fn maybe_write_json(&self, maybe_path: Option<&PathBuf>) -> Result<()> {
        if let Some(path) = maybe_path {
            std::fs::write(path, self.to_json()?)?;
        };
        Ok(())
    }
}

/// Run `query` `iterations` times under `mode`, recording every iteration in
/// the current case of `run`. Returns the outcome of the last iteration.
pub async fn run_query_iterations<E, R>(
    engine: &E,
    query: &QueryText,
    mode: &ExecutionMode,
    rng: &mut R,
    iterations: usize,
    run: &mut BenchmarkRun,
) -> Result<QueryOutcome>
where
    E: QueryEngine + ?Sized,
    R: Rng + ?Sized,
{
    if iterations == 0 {
        return Err(DataFusionError::Configuration(
            "number of iterations must be greater than zero".to_string(),
        ));
    }
    let mut millis = Vec::with_capacity(iterations);
    let mut last = None;
    for i in 0..iterations {
        let start = Instant::now();
        let outcome = run_statements(engine, query.statements(), mode, rng).await?;
        let elapsed = start.elapsed();
        let ms = elapsed.as_secs_f64() * 1000.0;
        millis.push(ms);
        let row_count = outcome.row_count();
        if outcome.is_suspended() {
            println!("Query {} iteration {i} was suspended after {ms:.1} ms", query.id());
        } else {
            println!(
                "Query {} iteration {i} took {ms:.1} ms and returned {row_count} rows",
                query.id()
            );
        }
        run.write_iter(QueryResult {
            elapsed,
            row_count,
            suspended: outcome.is_suspended(),
        })?;
        last = Some(outcome);
    }

    if iterations > 1 {
        let avg = millis.iter().sum::<f64>() / millis.len() as f64;
        println!("Query {} avg time: {avg:.2} ms", query.id());
    }
    last.ok_or_else(|| DataFusionError::Internal("query did not run".to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| DataFusionError::External(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_iter_requires_a_case() {
        let mut run = BenchmarkRun::new();
        let result = QueryResult {
            elapsed: Duration::from_millis(5),
            row_count: 3,
            suspended: false,
        };
        assert!(run.write_iter(result).is_err());
    }

    #[tokio::test]
    async fn iterations_are_recorded() -> Result<()> {
        use crate::database::{Database, DatabaseLocation};
        use crate::util::CommonOpt;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let db = Database::open(DatabaseLocation::Memory, &CommonOpt::default())?;
        let query = QueryText::parse("values", "select 1 as a union all select 2")?;
        let mut rng = StdRng::seed_from_u64(0);
        let mut run = BenchmarkRun::new();
        run.start_new_case("values", "normal");

        let outcome = run_query_iterations(
            &db,
            &query,
            &ExecutionMode::Normal,
            &mut rng,
            2,
            &mut run,
        )
        .await?;
        assert_eq!(outcome.row_count(), 2);
        assert_eq!(run.queries[0].iterations.len(), 2);

        let err = run_query_iterations(
            &db,
            &query,
            &ExecutionMode::Normal,
            &mut rng,
            0,
            &mut run,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DataFusionError::Configuration(_)));
        Ok(())
    }

    #[test]
    fn json_contains_cases() -> Result<()> {
        let mut run = BenchmarkRun::new();
        run.start_new_case("q1", "normal");
        run.write_iter(QueryResult {
            elapsed: Duration::from_millis(1500),
            row_count: 4,
            suspended: false,
        })?;
        run.start_new_case("q6", "suspend");
        run.write_iter(QueryResult {
            elapsed: Duration::from_millis(20),
            row_count: 0,
            suspended: true,
        })?;

        let json: Value = serde_json::from_str(&run.to_json()?)
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        let queries = json["queries"].as_array().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0]["query"], "q1");
        assert_eq!(queries[0]["iterations"][0]["elapsed"], 1500.0);
        assert_eq!(queries[0]["iterations"][0]["row_count"], 4);
        assert_eq!(queries[1]["mode"], "suspend");
        assert_eq!(queries[1]["iterations"][0]["suspended"], true);
        assert!(json["context"]["datafusion_version"].is_string());
        Ok(())
    }
}
