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

//! Benchmark tables held by a DataFusion session.
//!
//! A [`Database`] is either purely in memory or backed by a folder. Tables of
//! an on-disk database are persisted as `{folder}/{table}.parquet` so that a
//! later process finds them again without reloading the raw data.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::common::plan_err;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::datasource::MemTable;
use datafusion::error::{DataFusionError, Result};
use datafusion::physical_plan::display::DisplayableExecutionPlan;
use datafusion::physical_plan::{
    collect, displayable, execute_stream, execute_stream_partitioned,
};
use datafusion::prelude::*;
use futures::stream::{self, select_all, StreamExt};
use log::{debug, info, warn};

use crate::engine::{QueryEngine, QueryOutcome, SuspendReport};
use crate::ratchet::{Checkpoint, PartitionProgress, ResumeOptions, SuspendOptions};
use crate::schema::TableSchema;
use crate::util::CommonOpt;

/// Where the benchmark tables live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    Path(PathBuf),
}

impl DatabaseLocation {
    pub fn parse(location: &str) -> Self {
        match location {
            "memory" | ":memory:" => Self::Memory,
            path => Self::Path(PathBuf::from(path)),
        }
    }
}

impl FromStr for DatabaseLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("database location must not be empty".to_string());
        }
        Ok(Self::parse(s))
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// File format of the raw benchmark data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Parquet,
    /// Comma separated with a header line
    Csv,
    /// `|` separated TPC-H dbgen output
    Tbl,
    /// `|` separated TPC-DS dsdgen output
    Dat,
}

impl SourceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
            Self::Tbl => "tbl",
            Self::Dat => "dat",
        }
    }

    pub fn is_delimited(&self) -> bool {
        matches!(self, Self::Tbl | Self::Dat)
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "parquet" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            "tbl" => Ok(Self::Tbl),
            "dat" => Ok(Self::Dat),
            other => Err(format!(
                "Invalid data format '{other}', expected parquet, csv, tbl or dat"
            )),
        }
    }
}

/// The folder and format benchmark tables are loaded from
#[derive(Debug, Clone)]
pub struct TableSource {
    pub folder: PathBuf,
    pub format: SourceFormat,
    /// Query the files in place instead of loading them into the database
    pub direct_scan: bool,
}

impl TableSource {
    pub fn new(folder: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            folder: folder.into(),
            format,
            direct_scan: false,
        }
    }

    pub fn with_direct_scan(mut self, direct_scan: bool) -> Self {
        self.direct_scan = direct_scan;
        self
    }

    /// `{folder}/{table}.{ext}`
    pub fn path(&self, table: &str) -> PathBuf {
        self.folder
            .join(format!("{table}.{}", self.format.extension()))
    }
}

pub struct Database {
    ctx: SessionContext,
    location: DatabaseLocation,
    debug: bool,
}

impl Database {
    pub fn open(location: DatabaseLocation, opt: &CommonOpt) -> Result<Self> {
        if let DatabaseLocation::Path(path) = &location {
            fs::create_dir_all(path)?;
        }
        let config = opt.config()?;
        let rt = opt.runtime_env_builder()?.build_arc()?;
        let ctx = SessionContext::new_with_config_rt(config, rt).enable_url_table();
        info!(
            "Opened {location} database with {} target partitions",
            ctx.copied_config().target_partitions()
        );
        Ok(Self {
            ctx,
            location,
            debug: opt.debug,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        self.ctx.table_exist(name)
    }

    /// Make sure every table in `tables` exists, loading missing ones from
    /// `source`. With `update_table` set, existing tables are dropped and
    /// reloaded.
    pub async fn ensure_tables(
        &self,
        tables: &[TableSchema],
        source: &TableSource,
        update_table: bool,
    ) -> Result<()> {
        for table in tables {
            self.ensure_table(table, source, update_table).await?;
        }
        Ok(())
    }

    /// Returns true when the table was (re)loaded from `source`
    pub async fn ensure_table(
        &self,
        table: &TableSchema,
        source: &TableSource,
        update_table: bool,
    ) -> Result<bool> {
        if update_table {
            self.drop_table(table.name)?;
        }
        if self.table_exists(table.name)? {
            debug!("Table '{}' already exists", table.name);
            return Ok(false);
        }
        if !source.direct_scan {
            if let Some(persisted) = self.persisted_path(table.name) {
                if persisted.exists() {
                    debug!("Registering persisted table {}", persisted.display());
                    self.ctx
                        .register_parquet(
                            table.name,
                            path_str(&persisted)?,
                            ParquetReadOptions::default(),
                        )
                        .await?;
                    return Ok(false);
                }
            }
        }
        self.create_table(table, source).await?;
        Ok(true)
    }

    /// Drop `name`. Dropping a table that does not exist does nothing.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        if self.ctx.deregister_table(name)?.is_some() {
            debug!("Dropped table '{name}'");
        }
        if let Some(persisted) = self.persisted_path(name) {
            if persisted.exists() {
                fs::remove_file(&persisted)?;
                debug!("Removed {}", persisted.display());
            }
        }
        Ok(())
    }

    /// Run `sql` and collect the results, printing the plans in debug mode
    pub async fn execute_query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let debug = self.debug;
        let plan = self.ctx.sql(sql).await?;
        let (state, plan) = plan.into_parts();

        if debug {
            println!("=== Logical plan ===\n{plan}\n");
        }

        let plan = state.optimize(&plan)?;
        if debug {
            println!("=== Optimized logical plan ===\n{plan}\n");
        }
        let physical_plan = state.create_physical_plan(&plan).await?;
        if debug {
            println!(
                "=== Physical plan ===\n{}\n",
                displayable(physical_plan.as_ref()).indent(true)
            );
        }
        let result = collect(Arc::clone(&physical_plan), state.task_ctx()).await?;
        if debug {
            println!(
                "=== Physical plan with metrics ===\n{}\n",
                DisplayableExecutionPlan::with_metrics(physical_plan.as_ref())
                    .indent(true)
            );
        }
        Ok(result)
    }

    fn persisted_path(&self, table: &str) -> Option<PathBuf> {
        match &self.location {
            DatabaseLocation::Memory => None,
            DatabaseLocation::Path(folder) => {
                Some(folder.join(format!("{table}.parquet")))
            }
        }
    }

    async fn create_table(&self, table: &TableSchema, source: &TableSource) -> Result<()> {
        let path = source.path(table.name);
        if !path.exists() {
            return plan_err!(
                "Data file {} for table '{}' not found",
                path.display(),
                table.name
            );
        }

        debug!("{} FROM {}", table.create_table_sql(), path.display());
        let df = self.read_table(table, source).await?;
        if source.direct_scan {
            info!("Scanning {} in place as '{}'", path.display(), table.name);
            self.ctx.register_table(table.name, df.into_view())?;
            return Ok(());
        }

        let start = Instant::now();
        match self.persisted_path(table.name) {
            None => {
                let schema = Arc::clone(df.schema().inner());
                let partitions = df.collect_partitioned().await?;
                let memtable = MemTable::try_new(schema, partitions)?;
                self.ctx.register_table(table.name, Arc::new(memtable))?;
            }
            Some(persisted) => {
                let target = path_str(&persisted)?;
                df.write_parquet(
                    target,
                    DataFrameWriteOptions::new().with_single_file_output(true),
                    None,
                )
                .await?;
                self.ctx
                    .register_parquet(table.name, target, ParquetReadOptions::default())
                    .await?;
            }
        }
        println!(
            "Loaded table '{}' from {} in {} ms",
            table.name,
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Read `table` from `source` without registering it
    pub async fn read_table(
        &self,
        table: &TableSchema,
        source: &TableSource,
    ) -> Result<DataFrame> {
        let path = source.path(table.name);
        let path = path_str(&path)?;
        let extension = format!(".{}", source.format.extension());
        match source.format {
            SourceFormat::Parquet => {
                self.ctx
                    .read_parquet(path, ParquetReadOptions::default())
                    .await
            }
            SourceFormat::Csv => {
                let schema = table.arrow_schema();
                let options = CsvReadOptions::new()
                    .has_header(true)
                    .schema(&schema)
                    .file_extension(&extension);
                self.ctx.read_csv(path, options).await
            }
            SourceFormat::Tbl | SourceFormat::Dat => {
                let schema = table.delimited_schema();
                let options = CsvReadOptions::new()
                    .has_header(false)
                    .delimiter(b'|')
                    .schema(&schema)
                    .file_extension(&extension);
                let columns = table.column_names().collect::<Vec<_>>();
                self.ctx.read_csv(path, options).await?.select_columns(&columns)
            }
        }
    }
}

#[async_trait]
impl QueryEngine for Database {
    async fn execute(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        self.execute_query(sql).await
    }

    async fn execute_suspend(
        &self,
        sql: &str,
        options: &SuspendOptions,
    ) -> Result<QueryOutcome> {
        let suspend_after = options.sample_suspend_point(&mut rand::thread_rng());
        info!(
            "Suspending after {:.3}s (window [{}, {}])",
            suspend_after.as_secs_f64(),
            options.start,
            options.end
        );

        let start = Instant::now();
        let df = self.ctx.sql(sql).await?;
        let task_ctx = Arc::new(df.task_ctx());
        let plan = df.create_physical_plan().await?;
        let streams = if options.partitioned {
            execute_stream_partitioned(plan, task_ctx)?
        } else {
            vec![execute_stream(plan, task_ctx)?]
        };

        let mut progress = (0..streams.len())
            .map(PartitionProgress::new)
            .collect::<Vec<_>>();
        let mut merged = select_all(streams.into_iter().enumerate().map(|(i, s)| {
            s.map(move |batch| (i, Some(batch)))
                .chain(stream::once(async move { (i, None) }))
                .boxed()
        }));

        let deadline = tokio::time::sleep(suspend_after);
        tokio::pin!(deadline);
        let mut batches = vec![];
        loop {
            if start.elapsed() >= suspend_after {
                break;
            }
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                next = merged.next() => match next {
                    Some((i, Some(batch))) => {
                        let batch = batch?;
                        progress[i].rows += batch.num_rows();
                        progress[i].batches += 1;
                        batches.push(batch);
                    }
                    Some((i, None)) => progress[i].finished = true,
                    None => return Ok(QueryOutcome::Completed(batches)),
                }
            }
        }

        // dropping the streams cancels the running plan
        drop(merged);
        let suspended_after = start.elapsed();
        let checkpoint = Checkpoint::new(
            sql,
            suspended_after,
            self.ctx.copied_config().target_partitions(),
            progress,
        );
        let files = checkpoint.write(&options.location, options.partitioned)?;
        println!(
            "Query suspended after {:.3}s, checkpoint written to {}",
            suspended_after.as_secs_f64(),
            options.location.display()
        );
        Ok(QueryOutcome::Suspended(SuspendReport {
            location: options.location.clone(),
            files,
            suspended_after,
            rows: checkpoint.rows(),
        }))
    }

    async fn execute_resume(
        &self,
        sql: &str,
        options: &ResumeOptions,
    ) -> Result<QueryOutcome> {
        let checkpoint = Checkpoint::load(&options.location, options.partitioned)?;
        checkpoint.verify(sql)?;
        let target_partitions = self.ctx.copied_config().target_partitions();
        if checkpoint.target_partitions != target_partitions {
            warn!(
                "Checkpoint was written with {} target partitions, resuming with {}",
                checkpoint.target_partitions, target_partitions
            );
        }
        info!(
            "Resuming query suspended after {} ms with {} rows produced",
            checkpoint.suspended_after_ms,
            checkpoint.rows()
        );
        // the engine keeps no operator state, so the query restarts from its
        // first batch
        let batches = self.execute_query(sql).await?;
        Ok(QueryOutcome::Completed(batches))
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        DataFusionError::Configuration(format!(
            "Path {} is not valid UTF-8",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    const REGION: TableSchema = TableSchema {
        name: "region",
        columns: &[
            ("r_regionkey", ColumnType::BigInt),
            ("r_name", ColumnType::Varchar),
            ("r_comment", ColumnType::Varchar),
        ],
    };

    fn write_region(folder: &Path) -> Result<()> {
        fs::write(
            folder.join("region.tbl"),
            "0|AFRICA|lar deposits|\n1|AMERICA|hs use ironic|\n2|ASIA|ges. thinly|\n",
        )?;
        Ok(())
    }

    #[test]
    fn parse_location() {
        assert_eq!(DatabaseLocation::parse("memory"), DatabaseLocation::Memory);
        assert_eq!(DatabaseLocation::parse(":memory:"), DatabaseLocation::Memory);
        assert_eq!(
            DatabaseLocation::parse("tpch.db"),
            DatabaseLocation::Path(PathBuf::from("tpch.db"))
        );
        assert!("".parse::<DatabaseLocation>().is_err());
    }

    #[test]
    fn parse_source_format() {
        assert_eq!("tbl".parse::<SourceFormat>(), Ok(SourceFormat::Tbl));
        assert!("orc".parse::<SourceFormat>().is_err());
        let source = TableSource::new("/data/sf1", SourceFormat::Dat);
        assert_eq!(source.path("store"), PathBuf::from("/data/sf1/store.dat"));
    }

    #[tokio::test]
    async fn load_tbl_into_memory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_region(dir.path())?;
        let db = Database::open(DatabaseLocation::Memory, &CommonOpt::default())?;
        let source = TableSource::new(dir.path(), SourceFormat::Tbl);

        assert!(db.ensure_table(&REGION, &source, false).await?);
        assert!(!db.ensure_table(&REGION, &source, false).await?);

        let batches = db
            .execute_query("select count(*) as n, max(r_name) as m from region")
            .await?;
        let n = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .unwrap()
            .value(0);
        assert_eq!(n, 3);
        assert_eq!(batches[0].schema().fields().len(), 2);

        let schema = db.context().table("region").await?.schema().clone();
        assert_eq!(schema.fields().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn update_reloads_and_drop_missing_is_noop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_region(dir.path())?;
        let db = Database::open(DatabaseLocation::Memory, &CommonOpt::default())?;
        let source = TableSource::new(dir.path(), SourceFormat::Tbl);

        db.drop_table("region")?;
        db.ensure_table(&REGION, &source, false).await?;
        assert!(db.ensure_table(&REGION, &source, true).await?);
        assert!(db.table_exists("region")?);
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db = Database::open(DatabaseLocation::Memory, &CommonOpt::default())?;
        let source = TableSource::new(dir.path(), SourceFormat::Parquet);
        let err = db.ensure_table(&REGION, &source, false).await.unwrap_err();
        assert!(err.to_string().contains("region.parquet"), "{err}");
        Ok(())
    }
}
