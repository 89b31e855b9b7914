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

mod common;

use std::fs;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use datafusion::error::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratchet_benchmarks::database::{
    Database, DatabaseLocation, SourceFormat, TableSource,
};
use ratchet_benchmarks::engine::{
    run_statements, ExecutionMode, QueryEngine, QueryOutcome,
};
use ratchet_benchmarks::ratchet::{
    Checkpoint, RatchetOptions, ResumeOptions, SuspendOptions,
};
use ratchet_benchmarks::tpch::{get_query, TPCH_TABLES};
use ratchet_benchmarks::util::{format_results, CommonOpt};
use rstest::rstest;

#[ctor::ctor]
fn init() {
    // Enable RUST_LOG logging configuration for tests
    let _ = env_logger::try_init();
}

const SQL: &str = "select l_orderkey, l_quantity from lineitem order by l_orderkey";

async fn tpch_db(data: &Path, threads: usize) -> Result<Database> {
    fs::create_dir_all(data)?;
    common::write_tpch_tbl(data)?;
    let opt = CommonOpt {
        threads,
        ..Default::default()
    };
    let db = Database::open(DatabaseLocation::Memory, &opt)?;
    db.ensure_tables(TPCH_TABLES, &TableSource::new(data, SourceFormat::Tbl), false)
        .await?;
    Ok(db)
}

fn completed(outcome: QueryOutcome) -> Vec<RecordBatch> {
    match outcome {
        QueryOutcome::Completed(batches) => batches,
        QueryOutcome::Suspended(report) => panic!("unexpected suspension: {report:?}"),
    }
}

#[tokio::test]
async fn suspend_then_resume_single_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(dir.path(), 1).await?;
    let location = dir.path().join("q.ratchet");

    let suspend = SuspendOptions::try_new(&location, 0.0, 0.0, false)?;
    let report = match db.execute_suspend(SQL, &suspend).await? {
        QueryOutcome::Suspended(report) => report,
        QueryOutcome::Completed(_) => panic!("a zero suspend window always suspends"),
    };
    assert_eq!(report.files, vec![location.clone()]);
    assert!(location.is_file());

    let checkpoint = Checkpoint::load(&location, false)?;
    checkpoint.verify(SQL)?;
    assert_eq!(checkpoint.target_partitions, 1);

    let resumed = db
        .execute_resume(SQL, &ResumeOptions::new(&location, false))
        .await?;
    let expected = db.execute(SQL).await?;
    assert_eq!(
        format_results(&completed(resumed), None)?,
        format_results(&expected, None)?
    );
    Ok(())
}

#[tokio::test]
async fn partitioned_checkpoint_folder() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(&dir.path().join("data"), 2).await?;
    let location = dir.path().join("q1-ckpt");
    let sql = "select l_returnflag, count(*) from lineitem group by l_returnflag";

    let suspend = SuspendOptions::try_new(&location, 0.0, 0.0, true)?;
    let outcome = db.execute_suspend(sql, &suspend).await?;
    assert!(outcome.is_suspended());
    assert!(location.is_dir());

    let names = fs::read_dir(&location)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    assert!(!names.is_empty());
    assert!(names.contains(&"part-0.ratchet".to_string()), "{names:?}");
    for name in &names {
        assert!(name.starts_with("part-") && name.ends_with(".ratchet"), "{name}");
    }

    // unrelated files in the folder are ignored
    fs::write(location.join("README"), "checkpoint folder")?;
    let resumed = db
        .execute_resume(sql, &ResumeOptions::new(&location, true))
        .await?;
    assert!(!resumed.is_suspended());
    Ok(())
}

#[tokio::test]
async fn reused_partitioned_folder_holds_only_latest_query() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(&dir.path().join("data"), 4).await?;
    let location = dir.path().join("ckpt");
    let suspend = SuspendOptions::try_new(&location, 0.0, 0.0, true)?;

    let grouped = "select l_returnflag, count(*) from lineitem group by l_returnflag";
    assert!(db.execute_suspend(grouped, &suspend).await?.is_suspended());
    let before = fs::read_dir(&location)?.count();

    assert!(db.execute_suspend(SQL, &suspend).await?.is_suspended());
    let after = fs::read_dir(&location)?.count();
    assert!(after <= before, "{after} > {before}");

    let checkpoint = Checkpoint::load(&location, true)?;
    checkpoint.verify(SQL)?;
    assert_eq!(checkpoint.partitions.len(), after);

    let resumed = db
        .execute_resume(SQL, &ResumeOptions::new(&location, true))
        .await?;
    let rows: usize = completed(resumed).iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, common::LINEITEM_ROWS);
    Ok(())
}

#[tokio::test]
async fn wide_window_runs_to_completion() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(dir.path(), 1).await?;
    let location = dir.path().join("never.ratchet");

    let suspend = SuspendOptions::try_new(&location, 600.0, 900.0, false)?;
    let batches = completed(db.execute_suspend(SQL, &suspend).await?);
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, common::LINEITEM_ROWS);
    assert!(!location.exists());
    Ok(())
}

#[tokio::test]
async fn resume_rejects_other_query_and_missing_checkpoint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(dir.path(), 1).await?;
    let location = dir.path().join("q.ratchet");

    let err = db
        .execute_resume(SQL, &ResumeOptions::new(&location, false))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No checkpoint"), "{err}");

    let suspend = SuspendOptions::try_new(&location, 0.0, 0.0, false)?;
    db.execute_suspend(SQL, &suspend).await?;
    let err = db
        .execute_resume("select 1", &ResumeOptions::new(&location, false))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("different query"), "{err}");

    // whitespace differences do not matter
    let reformatted = SQL.replace(' ', "\n    ");
    db.execute_resume(&reformatted, &ResumeOptions::new(&location, false))
        .await?;
    Ok(())
}

#[tokio::test]
async fn ratchet_with_certain_suspension() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(dir.path(), 1).await?;
    let location = dir.path().join("ratchet");
    let suspend = SuspendOptions::try_new(&location, 0.0, 0.0, false)?;
    let mode = ExecutionMode::Ratchet(RatchetOptions::try_new(suspend, 1.0)?);
    let mut rng = StdRng::seed_from_u64(11);

    let outcome = run_statements(&db, &[SQL.to_string()], &mode, &mut rng).await?;
    assert!(outcome.is_suspended());
    assert!(location.is_file());
    Ok(())
}

#[tokio::test]
async fn on_disk_database_keeps_tables() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");
    fs::create_dir(&data)?;
    common::write_tpch_tbl(&data)?;
    let db_path = dir.path().join("tpch.db");
    let source = TableSource::new(&data, SourceFormat::Tbl);

    {
        let location = DatabaseLocation::Path(db_path.clone());
        let db = Database::open(location, &CommonOpt::default())?;
        db.ensure_tables(TPCH_TABLES, &source, false).await?;
    }
    for table in TPCH_TABLES {
        assert!(db_path.join(format!("{}.parquet", table.name)).is_file());
    }

    // a later run finds the tables without touching the raw data
    fs::remove_file(data.join("nation.tbl"))?;
    let db = Database::open(DatabaseLocation::Path(db_path), &CommonOpt::default())?;
    let nation = TPCH_TABLES.iter().find(|t| t.name == "nation").unwrap();
    assert!(!db.ensure_table(nation, &source, false).await?);
    let batches = db.execute("select count(*) from nation").await?;
    assert_eq!(batches[0].num_rows(), 1);

    // updating drops the persisted copy and reloads it from the raw data
    let region = TPCH_TABLES.iter().find(|t| t.name == "region").unwrap();
    assert!(db.ensure_table(region, &source, true).await?);
    assert!(db.ensure_table(nation, &source, true).await.is_err());
    Ok(())
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(6)]
#[case(13)]
#[case(15)]
#[case(18)]
#[tokio::test]
async fn tpch_queries_on_tiny_data(#[case] query: usize) -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = tpch_db(dir.path(), 2).await?;
    let query = get_query(query)?;
    let mut rng = StdRng::seed_from_u64(0);
    run_statements(&db, query.statements(), &ExecutionMode::Normal, &mut rng).await?;
    Ok(())
}
