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

//! Tiny dbgen style data sets shared by the integration tests

use std::fs;
use std::path::Path;

use datafusion::error::Result;
use ratchet_benchmarks::schema::{ColumnType, TableSchema};
use ratchet_benchmarks::tpch::TPCH_TABLES;

pub const LINEITEM_ROWS: usize = 5;
pub const OTHER_ROWS: usize = 3;

pub fn rows_of(table: &TableSchema) -> usize {
    if table.name == "lineitem" {
        LINEITEM_ROWS
    } else {
        OTHER_ROWS
    }
}

fn value(ty: &ColumnType, row: usize) -> String {
    match ty {
        ColumnType::Integer | ColumnType::BigInt => row.to_string(),
        ColumnType::Double => format!("{row}.5"),
        ColumnType::Decimal(_, _) => format!("{}.25", 100 * row + 7),
        ColumnType::Varchar => format!("text {row}"),
        ColumnType::Date => format!("1995-0{}-1{row}", row % 9 + 1),
    }
}

/// Write `{table}.tbl` for `table` into `folder`, every line ending with `|`
pub fn write_tbl(folder: &Path, table: &TableSchema) -> Result<()> {
    write_delimited(folder, table, "tbl")
}

/// Write `{table}.dat` in the dsdgen layout
pub fn write_dat(folder: &Path, table: &TableSchema) -> Result<()> {
    write_delimited(folder, table, "dat")
}

fn write_delimited(folder: &Path, table: &TableSchema, extension: &str) -> Result<()> {
    let mut text = String::new();
    for row in 0..rows_of(table) {
        for (_, ty) in table.columns {
            text.push_str(&value(ty, row));
            text.push('|');
        }
        text.push('\n');
    }
    fs::write(folder.join(format!("{}.{extension}", table.name)), text)?;
    Ok(())
}

/// Write every TPC-H table into `folder`
pub fn write_tpch_tbl(folder: &Path) -> Result<()> {
    for table in TPCH_TABLES {
        write_tbl(folder, table)?;
    }
    Ok(())
}
