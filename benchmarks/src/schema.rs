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

//! Static table definitions shared by the TPC-H and TPC-DS catalogs.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::common::plan_err;
use datafusion::error::Result;

/// Name of the trailing column produced by the `|` that dbgen and dsdgen
/// write at the end of every line.
pub const DELIMITED_PLACEHOLDER: &str = "__placeholder";

/// Primitive column types used by the benchmark schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Double,
    Decimal(u8, i8),
    Varchar,
    Date,
}

impl ColumnType {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int32,
            ColumnType::BigInt => DataType::Int64,
            ColumnType::Double => DataType::Float64,
            ColumnType::Decimal(precision, scale) => {
                DataType::Decimal128(*precision, *scale)
            }
            ColumnType::Varchar => DataType::Utf8,
            ColumnType::Date => DataType::Date32,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Double => write!(f, "DOUBLE"),
            ColumnType::Decimal(precision, scale) => {
                write!(f, "DECIMAL({precision}, {scale})")
            }
            ColumnType::Varchar => write!(f, "VARCHAR"),
            ColumnType::Date => write!(f, "DATE"),
        }
    }
}

/// An ordered list of `(column, type)` pairs for one benchmark table
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [(&'static str, ColumnType)],
}

impl TableSchema {
    /// Render the column list of a `CREATE TABLE` statement, e.g.
    /// `(r_regionkey BIGINT, r_name VARCHAR, r_comment VARCHAR)`
    pub fn ddl(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("({columns})")
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table
    pub fn create_table_sql(&self) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} {}", self.name, self.ddl())
    }

    /// The Arrow schema of the table. Every column is nullable since
    /// dsdgen leaves optional foreign keys empty.
    pub fn arrow_schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|(name, ty)| Field::new(*name, ty.data_type(), true))
                .collect::<Vec<_>>(),
        )
    }

    /// The schema of the raw `|` delimited file, which carries one extra
    /// empty column at the end of each line
    pub fn delimited_schema(&self) -> Schema {
        let mut fields = self
            .columns
            .iter()
            .map(|(name, ty)| Field::new(*name, ty.data_type(), true))
            .collect::<Vec<_>>();
        fields.push(Field::new(DELIMITED_PLACEHOLDER, DataType::Utf8, true));
        Schema::new(fields)
    }

    pub fn schema_ref(&self) -> SchemaRef {
        Arc::new(self.arrow_schema())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(name, _)| *name)
    }
}

/// Find a table by name in one of the static catalogs
pub fn find_table<'a>(
    tables: &'a [TableSchema],
    name: &str,
) -> Result<&'a TableSchema> {
    match tables.iter().find(|t| t.name == name) {
        Some(table) => Ok(table),
        None => plan_err!(
            "unknown table '{name}'. Available tables: {}",
            tables.iter().map(|t| t.name).collect::<Vec<_>>().join(", ")
        ),
    }
}
