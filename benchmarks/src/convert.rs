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

//! Export benchmark tables to CSV or Parquet files

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::WriterBuilder;
use datafusion::error::{DataFusionError, Result};
use futures::StreamExt;
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use structopt::StructOpt;

use crate::database::{Database, DatabaseLocation, SourceFormat, TableSource};
use crate::schema::{find_table, TableSchema};
use crate::util::CommonOpt;

/// Convert raw benchmark data into CSV or Parquet files
#[derive(Debug, StructOpt)]
pub struct ConvertOpt {
    /// Table to convert. If not specified, converts every table
    #[structopt(long = "table")]
    table: Option<String>,

    /// Path to the raw data files
    #[structopt(parse(from_os_str), required = true, short = "d", long = "data-folder")]
    data_folder: PathBuf,

    /// Output path
    #[structopt(parse(from_os_str), required = true, short = "o", long = "output")]
    output_path: PathBuf,

    /// Output file format: `csv` or `parquet`
    #[structopt(short = "f", long = "format")]
    file_format: OutputFormat,

    /// Maximum number of rows in a Parquet row group
    #[structopt(short = "g", long = "row-group-size")]
    row_group_size: Option<usize>,

    /// Compression to use when writing Parquet files
    #[structopt(short = "c", long = "compression", default_value = "zstd")]
    compression: String,

    /// Common options
    #[structopt(flatten)]
    common: CommonOpt,
}

impl ConvertOpt {
    /// Convert the `source_format` files of `tables`
    pub async fn run(
        self,
        tables: &[TableSchema],
        source_format: SourceFormat,
    ) -> Result<Vec<ExportedTable>> {
        let options = ExportOptions {
            output_folder: self.output_path.clone(),
            format: self.file_format,
            row_group_size: self.row_group_size,
            compression: parse_compression(&self.compression)?,
        };
        let tables = match &self.table {
            Some(name) => vec![*find_table(tables, name)?],
            None => tables.to_vec(),
        };

        let db = Database::open(DatabaseLocation::Memory, &self.common)?;
        let source = TableSource::new(&self.data_folder, source_format);
        export_tables(&db, &tables, &source, &options).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            other => Err(format!(
                "Invalid output format '{other}', expected csv or parquet"
            )),
        }
    }
}

/// Parse the name of a Parquet compression codec
pub fn parse_compression(name: &str) -> Result<Compression> {
    Ok(match name {
        "none" => Compression::UNCOMPRESSED,
        "snappy" => Compression::SNAPPY,
        "brotli" => Compression::BROTLI(Default::default()),
        "gzip" => Compression::GZIP(Default::default()),
        "lz4" => Compression::LZ4,
        "lzo" => Compression::LZO,
        "zstd" => Compression::ZSTD(Default::default()),
        other => {
            return Err(DataFusionError::NotImplemented(format!(
                "Invalid compression format: {other}"
            )));
        }
    })
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_folder: PathBuf,
    pub format: OutputFormat,
    /// Maximum number of rows per Parquet row group
    pub row_group_size: Option<usize>,
    pub compression: Compression,
}

impl ExportOptions {
    fn validate(&self) -> Result<()> {
        if self.format == OutputFormat::Parquet {
            match self.row_group_size {
                None => {
                    return Err(DataFusionError::Configuration(
                        "Please indicate row group size for parquet".to_string(),
                    ))
                }
                Some(0) => {
                    return Err(DataFusionError::Configuration(
                        "Row group size must be greater than zero".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn writer_properties(&self) -> WriterProperties {
        let mut props = WriterProperties::builder().set_compression(self.compression);
        if let Some(row_group_size) = self.row_group_size {
            props = props.set_max_row_group_size(row_group_size);
        }
        props.build()
    }
}

/// One exported file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedTable {
    pub table: String,
    pub path: PathBuf,
    pub rows: usize,
    /// Only set for Parquet output
    pub row_groups: Option<usize>,
}

/// Export `tables` read from `source` into `{output_folder}/{table}.{ext}`
pub async fn export_tables(
    db: &Database,
    tables: &[TableSchema],
    source: &TableSource,
    options: &ExportOptions,
) -> Result<Vec<ExportedTable>> {
    options.validate()?;
    fs::create_dir_all(&options.output_folder)?;

    let mut exported = Vec::with_capacity(tables.len());
    for table in tables {
        let start = Instant::now();
        let path = options
            .output_folder
            .join(format!("{}.{}", table.name, options.format.extension()));
        println!(
            "Converting '{}' to {}",
            source.path(table.name).display(),
            path.display()
        );
        let rows = export_table(db, table, source, options, &path).await?;
        let row_groups = match options.format {
            OutputFormat::Parquet => {
                let n = count_row_groups(&path)?;
                println!("Number of row groups in {}.parquet: {n}", table.name);
                Some(n)
            }
            OutputFormat::Csv => None,
        };
        info!(
            "Exported {rows} rows of '{}' in {} ms",
            table.name,
            start.elapsed().as_millis()
        );
        exported.push(ExportedTable {
            table: table.name.to_string(),
            path,
            rows,
            row_groups,
        });
    }
    Ok(exported)
}

async fn export_table(
    db: &Database,
    table: &TableSchema,
    source: &TableSource,
    options: &ExportOptions,
    path: &Path,
) -> Result<usize> {
    let df = db.read_table(table, source).await?;
    let schema = Arc::clone(df.schema().inner());
    let mut stream = df.execute_stream().await?;
    let file = File::create(path)?;
    let mut rows = 0;

    match options.format {
        OutputFormat::Parquet => {
            let mut writer =
                ArrowWriter::try_new(file, schema, Some(options.writer_properties()))?;
            while let Some(batch) = stream.next().await {
                let batch = batch?;
                rows += batch.num_rows();
                writer.write(&batch)?;
            }
            writer.close()?;
        }
        OutputFormat::Csv => {
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .with_delimiter(b',')
                .build(file);
            while let Some(batch) = stream.next().await {
                let batch = batch?;
                rows += batch.num_rows();
                writer.write(&batch)?;
            }
        }
    }
    Ok(rows)
}

/// Number of row groups in the Parquet file at `path`
pub fn count_row_groups(path: &Path) -> Result<usize> {
    let reader = SerializedFileReader::new(File::open(path)?)?;
    Ok(reader.metadata().num_row_groups())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_names() {
        assert_eq!(parse_compression("snappy").unwrap(), Compression::SNAPPY);
        assert_eq!(parse_compression("none").unwrap(), Compression::UNCOMPRESSED);
        assert!(parse_compression("lz0").is_err());
    }

    #[test]
    fn parquet_requires_row_group_size() {
        let options = ExportOptions {
            output_folder: PathBuf::from("out"),
            format: OutputFormat::Parquet,
            row_group_size: None,
            compression: Compression::SNAPPY,
        };
        let err = options.validate().unwrap_err();
        assert!(matches!(err, DataFusionError::Configuration(_)));
        assert!(err.to_string().contains("row group size"), "{err}");

        let csv = ExportOptions {
            format: OutputFormat::Csv,
            ..options
        };
        assert!(csv.validate().is_ok());
    }
}
