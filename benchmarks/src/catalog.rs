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

//! Query catalog entries and placeholder substitution.

use datafusion::common::plan_err;
use datafusion::error::Result;

/// Token replaced by the data folder before a query is executed
pub const DATA_PATH_TOKEN: &str = "TPCH_DATAPATH";
/// Token replaced by the scale factor string (e.g. `sf1`)
pub const SCALE_FACTOR_TOKEN: &str = "SCALEFACTOR";

/// Values substituted into catalog templates
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    data_path: Option<String>,
    scale_factor: Option<String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_path(mut self, data_path: impl Into<String>) -> Self {
        let data_path: String = data_path.into();
        self.data_path = Some(data_path.trim_end_matches('/').to_string());
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: impl Into<String>) -> Self {
        self.scale_factor = Some(scale_factor.into());
        self
    }

    /// Replace every known token that has a value. Tokens without a value
    /// are left untouched so the engine reports the unresolved path.
    pub fn apply(&self, sql: &str) -> String {
        let mut sql = sql.to_string();
        if let Some(data_path) = &self.data_path {
            sql = sql.replace(DATA_PATH_TOKEN, data_path);
        }
        if let Some(scale_factor) = &self.scale_factor {
            sql = sql.replace(SCALE_FACTOR_TOKEN, scale_factor);
        }
        sql
    }
}

/// Split a catalog text into statements on `;`, dropping fragments that
/// hold nothing but whitespace or `--` comments
pub fn split_statements(text: &str) -> Vec<String> {
    text.split(';')
        .map(|s| s.trim())
        .filter(|s| !is_blank_or_comment(s))
        .map(|s| s.to_string())
        .collect()
}

fn is_blank_or_comment(fragment: &str) -> bool {
    fragment
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// One catalog entry. All statements but the last are run for their side
/// effects (e.g. `CREATE VIEW`), the last one produces the result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryText {
    id: String,
    statements: Vec<String>,
}

impl QueryText {
    pub fn parse(id: impl Into<String>, text: &str) -> Result<Self> {
        let id = id.into();
        let statements = split_statements(text);
        if statements.is_empty() {
            return plan_err!("query {id} does not contain any SQL statement");
        }
        Ok(Self { id, statements })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Statements executed only for their side effects
    pub fn setup(&self) -> &[String] {
        &self.statements[..self.statements.len() - 1]
    }

    /// The statement whose result is fetched
    pub fn result_statement(&self) -> &str {
        // parse() rejects texts without statements
        &self.statements[self.statements.len() - 1]
    }

    pub fn render(&self, substitutions: &Substitutions) -> Self {
        Self {
            id: self.id.clone(),
            statements: self
                .statements
                .iter()
                .map(|s| substitutions.apply(s))
                .collect(),
        }
    }
}

/// Parse a query id such as `q7` or `7` and check it against the catalog
/// range
pub fn parse_query_id(id: &str, max: usize) -> Result<usize> {
    let digits = id.trim().trim_start_matches(['q', 'Q']);
    match digits.parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => plan_err!("invalid query '{id}'. Expected q1 to q{max}"),
    }
}
