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

//! Benchmark derived from TPC-H. This is not an official TPC-H benchmark.

use crate::catalog::QueryText;
use crate::schema::{ColumnType, TableSchema};
use datafusion::common::plan_err;
use datafusion::error::Result;

mod run;
pub use run::RunOpt;

use ColumnType::*;

pub const TPCH_QUERY_START_ID: usize = 1;
pub const TPCH_QUERY_END_ID: usize = 22;

const MONEY: ColumnType = Decimal(15, 2);

pub const TPCH_TABLES: &[TableSchema] = &[
    TableSchema {
        name: "part",
        columns: &[
            ("p_partkey", BigInt),
            ("p_name", Varchar),
            ("p_mfgr", Varchar),
            ("p_brand", Varchar),
            ("p_type", Varchar),
            ("p_size", Integer),
            ("p_container", Varchar),
            ("p_retailprice", MONEY),
            ("p_comment", Varchar),
        ],
    },
    TableSchema {
        name: "supplier",
        columns: &[
            ("s_suppkey", BigInt),
            ("s_name", Varchar),
            ("s_address", Varchar),
            ("s_nationkey", BigInt),
            ("s_phone", Varchar),
            ("s_acctbal", MONEY),
            ("s_comment", Varchar),
        ],
    },
    TableSchema {
        name: "partsupp",
        columns: &[
            ("ps_partkey", BigInt),
            ("ps_suppkey", BigInt),
            ("ps_availqty", Integer),
            ("ps_supplycost", MONEY),
            ("ps_comment", Varchar),
        ],
    },
    TableSchema {
        name: "customer",
        columns: &[
            ("c_custkey", BigInt),
            ("c_name", Varchar),
            ("c_address", Varchar),
            ("c_nationkey", BigInt),
            ("c_phone", Varchar),
            ("c_acctbal", MONEY),
            ("c_mktsegment", Varchar),
            ("c_comment", Varchar),
        ],
    },
    TableSchema {
        name: "orders",
        columns: &[
            ("o_orderkey", BigInt),
            ("o_custkey", BigInt),
            ("o_orderstatus", Varchar),
            ("o_totalprice", MONEY),
            ("o_orderdate", Date),
            ("o_orderpriority", Varchar),
            ("o_clerk", Varchar),
            ("o_shippriority", Integer),
            ("o_comment", Varchar),
        ],
    },
    TableSchema {
        name: "lineitem",
        columns: &[
            ("l_orderkey", BigInt),
            ("l_partkey", BigInt),
            ("l_suppkey", BigInt),
            ("l_linenumber", Integer),
            ("l_quantity", MONEY),
            ("l_extendedprice", MONEY),
            ("l_discount", MONEY),
            ("l_tax", MONEY),
            ("l_returnflag", Varchar),
            ("l_linestatus", Varchar),
            ("l_shipdate", Date),
            ("l_commitdate", Date),
            ("l_receiptdate", Date),
            ("l_shipinstruct", Varchar),
            ("l_shipmode", Varchar),
            ("l_comment", Varchar),
        ],
    },
    TableSchema {
        name: "nation",
        columns: &[
            ("n_nationkey", BigInt),
            ("n_name", Varchar),
            ("n_regionkey", BigInt),
            ("n_comment", Varchar),
        ],
    },
    TableSchema {
        name: "region",
        columns: &[
            ("r_regionkey", BigInt),
            ("r_name", Varchar),
            ("r_comment", Varchar),
        ],
    },
];

const TPCH_QUERIES: [&str; TPCH_QUERY_END_ID] = [
    include_str!("../../queries/tpch/q1.sql"),
    include_str!("../../queries/tpch/q2.sql"),
    include_str!("../../queries/tpch/q3.sql"),
    include_str!("../../queries/tpch/q4.sql"),
    include_str!("../../queries/tpch/q5.sql"),
    include_str!("../../queries/tpch/q6.sql"),
    include_str!("../../queries/tpch/q7.sql"),
    include_str!("../../queries/tpch/q8.sql"),
    include_str!("../../queries/tpch/q9.sql"),
    include_str!("../../queries/tpch/q10.sql"),
    include_str!("../../queries/tpch/q11.sql"),
    include_str!("../../queries/tpch/q12.sql"),
    include_str!("../../queries/tpch/q13.sql"),
    include_str!("../../queries/tpch/q14.sql"),
    include_str!("../../queries/tpch/q15.sql"),
    include_str!("../../queries/tpch/q16.sql"),
    include_str!("../../queries/tpch/q17.sql"),
    include_str!("../../queries/tpch/q18.sql"),
    include_str!("../../queries/tpch/q19.sql"),
    include_str!("../../queries/tpch/q20.sql"),
    include_str!("../../queries/tpch/q21.sql"),
    include_str!("../../queries/tpch/q22.sql"),
];

/// Get the catalog entry for a TPC-H query
pub fn get_query(query: usize) -> Result<QueryText> {
    if (TPCH_QUERY_START_ID..=TPCH_QUERY_END_ID).contains(&query) {
        QueryText::parse(format!("q{query}"), TPCH_QUERIES[query - 1])
    } else {
        plan_err!("invalid query. Expected value between 1 and 22")
    }
}

/// Get the SQL statements of a TPC-H query
pub fn get_query_sql(query: usize) -> Result<Vec<String>> {
    Ok(get_query(query)?.statements().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::datasource::MemTable;
    use datafusion::prelude::{SessionConfig, SessionContext};
    use std::sync::Arc;

    #[test]
    fn every_query_has_a_result_statement() {
        for query in TPCH_QUERY_START_ID..=TPCH_QUERY_END_ID {
            let text = get_query(query).unwrap();
            assert!(
                text.result_statement().starts_with("select"),
                "q{query} does not end with a select"
            );
        }
    }

    #[test]
    fn q15_creates_a_view_first() {
        let q15 = get_query(15).unwrap();
        assert_eq!(q15.statements().len(), 2);
        assert!(q15.setup()[0].starts_with("create or replace view revenue0"));
    }

    #[test]
    fn out_of_range_query() {
        assert!(get_query(0).is_err());
        assert!(get_query(23).is_err());
    }

    #[test]
    fn table_catalog() {
        let names: Vec<_> = TPCH_TABLES.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "part", "supplier", "partsupp", "customer", "orders", "lineitem",
                "nation", "region"
            ]
        );
        let lineitem = crate::schema::find_table(TPCH_TABLES, "lineitem").unwrap();
        assert_eq!(lineitem.columns.len(), 16);
    }

    async fn run_query(n: usize) -> Result<()> {
        // Tests running query with empty tables, to see whether they run successfully.
        let config = SessionConfig::new()
            .with_target_partitions(1)
            .with_batch_size(10);
        let ctx = SessionContext::new_with_config(config);

        for table in TPCH_TABLES {
            let provider = MemTable::try_new(table.schema_ref(), vec![vec![]])?;
            ctx.register_table(table.name, Arc::new(provider))?;
        }

        for sql in get_query_sql(n)? {
            ctx.sql(&sql).await?.collect().await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn run_all_queries_on_empty_tables() -> Result<()> {
        for query in TPCH_QUERY_START_ID..=TPCH_QUERY_END_ID {
            run_query(query).await?;
        }
        Ok(())
    }
}
