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

use std::fs;
use std::path::Path;

use crate::catalog::QueryText;
use crate::schema::{ColumnType, TableSchema};
use datafusion::common::plan_err;
use datafusion::error::Result;

mod run;
pub use run::RunOpt;

use ColumnType::*;

pub const TPCDS_QUERY_START_ID: usize = 1;
pub const TPCDS_QUERY_END_ID: usize = 99;

pub const TPCDS_TABLES: &[TableSchema] = &[
    TableSchema {
        name: "call_center",
        columns: &[
            ("cc_call_center_sk", Integer),
            ("cc_call_center_id", Varchar),
            ("cc_rec_start_date", Date),
            ("cc_rec_end_date", Date),
            ("cc_closed_date_sk", Integer),
            ("cc_open_date_sk", Integer),
            ("cc_name", Varchar),
            ("cc_class", Varchar),
            ("cc_employees", Integer),
            ("cc_sq_ft", Integer),
            ("cc_hours", Varchar),
            ("cc_manager", Varchar),
            ("cc_mkt_id", Integer),
            ("cc_mkt_class", Varchar),
            ("cc_mkt_desc", Varchar),
            ("cc_market_manager", Varchar),
            ("cc_division", Integer),
            ("cc_division_name", Varchar),
            ("cc_company", Integer),
            ("cc_company_name", Varchar),
            ("cc_street_number", Varchar),
            ("cc_street_name", Varchar),
            ("cc_street_type", Varchar),
            ("cc_suite_number", Varchar),
            ("cc_city", Varchar),
            ("cc_county", Varchar),
            ("cc_state", Varchar),
            ("cc_zip", Varchar),
            ("cc_country", Varchar),
            ("cc_gmt_offset", Double),
            ("cc_tax_percentage", Double),
        ],
    },
    TableSchema {
        name: "catalog_page",
        columns: &[
            ("cp_catalog_page_sk", Integer),
            ("cp_catalog_page_id", Varchar),
            ("cp_start_date_sk", Integer),
            ("cp_end_date_sk", Integer),
            ("cp_department", Varchar),
            ("cp_catalog_number", Integer),
            ("cp_catalog_page_number", Integer),
            ("cp_description", Varchar),
            ("cp_type", Varchar),
        ],
    },
    TableSchema {
        name: "catalog_returns",
        columns: &[
            ("cr_returned_date_sk", Integer),
            ("cr_returned_time_sk", Integer),
            ("cr_item_sk", Integer),
            ("cr_refunded_customer_sk", Integer),
            ("cr_refunded_cdemo_sk", Integer),
            ("cr_refunded_hdemo_sk", Integer),
            ("cr_refunded_addr_sk", Integer),
            ("cr_returning_customer_sk", Integer),
            ("cr_returning_cdemo_sk", Integer),
            ("cr_returning_hdemo_sk", Integer),
            ("cr_returning_addr_sk", Integer),
            ("cr_call_center_sk", Integer),
            ("cr_catalog_page_sk", Integer),
            ("cr_ship_mode_sk", Integer),
            ("cr_warehouse_sk", Integer),
            ("cr_reason_sk", Integer),
            ("cr_order_number", Integer),
            ("cr_return_quantity", Integer),
            ("cr_return_amount", Double),
            ("cr_return_tax", Double),
            ("cr_return_amt_inc_tax", Double),
            ("cr_fee", Double),
            ("cr_return_ship_cost", Double),
            ("cr_refunded_cash", Double),
            ("cr_reversed_charge", Double),
            ("cr_store_credit", Double),
            ("cr_net_loss", Double),
        ],
    },
    TableSchema {
        name: "catalog_sales",
        columns: &[
            ("cs_sold_date_sk", Integer),
            ("cs_sold_time_sk", Integer),
            ("cs_ship_date_sk", Integer),
            ("cs_bill_customer_sk", Integer),
            ("cs_bill_cdemo_sk", Integer),
            ("cs_bill_hdemo_sk", Integer),
            ("cs_bill_addr_sk", Integer),
            ("cs_ship_customer_sk", Integer),
            ("cs_ship_cdemo_sk", Integer),
            ("cs_ship_hdemo_sk", Integer),
            ("cs_ship_addr_sk", Integer),
            ("cs_call_center_sk", Integer),
            ("cs_catalog_page_sk", Integer),
            ("cs_ship_mode_sk", Integer),
            ("cs_warehouse_sk", Integer),
            ("cs_item_sk", Integer),
            ("cs_promo_sk", Integer),
            ("cs_order_number", Integer),
            ("cs_quantity", Integer),
            ("cs_wholesale_cost", Double),
            ("cs_list_price", Double),
            ("cs_sales_price", Double),
            ("cs_ext_discount_amt", Double),
            ("cs_ext_sales_price", Double),
            ("cs_ext_wholesale_cost", Double),
            ("cs_ext_list_price", Double),
            ("cs_ext_tax", Double),
            ("cs_coupon_amt", Double),
            ("cs_ext_ship_cost", Double),
            ("cs_net_paid", Double),
            ("cs_net_paid_inc_tax", Double),
            ("cs_net_paid_inc_ship", Double),
            ("cs_net_paid_inc_ship_tax", Double),
            ("cs_net_profit", Double),
        ],
    },
    TableSchema {
        name: "customer",
        columns: &[
            ("c_customer_sk", Integer),
            ("c_customer_id", Varchar),
            ("c_current_cdemo_sk", Integer),
            ("c_current_hdemo_sk", Integer),
            ("c_current_addr_sk", Integer),
            ("c_first_shipto_date_sk", Integer),
            ("c_first_sales_date_sk", Integer),
            ("c_salutation", Varchar),
            ("c_first_name", Varchar),
            ("c_last_name", Varchar),
            ("c_preferred_cust_flag", Varchar),
            ("c_birth_day", Integer),
            ("c_birth_month", Integer),
            ("c_birth_year", Integer),
            ("c_birth_country", Varchar),
            ("c_login", Varchar),
            ("c_email_address", Varchar),
            ("c_last_review_date_sk", Varchar),
        ],
    },
    TableSchema {
        name: "customer_address",
        columns: &[
            ("ca_address_sk", Integer),
            ("ca_address_id", Varchar),
            ("ca_street_number", Varchar),
            ("ca_street_name", Varchar),
            ("ca_street_type", Varchar),
            ("ca_suite_number", Varchar),
            ("ca_city", Varchar),
            ("ca_county", Varchar),
            ("ca_state", Varchar),
            ("ca_zip", Varchar),
            ("ca_country", Varchar),
            ("ca_gmt_offset", Double),
            ("ca_location_type", Varchar),
        ],
    },
    TableSchema {
        name: "customer_demographics",
        columns: &[
            ("cd_demo_sk", Integer),
            ("cd_gender", Varchar),
            ("cd_marital_status", Varchar),
            ("cd_education_status", Varchar),
            ("cd_purchase_estimate", Integer),
            ("cd_credit_rating", Varchar),
            ("cd_dep_count", Integer),
            ("cd_dep_employed_count", Integer),
            ("cd_dep_college_count", Integer),
        ],
    },
    TableSchema {
        name: "date_dim",
        columns: &[
            ("d_date_sk", Integer),
            ("d_date_id", Varchar),
            ("d_date", Date),
            ("d_month_seq", Integer),
            ("d_week_seq", Integer),
            ("d_quarter_seq", Integer),
            ("d_year", Integer),
            ("d_dow", Integer),
            ("d_moy", Integer),
            ("d_dom", Integer),
            ("d_qoy", Integer),
            ("d_fy_year", Integer),
            ("d_fy_quarter_seq", Integer),
            ("d_fy_week_seq", Integer),
            ("d_day_name", Varchar),
            ("d_quarter_name", Varchar),
            ("d_holiday", Varchar),
            ("d_weekend", Varchar),
            ("d_following_holiday", Varchar),
            ("d_first_dom", Integer),
            ("d_last_dom", Integer),
            ("d_same_day_ly", Integer),
            ("d_same_day_lq", Integer),
            ("d_current_day", Varchar),
            ("d_current_week", Varchar),
            ("d_current_month", Varchar),
            ("d_current_quarter", Varchar),
            ("d_current_year", Varchar),
        ],
    },
    TableSchema {
        name: "dbgen_version",
        columns: &[
            ("dv_version", Varchar),
            ("dv_create_date", Date),
            ("dv_create_time", Varchar),
            ("dv_cmdline_args", Varchar),
        ],
    },
    TableSchema {
        name: "household_demographics",
        columns: &[
            ("hd_demo_sk", Integer),
            ("hd_income_band_sk", Integer),
            ("hd_buy_potential", Varchar),
            ("hd_dep_count", Integer),
            ("hd_vehicle_count", Integer),
        ],
    },
    TableSchema {
        name: "income_band",
        columns: &[
            ("ib_income_band_sk", Integer),
            ("ib_lower_bound", Integer),
            ("ib_upper_bound", Integer),
        ],
    },
    TableSchema {
        name: "inventory",
        columns: &[
            ("inv_date_sk", Integer),
            ("inv_item_sk", Integer),
            ("inv_warehouse_sk", Integer),
            ("inv_quantity_on_hand", Integer),
        ],
    },
    TableSchema {
        name: "item",
        columns: &[
            ("i_item_sk", Integer),
            ("i_item_id", Varchar),
            ("i_rec_start_date", Date),
            ("i_rec_end_date", Date),
            ("i_item_desc", Varchar),
            ("i_current_price", Double),
            ("i_wholesale_cost", Double),
            ("i_brand_id", Integer),
            ("i_brand", Varchar),
            ("i_class_id", Integer),
            ("i_class", Varchar),
            ("i_category_id", Integer),
            ("i_category", Varchar),
            ("i_manufact_id", Integer),
            ("i_manufact", Varchar),
            ("i_size", Varchar),
            ("i_formulation", Varchar),
            ("i_color", Varchar),
            ("i_units", Varchar),
            ("i_container", Varchar),
            ("i_manager_id", Integer),
            ("i_product_name", Varchar),
        ],
    },
    TableSchema {
        name: "promotion",
        columns: &[
            ("p_promo_sk", Integer),
            ("p_promo_id", Varchar),
            ("p_start_date_sk", Integer),
            ("p_end_date_sk", Integer),
            ("p_item_sk", Integer),
            ("p_cost", Double),
            ("p_response_target", Integer),
            ("p_promo_name", Varchar),
            ("p_channel_dmail", Varchar),
            ("p_channel_email", Varchar),
            ("p_channel_catalog", Varchar),
            ("p_channel_tv", Varchar),
            ("p_channel_radio", Varchar),
            ("p_channel_press", Varchar),
            ("p_channel_event", Varchar),
            ("p_channel_demo", Varchar),
            ("p_channel_details", Varchar),
            ("p_purpose", Varchar),
            ("p_discount_active", Varchar),
        ],
    },
    TableSchema {
        name: "reason",
        columns: &[
            ("r_reason_sk", Integer),
            ("r_reason_id", Varchar),
            ("r_reason_desc", Varchar),
        ],
    },
    TableSchema {
        name: "ship_mode",
        columns: &[
            ("sm_ship_mode_sk", Integer),
            ("sm_ship_mode_id", Varchar),
            ("sm_type", Varchar),
            ("sm_code", Varchar),
            ("sm_carrier", Varchar),
            ("sm_contract", Varchar),
        ],
    },
    TableSchema {
        name: "store",
        columns: &[
            ("s_store_sk", Integer),
            ("s_store_id", Varchar),
            ("s_rec_start_date", Date),
            ("s_rec_end_date", Date),
            ("s_closed_date_sk", Integer),
            ("s_store_name", Varchar),
            ("s_number_employees", Integer),
            ("s_floor_space", Integer),
            ("s_hours", Varchar),
            ("s_manager", Varchar),
            ("s_market_id", Integer),
            ("s_geography_class", Varchar),
            ("s_market_desc", Varchar),
            ("s_market_manager", Varchar),
            ("s_division_id", Integer),
            ("s_division_name", Varchar),
            ("s_company_id", Integer),
            ("s_company_name", Varchar),
            ("s_street_number", Varchar),
            ("s_street_name", Varchar),
            ("s_street_type", Varchar),
            ("s_suite_number", Varchar),
            ("s_city", Varchar),
            ("s_county", Varchar),
            ("s_state", Varchar),
            ("s_zip", Varchar),
            ("s_country", Varchar),
            ("s_gmt_offset", Double),
            ("s_tax_precentage", Double),
        ],
    },
    TableSchema {
        name: "store_returns",
        columns: &[
            ("sr_returned_date_sk", Integer),
            ("sr_return_time_sk", Integer),
            ("sr_item_sk", Integer),
            ("sr_customer_sk", Integer),
            ("sr_cdemo_sk", Integer),
            ("sr_hdemo_sk", Integer),
            ("sr_addr_sk", Integer),
            ("sr_store_sk", Integer),
            ("sr_reason_sk", Integer),
            ("sr_ticket_number", Integer),
            ("sr_return_quantity", Integer),
            ("sr_return_amt", Double),
            ("sr_return_tax", Double),
            ("sr_return_amt_inc_tax", Double),
            ("sr_fee", Double),
            ("sr_return_ship_cost", Double),
            ("sr_refunded_cash", Double),
            ("sr_reversed_charge", Double),
            ("sr_store_credit", Double),
            ("sr_net_loss", Double),
        ],
    },
    TableSchema {
        name: "store_sales",
        columns: &[
            ("ss_sold_date_sk", Integer),
            ("ss_sold_time_sk", Integer),
            ("ss_item_sk", Integer),
            ("ss_customer_sk", Integer),
            ("ss_cdemo_sk", Integer),
            ("ss_hdemo_sk", Integer),
            ("ss_addr_sk", Integer),
            ("ss_store_sk", Integer),
            ("ss_promo_sk", Integer),
            ("ss_ticket_number", Integer),
            ("ss_quantity", Integer),
            ("ss_wholesale_cost", Double),
            ("ss_list_price", Double),
            ("ss_sales_price", Double),
            ("ss_ext_discount_amt", Double),
            ("ss_ext_sales_price", Double),
            ("ss_ext_wholesale_cost", Double),
            ("ss_ext_list_price", Double),
            ("ss_ext_tax", Double),
            ("ss_coupon_amt", Double),
            ("ss_net_paid", Double),
            ("ss_net_paid_inc_tax", Double),
            ("ss_net_profit", Double),
        ],
    },
    TableSchema {
        name: "time_dim",
        columns: &[
            ("t_time_sk", Integer),
            ("t_time_id", Varchar),
            ("t_time", Integer),
            ("t_hour", Integer),
            ("t_minute", Integer),
            ("t_second", Integer),
            ("t_am_pm", Varchar),
            ("t_shift", Varchar),
            ("t_sub_shift", Varchar),
            ("t_meal_time", Varchar),
        ],
    },
    TableSchema {
        name: "warehouse",
        columns: &[
            ("w_warehouse_sk", Integer),
            ("w_warehouse_id", Varchar),
            ("w_warehouse_name", Varchar),
            ("w_warehouse_sq_ft", Integer),
            ("w_street_number", Varchar),
            ("w_street_name", Varchar),
            ("w_street_type", Varchar),
            ("w_suite_number", Varchar),
            ("w_city", Varchar),
            ("w_county", Varchar),
            ("w_state", Varchar),
            ("w_zip", Varchar),
            ("w_country", Varchar),
            ("w_gmt_offset", Double),
        ],
    },
    TableSchema {
        name: "web_page",
        columns: &[
            ("wp_web_page_sk", Integer),
            ("wp_web_page_id", Varchar),
            ("wp_rec_start_date", Date),
            ("wp_rec_end_date", Date),
            ("wp_creation_date_sk", Integer),
            ("wp_access_date_sk", Integer),
            ("wp_autogen_flag", Varchar),
            ("wp_customer_sk", Integer),
            ("wp_url", Varchar),
            ("wp_type", Varchar),
            ("wp_char_count", Integer),
            ("wp_link_count", Integer),
            ("wp_image_count", Integer),
            ("wp_max_ad_count", Integer),
        ],
    },
    TableSchema {
        name: "web_returns",
        columns: &[
            ("wr_returned_date_sk", Integer),
            ("wr_returned_time_sk", Integer),
            ("wr_item_sk", Integer),
            ("wr_refunded_customer_sk", Integer),
            ("wr_refunded_cdemo_sk", Integer),
            ("wr_refunded_hdemo_sk", Integer),
            ("wr_refunded_addr_sk", Integer),
            ("wr_returning_customer_sk", Integer),
            ("wr_returning_cdemo_sk", Integer),
            ("wr_returning_hdemo_sk", Integer),
            ("wr_returning_addr_sk", Integer),
            ("wr_web_page_sk", Integer),
            ("wr_reason_sk", Integer),
            ("wr_order_number", Integer),
            ("wr_return_quantity", Integer),
            ("wr_return_amt", Double),
            ("wr_return_tax", Double),
            ("wr_return_amt_inc_tax", Double),
            ("wr_fee", Double),
            ("wr_return_ship_cost", Double),
            ("wr_refunded_cash", Double),
            ("wr_reversed_charge", Double),
            ("wr_account_credit", Double),
            ("wr_net_loss", Double),
        ],
    },
    TableSchema {
        name: "web_sales",
        columns: &[
            ("ws_sold_date_sk", Integer),
            ("ws_sold_time_sk", Integer),
            ("ws_ship_date_sk", Integer),
            ("ws_item_sk", Integer),
            ("ws_bill_customer_sk", Integer),
            ("ws_bill_cdemo_sk", Integer),
            ("ws_bill_hdemo_sk", Integer),
            ("ws_bill_addr_sk", Integer),
            ("ws_ship_customer_sk", Integer),
            ("ws_ship_cdemo_sk", Integer),
            ("ws_ship_hdemo_sk", Integer),
            ("ws_ship_addr_sk", Integer),
            ("ws_web_page_sk", Integer),
            ("ws_web_site_sk", Integer),
            ("ws_ship_mode_sk", Integer),
            ("ws_warehouse_sk", Integer),
            ("ws_promo_sk", Integer),
            ("ws_order_number", Integer),
            ("ws_quantity", Integer),
            ("ws_wholesale_cost", Double),
            ("ws_list_price", Double),
            ("ws_sales_price", Double),
            ("ws_ext_discount_amt", Double),
            ("ws_ext_sales_price", Double),
            ("ws_ext_wholesale_cost", Double),
            ("ws_ext_list_price", Double),
            ("ws_ext_tax", Double),
            ("ws_coupon_amt", Double),
            ("ws_ext_ship_cost", Double),
            ("ws_net_paid", Double),
            ("ws_net_paid_inc_tax", Double),
            ("ws_net_paid_inc_ship", Double),
            ("ws_net_paid_inc_ship_tax", Double),
            ("ws_net_profit", Double),
        ],
    },
    TableSchema {
        name: "web_site",
        columns: &[
            ("web_site_sk", Integer),
            ("web_site_id", Varchar),
            ("web_rec_start_date", Date),
            ("web_rec_end_date", Date),
            ("web_name", Varchar),
            ("web_open_date_sk", Integer),
            ("web_close_date_sk", Integer),
            ("web_class", Varchar),
            ("web_manager", Varchar),
            ("web_mkt_id", Integer),
            ("web_mkt_class", Varchar),
            ("web_mkt_desc", Varchar),
            ("web_market_manager", Varchar),
            ("web_company_id", Integer),
            ("web_company_name", Varchar),
            ("web_street_number", Varchar),
            ("web_street_name", Varchar),
            ("web_street_type", Varchar),
            ("web_suite_number", Varchar),
            ("web_city", Varchar),
            ("web_county", Varchar),
            ("web_state", Varchar),
            ("web_zip", Varchar),
            ("web_country", Varchar),
            ("web_gmt_offset", Double),
            ("web_tax_percentage", Double),
        ],
    },
];

/// Get the catalog entry for a TPC-DS query.
///
/// TPC-DS query text is produced by `dsqgen`, so the catalog is a folder
/// holding one file per query, named either `q{n}.sql` or `{n}.sql`.
pub fn get_query(query_path: &Path, query: usize) -> Result<QueryText> {
    if !(TPCDS_QUERY_START_ID..=TPCDS_QUERY_END_ID).contains(&query) {
        return plan_err!("invalid query. Expected value between 1 and 99");
    }

    let mut errors = vec![];
    for filename in [format!("q{query}.sql"), format!("{query}.sql")] {
        let path = query_path.join(&filename);
        match fs::read_to_string(&path) {
            Ok(contents) => return QueryText::parse(format!("q{query}"), &contents),
            Err(e) => errors.push(format!("{}: {e}", path.display())),
        }
    }

    plan_err!("invalid query. Could not find query: {:?}", errors)
}

/// Get the SQL statements of a TPC-DS query
pub fn get_query_sql(query_path: &Path, query: usize) -> Result<Vec<String>> {
    Ok(get_query(query_path, query)?.statements().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::find_table;

    #[test]
    fn table_catalog() {
        assert_eq!(TPCDS_TABLES.len(), 25);
        let store_sales = find_table(TPCDS_TABLES, "store_sales").unwrap();
        assert_eq!(store_sales.columns.len(), 23);
        assert_eq!(store_sales.columns[0], ("ss_sold_date_sk", Integer));
        let date_dim = find_table(TPCDS_TABLES, "date_dim").unwrap();
        assert_eq!(date_dim.columns[2], ("d_date", Date));
        assert!(find_table(TPCDS_TABLES, "dbgen_version").is_ok());
    }

    #[test]
    fn reads_query_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("q3.sql"), "select 3;\n-- end query 3\n")?;
        fs::write(dir.path().join("14.sql"), "select 1; select 2;")?;

        let q3 = get_query(dir.path(), 3)?;
        assert_eq!(q3.statements(), ["select 3".to_string()]);
        assert_eq!(get_query_sql(dir.path(), 14)?.len(), 2);

        let err = get_query(dir.path(), 5).unwrap_err();
        assert!(err.to_string().contains("Could not find query"));
        assert!(get_query(dir.path(), 100).is_err());
        Ok(())
    }
}
