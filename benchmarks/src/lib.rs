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

//! TPC-H and TPC-DS benchmark drivers with suspend / resume support.
//!
//! Every driver follows the same shape: parse flags, make sure the
//! benchmark tables exist, run one query from a static catalog, print the
//! result table and the elapsed time. The `ratchet` module adds the
//! suspend / resume / ratchet execution modes on top of the engine.
pub mod catalog;
pub mod convert;
pub mod database;
pub mod demo;
pub mod engine;
pub mod ratchet;
pub mod schema;
pub mod tpcds;
pub mod tpch;
pub mod util;
