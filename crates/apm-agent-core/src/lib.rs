// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Core of an application performance monitoring agent.
//!
//! The crate covers the three pieces of per-transaction bookkeeping that run
//! inside the instrumented application:
//!
//! - [`attributes`]: compiles include/exclude rules into an immutable
//!   [`attributes::AttributeConfig`] and gates every attribute write and
//!   serialization on it.
//! - [`trace`]: records nested segments and builds a bounded transaction
//!   trace tree that keeps the slowest nodes.
//! - [`harvest`]: retains a small representative set of traces per harvest
//!   window and encodes them for the collector.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod attributes;
pub mod config;
pub mod constants;
pub mod errors;
pub mod harvest;
pub mod logger;
pub mod trace;
