// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ZMQ server-side socket patterns

pub mod rep;

pub use rep::ZmqRep;
