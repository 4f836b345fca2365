// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP route handlers.

pub mod dev;
pub mod echo;
pub mod health;
pub mod keys;
pub mod metrics;
