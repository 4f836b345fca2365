// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background jobs run by the scheduler.

mod key_rotation;

pub use key_rotation::{KeyRotationJob, KEY_ROTATION_JOB_ID};
