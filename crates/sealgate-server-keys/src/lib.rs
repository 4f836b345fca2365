// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle of the RSA keys clients use to wrap session keys.
//!
//! [`KeyLifecycleManager`] is the only writer of key records. It picks the
//! active key, resolves keys by kid with expiry enforcement, and rotates
//! either when no usable key exists or on demand.

pub mod clock;
pub mod error;
pub mod generator;
pub mod kid;
pub mod manager;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{KeyError, Result};
pub use generator::{KeyGenerator, RsaKeyGenerator, StaticKeyGenerator};
pub use kid::generate_kid;
pub use manager::{KeyLifecycleManager, ResolvedKey, DEFAULT_EXPIRY_BUFFER_SECS};
pub use policy::{RotationPolicy, DEFAULT_ROTATION_SCHEDULE};
