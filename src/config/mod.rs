// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for ted-context
//!
//! Handles loading, validating and saving per-project settings.

pub mod settings;

pub use settings::*;
