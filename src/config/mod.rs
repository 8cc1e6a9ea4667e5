// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for Tally
//!
//! Handles loading, saving, and resolving user settings.

pub mod settings;

pub use settings::*;
