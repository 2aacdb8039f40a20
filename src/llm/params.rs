// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sampling parameter sanitization
//!
//! User-supplied sampling values arrive as loose text (form fields, CLI
//! flags, REPL `/set` commands). They are never trusted directly: each one
//! is coerced and clamped here, falling back to a default when it cannot be
//! read as a number.

use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};

use crate::config::settings::DefaultsConfig;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);
pub const TOP_K_RANGE: (u32, u32) = (1, 100);
pub const MIN_MAX_TOKENS: u32 = 1;

/// Numeric types the sanitizer can coerce from text
pub trait Numeric: Copy + PartialOrd {
    /// Lenient parse. `None` means "not a number"; out-of-range but
    /// numeric input saturates instead of failing.
    fn coerce(raw: &str) -> Option<Self>;
}

impl Numeric for f32 {
    fn coerce(raw: &str) -> Option<Self> {
        let value: f64 = raw.parse().ok()?;
        if value.is_nan() {
            return None;
        }
        // f64 -> f32 saturates to +/-inf, which clamping handles
        Some(value as f32)
    }
}

impl Numeric for u32 {
    fn coerce(raw: &str) -> Option<Self> {
        match raw.parse::<i64>() {
            Ok(value) if value < 0 => Some(0),
            Ok(value) => Some(u32::try_from(value).unwrap_or(u32::MAX)),
            Err(err) => match err.kind() {
                IntErrorKind::PosOverflow => Some(u32::MAX),
                IntErrorKind::NegOverflow => Some(0),
                _ => None,
            },
        }
    }
}

/// Coerce `raw` and clamp it into `[min, max]`; `default` when `raw` is
/// missing or not numeric.
pub fn sanitize<T: Numeric>(raw: Option<&str>, default: T, min: T, max: T) -> T {
    let Some(value) = raw.map(str::trim).and_then(T::coerce) else {
        return default;
    };
    clamp(value, min, max)
}

fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Raw, unvalidated sampling inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParameters {
    pub temperature: Option<String>,
    pub top_p: Option<String>,
    pub top_k: Option<String>,
    pub max_tokens: Option<String>,
}

/// Validated generation parameters handed to provider adapters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_tokens: 1024,
        }
    }
}

impl GenerationParameters {
    /// Sanitize every field of `raw`. Configured defaults are clamped too,
    /// so a bad settings file cannot push values out of range.
    pub fn sanitize(
        raw: &RawParameters,
        defaults: &DefaultsConfig,
        max_tokens_ceiling: u32,
    ) -> Self {
        let ceiling = max_tokens_ceiling.max(MIN_MAX_TOKENS);
        let (t_min, t_max) = TEMPERATURE_RANGE;
        let (p_min, p_max) = TOP_P_RANGE;
        let (k_min, k_max) = TOP_K_RANGE;

        let default_temperature = clamp_default(defaults.temperature, t_min, t_max, 0.7);
        let default_top_p = clamp_default(defaults.top_p, p_min, p_max, 0.8);
        let default_top_k = clamp(defaults.top_k, k_min, k_max);
        let default_max_tokens = clamp(defaults.max_tokens, MIN_MAX_TOKENS, ceiling);

        Self {
            temperature: sanitize(raw.temperature.as_deref(), default_temperature, t_min, t_max),
            top_p: sanitize(raw.top_p.as_deref(), default_top_p, p_min, p_max),
            top_k: sanitize(raw.top_k.as_deref(), default_top_k, k_min, k_max),
            max_tokens: sanitize(
                raw.max_tokens.as_deref(),
                default_max_tokens,
                MIN_MAX_TOKENS,
                ceiling,
            ),
        }
    }
}

fn clamp_default(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        clamp(value, min, max)
    }
}
