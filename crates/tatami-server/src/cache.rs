//! Cache-control header construction.
//!
//! Presets cover the usual content tiers; each accepts per-field overrides
//! but rejects demoting an expirable preset to `no-store`.

use std::fmt;

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Public,
    Private,
    NoStore,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheMode::Public => "public",
            CacheMode::Private => "private",
            CacheMode::NoStore => "no-store",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub mode: Option<CacheMode>,
    pub max_age: Option<u64>,
    pub stale_while_revalidate: Option<u64>,
    pub s_max_age: Option<u64>,
    pub stale_if_error: Option<u64>,
}

impl CacheOptions {
    /// Per-field merge, `self` winning over `defaults`.
    fn over(self, defaults: CacheOptions) -> CacheOptions {
        CacheOptions {
            mode: self.mode.or(defaults.mode),
            max_age: self.max_age.or(defaults.max_age),
            stale_while_revalidate: self
                .stale_while_revalidate
                .or(defaults.stale_while_revalidate),
            s_max_age: self.s_max_age.or(defaults.s_max_age),
            stale_if_error: self.stale_if_error.or(defaults.stale_if_error),
        }
    }
}

/// Render options as a comma-joined `cache-control` value.
pub fn generate_cache_control_header(options: &CacheOptions) -> String {
    let mut directives = Vec::new();
    if let Some(mode) = options.mode {
        directives.push(mode.to_string());
    }
    if let Some(seconds) = options.max_age {
        directives.push(format!("max-age={seconds}"));
    }
    if let Some(seconds) = options.stale_while_revalidate {
        directives.push(format!("stale-while-revalidate={seconds}"));
    }
    if let Some(seconds) = options.s_max_age {
        directives.push(format!("s-maxage={seconds}"));
    }
    if let Some(seconds) = options.stale_if_error {
        directives.push(format!("stale-if-error={seconds}"));
    }
    directives.join(", ")
}

/// Header name to set: previews in development never hit real caches.
pub fn get_cache_control_header(dev: bool) -> &'static str {
    if dev {
        "cache-control-preview"
    } else {
        "cache-control"
    }
}

fn expirable(defaults: CacheOptions, overrides: Option<CacheOptions>) -> Result<String> {
    if let Some(overrides) = &overrides {
        if overrides.mode == Some(CacheMode::NoStore) {
            return Err(ServerError::InvalidCacheMode);
        }
    }
    let merged = overrides.unwrap_or_default().over(defaults);
    Ok(generate_cache_control_header(&merged))
}

fn preset(max_age: u64, stale_while_revalidate: u64) -> CacheOptions {
    CacheOptions {
        mode: Some(CacheMode::Public),
        max_age: Some(max_age),
        stale_while_revalidate: Some(stale_while_revalidate),
        ..CacheOptions::default()
    }
}

/// Roughly ten seconds of freshness.
pub fn cache_seconds(overrides: Option<CacheOptions>) -> Result<String> {
    expirable(preset(1, 9), overrides)
}

/// Roughly thirty minutes.
pub fn cache_minutes(overrides: Option<CacheOptions>) -> Result<String> {
    expirable(preset(900, 900), overrides)
}

/// Roughly one hour.
pub fn cache_hours(overrides: Option<CacheOptions>) -> Result<String> {
    expirable(preset(1800, 1800), overrides)
}

/// Roughly one day.
pub fn cache_days(overrides: Option<CacheOptions>) -> Result<String> {
    expirable(preset(3600, 82800), overrides)
}

/// Roughly two weeks.
pub fn cache_weeks(overrides: Option<CacheOptions>) -> Result<String> {
    expirable(preset(1_296_000, 1_296_000), overrides)
}

pub fn no_store() -> String {
    generate_cache_control_header(&CacheOptions {
        mode: Some(CacheMode::NoStore),
        ..CacheOptions::default()
    })
}

pub fn cache_custom(options: &CacheOptions) -> String {
    generate_cache_control_header(options)
}
