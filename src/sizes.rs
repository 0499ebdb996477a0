//! Image size resolution
//!
//! Turns a requested display size ("original", an explicit pixel pair, or a
//! registered preset name) into the width/height/crop triple that drives the
//! CDN resize parameters.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::RewriteError;

/// Resolved display size. Empty dimensions are left to the CDN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSpec {
    #[serde(default, deserialize_with = "dimension")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "dimension")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "crop_flag")]
    pub crop: bool,
}

/// What the host asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedSize {
    Original,
    /// Explicit pair, given as `[height, width]`
    Dimensions { height: u32, width: u32 },
    Named(String),
}

impl RequestedSize {
    /// Build from a `[height, width]` pair. The element order is part of the
    /// host contract; do not swap it.
    pub fn from_pair(pair: [u32; 2]) -> Self {
        RequestedSize::Dimensions {
            height: pair[0],
            width: pair[1],
        }
    }
}

impl<'de> Deserialize<'de> for RequestedSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Pair([u32; 2]),
            Name(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Pair(pair) => RequestedSize::from_pair(pair),
            Raw::Name(name) if name == "original" => RequestedSize::Original,
            Raw::Name(name) => RequestedSize::Named(name),
        })
    }
}

/// Registered size presets (`thumbnail`, `medium`, theme sizes...)
pub trait SizePresets {
    fn preset(&self, name: &str) -> Option<SizeSpec>;
}

impl SizePresets for HashMap<String, SizeSpec> {
    fn preset(&self, name: &str) -> Option<SizeSpec> {
        self.get(name).copied()
    }
}

/// Resolve a requested size against the registered presets.
pub fn resolve_size<P>(requested: &RequestedSize, presets: &P) -> Result<SizeSpec, RewriteError>
where
    P: SizePresets + ?Sized,
{
    match requested {
        RequestedSize::Original => Ok(SizeSpec::default()),
        RequestedSize::Dimensions { height, width } => Ok(SizeSpec {
            width: Some(*width).filter(|w| *w > 0),
            height: Some(*height).filter(|h| *h > 0),
            crop: false,
        }),
        RequestedSize::Named(name) => presets
            .preset(name)
            .ok_or_else(|| RewriteError::UnknownSizePreset(name.clone())),
    }
}

/// Preset dimensions arrive as numbers, numeric strings, or `""` for "unset"
fn dimension<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.trim().parse().ok(),
        None => None,
    }
    .filter(|n| *n > 0))
}

fn crop_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(b)) => b,
        Some(Raw::Int(n)) => n != 0,
        Some(Raw::Str(s)) => !(s.is_empty() || s == "0"),
        None => false,
    })
}
