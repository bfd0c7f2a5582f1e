//! In-memory store of named tuning constants with persistent load/save.
//!
//! The store is a flat name → value map backed by a built-in default table.
//! Persistence is a single flat JSON document, so a settings file written by
//! earlier tooling loads unchanged: scalars are bare numbers, sizes are
//! two-element arrays. Unknown keys in a loaded file are kept but ignored by
//! the core; missing keys adopt their defaults.
//!
//! No range validation happens here. The interactive tuning front-ends are
//! responsible for offering sensible ranges.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod names;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown parameter {0}")]
    UnknownParameter(String),
    #[error("parameter {name} is not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
    },
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A single tuning value: a scalar or a `(w, h)`-style pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Num(f64),
    Pair(f64, f64),
}

impl From<f64> for ParamValue {
    fn from(orig: f64) -> Self {
        ParamValue::Num(orig)
    }
}

impl From<(f64, f64)> for ParamValue {
    fn from((a, b): (f64, f64)) -> Self {
        ParamValue::Pair(a, b)
    }
}

lazy_static::lazy_static! {
    /// Built-in defaults, tuned for a 1920×1080 frame.
    static ref DEFAULTS: BTreeMap<&'static str, ParamValue> = {
        use crate::names::*;
        let mut m = BTreeMap::new();
        m.insert(CAMERA_SCALE, ParamValue::Num(1.32));
        m.insert(CAMERA_BRIGHTNESS, ParamValue::Num(4.0));
        m.insert(CAMERA_CONTRAST, ParamValue::Num(100.0));
        m.insert(CAMERA_SATURATION, ParamValue::Num(16.0));
        m.insert(CAMERA_EXPOSURE, ParamValue::Num(32.0));
        m.insert(CAMERA_AUTO_EXPOSURE, ParamValue::Num(0.0));
        m.insert(CAMERA_ISO_SPEED, ParamValue::Num(2.0));
        m.insert(BLUR_SIZE, ParamValue::Num(5.0));
        m.insert(THRESH_MIN, ParamValue::Num(100.0));
        m.insert(CANNY_MIN, ParamValue::Num(100.0));
        m.insert(CANNY_MAX, ParamValue::Num(200.0));
        m.insert(AFTER_CANNY_THRESH_MIN, ParamValue::Num(100.0));
        m.insert(MIN_BOT_AREA, ParamValue::Num(2500.0));
        m.insert(MAX_BOT_AREA, ParamValue::Num(25000.0));
        m.insert(MIN_BOT_ASPECT_RATIO, ParamValue::Num(0.5));
        m.insert(MAX_BOT_ASPECT_RATIO, ParamValue::Num(1.0));
        m.insert(MIN_DOT_R, ParamValue::Num(1.0));
        m.insert(MAX_DOT_R, ParamValue::Num(10.0));
        m.insert(MIN_DIRECTOR_R, ParamValue::Num(6.0));
        m.insert(MAX_DIRECTOR_R, ParamValue::Num(10.0));
        m.insert(FRAME_WIDTH, ParamValue::Num(1920.0));
        m.insert(FRAME_HEIGHT, ParamValue::Num(1080.0));
        m.insert(POLYDP_EPSILON, ParamValue::Num(0.05));
        m.insert(ARENA_MASK_SCALE, ParamValue::Num(1.0));
        m.insert(ARENA_MASK_SIZE, ParamValue::Pair(597.0, 420.0));
        // A4 sheet in mm, the calibration target for the pixel scale.
        m.insert(SCALE_RECT_SIZE, ParamValue::Pair(297.0, 210.0));
        m
    };
}

/// Thread-safe store of named tuning constants.
///
/// Clones share the same underlying map. Reads and writes of individual
/// named parameters are atomic; a composite change (setting `min` then
/// `max`) may be observed mid-update by a concurrent reader, which callers
/// tolerate for a single frame.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    inner: Arc<RwLock<BTreeMap<String, ParamValue>>>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store populated from `path`, falling back to the default
    /// table if the file is missing or malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let store = Self::new();
        store.load(path);
        store
    }

    /// Look up a parameter, falling back to the built-in default table.
    pub fn get(&self, name: &str) -> Result<ParamValue> {
        let map = self.inner.read().unwrap();
        if let Some(v) = map.get(name) {
            return Ok(*v);
        }
        DEFAULTS
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            ParamValue::Num(v) => Ok(v),
            ParamValue::Pair(..) => Err(Error::WrongKind {
                name: name.to_string(),
                expected: "scalar",
            }),
        }
    }

    pub fn get_pair(&self, name: &str) -> Result<(f64, f64)> {
        match self.get(name)? {
            ParamValue::Pair(a, b) => Ok((a, b)),
            ParamValue::Num(_) => Err(Error::WrongKind {
                name: name.to_string(),
                expected: "pair",
            }),
        }
    }

    /// Store a value. No range validation.
    pub fn set<V: Into<ParamValue>>(&self, name: &str, value: V) {
        let mut map = self.inner.write().unwrap();
        map.insert(name.to_string(), value.into());
    }

    /// Overwrite every parameter with its built-in default.
    pub fn restore_defaults(&self) {
        let mut map = self.inner.write().unwrap();
        for (k, v) in DEFAULTS.iter() {
            map.insert((*k).to_string(), *v);
        }
    }

    /// Populate the store from a flat JSON document.
    ///
    /// A missing or unreadable file is not an error: the store falls back to
    /// the default table, as first-run setups have no settings file yet.
    pub fn load<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(buf) => match serde_json::from_str::<BTreeMap<String, ParamValue>>(&buf) {
                Ok(loaded) => {
                    let mut map = self.inner.write().unwrap();
                    for (k, v) in loaded {
                        map.insert(k, v);
                    }
                }
                Err(e) => {
                    warn!("could not parse {}: {e}; using defaults", path.display());
                    self.restore_defaults();
                }
            },
            Err(e) => {
                warn!("could not read {}: {e}; using defaults", path.display());
                self.restore_defaults();
            }
        }
    }

    /// Write the merged parameter map (defaults overlaid with explicit
    /// values) to `path` as one flat JSON document.
    ///
    /// The file is written to a temporary sibling and renamed into place so
    /// a concurrent reader never observes a half-written document.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut merged: BTreeMap<String, ParamValue> = DEFAULTS
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect();
        {
            let map = self.inner.read().unwrap();
            for (k, v) in map.iter() {
                merged.insert(k.clone(), *v);
            }
        }
        let buf = serde_json::to_string_pretty(&merged)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, buf)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Snapshot of the merged parameter map.
    pub fn to_map(&self) -> BTreeMap<String, ParamValue> {
        let mut merged: BTreeMap<String, ParamValue> = DEFAULTS
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect();
        let map = self.inner.read().unwrap();
        for (k, v) in map.iter() {
            merged.insert(k.clone(), *v);
        }
        merged
    }
}
