//! Event name codec
//! Application code names events in lower camel case (`deviceFound`); the
//! native layer exports the name it actually emits under an upper snake case
//! key (`DEVICE_FOUND`) in its constant table.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::bluetooth::constants::Features;
use crate::core::bluetooth::events::EventKind;
use crate::error::{BridgeError, Result};

static UPPERCASE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Z]").expect("static regex"));
static UNDERSCORE_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("_([a-z])").expect("static regex"));

/// `deviceFound` -> `DEVICE_FOUND`
pub fn event_name_to_wire_key(name: &str) -> String {
    UPPERCASE_LETTER.replace_all(name, "_$0").to_uppercase()
}

/// `DEVICE_FOUND` -> `deviceFound`
pub fn wire_key_to_event_name(key: &str) -> String {
    let lower = key.to_lowercase();
    UNDERSCORE_LETTER
        .replace_all(&lower, |caps: &Captures| caps[1].to_uppercase())
        .into_owned()
}

/// Constants exported by the native module: event wire names and feature bits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstantTable(HashMap<String, Value>);

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Table as the Android module exports it: every event key maps to itself.
    pub fn android() -> Self {
        let mut table = Self::with_features();
        for kind in EventKind::ALL {
            let key = kind.wire_key();
            table.insert(key.clone(), key);
        }
        table
    }

    /// Table as the iOS module exports it: event keys map to the camel case
    /// name the module emits.
    pub fn ios() -> Self {
        let mut table = Self::with_features();
        for kind in EventKind::ALL {
            table.insert(kind.wire_key(), kind.name());
        }
        table
    }

    fn with_features() -> Self {
        let mut table = Self::new();
        for (name, feature) in Features::NAMED {
            table.insert(name, feature.bits());
        }
        table
    }

    /// Feature bits exported under `name`.
    pub fn feature(&self, name: &str) -> Option<Features> {
        self.get(name)
            .and_then(Value::as_u64)
            .and_then(|bits| u32::try_from(bits).ok())
            .map(Features::from_bits)
    }
}

/// Resolves event names against a native constant table.
///
/// The derivation is recomputed on every call; nothing is cached, so the same
/// name always yields the same wire name for a given table.
#[derive(Debug, Clone)]
pub struct EventNameCodec {
    constants: Arc<ConstantTable>,
}

impl EventNameCodec {
    pub fn new(constants: ConstantTable) -> Self {
        Self {
            constants: Arc::new(constants),
        }
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    /// Wire name the native layer emits for the camel case event `name`.
    pub fn resolve(&self, name: &str) -> Result<String> {
        let key = event_name_to_wire_key(name);
        match self.constants.get(&key) {
            Some(Value::String(wire)) => Ok(wire.clone()),
            Some(_) => Err(BridgeError::InvalidConstant { key }),
            None => Err(BridgeError::UnknownEventName {
                name: name.to_string(),
                key,
            }),
        }
    }

    pub fn resolve_kind(&self, kind: EventKind) -> Result<String> {
        self.resolve(kind.name())
    }

    /// Which event a native wire name stands for.
    pub fn kind_of(&self, wire: &str) -> Option<EventKind> {
        EventKind::ALL
            .into_iter()
            .find(|kind| matches!(self.resolve_kind(*kind), Ok(resolved) if resolved == wire))
    }
}
