//! Serialized signal state shipped from the server to the client.
//!
//! The server records signal values in a [`HydrationState`], which is
//! embedded in the page as a JSON script tag. On the client the state is
//! read back from the document and restored into freshly created signals
//! before hydration, so the first client render sees the server's values.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::Document;
use crate::error::Result;
use crate::reactive::Signal;

/// `id` of the script tag holding the state.
pub const STATE_SCRIPT_ID: &str = "__philjs_state";

const STATE_VERSION: u32 = 1;

/// Signal values keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationState {
    pub version: u32,
    #[serde(default)]
    pub signals: IndexMap<String, Value>,
}

impl HydrationState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            signals: IndexMap::new(),
        }
    }

    /// Record a value under `key`, replacing any previous one.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        self.signals.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Decode the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.signals.get(key) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The `<script>` tag embedding this state.
    ///
    /// Characters that could end the script early are written as JSON
    /// unicode escapes.
    pub fn to_script(&self) -> Result<String> {
        let json = self.to_json()?;
        let mut escaped = String::with_capacity(json.len());
        for ch in json.chars() {
            match ch {
                '<' => escaped.push_str("\\u003c"),
                '>' => escaped.push_str("\\u003e"),
                '&' => escaped.push_str("\\u0026"),
                '\u{2028}' => escaped.push_str("\\u2028"),
                '\u{2029}' => escaped.push_str("\\u2029"),
                other => escaped.push(other),
            }
        }
        Ok(format!(
            r#"<script type="application/json" id="{STATE_SCRIPT_ID}">{escaped}</script>"#
        ))
    }

    /// Read the state embedded in a parsed document, if there is one.
    pub fn from_document(document: &Document) -> Result<Option<Self>> {
        match document.get_element_by_id(STATE_SCRIPT_ID) {
            Some(script) => Ok(Some(Self::from_json(&document.text_content(script))?)),
            None => Ok(None),
        }
    }

    /// Set `signal` to the value stored under `key`.
    ///
    /// Returns `false`, leaving the signal alone, when the key is absent.
    pub fn restore<T>(&self, key: &str, signal: &Signal<T>) -> Result<bool>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        match self.get::<T>(key)? {
            Some(value) => {
                signal.set(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for HydrationState {
    fn default() -> Self {
        Self::new()
    }
}
