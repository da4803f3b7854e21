//! Render configuration.

use serde::Deserialize;

/// Options for server rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Emit the comment markers hydration needs. Turn off for static pages
    /// that are never hydrated.
    pub hydratable: bool,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hydratable(mut self, hydratable: bool) -> Self {
        self.hydratable = hydratable;
        self
    }

    /// Load options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { hydratable: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hydratable() {
        assert!(RenderOptions::default().hydratable);
        assert!(RenderOptions::from_json("{}").unwrap().hydratable);
        assert!(!RenderOptions::from_json(r#"{"hydratable":false}"#).unwrap().hydratable);
    }
}
