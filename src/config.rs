use crate::{
    foundation::error::{StratumError, StratumResult},
    manifest::EffectId,
};

/// Session tunables. Every field has a default so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Skip recompiling when synthesized text is byte-identical to the last compiled text.
    pub change_detection: bool,
    /// Generator used for effect layers that carry no effect identifier.
    pub default_generator: EffectId,
    /// Namespaces whose effects are standalone generators.
    pub generator_namespaces: Vec<String>,
    /// Forwarded with every texture upload.
    pub flip_y: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            change_detection: true,
            default_generator: EffectId::builtin("synth", "noise"),
            generator_namespaces: vec!["synth".to_string()],
            flip_y: true,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(s: &str) -> StratumResult<Self> {
        serde_json::from_str(s).map_err(|e| StratumError::validation(format!("config: {e}")))
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
