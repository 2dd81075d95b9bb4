//! Read-only queries against the engine-supplied effect manifest.
//!
//! Effect dispatch (solid, media, text, generator, filter) is resolved once into an
//! [`EffectClass`] here instead of being re-derived from namespace strings at each call site.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::foundation::error::{StratumError, StratumResult};

/// Namespace holding the built-in flat-color and media source effects.
pub const MEDIA_NAMESPACE: &str = "media";
/// Namespace holding compositing operators.
pub const MIXER_NAMESPACE: &str = "mixer";
/// Texture slot the media effect samples from.
pub const MEDIA_TEXTURE: &str = "imageTex";

/// `namespace/name` effect identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EffectId {
    namespace: String,
    name: String,
}

impl EffectId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> StratumResult<Self> {
        let namespace = namespace.into();
        let name = name.into();
        if !is_ident(&namespace) || !is_ident(&name) {
            return Err(StratumError::validation(format!(
                "invalid effect identifier '{namespace}/{name}'"
            )));
        }
        Ok(Self { namespace, name })
    }

    /// Flat-color generator; the only effect whose alpha can absorb base-layer opacity.
    pub fn solid() -> Self {
        Self::builtin(MEDIA_NAMESPACE, "solid")
    }

    /// External media source (image or video texture).
    pub fn media() -> Self {
        Self::builtin(MEDIA_NAMESPACE, "media")
    }

    /// Compositing operator used for every layer blend.
    pub fn blend() -> Self {
        Self::builtin(MIXER_NAMESPACE, "blend")
    }

    pub(crate) fn builtin(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for EffectId {
    type Err = StratumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((namespace, name)) = s.trim().split_once('/') else {
            return Err(StratumError::validation(format!(
                "effect identifier '{s}' must be 'namespace/name'"
            )));
        };
        Self::new(namespace, name)
    }
}

impl TryFrom<String> for EffectId {
    type Error = StratumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EffectId> for String {
    fn from(value: EffectId) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Per-effect metadata as published by the effect engine.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectInfo {
    pub starter: bool,
    pub description: String,
    pub tags: Vec<String>,
    /// Name of the external raster texture this effect samples, if any (text layers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_texture: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EffectManifest {
    pub effects: BTreeMap<EffectId, EffectInfo>,
}

impl EffectManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: EffectId, info: EffectInfo) -> Self {
        self.effects.insert(id, info);
        self
    }

    pub fn get(&self, id: &EffectId) -> Option<&EffectInfo> {
        self.effects.get(id)
    }

    pub fn from_json_str(s: &str) -> StratumResult<Self> {
        serde_json::from_str(s).map_err(|e| StratumError::validation(format!("manifest: {e}")))
    }
}

/// How an effect participates in a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectClass {
    /// Flat color generator (`media/solid`).
    Solid,
    /// External media texture source (`media/media`).
    Media,
    /// Generator sampling a rasterized text texture.
    Text,
    /// Standalone generator.
    Generator,
    /// Reads the previous buffer.
    Filter,
    /// Compositing operator.
    Compositor,
}

impl EffectClass {
    /// Standalone effects produce a buffer without reading one.
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            Self::Solid | Self::Media | Self::Text | Self::Generator
        )
    }
}

/// Listing entry for effect pickers.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct EffectListing {
    pub id: EffectId,
    pub description: String,
    pub tags: Vec<String>,
}

/// Manifest lookups combined with the generator-namespace convention.
#[derive(Clone, Copy, Debug)]
pub struct ManifestQuery<'a> {
    manifest: &'a EffectManifest,
    generator_namespaces: &'a [String],
}

impl<'a> ManifestQuery<'a> {
    pub fn new(manifest: &'a EffectManifest, generator_namespaces: &'a [String]) -> Self {
        Self {
            manifest,
            generator_namespaces,
        }
    }

    pub fn info(&self, id: &EffectId) -> Option<&'a EffectInfo> {
        self.manifest.get(id)
    }

    pub fn classify(&self, id: &EffectId) -> EffectClass {
        if *id == EffectId::solid() {
            return EffectClass::Solid;
        }
        if *id == EffectId::media() {
            return EffectClass::Media;
        }
        if id.namespace() == MIXER_NAMESPACE {
            return EffectClass::Compositor;
        }
        if self.external_texture(id).is_some() {
            return EffectClass::Text;
        }
        if self.is_generator(id) {
            EffectClass::Generator
        } else {
            EffectClass::Filter
        }
    }

    /// Generator namespace by convention, or marked `starter` by the manifest.
    pub fn is_generator(&self, id: &EffectId) -> bool {
        self.generator_namespaces
            .iter()
            .any(|ns| ns == id.namespace())
            || self.info(id).is_some_and(|info| info.starter)
    }

    pub fn external_texture(&self, id: &EffectId) -> Option<&'a str> {
        self.info(id)?.external_texture.as_deref()
    }

    /// Texture slot fed from outside the program for this class, if any.
    pub fn texture_slot(&self, id: &EffectId) -> Option<&'a str> {
        match self.classify(id) {
            EffectClass::Media => Some(MEDIA_TEXTURE),
            EffectClass::Text => self.external_texture(id),
            _ => None,
        }
    }

    /// Every user-facing effect, sorted by identifier.
    pub fn all_effects(&self) -> Vec<EffectListing> {
        self.listing(|id| !is_internal(id))
    }

    /// Effects that can start a new layer on their own.
    pub fn starter_effects(&self) -> Vec<EffectListing> {
        self.listing(|id| {
            !is_internal(id)
                && matches!(
                    self.classify(id),
                    EffectClass::Generator | EffectClass::Text
                )
        })
    }

    /// Filters that can be attached to a layer's own effect chain.
    pub fn layer_effects(&self) -> Vec<EffectListing> {
        self.listing(|id| !is_internal(id) && self.classify(id) == EffectClass::Filter)
    }

    fn listing(&self, keep: impl Fn(&EffectId) -> bool) -> Vec<EffectListing> {
        self.manifest
            .effects
            .iter()
            .filter(|(id, _)| keep(id))
            .map(|(id, info)| EffectListing {
                id: id.clone(),
                description: info.description.clone(),
                tags: info.tags.clone(),
            })
            .collect()
    }
}

fn is_internal(id: &EffectId) -> bool {
    id.namespace() == MEDIA_NAMESPACE || id.namespace() == MIXER_NAMESPACE
}

#[cfg(test)]
#[path = "../tests/unit/manifest.rs"]
mod tests;
