use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    foundation::core::{LayerId, Vec2, clamp_opacity},
    foundation::error::{StratumError, StratumResult},
    manifest::EffectId,
};

/// Effect parameters keyed by name. Ordered so synthesis is deterministic.
pub type Params = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Mix,
    Add,
    Subtract,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
}

impl BlendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mix => "mix",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::Difference => "difference",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSource {
    Media {
        reference: String,
        media_kind: MediaKind,
    },
    Effect {
        #[serde(default)]
        effect: Option<EffectId>,
    },
}

/// Filter attached to a layer's own chain. No blend, opacity or offset of its own.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChildEffect {
    pub id: LayerId,
    pub effect: EffectId,
    #[serde(default)]
    pub params: Params,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl ChildEffect {
    pub fn new(id: LayerId, effect: EffectId) -> Self {
        Self {
            id,
            effect,
            params: Params::new(),
            visible: true,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub id: LayerId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64, // percent, 0..100
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub offset: Vec2,
    pub source: LayerSource,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub children: Vec<ChildEffect>,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    100.0
}

impl Layer {
    pub fn new(id: LayerId, name: impl Into<String>, source: LayerSource) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            opacity: 100.0,
            blend_mode: BlendMode::Mix,
            locked: false,
            offset: Vec2::ZERO,
            source,
            params: Params::new(),
            children: Vec::new(),
        }
    }

    pub fn effect(id: LayerId, name: impl Into<String>, effect: EffectId) -> Self {
        Self::new(
            id,
            name,
            LayerSource::Effect {
                effect: Some(effect),
            },
        )
    }

    pub fn media(
        id: LayerId,
        name: impl Into<String>,
        reference: impl Into<String>,
        media_kind: MediaKind,
    ) -> Self {
        Self::new(
            id,
            name,
            LayerSource::Media {
                reference: reference.into(),
                media_kind,
            },
        )
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_blend(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_child(mut self, child: ChildEffect) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Effect this layer compiles to; effect layers without an identifier use `fallback`.
    pub fn effect_id(&self, fallback: &EffectId) -> EffectId {
        match &self.source {
            LayerSource::Media { .. } => EffectId::media(),
            LayerSource::Effect { effect: Some(e) } => e.clone(),
            LayerSource::Effect { effect: None } => fallback.clone(),
        }
    }

    pub fn media_source(&self) -> Option<(&str, MediaKind)> {
        match &self.source {
            LayerSource::Media {
                reference,
                media_kind,
            } => Some((reference.as_str(), *media_kind)),
            LayerSource::Effect { .. } => None,
        }
    }

    /// Declared alpha `a` (default 1) scaled by opacity, as rendered by a solid base.
    pub fn baked_alpha(&self) -> f64 {
        let declared = self.params.get("a").and_then(|v| v.as_f64()).unwrap_or(1.0);
        declared * clamp_opacity(self.opacity) / 100.0
    }

    pub fn visible_children(&self) -> impl Iterator<Item = &ChildEffect> {
        self.children.iter().filter(|c| c.visible)
    }
}

/// Arena of layers addressed by id, plus the current bottom-to-top ordering.
///
/// Index 0 of the ordering is the base layer.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    layers: HashMap<LayerId, Layer>,
    order: Vec<LayerId>,
}

impl LayerStack {
    pub fn from_layers(layers: Vec<Layer>) -> StratumResult<Self> {
        if layers.is_empty() {
            return Err(StratumError::validation(
                "layer stack must contain at least the base layer",
            ));
        }

        let mut seen = HashSet::new();
        for layer in &layers {
            if !layer.opacity.is_finite() {
                return Err(StratumError::validation(format!(
                    "layer {} has non-finite opacity",
                    layer.id
                )));
            }
            let ids = std::iter::once(layer.id).chain(layer.children.iter().map(|c| c.id));
            for id in ids {
                if !seen.insert(id) {
                    return Err(StratumError::validation(format!("duplicate layer id {id}")));
                }
            }
        }

        let order = layers.iter().map(|l| l.id).collect();
        let layers = layers.into_iter().map(|l| (l.id, l)).collect();
        Ok(Self { layers, order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[LayerId] {
        &self.order
    }

    pub fn base_id(&self) -> Option<LayerId> {
        self.order.first().copied()
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn position(&self, id: LayerId) -> Option<usize> {
        self.order.iter().position(|&l| l == id)
    }

    /// Layers bottom-to-top.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    /// Deep copy of the ordered layer list.
    pub fn to_vec(&self) -> Vec<Layer> {
        self.iter().cloned().collect()
    }

    /// All ids in use, layers and children.
    pub fn all_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers
            .values()
            .flat_map(|l| std::iter::once(l.id).chain(l.children.iter().map(|c| c.id)))
    }

    /// Find the layer owning child effect `child`, and the child's index in its chain.
    pub fn find_child(&self, child: LayerId) -> Option<(LayerId, usize)> {
        self.iter().find_map(|l| {
            l.children
                .iter()
                .position(|c| c.id == child)
                .map(|idx| (l.id, idx))
        })
    }

    pub(crate) fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(&id)
    }

    pub(crate) fn insert(&mut self, at: usize, layer: Layer) {
        let at = at.min(self.order.len());
        self.order.insert(at, layer.id);
        self.layers.insert(layer.id, layer);
    }

    pub(crate) fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let pos = self.position(id)?;
        self.order.remove(pos);
        self.layers.remove(&id)
    }

    /// Replace the ordering with a permutation of the current ids that keeps the base in place.
    pub(crate) fn set_order(&mut self, order: Vec<LayerId>) -> StratumResult<()> {
        if order.len() != self.order.len() || order.first() != self.order.first() {
            return Err(StratumError::reorder(
                "candidate ordering must keep every layer and the base at index 0",
            ));
        }
        let current: HashSet<_> = self.order.iter().collect();
        let proposed: HashSet<_> = order.iter().collect();
        if proposed.len() != order.len() || !proposed.iter().all(|id| current.contains(id)) {
            return Err(StratumError::reorder(
                "candidate ordering references unknown layers",
            ));
        }
        self.order = order;
        Ok(())
    }

    /// Ordered copy of the layers under `order`, for trial synthesis.
    pub fn arranged(&self, order: &[LayerId]) -> Vec<Layer> {
        order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[path = "../tests/unit/model.rs"]
mod tests;
