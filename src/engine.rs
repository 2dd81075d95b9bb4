//! Boundary to the external effect compilation/runtime engine.

use std::collections::BTreeMap;

use crate::{
    foundation::error::StratumResult,
    manifest::{EffectId, EffectManifest},
    model::{MediaKind, Params},
};

/// One effect invocation inside a compiled pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelinePass {
    pub effect_namespace: String,
    pub effect_function: String,
    pub step_index: usize,
}

impl PipelinePass {
    pub fn new(effect: &EffectId, step_index: usize) -> Self {
        Self {
            effect_namespace: effect.namespace().to_string(),
            effect_function: effect.name().to_string(),
            step_index,
        }
    }

    pub fn is(&self, effect: &EffectId) -> bool {
        self.effect_namespace == effect.namespace() && self.effect_function == effect.name()
    }
}

/// Flat, ordered pass list of the currently compiled pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineGraph {
    pub passes: Vec<PipelinePass>,
}

impl PipelineGraph {
    /// Step indices of every pass running `effect`, in pass order, deduplicated.
    pub fn steps_of(&self, effect: &EffectId) -> Vec<usize> {
        let mut steps = Vec::new();
        for pass in self.passes.iter().filter(|p| p.is(effect)) {
            if !steps.contains(&pass.step_index) {
                steps.push(pass.step_index);
            }
        }
        steps
    }
}

/// Parameter patch keyed by step index.
pub type StepParams = BTreeMap<usize, Params>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureOptions {
    pub flip_y: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

/// CPU-side RGBA8 raster, e.g. rendered text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Straight RGBA8, row-major, tightly packed.
    pub rgba8: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
pub enum TextureSource<'a> {
    Media { reference: &'a str, kind: MediaKind },
    Raster(&'a RasterImage),
}

/// External effect compiler and GPU runtime.
///
/// Calls may block while the engine works; the session never issues overlapping calls.
/// A failed `compile` must leave the previously compiled pipeline in place.
pub trait EffectEngine {
    fn manifest(&self) -> &EffectManifest;

    fn is_registered(&self, effect: &EffectId) -> bool;

    fn load_effects(&mut self, effects: &[EffectId]) -> StratumResult<()>;

    fn compile(&mut self, program: &str) -> StratumResult<()>;

    /// `None` while no pipeline is available (e.g. mid-recompile).
    fn pipeline_graph(&self) -> Option<&PipelineGraph>;

    fn apply_step_parameter_values(&mut self, values: &StepParams) -> StratumResult<()>;

    /// Upload `source` into `texture_id`, returning the uploaded dimensions.
    fn update_texture_from_source(
        &mut self,
        texture_id: &str,
        source: TextureSource<'_>,
        options: TextureOptions,
    ) -> StratumResult<Extent>;
}

/// Renders the backing texture of text-bearing effects from their parameters.
pub trait TextRasterizer {
    fn rasterize(&mut self, params: &Params) -> StratumResult<RasterImage>;
}

/// Texture name for `slot` at `step`.
pub fn texture_id(slot: &str, step: usize) -> String {
    format!("{slot}_step_{step}")
}
