//! Compile orchestration over the session-owned layer stack.
//!
//! All mutation of the layer stack goes through [`LayerSession`], which keeps the compiled
//! program and its step map consistent with the current ordering. Calls are serialized by
//! `&mut self`: a structural edit can never interleave with a compile in flight.

use crate::{
    config::SessionConfig,
    dsl::{Program, build_program, referenced_effects},
    engine::{EffectEngine, TextRasterizer},
    foundation::core::{IdAllocator, LayerId},
    foundation::error::{StratumError, StratumResult},
    manifest::{EffectId, EffectListing, ManifestQuery},
    model::{BlendMode, ChildEffect, Layer, LayerSource, LayerStack, Params},
    step_map::StepMap,
};

/// Result of a successful (or skipped) compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileReport {
    /// Text was unchanged, nothing was sent to the engine.
    pub skipped: bool,
    /// Layers and child effects bound to a step.
    pub mapped: usize,
}

/// A structural edit that was applied, and the recompile it triggered.
///
/// A failed recompile leaves the previous pipeline running; the edit itself stays applied.
#[derive(Debug)]
#[must_use]
pub struct Edited<T> {
    pub value: T,
    pub compile: StratumResult<CompileReport>,
}

#[derive(Clone, Debug)]
pub(crate) struct Compiled {
    pub(crate) program: Program,
    pub(crate) step_map: StepMap,
}

pub struct LayerSession<E: EffectEngine> {
    pub(crate) engine: E,
    pub(crate) config: SessionConfig,
    pub(crate) stack: LayerStack,
    pub(crate) compiled: Option<Compiled>,
    pub(crate) rasterizer: Option<Box<dyn TextRasterizer>>,
    ids: IdAllocator,
    stale: bool,
    revision: u64,
    map_generation: u64,
}

impl<E: EffectEngine> LayerSession<E> {
    /// Create a session over `layers`. Nothing is compiled until [`Self::rebuild`].
    pub fn new(engine: E, config: SessionConfig, layers: Vec<Layer>) -> StratumResult<Self> {
        let stack = LayerStack::from_layers(layers)?;
        let mut ids = IdAllocator::new();
        for id in stack.all_ids() {
            ids.observe(id);
        }
        Ok(Self {
            engine,
            config,
            stack,
            compiled: None,
            rasterizer: None,
            ids,
            stale: true,
            revision: 0,
            map_generation: 0,
        })
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn TextRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.stack.to_vec()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.stack.get(id)
    }

    /// Text of the last committed compile.
    pub fn program_text(&self) -> Option<&str> {
        self.compiled.as_ref().map(|c| c.program.text.as_str())
    }

    /// Step map of the last committed compile, or `None` while it is stale.
    pub fn step_map(&self) -> Option<&StepMap> {
        if self.stale {
            return None;
        }
        self.compiled.as_ref().map(|c| &c.step_map)
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Bumped on every structural change to the stack.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Bumped every time the step map is rebuilt.
    pub fn map_generation(&self) -> u64 {
        self.map_generation
    }

    pub fn mint_id(&mut self) -> LayerId {
        self.ids.mint()
    }

    pub(crate) fn query(&self) -> ManifestQuery<'_> {
        ManifestQuery::new(self.engine.manifest(), &self.config.generator_namespaces)
    }

    pub(crate) fn program_for(&self, layers: &[Layer]) -> Program {
        build_program(layers, &self.query(), &self.config.default_generator)
    }

    /// Synthesize program text for a candidate layer list without touching session state.
    pub fn build_dsl_from_layers(&self, candidate: &[Layer]) -> String {
        self.program_for(candidate).text
    }

    pub fn starter_effects(&self) -> Vec<EffectListing> {
        self.query().starter_effects()
    }

    pub fn all_effects(&self) -> Vec<EffectListing> {
        self.query().all_effects()
    }

    pub fn layer_effects(&self) -> Vec<EffectListing> {
        self.query().layer_effects()
    }

    /// Replace the whole stack and resynchronize.
    ///
    /// Always recompiles: identical text can still carry different layer ids.
    pub fn set_layers(&mut self, layers: Vec<Layer>) -> StratumResult<CompileReport> {
        let stack = LayerStack::from_layers(layers)?;
        for id in stack.all_ids() {
            self.ids.observe(id);
        }
        self.stack = stack;
        self.invalidate();
        self.rebuild(true)
    }

    /// Recompile the current stack. `force` bypasses the unchanged-text short circuit.
    #[tracing::instrument(skip(self))]
    pub fn rebuild(&mut self, force: bool) -> StratumResult<CompileReport> {
        let program = self.program_for(&self.stack.to_vec());

        if !force
            && !self.stale
            && self.config.change_detection
            && let Some(compiled) = &self.compiled
            && compiled.program.text == program.text
        {
            tracing::debug!("program text unchanged; skipping recompile");
            return Ok(CompileReport {
                skipped: true,
                mapped: compiled.step_map.len(),
            });
        }

        self.compile_text(&program.text).inspect_err(|e| {
            tracing::warn!(error = %e, "compile failed; keeping previous pipeline");
        })?;
        Ok(self.commit(program))
    }

    /// Compile caller-supplied text without committing it as the current program.
    ///
    /// On success the engine runs the trial program, so the step map is marked stale until
    /// the next committed compile.
    #[tracing::instrument(skip(self, text))]
    pub fn try_compile(&mut self, text: &str) -> StratumResult<()> {
        self.compile_text(text)?;
        self.stale = true;
        Ok(())
    }

    fn compile_text(&mut self, text: &str) -> StratumResult<()> {
        let missing: Vec<EffectId> = referenced_effects(text)
            .into_iter()
            .filter(|id| !self.engine.is_registered(id))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "loading effects on demand");
            self.engine.load_effects(&missing)?;
        }
        self.engine.compile(text)
    }

    fn commit(&mut self, program: Program) -> CompileReport {
        let step_map = match self.engine.pipeline_graph() {
            Some(graph) => StepMap::build(&program, graph),
            None => {
                tracing::warn!("engine reported success but exposes no pipeline graph");
                StepMap::default()
            }
        };
        let mapped = step_map.len();
        self.compiled = Some(Compiled { program, step_map });
        self.stale = false;
        self.map_generation += 1;
        self.sync_textures();
        CompileReport {
            skipped: false,
            mapped,
        }
    }

    fn invalidate(&mut self) {
        self.revision += 1;
        self.stale = true;
    }

    fn edited<T>(&mut self, value: T) -> Edited<T> {
        self.invalidate();
        Edited {
            value,
            compile: self.rebuild(false),
        }
    }

    /// Apply a committed reordering. The caller recompiles.
    pub(crate) fn commit_order(&mut self, order: Vec<LayerId>) -> StratumResult<()> {
        self.stack.set_order(order)?;
        self.invalidate();
        Ok(())
    }

    fn layer_mut(&mut self, id: LayerId) -> StratumResult<&mut Layer> {
        self.stack
            .get_mut(id)
            .ok_or_else(|| StratumError::validation(format!("unknown layer {id}")))
    }

    fn child_mut(&mut self, child: LayerId) -> StratumResult<&mut ChildEffect> {
        let (owner, idx) = self
            .stack
            .find_child(child)
            .ok_or_else(|| StratumError::validation(format!("unknown child effect {child}")))?;
        Ok(&mut self.layer_mut(owner)?.children[idx])
    }

    /// Add a new layer on top of the stack.
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        source: LayerSource,
        params: Params,
    ) -> Edited<LayerId> {
        let id = self.ids.mint();
        let layer = Layer::new(id, name, source).with_params(params);
        self.stack.insert(self.stack.len(), layer);
        self.edited(id)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> StratumResult<Edited<Layer>> {
        if self.stack.base_id() == Some(id) {
            return Err(StratumError::validation("the base layer cannot be removed"));
        }
        let removed = self
            .stack
            .remove(id)
            .ok_or_else(|| StratumError::validation(format!("unknown layer {id}")))?;
        Ok(self.edited(removed))
    }

    /// Copy a layer (fresh ids for it and its children) directly above the original.
    pub fn duplicate_layer(&mut self, id: LayerId) -> StratumResult<Edited<LayerId>> {
        let pos = self
            .stack
            .position(id)
            .ok_or_else(|| StratumError::validation(format!("unknown layer {id}")))?;
        let mut copy = self.layer_mut(id)?.clone();
        copy.id = self.ids.mint();
        for child in &mut copy.children {
            child.id = self.ids.mint();
        }
        copy.name = format!("{} copy", copy.name);
        let new_id = copy.id;
        self.stack.insert(pos + 1, copy);
        Ok(self.edited(new_id))
    }

    /// Lift a child effect out of its chain into a filter layer directly above its parent.
    pub fn extract_child_effect(&mut self, child: LayerId) -> StratumResult<Edited<LayerId>> {
        let (owner, idx) = self
            .stack
            .find_child(child)
            .ok_or_else(|| StratumError::validation(format!("unknown child effect {child}")))?;
        let pos = self.stack.position(owner).unwrap_or(0);
        let parent = self.layer_mut(owner)?;
        let effect = parent.children.remove(idx);
        let name = format!("{} {}", parent.name, effect.effect.name());

        let id = self.ids.mint();
        let mut layer = Layer::effect(id, name, effect.effect).with_params(effect.params);
        layer.visible = effect.visible;
        self.stack.insert(pos + 1, layer);
        Ok(self.edited(id))
    }

    pub fn set_layer_visibility(&mut self, id: LayerId, visible: bool) -> StratumResult<Edited<()>> {
        self.layer_mut(id)?.visible = visible;
        Ok(self.edited(()))
    }

    pub fn set_child_visibility(
        &mut self,
        child: LayerId,
        visible: bool,
    ) -> StratumResult<Edited<()>> {
        self.child_mut(child)?.visible = visible;
        Ok(self.edited(()))
    }

    pub fn set_blend_mode(&mut self, id: LayerId, mode: BlendMode) -> StratumResult<Edited<()>> {
        self.layer_mut(id)?.blend_mode = mode;
        Ok(self.edited(()))
    }

    /// Switch an effect layer to another effect, resetting its parameters.
    pub fn set_layer_effect(&mut self, id: LayerId, effect: EffectId) -> StratumResult<Edited<()>> {
        let layer = self.layer_mut(id)?;
        if matches!(layer.source, LayerSource::Media { .. }) {
            return Err(StratumError::validation(format!(
                "layer {id} is a media layer and has no effect to replace"
            )));
        }
        layer.source = LayerSource::Effect {
            effect: Some(effect),
        };
        layer.params.clear();
        Ok(self.edited(()))
    }

    pub fn add_child_effect(
        &mut self,
        id: LayerId,
        effect: EffectId,
        params: Params,
    ) -> StratumResult<Edited<LayerId>> {
        let child = self.ids.mint();
        self.layer_mut(id)?
            .children
            .push(ChildEffect::new(child, effect).with_params(params));
        Ok(self.edited(child))
    }

    pub fn remove_child_effect(&mut self, child: LayerId) -> StratumResult<Edited<ChildEffect>> {
        let (owner, idx) = self
            .stack
            .find_child(child)
            .ok_or_else(|| StratumError::validation(format!("unknown child effect {child}")))?;
        let removed = self.layer_mut(owner)?.children.remove(idx);
        Ok(self.edited(removed))
    }

    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> StratumResult<()> {
        self.layer_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) -> StratumResult<()> {
        self.layer_mut(id)?.locked = locked;
        Ok(())
    }
}
