//! Layer/child identity to compiled step index.
//!
//! The pipeline graph only names passes by effect, so layers are matched by occurrence:
//! the Nth invocation of effect X in program text binds to the Nth pass running X.
//! This assumes the engine keeps passes in textual order and never merges them.

use std::collections::HashMap;

use crate::{
    dsl::{InvocationRole, Program},
    engine::PipelineGraph,
    foundation::core::LayerId,
    manifest::EffectId,
};

/// Derived cache of step indices, rebuilt wholesale after every successful compile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMap {
    steps: HashMap<LayerId, usize>,
    blend_steps: HashMap<LayerId, usize>,
    base_has_blend: bool,
}

impl StepMap {
    /// Step running the layer's (or child effect's) own invocation.
    pub fn step(&self, id: LayerId) -> Option<usize> {
        self.steps.get(&id).copied()
    }

    /// Step compositing the layer onto the layers beneath it.
    pub fn blend_step(&self, id: LayerId) -> Option<usize> {
        self.blend_steps.get(&id).copied()
    }

    pub fn base_has_blend(&self) -> bool {
        self.base_has_blend
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn build(program: &Program, graph: &PipelineGraph) -> Self {
        let mut map = Self {
            base_has_blend: program.base_has_blend(),
            ..Self::default()
        };
        // Blends share the per-effect occurrence sequence with every other invocation. A base
        // that bakes its opacity emits no blend, so the Nth non-base blend lands on N-1, not N.
        let mut seen: HashMap<&EffectId, usize> = HashMap::new();

        for inv in &program.invocations {
            let n = seen.entry(&inv.effect).or_insert(0);
            let ordinal = *n;
            *n += 1;

            let step = nth_step(graph, &inv.effect, ordinal);
            match (inv.role, step) {
                (InvocationRole::Backdrop | InvocationRole::Blank, _) => {}
                (InvocationRole::Layer(id) | InvocationRole::Child { child: id, .. }, Some(step)) => {
                    map.steps.insert(id, step);
                }
                (InvocationRole::Blend(id), Some(step)) => {
                    map.blend_steps.insert(id, step);
                }
                (role, None) => tracing::debug!(
                    ?role,
                    effect = %inv.effect,
                    ordinal,
                    "no pipeline pass for invocation"
                ),
            }
        }

        map
    }
}

fn nth_step(graph: &PipelineGraph, effect: &EffectId, n: usize) -> Option<usize> {
    graph
        .passes
        .iter()
        .filter(|p| p.is(effect))
        .nth(n)
        .map(|p| p.step_index)
}

#[cfg(test)]
#[path = "../tests/unit/step_map.rs"]
mod tests;
