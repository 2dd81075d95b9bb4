//! Stratum compiles an ordered stack of visual layers into effect-program text for an external
//! effect engine, and keeps the running pipeline in sync with the stack.
//!
//! - [`LayerSession`] owns the stack, compiles it, and maps layers to pipeline steps
//! - parameter, opacity and texture updates go straight to mapped steps without recompiling
//! - [`ReorderTransaction`] trial-compiles a reordered stack before committing it
#![forbid(unsafe_code)]

pub mod config;
pub mod dsl;
pub mod engine;
pub mod foundation;
pub mod manifest;
pub mod model;
pub mod reorder;
pub mod session;
pub mod step_map;
mod sync;

pub use config::SessionConfig;
pub use dsl::{Invocation, InvocationRole, Program, build_program, referenced_effects, scan_calls};
pub use engine::{
    EffectEngine, Extent, PipelineGraph, PipelinePass, RasterImage, StepParams, TextRasterizer,
    TextureOptions, TextureSource, texture_id,
};
pub use foundation::core::{IdAllocator, LayerId, Vec2, blend_weight};
pub use foundation::error::{StratumError, StratumResult};
pub use manifest::{
    EffectClass, EffectId, EffectInfo, EffectListing, EffectManifest, MEDIA_TEXTURE,
    ManifestQuery,
};
pub use model::{BlendMode, ChildEffect, Layer, LayerSource, LayerStack, MediaKind, Params};
pub use reorder::{DropOutcome, DropPosition, ReorderOutcome, ReorderState, ReorderTransaction};
pub use session::{CompileReport, Edited, LayerSession};
pub use step_map::StepMap;
