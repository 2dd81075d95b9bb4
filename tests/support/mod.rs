#![allow(dead_code)]

use std::collections::BTreeSet;

use serde_json::json;
use stratum::{
    EffectEngine, EffectId, EffectInfo, EffectManifest, Extent, Layer, LayerId, LayerSession,
    Params, PipelineGraph, PipelinePass, RasterImage, SessionConfig, StepParams, StratumError,
    StratumResult, TextRasterizer, TextureOptions, TextureSource, scan_calls,
};

pub fn id(s: &str) -> EffectId {
    s.parse().unwrap()
}

pub fn params(v: serde_json::Value) -> Params {
    serde_json::from_value(v).unwrap()
}

pub fn manifest() -> EffectManifest {
    EffectManifest::new()
        .with(EffectId::solid(), EffectInfo::default())
        .with(EffectId::media(), EffectInfo::default())
        .with(EffectId::blend(), EffectInfo::default())
        .with(
            id("synth/noise"),
            EffectInfo {
                description: "value noise".to_string(),
                ..EffectInfo::default()
            },
        )
        .with(id("filter/blur"), EffectInfo::default())
        .with(id("filter/sharpen"), EffectInfo::default())
        .with(
            id("text/title"),
            EffectInfo {
                external_texture: Some("textTex".to_string()),
                ..EffectInfo::default()
            },
        )
}

#[derive(Clone, Debug, PartialEq)]
pub struct Upload {
    pub texture: String,
    pub source: String,
    pub flip_y: bool,
}

/// In-memory engine: one pass per qualified call, in textual order.
pub struct FakeEngine {
    pub manifest: EffectManifest,
    pub registered: BTreeSet<EffectId>,
    pub load_batches: Vec<Vec<EffectId>>,
    pub fail_loads: bool,
    pub compile_calls: usize,
    pub compiled: Vec<String>,
    pub reject: Option<Box<dyn Fn(&str) -> bool>>,
    pub graph: Option<PipelineGraph>,
    pub graph_unavailable: bool,
    pub pushes: Vec<StepParams>,
    pub fail_push_step: Option<usize>,
    pub uploads: Vec<Upload>,
    pub fail_texture: Option<String>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            manifest: manifest(),
            registered: BTreeSet::from([EffectId::solid(), EffectId::media(), EffectId::blend()]),
            load_batches: Vec::new(),
            fail_loads: false,
            compile_calls: 0,
            compiled: Vec::new(),
            reject: None,
            graph: None,
            graph_unavailable: false,
            pushes: Vec::new(),
            fail_push_step: None,
            uploads: Vec::new(),
            fail_texture: None,
        }
    }
}

impl FakeEngine {
    pub fn reject_when(&mut self, pred: impl Fn(&str) -> bool + 'static) {
        self.reject = Some(Box::new(pred));
    }

    pub fn accept_all(&mut self) {
        self.reject = None;
    }

    /// Every step index that received `name`.
    pub fn pushed(&self, name: &str) -> Vec<(usize, serde_json::Value)> {
        self.pushes
            .iter()
            .flat_map(|values| values.iter())
            .filter_map(|(step, p)| p.get(name).map(|v| (*step, v.clone())))
            .collect()
    }
}

impl EffectEngine for FakeEngine {
    fn manifest(&self) -> &EffectManifest {
        &self.manifest
    }

    fn is_registered(&self, effect: &EffectId) -> bool {
        self.registered.contains(effect)
    }

    fn load_effects(&mut self, effects: &[EffectId]) -> StratumResult<()> {
        if self.fail_loads {
            return Err(StratumError::effect_load("fetch failed"));
        }
        self.registered.extend(effects.iter().cloned());
        self.load_batches.push(effects.to_vec());
        Ok(())
    }

    fn compile(&mut self, program: &str) -> StratumResult<()> {
        self.compile_calls += 1;
        if self.reject.as_ref().is_some_and(|r| r(program)) {
            return Err(StratumError::compile("program rejected"));
        }
        let calls = scan_calls(program);
        if let Some(unknown) = calls.iter().find(|c| !self.registered.contains(*c)) {
            return Err(StratumError::compile(format!("unknown effect {unknown}")));
        }
        self.graph = Some(PipelineGraph {
            passes: calls
                .iter()
                .enumerate()
                .map(|(i, e)| PipelinePass::new(e, i))
                .collect(),
        });
        self.compiled.push(program.to_string());
        Ok(())
    }

    fn pipeline_graph(&self) -> Option<&PipelineGraph> {
        if self.graph_unavailable {
            return None;
        }
        self.graph.as_ref()
    }

    fn apply_step_parameter_values(&mut self, values: &StepParams) -> StratumResult<()> {
        if let Some(step) = self.fail_push_step
            && values.contains_key(&step)
        {
            return Err(StratumError::engine(format!("step {step} rejected params")));
        }
        self.pushes.push(values.clone());
        Ok(())
    }

    fn update_texture_from_source(
        &mut self,
        texture_id: &str,
        source: TextureSource<'_>,
        options: TextureOptions,
    ) -> StratumResult<Extent> {
        if self.fail_texture.as_deref() == Some(texture_id) {
            return Err(StratumError::texture(format!("{texture_id} upload failed")));
        }
        let (desc, extent) = match source {
            TextureSource::Media { reference, .. } => (
                reference.to_string(),
                Extent {
                    width: 640,
                    height: 360,
                },
            ),
            TextureSource::Raster(image) => (
                "raster".to_string(),
                Extent {
                    width: image.width,
                    height: image.height,
                },
            ),
        };
        self.uploads.push(Upload {
            texture: texture_id.to_string(),
            source: desc,
            flip_y: options.flip_y,
        });
        Ok(extent)
    }
}

/// Rasterizes text to a `len * 8` by 16 transparent image.
#[derive(Default)]
pub struct FakeRasterizer {
    pub calls: std::rc::Rc<std::cell::Cell<usize>>,
}

impl TextRasterizer for FakeRasterizer {
    fn rasterize(&mut self, params: &Params) -> StratumResult<RasterImage> {
        self.calls.set(self.calls.get() + 1);
        let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("");
        let width = (text.len() as u32).max(1) * 8;
        Ok(RasterImage {
            width,
            height: 16,
            rgba8: vec![0; (width * 16 * 4) as usize],
        })
    }
}

pub fn solid_base() -> Layer {
    Layer::effect(LayerId(0), "base", EffectId::solid()).with_params(params(json!({ "a": 1.0 })))
}

/// Route session logs to the test harness; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn session(layers: Vec<Layer>) -> LayerSession<FakeEngine> {
    init_tracing();
    LayerSession::new(FakeEngine::default(), SessionConfig::default(), layers).unwrap()
}

pub fn compiled_session(layers: Vec<Layer>) -> LayerSession<FakeEngine> {
    let mut s = session(layers);
    s.rebuild(false).unwrap();
    s
}

pub fn order(s: &LayerSession<FakeEngine>) -> Vec<LayerId> {
    s.stack().order().to_vec()
}
