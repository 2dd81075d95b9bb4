//! Pipeline updates that bypass recompilation: parameter patches, blend weights, and
//! media/text textures.
//!
//! Every push is keyed through the step map. Layers without a mapped step are skipped, and a
//! failing push is logged without aborting its siblings.

use serde_json::json;

use crate::{
    engine::{EffectEngine, Extent, StepParams, TextureOptions, TextureSource, texture_id},
    foundation::core::{LayerId, Vec2, blend_weight, clamp_opacity},
    foundation::error::{StratumError, StratumResult},
    manifest::{EffectClass, EffectId, MEDIA_TEXTURE},
    model::{MediaKind, Params},
    session::LayerSession,
};

struct MediaUpload {
    step: usize,
    reference: String,
    kind: MediaKind,
}

struct TextUpload {
    step: usize,
    slot: String,
    params: Params,
}

impl<E: EffectEngine> LayerSession<E> {
    /// Merge `patch` into a layer's (or child effect's) parameters and push it to its step.
    ///
    /// An `a` patch on a solid base is pushed scaled by the base opacity, as synthesis bakes it.
    /// Returns whether the patch reached the pipeline.
    pub fn update_layer_params(&mut self, id: LayerId, mut patch: Params) -> StratumResult<bool> {
        if let Some(layer) = self.stack.get_mut(id) {
            layer.params.extend(patch.clone());
        } else if let Some((owner, idx)) = self.stack.find_child(id) {
            if let Some(layer) = self.stack.get_mut(owner) {
                layer.children[idx].params.extend(patch.clone());
            }
        } else {
            return Err(StratumError::validation(format!("unknown layer {id}")));
        }

        let Some(step) = self.step_map().and_then(|m| m.step(id)) else {
            tracing::debug!(%id, "no mapped step; parameter update stays local");
            return Ok(false);
        };
        if patch.contains_key("a")
            && let Some(alpha) = self.solid_base_alpha(id)
        {
            patch.insert("a".to_string(), json!(alpha));
        }
        let pushed = self.push_params(step, patch);

        if let Some(upload) = self.text_upload_for(id, step) {
            self.upload_text(&upload);
        }
        Ok(pushed)
    }

    /// Set layer opacity and push the resulting blend weight (or baked alpha for a solid base).
    pub fn update_layer_opacity(&mut self, id: LayerId, opacity: f64) -> StratumResult<bool> {
        self.stack
            .get_mut(id)
            .ok_or_else(|| StratumError::validation(format!("unknown layer {id}")))?
            .opacity = clamp_opacity(opacity);

        let Some(map) = self.step_map() else {
            return Ok(false);
        };
        let (step, patch) = match self.solid_base_alpha(id) {
            Some(alpha) => (map.step(id), param("a", json!(alpha))),
            None => (map.blend_step(id), param("amount", json!(blend_weight(opacity)))),
        };
        let Some(step) = step else {
            tracing::debug!(%id, "no mapped step for opacity update");
            return Ok(false);
        };
        Ok(self.push_params(step, patch))
    }

    /// Move a layer. Locked layers refuse to move.
    pub fn update_layer_offset(&mut self, id: LayerId, x: f64, y: f64) -> StratumResult<bool> {
        let fallback = self.config.default_generator.clone();
        let layer = self
            .stack
            .get_mut(id)
            .ok_or_else(|| StratumError::validation(format!("unknown layer {id}")))?;
        if layer.locked {
            return Err(StratumError::validation(format!("layer {id} is locked")));
        }
        layer.offset = Vec2::new(x, y);
        let effect = layer.effect_id(&fallback);

        if !matches!(
            self.query().classify(&effect),
            EffectClass::Media | EffectClass::Text
        ) {
            return Ok(false);
        }
        let Some(step) = self.step_map().and_then(|m| m.step(id)) else {
            return Ok(false);
        };
        Ok(self.push_params(step, param("offset", json!([x, y]))))
    }

    /// Per-frame callback: re-upload every visible video source.
    ///
    /// Skips silently while no pipeline is available. Returns the number of uploads made.
    pub fn refresh_video_textures(&mut self) -> usize {
        if self.step_map().is_none() {
            return 0;
        }
        let Some(uploads) = self.media_uploads() else {
            tracing::trace!("pipeline unavailable; skipping video refresh");
            return 0;
        };
        uploads
            .iter()
            .filter(|u| u.kind == MediaKind::Video)
            .filter(|u| self.upload_media(u, false))
            .count()
    }

    /// Upload every media and text texture after a compile.
    pub(crate) fn sync_textures(&mut self) {
        if let Some(uploads) = self.media_uploads() {
            for upload in &uploads {
                self.upload_media(upload, true);
            }
        }
        for upload in self.text_uploads() {
            self.upload_text(&upload);
        }
    }

    /// Rendered alpha when `id` is a solid base, which has no blend step of its own.
    fn solid_base_alpha(&self, id: LayerId) -> Option<f64> {
        let base = self.stack.iter().find(|l| l.visible)?;
        (base.id == id && base.effect_id(&self.config.default_generator) == EffectId::solid())
            .then(|| base.baked_alpha())
    }

    fn push_params(&mut self, step: usize, patch: Params) -> bool {
        let values = StepParams::from([(step, patch)]);
        match self.engine.apply_step_parameter_values(&values) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(step, error = %e, "parameter push failed");
                false
            }
        }
    }

    fn texture_options(&self) -> TextureOptions {
        TextureOptions {
            flip_y: self.config.flip_y,
        }
    }

    /// Media passes paired positionally with visible media layers.
    fn media_uploads(&self) -> Option<Vec<MediaUpload>> {
        let graph = self.engine.pipeline_graph()?;
        let steps = graph.steps_of(&EffectId::media());
        let layers = self
            .stack
            .iter()
            .filter(|l| l.visible)
            .filter_map(|l| l.media_source());
        Some(
            steps
                .into_iter()
                .zip(layers)
                .map(|(step, (reference, kind))| MediaUpload {
                    step,
                    reference: reference.to_string(),
                    kind,
                })
                .collect(),
        )
    }

    /// Text passes paired positionally, per text effect, with the visible layers using it.
    fn text_uploads(&self) -> Vec<TextUpload> {
        let Some(graph) = self.engine.pipeline_graph() else {
            return Vec::new();
        };
        let query = self.query();
        let fallback = &self.config.default_generator;

        let mut effects: Vec<EffectId> = Vec::new();
        for layer in self.stack.iter().filter(|l| l.visible) {
            let effect = layer.effect_id(fallback);
            if query.classify(&effect) == EffectClass::Text && !effects.contains(&effect) {
                effects.push(effect);
            }
        }

        let mut uploads = Vec::new();
        for effect in &effects {
            let Some(slot) = query.external_texture(effect) else {
                continue;
            };
            let layers = self
                .stack
                .iter()
                .filter(|l| l.visible && l.effect_id(fallback) == *effect);
            for (step, layer) in graph.steps_of(effect).into_iter().zip(layers) {
                uploads.push(TextUpload {
                    step,
                    slot: slot.to_string(),
                    params: layer.params.clone(),
                });
            }
        }
        uploads
    }

    fn text_upload_for(&self, id: LayerId, step: usize) -> Option<TextUpload> {
        let layer = self.stack.get(id)?;
        let effect = layer.effect_id(&self.config.default_generator);
        let query = self.query();
        if query.classify(&effect) != EffectClass::Text {
            return None;
        }
        Some(TextUpload {
            step,
            slot: query.external_texture(&effect)?.to_string(),
            params: layer.params.clone(),
        })
    }

    fn upload_media(&mut self, upload: &MediaUpload, push_size: bool) -> bool {
        let options = self.texture_options();
        let source = TextureSource::Media {
            reference: &upload.reference,
            kind: upload.kind,
        };
        match self.engine.update_texture_from_source(
            &texture_id(MEDIA_TEXTURE, upload.step),
            source,
            options,
        ) {
            Ok(extent) => {
                if push_size {
                    self.push_params(upload.step, size_params(extent));
                }
                true
            }
            Err(e) => {
                tracing::warn!(step = upload.step, reference = %upload.reference, error = %e, "media upload failed");
                false
            }
        }
    }

    fn upload_text(&mut self, upload: &TextUpload) -> bool {
        let Some(rasterizer) = self.rasterizer.as_mut() else {
            tracing::debug!("no text rasterizer configured");
            return false;
        };
        let image = match rasterizer.rasterize(&upload.params) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(step = upload.step, error = %e, "text rasterization failed");
                return false;
            }
        };
        let options = self.texture_options();
        match self.engine.update_texture_from_source(
            &texture_id(&upload.slot, upload.step),
            TextureSource::Raster(&image),
            options,
        ) {
            Ok(extent) => {
                self.push_params(upload.step, size_params(extent));
                true
            }
            Err(e) => {
                tracing::warn!(step = upload.step, error = %e, "text texture upload failed");
                false
            }
        }
    }
}

fn param(name: &str, value: serde_json::Value) -> Params {
    Params::from([(name.to_string(), value)])
}

fn size_params(extent: Extent) -> Params {
    param("imageSize", json!([extent.width, extent.height]))
}
