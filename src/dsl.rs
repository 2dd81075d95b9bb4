//! Program synthesis: ordered layer list to effect-program text.
//!
//! Synthesis is total over any structurally valid layer list. Hidden layers and hidden child
//! effects contribute nothing. Every invocation is emitted namespace-qualified so the text can
//! be scanned for the effects it needs.

use std::collections::BTreeSet;

use crate::{
    foundation::core::{LayerId, blend_weight},
    manifest::{EffectClass, EffectId, MEDIA_NAMESPACE, MIXER_NAMESPACE, ManifestQuery},
    model::{ChildEffect, Layer, Params},
};

/// Why an invocation was emitted. Invocations are recorded in textual order, which is the
/// order the step mapper walks them in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvocationRole {
    /// Transparent backdrop under a base layer that cannot absorb its own opacity.
    Backdrop,
    /// Placeholder output for an empty visible set.
    Blank,
    /// A layer's own content.
    Layer(LayerId),
    /// One entry of a layer's child-effect chain.
    Child { layer: LayerId, child: LayerId },
    /// Composite of a layer onto the accumulator.
    Blend(LayerId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub effect: EffectId,
    pub role: InvocationRole,
}

/// Synthesized program text plus the invocations it contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub text: String,
    pub invocations: Vec<Invocation>,
    /// Buffer named by the final `render(...)`.
    pub output: String,
    /// Number of `write(...)` targets allocated.
    pub buffer_count: u32,
}

impl Program {
    /// Whether the base layer was composited through a blend step of its own.
    pub fn base_has_blend(&self) -> bool {
        self.invocations
            .iter()
            .any(|inv| inv.role == InvocationRole::Backdrop)
    }
}

/// Synthesize program text for `layers` (bottom-to-top).
///
/// Effect layers without an identifier compile as `fallback`.
pub fn build_program(layers: &[Layer], query: &ManifestQuery<'_>, fallback: &EffectId) -> Program {
    Synth::new(query, fallback).run(layers)
}

struct Synth<'q, 'm> {
    query: &'q ManifestQuery<'m>,
    fallback: &'q EffectId,
    lines: Vec<String>,
    invocations: Vec<Invocation>,
    next_buffer: u32,
}

impl<'q, 'm> Synth<'q, 'm> {
    fn new(query: &'q ManifestQuery<'m>, fallback: &'q EffectId) -> Self {
        Self {
            query,
            fallback,
            lines: Vec::new(),
            invocations: Vec::new(),
            next_buffer: 0,
        }
    }

    fn run(mut self, layers: &[Layer]) -> Program {
        let visible: Vec<&Layer> = layers.iter().filter(|l| l.visible).collect();

        let mut namespaces = BTreeSet::from([MEDIA_NAMESPACE.to_string(), MIXER_NAMESPACE.to_string()]);
        for layer in &visible {
            namespaces.insert(layer.effect_id(self.fallback).namespace().to_string());
            for child in layer.visible_children() {
                namespaces.insert(child.effect.namespace().to_string());
            }
        }
        let namespaces: Vec<String> = namespaces.into_iter().collect();
        self.lines.push(format!("search {}", namespaces.join(", ")));

        let output = match visible.split_first() {
            None => self.blank(),
            Some((base, rest)) => {
                let mut acc = self.base(base);
                for layer in rest {
                    acc = self.layer(layer, &acc);
                }
                acc
            }
        };

        self.lines.push(format!("render({output})"));
        let mut text = self.lines.join("\n");
        text.push('\n');

        Program {
            text,
            invocations: self.invocations,
            output,
            buffer_count: self.next_buffer,
        }
    }

    fn alloc(&mut self) -> String {
        let name = format!("o{}", self.next_buffer);
        self.next_buffer += 1;
        name
    }

    fn record(&mut self, effect: EffectId, role: InvocationRole) {
        self.invocations.push(Invocation { effect, role });
    }

    fn blank(&mut self) -> String {
        let out = self.alloc();
        self.record(EffectId::solid(), InvocationRole::Blank);
        self.lines
            .push(format!("{}.write({out})", call(&EffectId::solid(), &transparent())));
        out
    }

    fn base(&mut self, base: &Layer) -> String {
        let effect = base.effect_id(self.fallback);
        let class = self.query.classify(&effect);

        if class == EffectClass::Solid {
            // Opacity folds into the solid's own alpha; nothing beneath to blend against.
            let mut params = base.params.clone();
            params.insert("a".to_string(), serde_json::Value::from(base.baked_alpha()));

            let out = self.alloc();
            self.record(effect.clone(), InvocationRole::Layer(base.id));
            self.lines
                .push(format!("{}.write({out})", call(&effect, &params)));
            return self.children(base, out);
        }

        let backdrop = self.alloc();
        self.record(EffectId::solid(), InvocationRole::Backdrop);
        self.lines.push(format!(
            "{}.write({backdrop})",
            call(&EffectId::solid(), &transparent())
        ));

        // The content chain is nested inside the blend call, so the blend comes first in text.
        self.record(EffectId::blend(), InvocationRole::Blend(base.id));
        let mut content = String::new();
        if !class.is_standalone() {
            content.push_str(&format!("read({backdrop})."));
        }
        content.push_str(&call(&effect, &self.layer_params(base, class)));
        self.record(effect, InvocationRole::Layer(base.id));
        for child in base.visible_children() {
            content.push('.');
            content.push_str(&call(&child.effect, &child.params));
            self.record_child(base, child);
        }

        let out = self.alloc();
        self.lines.push(format!(
            "read({backdrop}).{}.write({out})",
            blend_call(base, &content)
        ));
        out
    }

    fn layer(&mut self, layer: &Layer, acc: &str) -> String {
        let effect = layer.effect_id(self.fallback);
        let class = self.query.classify(&effect);

        let out = self.alloc();
        let params = self.layer_params(layer, class);
        if class.is_standalone() {
            self.lines
                .push(format!("{}.write({out})", call(&effect, &params)));
        } else {
            self.lines
                .push(format!("read({acc}).{}.write({out})", call(&effect, &params)));
        }
        self.record(effect, InvocationRole::Layer(layer.id));
        let result = self.children(layer, out);

        let blended = self.alloc();
        self.record(EffectId::blend(), InvocationRole::Blend(layer.id));
        self.lines.push(format!(
            "read({acc}).{}.write({blended})",
            blend_call(layer, &format!("read({result})"))
        ));
        blended
    }

    fn children(&mut self, layer: &Layer, mut acc: String) -> String {
        for child in layer.visible_children() {
            let out = self.alloc();
            self.lines.push(format!(
                "read({acc}).{}.write({out})",
                call(&child.effect, &child.params)
            ));
            self.record_child(layer, child);
            acc = out;
        }
        acc
    }

    fn record_child(&mut self, layer: &Layer, child: &ChildEffect) {
        self.record(
            child.effect.clone(),
            InvocationRole::Child {
                layer: layer.id,
                child: child.id,
            },
        );
    }

    fn layer_params(&self, layer: &Layer, class: EffectClass) -> Params {
        let mut params = layer.params.clone();
        if matches!(class, EffectClass::Media | EffectClass::Text) {
            params.insert(
                "offset".to_string(),
                serde_json::json!([layer.offset.x, layer.offset.y]),
            );
        }
        params
    }
}

fn transparent() -> Params {
    ["r", "g", "b", "a"]
        .into_iter()
        .map(|k| (k.to_string(), serde_json::Value::from(0)))
        .collect()
}

fn call(effect: &EffectId, params: &Params) -> String {
    let args: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}: {}", format_value(v)))
        .collect();
    format!("{}.{}({})", effect.namespace(), effect.name(), args.join(", "))
}

fn blend_call(layer: &Layer, tex: &str) -> String {
    let blend = EffectId::blend();
    format!(
        "{}.{}(amount: {}, mode: {}, tex: {tex})",
        blend.namespace(),
        blend.name(),
        format_number(blend_weight(layer.opacity)),
        layer.blend_mode.as_str(),
    )
}

/// Render a parameter value as program text.
pub fn format_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if !(n.is_i64() || n.is_u64()) => format_number(f),
            _ => n.to_string(),
        },
        serde_json::Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

/// Shortest round-trip form; integral values print without a fraction.
pub fn format_number(f: f64) -> String {
    if !f.is_finite() {
        return "0".to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    format!("{f}")
}

/// Every namespace-qualified call in `text`, in textual order (duplicates kept).
pub fn scan_calls(text: &str) -> Vec<EffectId> {
    let tokens = tokenize(text);
    let mut out = Vec::new();
    for i in 0..tokens.len().saturating_sub(3) {
        let (Tok::Ident(ns), Tok::Dot, Tok::Ident(name), Tok::LParen) =
            (&tokens[i], &tokens[i + 1], &tokens[i + 2], &tokens[i + 3])
        else {
            continue;
        };
        // `a.b.c(`: only the final `b.c` pair is a call.
        if i >= 2 && tokens[i - 1] == Tok::Dot && matches!(tokens[i - 2], Tok::Ident(_)) {
            continue;
        }
        if let Ok(id) = EffectId::new(*ns, *name) {
            out.push(id);
        }
    }
    out
}

/// Distinct effects referenced by `text`, in order of first appearance.
pub fn referenced_effects(text: &str) -> Vec<EffectId> {
    let mut seen = BTreeSet::new();
    scan_calls(text)
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tok<'a> {
    Ident(&'a str),
    Dot,
    LParen,
    Other,
}

fn tokenize(text: &str) -> Vec<Tok<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(Tok::Ident(&text[start..i]));
            continue;
        }
        if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
            tokens.push(Tok::Other);
            continue;
        }
        match c {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
                tokens.push(Tok::Other);
            }
            b'.' => {
                tokens.push(Tok::Dot);
                i += 1;
            }
            b'(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                tokens.push(Tok::Other);
                i += 1;
            }
        }
    }
    tokens
}

#[cfg(test)]
#[path = "../tests/unit/dsl.rs"]
mod tests;
