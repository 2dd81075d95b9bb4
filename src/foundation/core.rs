pub use kurbo::Vec2;

/// Opaque, session-stable identity of a layer or child effect.
///
/// Layers and child effects draw from the same id space so either can key the step map.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source. Ids handed out are never handed out again.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self) -> LayerId {
        let id = LayerId(self.next);
        self.next += 1;
        id
    }

    /// Advance past `seen` so externally supplied ids cannot collide with minted ones.
    pub fn observe(&mut self, seen: LayerId) {
        self.next = self.next.max(seen.0.saturating_add(1));
    }
}

/// Layer opacity in percent, clamped to `[0, 100]`.
pub fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 100.0)
    } else {
        100.0
    }
}

/// Map opacity (0..100) onto the compositor's blend weight (-100..100).
///
/// 0% fully suppresses the layer, 50% is an even mix, 100% fully replaces.
pub fn blend_weight(opacity: f64) -> f64 {
    (clamp_opacity(opacity) - 50.0) * 2.0
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
