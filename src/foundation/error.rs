pub type StratumResult<T> = Result<T, StratumError>;

#[derive(thiserror::Error, Debug)]
pub enum StratumError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("effect load error: {0}")]
    EffectLoad(String),

    #[error("texture error: {0}")]
    Texture(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("reorder error: {0}")]
    Reorder(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StratumError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    pub fn effect_load(msg: impl Into<String>) -> Self {
        Self::EffectLoad(msg.into())
    }

    pub fn texture(msg: impl Into<String>) -> Self {
        Self::Texture(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn reorder(msg: impl Into<String>) -> Self {
        Self::Reorder(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
