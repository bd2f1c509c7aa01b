use serde::Serialize;

/// Outcome of validating one agent's output.
///
/// `Degraded` carries a safe default in place of the artifact. The raw model
/// text lives only here, never inside the fallback, so it cannot be mistaken
/// for structured output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validated<T> {
    Parsed(T),
    Degraded {
        fallback: T,
        raw: String,
        reason: String,
    },
}

impl<T> Validated<T> {
    /// The artifact to hand downstream, parsed or fallback.
    pub fn value(&self) -> &T {
        match self {
            Self::Parsed(value) => value,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Parsed(value) => value,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Parsed(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validated<U> {
        match self {
            Self::Parsed(value) => Validated::Parsed(f(value)),
            Self::Degraded {
                fallback,
                raw,
                reason,
            } => Validated::Degraded {
                fallback: f(fallback),
                raw,
                reason,
            },
        }
    }

    pub fn value_mut(&mut self) -> &mut T {
        match self {
            Self::Parsed(value) => value,
            Self::Degraded { fallback, .. } => fallback,
        }
    }
}
