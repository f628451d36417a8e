#![forbid(unsafe_code)]

//! When a store re-validates.
//!
//! Forms usually stay quiet until the first submit attempt and then give live
//! feedback on every change. Both halves are configurable, in code or through
//! the environment.

/// Environment variable for [`ValidationMode`] (`on_submit` or `on_change`).
const ENV_VALIDATION_MODE: &str = "FORMWORK_VALIDATION_MODE";
/// Environment variable for [`RevalidateMode`] (`on_change` or `on_submit`).
const ENV_REVALIDATE_MODE: &str = "FORMWORK_REVALIDATE_MODE";

/// Validation before the first submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Validate only when submitting.
    #[default]
    OnSubmit,
    /// Validate on every write.
    OnChange,
}

/// Validation after the first submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevalidateMode {
    /// Validate on every write.
    #[default]
    OnChange,
    /// Keep the errors of the last submit until the next one.
    OnSubmit,
}

fn parse_trigger(value: &str) -> Option<bool> {
    // true = on change, false = on submit
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "on_change" | "onchange" | "change" => Some(true),
        "on_submit" | "onsubmit" | "submit" => Some(false),
        _ => None,
    }
}

impl ValidationMode {
    fn parse(value: &str) -> Option<Self> {
        parse_trigger(value).map(|change| if change { Self::OnChange } else { Self::OnSubmit })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnSubmit => "on_submit",
            Self::OnChange => "on_change",
        }
    }
}

impl RevalidateMode {
    fn parse(value: &str) -> Option<Self> {
        parse_trigger(value).map(|change| if change { Self::OnChange } else { Self::OnSubmit })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnChange => "on_change",
            Self::OnSubmit => "on_submit",
        }
    }
}

/// Store behavior knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormConfig {
    pub mode: ValidationMode,
    pub revalidate: RevalidateMode,
}

impl FormConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate on every write from the start.
    #[must_use]
    pub fn live() -> Self {
        Self {
            mode: ValidationMode::OnChange,
            revalidate: RevalidateMode::OnChange,
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn revalidate(mut self, revalidate: RevalidateMode) -> Self {
        self.revalidate = revalidate;
        self
    }

    /// Read overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read overrides using a custom environment lookup (for tests).
    ///
    /// Unrecognized values are ignored with a warning.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = get_env(ENV_VALIDATION_MODE) {
            match ValidationMode::parse(&raw) {
                Some(mode) => config.mode = mode,
                None => tracing::warn!(var = ENV_VALIDATION_MODE, value = %raw, "ignoring unknown mode"),
            }
        }
        if let Some(raw) = get_env(ENV_REVALIDATE_MODE) {
            match RevalidateMode::parse(&raw) {
                Some(mode) => config.revalidate = mode,
                None => tracing::warn!(var = ENV_REVALIDATE_MODE, value = %raw, "ignoring unknown mode"),
            }
        }
        config
    }

    /// Whether a write should re-validate, given how many submits happened.
    #[must_use]
    pub fn validates_on_write(&self, submit_count: u32) -> bool {
        if submit_count == 0 {
            self.mode == ValidationMode::OnChange
        } else {
            self.revalidate == RevalidateMode::OnChange
        }
    }
}
