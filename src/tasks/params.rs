use std::borrow::Cow;

/// One declared input parameter of a [`Runnable`](crate::Runnable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    key: Cow<'static, str>,
    required: bool,
}

impl Param {
    /// A parameter that must be present in the inputs.
    pub fn required(key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            required: true,
        }
    }

    /// A parameter that may be omitted.
    pub fn optional(key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            required: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}
