//! Validation matchers usable as `@matcherName(arguments)@` expected values.

/// Parsing and evaluation of `@...@` matcher expressions.
pub mod expression;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::parameters::split_parameters;

/// A named predicate checking an actual value against control values.
pub trait ValidationMatcher: Send + Sync {
    /// Validates `value` of `field`.
    ///
    /// # Errors
    /// Returns `Error::Validation` when the value does not match.
    fn validate(
        &self,
        field: &str,
        value: Option<&str>,
        control: &[String],
        context: &TestContext,
    ) -> Result<()>;

    /// Splits the argument body of a matcher expression into control values.
    ///
    /// # Errors
    /// Returns `Error::InvalidExpression` for unbalanced quotes.
    fn extract_control_values(&self, expression: &str) -> Result<Vec<String>> {
        split_parameters(expression)
    }
}

impl<F> ValidationMatcher for F
where
    F: Fn(&str, Option<&str>, &[String], &TestContext) -> Result<()> + Send + Sync,
{
    fn validate(
        &self,
        field: &str,
        value: Option<&str>,
        control: &[String],
        context: &TestContext,
    ) -> Result<()> {
        self(field, value, control, context)
    }
}

/// Named set of matchers sharing a prefix. The default library uses the empty prefix.
#[derive(Clone)]
pub struct ValidationMatcherLibrary {
    name: String,
    prefix: String,
    matchers: IndexMap<String, Arc<dyn ValidationMatcher>>,
}

impl ValidationMatcherLibrary {
    /// Creates an empty library.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            matchers: IndexMap::new(),
        }
    }

    /// Adds a matcher.
    #[must_use]
    pub fn with_matcher(
        mut self,
        name: impl Into<String>,
        matcher: impl ValidationMatcher + 'static,
    ) -> Self {
        self.matchers.insert(name.into(), Arc::new(matcher));
        self
    }

    /// Library name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix including the trailing colon, or empty.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Names of all matchers in the library.
    pub fn matcher_names(&self) -> impl Iterator<Item = &str> {
        self.matchers.keys().map(String::as_str)
    }

    /// Whether the library holds a matcher with this name.
    pub fn knows_matcher(&self, name: &str) -> bool {
        self.matchers.contains_key(name)
    }

    /// Looks up a matcher by name.
    ///
    /// # Errors
    /// Returns `Error::NoSuchValidationMatcher` for unknown names.
    pub fn get_matcher(&self, name: &str) -> Result<Arc<dyn ValidationMatcher>> {
        self.matchers.get(name).cloned().ok_or_else(|| {
            Error::NoSuchValidationMatcher(format!(
                "Can not find validation matcher '{name}' in library '{}' ({})",
                self.name, self.prefix
            ))
        })
    }
}

/// All matcher libraries known to a test context.
#[derive(Clone, Default)]
pub struct ValidationMatcherRegistry {
    libraries: Vec<Arc<ValidationMatcherLibrary>>,
}

impl ValidationMatcherRegistry {
    /// Registry without libraries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a library.
    #[must_use]
    pub fn with_library(mut self, library: ValidationMatcherLibrary) -> Self {
        self.add_library(library);
        self
    }

    /// Adds a library, replacing one with the same prefix.
    pub fn add_library(&mut self, library: ValidationMatcherLibrary) {
        debug!(
            "Registering validation matcher library '{}' with prefix '{}'",
            library.name(),
            library.prefix()
        );
        self.libraries
            .retain(|existing| existing.prefix() != library.prefix());
        self.libraries.push(Arc::new(library));
    }

    /// Registered libraries.
    pub fn libraries(&self) -> &[Arc<ValidationMatcherLibrary>] {
        &self.libraries
    }

    /// Library registered for `prefix`.
    ///
    /// # Errors
    /// Returns `Error::NoSuchMatcherLibrary` for unknown prefixes.
    pub fn library_for_prefix(&self, prefix: &str) -> Result<&ValidationMatcherLibrary> {
        self.libraries
            .iter()
            .find(|library| library.prefix() == prefix)
            .map(AsRef::as_ref)
            .ok_or_else(|| {
                Error::NoSuchMatcherLibrary(format!(
                    "Can not find validation matcher library for prefix '{prefix}'"
                ))
            })
    }
}
