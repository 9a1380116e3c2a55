//! Functions callable from test sources as `prefix:name(arguments)`.

/// Built-in `citrus:` function library.
pub mod library;
/// Function call parsing and substitution.
pub mod parser;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};

/// A function evaluated to a string value.
pub trait Function: Send + Sync {
    /// Runs the function with already resolved parameters.
    ///
    /// # Errors
    /// Returns `Error::InvalidFunctionUsage` for bad parameters.
    fn execute(&self, parameters: &[String], context: &TestContext) -> Result<String>;
}

impl<F> Function for F
where
    F: Fn(&[String], &TestContext) -> Result<String> + Send + Sync,
{
    fn execute(&self, parameters: &[String], context: &TestContext) -> Result<String> {
        self(parameters, context)
    }
}

/// Named set of functions sharing a prefix such as `citrus:`.
#[derive(Clone)]
pub struct FunctionLibrary {
    name: String,
    prefix: String,
    functions: IndexMap<String, Arc<dyn Function>>,
}

impl FunctionLibrary {
    /// Creates an empty library.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            functions: IndexMap::new(),
        }
    }

    /// Adds a function.
    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>, function: impl Function + 'static) -> Self {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Library name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix including the trailing colon.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Names of all functions in the library.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Looks up a function by name.
    ///
    /// # Errors
    /// Returns `Error::NoSuchFunction` if the library has no such function.
    pub fn get_function(&self, name: &str) -> Result<Arc<dyn Function>> {
        self.functions.get(name).cloned().ok_or_else(|| {
            Error::NoSuchFunction(format!(
                "Can not find function '{name}' in function library '{}' (prefix: {})",
                self.name, self.prefix
            ))
        })
    }

    /// Whether `expression` calls a function of this library.
    pub fn knows_function(&self, expression: &str) -> bool {
        let Some(rest) = expression.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let name = rest.split_once('(').map_or(rest, |(name, _)| name);
        self.functions.contains_key(name)
    }
}

/// All function libraries known to a test context.
#[derive(Clone)]
pub struct FunctionRegistry {
    libraries: Vec<Arc<FunctionLibrary>>,
}

impl FunctionRegistry {
    /// Registry without any library.
    pub fn empty() -> Self {
        Self {
            libraries: Vec::new(),
        }
    }

    /// Registry holding the built-in `citrus:` library.
    pub fn new() -> Self {
        Self::empty().with_library(library::citrus_function_library())
    }

    /// Adds a library.
    #[must_use]
    pub fn with_library(mut self, library: FunctionLibrary) -> Self {
        self.add_library(library);
        self
    }

    /// Adds a library, replacing one with the same prefix.
    pub fn add_library(&mut self, library: FunctionLibrary) {
        debug!(
            "Registering function library '{}' with prefix '{}'",
            library.name(),
            library.prefix()
        );
        self.libraries
            .retain(|existing| existing.prefix() != library.prefix());
        self.libraries.push(Arc::new(library));
    }

    /// Registered libraries.
    pub fn libraries(&self) -> &[Arc<FunctionLibrary>] {
        &self.libraries
    }

    /// Whether `expression` is a single call `prefix:name(...)` of a known library.
    pub fn is_function_expression(&self, expression: &str) -> bool {
        expression.contains('(')
            && expression.ends_with(')')
            && self
                .libraries
                .iter()
                .any(|library| expression.starts_with(library.prefix()))
    }

    /// Library registered for `prefix`.
    ///
    /// # Errors
    /// Returns `Error::NoSuchFunctionLibrary` for unknown prefixes.
    pub fn library_for_prefix(&self, prefix: &str) -> Result<&FunctionLibrary> {
        self.libraries
            .iter()
            .find(|library| library.prefix() == prefix)
            .map(AsRef::as_ref)
            .ok_or_else(|| {
                Error::NoSuchFunctionLibrary(format!(
                    "Can not find function library for prefix '{prefix}'"
                ))
            })
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shout(parameters: &[String], _context: &TestContext) -> Result<String> {
        Ok(parameters.join(" ").to_uppercase())
    }

    #[test]
    fn test_library_lookup() {
        let library = FunctionLibrary::new("custom", "my:").with_function("shout", shout);

        assert!(library.knows_function("my:shout('hi')"));
        assert!(!library.knows_function("my:whisper('hi')"));
        assert!(!library.knows_function("other:shout('hi')"));

        let context = TestContext::default();
        let function = library.get_function("shout").unwrap();
        assert_eq!(
            function.execute(&["a".to_owned(), "b".to_owned()], &context).unwrap(),
            "A B"
        );
        assert!(matches!(
            library.get_function("missing"),
            Err(Error::NoSuchFunction(_))
        ));
    }

    #[test]
    fn test_registry() {
        let registry = FunctionRegistry::new()
            .with_library(FunctionLibrary::new("custom", "my:").with_function("shout", shout));

        assert!(registry.is_function_expression("citrus:upperCase('a')"));
        assert!(registry.is_function_expression("my:shout()"));
        assert!(!registry.is_function_expression("unknown:shout()"));
        assert!(!registry.is_function_expression("citrus:upperCase"));

        assert_eq!(registry.library_for_prefix("my:").unwrap().name(), "custom");
        assert!(matches!(
            registry.library_for_prefix("nope:"),
            Err(Error::NoSuchFunctionLibrary(_))
        ));
    }

    #[test]
    fn test_add_library_replaces_prefix() {
        let mut registry = FunctionRegistry::new();
        registry.add_library(FunctionLibrary::new("replacement", "citrus:"));
        assert_eq!(registry.libraries().len(), 1);
        assert_eq!(
            registry.library_for_prefix("citrus:").unwrap().name(),
            "replacement"
        );
    }
}
