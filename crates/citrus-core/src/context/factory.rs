use std::sync::Arc;

use indexmap::IndexMap;

use super::TestContext;
use crate::dictionary::{DataDictionary, DataDictionaryRegistry};
use crate::endpoint::EndpointRegistry;
use crate::functions::FunctionRegistry;
use crate::matcher::ValidationMatcherRegistry;
use crate::validation::MessageValidatorRegistry;

/// Creates test contexts that share registries and start from the global variables.
#[derive(Clone)]
pub struct TestContextFactory {
    functions: Arc<FunctionRegistry>,
    matchers: Arc<ValidationMatcherRegistry>,
    validators: Arc<MessageValidatorRegistry>,
    endpoints: Arc<EndpointRegistry>,
    dictionaries: Arc<DataDictionaryRegistry>,
    global_variables: IndexMap<String, String>,
}

impl TestContextFactory {
    /// Factory with the default function library, the default message
    /// validators and no matcher libraries or endpoints.
    pub fn new() -> Self {
        Self {
            functions: Arc::new(FunctionRegistry::default()),
            matchers: Arc::new(ValidationMatcherRegistry::default()),
            validators: Arc::new(MessageValidatorRegistry::default()),
            endpoints: Arc::new(EndpointRegistry::default()),
            dictionaries: Arc::new(DataDictionaryRegistry::default()),
            global_variables: IndexMap::new(),
        }
    }

    /// Replaces the function registry.
    #[must_use]
    pub fn with_function_registry(mut self, registry: FunctionRegistry) -> Self {
        self.functions = Arc::new(registry);
        self
    }

    /// Replaces the validation matcher registry.
    #[must_use]
    pub fn with_matcher_registry(mut self, registry: ValidationMatcherRegistry) -> Self {
        self.matchers = Arc::new(registry);
        self
    }

    /// Replaces the message validator registry.
    #[must_use]
    pub fn with_validator_registry(mut self, registry: MessageValidatorRegistry) -> Self {
        self.validators = Arc::new(registry);
        self
    }

    /// Shares an endpoint registry with every created context.
    #[must_use]
    pub fn with_endpoint_registry(mut self, registry: Arc<EndpointRegistry>) -> Self {
        self.endpoints = registry;
        self
    }

    /// Registers a data dictionary with every created context.
    #[must_use]
    pub fn with_data_dictionary(mut self, dictionary: Arc<dyn DataDictionary>) -> Self {
        Arc::make_mut(&mut self.dictionaries).add_dictionary(dictionary);
        self
    }

    /// Adds a global variable.
    #[must_use]
    pub fn with_global_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_variables.insert(name.into(), value.into());
        self
    }

    /// Adds several global variables.
    #[must_use]
    pub fn with_global_variables(mut self, variables: IndexMap<String, String>) -> Self {
        self.global_variables.extend(variables);
        self
    }

    /// Global variables copied into each new context.
    pub fn global_variables(&self) -> &IndexMap<String, String> {
        &self.global_variables
    }

    /// Shared endpoint registry.
    pub fn endpoint_registry(&self) -> &Arc<EndpointRegistry> {
        &self.endpoints
    }

    /// Creates a fresh context.
    pub fn create_context(&self) -> TestContext {
        TestContext::from_parts(
            self.global_variables.clone(),
            Arc::clone(&self.functions),
            Arc::clone(&self.matchers),
            Arc::clone(&self.validators),
            Arc::clone(&self.endpoints),
            Arc::clone(&self.dictionaries),
        )
    }
}

impl Default for TestContextFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::JsonPathDataDictionary;

    #[test]
    fn test_global_variables_are_copied() {
        let factory = TestContextFactory::new().with_global_variable("env", "staging");

        let first = factory.create_context();
        let second = factory.create_context();
        first.set_variable("env", "local").unwrap();

        assert_eq!(first.get_variable("env").unwrap(), "local");
        assert_eq!(second.get_variable("env").unwrap(), "staging");
    }

    #[test]
    fn test_data_dictionaries_are_shared() {
        let factory = TestContextFactory::new()
            .with_data_dictionary(Arc::new(JsonPathDataDictionary::new("orders")));
        let context = factory.create_context();
        assert_eq!(context.data_dictionaries().names().collect::<Vec<_>>(), vec!["orders"]);
        assert!(context.local_copy().data_dictionaries().get_dictionary("orders").is_ok());
    }

    #[test]
    fn test_contexts_share_endpoint_registry() {
        let factory = TestContextFactory::new();
        let first = factory.create_context();
        let second = factory.create_context();
        assert!(core::ptr::eq(
            first.endpoint_registry(),
            second.endpoint_registry()
        ));
    }
}
