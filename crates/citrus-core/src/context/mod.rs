//! Test context shared by all actions of a running test.

/// Factory creating preconfigured contexts.
mod factory;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value as JsonValue, from_str};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dictionary::DataDictionaryRegistry;
use crate::endpoint::EndpointRegistry;
use crate::error::{Error, Result};
use crate::functions::FunctionRegistry;
use crate::functions::parser::{resolve_function, replace_functions_in_string};
use crate::json_path;
use crate::matcher::ValidationMatcherRegistry;
use crate::message::MessageStore;
use crate::settings::{VARIABLE_PREFIX, VARIABLE_SUFFIX};
use crate::validation::MessageValidatorRegistry;
use crate::variables::{
    cut_off_variables_escaping, cut_off_variables_prefix, is_escaped, is_variable_name,
    replace_variables_in_string,
};

pub use factory::TestContextFactory;

struct ContextState {
    variables: RwLock<IndexMap<String, String>>,
    functions: Arc<FunctionRegistry>,
    matchers: Arc<ValidationMatcherRegistry>,
    validators: Arc<MessageValidatorRegistry>,
    endpoints: Arc<EndpointRegistry>,
    dictionaries: Arc<DataDictionaryRegistry>,
    message_store: MessageStore,
    exceptions: Mutex<Vec<Error>>,
    async_tasks: Mutex<Vec<JoinHandle<()>>>,
    timers: Mutex<HashMap<String, CancellationToken>>,
}

/// Variables, registries and runtime state of one test execution.
///
/// Clones are cheap handles onto the same state, so containers can hand the
/// context to spawned tasks.
#[derive(Clone)]
pub struct TestContext {
    state: Arc<ContextState>,
}

impl TestContext {
    fn from_parts(
        variables: IndexMap<String, String>,
        functions: Arc<FunctionRegistry>,
        matchers: Arc<ValidationMatcherRegistry>,
        validators: Arc<MessageValidatorRegistry>,
        endpoints: Arc<EndpointRegistry>,
        dictionaries: Arc<DataDictionaryRegistry>,
    ) -> Self {
        Self {
            state: Arc::new(ContextState {
                variables: RwLock::new(variables),
                functions,
                matchers,
                validators,
                endpoints,
                dictionaries,
                message_store: MessageStore::new(),
                exceptions: Mutex::new(Vec::new()),
                async_tasks: Mutex::new(Vec::new()),
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolves a variable by name; `${name}` is accepted as well.
    ///
    /// An escaped name `//name//` yields the literal `${name}`. A dotted or
    /// indexed name such as `order.items[0]` that is not defined itself is
    /// resolved by reading the base variable as JSON.
    ///
    /// # Errors
    /// Returns `Error::NoSuchVariable` if the variable is not defined.
    pub fn get_variable(&self, name: &str) -> Result<String> {
        let name = cut_off_variables_prefix(name);
        if is_escaped(name) {
            return Ok(format!(
                "{VARIABLE_PREFIX}{}{VARIABLE_SUFFIX}",
                cut_off_variables_escaping(name)
            ));
        }

        if let Some(value) = self.state.variables.read().get(name) {
            return Ok(value.clone());
        }

        self.resolve_segments(name)
            .ok_or_else(|| Error::NoSuchVariable(format!("Unknown variable '{name}'")))
    }

    fn resolve_segments(&self, name: &str) -> Option<String> {
        let split = name.find(['.', '['])?;
        let (base, rest) = name.split_at(split);
        let value = self.state.variables.read().get(base).cloned()?;
        let document: JsonValue = from_str(&value).ok()?;
        json_path::evaluate_as_string(&document, &format!("${rest}")).ok()
    }

    /// Looks up a variable without failing.
    pub fn find_variable(&self, name: &str) -> Option<String> {
        self.get_variable(name).ok()
    }

    /// Whether a variable with this name is defined.
    pub fn has_variable(&self, name: &str) -> bool {
        self.state
            .variables
            .read()
            .contains_key(cut_off_variables_prefix(name))
    }

    /// Defines or replaces a variable.
    ///
    /// # Errors
    /// Returns `Error::Runtime` for an empty name.
    pub fn set_variable(&self, name: &str, value: impl Into<String>) -> Result<()> {
        let name = cut_off_variables_prefix(name);
        if name.trim().is_empty() {
            return Err(Error::runtime("Can not create variable with empty name"));
        }
        let value = value.into();
        debug!("Setting variable: {name} with value: '{value}'");
        self.state.variables.write().insert(name.to_owned(), value);
        Ok(())
    }

    /// Defines several variables at once.
    ///
    /// # Errors
    /// Returns the first error raised by [`Self::set_variable`].
    pub fn set_variables<I, K, V>(&self, variables: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in variables {
            self.set_variable(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Removes a variable, returning its value.
    pub fn remove_variable(&self, name: &str) -> Option<String> {
        self.state
            .variables
            .write()
            .shift_remove(cut_off_variables_prefix(name))
    }

    /// Snapshot of all variables.
    pub fn variables(&self) -> IndexMap<String, String> {
        self.state.variables.read().clone()
    }

    /// New context sharing the registries and starting with a copy of the
    /// variables. Variables set on it do not leak back into this context.
    pub fn local_copy(&self) -> Self {
        Self::from_parts(
            self.variables(),
            Arc::clone(&self.state.functions),
            Arc::clone(&self.state.matchers),
            Arc::clone(&self.state.validators),
            Arc::clone(&self.state.endpoints),
            Arc::clone(&self.state.dictionaries),
        )
    }

    /// Replaces variables, then function calls, in `text`.
    ///
    /// # Errors
    /// Returns variable or function resolution errors.
    pub fn replace_dynamic_content(&self, text: &str) -> Result<String> {
        self.replace_dynamic_content_quoted(text, false)
    }

    /// Same as [`Self::replace_dynamic_content`], optionally quoting each value.
    ///
    /// # Errors
    /// Returns variable or function resolution errors.
    pub fn replace_dynamic_content_quoted(&self, text: &str, enable_quoting: bool) -> Result<String> {
        let replaced = replace_variables_in_string(text, self, enable_quoting)?;
        replace_functions_in_string(&replaced, self, enable_quoting)
    }

    /// Resolves a value that is either a single variable, a single function
    /// call, or text with embedded dynamic content.
    ///
    /// # Errors
    /// Returns variable or function resolution errors.
    pub fn resolve_dynamic_value(&self, value: &str) -> Result<String> {
        if is_variable_name(value) {
            self.get_variable(value)
        } else if self.state.functions.is_function_expression(value) {
            resolve_function(value, self)
        } else {
            self.replace_dynamic_content(value)
        }
    }

    /// Resolves every element of a list.
    ///
    /// # Errors
    /// Returns the first resolution error.
    pub fn resolve_dynamic_values_in_list(&self, values: &[String]) -> Result<Vec<String>> {
        values
            .iter()
            .map(|value| self.resolve_dynamic_value(value))
            .collect()
    }

    /// Resolves keys and values of a map.
    ///
    /// # Errors
    /// Returns the first resolution error.
    pub fn resolve_dynamic_values_in_map(
        &self,
        values: &IndexMap<String, String>,
    ) -> Result<IndexMap<String, String>> {
        values
            .iter()
            .map(|(key, value)| {
                Ok((
                    self.replace_dynamic_content(key)?,
                    self.resolve_dynamic_value(value)?,
                ))
            })
            .collect()
    }

    /// Function libraries available to expressions.
    pub fn function_registry(&self) -> &FunctionRegistry {
        &self.state.functions
    }

    /// Validation matcher libraries available to expressions.
    pub fn matcher_registry(&self) -> &ValidationMatcherRegistry {
        &self.state.matchers
    }

    /// Message validators used by receive actions.
    pub fn validator_registry(&self) -> &MessageValidatorRegistry {
        &self.state.validators
    }

    /// Endpoints addressable by name or URI.
    pub fn endpoint_registry(&self) -> &EndpointRegistry {
        &self.state.endpoints
    }

    /// Data dictionaries applied by send and receive actions.
    pub fn data_dictionaries(&self) -> &DataDictionaryRegistry {
        &self.state.dictionaries
    }

    /// Messages sent and received so far.
    pub fn message_store(&self) -> &MessageStore {
        &self.state.message_store
    }

    /// Records a failure raised outside the main action flow, e.g. by an async container.
    pub fn add_exception(&self, error: Error) {
        warn!("Recorded test failure: {error}");
        self.state.exceptions.lock().push(error);
    }

    /// Whether any failure was recorded.
    pub fn has_exceptions(&self) -> bool {
        !self.state.exceptions.lock().is_empty()
    }

    /// Copy of the first recorded failure.
    pub fn first_exception(&self) -> Option<Error> {
        self.state.exceptions.lock().first().map(Error::duplicate)
    }

    /// Removes and returns all recorded failures.
    pub fn take_exceptions(&self) -> Vec<Error> {
        core::mem::take(&mut *self.state.exceptions.lock())
    }

    /// Whether no failure was recorded.
    pub fn is_success(&self) -> bool {
        !self.has_exceptions()
    }

    /// Tracks a task spawned by an async action so the test can wait for it.
    pub fn register_async(&self, handle: JoinHandle<()>) {
        self.state.async_tasks.lock().push(handle);
    }

    /// Removes and returns all tracked async tasks.
    pub fn drain_async(&self) -> Vec<JoinHandle<()>> {
        core::mem::take(&mut *self.state.async_tasks.lock())
    }

    /// Registers a running timer under its id.
    pub fn register_timer(&self, id: impl Into<String>, token: CancellationToken) {
        self.state.timers.lock().insert(id.into(), token);
    }

    /// Stops a timer. Returns whether a timer with this id was running.
    pub fn stop_timer(&self, id: &str) -> bool {
        self.state.timers.lock().remove(id).is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Stops all timers.
    pub fn stop_timers(&self) {
        for (_, token) in self.state.timers.lock().drain() {
            token.cancel();
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        TestContextFactory::new().create_context()
    }
}
