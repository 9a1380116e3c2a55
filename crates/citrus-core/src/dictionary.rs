//! Data dictionaries rewriting payload values of sent and received messages.
//!
//! A dictionary maps JSONPath expressions to replacement values. Global
//! dictionaries apply to every message of their direction; others only to
//! actions naming them.

use core::ptr;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::context::TestContext;
use crate::error::{Error, Result};
use crate::json_path::JsonPath;
use crate::message::Message;

/// Messages a dictionary applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    /// Received messages.
    Inbound,
    /// Sent messages.
    Outbound,
    /// Both directions.
    #[default]
    Unbound,
}

impl MessageDirection {
    /// Whether a dictionary bound to `self` handles messages going `direction`.
    pub fn includes(self, direction: Self) -> bool {
        self == Self::Unbound || self == direction
    }
}

/// Rewrites message payloads before sending or before validation.
pub trait DataDictionary: Send + Sync {
    /// Name the dictionary is registered under.
    fn name(&self) -> &str;

    /// Messages the dictionary applies to when global.
    fn direction(&self) -> MessageDirection;

    /// Whether the dictionary applies to every message of its direction.
    fn is_global_scope(&self) -> bool;

    /// Rewrites `message` in place.
    ///
    /// # Errors
    /// Returns an error if a mapping cannot be evaluated or resolved.
    fn process(&self, message: &mut Message, context: &TestContext) -> Result<()>;
}

/// Dictionary keyed by JSONPath expressions.
///
/// Values may hold variables and functions. Replacing a number, boolean or
/// null keeps the JSON type when the new value parses as JSON.
#[derive(Debug, Clone)]
pub struct JsonPathDataDictionary {
    name: String,
    mappings: IndexMap<String, String>,
    direction: MessageDirection,
    global_scope: bool,
}

impl JsonPathDataDictionary {
    /// Empty global dictionary for both directions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mappings: IndexMap::new(),
            direction: MessageDirection::Unbound,
            global_scope: true,
        }
    }

    /// Adds a mapping.
    #[must_use]
    pub fn with_mapping(mut self, expression: impl Into<String>, value: impl Into<String>) -> Self {
        self.mappings.insert(expression.into(), value.into());
        self
    }

    /// Adds several mappings.
    #[must_use]
    pub fn with_mappings(mut self, mappings: IndexMap<String, String>) -> Self {
        self.mappings.extend(mappings);
        self
    }

    /// Restricts the dictionary to one direction.
    #[must_use]
    pub fn with_direction(mut self, direction: MessageDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets whether the dictionary applies to all messages.
    #[must_use]
    pub fn with_global_scope(mut self, global_scope: bool) -> Self {
        self.global_scope = global_scope;
        self
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn collect_pointers(
    value: &JsonValue,
    pointer: &str,
    selected: &HashSet<*const JsonValue>,
    pointers: &mut Vec<String>,
) {
    if selected.contains(&ptr::from_ref(value)) {
        pointers.push(pointer.to_owned());
    }
    match value {
        JsonValue::Object(entries) => {
            for (key, child) in entries {
                let child_pointer = format!("{pointer}/{}", escape_pointer_token(key));
                collect_pointers(child, &child_pointer, selected, pointers);
            }
        }
        JsonValue::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_pointers(child, &format!("{pointer}/{index}"), selected, pointers);
            }
        }
        _ => {}
    }
}

/// JSON pointers of all values `path` selects in `document`.
fn select_pointers(document: &JsonValue, path: &JsonPath) -> Vec<String> {
    let selected: HashSet<*const JsonValue> = path.select(document).into_iter().map(ptr::from_ref).collect();
    let mut pointers = Vec::new();
    if !selected.is_empty() {
        collect_pointers(document, "", &selected, &mut pointers);
    }
    pointers
}

fn typed_value(current: &JsonValue, value: &str) -> JsonValue {
    if current.is_string() {
        return JsonValue::String(value.to_owned());
    }
    serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_owned()))
}

impl DataDictionary for JsonPathDataDictionary {
    fn name(&self) -> &str {
        &self.name
    }

    fn direction(&self) -> MessageDirection {
        self.direction
    }

    fn is_global_scope(&self) -> bool {
        self.global_scope
    }

    fn process(&self, message: &mut Message, context: &TestContext) -> Result<()> {
        if message.payload().is_empty() || !message.payload().is_json_like() {
            debug!("Data dictionary '{}' skips message without JSON payload", self.name);
            return Ok(());
        }

        let mut document: JsonValue = serde_json::from_str(&message.payload_text()).map_err(|error| {
            Error::runtime(format!(
                "Failed to apply data dictionary '{}' - invalid JSON payload: {error}",
                self.name
            ))
        })?;

        let mut changed = false;
        for (expression, value) in &self.mappings {
            let pointers = select_pointers(&document, &JsonPath::parse(expression)?);
            if pointers.is_empty() {
                continue;
            }
            let value = context.replace_dynamic_content(value)?;
            for pointer in pointers {
                if let Some(target) = document.pointer_mut(&pointer) {
                    debug!("Data dictionary '{}' sets '{expression}' to '{value}'", self.name);
                    *target = typed_value(target, &value);
                    changed = true;
                }
            }
        }

        if changed {
            message.set_payload(serde_json::to_string(&document)?);
        }
        Ok(())
    }
}

/// Data dictionaries by name.
#[derive(Clone, Default)]
pub struct DataDictionaryRegistry {
    dictionaries: IndexMap<String, Arc<dyn DataDictionary>>,
}

impl DataDictionaryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dictionary under its own name.
    #[must_use]
    pub fn with_dictionary(mut self, dictionary: Arc<dyn DataDictionary>) -> Self {
        self.add_dictionary(dictionary);
        self
    }

    /// Adds a dictionary, replacing one with the same name.
    pub fn add_dictionary(&mut self, dictionary: Arc<dyn DataDictionary>) {
        let name = dictionary.name().to_owned();
        if self.dictionaries.contains_key(&name) {
            debug!("Overwriting data dictionary '{name}' in registry");
        }
        self.dictionaries.insert(name, dictionary);
    }

    /// Dictionary registered under `name`.
    ///
    /// # Errors
    /// Returns `Error::Runtime` if no such dictionary is registered.
    pub fn get_dictionary(&self, name: &str) -> Result<Arc<dyn DataDictionary>> {
        self.dictionaries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::runtime(format!("Unable to find data dictionary with name '{name}'")))
    }

    /// Names of all registered dictionaries.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dictionaries.keys().map(String::as_str)
    }

    /// Applies the global dictionaries of `direction`, then the dictionary
    /// named `explicit` regardless of its scope and direction.
    ///
    /// # Errors
    /// Returns an error if `explicit` is unknown or a dictionary fails.
    pub fn apply(
        &self,
        message: &mut Message,
        direction: MessageDirection,
        explicit: Option<&str>,
        context: &TestContext,
    ) -> Result<()> {
        let explicit = explicit.map(|name| self.get_dictionary(name)).transpose()?;
        for dictionary in self.dictionaries.values() {
            let is_explicit = explicit
                .as_ref()
                .is_some_and(|chosen| chosen.name() == dictionary.name());
            if dictionary.is_global_scope() && dictionary.direction().includes(direction) && !is_explicit {
                dictionary.process(message, context)?;
            }
        }
        if let Some(dictionary) = explicit {
            dictionary.process(message, context)?;
        }
        Ok(())
    }
}
