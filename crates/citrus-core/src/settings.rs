//! Framework wide constants.

use core::time::Duration;

/// Opening token of a variable expression.
pub const VARIABLE_PREFIX: &str = "${";
/// Closing token of a variable expression.
pub const VARIABLE_SUFFIX: &str = "}";
/// Wraps a variable name that must not be resolved: `${//name//}`.
pub const VARIABLE_ESCAPE: &str = "//";

/// Placeholder that skips validation of a value.
pub const IGNORE_PLACEHOLDER: &str = "@ignore@";

/// Opening token of a validation matcher expression.
pub const VALIDATION_MATCHER_PREFIX: &str = "@";
/// Closing token of a validation matcher expression.
pub const VALIDATION_MATCHER_SUFFIX: &str = "@";

/// Variable holding the running test name.
pub const TEST_NAME_VARIABLE: &str = "citrus.test.name";
/// Variable holding the running test package.
pub const TEST_PACKAGE_VARIABLE: &str = "citrus.test.package";

/// Prefix of the default function library.
pub const DEFAULT_FUNCTION_PREFIX: &str = "citrus:";

/// Receive timeout used when neither the action nor the endpoint sets one.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(5000);
/// How long a finished test waits for its async actions.
pub const DEFAULT_ASYNC_WAIT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Message type assumed when a receive action does not name one.
pub const DEFAULT_MESSAGE_TYPE: &str = "JSON";

/// File extensions recognised as YAML test sources.
pub const YAML_TEST_FILE_EXTENSIONS: &[&str] = &["yaml", "yml"];
