//! Action sequences run around tests and suites.

use glob::Pattern;
use tracing::warn;

use crate::action::ActionRef;
use crate::test_case::TestCase;

/// Actions run before or after each test, optionally filtered.
///
/// Name and package patterns are globs. With groups set, only
/// tests sharing at least one group are affected.
#[derive(Clone, Default)]
pub struct TestHook {
    actions: Vec<ActionRef>,
    name_pattern: Option<String>,
    package_pattern: Option<String>,
    groups: Vec<String>,
}

impl TestHook {
    /// Hook running `actions` for every test.
    pub fn new(actions: Vec<ActionRef>) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    /// Restricts the hook to test names matching `pattern`.
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    /// Restricts the hook to packages matching `pattern`.
    #[must_use]
    pub fn with_package_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.package_pattern = Some(pattern.into());
        self
    }

    /// Restricts the hook to tests in one of `groups`.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Hook actions.
    pub fn actions(&self) -> &[ActionRef] {
        &self.actions
    }

    /// Whether the hook runs for `test`.
    pub fn applies_to(&self, test: &TestCase) -> bool {
        let name_matches = self
            .name_pattern
            .as_deref()
            .is_none_or(|pattern| pattern_matches(pattern, test.name()));
        let package_matches = self
            .package_pattern
            .as_deref()
            .is_none_or(|pattern| pattern_matches(pattern, test.package()));
        let group_matches = self.groups.is_empty()
            || self.groups.iter().any(|group| test.groups().contains(group));
        name_matches && package_matches && group_matches
    }
}

/// Matches `text` against a glob pattern (`*`, `?`, `[a-z]`).
///
/// An invalid pattern matches nothing.
pub fn pattern_matches(pattern: &str, text: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(text),
        Err(error) => {
            warn!("Ignoring invalid hook pattern '{pattern}': {error}");
            false
        }
    }
}
