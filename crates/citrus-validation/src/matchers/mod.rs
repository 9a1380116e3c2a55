//! The default validation matcher library.

/// String, number, date and null matchers.
pub mod builtin;
/// The `assertThat` Hamcrest matcher.
pub mod hamcrest;

use citrus_core::ValidationMatcherLibrary;

pub use hamcrest::HamcrestValidationMatcher;

/// Name of the default matcher library.
pub const DEFAULT_MATCHER_LIBRARY: &str = "citrusValidationMatcherLibrary";

/// Builds the default matcher library, registered without prefix.
pub fn default_matcher_library() -> ValidationMatcherLibrary {
    ValidationMatcherLibrary::new(DEFAULT_MATCHER_LIBRARY, "")
        .with_matcher("equalsIgnoreCase", builtin::equals_ignore_case)
        .with_matcher("ignoreNewLine", builtin::ignore_new_line)
        .with_matcher("trim", builtin::trim)
        .with_matcher("trimAllWhitespaces", builtin::trim_all_whitespaces)
        .with_matcher("contains", builtin::contains)
        .with_matcher("containsIgnoreCase", builtin::contains_ignore_case)
        .with_matcher("startsWith", builtin::starts_with)
        .with_matcher("endsWith", builtin::ends_with)
        .with_matcher("matches", builtin::matches)
        .with_matcher("matchesDatePattern", builtin::matches_date_pattern)
        .with_matcher("isNumber", builtin::is_number)
        .with_matcher("lowerThan", builtin::lower_than)
        .with_matcher("greaterThan", builtin::greater_than)
        .with_matcher("isWeekday", builtin::is_weekday)
        .with_matcher("variable", builtin::variable)
        .with_matcher("ignore", builtin::ignore)
        .with_matcher("stringLength", builtin::string_length)
        .with_matcher("dateRange", builtin::date_range)
        .with_matcher("empty", builtin::empty)
        .with_matcher("notEmpty", builtin::not_empty)
        .with_matcher("null", builtin::null)
        .with_matcher("notNull", builtin::not_null)
        .with_matcher("assertThat", HamcrestValidationMatcher)
}
