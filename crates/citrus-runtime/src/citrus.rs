//! The `Citrus` instance tying registries, hooks and reporters together.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use citrus_core::dictionary::JsonPathDataDictionary;
use citrus_core::{
    DataDictionary, EndpointFactory, EndpointRegistry, Error, FunctionRegistry, TestContext,
    TestContextFactory, ValidationMatcherRegistry,
};
use citrus_endpoints::DefaultEndpointFactory;
use citrus_validation::{default_matcher_registry, default_validator_registry};

use crate::action::{ActionRef, run_actions};
use crate::config::CitrusConfig;
use crate::hooks::TestHook;
use crate::report::{
    JsonReporter, LoggingReporter, TestActionListener, TestFlowReporter, TestListener,
    TestListeners, TestReporter, TestSuiteListener,
};
use crate::result::{TestResult, TestResults};
use crate::test_case::{TestCase, TestRunner};
use crate::yaml::{LoadError, YamlLoader};

/// Runs tests against shared registries, endpoints and reporters.
pub struct Citrus {
    config: CitrusConfig,
    context_factory: TestContextFactory,
    endpoint_factory: Arc<DefaultEndpointFactory>,
    loader: YamlLoader,
    groups: Vec<String>,
    before_test: Vec<TestHook>,
    after_test: Vec<TestHook>,
    before_suite: Vec<ActionRef>,
    after_suite: Vec<ActionRef>,
    listeners: TestListeners,
}

impl Default for Citrus {
    fn default() -> Self {
        Self::new(CitrusConfig::default())
    }
}

impl Citrus {
    /// Instance with the default libraries and validators plus the
    /// reporters enabled in `config`.
    pub fn new(config: CitrusConfig) -> Self {
        let settings = &config.citrus;
        let endpoint_factory =
            Arc::new(DefaultEndpointFactory::new().with_default_timeout(settings.receive_timeout()));
        let endpoints = EndpointRegistry::new()
            .with_factory(Arc::clone(&endpoint_factory) as Arc<dyn EndpointFactory>);
        let mut context_factory = TestContextFactory::new()
            .with_matcher_registry(default_matcher_registry())
            .with_validator_registry(default_validator_registry())
            .with_endpoint_registry(Arc::new(endpoints))
            .with_global_variables(config.variables.clone());
        for (name, dictionary) in &config.dictionaries {
            context_factory = context_factory.with_data_dictionary(Arc::new(
                JsonPathDataDictionary::new(name.as_str())
                    .with_mappings(dictionary.mappings.clone())
                    .with_direction(dictionary.direction)
                    .with_global_scope(dictionary.global),
            ));
        }
        let loader = YamlLoader::from_settings(settings);

        let mut listeners = TestListeners::new();
        if settings.logging_reporter {
            let reporter = Arc::new(LoggingReporter);
            listeners.add_test_listener(Arc::clone(&reporter) as Arc<dyn TestListener>);
            listeners.add_action_listener(Arc::clone(&reporter) as Arc<dyn TestActionListener>);
            listeners.add_suite_listener(Arc::clone(&reporter) as Arc<dyn TestSuiteListener>);
            listeners.add_reporter(reporter);
        }
        if settings.json_reporter {
            listeners.add_reporter(Arc::new(JsonReporter::new(&settings.report_dir)));
        }
        if settings.flow_reporter {
            let reporter = Arc::new(TestFlowReporter::new(&settings.report_dir));
            listeners.add_test_listener(Arc::clone(&reporter) as Arc<dyn TestListener>);
            listeners.add_action_listener(Arc::clone(&reporter) as Arc<dyn TestActionListener>);
            listeners.add_reporter(reporter);
        }

        Self {
            config,
            context_factory,
            endpoint_factory,
            loader,
            groups: Vec::new(),
            before_test: Vec::new(),
            after_test: Vec::new(),
            before_suite: Vec::new(),
            after_suite: Vec::new(),
            listeners,
        }
    }

    /// Loads `citrus.toml` style configuration from `path` and applies
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_config_file(path: &Path) -> citrus_core::Result<Self> {
        let mut config = CitrusConfig::load_or_default(path)?;
        config.apply_env_overrides();
        Ok(Self::new(config))
    }

    /// Active configuration.
    pub fn config(&self) -> &CitrusConfig {
        &self.config
    }

    /// Adds a global variable.
    #[must_use]
    pub fn with_global_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_factory = self.context_factory.with_global_variable(name, value);
        self
    }

    /// Replaces the function registry.
    #[must_use]
    pub fn with_function_registry(mut self, registry: FunctionRegistry) -> Self {
        self.context_factory = self.context_factory.with_function_registry(registry);
        self
    }

    /// Replaces the validation matcher registry.
    #[must_use]
    pub fn with_matcher_registry(mut self, registry: ValidationMatcherRegistry) -> Self {
        self.context_factory = self.context_factory.with_matcher_registry(registry);
        self
    }

    /// Registers a data dictionary with every test context.
    #[must_use]
    pub fn with_data_dictionary(mut self, dictionary: Arc<dyn DataDictionary>) -> Self {
        self.context_factory = self.context_factory.with_data_dictionary(dictionary);
        self
    }

    /// Only runs tests in one of `groups`. Empty runs everything.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Runs `hook` before every test it applies to.
    #[must_use]
    pub fn with_before_test(mut self, hook: TestHook) -> Self {
        self.before_test.push(hook);
        self
    }

    /// Runs `hook` after every test it applies to.
    #[must_use]
    pub fn with_after_test(mut self, hook: TestHook) -> Self {
        self.after_test.push(hook);
        self
    }

    /// Runs `actions` once before the suite.
    #[must_use]
    pub fn with_before_suite(mut self, actions: Vec<ActionRef>) -> Self {
        self.before_suite.extend(actions);
        self
    }

    /// Runs `actions` once after the suite.
    #[must_use]
    pub fn with_after_suite(mut self, actions: Vec<ActionRef>) -> Self {
        self.after_suite.extend(actions);
        self
    }

    /// Adds a test listener.
    #[must_use]
    pub fn with_test_listener(mut self, listener: Arc<dyn TestListener>) -> Self {
        self.listeners.add_test_listener(listener);
        self
    }

    /// Adds an action listener.
    #[must_use]
    pub fn with_action_listener(mut self, listener: Arc<dyn TestActionListener>) -> Self {
        self.listeners.add_action_listener(listener);
        self
    }

    /// Adds a suite listener.
    #[must_use]
    pub fn with_suite_listener(mut self, listener: Arc<dyn TestSuiteListener>) -> Self {
        self.listeners.add_suite_listener(listener);
        self
    }

    /// Adds a reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn TestReporter>) -> Self {
        self.listeners.add_reporter(reporter);
        self
    }

    /// Registered listeners and reporters.
    pub fn listeners(&self) -> &TestListeners {
        &self.listeners
    }

    /// Registry shared by every test context.
    pub fn endpoint_registry(&self) -> &Arc<EndpointRegistry> {
        self.context_factory.endpoint_registry()
    }

    /// Factory backing URI endpoints and declared endpoints.
    pub fn endpoint_factory(&self) -> &Arc<DefaultEndpointFactory> {
        &self.endpoint_factory
    }

    /// Loader configured with the YAML settings.
    pub fn loader(&self) -> &YamlLoader {
        &self.loader
    }

    /// Loads every YAML test under `path`.
    ///
    /// # Errors
    /// Returns the first load error.
    pub fn load_tests(&self, path: &Path) -> Result<Vec<TestCase>, LoadError> {
        self.loader.load_all(path)
    }

    /// Fresh context holding the global variables and shared registries.
    pub fn create_test_context(&self) -> TestContext {
        self.context_factory.create_context()
    }

    /// Runs one test through its full lifecycle.
    pub async fn run(&self, test: &TestCase) -> TestResult {
        let registry = self.endpoint_registry();
        for definition in test.endpoints() {
            registry.register(definition.build(&self.endpoint_factory));
        }

        TestRunner {
            test,
            context: self.create_test_context(),
            listeners: &self.listeners,
            before: &self.before_test,
            after: &self.after_test,
            default_timeout: self.config.citrus.test_timeout(),
        }
        .run()
        .await
    }

    /// Runs the tests selected by the group filter and generates all reports.
    ///
    /// A failing before-suite sequence fails every selected test without running it.
    pub async fn run_suite(&self, tests: &[TestCase]) -> TestResults {
        let selected: Vec<&TestCase> = tests
            .iter()
            .filter(|test| test.in_any_group(&self.groups))
            .collect();
        info!(
            "Running {} of {} test(s)",
            selected.len(),
            tests.len()
        );

        self.listeners.on_suite_start();
        let mut results = TestResults::new();

        let suite_context = self.create_test_context();
        match run_actions(&self.before_suite, &suite_context).await {
            Ok(()) => {
                for test in selected {
                    results.add(self.run(test).await);
                }
            }
            Err(cause) => {
                error!("Before suite failed: {cause}");
                let cause = Error::Runtime(format!("Before suite failed with errors: {cause}"));
                results.extend(
                    selected
                        .into_iter()
                        .map(|test| TestResult::failed(test.name(), test.package(), &cause)),
                );
            }
        }

        if let Err(cause) = run_actions(&self.after_suite, &suite_context).await {
            warn!("After suite failed: {cause}");
        }

        self.listeners.on_suite_finish(&results);
        self.listeners.generate_reports(&results);
        results
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use citrus_core::MessageDirection;

    use crate::action::testing::CountingAction;
    use crate::actions::FailAction;
    use crate::config::DictionaryConfig;
    use crate::yaml::load_test_str;

    use super::*;

    fn quiet_config(dir: &Path) -> CitrusConfig {
        let mut config = CitrusConfig::default();
        config.citrus.report_dir = dir.to_path_buf();
        config.citrus.logging_reporter = false;
        config.citrus.receive_timeout_ms = 500;
        config
    }

    const ROUND_TRIP: &str = r#"
name: round-trip
groups: [smoke]
endpoints:
  - direct:
      name: orders
actions:
  - send:
      endpoint: orders
      message:
        body:
          data: '{"id": ${orderId}, "user": "${user}"}'
  - receive:
      endpoint: orders
      message:
        body:
          data: '{"id": 42, "user": "@ignore@"}'
"#;

    #[tokio::test]
    async fn test_run_with_declared_endpoint_and_globals() {
        let dir = TempDir::new().unwrap();
        let mut config = quiet_config(dir.path());
        config.variables.insert("orderId".to_owned(), "42".to_owned());
        let citrus = Citrus::new(config).with_global_variable("user", "christoph");

        let test = load_test_str(ROUND_TRIP).unwrap();
        let result = citrus.run(&test).await;
        assert!(result.is_success(), "{:?}", result.cause);
        assert!(citrus.endpoint_registry().get("orders").is_some());
    }

    const DICTIONARY_AND_XML: &str = r#"
name: dictionary-and-xml
endpoints:
  - direct:
      name: orders
actions:
  - send:
      endpoint: orders
      message:
        dataDictionary: anonymize
        body:
          data: '{"id": 7, "user": "christoph"}'
  - receive:
      endpoint: orders
      message:
        body:
          data: '{"id": 7, "user": "anonymous"}'
  - send:
      endpoint: orders
      message:
        body:
          data: '<ord:order xmlns:ord="urn:orders" id="17"><ord:item>a</ord:item><ord:item>b</ord:item></ord:order>'
  - receive:
      endpoint: orders
      namespace:
        - prefix: o
          value: urn:orders
      validate:
        - path: /o:order/@id
          value: "17"
          resultType: integer
        - xpath:
            - expression: //o:item
              value: "[a, b]"
              resultType: node-set
      message:
        type: XML
"#;

    #[tokio::test]
    async fn test_configured_dictionary_and_xpath_receive() {
        let dir = TempDir::new().unwrap();
        let mut config = quiet_config(dir.path());
        config.dictionaries.insert(
            "anonymize".to_owned(),
            DictionaryConfig {
                direction: MessageDirection::Outbound,
                global: false,
                mappings: [("$.user".to_owned(), "anonymous".to_owned())].into_iter().collect(),
            },
        );
        let citrus = Citrus::new(config);

        let test = load_test_str(DICTIONARY_AND_XML).unwrap();
        let result = citrus.run(&test).await;
        assert!(result.is_success(), "{:?}", result.cause);
    }

    #[tokio::test]
    async fn test_create_test_context() {
        let citrus = Citrus::default().with_global_variable("env", "ci");
        let context = citrus.create_test_context();
        assert_eq!(context.get_variable("env").unwrap(), "ci");
        assert!(context.endpoint_registry().resolve("direct:anything").is_ok());
    }

    #[tokio::test]
    async fn test_run_suite_filters_groups_and_writes_report() {
        let dir = TempDir::new().unwrap();
        let before = CountingAction::new();
        let after = CountingAction::new();
        let citrus = Citrus::new(quiet_config(dir.path()))
            .with_groups(vec!["smoke".to_owned()])
            .with_before_suite(vec![Arc::clone(&before) as ActionRef])
            .with_after_suite(vec![Arc::clone(&after) as ActionRef]);

        let tests = vec![
            TestCase::new("included").with_groups(vec!["smoke".to_owned()]),
            TestCase::new("excluded").with_groups(vec!["slow".to_owned()]),
            TestCase::new("failing")
                .with_groups(vec!["smoke".to_owned()])
                .with_action(Arc::new(FailAction::new("boom"))),
        ];
        let results = citrus.run_suite(&tests).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results.success_count(), 1);
        assert_eq!(results.failed_names(), vec!["failing"]);
        assert_eq!(before.count(), 1);
        assert_eq!(after.count(), 1);

        let report = fs::read_to_string(dir.path().join("citrus-results.json")).unwrap();
        assert!(report.contains("\"failed\": 1"));
    }

    #[tokio::test]
    async fn test_failing_before_suite_fails_all_tests() {
        let dir = TempDir::new().unwrap();
        let body = CountingAction::new();
        let citrus = Citrus::new(quiet_config(dir.path()))
            .with_before_suite(vec![Arc::new(FailAction::new("setup broken")) as ActionRef]);

        let tests = vec![TestCase::new("never-runs").with_action(Arc::clone(&body) as ActionRef)];
        let results = citrus.run_suite(&tests).await;

        assert_eq!(results.failed_count(), 1);
        assert_eq!(body.count(), 0);
        let cause = results.results()[0].cause.clone().unwrap();
        assert!(cause.contains("Before suite failed with errors"));
    }

    #[tokio::test]
    async fn test_flow_reporter_enabled_by_config() {
        let dir = TempDir::new().unwrap();
        let mut config = quiet_config(dir.path());
        config.citrus.json_reporter = false;
        config.citrus.flow_reporter = true;
        let citrus = Citrus::new(config);
        assert_eq!(citrus.listeners().reporter_count(), 1);

        let test = TestCase::new("flow").with_action(CountingAction::new() as ActionRef);
        citrus.run_suite(&[test]).await;
        assert!(dir.path().join("flow-flow.json").exists());
    }
}
