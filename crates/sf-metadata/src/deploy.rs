//! Deploy options.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::envelope::Params;

/// Test level for deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TestLevel {
    /// No tests run.
    #[default]
    NoTestRun,
    /// Run local tests only.
    RunLocalTests,
    /// Run all tests in org.
    RunAllTestsInOrg,
    /// Run the tests listed in `run_tests`.
    RunSpecifiedTests,
}

impl std::fmt::Display for TestLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestLevel::NoTestRun => write!(f, "NoTestRun"),
            TestLevel::RunLocalTests => write!(f, "RunLocalTests"),
            TestLevel::RunAllTestsInOrg => write!(f, "RunAllTestsInOrg"),
            TestLevel::RunSpecifiedTests => write!(f, "RunSpecifiedTests"),
        }
    }
}

/// Options for deployment.
///
/// Deserializes from the camelCase names the Metadata API uses, so a
/// `deploy_options` block in a settings file maps directly onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployOptions {
    /// Allow references to missing files in the zip.
    pub allow_missing_files: bool,
    /// Automatically update the package manifest.
    pub auto_update_package: bool,
    /// Validate only, don't actually deploy.
    pub check_only: bool,
    /// Ignore warnings during deployment.
    pub ignore_warnings: bool,
    /// Retrieve metadata after deploy.
    pub perform_retrieve: bool,
    /// Hard delete components (only in sandbox/DE orgs).
    pub purge_on_delete: bool,
    /// Rollback all changes if any component fails.
    pub rollback_on_error: bool,
    /// Run all Apex tests.
    pub run_all_tests: bool,
    /// Specific tests to run (when test_level is RunSpecifiedTests).
    pub run_tests: Vec<String>,
    /// Deploy as a single package.
    pub single_package: bool,
    pub test_level: Option<TestLevel>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            allow_missing_files: false,
            auto_update_package: false,
            check_only: false,
            ignore_warnings: true,
            perform_retrieve: false,
            purge_on_delete: false,
            rollback_on_error: true,
            run_all_tests: false,
            run_tests: vec![],
            single_package: true,
            test_level: None,
        }
    }
}

impl DeployOptions {
    /// Test level sent with the deploy.
    ///
    /// Naming test classes without a level means `RunSpecifiedTests`.
    pub fn effective_test_level(&self) -> Option<TestLevel> {
        match self.test_level {
            None if !self.run_tests.is_empty() => Some(TestLevel::RunSpecifiedTests),
            level => level,
        }
    }

    /// Options as a `DeployOptions` parameter group, in schema order.
    pub fn to_params(&self) -> Params {
        let mut params = Params::new()
            .with("allowMissingFiles", self.allow_missing_files)
            .with("autoUpdatePackage", self.auto_update_package)
            .with("checkOnly", self.check_only)
            .with("ignoreWarnings", self.ignore_warnings)
            .with("performRetrieve", self.perform_retrieve)
            .with("purgeOnDelete", self.purge_on_delete)
            .with("rollbackOnError", self.rollback_on_error)
            .with("runAllTests", self.run_all_tests);

        let test_level = self.effective_test_level();
        if !self.run_tests.is_empty() {
            if test_level == Some(TestLevel::RunSpecifiedTests) {
                params.insert("runTests", self.run_tests.clone());
            } else {
                warn!(
                    ?test_level,
                    tests = self.run_tests.len(),
                    "Ignoring runTests for this test level"
                );
            }
        }
        params.insert("singlePackage", self.single_package);
        if let Some(level) = test_level {
            params.insert("testLevel", level.to_string());
        }

        params
    }
}

/// Parameters of a `deploy` call.
pub(crate) fn deploy_params(zip_base64: String, options: &DeployOptions) -> Params {
    Params::new()
        .with("ZipFile", zip_base64)
        .with("DeployOptions", options.to_params())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ParamValue;

    #[test]
    fn test_deploy_options_default() {
        let opts = DeployOptions::default();
        assert!(!opts.allow_missing_files);
        assert!(!opts.check_only);
        assert!(opts.ignore_warnings);
        assert!(opts.rollback_on_error);
        assert!(opts.single_package);
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let opts: DeployOptions = serde_json::from_str(
            r#"{"checkOnly": true, "testLevel": "RunSpecifiedTests", "runTests": ["FooTest"]}"#,
        )
        .unwrap();

        assert!(opts.check_only);
        assert!(opts.rollback_on_error);
        assert_eq!(opts.test_level, Some(TestLevel::RunSpecifiedTests));
        assert_eq!(opts.run_tests, vec!["FooTest"]);
    }

    #[test]
    fn test_params_follow_schema_order() {
        let opts = DeployOptions {
            test_level: Some(TestLevel::RunSpecifiedTests),
            run_tests: vec!["ATest".to_string(), "BTest".to_string()],
            ..Default::default()
        };

        let params = opts.to_params();
        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "allowMissingFiles",
                "autoUpdatePackage",
                "checkOnly",
                "ignoreWarnings",
                "performRetrieve",
                "purgeOnDelete",
                "rollbackOnError",
                "runAllTests",
                "runTests",
                "singlePackage",
                "testLevel",
            ]
        );
        assert_eq!(
            params.get("runTests"),
            Some(&ParamValue::List(vec!["ATest".to_string(), "BTest".to_string()]))
        );
    }

    #[test]
    fn test_run_tests_only_for_specified_level() {
        let opts = DeployOptions {
            test_level: Some(TestLevel::RunLocalTests),
            run_tests: vec!["ATest".to_string()],
            ..Default::default()
        };
        assert!(opts.to_params().get("runTests").is_none());
    }

    #[test]
    fn test_run_tests_without_level_selects_specified_tests() {
        let opts = DeployOptions {
            run_tests: vec!["FooTest".to_string()],
            ..Default::default()
        };
        assert_eq!(opts.effective_test_level(), Some(TestLevel::RunSpecifiedTests));

        let params = opts.to_params();
        assert_eq!(
            params.get("runTests"),
            Some(&ParamValue::List(vec!["FooTest".to_string()]))
        );
        assert_eq!(
            params.get("testLevel"),
            Some(&ParamValue::Text("RunSpecifiedTests".to_string()))
        );
    }

    #[test]
    fn test_no_tests_leaves_level_unset() {
        let params = DeployOptions::default().to_params();
        assert!(params.get("runTests").is_none());
        assert!(params.get("testLevel").is_none());
    }

    #[test]
    fn test_deploy_params() {
        let params = deploy_params("UEsDBA==".to_string(), &DeployOptions::default());
        assert_eq!(params.get("ZipFile"), Some(&ParamValue::Text("UEsDBA==".to_string())));
        assert!(matches!(params.get("DeployOptions"), Some(ParamValue::Group(_))));
    }
}
