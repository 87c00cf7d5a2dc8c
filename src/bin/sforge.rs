//! `sforge` command line: retrieve, deploy, cancel and rename metadata.
//!
//! ```sh
//! export SF_USERNAME=dev@example.com SF_PASSWORD=... SF_SECURITY_TOKEN=...
//! sforge retrieve --member ApexClass:* --out workspace
//! sforge deploy workspace/src --check-only --test-level RunLocalTests
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sforge::archive;
use sforge::metadata::{DeployOptions, PackageManifest, Report, RetrieveRequest, TestLevel};
use sforge::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sforge")]
#[command(about = "Deploy and retrieve Salesforce metadata", long_about = None)]
struct Cli {
    /// Settings file; `SF_*` environment variables override it
    #[arg(long, global = true, default_value = "sforge.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve metadata into a directory
    Retrieve {
        /// Component as `Type:Name`, repeatable; `Type:*` for all of a type
        #[arg(long = "member", value_name = "TYPE:NAME")]
        members: Vec<String>,
        /// Installed package to retrieve, repeatable
        #[arg(long = "package")]
        packages: Vec<String>,
        /// Directory to extract into
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Do not write `src/package.xml`
        #[arg(long)]
        ignore_package_xml: bool,
    },
    /// Deploy a directory holding package.xml and its components
    Deploy {
        dir: PathBuf,
        /// Validate without saving
        #[arg(long)]
        check_only: bool,
        #[arg(long, value_parser = parse_test_level)]
        test_level: Option<TestLevel>,
        /// Test class to run with RunSpecifiedTests, repeatable
        #[arg(long = "run-test")]
        run_tests: Vec<String>,
    },
    /// Deploy a recent validation without running tests again
    QuickDeploy { validation_id: String },
    /// Request cancellation of a deploy
    Cancel { job_id: String },
    /// Check any async process once
    Status { job_id: String },
    /// Rename a component
    Rename {
        metadata_type: String,
        old_name: String,
        new_name: String,
    },
}

fn parse_test_level(value: &str) -> std::result::Result<TestLevel, String> {
    match value {
        "NoTestRun" => Ok(TestLevel::NoTestRun),
        "RunLocalTests" => Ok(TestLevel::RunLocalTests),
        "RunAllTestsInOrg" => Ok(TestLevel::RunAllTestsInOrg),
        "RunSpecifiedTests" => Ok(TestLevel::RunSpecifiedTests),
        other => Err(format!("unknown test level `{other}`")),
    }
}

/// Group `Type:Name` pairs into a manifest, keeping first-seen type order.
fn manifest_from_members(api_version: &str, members: &[String]) -> Result<PackageManifest> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for member in members {
        let Some((kind, name)) = member.split_once(':') else {
            bail!("member `{member}` must look like Type:Name");
        };
        match grouped.iter_mut().find(|(k, _)| k == kind) {
            Some((_, names)) => names.push(name.to_string()),
            None => grouped.push((kind.to_string(), vec![name.to_string()])),
        }
    }
    Ok(grouped
        .into_iter()
        .fold(PackageManifest::new(api_version), |manifest, (kind, names)| {
            manifest.add_type(kind, names)
        }))
}

/// Settings deploy options overlaid with the command line flags.
fn deploy_options(
    settings: &Settings,
    check_only: bool,
    test_level: Option<TestLevel>,
    run_tests: Vec<String>,
) -> DeployOptions {
    let mut options = settings.deploy_options.clone();
    options.check_only |= check_only;
    if test_level.is_some() {
        options.test_level = test_level;
    }
    if !run_tests.is_empty() {
        options.run_tests = run_tests;
    }
    options
}

fn load_settings(path: &PathBuf) -> Result<Settings> {
    if path.exists() {
        return Settings::load(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut settings = Settings::default();
    settings.apply_env();
    Ok(settings)
}

fn print_report(report: &Report) -> ExitCode {
    println!("{report}");
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sforge=info,sforge_metadata=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.settings)?;
    let client = settings.metadata_client()?;

    match cli.command {
        Commands::Retrieve {
            members,
            packages,
            out,
            ignore_package_xml,
        } => {
            if members.is_empty() && packages.is_empty() {
                bail!("nothing to retrieve: pass --member or --package");
            }
            let mut request = if members.is_empty() {
                RetrieveRequest::new(settings.api_version.clone())
            } else {
                RetrieveRequest::unpackaged(manifest_from_members(&settings.api_version, &members)?)
            };
            if !packages.is_empty() {
                request = request.with_package_names(packages);
            }

            let report = client.retrieve(&request).await?;
            if let Some(zip) = &report.zip_file {
                let files = archive::extract_encoded(zip, &out, ignore_package_xml)?;
                println!("Extracted {} files to {}", files.len(), out.display());
            }
            Ok(print_report(&report))
        }
        Commands::Deploy {
            dir,
            check_only,
            test_level,
            run_tests,
        } => {
            let options = deploy_options(&settings, check_only, test_level, run_tests);
            let zip = archive::pack_directory_base64(&dir)
                .with_context(|| format!("packing {}", dir.display()))?;
            let report = client.deploy_base64(zip, &options).await?;
            Ok(print_report(&report))
        }
        Commands::QuickDeploy { validation_id } => {
            let report = client.deploy_recent_validation(&validation_id).await?;
            Ok(print_report(&report))
        }
        Commands::Cancel { job_id } => {
            let result = client.cancel_deploy(&job_id).await?;
            println!("Cancel requested for {} (done: {})", result.id, result.done);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { job_id } => {
            let status = client.check_status(&job_id).await?;
            println!("{}", status.progress_line("status"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rename {
            metadata_type,
            old_name,
            new_name,
        } => {
            let result = client
                .rename_metadata(&metadata_type, &old_name, &new_name)
                .await?;
            if result.success {
                println!("Renamed {old_name} to {}", result.full_name);
                return Ok(ExitCode::SUCCESS);
            }
            for error in &result.errors {
                eprintln!("{}: {}", error.status_code, error.message);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_groups_members_by_type() {
        let members = vec![
            "ApexClass:Foo".to_string(),
            "ApexTrigger:*".to_string(),
            "ApexClass:Bar".to_string(),
        ];
        let manifest = manifest_from_members("62.0", &members).unwrap();

        assert_eq!(manifest.types.len(), 2);
        assert_eq!(manifest.types[0].name, "ApexClass");
        assert_eq!(manifest.types[0].members, vec!["Foo", "Bar"]);
        assert_eq!(manifest.types[1].members, vec!["*"]);
    }

    #[test]
    fn test_member_without_type_is_rejected() {
        assert!(manifest_from_members("62.0", &["Foo".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_deploy() {
        let cli = Cli::try_parse_from([
            "sforge",
            "deploy",
            "src",
            "--check-only",
            "--test-level",
            "RunSpecifiedTests",
            "--run-test",
            "FooTest",
        ])
        .unwrap();
        match cli.command {
            Commands::Deploy {
                check_only,
                test_level,
                run_tests,
                ..
            } => {
                assert!(check_only);
                assert_eq!(test_level, Some(TestLevel::RunSpecifiedTests));
                assert_eq!(run_tests, vec!["FooTest"]);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_run_test_flag_alone_runs_those_tests() {
        let cli = Cli::try_parse_from(["sforge", "deploy", "src", "--run-test", "FooTest"]).unwrap();
        let Commands::Deploy {
            check_only,
            test_level,
            run_tests,
            ..
        } = cli.command
        else {
            panic!("expected deploy");
        };

        let options = deploy_options(&Settings::default(), check_only, test_level, run_tests);
        let params = options.to_params();
        assert!(params.get("runTests").is_some());
        assert_eq!(options.effective_test_level(), Some(TestLevel::RunSpecifiedTests));
    }
}
