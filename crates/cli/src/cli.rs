use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(
    name = "normcalc",
    version,
    about = "Survey scope and cost estimation over normative price tables"
)]
pub struct Cli {
    /// Catalog directory (versions.json, <version>/...); builtin catalog when omitted
    #[arg(long, global = true, value_name = "PATH", env = "NORMCALC_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Normative version to use instead of date-based resolution
    #[arg(long, global = true, value_name = "TAG", env = "NORMCALC_VERSION")]
    pub norm_version: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate the technical assignment for a project description
    Assignment(AssignmentArgs),
    /// Price a work descriptor
    Estimate(EstimateArgs),
    /// List sections and price tables of the active version
    Tables(TablesArgs),
    /// Load and check every catalog document
    Verify,
    /// List known normative versions and the active one
    Versions,
}

#[derive(Debug, Args)]
pub struct AssignmentArgs {
    /// Project description JSON (`-` for stdin)
    #[arg(long, short, value_name = "PATH")]
    pub input: PathBuf,
    /// Warn about mandatory blocks without an applicable variant
    #[arg(long)]
    pub strict: bool,
    /// Apply the first holding variant in declaration order, ignoring priorities
    #[arg(long)]
    pub declaration_order: bool,
    /// Log per-block decisions
    #[arg(long)]
    pub trace_rules: bool,
    /// Also price the selected works
    #[arg(long)]
    pub estimate: bool,
    /// Site conditions JSON used with --estimate
    #[arg(long, value_name = "PATH", requires = "estimate")]
    pub conditions: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EstimateArgs {
    /// Work descriptor JSON (`-` for stdin)
    #[arg(long, short, value_name = "PATH")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    /// Only this section
    #[arg(long)]
    pub section: Option<String>,
}

impl Cli {
    /// Flags win over environment-derived configuration.
    pub fn apply_to(&self, mut config: CliConfig) -> CliConfig {
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(version) = &self.norm_version {
            config.version = Some(version.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_assignment_with_estimate() {
        let cli = Cli::try_parse_from([
            "normcalc",
            "--norm-version",
            "2024",
            "assignment",
            "-i",
            "project.json",
            "--estimate",
            "--conditions",
            "site.json",
        ])
        .unwrap();
        assert_eq!(cli.norm_version.as_deref(), Some("2024"));
        match cli.command {
            Command::Assignment(args) => {
                assert!(args.estimate);
                assert_eq!(args.conditions, Some(PathBuf::from("site.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn conditions_require_estimate() {
        assert!(Cli::try_parse_from([
            "normcalc",
            "assignment",
            "-i",
            "project.json",
            "--conditions",
            "site.json",
        ])
        .is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from(["normcalc", "--data-dir", "/tmp/norms", "versions"]).unwrap();
        let config = cli.apply_to(CliConfig {
            version: Some("2024".to_string()),
            ..CliConfig::default()
        });
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/norms")));
        assert_eq!(config.version.as_deref(), Some("2024"));
    }
}
