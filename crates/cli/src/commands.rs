//! Subcommand implementations. Each returns the JSON document to print.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use normcalc_core::coefficients::SiteConditions;
use normcalc_core::estimation::WorkDescriptor;
use normcalc_core::project::ProjectDescription;
use normcalc_core::rules::EvaluationOptions;
use normcalc_core::types::NormVersion;
use normcalc_pipeline::Pipeline;
use normcalc_registry::{BuiltinSource, DirectorySource, NormRegistry, NormSource, RegistryConfig};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::cli::{AssignmentArgs, Command, EstimateArgs, TablesArgs};
use crate::config::CliConfig;

/// Build the pipeline described by `config`.
pub fn build_pipeline(config: &CliConfig) -> Pipeline {
    let source: Arc<dyn NormSource> = match &config.data_dir {
        Some(dir) => Arc::new(DirectorySource::new(dir)),
        None => Arc::new(BuiltinSource::new()),
    };
    let registry_config = RegistryConfig {
        version_override: config.version.clone().map(NormVersion::from),
        reference_date: None,
        default_version: NormVersion::new(config.default_version.as_str()),
    };
    tracing::debug!(source = %source.describe(), ?registry_config, "Registry configured");
    Pipeline::new(NormRegistry::new(source, registry_config))
}

/// Read and decode a JSON document from `path`, or stdin for `-`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

pub async fn run(command: &Command, pipeline: &Pipeline) -> anyhow::Result<Value> {
    match command {
        Command::Assignment(args) => assignment(args, pipeline).await,
        Command::Estimate(args) => estimate(args, pipeline).await,
        Command::Tables(args) => tables(args, pipeline).await,
        Command::Verify => verify(pipeline).await,
        Command::Versions => versions(pipeline).await,
    }
}

async fn assignment(args: &AssignmentArgs, pipeline: &Pipeline) -> anyhow::Result<Value> {
    let project: ProjectDescription = read_json(&args.input).await?;
    let options = EvaluationOptions {
        strict_mode: args.strict,
        auto_select_highest_priority: !args.declaration_order,
        enable_logging: args.trace_rules,
    };
    let assignment = pipeline.generate_assignment(&project, None, &options).await?;

    if !args.estimate {
        return Ok(serde_json::to_value(&assignment)?);
    }

    let conditions: SiteConditions = match &args.conditions {
        Some(path) => read_json(path).await?,
        None => SiteConditions::default(),
    };
    let estimates = pipeline
        .estimate_assignment(&assignment, &conditions, None)
        .await?;
    Ok(json!({
        "assignment": assignment,
        "estimates": estimates,
    }))
}

async fn estimate(args: &EstimateArgs, pipeline: &Pipeline) -> anyhow::Result<Value> {
    let descriptor: WorkDescriptor = read_json(&args.input).await?;
    let result = pipeline.calculate_estimate(&descriptor, None).await?;
    Ok(serde_json::to_value(&result)?)
}

async fn tables(args: &TablesArgs, pipeline: &Pipeline) -> anyhow::Result<Value> {
    let registry = pipeline.registry();
    let version = registry.resolve_active_version().await;
    let sections = match &args.section {
        Some(section) => vec![section.clone()],
        None => registry.sections(Some(&version)).await?,
    };

    let mut listing = serde_json::Map::new();
    for section in sections {
        let mut entries = Vec::new();
        for code in registry.list_tables(&section, Some(&version)).await? {
            let table = registry
                .get_table(&section, &code, Some(&version))
                .await
                .with_context(|| format!("table {version}/{section}/{code}"))?;
            entries.push(json!({
                "code": table.code,
                "title": table.title,
                "schema": table.schema,
                "rows": table.rows.len(),
            }));
        }
        listing.insert(section, Value::Array(entries));
    }
    Ok(json!({ "version": version, "sections": listing }))
}

async fn verify(pipeline: &Pipeline) -> anyhow::Result<Value> {
    let report = pipeline.registry().verify().await;
    if !report.is_ok() {
        let keys: Vec<&str> = report.failures.iter().map(|f| f.key.as_str()).collect();
        tracing::warn!(failures = ?keys, "Catalog has broken documents");
    }
    Ok(serde_json::to_value(&report)?)
}

async fn versions(pipeline: &Pipeline) -> anyhow::Result<Value> {
    let registry = pipeline.registry();
    let versions = registry.versions().await?;
    let active = registry.resolve_active_version().await;
    Ok(json!({ "active": active, "versions": versions.as_slice() }))
}
