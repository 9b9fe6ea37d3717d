//! Command handlers.

use crate::commands::RenderOperation;
use crate::config::{CliConfig, OutputFormat};
use console::style;
use perfdag_core::layers::ConfigMap;
use perfdag_core::release::Release;
use perfdag_core::spec::BenchmarkSpec;
use perfdag_core::vars::{TaskVarsLoader, read_vars_file};
use perfdag_graph::render::{render_edges, render_trees};
use perfdag_graph::{
    BaremetalInstaller, BuildContext, DEFAULT_TASK_GROUP, E2EBenchmarks, HostEnv, Operation,
    UnitRef, UnitTree, Workflow,
};
use perfdag_secrets::{EnvProvider, FileProvider, SecretStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Validate a benchmark list.
pub fn validate(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let values = read_vars_file(Path::new(path))?.ok_or_else(|| format!("{} not found", path))?;
    let specs = BenchmarkSpec::parse_list(ConfigMap::new(path, values).require("benchmarks")?)?;

    let leaves: usize = specs.iter().map(BenchmarkSpec::leaf_count).sum();
    let groups: usize = specs.iter().map(BenchmarkSpec::group_count).sum();
    let depth = specs.iter().map(BenchmarkSpec::depth).max().unwrap_or(0);

    println!(
        "{} {} benchmarks in {} groups, nested {} deep",
        style("✓").green(),
        leaves,
        groups,
        depth
    );
    for spec in &specs {
        print_spec(spec, 1);
    }
    Ok(())
}

fn print_spec(spec: &BenchmarkSpec, depth: usize) {
    let pad = "  ".repeat(depth);
    match spec {
        BenchmarkSpec::Leaf(leaf) => {
            println!(
                "{}- {} {}",
                pad,
                style(&leaf.name).bold(),
                style(format!("({} {})", leaf.workload, leaf.command)).dim()
            );
        }
        BenchmarkSpec::Branch(branch) => {
            match &branch.group {
                Some(group) => println!("{}{}/", pad, style(group).cyan()),
                None => println!("{}{}", pad, style("(sequence)").dim()),
            }
            for child in &branch.benchmarks {
                print_spec(child, depth + 1);
            }
        }
    }
}

async fn secret_store(config: &CliConfig) -> Result<SecretStore, Box<dyn std::error::Error>> {
    let mut store = SecretStore::default();
    if let Some(path) = &config.secrets_file {
        store.register_provider(Arc::new(FileProvider::load_from_file(path).await?));
    }
    store.register_provider(Arc::new(EnvProvider::new(Some(config.env_prefix.clone()))));
    Ok(store)
}

/// Build the workflow for a release and print it.
pub async fn render(
    config: &CliConfig,
    release_path: &str,
    operation: RenderOperation,
    task_group: Option<String>,
    format: Option<OutputFormat>,
) -> Result<(), Box<dyn std::error::Error>> {
    let release: Release = serde_yaml::from_str(&std::fs::read_to_string(release_path)?)?;
    let store = secret_store(config).await?;
    let vars = TaskVarsLoader::new(&config.vars_root);
    let settings = config.dag_settings();
    let host = HostEnv::from_process();
    let ctx = BuildContext {
        release: &release,
        store: &store,
        vars: &vars,
        settings: &settings,
        host: &host,
    };

    let mut workflow = Workflow::new(release.release_name());
    let trees: Vec<UnitTree<UnitRef>> = match operation {
        RenderOperation::Benchmarks => {
            let group = task_group.as_deref().unwrap_or(DEFAULT_TASK_GROUP);
            let e2e = E2EBenchmarks::load(&ctx, group).await?;
            e2e.get_chained_benchmarks(&mut workflow)?.trees
        }
        RenderOperation::Install | RenderOperation::Scaleup => {
            let op = if operation == RenderOperation::Install {
                Operation::Install
            } else {
                Operation::Scaleup
            };
            let installer = BaremetalInstaller::load(ctx).await?;
            let plan = installer.plan(&mut workflow, op).await?;
            eprintln!(
                "{} Wrote {}",
                style("✓").green(),
                style(plan.side_channel.display()).dim()
            );
            let mut trees = vec![UnitTree::Unit(plan.install)];
            trees.extend(plan.benchmarks.trees);
            trees
        }
    };
    info!(workflow = %workflow.name(), units = workflow.len(), "Workflow built");

    let output = match format.unwrap_or(config.output_format) {
        OutputFormat::Tree => format!(
            "{}\n{}",
            render_trees(&workflow, &trees),
            render_edges(&workflow)?
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&workflow.export()?)?,
        OutputFormat::Yaml => serde_yaml::to_string(&workflow.export()?)?,
    };

    if matches!(format.unwrap_or(config.output_format), OutputFormat::Tree) {
        eprintln!(
            "{} {} ({} units, {} edges)",
            style("▶").cyan(),
            style(workflow.name()).bold(),
            workflow.len(),
            workflow.edge_count()
        );
    }
    println!("{}", store.mask_string(&output).await);
    Ok(())
}

/// Print the release descriptor schema.
pub fn schema() -> Result<(), Box<dyn std::error::Error>> {
    let schema = schemars::schema_for!(Release);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current configuration:");
    println!("  dags_root: {}", config.dags_root.display());
    println!("  vars_root: {}", config.vars_root.display());
    println!("  side_channel_dir: {}", config.side_channel_dir.display());
    println!(
        "  secrets_file: {}",
        config
            .secrets_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("  env_prefix: {}", config.env_prefix);
    println!("  executor_image: {}", config.executor_image);
    println!("  index_image: {}", config.index_image);
    println!("  output_format: {:?}", config.output_format);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }

    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value)?;
    config.save()?;

    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}
