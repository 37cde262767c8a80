//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Each command builds a [`Report`] from a loaded [`Project`] and prints it
//! either as text or, with `--json-mode`, as pretty JSON.

use crate::project::{BindingDocument, Project};
use bindery_core::{BinderyError, ConnectionState, ExchangeConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub bindings: Vec<BindingReport>,
    pub components: Vec<ComponentReport>,
    pub mirrors: Vec<MirrorReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingReport {
    pub component: String,
    pub model: u64,
    pub primitive: String,
    pub admissible: bool,
    /// Names of the problem flags, empty when the binding is clean.
    pub problems: Vec<&'static str>,
    pub connected: bool,
}

impl BindingReport {
    fn new(document: &BindingDocument, state: ConnectionState, connected: bool) -> Self {
        Self {
            component: document.component.clone(),
            model: document.model,
            primitive: document.primitive.clone(),
            admissible: state.is_admissible(),
            problems: state.describe(),
            connected,
        }
    }
}

/// Derived parameters of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentReport {
    pub key: String,
    pub name: String,
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorReport {
    pub model: u64,
    pub network: String,
    pub bindings: usize,
    pub primitives: usize,
    pub passes: u64,
}

// =============================================================================
// RUNNERS
// =============================================================================

/// Evaluate every requested binding; nothing is created.
pub fn check_project(project: &Project) -> Result<Report, BinderyError> {
    let mut report = Report::default();
    for request in project.requests()? {
        let state = project.check(&request)?;
        report
            .bindings
            .push(BindingReport::new(request.document, state, false));
    }
    Ok(report)
}

/// Connect every binding, mirror every network and settle all updates.
pub fn sync_project(project: &mut Project) -> Result<Report, BinderyError> {
    let outcomes = project.connect_all()?;
    project.attach_networks()?;
    let exchange = project.exchange_mut();
    exchange.flush_deferred()?;
    exchange.pump()?;

    let mut report = Report {
        bindings: outcomes
            .iter()
            .map(|(document, state)| BindingReport::new(document, *state, state.is_admissible()))
            .collect(),
        ..Report::default()
    };
    report.components = component_reports(project);
    report.mirrors = mirror_reports(project);
    report.warnings = project.exchange_mut().take_warnings();
    info!(
        bindings = report.bindings.len(),
        mirrors = report.mirrors.len(),
        warnings = report.warnings.len(),
        "project synchronized"
    );
    Ok(report)
}

/// Mirror every network; descriptive bindings are left alone.
pub fn mirror_project(project: &mut Project) -> Result<Report, BinderyError> {
    project.attach_networks()?;
    project.exchange_mut().pump()?;
    Ok(Report {
        mirrors: mirror_reports(project),
        warnings: project.exchange_mut().take_warnings(),
        ..Report::default()
    })
}

fn component_reports(project: &Project) -> Vec<ComponentReport> {
    let semantic = project.exchange().semantic();
    project
        .components()
        .iter()
        .filter_map(|(key, id)| {
            let component = semantic.component(*id)?;
            let parameters: BTreeMap<_, _> = component
                .parameters
                .values()
                .filter(|p| p.generated)
                .map(|p| (p.name.clone(), p.value))
                .collect();
            if parameters.is_empty() {
                return None;
            }
            Some(ComponentReport {
                key: key.clone(),
                name: component.name.clone(),
                parameters,
            })
        })
        .collect()
}

fn mirror_reports(project: &Project) -> Vec<MirrorReport> {
    let exchange = project.exchange();
    exchange
        .mirrors()
        .map(|mirror| {
            let network = mirror.network();
            MirrorReport {
                model: mirror.model().0,
                network: network
                    .element(network.root())
                    .map(|root| root.name.clone())
                    .unwrap_or_default(),
                bindings: mirror.bindings().len(),
                primitives: exchange.model(mirror.model()).map_or(0, |m| m.len()),
                passes: mirror.passes(),
            }
        })
        .collect()
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Evaluate the requested bindings of a project.
pub fn cmd_check(path: &Path, config: ExchangeConfig, json_mode: bool) -> Result<(), BinderyError> {
    let project = Project::load(path, config)?;
    let report = check_project(&project)?;
    print_report("Bindery Admissibility Check", path, &report, json_mode)
}

/// Synchronize a project and report derived parameters.
pub fn cmd_sync(path: &Path, config: ExchangeConfig, json_mode: bool) -> Result<(), BinderyError> {
    let mut project = Project::load(path, config)?;
    let report = sync_project(&mut project)?;
    print_report("Bindery Synchronization", path, &report, json_mode)
}

/// Mirror the networks of a project.
pub fn cmd_mirror(path: &Path, config: ExchangeConfig, json_mode: bool) -> Result<(), BinderyError> {
    let mut project = Project::load(path, config)?;
    let report = mirror_project(&mut project)?;
    print_report("Bindery Network Mirror", path, &report, json_mode)
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_report(
    title: &str,
    path: &Path,
    report: &Report,
    json_mode: bool,
) -> Result<(), BinderyError> {
    if json_mode {
        let output = serde_json::to_string_pretty(report)
            .map_err(|e| BinderyError::Serialization(e.to_string()))?;
        println!("{}", output);
        return Ok(());
    }

    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!("Project: {}", path.display());

    if !report.bindings.is_empty() {
        println!();
        println!("Bindings:");
        for binding in &report.bindings {
            let status = if binding.connected {
                "connected"
            } else if binding.admissible {
                "admissible"
            } else {
                "rejected"
            };
            println!(
                "  {} -> {}/{}: {}",
                binding.component, binding.model, binding.primitive, status
            );
            for problem in &binding.problems {
                println!("      {}", problem);
            }
        }
    }

    for component in &report.components {
        println!();
        println!("{} ({}):", component.name, component.key);
        for (name, value) in &component.parameters {
            println!("  {:<24} {:.3}", name, value);
        }
    }

    if !report.mirrors.is_empty() {
        println!();
        println!("Networks:");
        for mirror in &report.mirrors {
            println!(
                "  {} in model {}: {} bindings, {} primitives",
                mirror.network, mirror.model, mirror.bindings, mirror.primitives
            );
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  {}", warning);
        }
    }

    Ok(())
}
