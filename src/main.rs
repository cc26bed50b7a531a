use clap::{Parser, ValueEnum};
use dnd_singleton::{
    Backend, BackendConfig, BackendFactory, BackendOptions, Coordinator, DndProvider, DndRegistry,
    ProviderConfig, RegistrySnapshot, Scope,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::Level;

/// Replay a mount/unmount scenario against a fresh registry.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scenario as inline JSON (an array of steps).
    scenario: Option<String>,
    /// Read the scenario from a file instead.
    #[arg(long, conflicts_with = "scenario")]
    file: Option<std::path::PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
    /// Log registry activity to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Pretty,
    Text,
}

#[derive(Deserialize, Debug, Default)]
struct ProviderSpec {
    /// Named caller scope; absent means the default scope.
    #[serde(default)]
    scope: Option<String>,
    /// Named explicit manager; cannot be combined with scope/options/debug.
    #[serde(default)]
    manager: Option<String>,
    #[serde(default)]
    options: Option<Value>,
    #[serde(default)]
    debug: bool,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Mount {
        id: String,
        #[serde(flatten)]
        spec: ProviderSpec,
    },
    Rerender {
        id: String,
        #[serde(flatten)]
        spec: ProviderSpec,
    },
    Unmount {
        id: String,
    },
    Clear {
        scope: String,
    },
}

#[derive(Debug, Error)]
enum SimError {
    #[error("no scenario given; pass inline JSON or --file")]
    NoScenario,
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),
    #[error("step {step}: unknown provider `{id}`")]
    UnknownProvider { step: usize, id: String },
    #[error("step {step}: unknown scope `{scope}`")]
    UnknownScope { step: usize, scope: String },
    #[error("step {step}: `manager` cannot be combined with scope, options or debug")]
    MixedConfig { step: usize },
}

// Scope names that stand for the registry's default scope.
const DEFAULT_SCOPE_NAMES: [&str; 2] = ["global", "default"];

#[derive(Debug)]
struct SimManager {
    serial: u64,
}

#[derive(Default)]
struct SimBackend {
    created: AtomicU64,
}

impl Backend for SimBackend {
    fn name(&self) -> &'static str { "sim" }
    fn create_manager(&self, _scope: &Scope, _options: Option<&BackendOptions>, _debug_mode: bool) -> Coordinator {
        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Coordinator::new(SimManager { serial })
    }
}

#[derive(Serialize, Debug)]
struct StepReport {
    step: usize,
    op: &'static str,
    target: String,
    /// Serial of the coordinator the target provider publishes, if any.
    coordinator: Option<u64>,
    created: u64,
    registry: RegistrySnapshot,
}

struct Simulation {
    registry: Arc<DndRegistry>,
    backend: Arc<SimBackend>,
    scopes: HashMap<String, Scope>,
    managers: HashMap<String, Coordinator>,
    providers: HashMap<String, DndProvider>,
    next_manager: u64,
}

impl Simulation {
    fn new() -> Self {
        Self {
            registry: Arc::new(DndRegistry::new()),
            backend: Arc::new(SimBackend::default()),
            scopes: HashMap::new(),
            managers: HashMap::new(),
            providers: HashMap::new(),
            next_manager: 0,
        }
    }

    fn scope(&mut self, name: &str) -> Scope {
        if DEFAULT_SCOPE_NAMES.contains(&name) {
            return self.registry.default_scope().clone();
        }
        self.scopes.entry(name.to_string()).or_insert_with(|| Scope::new(name)).clone()
    }

    // Only scopes a previous step has named can be cleared.
    fn existing_scope(&self, step: usize, name: &str) -> Result<Scope, SimError> {
        if DEFAULT_SCOPE_NAMES.contains(&name) {
            return Ok(self.registry.default_scope().clone());
        }
        self.scopes.get(name).cloned().ok_or_else(|| SimError::UnknownScope {
            step,
            scope: name.to_string(),
        })
    }

    fn config(&mut self, step: usize, spec: ProviderSpec) -> Result<ProviderConfig, SimError> {
        if let Some(name) = spec.manager {
            if spec.scope.is_some() || spec.options.is_some() || spec.debug {
                return Err(SimError::MixedConfig { step });
            }
            let next = &mut self.next_manager;
            let manager = self
                .managers
                .entry(name)
                .or_insert_with(|| {
                    // Explicit managers get serials from a separate, high range.
                    *next += 1;
                    Coordinator::new(SimManager { serial: 1000 + *next })
                })
                .clone();
            return Ok(ProviderConfig::manager(manager));
        }
        let backend: BackendFactory = self.backend.clone();
        let mut cfg = BackendConfig::new(backend).with_debug(spec.debug);
        if let Some(name) = spec.scope {
            cfg = cfg.with_scope(self.scope(&name));
        }
        if let Some(options) = spec.options {
            cfg = cfg.with_options(options);
        }
        Ok(cfg.into())
    }

    fn publishes(&self, id: &str) -> Option<u64> {
        let provider = self.providers.get(id)?;
        let ctx = provider.context();
        let manager = ctx.drag_drop_manager().ok()?.downcast::<SimManager>().ok()?;
        Some(manager.serial)
    }

    fn apply(&mut self, step_no: usize, step: Step) -> Result<StepReport, SimError> {
        let (op, target) = match step {
            Step::Mount { id, spec } => {
                let config = self.config(step_no, spec)?;
                match self.providers.get_mut(&id) {
                    Some(provider) => {
                        provider.render(config);
                        provider.mount();
                    }
                    None => {
                        let mut provider = DndProvider::with_registry(self.registry.clone(), config);
                        provider.mount();
                        self.providers.insert(id.clone(), provider);
                    }
                }
                ("mount", id)
            }
            Step::Rerender { id, spec } => {
                let config = self.config(step_no, spec)?;
                let provider = self
                    .providers
                    .get_mut(&id)
                    .ok_or_else(|| SimError::UnknownProvider { step: step_no, id: id.clone() })?;
                provider.render(config);
                ("rerender", id)
            }
            Step::Unmount { id } => {
                let provider = self
                    .providers
                    .get_mut(&id)
                    .ok_or_else(|| SimError::UnknownProvider { step: step_no, id: id.clone() })?;
                provider.unmount();
                ("unmount", id)
            }
            Step::Clear { scope } => {
                let target = self.existing_scope(step_no, &scope)?;
                self.registry.clear(&target);
                ("clear", scope)
            }
        };
        Ok(StepReport {
            step: step_no,
            op,
            coordinator: self.publishes(&target),
            target,
            created: self.backend.created.load(Ordering::SeqCst),
            registry: self.registry.snapshot(),
        })
    }
}

fn run(args: &Args) -> Result<Vec<StepReport>, SimError> {
    let raw = match (&args.scenario, &args.file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(SimError::NoScenario),
    };
    replay(&raw)
}

fn replay(raw: &str) -> Result<Vec<StepReport>, SimError> {
    let steps: Vec<Step> = serde_json::from_str(raw)?;
    let mut sim = Simulation::new();
    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| sim.apply(i + 1, step))
        .collect()
}

fn text_line(report: &StepReport) -> String {
    let coordinator = report.coordinator.map_or_else(|| "-".to_string(), |c| format!("#{c}"));
    let scopes = report.registry.scopes.iter().map(|s| s.scope.as_str()).join(",");
    format!(
        "{:>3} {:<8} {:<10} coordinator={} refs={} created={} slots=[{}]",
        report.step, report.op, report.target, coordinator, report.registry.ref_count, report.created, scopes
    )
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let reports = match run(&args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Output result.
    match render_output(&reports, args.format) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("cannot encode report: {e}");
            std::process::exit(1);
        }
    }
}

fn render_output(reports: &[StepReport], format: Format) -> Result<String, serde_json::Error> {
    Ok(match format {
        Format::Json => reports
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        Format::Pretty => serde_json::to_string_pretty(reports)?,
        Format::Text => reports.iter().map(text_line).join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shared_default_singleton_is_torn_down() {
        let reports = replay(
            r#"[{"op":"mount","id":"a"},{"op":"mount","id":"b"},
                {"op":"unmount","id":"a"},{"op":"unmount","id":"b"},
                {"op":"mount","id":"a"}]"#,
        )
        .unwrap();
        let coordinators: Vec<Option<u64>> = reports.iter().map(|r| r.coordinator).collect();
        assert_eq!(coordinators, vec![Some(1), Some(1), Some(1), Some(1), Some(2)]);
        assert_eq!(reports[3].registry.ref_count, 0);
        assert!(!reports[3].registry.default_populated);
        assert_eq!(reports[4].created, 2);
    }

    #[test]
    fn test_clear_global_empties_default_slot() {
        let reports = replay(
            r#"[{"op":"mount","id":"a"},{"op":"clear","scope":"global"},{"op":"mount","id":"b"}]"#,
        )
        .unwrap();
        assert!(!reports[1].registry.default_populated);
        assert_eq!(reports[1].registry.ref_count, 1);
        assert_eq!(reports[2].coordinator, Some(2));
    }

    #[test]
    fn test_caller_scope_outlives_unmount() {
        let reports = replay(
            r#"[{"op":"mount","id":"a","scope":"panel"},{"op":"unmount","id":"a"},
                {"op":"mount","id":"b","scope":"panel"},{"op":"clear","scope":"panel"}]"#,
        )
        .unwrap();
        assert_eq!(reports[1].registry.scopes.len(), 1);
        assert_eq!(reports[2].coordinator, Some(1));
        assert_eq!(reports[2].registry.ref_count, 0);
        assert!(reports[3].registry.scopes.is_empty());
    }

    #[test]
    fn test_explicit_manager_skips_registry() {
        let reports = replay(r#"[{"op":"mount","id":"m","manager":"app"}]"#).unwrap();
        assert_eq!(reports[0].coordinator, Some(1001));
        assert_eq!(reports[0].created, 0);
        assert!(reports[0].registry.scopes.is_empty());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = replay(r#"[{"op":"unmount","id":"ghost"}]"#).unwrap_err();
        assert!(matches!(err, SimError::UnknownProvider { step: 1, ref id } if id == "ghost"));
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let err = replay(r#"[{"op":"clear","scope":"nowhere"}]"#).unwrap_err();
        assert!(matches!(err, SimError::UnknownScope { step: 1, .. }));
    }

    #[test]
    fn test_manager_mixed_with_backend_fields_is_rejected() {
        let err = replay(r#"[{"op":"mount","id":"m","manager":"app","scope":"panel"}]"#).unwrap_err();
        assert!(matches!(err, SimError::MixedConfig { step: 1 }));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(replay("not json"), Err(SimError::Json(_))));
    }

    #[test]
    fn test_json_output_is_one_line_per_step() {
        let reports = replay(r#"[{"op":"mount","id":"a"},{"op":"unmount","id":"a"}]"#).unwrap();
        let out = render_output(&reports, Format::Json).unwrap();
        let lines: Vec<Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["op"], "unmount");
        assert_eq!(lines[1]["registry"]["ref_count"], 0);
        let pretty: Value = serde_json::from_str(&render_output(&reports, Format::Pretty).unwrap()).unwrap();
        assert_eq!(pretty.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_text_line_lists_slots() {
        let reports = replay(r#"[{"op":"mount","id":"a","scope":"panel"}]"#).unwrap();
        let line = text_line(&reports[0]);
        assert!(line.contains("coordinator=#1"), "{line}");
        assert!(line.contains("slots=[panel]"), "{line}");
    }
}
