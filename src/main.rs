//! keyscope CLI: inspect the binding catalog and customization files from
//! the command line. The engine library does the real work; this binary is
//! a thin reporting surface for settings screens, debugging, and CI checks
//! (`conflicts` exits nonzero when the catalog has duplicate keys).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use keyscope::builtins::default_registry;
use keyscope::config::EngineConfig;
use keyscope::conflict::{detect, Conflict, ConflictKind};
use keyscope::customize::{CustomizationSet, SCHEMA_VERSION};
use keyscope::engine::Engine;
use keyscope::format::format_keys;
use keyscope::keys::{KeySpec, Platform};
use keyscope::logging;
use keyscope::resolve::resolve;
use keyscope::store::{CustomizationStore, JsonFileStore};

#[derive(Parser)]
#[command(name = "keyscope", version, about = "Keybinding catalog and customization tool")]
struct Cli {
    /// Customization file to apply (defaults to the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    customizations: Option<PathBuf>,

    /// Resolve and render for this platform instead of the current one
    #[arg(long, global = true, value_enum)]
    platform: Option<PlatformArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every binding with its effective keys, grouped by scope
    Cheatsheet {
        /// Only show bindings for one scope (e.g. "global", "list")
        #[arg(long)]
        scope: Option<String>,
    },
    /// List duplicate-key and reserved-shortcut conflicts
    Conflicts {
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check a customization file without applying it
    Validate {
        /// File to check
        file: PathBuf,
    },
    /// Render a canonical key string the way the cheat sheet would
    Format {
        /// Canonical keys, e.g. "mod+shift+k" or "g>d"
        keys: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Macos,
    Windows,
    Linux,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Macos => Platform::MacOs,
            PlatformArg::Windows => Platform::Windows,
            PlatformArg::Linux => Platform::Linux,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let _guard = logging::init();
    let cli = Cli::parse();

    let platform = cli
        .platform
        .map(Platform::from)
        .unwrap_or_else(Platform::current);
    let config = match cli.platform {
        Some(arg) => EngineConfig::with_platform(arg.into()),
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Cheatsheet { scope } => {
            let set = load_customizations(cli.customizations.as_deref())?;
            let engine = Engine::with_customizations(default_registry(), config, set);
            print_cheat_sheet(&engine, scope.as_deref())
        }
        Command::Conflicts { json } => {
            let set = load_customizations(cli.customizations.as_deref())?;
            let resolved = resolve(&default_registry(), &set);
            let conflicts = detect(&resolved, platform);
            print_conflicts(&conflicts, json)
        }
        Command::Validate { file } => validate_file(&file),
        Command::Format { keys } => {
            let spec = KeySpec::parse(&keys)?;
            println!("{}", format_keys(&spec.canonical(), platform));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_customizations(path: Option<&std::path::Path>) -> anyhow::Result<CustomizationSet> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(JsonFileStore::default_path);
    JsonFileStore::new(&path)
        .load()
        .with_context(|| format!("could not read customizations from {}", path.display()))
}

fn print_cheat_sheet(engine: &Engine, scope_filter: Option<&str>) -> anyhow::Result<ExitCode> {
    let mut sections = engine.cheat_sheet();
    if let Some(filter) = scope_filter {
        sections.retain(|section| section.scope.as_str() == filter);
        if sections.is_empty() {
            anyhow::bail!("no bindings in scope '{filter}'");
        }
    }

    for section in &sections {
        let title = if section.scope.is_global() {
            "Global".to_string()
        } else {
            section.scope.as_str().to_string()
        };
        println!("{title}");
        for (category, bindings) in &section.categories {
            println!("  {}", category.label());
            for binding in bindings {
                let keys = engine.format_keys(&binding.effective_keys_text());
                let mut line = format!("    {keys:<20} {}", binding.description);
                if binding.is_customized {
                    line.push_str("  [customized]");
                }
                if !binding.is_enabled {
                    line.push_str("  [disabled]");
                }
                println!("{line}");
            }
        }
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

fn print_conflicts(conflicts: &[Conflict], json: bool) -> anyhow::Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(conflicts)?);
    } else if conflicts.is_empty() {
        println!("No conflicts.");
    } else {
        for conflict in conflicts {
            match conflict.kind {
                ConflictKind::DuplicateKeys => {
                    println!(
                        "duplicate  {:<14} {}  (scopes: {})",
                        conflict.keys,
                        join_ids(conflict),
                        conflict
                            .scopes
                            .iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    );
                }
                ConflictKind::Reserved => {
                    println!(
                        "reserved   {:<14} {}  blocked by: {}",
                        conflict.keys,
                        join_ids(conflict),
                        conflict.reserved_label.as_deref().unwrap_or("host shortcut"),
                    );
                }
            }
        }
    }

    // Reserved entries are advisory; only duplicates fail the check.
    let has_duplicates = conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::DuplicateKeys);
    Ok(if has_duplicates {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn join_ids(conflict: &Conflict) -> String {
    conflict
        .binding_ids
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_file(path: &std::path::Path) -> anyhow::Result<ExitCode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let set: CustomizationSet = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid customization file", path.display()))?;

    if set.schema_version > SCHEMA_VERSION {
        println!(
            "note: schemaVersion {} is newer than this build supports ({}), entries apply best-effort",
            set.schema_version, SCHEMA_VERSION
        );
    }

    let registry = default_registry();
    let mut checked = 0usize;
    let mut invalid = 0usize;

    let mut ids: Vec<_> = set.customizations.keys().collect();
    ids.sort();
    for id in ids {
        let customization = &set.customizations[id];
        checked += 1;
        if !registry.contains(id.as_str()) {
            println!("note: unknown binding id '{id}' (kept, has no effect)");
        }
        if let Some(keys) = customization.keys_override() {
            if let Err(error) = KeySpec::parse(keys) {
                println!("error: invalid keys for '{id}': {error}");
                invalid += 1;
            }
        }
    }

    println!(
        "{checked} customization(s) checked, {invalid} invalid, {} scope(s) disabled",
        set.disabled_scopes.len()
    );
    Ok(if invalid > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
