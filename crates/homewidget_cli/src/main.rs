//! CLI diagnostic entry point.
//!
//! # Responsibility
//! - Verify `homewidget_core` linkage (`info`).
//! - Drive producer writes and renderer reads against a real container
//!   directory without the Flutter/FFI runtime.

use clap::{Parser, Subcommand};
use homewidget_core::{
    AppGroupStore, Entry, HostBridge, ReloadSignal, RenderHost, WidgetDeployment,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(version, about = "Home-screen widget store diagnostics")]
struct Cli {
    /// Built-in deployment preset (`note`, `signal`, `tracker`).
    #[arg(long, global = true, conflicts_with = "config")]
    preset: Option<String>,

    /// TOML deployment file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per app-group partition.
    /// Defaults to the current directory.
    #[arg(long, global = true)]
    container: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print linkage and deployment info.
    Info,
    /// Merge a JSON object into the document under `key`.
    Set { key: String, document: String },
    /// Store a raw string under `key`.
    Save { key: String, value: String },
    /// Deliver a push payload (JSON object).
    Push { payload: String },
    /// Print the current snapshot entry.
    Snapshot { kind: Option<String> },
    /// Print the timeline and its refresh policy.
    Timeline { kind: Option<String> },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn resolve_deployment(cli: &Cli) -> Result<WidgetDeployment, String> {
    match (&cli.preset, &cli.config) {
        (Some(name), _) => WidgetDeployment::preset(name).map_err(|err| err.to_string()),
        (None, Some(path)) => {
            WidgetDeployment::load_from_file(path).map_err(|err| err.to_string())
        }
        (None, None) => Ok(WidgetDeployment::note_preset()),
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let deployment = resolve_deployment(&cli)?;
    let container = match cli.container {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|err| err.to_string())?,
    };
    let store = Arc::new(AppGroupStore::new(container.clone()));
    let reload = Arc::new(ReloadSignal::new());
    let bridge = HostBridge::new(&deployment, Arc::clone(&store), Arc::clone(&reload));
    let host = RenderHost::new(&deployment, store, Arc::clone(&reload));
    let default_kind = deployment.default_kind.as_str();

    match cli.command.unwrap_or(Command::Info) {
        Command::Info => {
            println!("homewidget_core ping={}", homewidget_core::ping());
            println!("homewidget_core version={}", homewidget_core::core_version());
            println!("partition={}", deployment.partition);
            println!("container={}", container.display());
        }
        Command::Set { key, document } => {
            let written = bridge
                .set_shared_document(&key, &document)
                .map_err(|err| format!("{} ({})", err, err.code()))?;
            println!("written={written}");
        }
        Command::Save { key, value } => {
            let arguments = json!({ "key": key, "value": value });
            let written = bridge
                .handle_method_call("saveWidgetData", &arguments)
                .map_err(|err| err.to_string())?;
            println!("written={written}");
        }
        Command::Push { payload } => {
            let payload = serde_json::from_str::<Value>(&payload)
                .map_err(|err| format!("payload is not valid JSON: {err}"))?;
            let outcome = bridge.deliver_push(&payload);
            println!("outcome={outcome:?}");
        }
        Command::Snapshot { kind } => {
            let kind = kind.as_deref().unwrap_or(default_kind);
            let entry = host
                .snapshot(kind)
                .ok_or_else(|| format!("unknown widget kind `{kind}`"))?;
            print_entry(&entry);
        }
        Command::Timeline { kind } => {
            let kind = kind.as_deref().unwrap_or(default_kind);
            let timeline = host
                .timeline(kind)
                .ok_or_else(|| format!("unknown widget kind `{kind}`"))?;
            for entry in timeline.entries() {
                print_entry(entry);
            }
            println!("refresh_after={}", timeline.policy().after.to_rfc3339());
        }
    }

    Ok(())
}

fn print_entry(entry: &Entry) {
    println!(
        "kind={} date={} origin={:?}",
        entry.kind,
        entry.date.to_rfc3339(),
        entry.origin
    );
    for field in &entry.fields {
        println!("  {}={}", field.name, field.value);
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_deployment, Cli, Command};
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "homewidget_cli",
            "snapshot",
            "MyHomeWidget",
            "--preset",
            "tracker",
            "--container",
            "/tmp/widgets",
        ])
        .unwrap();
        assert_eq!(cli.preset.as_deref(), Some("tracker"));
        assert_eq!(
            cli.container.as_deref(),
            Some(std::path::Path::new("/tmp/widgets"))
        );
        assert!(matches!(
            cli.command,
            Some(Command::Snapshot { kind: Some(ref kind) }) if kind == "MyHomeWidget"
        ));
        assert_eq!(
            resolve_deployment(&cli).unwrap().partition,
            "group.com.efe.lifenotes"
        );
    }

    #[test]
    fn preset_and_config_are_mutually_exclusive() {
        let err = Cli::try_parse_from([
            "homewidget_cli",
            "--preset",
            "note",
            "--config",
            "f.toml",
            "info",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn misspelled_flag_is_reported_by_name() {
        let err = Cli::try_parse_from(["homewidget_cli", "--contianer", "/x", "snapshot"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(err.to_string().contains("--contianer"));
    }

    #[test]
    fn set_requires_key_and_document() {
        let err = Cli::try_parse_from(["homewidget_cli", "set", "text_from_flutter_app"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn no_subcommand_uses_note_preset() {
        let cli = Cli::try_parse_from(["homewidget_cli"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(
            resolve_deployment(&cli).unwrap().partition,
            "group.com.efeapps.hydrodaily"
        );
    }
}
