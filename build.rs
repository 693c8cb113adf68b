// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: one or more component names
fn components_arg() -> Arg {
    Arg::new("components")
        .required(true)
        .num_args(1..)
        .help("Component names")
}

/// Common flag: warn instead of failing on unmet dependencies
fn allow_unmet_arg() -> Arg {
    Arg::new("allow_unmet_deps")
        .long("allow-unmet-deps")
        .action(ArgAction::SetTrue)
        .help("Proceed with unmet dependencies, recording them as warnings")
}

fn build_cli() -> Command {
    Command::new("plinth")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Plinth Contributors")
        .about("Component registry with dependency ordering, backups and rollback")
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .help("Database path (default: $PLINTH_DB, then config, then /var/lib/plinth/plinth.db)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (default: $PLINTH_CONFIG or /etc/plinth/plinth.toml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable debug logging"),
        )
        .subcommand(Command::new("init").about("Initialize a new plinth database"))
        .subcommand(
            Command::new("register")
                .about("Register (or refresh) a component from its directory")
                .arg(Arg::new("path").required(true).help("Component directory containing component.toml")),
        )
        .subcommand(
            Command::new("unregister")
                .about("Remove a component that is not installed from the registry")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("list")
                .about("List registered components")
                .arg(Arg::new("status").long("status").value_parser(["active", "inactive", "error"]))
                .arg(
                    Arg::new("updates")
                        .long("updates")
                        .action(ArgAction::SetTrue)
                        .help("Only show components with a newer version available"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Show execution orders without changing anything")
                .subcommand(Command::new("install").about("Install order").arg(components_arg()))
                .subcommand(Command::new("uninstall").about("Removal order").arg(components_arg())),
        )
        .subcommand(
            Command::new("check")
                .about("Validate dependencies")
                .subcommand(Command::new("deps").arg(Arg::new("component").required(true))),
        )
        .subcommand(
            Command::new("install")
                .about("Install component(s) and any registered dependencies they need")
                .arg(components_arg())
                .arg(allow_unmet_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Update installed component(s) to their registered version")
                .arg(components_arg())
                .arg(allow_unmet_arg()),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Uninstall component(s), dependents first")
                .arg(components_arg())
                .arg(allow_unmet_arg()),
        )
        .subcommand(
            Command::new("whatbreaks")
                .about("Show every registered component that depends on a component")
                .arg(Arg::new("component").required(true)),
        )
        .subcommand(
            Command::new("backup")
                .about("Manage backup links")
                .subcommand(
                    Command::new("create")
                        .about("Snapshot an installed component on demand")
                        .arg(Arg::new("component").required(true))
                        .arg(Arg::new("reason").short('r').long("reason"))
                        .arg(Arg::new("important").long("important").action(ArgAction::SetTrue)),
                )
                .subcommand(
                    Command::new("list")
                        .about("List backup links")
                        .arg(Arg::new("component")),
                )
                .subcommand(Command::new("prune").about("Delete expired auto-cleanup links"))
                .subcommand(
                    Command::new("restore")
                        .about("Restore a snapshot")
                        .arg(Arg::new("snapshot_id").required(true)),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Show installation history")
                .arg(Arg::new("component"))
                .arg(Arg::new("limit").short('l').long("limit").default_value("20")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(Arg::new("shell").required(true)),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("plinth.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
