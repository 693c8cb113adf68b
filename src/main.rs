// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{BackupCommands, CheckCommands, Cli, Commands, PlanCommands};
use commands::Context;
use plinth::db::models::OperationKind;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries command output only; logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<plinth::Error>()
                .map_or(1, plinth::Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        return commands::cmd_completions(shell);
    }

    let ctx = Context::load(cli.db_path.as_deref(), cli.config.as_deref())?;

    match command {
        Commands::Init => commands::cmd_init(&ctx),
        Commands::Register { path } => commands::cmd_register(&ctx, &path),
        Commands::Unregister { name } => commands::cmd_unregister(&ctx, &name),
        Commands::List { status, updates } => commands::cmd_list(&ctx, status, updates),

        Commands::Plan(PlanCommands::Install { components }) => {
            commands::cmd_plan(&ctx, OperationKind::Install, &components)
        }
        Commands::Plan(PlanCommands::Uninstall { components }) => {
            commands::cmd_plan(&ctx, OperationKind::Uninstall, &components)
        }
        Commands::Check(CheckCommands::Deps { component }) => {
            commands::cmd_check_deps(&ctx, &component)
        }

        Commands::Install {
            components,
            allow_unmet_deps,
        } => commands::cmd_run(&ctx, OperationKind::Install, &components, allow_unmet_deps),
        Commands::Update {
            components,
            allow_unmet_deps,
        } => commands::cmd_run(&ctx, OperationKind::Update, &components, allow_unmet_deps),
        Commands::Uninstall {
            components,
            allow_unmet_deps,
        } => commands::cmd_run(&ctx, OperationKind::Uninstall, &components, allow_unmet_deps),

        Commands::Whatbreaks { component } => commands::cmd_whatbreaks(&ctx, &component),

        Commands::Backup(BackupCommands::Create {
            component,
            reason,
            important,
        }) => commands::cmd_backup_create(&ctx, &component, reason.as_deref(), important),
        Commands::Backup(BackupCommands::List { component }) => {
            commands::cmd_backup_list(&ctx, component.as_deref())
        }
        Commands::Backup(BackupCommands::Prune) => commands::cmd_backup_prune(&ctx),
        Commands::Backup(BackupCommands::Restore { snapshot_id }) => {
            commands::cmd_backup_restore(&ctx, &snapshot_id)
        }

        Commands::History { component, limit } => {
            commands::cmd_history(&ctx, component.as_deref(), limit)
        }

        Commands::Completions { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install_flags() {
        let cli = Cli::try_parse_from([
            "plinth",
            "--db-path",
            "/tmp/p.db",
            "install",
            "base",
            "ui",
            "--allow-unmet-deps",
        ])
        .unwrap();
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/p.db"));
        match cli.command {
            Some(Commands::Install {
                components,
                allow_unmet_deps,
            }) => {
                assert_eq!(components, vec!["base", "ui"]);
                assert!(allow_unmet_deps);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_parse_nested_commands() {
        let cli = Cli::try_parse_from(["plinth", "plan", "uninstall", "base"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Plan(PlanCommands::Uninstall { .. }))));

        let cli = Cli::try_parse_from(["plinth", "backup", "create", "base", "--important"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Backup(BackupCommands::Create { important: true, .. }))
        ));

        assert!(Cli::try_parse_from(["plinth", "install"]).is_err());
    }
}
