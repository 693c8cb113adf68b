// src/cli/plan.rs
//! Planning and validation commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Show the install order (dependencies first)
    Install {
        /// Component names
        #[arg(required = true)]
        components: Vec<String>,
    },

    /// Show the removal order (dependents first)
    Uninstall {
        /// Component names
        #[arg(required = true)]
        components: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CheckCommands {
    /// Validate a component's dependencies and store the result
    Deps {
        /// Component name
        component: String,
    },
}
