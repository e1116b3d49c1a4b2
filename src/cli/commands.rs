//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::fulfillment::CatalogKind;
use crate::resources::ResourceType;

/// osac - Declarative provisioning against a fulfillment API.
#[derive(Parser, Debug)]
#[command(name = "osac")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "OSAC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the changes an apply would make.
    Plan {
        /// Show why each resource changes.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Create, update, replace and delete resources to match the configuration.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Continue on errors.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Read a resource or catalog entry by ID.
    Get {
        /// Kind of object.
        kind: KindArg,

        /// Object ID.
        id: String,
    },

    /// Request deletion of a single resource by ID.
    Delete {
        /// Resource kind.
        kind: ResourceArg,

        /// Resource ID.
        id: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete every recorded resource.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect or repair the local state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Show current state.
    Show,

    /// Unlock the state.
    Unlock {
        /// Lock ID to unlock.
        #[arg(long)]
        lock_id: Option<String>,

        /// Remove the lock whoever holds it.
        #[arg(long)]
        force: bool,
    },
}

/// Resource kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceArg {
    /// A cluster.
    Cluster,
    /// A compute instance.
    ComputeInstance,
    /// A host.
    Host,
    /// A host pool.
    HostPool,
}

/// Resource and catalog kinds accepted by `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// A cluster.
    Cluster,
    /// A compute instance.
    ComputeInstance,
    /// A host.
    Host,
    /// A host pool.
    HostPool,
    /// A cluster template.
    ClusterTemplate,
    /// A compute instance template.
    ComputeInstanceTemplate,
    /// A host class.
    HostClass,
}

/// What a `get` should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetTarget {
    /// A provisioned resource.
    Resource(ResourceType),
    /// A catalog entry.
    Catalog(CatalogKind),
}

impl From<ResourceArg> for ResourceType {
    fn from(arg: ResourceArg) -> Self {
        match arg {
            ResourceArg::Cluster => Self::Cluster,
            ResourceArg::ComputeInstance => Self::ComputeInstance,
            ResourceArg::Host => Self::Host,
            ResourceArg::HostPool => Self::HostPool,
        }
    }
}

impl KindArg {
    /// Resolves the kind to a resource or catalog target.
    #[must_use]
    pub const fn target(self) -> GetTarget {
        match self {
            Self::Cluster => GetTarget::Resource(ResourceType::Cluster),
            Self::ComputeInstance => GetTarget::Resource(ResourceType::ComputeInstance),
            Self::Host => GetTarget::Resource(ResourceType::Host),
            Self::HostPool => GetTarget::Resource(ResourceType::HostPool),
            Self::ClusterTemplate => GetTarget::Catalog(CatalogKind::ClusterTemplate),
            Self::ComputeInstanceTemplate => {
                GetTarget::Catalog(CatalogKind::ComputeInstanceTemplate)
            }
            Self::HostClass => GetTarget::Catalog(CatalogKind::HostClass),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
