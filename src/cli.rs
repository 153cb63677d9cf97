//! Operator commands against a world's claim store.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use claimguard_claims::{
    export_json, import_json, BlockBox, BlockPos, ClaimStore, Compound, Identity, Permission,
    ProtectionRegistry, Region, LEGACY_CLAIMS_KEY, PROPERTIES_KEY,
};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::config::{ClaimsConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and edit land claims of a world", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Claim store directory (overrides the config file)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// A block position given as three coordinates.
#[derive(Args, Debug, Clone, Copy)]
pub struct PosArg {
    #[arg(allow_negative_numbers = true)]
    x: i32,
    #[arg(allow_negative_numbers = true)]
    y: i32,
    #[arg(allow_negative_numbers = true)]
    z: i32,
}

impl From<PosArg> for BlockPos {
    fn from(arg: PosArg) -> Self {
        BlockPos::new(arg.x, arg.y, arg.z)
    }
}

/// Two opposite corners of a box.
#[derive(Args, Debug, Clone, Copy)]
pub struct BoxArg {
    #[arg(allow_negative_numbers = true)]
    x1: i32,
    #[arg(allow_negative_numbers = true)]
    y1: i32,
    #[arg(allow_negative_numbers = true)]
    z1: i32,
    #[arg(allow_negative_numbers = true)]
    x2: i32,
    #[arg(allow_negative_numbers = true)]
    y2: i32,
    #[arg(allow_negative_numbers = true)]
    z2: i32,
}

impl From<BoxArg> for BlockBox {
    fn from(arg: BoxArg) -> Self {
        BlockBox::new(
            BlockPos::new(arg.x1, arg.y1, arg.z1),
            BlockPos::new(arg.x2, arg.y2, arg.z2),
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List claims, optionally only those of one owner
    List {
        #[arg(long)]
        owner: Option<Uuid>,
    },
    /// Claim a box for a player
    Claim {
        owner: Uuid,
        name: String,
        #[command(flatten)]
        bounds: BoxArg,
    },
    /// Remove every claim sharing volume with a box
    Unclaim {
        #[command(flatten)]
        bounds: BoxArg,
        /// Only remove claims of this owner
        #[arg(long)]
        owner: Option<Uuid>,
    },
    /// Ask whether an actor is blocked from an interaction at a position
    Check {
        #[command(flatten)]
        pos: PosArg,
        actor: Uuid,
        permission: Permission,
    },
    /// Open or close an interaction to everyone
    Permit {
        region: Uuid,
        permission: Permission,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    /// Add a player to a claim's whitelist
    WhitelistAdd {
        region: Uuid,
        player: Uuid,
        name: String,
    },
    /// Remove a player from a claim's whitelist by name
    WhitelistRemove { region: Uuid, name: String },
    /// Replace all claims with the contents of a JSON export
    Import { path: PathBuf },
    /// Write all claims to a JSON file
    Export { path: PathBuf },
}

/// What a command printed and whether the store must be rewritten.
#[derive(Debug, Default)]
pub struct Outcome {
    pub lines: Vec<String>,
    pub mutated: bool,
}

impl Outcome {
    fn read(lines: Vec<String>) -> Self {
        Self {
            lines,
            mutated: false,
        }
    }

    fn changed(line: String) -> Self {
        Self {
            lines: vec![line],
            mutated: true,
        }
    }
}

fn describe(region: &Region) -> String {
    format!("{} {} owner={}", region.id, region.bounds, region.owner)
}

/// Apply one command to an already loaded registry.
pub fn execute(
    command: Command,
    registry: &ProtectionRegistry,
    config: &ClaimsConfig,
) -> Result<Outcome> {
    let outcome = match command {
        Command::List { owner: Some(owner) } => Outcome::read(
            registry
                .protections_of(owner)
                .iter()
                .map(describe)
                .collect(),
        ),
        Command::List { owner: None } => Outcome::read(registry.to_string_list()),
        Command::Claim {
            owner,
            name,
            bounds,
        } => {
            let region = registry
                .try_add_protection(bounds.into(), Identity::new(owner, name))
                .context("claim rejected")?;
            Outcome::changed(format!("claimed {}", describe(&region)))
        }
        Command::Unclaim { bounds, owner } => {
            let bounds = BlockBox::from(bounds);
            let removed = match owner {
                Some(owner) => registry.remove_protection_owned(bounds, owner),
                None => registry.remove_protection(bounds),
            };
            let mut outcome = Outcome::read(
                removed
                    .iter()
                    .map(|region| format!("removed {}", describe(region)))
                    .collect(),
            );
            outcome.mutated = !removed.is_empty();
            if removed.is_empty() {
                outcome.lines.push(format!("no claim overlaps {}", bounds));
            }
            outcome
        }
        Command::Check {
            pos,
            actor,
            permission,
        } => {
            let pos = BlockPos::from(pos);
            let verdict = if registry.is_protected_against(pos, actor, permission) {
                "denied"
            } else {
                "allowed"
            };
            Outcome::read(vec![format!("{} {} at {}: {}", actor, permission, pos, verdict)])
        }
        Command::Permit {
            region,
            permission,
            value,
        } => {
            registry.set_permission(region, permission, value)?;
            Outcome::changed(format!("{} {} = {}", region, permission, value))
        }
        Command::WhitelistAdd {
            region,
            player,
            name,
        } => {
            let identity = Identity::new(player, name);
            let line = if registry.add_to_whitelist(region, identity.clone())? {
                format!("whitelisted {} on {}", identity, region)
            } else {
                format!("{} already whitelisted on {}", identity, region)
            };
            Outcome::changed(line)
        }
        Command::WhitelistRemove { region, name } => {
            if !registry.remove_from_whitelist_by_name(region, &name)? {
                bail!("{} is not on the whitelist of {}", name, region);
            }
            Outcome::changed(format!("removed {} from {}", name, region))
        }
        Command::Import { path } => {
            let mut container = import_json(&path)?;
            if !config.migrate_legacy
                && container.contains_key(LEGACY_CLAIMS_KEY)
                && !container.contains_key(PROPERTIES_KEY)
            {
                bail!(
                    "{} only holds the legacy claim tree and migrate_legacy is off",
                    path.display()
                );
            }
            let count = registry.load(&mut container);
            Outcome::changed(format!("imported {} claims from {}", count, path.display()))
        }
        Command::Export { path } => {
            let mut container = Compound::new();
            registry.save(&mut container);
            export_json(&container, &path)?;
            Outcome::read(vec![format!(
                "exported {} claims to {}",
                registry.len(),
                path.display()
            )])
        }
    };
    Ok(outcome)
}

/// Load the store, run the command, and save if anything changed.
pub fn run(cli: Cli, config: &ClaimsConfig) -> Result<Vec<String>> {
    let store_dir = cli.store_dir.unwrap_or_else(|| config.store_dir.clone());
    let store = ClaimStore::new(&store_dir)?;
    let registry = ProtectionRegistry::with_default_permissions(config.permissions());
    let loaded = store
        .load(&registry)
        .with_context(|| format!("failed to load claims from {}", store.path().display()))?;
    info!(loaded, store = %store_dir.display(), "claim store opened");

    let outcome = execute(cli.command, &registry, config)?;
    if outcome.mutated {
        store.save(&registry)?;
        info!(count = registry.len(), "claim store saved");
    }
    Ok(outcome.lines)
}
