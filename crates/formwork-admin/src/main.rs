//! `formwork`: operator CLI for a Formwork store.
//!
//! Reads `formwork.toml` (or the path given with `--config`) layered with
//! `FORMWORK_*` environment variables, opens the SQLite store and runs one
//! administrative command as an authenticated user.
//!
//! # Usage
//!
//! ```
//! formwork init --username admin --email admin@example.com
//! formwork --user admin delete form 12
//! formwork --user admin grant 3 17
//! formwork hash-password
//! ```

mod auth;
mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use formwork_core::{
  access::NewUser,
  graph::{EntityKind, EntityRef},
  id::{EnvironmentId, PermissionId, RoleId},
  service::Service,
  store::FormStore,
};
use formwork_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::settings::AdminConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "formwork", version, about = "Formwork store administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "formwork.toml")]
  config: PathBuf,

  /// Acting username.
  #[arg(long, env = "FORMWORK_USER", global = true)]
  user: Option<String>,

  /// Acting user's password (plaintext). Prompted for when omitted.
  #[arg(long, env = "FORMWORK_PASSWORD", global = true, hide_env_values = true)]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create the schema, seed built-in rows and the first admin user.
  Init {
    #[arg(long)]
    username:   String,
    #[arg(long)]
    email:      String,
    #[arg(long, default_value = "Site")]
    first_name: String,
    #[arg(long, default_value = "Administrator")]
    last_name:  String,
  },
  /// Print the argon2 hash for a password entered on stdin.
  HashPassword,
  /// Delete a record and everything it owns.
  Delete {
    #[arg(value_parser = parse_kind)]
    kind: EntityKind,
    id:   i64,
  },
  /// Clear the tombstone on a single record.
  Restore {
    #[arg(value_parser = parse_kind)]
    kind: EntityKind,
    id:   i64,
  },
  /// Grant a permission to a role.
  Grant { role: i64, permission: i64 },
  /// Revoke a permission from a role.
  Revoke { role: i64, permission: i64 },
  /// Show the acting user's effective permissions.
  Permissions,
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
  s.replace('-', "_")
    .parse()
    .map_err(|_| format!("unknown record kind `{s}`"))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  if let Command::HashPassword = cli.command {
    let password = read_password()?;
    println!("{}", auth::hash_password(&password)?);
    return Ok(());
  }

  let cfg = AdminConfig::load(&cli.config)?;
  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let service = Service::new(store, cfg.policy());

  if let Command::Init { username, email, first_name, last_name } = cli.command {
    return init(&service, cli.password, username, email, first_name, last_name).await;
  }

  let user = cli.user.context("--user (or FORMWORK_USER) is required")?;
  let password = match cli.password {
    Some(p) => p,
    None => read_password()?,
  };
  auth::authenticate(service.store(), &user, &password).await?;

  match cli.command {
    Command::Delete { kind, id } => {
      let stats = service.delete(&user, EntityRef::new(kind, id)).await?;
      print_json(&stats)
    }
    Command::Restore { kind, id } => {
      let target = EntityRef::new(kind, id);
      match service.restore(&user, target).await? {
        Some(record) => print_json(&record),
        None => {
          println!("{target} is not deleted");
          Ok(())
        }
      }
    }
    Command::Grant { role, permission } => {
      let grant = service
        .grant(&user, RoleId(role), PermissionId(permission))
        .await?;
      print_json(&grant)
    }
    Command::Revoke { role, permission } => {
      let stats = service
        .revoke(&user, RoleId(role), PermissionId(permission))
        .await?;
      print_json(&stats)
    }
    Command::Permissions => print_json(&service.effective_permissions(&user).await?),
    Command::Init { .. } | Command::HashPassword => Ok(()),
  }
}

/// Seed the store and create the first super user in the admin environment.
/// Re-running is safe: seeding is idempotent and an existing user is kept.
async fn init(
  service: &Service<SqliteStore>,
  password: Option<String>,
  username: String,
  email: String,
  first_name: String,
  last_name: String,
) -> Result<()> {
  let report = service.bootstrap().await.context("bootstrap failed")?;
  print_json(&report)?;

  let store = service.store();
  if store.find_user(&username).await?.is_some() {
    info!(%username, "admin user already exists");
    return Ok(());
  }
  let password = match password {
    Some(p) => p,
    None => read_password()?,
  };
  let user = store
    .create_user(NewUser {
      first_name,
      last_name,
      email,
      contact_number: None,
      username,
      password_hash: auth::hash_password(&password)?,
      role_id: RoleId::ROOT,
      environment_id: EnvironmentId::ADMIN,
    })
    .await
    .context("failed to create admin user")?;
  info!(username = %user.username, id = %user.id, "admin user created");
  print_json(&user)
}

fn print_json(value: &impl Serialize) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Read a password from stdin.
fn read_password() -> Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
