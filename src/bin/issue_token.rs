//! Operator utility: mints API tokens and field-encryption keys.

use clap::{Parser, Subcommand};
use uuid::Uuid;

use mewayz_api::auth::{ttl_from_hours, JwtKeys, Role};
use mewayz_api::crypto::generate_key;

/// MEWAYZ token tool
#[derive(Parser, Debug)]
#[command(name = "issue-token")]
#[command(about = "Mint JWTs for the MEWAYZ API or generate an encryption key")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a signed bearer token
    Token {
        /// Signing secret (at least 32 characters)
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// User id; random when omitted
        #[arg(long)]
        user: Option<Uuid>,

        /// Workspace (tenant) id
        #[arg(long)]
        workspace: Uuid,

        /// user, manager or admin
        #[arg(long, default_value = "user")]
        role: Role,

        /// Lifetime in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// Print a fresh base64 FIELD_ENCRYPTION_KEY
    Key,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match args.command {
        Command::Token {
            secret,
            user,
            workspace,
            role,
            hours,
        } => {
            if secret.trim().len() < 32 {
                anyhow::bail!("JWT_SECRET must be at least 32 characters");
            }
            let ttl = ttl_from_hours(hours).map_err(|e| anyhow::anyhow!("--hours: {}", e))?;

            let user = user.unwrap_or_else(Uuid::new_v4);
            let token = JwtKeys::new(&secret)
                .issue(user, workspace, role, ttl)
                .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))?;

            eprintln!("user={} workspace={} role={}", user, workspace, role.as_str());
            println!("{}", token);
        }
        Command::Key => println!("{}", generate_key()),
    }

    Ok(())
}
