use crate::Context;
use anyhow::Result;
use civic_core::{ensure_permission, Role};
use clap::{Args, Subcommand};
use serde::Serialize;

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum UserCommand {
    List(UserListArgs),
    Add(UserAddArgs),
    #[command(alias = "password")]
    Passwd(UserPasswdArgs),
    #[command(alias = "rm")]
    Remove(UserRemoveArgs),
}

#[derive(Args, Debug)]
pub struct UserListArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UserAddArgs {
    pub username: String,
    #[arg(long = "new-password")]
    pub new_password: String,
    #[arg(long, default_value_t = Role::Staff)]
    pub role: Role,
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct UserPasswdArgs {
    pub username: String,
    #[arg(long = "new-password")]
    pub new_password: String,
}

#[derive(Args, Debug)]
pub struct UserRemoveArgs {
    pub username: String,
}

/// Account listing without password hashes.
#[derive(Debug, Serialize)]
struct UserRow<'a> {
    username: &'a str,
    role: Role,
    name: &'a str,
}

pub fn handle_user_command(ctx: &Context, command: UserCommand) -> Result<()> {
    let session = ctx.login()?;
    ensure_permission(&session, Role::Admin)?;
    let accounts = ctx.accounts();

    match command {
        UserCommand::List(args) => {
            let book = accounts.load()?;
            let rows = book
                .iter()
                .map(|(username, account)| UserRow {
                    username,
                    role: account.role,
                    name: &account.name,
                })
                .collect::<Vec<_>>();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            for row in &rows {
                println!("- {} ({}) {}", row.username, row.role, row.name);
            }
        }
        UserCommand::Add(args) => {
            let name = args.name.as_deref().unwrap_or(&args.username);
            accounts.create_user(&args.username, &args.new_password, args.role, name)?;
            println!("Created {} account {}", args.role, args.username);
        }
        UserCommand::Passwd(args) => {
            accounts.update_password(&args.username, &args.new_password)?;
            println!("Password updated for {}", args.username);
        }
        UserCommand::Remove(args) => {
            accounts.delete_user(&args.username)?;
            println!("Removed account {}", args.username);
        }
    }
    Ok(())
}
