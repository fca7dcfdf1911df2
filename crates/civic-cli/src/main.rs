mod config;
mod issue;
mod user;

use anyhow::{bail, Context as _, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use civic_core::accounts::authenticate;
use civic_core::directory::contact_for;
use civic_core::{Department, Session};
use civic_lifecycle::LifecycleManager;
use civic_routing::{estimate_priority, Classifier, IssueContext};
use civic_storage::{AccountStore, IssueStore};
use clap::{Args, Parser, Subcommand};
use config::Settings;
use serde_json::json;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "civic")]
#[command(about = "Civic issue reporting and routing", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Directory holding issues.json, users.json and backups/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Skip the AI service and route by keywords only
    #[arg(long, global = true)]
    offline: bool,
    #[arg(long, global = true, env = "CIVIC_USER")]
    user: Option<String>,
    #[arg(long, global = true, env = "CIVIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Log to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report, review and manage issues
    Issue {
        #[command(subcommand)]
        action: issue::IssueCommand,
    },
    /// Route a description without storing it
    Classify(ClassifyArgs),
    /// Manage staff accounts (admin)
    User {
        #[command(subcommand)]
        action: user::UserCommand,
    },
    /// Department directory
    Dept {
        #[command(subcommand)]
        action: DeptCommand,
    },
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    #[arg(long)]
    title: String,
    #[arg(long, alias = "desc", default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum DeptCommand {
    List,
}

pub struct Context {
    pub settings: Settings,
    user: Option<String>,
    password: Option<String>,
}

impl Context {
    fn new(global: GlobalArgs) -> Result<Self> {
        // The CLI runs inside the project directory
        let root = std::env::current_dir().context("Failed to resolve working directory")?;
        let settings = config::resolve_settings(
            &root,
            config::load_config(&root),
            global.data_dir.as_deref(),
            global.offline,
            |key| std::env::var(key).ok(),
        );
        debug!(data_dir = %settings.data_dir.display(), ai = settings.ai.enabled, "settings resolved");
        Ok(Self {
            settings,
            user: global.user,
            password: global.password,
        })
    }

    pub fn manager(&self) -> LifecycleManager {
        LifecycleManager::new(
            IssueStore::in_dir(&self.settings.data_dir),
            Classifier::from_config(&self.settings.ai),
        )
    }

    pub fn accounts(&self) -> AccountStore {
        AccountStore::in_dir(&self.settings.data_dir)
    }

    pub fn login(&self) -> Result<Session> {
        let (Some(user), Some(password)) = (self.user.as_deref(), self.password.as_deref()) else {
            bail!("Login required: pass --user and --password or set CIVIC_USER and CIVIC_PASSWORD");
        };
        let session = authenticate(&self.accounts().load_or_builtin(), user, password)?;
        debug!(user = %session.username, role = %session.role, "logged in");
        Ok(session)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let ctx = Context::new(cli.global)?;

    match cli.command {
        Commands::Issue { action } => issue::handle_issue_command(&ctx, action),
        Commands::Classify(args) => classify(&ctx, &args),
        Commands::User { action } => user::handle_user_command(&ctx, action),
        Commands::Dept { action } => match action {
            DeptCommand::List => list_departments(),
        },
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_enabled = verbose
        || std::env::var("CIVIC_LOG_STDERR")
            .ok()
            .is_some_and(|value| config::is_truthy(&value));
    if stderr_enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

fn classify(ctx: &Context, args: &ClassifyArgs) -> Result<()> {
    let image = match &args.image {
        Some(path) => {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            Some(STANDARD.encode(bytes))
        }
        None => None,
    };
    let context = IssueContext {
        title: args.title.clone(),
        description: args.description.clone(),
        location: args.location.clone(),
        image_provided: image.is_some(),
    };

    let classifier = Classifier::from_config(&ctx.settings.ai);
    let routed = classifier.classify(&context, image.as_deref());
    let priority = estimate_priority(&format!("{} {}", args.title, args.description));

    if args.json {
        let payload = json!({
            "department": routed.department,
            "confidence": routed.confidence,
            "method": routed.method,
            "reasoning": routed.reasoning,
            "priority": priority,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("Department: {}", routed.department);
    println!("Confidence: {:.2}", routed.confidence);
    println!("Method: {}", routed.method);
    println!("Reasoning: {}", routed.reasoning);
    println!("Priority: {priority}");
    Ok(())
}

fn list_departments() -> Result<()> {
    for department in Department::ALL {
        let contact = contact_for(department);
        println!("{department}");
        println!("  {}", department.responsibilities());
        println!("  {} / {} / {}", contact.head, contact.phone, contact.email);
    }
    Ok(())
}
