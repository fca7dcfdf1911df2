use crate::Context;
use anyhow::{bail, Context as _, Result};
use chrono::{Local, NaiveDate};
use civic_core::directory::{contact_for, estimated_resolution};
use civic_core::{Department, ExportRow, Issue, IssueFilter, IssuePriority, IssueSort, IssueStatus};
use civic_lifecycle::IssueSubmission;
use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum IssueCommand {
    /// Report a new civic issue
    Submit(SubmitArgs),
    #[command(alias = "ls")]
    List(ListArgs),
    Show(ShowArgs),
    /// Change the status of an issue (staff)
    #[command(alias = "set-status")]
    Status(StatusArgs),
    /// Move an issue to another department (staff)
    Reassign(ReassignArgs),
    /// Raise matching issues to High priority (admin)
    Escalate(EscalateArgs),
    /// Remove old resolved issues (admin)
    Cleanup(CleanupArgs),
    Export(ExportArgs),
    Stats(JsonArgs),
    Reporters(JsonArgs),
    Backup,
    /// Replace the issue store with a backup (admin)
    Restore(RestoreArgs),
    Validate(JsonArgs),
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long, alias = "desc")]
    pub description: String,
    #[arg(long)]
    pub location: String,
    #[arg(long = "name")]
    pub reporter_name: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long = "contact")]
    pub preferred_contact: Option<String>,
    #[arg(long)]
    pub priority: Option<IssuePriority>,
    /// Route manually instead of classifying
    #[arg(long)]
    pub department: Option<Department>,
    #[arg(long)]
    pub image: Option<PathBuf>,
    #[arg(long, requires = "longitude", allow_hyphen_values = true)]
    pub latitude: Option<f64>,
    #[arg(long, requires = "latitude", allow_hyphen_values = true)]
    pub longitude: Option<f64>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<IssueStatus>,
    #[arg(long, value_delimiter = ',')]
    pub department: Vec<Department>,
    #[arg(long, value_delimiter = ',')]
    pub priority: Vec<IssuePriority>,
    /// Earliest creation date, YYYY-MM-DD
    #[arg(long)]
    pub since: Option<NaiveDate>,
    /// Latest creation date, YYYY-MM-DD
    #[arg(long)]
    pub until: Option<NaiveDate>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long, alias = "query")]
    pub search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> IssueFilter {
        IssueFilter {
            statuses: self.status.clone(),
            departments: self.department.clone(),
            priorities: self.priority.clone(),
            since: self.since,
            until: self.until,
            phone: self.phone.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long, default_value_t = IssueSort::Latest)]
    pub sort: IssueSort,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub id: String,
    pub status: IssueStatus,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReassignArgs {
    pub id: String,
    pub department: Department,
}

#[derive(Args, Debug)]
pub struct EscalateArgs {
    /// Defaults to the configured escalation keywords
    #[arg(long = "keyword", value_delimiter = ',')]
    pub keywords: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Defaults to the configured retention
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,
    /// Write to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    pub backup: PathBuf,
}

#[derive(Args, Debug)]
pub struct JsonArgs {
    #[arg(long)]
    pub json: bool,
}

pub fn handle_issue_command(ctx: &Context, command: IssueCommand) -> Result<()> {
    match command {
        IssueCommand::Submit(args) => submit_issue(ctx, args),
        IssueCommand::List(args) => list_issues(ctx, &args),
        IssueCommand::Show(args) => show_issue(ctx, &args),
        IssueCommand::Status(args) => update_status(ctx, &args),
        IssueCommand::Reassign(args) => reassign_issue(ctx, &args),
        IssueCommand::Escalate(args) => escalate_issues(ctx, &args),
        IssueCommand::Cleanup(args) => cleanup_issues(ctx, &args),
        IssueCommand::Export(args) => export_issues(ctx, &args),
        IssueCommand::Stats(args) => show_stats(ctx, &args),
        IssueCommand::Reporters(args) => show_reporters(ctx, &args),
        IssueCommand::Backup => backup_issues(ctx),
        IssueCommand::Restore(args) => restore_issues(ctx, &args),
        IssueCommand::Validate(args) => validate_issues(ctx, &args),
    }
}

fn submit_issue(ctx: &Context, args: SubmitArgs) -> Result<()> {
    let image = match &args.image {
        Some(path) => Some(
            fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?,
        ),
        None => None,
    };
    let submission = IssueSubmission {
        title: args.title,
        description: args.description,
        location: args.location,
        latitude: args.latitude,
        longitude: args.longitude,
        reporter_name: args.reporter_name,
        phone: args.phone,
        email: args.email,
        preferred_contact: args.preferred_contact,
        priority: args.priority,
        department: args.department,
        image,
    };

    let issue = ctx.manager().submit_issue(submission)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&issue)?);
        return Ok(());
    }

    println!("Issue reported: {}", issue.id);
    println!("Department: {}", issue.department);
    println!(
        "Routing: {} (confidence {:.2})",
        issue.routing_method, issue.ai_confidence
    );
    println!("Priority: {}", issue.priority);
    println!(
        "Estimated resolution: {}",
        estimated_resolution(issue.department, issue.priority)
    );
    Ok(())
}

fn list_issues(ctx: &Context, args: &ListArgs) -> Result<()> {
    let issues = ctx.manager().list_issues(&args.filter.to_filter(), args.sort);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
        return Ok(());
    }
    if issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }
    for issue in &issues {
        println!("{}", issue_line(issue));
    }
    println!("{} issue(s)", issues.len());
    Ok(())
}

fn issue_line(issue: &Issue) -> String {
    let date = issue.timestamp.get(..10).unwrap_or(&issue.timestamp);
    format!(
        "- [{}] ({}/{}) {} | {} | {}",
        short_id(&issue.id),
        issue.status,
        issue.priority,
        issue.title,
        issue.department,
        date
    )
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn show_issue(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let issue = ctx.manager().get_issue(&args.id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&issue)?);
        return Ok(());
    }

    println!("ID: {}", issue.id);
    println!("Title: {}", issue.title);
    println!("Status: {}", issue.status);
    println!("Priority: {}", issue.priority);
    println!("Department: {}", issue.department);
    println!(
        "Routing: {} (confidence {:.2})",
        issue.routing_method, issue.ai_confidence
    );
    if !issue.description.is_empty() {
        println!("Description: {}", issue.description);
    }
    println!("Location: {}", issue.location);
    if let (Some(lat), Some(lon)) = (issue.latitude, issue.longitude) {
        println!("GPS: {lat:.4}, {lon:.4}");
    }
    println!("Reporter: {} ({})", issue.reporter_name, issue.phone);
    if let Some(email) = &issue.email {
        println!("Email: {email}");
    }
    println!("Preferred Contact: {}", issue.preferred_contact);
    println!("Submitted: {}", issue.timestamp);
    if let Some(updated) = &issue.last_updated {
        println!("Updated: {updated}");
    }
    if let Some(notes) = &issue.admin_notes {
        println!("Admin Notes: {notes}");
    }
    if issue.image_data.is_some() {
        println!("Image: attached");
    }
    println!(
        "Estimated Resolution: {}",
        estimated_resolution(issue.department, issue.priority)
    );
    let contact = contact_for(issue.department);
    println!(
        "Contact: {} / {} / {}",
        contact.head, contact.phone, contact.email
    );
    if !issue.reassignment_history.is_empty() {
        println!("Reassignments:");
        for entry in &issue.reassignment_history {
            println!(
                "  - {} -> {} at {} ({})",
                entry.from, entry.to, entry.timestamp, entry.reason
            );
        }
    }
    Ok(())
}

fn update_status(ctx: &Context, args: &StatusArgs) -> Result<()> {
    let session = ctx.login()?;
    let issue =
        ctx.manager()
            .update_status(&session, &args.id, args.status, args.notes.as_deref())?;
    println!("Issue {} is now {}", short_id(&issue.id), issue.status);
    Ok(())
}

fn reassign_issue(ctx: &Context, args: &ReassignArgs) -> Result<()> {
    let session = ctx.login()?;
    let issue = ctx
        .manager()
        .reassign_department(&session, &args.id, args.department)?;
    println!(
        "Issue {} reassigned to {}",
        short_id(&issue.id),
        issue.department
    );
    Ok(())
}

fn escalate_issues(ctx: &Context, args: &EscalateArgs) -> Result<()> {
    let session = ctx.login()?;
    let keywords = if args.keywords.is_empty() {
        &ctx.settings.escalation_keywords
    } else {
        &args.keywords
    };
    let escalated = ctx.manager().bulk_escalate(&session, keywords)?;
    println!(
        "Escalated {escalated} issue(s) to High priority (keywords: {})",
        keywords.join(", ")
    );
    Ok(())
}

fn cleanup_issues(ctx: &Context, args: &CleanupArgs) -> Result<()> {
    let session = ctx.login()?;
    let days = args.days.unwrap_or(ctx.settings.cleanup_days);
    let removed = ctx.manager().cleanup(&session, days)?;
    println!("Removed {removed} resolved issue(s) older than {days} days");
    Ok(())
}

fn export_issues(ctx: &Context, args: &ExportArgs) -> Result<()> {
    let rows = ctx.manager().export(&args.filter.to_filter());
    let payload = match args.format {
        ExportFormat::Json => serde_json::to_string_pretty(&rows)?,
        ExportFormat::Csv => render_csv(&rows),
    };

    match &args.output {
        Some(path) => {
            fs::write(path, payload)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} issue(s) to {}", rows.len(), path.display());
        }
        None => print!("{payload}"),
    }
    Ok(())
}

fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = csv_line(ExportRow::COLUMNS.iter().copied());
    for row in rows {
        let record = row.record();
        out.push_str(&csv_line(record.iter().map(String::as_str)));
    }
    out
}

fn csv_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut line = fields.map(csv_field).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn show_stats(ctx: &Context, args: &JsonArgs) -> Result<()> {
    let stats = ctx.manager().statistics();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let overall = &stats.overall;
    println!("Total: {}", overall.total);
    println!(
        "Pending: {}  In Progress: {}  Resolved: {}  Closed: {}",
        overall.pending, overall.in_progress, overall.resolved, overall.closed
    );
    println!("Resolution rate: {:.1}%", stats.resolution_rate);
    if !stats.departments.is_empty() {
        println!("By department:");
        for (department, tally) in &stats.departments {
            println!(
                "  {department}: {} total, {} pending, {} resolved",
                tally.total, tally.pending, tally.resolved
            );
        }
    }
    if !stats.priorities.is_empty() {
        println!("By priority:");
        for (priority, count) in &stats.priorities {
            println!("  {priority}: {count}");
        }
    }
    Ok(())
}

fn show_reporters(ctx: &Context, args: &JsonArgs) -> Result<()> {
    let reporters = ctx.manager().reporters();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reporters)?);
        return Ok(());
    }
    if reporters.is_empty() {
        println!("No reporters yet.");
        return Ok(());
    }
    for reporter in &reporters {
        println!(
            "- {} ({}): {} report(s), {} resolved, last {}",
            reporter.name,
            reporter.phone,
            reporter.total_issues,
            reporter.resolved_issues,
            reporter.last_report
        );
    }
    Ok(())
}

fn backup_issues(ctx: &Context) -> Result<()> {
    let session = ctx.login()?;
    let path = ctx.manager().backup(&session, Local::now())?;
    println!("Backup written to {}", path.display());
    Ok(())
}

fn restore_issues(ctx: &Context, args: &RestoreArgs) -> Result<()> {
    let session = ctx.login()?;
    let restored = ctx.manager().restore(&session, &args.backup)?;
    println!(
        "Restored {restored} issue(s) from {}",
        args.backup.display()
    );
    Ok(())
}

fn validate_issues(ctx: &Context, args: &JsonArgs) -> Result<()> {
    let report = ctx.manager().validate()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Total: {}  Valid: {}  Invalid: {}",
            report.total_issues, report.valid_issues, report.invalid_issues
        );
        for missing in &report.missing_fields {
            println!(
                "  record {} missing: {}",
                missing.index,
                missing.missing.join(", ")
            );
        }
        if !report.duplicate_ids.is_empty() {
            println!("  duplicate ids: {}", report.duplicate_ids.join(", "));
        }
        for error in &report.errors {
            println!("  record {}: {}", error.index, error.error);
        }
    }
    if !report.is_clean() {
        bail!("issue store failed validation");
    }
    Ok(())
}
