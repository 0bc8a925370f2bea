//! CLI binary for batchvault.
//!
//! A thin shim over the library crate: group and member management on the
//! SQLite store, and the `personalize` command that maps flags to
//! `PersonalizeConfig` and prints the result.

use anyhow::{Context, Result};
use batchvault::{
    database_path_from_url, BatchProgressCallback, BatchVaultError, CollisionPolicy,
    DatabaseLocation, Group, GroupStore, NewMember, PersonalizeConfig, Personalizer,
    ProgressCallback, SqliteStore, DEFAULT_DATABASE_URL,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// recipient.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` tells us how many recipients there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading group…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} recipients  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Stamping");
    }

    /// Closing line for the batch. Failures are the recipients reported
    /// through `on_recipient_error`.
    fn summary(&self, total: usize, success_count: usize) -> String {
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            format!("{} {} documents generated", green("✔"), bold(&success_count.to_string()))
        } else {
            format!(
                "{} {}/{} documents generated  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            )
        }
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_recipients: usize) {
        self.activate_bar(total_recipients);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Personalizing for {total_recipients} recipients…"))
        ));
    }

    fn on_recipient_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_recipient_complete(&self, index: usize, total: usize, name: &str, file_name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("→ {file_name}")),
        ));
        self.bar.inc(1);
    }

    fn on_recipient_error(&self, index: usize, total: usize, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(Some('\u{2026}')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{}", self.summary(total, success_count));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Create a group and add members
  batchvault group create Math-101
  batchvault member add 1 "Ann Lee" --contact 555-0100
  batchvault member add 1 "Bo#1" --contact 555-0101

  # Stamp a template for every member of group 1
  batchvault personalize 1 syllabus.pdf

  # Serve files from a different directory and prefix
  batchvault personalize 1 syllabus.pdf --output-dir /srv/static/pdfs --public-prefix /static/pdfs

  # Machine-readable output
  batchvault --json personalize 1 syllabus.pdf
  batchvault --json group show 1

OUTPUT NAMING:
  Each member gets "<template stem> (<member name>).pdf", keeping only ASCII
  letters, digits, spaces, '_' and '-'. When two members map to the same
  name, later ones get "_<member id>" appended (--on-collision disambiguate)
  or replace the earlier file (--on-collision overwrite).

ENVIRONMENT VARIABLES:
  DATABASE_URL               SQLite database (default: sqlite:///./batchvault.db)
  BATCHVAULT_OUTPUT_DIR      Directory documents are published into
  BATCHVAULT_PUBLIC_PREFIX   Public path prefix recorded on members
  BATCHVAULT_SCRATCH_DIR     Directory for transient uploads
  BATCHVAULT_ON_COLLISION    disambiguate | overwrite
  RUST_LOG                   Override log filter (e.g. batchvault=debug)
"#;

/// Stamp a PDF template for every member of a group.
#[derive(Parser, Debug)]
#[command(
    name = "batchvault",
    version,
    about = "Stamp a PDF template with \"Property of: <name>\" for every member of a group",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database location: sqlite:///path, sqlite::memory:, or a file path.
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database: String,

    /// Print JSON instead of human-readable output.
    #[arg(long, global = true, env = "BATCHVAULT_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BATCHVAULT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BATCHVAULT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, list and inspect groups.
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Manage group members.
    Member {
        #[command(subcommand)]
        action: MemberCommand,
    },
    /// Generate one stamped copy of a template per group member.
    Personalize(PersonalizeArgs),
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// Create an empty group.
    Create { name: String },
    /// List all groups with their member counts.
    List,
    /// Show one group and its members' output references.
    Show { group_id: i64 },
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    /// Add a member to a group.
    Add {
        group_id: i64,
        name: String,
        /// Free-form contact detail (phone, e-mail).
        #[arg(long, default_value = "")]
        contact: String,
    },
}

#[derive(Args, Debug)]
struct PersonalizeArgs {
    /// Group whose members receive a copy.
    group_id: i64,

    /// PDF template to stamp.
    template: PathBuf,

    /// Directory the generated documents are published into.
    #[arg(long, env = "BATCHVAULT_OUTPUT_DIR", default_value = "pdfs")]
    output_dir: PathBuf,

    /// Public path prefix under which the output directory is served.
    #[arg(long, env = "BATCHVAULT_PUBLIC_PREFIX", default_value = "/pdfs")]
    public_prefix: String,

    /// Directory for the transient copy of the template (default: system temp).
    #[arg(long, env = "BATCHVAULT_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// What to do when two members map to the same output file name.
    #[arg(long, env = "BATCHVAULT_ON_COLLISION", value_enum, default_value = "disambiguate")]
    on_collision: CollisionArg,

    /// Disable progress bar.
    #[arg(long, env = "BATCHVAULT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CollisionArg {
    Disambiguate,
    Overwrite,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(v: CollisionArg) -> Self {
        match v {
            CollisionArg::Disambiguate => CollisionPolicy::Disambiguate,
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs while it is shown.
    let show_progress = matches!(&cli.command, Command::Personalize(args) if !args.no_progress)
        && !cli.quiet
        && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = Arc::new(open_store(&cli.database)?);

    match &cli.command {
        Command::Group { action } => run_group(&cli, store.as_ref(), action),
        Command::Member { action } => run_member(&cli, store.as_ref(), action),
        Command::Personalize(args) => run_personalize(&cli, store, args, show_progress).await,
    }
}

fn open_store(database_url: &str) -> Result<SqliteStore> {
    let location = database_path_from_url(database_url).context("Invalid database URL")?;
    let store = match location {
        DatabaseLocation::InMemory => SqliteStore::open_in_memory(),
        DatabaseLocation::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
            SqliteStore::open(&path)
        }
    };
    store.context("Failed to open database")
}

fn run_group(cli: &Cli, store: &dyn GroupStore, action: &GroupCommand) -> Result<()> {
    match action {
        GroupCommand::Create { name } => {
            let group = store.create_group(name).context("Failed to create group")?;
            if cli.json {
                print_json(&group)?;
            } else if !cli.quiet {
                println!("{} Created group {} ({})", green("✔"), group.id, bold(&group.name));
            }
        }
        GroupCommand::List => {
            let groups = store.list_groups().context("Failed to list groups")?;
            if cli.json {
                print_json(&groups)?;
            } else {
                for group in &groups {
                    println!(
                        "{:>4}  {:<24}  {:>3} members  {}",
                        group.id,
                        group.name,
                        group.members.len(),
                        dim(&group.created_at.to_string())
                    );
                }
            }
        }
        GroupCommand::Show { group_id } => {
            let group = store
                .find_group(*group_id)
                .context("Failed to load group")?
                .ok_or(BatchVaultError::GroupNotFound {
                    group_id: *group_id,
                })?;
            if cli.json {
                print_json(&group)?;
            } else {
                print_group(&group);
            }
        }
    }
    Ok(())
}

fn run_member(cli: &Cli, store: &dyn GroupStore, action: &MemberCommand) -> Result<()> {
    match action {
        MemberCommand::Add {
            group_id,
            name,
            contact,
        } => {
            let member = store
                .add_member(*group_id, &NewMember::new(name.as_str(), contact.as_str()))
                .map_err(BatchVaultError::from)
                .context("Failed to add member")?;
            if cli.json {
                print_json(&member)?;
            } else if !cli.quiet {
                println!(
                    "{} Added member {} ({}) to group {}",
                    green("✔"),
                    member.id,
                    bold(&member.name),
                    member.group_id
                );
            }
        }
    }
    Ok(())
}

async fn run_personalize(
    cli: &Cli,
    store: Arc<SqliteStore>,
    args: &PersonalizeArgs,
    show_progress: bool,
) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb)?;

    let template = tokio::fs::read(&args.template)
        .await
        .with_context(|| format!("Failed to read template {}", args.template.display()))?;
    let template_name = args
        .template
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Template path has no file name")?;

    let personalizer = Personalizer::new(store, config);
    let report = match personalizer
        .personalize_async(args.group_id, template, template_name)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            let status = e.status_code();
            if cli.json {
                print_json(&serde_json::json!({ "detail": e.to_string(), "status": status }))?;
            }
            return Err(
                anyhow::Error::new(e).context(format!("Personalization failed (status {status})"))
            );
        }
    };

    if cli.json {
        print_json(&report.response())?;
    } else if !cli.quiet {
        println!("{}", report.response().message);
        for outcome in &report.recipients {
            match (&outcome.output_reference, &outcome.error) {
                (Some(reference), _) => {
                    println!("  {} {:<24} {}", green("✓"), outcome.member_name, reference)
                }
                (None, Some(err)) => {
                    println!("  {} {:<24} {}", red("✗"), outcome.member_name, red(&err.to_string()))
                }
                (None, None) => {}
            }
        }
    }
    for name in &report.unpublished {
        eprintln!("{} {} was recorded but could not be published", cyan("⚠"), name);
    }
    Ok(())
}

/// Map CLI args to `PersonalizeConfig`.
fn build_config(
    args: &PersonalizeArgs,
    progress: Option<ProgressCallback>,
) -> Result<PersonalizeConfig> {
    let mut builder = PersonalizeConfig::builder()
        .output_dir(&args.output_dir)
        .public_prefix(args.public_prefix.as_str())
        .collision_policy(args.on_collision.clone().into());

    if let Some(ref dir) = args.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_group(group: &Group) {
    println!("{} {}", bold(&format!("Group {}:", group.id)), group.name);
    println!("  {}", dim(&format!("created {}", group.created_at)));
    if group.members.is_empty() {
        println!("  {}", dim("(no members)"));
    }
    for member in &group.members {
        println!(
            "  {:>4}  {:<24}  {:<16}  {}",
            member.id,
            member.name,
            member.contact,
            member
                .output_reference
                .as_deref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| dim("-")),
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden_callback() -> CliProgressCallback {
        CliProgressCallback {
            bar: ProgressBar::hidden(),
            errors: AtomicUsize::new(0),
        }
    }

    #[test]
    fn summary_counts_reported_errors() {
        let cb = hidden_callback();
        cb.on_batch_start(3);
        cb.on_recipient_complete(1, 3, "Ann Lee", "syllabus (Ann Lee).pdf");
        cb.on_recipient_error(2, 3, "Bo#1", "simulated");
        cb.on_recipient_error(3, 3, "Cy", "simulated");

        let line = cb.summary(3, 1);
        assert!(line.contains("1/3 documents generated"), "{line}");
        assert!(line.contains(&red("2")), "{line}");
    }

    #[test]
    fn summary_without_errors_reports_success() {
        let cb = hidden_callback();
        cb.on_batch_start(2);
        let line = cb.summary(2, 2);
        assert!(line.contains("documents generated"), "{line}");
        assert!(!line.contains("failed"), "{line}");
    }
}
