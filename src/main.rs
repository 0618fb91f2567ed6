use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use branch_protector::{Config, Protector};

#[derive(Parser)]
#[command(name = "branch-protector")]
#[command(about = "Apply uniform branch protection to every project in a set of GitLab groups")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report what would change without modifying any protection rule
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Protect the configured branches in every project (default)
    Run,

    /// List the projects of each configured group
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting branch-protector v{}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are fatal before any request is made
    let config = Config::from_env()?.with_dry_run(cli.dry_run);
    let protector = Protector::new(config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(&protector).await,
        Commands::List => cmd_list(&protector).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Reconcile protections and print a summary
async fn cmd_run(protector: &Protector) -> Result<()> {
    let config = protector.config();
    if config.dry_run {
        println!("🔍 Dry run mode - no protection rules will be changed");
    }

    let summary = protector.run().await?;

    println!("\n🎉 Branch protection run complete!");
    println!("   📁 Groups processed: {}", summary.groups_processed);
    println!("   📦 Projects visited: {}", summary.projects_visited);
    if config.dry_run {
        println!("   📝 Planned changes: {}", summary.planned);
    } else {
        println!("   🔒 Newly protected: {}", summary.protected);
        println!("   🔄 Updated in place: {}", summary.updated);
    }
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed > 0 {
        println!("\n🔍 Failed branches:");
        for result in summary.failures() {
            println!(
                "   ❌ {} / {} (ID: {}) {}: {}",
                result.group, result.project_name, result.project_id, result.branch, result.outcome
            );
        }
    }

    Ok(())
}

/// List the projects of every configured group
async fn cmd_list(protector: &Protector) -> Result<()> {
    for (group, projects) in protector.list().await? {
        println!("Group {} ({} projects):", group, projects.len());
        for project in projects {
            let archived = if project.archived { " [archived]" } else { "" };
            println!("  📁 {} (ID: {}){}", project.display_name(), project.id, archived);
            if let Some(branch) = &project.default_branch {
                println!("     🌿 default branch: {}", branch);
            }
            if let Some(url) = &project.web_url {
                println!("     🔗 {}", url);
            }
        }
    }

    Ok(())
}
