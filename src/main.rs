use clap::Parser;
use miette::Result;
use tally::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(global.verbose);

    match cli.command {
        Commands::Init(args) => tally::cli::commands::init::run(args, &global),
        Commands::Record(cmd) => tally::cli::commands::record::run(cmd, &global),
        Commands::Bank(cmd) => tally::cli::commands::bank::run(cmd, &global),
        Commands::Device(cmd) => tally::cli::commands::device::run(cmd, &global),
        Commands::Stock(cmd) => tally::cli::commands::stock::run(cmd, &global),
        Commands::Payroll(cmd) => tally::cli::commands::payroll::run(cmd, &global),
        Commands::Intake(args) => tally::cli::commands::intake::run(args, &global),
        Commands::Report(args) => tally::cli::commands::report::run(args, &global),
        Commands::Schema(args) => tally::cli::commands::schema::run(args, &global),
        Commands::Completions(args) => tally::cli::commands::completions::run(args),
    }
}

/// `TALLY_LOG` wins; otherwise `--verbose` selects debug, default warn. Logs go to stderr.
fn init_tracing(verbose: bool) {
    let default = if verbose { "tally=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
