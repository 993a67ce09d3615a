use clap::Parser;
use funnelkit::cli::{Cli, Commands, GlobalOpts};
use miette::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Install miette's fancy error handler for diagnostics
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
    init_tracing(&cli.global);

    match cli.command {
        Commands::Merge(args) => funnelkit::cli::commands::merge::run(args, &cli.global),
        Commands::Funnel(args) => funnelkit::cli::commands::funnel::run(args, &cli.global),
        Commands::Ab(args) => funnelkit::cli::commands::ab::run(args, &cli.global),
        Commands::Report(args) => funnelkit::cli::commands::report::run(args, &cli.global),
        Commands::Completions(args) => funnelkit::cli::commands::completions::run(args),
    }
}

/// Log to stderr; RUST_LOG overrides the -v/-q level
fn init_tracing(global: &GlobalOpts) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("funnelkit={}", global.log_level())));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
