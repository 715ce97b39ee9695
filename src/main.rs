use clap::Parser;
use simplelog::*;

use homestead::cli::{Cli, Commands};
use homestead::commands;

fn main() {
    let cli = Cli::parse();

    setup_logging(&cli);

    debug!("args: {:?}", cli);

    // dispatch commands
    match &cli.command {
        Commands::Init { force } => commands::init::run(force),

        Commands::Validate {} => commands::validate::run(),

        Commands::Up { no_cluster } => commands::up::run(no_cluster),

        Commands::Destroy { yes } => commands::destroy::run(yes),

        Commands::CheckAccess { kubernetes, vault } => commands::check_access::run(kubernetes, vault),
    }
}

fn setup_logging(cli: &Cli) {
    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Trace)
        .build();

    TermLogger::init(
        cli.verbose.log_level_filter(),
        log_config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();
}
