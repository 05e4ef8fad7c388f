use chatcat::commands;
use chatcat::{ChannelCommands, Cli, Commands, ConfigCommands, ExportCommands, UserCommands};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    chatcat::logging::init(cli.debug, cli.silent);

    let profile = cli.profile.as_deref();
    let result = match &cli.command {
        Commands::Export {
            command: ExportCommands::Log(args),
        } => commands::run_export_log(&cli.config, profile, args),
        Commands::Channel {
            command: ChannelCommands::List,
        } => commands::run_list_channels(&cli.config, profile),
        Commands::User {
            command: UserCommands::Lookup { name },
        } => commands::run_lookup_user(&cli.config, profile, name),
        Commands::Config {
            command: ConfigCommands::Init,
        } => commands::run_config_init(&cli.config).map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
