use biotools_annotate::cli::commands::{CliArgs, Commands};
use biotools_annotate::cli::handlers::{handle_health, handle_run, handle_upload};
use biotools_annotate::util::{init_logging, LoggingConfig};
use biotools_annotate::AnnotateConfig;
use biotools_annotate::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    // Load errors are reported by the handler once logging is up.
    let file_logging = AnnotateConfig::load(args.config.as_deref())
        .ok()
        .map(|config| config.logging.to_logging_config());
    init_logging_from_args(&args, file_logging);

    debug!("biotools-annotate v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let config_path = args.config.as_deref();
    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args, config_path, args.quiet).await,
        Commands::Health(health_args) => handle_health(health_args, config_path).await,
        Commands::Upload(upload_args) => handle_upload(upload_args, config_path).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs, file_logging: Option<LoggingConfig>) {
    let config = file_logging
        .unwrap_or_default()
        .with_env_overrides()
        .with_cli_overrides(args.log_level.as_deref(), args.verbose, args.quiet);
    init_logging(config);
}
