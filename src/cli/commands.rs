use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// LLM-assisted annotation pipeline for bio.tools candidate entries
#[derive(Parser, Debug)]
#[command(
    name = "biotools-annotate",
    about = "LLM-assisted annotation pipeline for bio.tools candidate entries",
    version,
    author,
    long_about = "biotools-annotate gathers candidate tools mined from recent publications, \
                  enriches them with homepage and Europe PMC metadata, scores them with a \
                  local Ollama model and writes bio.tools payloads plus an assessment report."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file (defaults to ./config.yaml, then the user config dir)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the annotation pipeline",
        long_about = "Gathers, deduplicates, enriches and scores candidates, then writes the \
                      assessment report and bio.tools payloads.\n\n\
                      Examples:\n  \
                      biotools-annotate run --from-date 7d\n  \
                      biotools-annotate run --input candidates.json --offline\n  \
                      biotools-annotate run --from-date 2025-01-01 --to-date 2025-01-31 --resume-from-scoring"
    )]
    Run(RunArgs),

    #[command(
        about = "Check that the Ollama server answers",
        long_about = "Pings the configured Ollama server.\n\
                      Exits with 0 when healthy and 1 otherwise.\n\n\
                      Examples:\n  \
                      biotools-annotate health\n  \
                      biotools-annotate health --host http://gpu-box:11434"
    )]
    Health(HealthArgs),

    #[command(
        about = "Upload a payload file to bio.tools",
        long_about = "Creates each entry of a payload file in the bio.tools registry and writes \
                      upload_report.csv next to the payload.\n\n\
                      Examples:\n  \
                      biotools-annotate upload out/range_2025-01-01_to_2025-01-31/exports/biotools_payload.json\n  \
                      biotools-annotate upload payload.json --token-file ~/.bt_token --dry-run"
    )]
    Upload(UploadArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(long, value_name = "SINCE", help = "Window start: ISO date or relative offset such as 7d, 2w, 12h")]
    pub from_date: Option<String>,

    #[arg(long, value_name = "UNTIL", help = "Window end (defaults to now)")]
    pub to_date: Option<String>,

    #[arg(long, value_name = "SCORE", help = "Bio score needed for add")]
    pub bio_add: Option<f64>,

    #[arg(long, value_name = "SCORE", help = "Bio score needed for review")]
    pub bio_review: Option<f64>,

    #[arg(long, value_name = "SCORE", help = "Documentation score needed for add")]
    pub doc_add: Option<f64>,

    #[arg(long, value_name = "SCORE", help = "Documentation score needed for review")]
    pub doc_review: Option<f64>,

    #[arg(long, value_name = "N", help = "Process at most N candidates after deduplication")]
    pub limit: Option<usize>,

    #[arg(long, value_name = "N", help = "Parallel scoring and scraping workers")]
    pub concurrency: Option<usize>,

    #[arg(short = 'i', long, value_name = "FILE", help = "Candidate JSON file; skips Pub2Tools")]
    pub input: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "bio.tools registry dump used for membership flags")]
    pub registry: Option<PathBuf>,

    #[arg(long, help = "Skip every network call and score heuristically")]
    pub offline: bool,

    #[arg(long, help = "Write reports but no payload files")]
    pub dry_run: bool,

    #[arg(long, help = "Reuse the enriched candidate cache")]
    pub resume_from_enriched: bool,

    #[arg(long, help = "Reuse an earlier Pub2Tools export for the same window")]
    pub resume_from_pub2tools: bool,

    #[arg(long, help = "Reuse scores from an earlier assessment report")]
    pub resume_from_scoring: bool,

    #[arg(short = 'o', long, value_name = "DIR", help = "Root folder for run outputs")]
    pub output_root: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Add payload path")]
    pub payload: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Assessment report path")]
    pub report: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Enriched candidate cache path")]
    pub enriched_cache: Option<PathBuf>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Ollama model used for scoring")]
    pub model: Option<String>,

    #[arg(long, help = "Check rows and payloads against the live bio.tools API")]
    pub validate_biotools_api: bool,

    #[arg(long, help = "Do not fetch candidate homepages")]
    pub no_homepage_scrape: bool,

    #[arg(long, help = "Do not look up publications in Europe PMC")]
    pub no_europe_pmc: bool,

    #[arg(long, help = "Hide the progress display")]
    pub no_progress: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct HealthArgs {
    #[arg(long, value_name = "URL", help = "Ollama server URL")]
    pub host: Option<String>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model to report alongside the check")]
    pub model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    #[arg(value_name = "PAYLOAD", help = "Payload JSON file written by the run command")]
    pub payload: PathBuf,

    #[arg(long, value_name = "FILE", help = "bio.tools API token file (default .bt_token)")]
    pub token_file: Option<PathBuf>,

    #[arg(long, help = "Validate and report without creating entries")]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_run_args() {
        let args = CliArgs::parse_from(["biotools-annotate", "run"]);
        match args.command {
            Commands::Run(run) => {
                assert!(run.from_date.is_none());
                assert!(run.input.is_none());
                assert!(!run.offline);
                assert!(!run.dry_run);
                assert!(!run.resume_from_scoring);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_options() {
        let args = CliArgs::parse_from([
            "biotools-annotate",
            "run",
            "--from-date",
            "2025-01-01",
            "--to-date",
            "2025-01-31",
            "--bio-add",
            "0.7",
            "--limit",
            "5",
            "--concurrency",
            "2",
            "--input",
            "candidates.json",
            "--offline",
            "--resume-from-enriched",
            "--model",
            "qwen2.5",
        ]);

        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.from_date.as_deref(), Some("2025-01-01"));
                assert_eq!(run.to_date.as_deref(), Some("2025-01-31"));
                assert_eq!(run.bio_add, Some(0.7));
                assert_eq!(run.limit, Some(5));
                assert_eq!(run.concurrency, Some(2));
                assert_eq!(run.input, Some(PathBuf::from("candidates.json")));
                assert!(run.offline);
                assert!(run.resume_from_enriched);
                assert_eq!(run.model.as_deref(), Some("qwen2.5"));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_health_command() {
        let args = CliArgs::parse_from(["biotools-annotate", "health", "--host", "http://h:11434"]);
        match args.command {
            Commands::Health(health) => assert_eq!(health.host.as_deref(), Some("http://h:11434")),
            _ => panic!("Expected Health command"),
        }
    }

    #[test]
    fn test_upload_command() {
        let args = CliArgs::parse_from(["biotools-annotate", "upload", "payload.json", "--dry-run"]);
        match args.command {
            Commands::Upload(upload) => {
                assert_eq!(upload.payload, PathBuf::from("payload.json"));
                assert!(upload.dry_run);
                assert!(upload.token_file.is_none());
            }
            _ => panic!("Expected Upload command"),
        }
    }

    #[test]
    fn test_upload_requires_payload() {
        assert!(CliArgs::try_parse_from(["biotools-annotate", "upload"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["biotools-annotate", "-v", "--config", "c.yaml", "run"]);
        assert!(args.verbose);
        assert!(!args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("c.yaml")));

        let args = CliArgs::parse_from(["biotools-annotate", "run", "-q"]);
        assert!(args.quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(CliArgs::try_parse_from(["biotools-annotate", "-v", "-q", "health"]).is_err());
    }

    #[test]
    fn test_log_level_flag() {
        let args = CliArgs::parse_from(["biotools-annotate", "--log-level", "debug", "health"]);
        assert_eq!(args.log_level, Some("debug".to_string()));
    }
}
