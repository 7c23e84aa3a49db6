pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Porto Alegre council bill harvester
#[derive(Parser, Debug)]
#[command(
    name = "vozcivica",
    about = "Harvest ordinary bills (PLL) from the Porto Alegre city council and summarize them",
    version,
    author,
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Markdown format
    Markdown,
    /// CSV format
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the search results and store new bills
    #[command(alias = "c")]
    Crawl(args::CrawlArgs),

    /// List stored bills
    #[command(alias = "ls")]
    List(args::ListArgs),

    /// Summarize bill text files with Gemini
    #[command(alias = "s")]
    Summarize(args::SummarizeArgs),

    /// Manage configuration
    Config(args::ConfigArgs),

    /// Show version information
    Version,

    /// Generate shell completion scripts
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Generate shell completion scripts
    fn generate_completions(shell: Shell) {
        use clap::CommandFactory;
        use clap_complete::generate;
        use std::io;

        let mut cmd = Self::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
    }

    /// Run the CLI application
    pub async fn run() -> crate::error::Result<()> {
        let cli = Self::parse();

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
            .init();

        let result = match cli.command {
            Commands::Crawl(args) => commands::crawl::execute(args, cli.format, cli.quiet, cli.verbose).await,
            Commands::List(args) => commands::list::execute(args, cli.format).await,
            Commands::Summarize(args) => {
                commands::summarize::execute(args, cli.format, cli.quiet, cli.verbose).await
            }
            Commands::Config(args) => commands::config::execute(args).await,
            Commands::Version => {
                commands::version::execute();
                Ok(())
            }
            Commands::Completions { shell } => {
                Self::generate_completions(shell);
                Ok(())
            }
        };

        if let Err(e) = &result {
            use crate::error::HarvestError;
            match e {
                HarvestError::Network(err) => {
                    eprintln!("Network error: {}", err);
                }
                HarvestError::Parse(msg) => {
                    eprintln!("Error parsing response: {}", msg);
                    if !cli.verbose {
                        eprintln!("\nRun with --verbose for more details.");
                    }
                }
                _ => {
                    eprintln!("Error: {}", e);
                }
            }
            if let Some(hint) = e.hint() {
                eprintln!("\nHint: {}", hint);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_filter_follows_flags() {
        let cli = Cli::parse_from(["vozcivica", "--verbose", "version"]);
        assert_eq!(cli.log_filter(), "debug");

        let cli = Cli::parse_from(["vozcivica", "-q", "version"]);
        assert_eq!(cli.log_filter(), "warn");

        let cli = Cli::parse_from(["vozcivica", "version"]);
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["vozcivica", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_crawl_overrides_parse() {
        let cli = Cli::parse_from([
            "vozcivica",
            "--format",
            "json",
            "crawl",
            "--max-pages",
            "3",
            "--download",
            "--backend",
            "sqlite",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Crawl(args) => {
                assert_eq!(args.max_pages, Some(3));
                assert!(args.download);
                assert_eq!(args.backend, Some(crate::store::StoreKind::Sqlite));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
