use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Attribute, Cell, Table};
use research_gap::config::{find_config_file, load_config, Config, CONFIG_FILE_NAME};
use research_gap::llm::OpenAiChatModel;
use research_gap::pipeline::{Pipeline, PipelineReport, PipelineSettings};
use research_gap::sources::PmcSource;
use research_gap::storage::JsonDirSink;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// research-gap - Summarize recent PubMed Central articles and find research gaps
#[derive(Parser, Debug)]
#[command(name = "research-gap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Summarize recent open-access PMC articles on a topic and analyse their research gaps", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for the run report
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table if stdout is a TTY, JSON otherwise
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline for a topic
    #[command(alias = "r")]
    Run {
        /// Research topic, e.g. "microbiome"
        query: String,

        /// Directory the result collections are written to
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Number of articles to summarize and analyse (at most 5)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Write a configuration file with the default settings
    InitConfig {
        /// Destination (default: ./research-gap.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        load_config(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        Config::default()
    };

    init_logging(&cli, &config);

    match cli.command {
        Commands::Run {
            query,
            storage_dir,
            top,
        } => {
            if let Some(dir) = storage_dir {
                config.storage.directory = dir;
            }
            if let Some(top) = top {
                config.pipeline.top_articles = top;
            }

            let pipeline = build_pipeline(&config)?;
            let report = pipeline.run(&query).await?;

            if !cli.quiet {
                output_report(&report, cli.output)?;
            }
        }
        Commands::InitConfig { path, force } => {
            let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            if !cli.quiet {
                println!("Wrote default configuration to {}", path.display());
            }
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("research_gap={}", level)));

    let json = config.logging.is_json();
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let source = PmcSource::new(config).context("creating PMC client")?;
    let model = OpenAiChatModel::from_config(config).context("creating language model client")?;
    let sink = JsonDirSink::new(&config.storage.directory);
    tracing::info!("Writing results to {}", config.storage.directory.display());

    Ok(Pipeline::new(
        Arc::new(source),
        Arc::new(model),
        Arc::new(sink),
        PipelineSettings::from_config(config),
    ))
}

fn output_report(report: &PipelineReport, format: OutputFormat) -> Result<()> {
    let actual_format = match format {
        OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
        OutputFormat::Auto => OutputFormat::Json,
        other => other,
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        _ => {
            let mut summary = Table::new();
            summary.load_preset(comfy_table::presets::UTF8_FULL);
            summary.set_header(vec!["Stage", "Count"]);
            for (stage, count) in [
                ("Ids found", report.ids_found),
                ("Metadata fetched", report.metadata_fetched),
                ("Full text available", report.full_text_available),
                ("Parsed", report.parsed),
                ("Selected", report.selected.len()),
                ("Summarized", report.summarized),
                ("Gap records", report.gap_records),
            ] {
                summary.add_row(vec![Cell::new(stage), Cell::new(count)]);
            }
            println!("Query: {} (run {}, {} ms)", report.query, report.run_id, report.duration_ms);
            println!("{summary}");

            if report.selected.is_empty() {
                println!("No articles selected.");
                return Ok(());
            }

            let mut articles = Table::new();
            articles.load_preset(comfy_table::presets::UTF8_FULL);
            articles.set_header(vec!["Title", "Published", "Score", "Sections", "URL"]);
            for article in &report.selected {
                articles.add_row(vec![
                    Cell::new(truncate(&article.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(&article.publication_date),
                    Cell::new(format!("{:.0}", article.score)),
                    Cell::new(format!("{:.0}%", article.filled_sections_ratio * 100.0)),
                    Cell::new(&article.article_url),
                ]);
            }
            println!("{articles}");

            if !report.comparison_saved {
                println!("Gap analysis did not produce a result.");
            }
        }
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::parse_from(["research-gap", "run", "microbiome"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        match cli.command {
            Commands::Run {
                query,
                storage_dir,
                top,
            } => {
                assert_eq!(query, "microbiome");
                assert!(storage_dir.is_none());
                assert!(top.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["research-gap", "run", "gut flora", "-vv", "-o", "json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_cli_run_overrides() {
        let cli = Cli::parse_from([
            "research-gap",
            "--config",
            "/tmp/custom.toml",
            "run",
            "asthma",
            "--storage-dir",
            "/tmp/out",
            "--top",
            "3",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/custom.toml")));
        match cli.command {
            Commands::Run { storage_dir, top, .. } => {
                assert_eq!(storage_dir, Some(PathBuf::from("/tmp/out")));
                assert_eq!(top, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_init_config() {
        let cli = Cli::parse_from(["research-gap", "init-config", "out.toml", "--force"]);
        match cli.command {
            Commands::InitConfig { path, force } => {
                assert_eq!(path, Some(PathBuf::from("out.toml")));
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["research-gap"]).is_err());
        assert!(Cli::try_parse_from(["research-gap", "run"]).is_err());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }
}
