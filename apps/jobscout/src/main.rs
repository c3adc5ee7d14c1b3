mod api_client;
mod config;
mod errors;
mod models;
mod render;
mod stream;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api_client::JobBoardClient;
use crate::config::Config;
use crate::models::{JobType, SearchRequest, Source};
use crate::stream::{HttpTransport, SessionController, SessionStatus};

#[derive(Debug, Parser)]
#[command(name = "jobscout", version, about = "Search job boards and match resumes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream a search across job boards, printing results as each board answers.
    Search {
        query: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value = "all")]
        job_type: JobType,
        /// Comma-separated boards to query (default: all known boards).
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<Source>,
        #[arg(long)]
        salary_min: Option<u32>,
        #[arg(long)]
        salary_max: Option<u32>,
        /// Wait for every board and print once instead of streaming.
        #[arg(long)]
        blocking: bool,
    },
    /// Show one job, fetching its description if needed.
    Job { id: String },
    /// Score a resume against a job.
    Match { job_id: String, resume: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries results.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting jobscout v{} against {}", env!("CARGO_PKG_VERSION"), config.api_url);

    match cli.command {
        Command::Search {
            query,
            location,
            job_type,
            sources,
            salary_min,
            salary_max,
            blocking,
        } => {
            let mut request = SearchRequest::new(query)
                .with_job_type(job_type)
                .with_salary_range(salary_min, salary_max);
            if let Some(location) = location {
                request = request.with_location(location);
            }
            if !sources.is_empty() {
                request = request.with_sources(sources);
            }

            if blocking {
                run_blocking_search(&config, request).await
            } else {
                run_stream_search(&config, request).await
            }
        }
        Command::Job { id } => {
            let client = JobBoardClient::new(&config.api_url, config.request_timeout);
            let job = client.get_job(&id).await?;
            println!("{}", render::job_detail(&job));
            Ok(())
        }
        Command::Match { job_id, resume } => {
            let (file_name, document) = read_document(&resume)?;
            let client = JobBoardClient::new(&config.api_url, config.request_timeout);
            let result = client.match_resume(&job_id, &file_name, document).await?;
            print!("{}", render::match_report(&result));
            Ok(())
        }
    }
}

async fn run_stream_search(config: &Config, request: SearchRequest) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(&config.api_url));
    let controller = SessionController::new(transport, config.session_options());
    let mut session = controller.start(request)?;

    loop {
        tokio::select! {
            note = session.next() => match note {
                Some(note) => eprintln!("{}", render::notification_line(&note)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted; cancelling search");
                session.cancel();
                break;
            }
        }
    }

    let snapshot = session.finish().await;
    eprintln!("{}", render::session_summary(&snapshot));
    for (index, job) in snapshot.results.iter().enumerate() {
        println!("{}", render::listing_line(index, job));
    }

    match snapshot.status {
        SessionStatus::Completed => Ok(()),
        _ => {
            let reason = snapshot
                .failure
                .unwrap_or_else(|| "search did not complete".to_string());
            error!(results = snapshot.results.len(), "{reason}");
            anyhow::bail!(reason)
        }
    }
}

async fn run_blocking_search(config: &Config, request: SearchRequest) -> Result<()> {
    let client = JobBoardClient::new(&config.api_url, config.request_timeout);
    let response = client.search(&request).await?;
    for (index, job) in response.jobs.iter().enumerate() {
        println!("{}", render::listing_line(index, job));
    }
    eprintln!("{} jobs", response.total);
    Ok(())
}

/// Reads a resume from disk, returning its file name and bytes.
fn read_document(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read resume '{}'", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("Resume '{}' is empty", path.display());
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("resume")
        .to_string();
    Ok((file_name, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_document_returns_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.4")
            .unwrap();

        let (name, bytes) = read_document(&path).unwrap();
        assert_eq!(name, "cv.pdf");
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_read_document_rejects_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(read_document(file.path()).is_err());
    }

    #[test]
    fn test_read_document_missing_file() {
        let err = read_document(Path::new("/nonexistent/cv.pdf")).unwrap_err();
        assert!(err.to_string().contains("Failed to read resume"));
    }

    #[test]
    fn test_cli_parses_search_flags() {
        let cli = Cli::try_parse_from([
            "jobscout",
            "search",
            "rust engineer",
            "--job-type",
            "remote",
            "--source",
            "linkedin,glassdoor",
            "--location",
            "Berlin",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                query,
                job_type,
                sources,
                location,
                blocking,
                ..
            } => {
                assert_eq!(query, "rust engineer");
                assert_eq!(job_type, JobType::Remote);
                assert_eq!(sources, vec![Source::LinkedIn, Source::Glassdoor]);
                assert_eq!(location.as_deref(), Some("Berlin"));
                assert!(!blocking);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_source() {
        assert!(Cli::try_parse_from(["jobscout", "search", "rust", "--source", "indeed"]).is_err());
    }
}
