use std::num::NonZeroUsize;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::download::WorkItem;
use crate::release::DEFAULT_API_URL;
use crate::types::LogLevel;

const DOWNLOAD_USAGE: &str = "\
Usage: assetdownloader download <repo> <filename> <destination> [<repo> <filename> <destination> ...]
       assetdownloader download <repo> <filename> [<repo> <filename> ...] <destination> --download-all";

#[derive(Parser, Debug)]
#[command(
    name = "assetdownloader",
    about = "Keep the latest GitHub release assets downloaded",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding download records (default: <config dir>/AssetDownloader)
    #[arg(long, global = true, env = "ASSET_DOWNLOADER_RECORDS_DIR")]
    pub records_dir: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(long, global = true, env = "ASSET_DOWNLOADER_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Maximum number of assets processed at once (default: all)
    #[arg(long, global = true)]
    pub concurrency: Option<NonZeroUsize>,

    /// Retries for a failed asset download (server errors and dropped connections only)
    #[arg(long, global = true, default_value_t = 2)]
    pub max_retries: u32,

    /// Base delay in seconds between download retries
    #[arg(long, global = true, default_value_t = 5)]
    pub retry_delay: u64,

    /// Abort any single HTTP request after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download release assets that changed since the last run
    Download(DownloadArgs),
    /// List stored download records
    List,
    /// Delete records (and their downloaded files) by their position in `list`
    Delete(DeleteArgs),
    /// Print version and build date
    Version,
}

#[derive(Args, Debug)]
#[command(after_help = DOWNLOAD_USAGE)]
pub struct DownloadArgs {
    /// <repo> <filename> <destination> triples, or <repo> <filename> pairs
    /// followed by one destination when --download-all is given
    #[arg(value_name = "ARGS", required = true, num_args = 1..)]
    pub args: Vec<String>,

    /// Download every asset into the single trailing destination
    #[arg(short = 'a', long)]
    pub download_all: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// 1-based record positions as shown by `list`
    #[arg(value_name = "INDEX", required = true, num_args = 1..)]
    pub indices: Vec<usize>,
}

/// Malformed `download` arguments.
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("invalid number of arguments provided ({count})\n\n{usage}", usage = DOWNLOAD_USAGE)]
    Count { count: usize },

    #[error("invalid number of arguments provided with download all flag ({count})\n\n{usage}", usage = DOWNLOAD_USAGE)]
    SharedCount { count: usize },

    #[error("argument {position} is empty\n\n{usage}", usage = DOWNLOAD_USAGE)]
    Empty { position: usize },
}

impl DownloadArgs {
    /// Build work items from the positional arguments.
    ///
    /// Without `--download-all` the arguments are `(repo, filename,
    /// destination)` triples. With it they are `(repo, filename)` pairs
    /// followed by one shared destination, so the count must be odd.
    pub fn work_items(&self) -> Result<Vec<WorkItem>, ArgsError> {
        build_work_items(&self.args, self.download_all)
    }
}

fn build_work_items(args: &[String], download_all: bool) -> Result<Vec<WorkItem>, ArgsError> {
    let count = args.len();
    if let Some(position) = args.iter().position(|a| a.is_empty()) {
        return Err(ArgsError::Empty {
            position: position + 1,
        });
    }

    if download_all {
        if count < 3 || count % 2 == 0 {
            return Err(ArgsError::SharedCount { count });
        }
        let (pairs, destination) = args.split_at(count - 1);
        let destination = &destination[0];
        Ok(pairs
            .chunks_exact(2)
            .map(|pair| WorkItem::new(&pair[0], &pair[1], destination))
            .collect())
    } else {
        if count < 3 || count % 3 != 0 {
            return Err(ArgsError::Count { count });
        }
        Ok(args
            .chunks_exact(3)
            .map(|triple| WorkItem::new(&triple[0], &triple[1], &triple[2]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_triples() {
        let items = build_work_items(
            &strings(&["acme/a", "a.zip", "/srv/a", "acme/b", "b.zip", "/srv/b/"]),
            false,
        )
        .unwrap();
        assert_eq!(
            items,
            vec![
                WorkItem::new("acme/a", "a.zip", "/srv/a"),
                WorkItem::new("acme/b", "b.zip", "/srv/b/"),
            ]
        );
    }

    #[test]
    fn test_shared_destination() {
        let items = build_work_items(
            &strings(&["acme/a", "a.zip", "acme/b", "b.zip", "/srv/mods"]),
            true,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.destination == items[0].destination));
        assert_eq!(items[1].repository, "acme/b");
        assert_eq!(items[1].filename, "b.zip");
    }

    #[test]
    fn test_single_pair_with_shared_destination() {
        let items = build_work_items(&strings(&["acme/a", "a.zip", "/srv"]), true).unwrap();
        assert_eq!(items, vec![WorkItem::new("acme/a", "a.zip", "/srv")]);
    }

    #[test]
    fn test_rejects_bad_triple_counts() {
        for n in [1, 2, 4, 5, 7] {
            let args = vec!["x".to_string(); n];
            assert!(
                matches!(build_work_items(&args, false), Err(ArgsError::Count { count }) if count == n),
                "{n}"
            );
        }
    }

    #[test]
    fn test_rejects_bad_shared_counts() {
        for n in [1, 2, 4, 6] {
            let args = vec!["x".to_string(); n];
            assert!(
                matches!(build_work_items(&args, true), Err(ArgsError::SharedCount { .. })),
                "{n}"
            );
        }
    }

    #[test]
    fn test_rejects_empty_argument() {
        let err = build_work_items(&strings(&["acme/a", "a.zip", ""]), false).unwrap_err();
        assert!(matches!(err, ArgsError::Empty { position: 3 }));
    }

    #[test]
    fn test_error_includes_usage() {
        let err = build_work_items(&strings(&["acme/a"]), false).unwrap_err();
        assert!(err.to_string().contains("Usage: assetdownloader download"));
    }

    #[test]
    fn test_parse_download_with_trailing_flag() {
        let cli = parse(&[
            "assetdownloader",
            "download",
            "acme/a",
            "a.zip",
            "/srv",
            "--download-all",
        ]);
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert!(args.download_all);
        assert_eq!(args.work_items().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_download_short_flag() {
        let cli = parse(&["assetdownloader", "download", "acme/a", "a.zip", "/srv", "-a"]);
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert!(args.download_all);
    }

    #[test]
    fn test_parse_delete_indices() {
        let cli = parse(&["assetdownloader", "delete", "3", "1"]);
        let Command::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.indices, vec![3, 1]);
    }

    #[test]
    fn test_parse_delete_rejects_non_numeric() {
        assert!(Cli::try_parse_from(["assetdownloader", "delete", "one"]).is_err());
        assert!(Cli::try_parse_from(["assetdownloader", "delete"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&[
            "assetdownloader",
            "list",
            "--records-dir",
            "/tmp/records",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(cli.command, Command::List));
        assert_eq!(cli.records_dir.as_deref(), Some("/tmp/records"));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_concurrency_must_be_positive() {
        assert!(Cli::try_parse_from(["assetdownloader", "list", "--concurrency", "0"]).is_err());
        let cli = parse(&["assetdownloader", "list", "--concurrency", "4"]);
        assert_eq!(cli.concurrency.map(NonZeroUsize::get), Some(4));
    }
}
