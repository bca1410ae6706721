//! `mxr consume`: feed raw stream messages through the consumer loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use mxr_host::{LineTransport, StreamConsumer};
use serde_json::json;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

use crate::opts::GlobalOpts;
use crate::output::{choose, print_success};
use crate::util::{hold_writer, open_reconciler, state_lock};

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// File of result-stream messages, one per line ("-" for stdin)
    #[arg(long, default_value = "-")]
    pub input: PathBuf,

    /// File of error-feed messages, one per line
    #[arg(long)]
    pub errors: Option<PathBuf>,
}

type LineReader = Box<dyn AsyncBufRead + Unpin + Send>;

async fn open_lines(path: &Path) -> Result<LineTransport<LineReader>> {
    let reader: LineReader = if path.as_os_str() == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        Box::new(BufReader::new(file))
    };
    Ok(LineTransport::new(reader))
}

pub async fn cmd_consume(opts: &GlobalOpts, args: &ConsumeArgs) -> Result<()> {
    let config = opts.host_config();
    let mut lock = state_lock(&config.state_dir)?;
    let _writer = hold_writer(&mut lock, &config.state_dir)?;
    let reconciler = open_reconciler(&config)?;

    let mut consumer = StreamConsumer::new(open_lines(&args.input).await?, reconciler, config);
    if let Some(path) = &args.errors {
        consumer = consumer.with_error_feed(open_lines(path).await?);
    }

    let handle = consumer.start();
    let reader = handle.reader();
    let shutdown = handle.shutdown_sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            let _ = shutdown.send(());
        }
    });

    let stats = handle.join().await?;

    let errors = reader.errors();
    let progress = reader.progress();
    let mut warnings = Vec::new();
    if stats.degraded {
        warnings.push("some state could not be written; it will be retried on the next change".to_string());
    }
    if !errors.is_empty() {
        warnings.push(format!("{} worker error(s) reported", errors.len()));
    }

    let data = json!({
        "stats": stats,
        "matrices": reader.matrices(),
        "errors": errors,
        "progress": progress,
    });
    let data = choose(opts, data, || {
        let mut out = format!(
            "consumed {} events ({} dropped, {} duplicates, {} conflicts, {} out of range)",
            stats.events, stats.dropped, stats.duplicates, stats.conflicts, stats.out_of_range
        );
        for report in &errors {
            out.push_str(&format!("\nerror {}: {}", report.code, report.message));
        }
        if let Some(p) = &progress {
            out.push_str(&format!(
                "\nprogress: {}/{} cells ({:.0}%)",
                p.received,
                p.calculation.total_cells,
                p.fraction * 100.0
            ));
        }
        out
    });
    print_success(opts, data, warnings)
}
