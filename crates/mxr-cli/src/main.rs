mod commands;
mod opts;
mod output;
mod util;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use commands::cells::CellsArgs;
use commands::consume::ConsumeArgs;
use commands::request::RequestCommand;
use commands::start::StartArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "mxr", version, about = "Matrix result stream reconciler")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consume raw stream messages until the input ends
    Consume(ConsumeArgs),

    /// Start a calculation for two matrices
    Start(StartArgs),

    /// Show progress of the live calculation
    Progress,

    /// Show the received cells of a result matrix
    Cells(CellsArgs),

    /// Drop the live calculation and selection
    Reset,

    /// Print the body of an outbound worker request
    #[command(subcommand)]
    Request(RequestCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    let applied = util::load_state_env(&opts.host_config().state_dir)?;
    util::setup_logging();
    if !applied.is_empty() {
        debug!(keys = ?applied, "applied variables from state .env");
    }

    match cli.command {
        Command::Consume(args) => commands::consume::cmd_consume(opts, &args).await,
        Command::Start(args) => commands::start::cmd_start(opts, &args),
        Command::Progress => commands::progress::cmd_progress(opts),
        Command::Cells(args) => commands::cells::cmd_cells(opts, &args),
        Command::Reset => commands::reset::cmd_reset(opts),
        Command::Request(cmd) => commands::request::cmd_request(opts, &cmd),
    }
}
