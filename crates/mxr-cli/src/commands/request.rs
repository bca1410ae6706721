//! `mxr request`: render outbound worker request bodies.

use anyhow::Result;
use clap::{Args, Subcommand};
use mxr_events::{GenerateMatrixRequest, StartCalculationRequest};

use crate::opts::GlobalOpts;
use crate::output::{choose, print_success};

#[derive(Subcommand, Debug)]
pub enum RequestCommand {
    /// Body asking the worker to generate a random matrix
    Generate(GenerateArgs),

    /// Body asking the worker to multiply two known matrices
    Start(StartRequestArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(long)]
    pub rows: u32,

    #[arg(long)]
    pub columns: u32,
}

#[derive(Args, Debug)]
pub struct StartRequestArgs {
    /// Multiplicand matrix id
    #[arg(long)]
    pub multiplicand: String,

    /// Multiplier matrix id
    #[arg(long)]
    pub multiplier: String,
}

pub fn cmd_request(opts: &GlobalOpts, cmd: &RequestCommand) -> Result<()> {
    let (data, body) = match cmd {
        RequestCommand::Generate(args) => {
            let request = GenerateMatrixRequest::new(args.rows, args.columns)?;
            (serde_json::to_value(&request)?, request.to_message()?)
        }
        RequestCommand::Start(args) => {
            let request = StartCalculationRequest::new(&args.multiplicand, &args.multiplier);
            (serde_json::to_value(&request)?, request.to_message()?)
        }
    };
    print_success(opts, choose(opts, data, || body), vec![])
}
