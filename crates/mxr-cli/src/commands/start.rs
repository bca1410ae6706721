//! `mxr start`: select two matrices and start a calculation.

use anyhow::{Result, bail};
use clap::Args;
use mxr_events::StartCalculationRequest;
use mxr_store::StartOutcome;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::{choose, print_success};
use crate::util::{hold_writer, open_reconciler, parse_matrix, state_lock};

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Multiplicand as <id>:<rows>x<columns>
    #[arg(long)]
    pub multiplicand: String,

    /// Multiplier as <id>:<rows>x<columns>
    #[arg(long)]
    pub multiplier: String,
}

pub fn cmd_start(opts: &GlobalOpts, args: &StartArgs) -> Result<()> {
    let multiplicand = parse_matrix(&args.multiplicand)?;
    let multiplier = parse_matrix(&args.multiplier)?;

    let config = opts.host_config();
    let mut lock = state_lock(&config.state_dir)?;
    let _writer = hold_writer(&mut lock, &config.state_dir)?;

    let mut reconciler = open_reconciler(&config)?;
    if let Some(calc) = reconciler.current() {
        bail!(
            "calculation {} x {} is already running; run `mxr reset` first",
            calc.multiplicand_id,
            calc.multiplier_id
        );
    }

    reconciler.select_operands(multiplicand.clone(), multiplier.clone())?;
    if reconciler.start_calculation()? == StartOutcome::AlreadyRunning {
        bail!("calculation already running");
    }

    let mut warnings = Vec::new();
    if reconciler.stats().degraded {
        warnings.push("session record could not be written".to_string());
    }

    let request = StartCalculationRequest::new(&multiplicand.id, &multiplier.id);
    let body = request.to_message()?;
    let data = json!({
        "calculation": reconciler.current(),
        "request": request,
    });
    let data = choose(opts, data, || {
        format!("started {multiplicand} x {multiplier}\nrequest: {body}")
    });
    print_success(opts, data, warnings)
}
