//! `mxr progress`: completion of the live calculation.

use anyhow::Result;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::{choose, print_success};
use crate::util::open_reconciler;

pub fn cmd_progress(opts: &GlobalOpts) -> Result<()> {
    let reconciler = open_reconciler(&opts.host_config())?;
    let progress = reconciler.progress();

    let data = json!({
        "selection": reconciler.selection(),
        "progress": progress,
    });
    let data = choose(opts, data, || match &progress {
        None => "no calculation running".into(),
        Some(p) => {
            let calc = &p.calculation;
            let target = calc.result_matrix_id.as_deref().unwrap_or("(awaiting result matrix)");
            format!(
                "{} x {} -> {}: {}/{} cells ({:.0}%)",
                calc.multiplicand_id,
                calc.multiplier_id,
                target,
                p.received,
                calc.total_cells,
                p.fraction * 100.0
            )
        }
    });
    print_success(opts, data, vec![])
}
