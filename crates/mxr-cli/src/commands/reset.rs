//! `mxr reset`: drop the live calculation and selection.

use anyhow::Result;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::{choose, print_success};
use crate::util::{hold_writer, open_reconciler, state_lock};

pub fn cmd_reset(opts: &GlobalOpts) -> Result<()> {
    let config = opts.host_config();
    let mut lock = state_lock(&config.state_dir)?;
    let _writer = hold_writer(&mut lock, &config.state_dir)?;

    let mut reconciler = open_reconciler(&config)?;
    let previous = reconciler.current().cloned();
    reconciler.reset();

    let mut warnings = Vec::new();
    if reconciler.stats().degraded {
        warnings.push("session record could not be written".to_string());
    }
    let data = json!({ "reset": previous });
    let data = choose(opts, data, || match &previous {
        Some(calc) => format!(
            "reset calculation {} x {}",
            calc.multiplicand_id, calc.multiplier_id
        ),
        None => "nothing to reset".into(),
    });
    print_success(opts, data, warnings)
}
