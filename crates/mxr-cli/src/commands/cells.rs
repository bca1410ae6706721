//! `mxr cells`: show the received cells of a result matrix as a grid.

use anyhow::{Result, anyhow};
use clap::Args;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::{choose, print_success};
use crate::util::{format_cell, open_reconciler};

#[derive(Args, Debug)]
pub struct CellsArgs {
    /// Result matrix id (default: the live calculation's result)
    #[arg(long, requires_all = ["rows", "columns"])]
    pub result: Option<String>,

    #[arg(long)]
    pub rows: Option<u32>,

    #[arg(long)]
    pub columns: Option<u32>,
}

pub fn cmd_cells(opts: &GlobalOpts, args: &CellsArgs) -> Result<()> {
    let reconciler = open_reconciler(&opts.host_config())?;

    let (id, rows, columns) = match (&args.result, args.rows, args.columns) {
        (Some(id), Some(rows), Some(columns)) => (id.clone(), rows, columns),
        _ => {
            let calc = reconciler
                .current()
                .ok_or_else(|| anyhow!("no calculation running; pass --result"))?;
            let id = calc
                .result_matrix_id
                .clone()
                .ok_or_else(|| anyhow!("calculation has no result matrix yet"))?;
            (id, calc.rows, calc.columns)
        }
    };

    let grid = reconciler.cache().grid(&id, rows, columns);
    let received = reconciler.cache().completion_count(&id);
    let data = json!({
        "result_matrix_id": id,
        "rows": rows,
        "columns": columns,
        "received": received,
        "cells": grid,
    });
    let data = choose(opts, data, || {
        let mut out = format!("{id} ({rows}x{columns}), {received} cells received");
        for row in &grid {
            let line: Vec<String> = row.iter().copied().map(format_cell).collect();
            out.push('\n');
            out.push_str(&line.join("\t"));
        }
        out
    });
    print_success(opts, data, vec![])
}
