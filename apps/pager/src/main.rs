use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{DataView, HttpQueryService, PagedTableController, RowTransform};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;
mod controller;
mod ui;

use controller::{
    events::parse_command,
    orchestration::{dispatch_command, Flow, HELP},
};
use ui::terminal::TerminalTable;

#[derive(Parser, Debug)]
#[command(about = "Page through a datasource endpoint from the terminal")]
struct Args {
    /// Scheme, host and port of the datasource server.
    #[arg(long)]
    origin: Option<String>,
    /// Path of the query endpoint on that server.
    #[arg(long)]
    base_path: Option<String>,
    /// Column id to leave out of the table; may be repeated.
    #[arg(long = "hide-column")]
    hide_columns: Vec<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = config::load_settings(args.config.as_deref())?.with_overrides(
        args.origin,
        args.base_path,
        args.hide_columns,
    );
    let origin = Url::parse(&settings.origin)
        .with_context(|| format!("invalid origin '{}'", settings.origin))?;
    info!(origin = %origin, base_path = %settings.base_path, "starting pager");

    let table = Arc::new(TerminalTable::stdout());
    let controller = PagedTableController::create(
        &origin,
        settings.base_path.clone(),
        Arc::new(HttpQueryService::new()),
        table.clone(),
        hidden_columns_transform(settings.hidden_columns),
    )
    .context("failed to bind table to endpoint")?;
    let forms = controller.bind_form_submit();

    table.message(HELP);
    controller.send_and_draw().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(err) => {
                table.report(&err);
                continue;
            }
        };

        match dispatch_command(&controller, &table, &forms, cmd).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(err) => table.report(&err),
        }
    }

    Ok(())
}

fn hidden_columns_transform(hidden: Vec<String>) -> Option<RowTransform> {
    if hidden.is_empty() {
        return None;
    }
    Some(Arc::new(move |view: &mut DataView| {
        view.hide_column_ids(&hidden)
    }))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
