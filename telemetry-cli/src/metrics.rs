use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use telemetry_core::{
    HostErrorsResp, MetricsListRequest, MetricsQueryRequest, RequestContext, TelemetryClient,
    TelemetryConfig, DEFAULT_TELEMETRY_PORT,
};
use tracing::debug;

use crate::pretty;

#[derive(Debug, Args)]
pub(crate) struct Metrics {
    #[command(subcommand)]
    command: MetricsCommands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum MetricsCommands {
    #[command(about = "List the metric types exposed by the first host")]
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
    #[command(about = "Query current metric values from every host")]
    Query {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(
            long,
            short = 'm',
            value_delimiter = ',',
            help = "Comma-separated metric names to query (default: all)"
        )]
        metrics: Vec<String>,
        #[arg(long, env = "TELEMETRY_MAX_CONCURRENCY", help = "Max hosts scraped in parallel")]
        max_concurrency: Option<usize>,
    },
}

#[derive(Debug, Args)]
pub(crate) struct TargetArgs {
    #[arg(
        long,
        short = 'l',
        value_delimiter = ',',
        env = "TELEMETRY_HOST_LIST",
        help = "Comma-separated hosts to scrape"
    )]
    host_list: Vec<String>,
    #[arg(long, short = 'p', env = "TELEMETRY_PORT", default_value_t = DEFAULT_TELEMETRY_PORT, help = "Telemetry port on each host")]
    port: u16,
    #[arg(long, default_value_t = 5000, help = "Per-host request timeout in milliseconds")]
    timeout_ms: u64,
    #[arg(long, help = "Overall deadline for the command in milliseconds")]
    deadline_ms: Option<u64>,
    #[arg(long, value_parser = ["json"], help = "Output format: json (default: table)")]
    output: Option<String>,
}

impl TargetArgs {
    fn client(&self, max_concurrency: Option<usize>) -> Result<TelemetryClient> {
        let config = TelemetryConfig {
            request_timeout_ms: self.timeout_ms,
            max_concurrency,
            ..Default::default()
        };
        Ok(TelemetryClient::new(config)?)
    }

    /// Request scope cancelled by Ctrl-C and bounded by `--deadline-ms`.
    fn context(&self) -> RequestContext {
        let ctx = match self.deadline_ms {
            Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
            None => RequestContext::new(),
        };
        let on_interrupt = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        ctx
    }

    fn json(&self) -> bool {
        matches!(self.output.as_deref(), Some("json"))
    }
}

pub(crate) async fn handle_command(metrics: Metrics) -> Result<()> {
    match metrics.command {
        MetricsCommands::List { target } => {
            let client = target.client(None)?;
            let req = MetricsListRequest::new(target.host_list.clone(), target.port);
            debug!(host = ?req.host_list.first(), port = req.port, "listing metrics");

            let resp = client.list_metrics(&target.context(), &req).await?;
            if target.json() {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                pretty::print_metrics_list(&resp, &mut std::io::stdout())?;
            }
            report_host_errors(&resp.host_errors)
        }
        MetricsCommands::Query {
            target,
            metrics,
            max_concurrency,
        } => {
            let client = target.client(max_concurrency)?;
            let req = MetricsQueryRequest::new(target.host_list.clone(), target.port)
                .with_metric_names(metrics);
            debug!(hosts = req.host_list.len(), port = req.port, "querying metrics");

            let resp = client.query_metrics(&target.context(), &req).await?;
            if target.json() {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                pretty::print_metrics_query(&resp, &mut std::io::stdout())?;
            }
            report_host_errors(&resp.host_errors)
        }
    }
}

/// Prints host errors to stderr and turns them into a failing exit status.
fn report_host_errors(host_errors: &HostErrorsResp) -> Result<()> {
    if host_errors.is_empty() {
        return Ok(());
    }
    pretty::print_host_errors(host_errors, &mut std::io::stderr())?;
    host_errors.errors()?;
    Ok(())
}
