use std::io::Write;

use anyhow::Result;
use prettytable::{format, Cell, Row, Table};
use telemetry_core::{HostErrorsResp, Metric, MetricsListResponse, MetricsQueryResponse};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(headers.iter().map(|h| Cell::new(h)).collect()));
    table
}

/// Writes the catalog sorted by metric name. Writes nothing for an empty catalog.
pub(crate) fn print_metrics_list<W: Write>(resp: &MetricsListResponse, out: &mut W) -> Result<()> {
    if resp.available_metrics.is_empty() {
        return Ok(());
    }

    let mut metrics: Vec<&Metric> = resp.available_metrics.iter().collect();
    metrics.sort();

    let mut table = new_table(&["METRIC NAME", "DESCRIPTION"]);
    for metric in metrics {
        table.add_row(Row::new(vec![
            Cell::new(&metric.name),
            Cell::new(&metric.description),
        ]));
    }
    table.print(out)?;
    Ok(())
}

/// Writes one row per (host, metric), sorted by host then metric name.
pub(crate) fn print_metrics_query<W: Write>(resp: &MetricsQueryResponse, out: &mut W) -> Result<()> {
    let mut rows: Vec<(&str, &str, &str)> = resp
        .metrics_by_host
        .iter()
        .flat_map(|(host, values)| {
            values
                .values()
                .map(move |v| (host.as_str(), v.metric.name.as_str(), v.value.as_str()))
        })
        .collect();
    if rows.is_empty() {
        return Ok(());
    }
    rows.sort();

    let mut table = new_table(&["HOST", "METRIC NAME", "VALUE"]);
    for (host, name, value) in rows {
        table.add_row(Row::new(vec![Cell::new(host), Cell::new(name), Cell::new(value)]));
    }
    table.print(out)?;
    Ok(())
}

/// One line per distinct error message, listing every host that hit it.
pub(crate) fn print_host_errors<W: Write>(host_errors: &HostErrorsResp, out: &mut W) -> Result<()> {
    for (message, hosts) in &host_errors.host_errors {
        let noun = if hosts.len() == 1 { "host" } else { "hosts" };
        writeln!(out, "ERROR: {} {}: {}", noun, hosts.join(","), message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use telemetry_core::MetricValue;

    fn metric(name: &str, description: &str) -> Metric {
        Metric {
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    fn render<F: FnOnce(&mut Vec<u8>) -> Result<()>>(f: F) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn empty_list_prints_nothing() {
        let resp = MetricsListResponse::default();
        assert_eq!(render(|out| print_metrics_list(&resp, out)), "");
    }

    #[test]
    fn list_is_sorted_by_name() {
        let resp = MetricsListResponse {
            available_metrics: vec![
                metric("test_metric_2", "Another test metric"),
                metric("funny_hats", "Hilarious headwear"),
                metric("test_metric_1", ""),
            ],
            ..Default::default()
        };
        let text = render(|out| print_metrics_list(&resp, out));

        assert!(text.contains("METRIC NAME"));
        assert!(text.contains("Hilarious headwear"));
        let hats = text.find("funny_hats").unwrap();
        let first = text.find("test_metric_1").unwrap();
        let second = text.find("test_metric_2").unwrap();
        assert!(hats < first && first < second);
    }

    #[test]
    fn query_rows_are_sorted_by_host_then_name() {
        let value = |name: &str, v: &str| MetricValue {
            metric: metric(name, ""),
            value: v.to_string(),
        };
        let mut metrics_by_host = HashMap::new();
        metrics_by_host.insert(
            "h2".to_string(),
            HashMap::from([("engine_started".to_string(), value("engine_started", "7"))]),
        );
        metrics_by_host.insert(
            "h1".to_string(),
            HashMap::from([
                ("pool_count".to_string(), value("pool_count", "2")),
                ("engine_started".to_string(), value("engine_started", "3")),
            ]),
        );
        let resp = MetricsQueryResponse {
            metrics_by_host,
            ..Default::default()
        };

        let text = render(|out| print_metrics_query(&resp, out));
        let lines: Vec<&str> = text.lines().filter(|l| l.contains("h1") || l.contains("h2")).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("h1") && lines[0].contains("engine_started") && lines[0].contains('3'));
        assert!(lines[1].contains("h1") && lines[1].contains("pool_count"));
        assert!(lines[2].contains("h2") && lines[2].contains('7'));
    }

    #[test]
    fn host_errors_print_one_line_per_message() {
        let mut errs = HostErrorsResp::default();
        errs.add_host_error("h1", "connection refused");
        errs.add_host_error("h2", "connection refused");
        errs.add_host_error("h3", "deadline exceeded");

        let text = render(|out| print_host_errors(&errs, out));
        assert_eq!(
            text,
            "ERROR: hosts h1,h2: connection refused\nERROR: host h3: deadline exceeded\n"
        );
    }
}
