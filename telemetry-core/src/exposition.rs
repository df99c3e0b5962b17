//! Parser for the Prometheus text exposition format (version 0.0.4).
//!
//! Produces one [`MetricFamily`] per metric name. Sample values are validated
//! against the float grammar but kept as the original text, since the
//! collector never interprets them numerically.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

/// Parsed families keyed by metric name.
pub type MetricFamilies = BTreeMap<String, MetricFamily>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
            MetricKind::Untyped => "untyped",
        }
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            "histogram" => Ok(MetricKind::Histogram),
            "summary" => Ok(MetricKind::Summary),
            "untyped" => Ok(MetricKind::Untyped),
            other => Err(format!("unknown metric type {other:?}")),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Full sample name, including any `_bucket`/`_sum`/`_count` suffix.
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: String,
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.labels.is_empty() {
            f.write_str("{")?;
            for (i, (k, v)) in self.labels.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}=\"{}\"", k, escape_label_value(v))?;
            }
            f.write_str("}")?;
        }
        write!(f, " {}", self.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    /// HELP text, empty when the family has none.
    pub help: String,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    /// Opaque text form of the family's current value(s).
    ///
    /// A single sample renders as its raw value; several samples render as
    /// `name{labels} value` entries joined by `", "` in exposition order.
    pub fn render_value(&self) -> String {
        match self.samples.as_slice() {
            [only] => only.value.clone(),
            samples => samples
                .iter()
                .map(Sample::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Parses an exposition body.
///
/// Empty and comment-only bodies yield an empty map. Families that only
/// carry HELP/TYPE lines and no samples are left out.
pub fn parse(body: &[u8]) -> Result<MetricFamilies, ParseError> {
    let text = std::str::from_utf8(body).map_err(|e| {
        let line = body[..e.valid_up_to()]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1;
        ParseError::new(line, "invalid UTF-8")
    })?;

    let mut state = ParserState::default();
    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let terminated = raw.ends_with('\n');
        let line = raw
            .trim_end_matches('\n')
            .trim_end_matches('\r')
            .trim_start_matches([' ', '\t']);

        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            state.comment(line_no, comment)?;
            continue;
        }
        if !terminated {
            return Err(ParseError::new(line_no, "unexpected end of input stream"));
        }
        state.sample(line_no, line)?;
    }

    Ok(state.finish())
}

#[derive(Default)]
struct FamilyBuilder {
    help: Option<String>,
    kind: Option<MetricKind>,
    samples: Vec<Sample>,
}

#[derive(Default)]
struct ParserState {
    families: BTreeMap<String, FamilyBuilder>,
    current: Option<String>,
}

impl ParserState {
    fn comment(&mut self, line_no: usize, comment: &str) -> Result<(), ParseError> {
        let comment = comment.trim_start_matches([' ', '\t']);
        let (keyword, rest) = split_token(comment);
        if keyword != "HELP" && keyword != "TYPE" {
            return Ok(());
        }
        if rest.is_empty() || !rest.starts_with([' ', '\t']) {
            return Err(ParseError::new(
                line_no,
                format!("invalid metric name in {keyword} comment"),
            ));
        }

        let (name, rest) = split_token(rest.trim_start_matches([' ', '\t']));
        if !is_metric_name(name) {
            return Err(ParseError::new(
                line_no,
                format!("invalid metric name in {keyword} comment: {name:?}"),
            ));
        }
        let rest = rest.trim_start_matches([' ', '\t']);
        let family = self.families.entry(name.to_string()).or_default();

        if keyword == "HELP" {
            if family.help.is_some() {
                return Err(ParseError::new(
                    line_no,
                    format!("second HELP line for metric name {name:?}"),
                ));
            }
            family.help = Some(unescape_help(rest));
        } else {
            if family.kind.is_some() || !family.samples.is_empty() {
                return Err(ParseError::new(
                    line_no,
                    format!(
                        "second TYPE line for metric name {name:?}, or TYPE reported after samples"
                    ),
                ));
            }
            let kind = rest
                .trim_end_matches([' ', '\t'])
                .parse::<MetricKind>()
                .map_err(|reason| ParseError::new(line_no, reason))?;
            family.kind = Some(kind);
        }
        Ok(())
    }

    fn sample(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let mut cursor = Cursor::new(line);

        let name = cursor.take_while(is_metric_name_byte);
        if !is_metric_name(name) {
            return Err(ParseError::new(line_no, "invalid metric name"));
        }

        let labels_absent = cursor.peek() != Some(b'{');
        let labels = if labels_absent {
            Vec::new()
        } else {
            cursor.bump();
            parse_labels(&mut cursor).map_err(|reason| ParseError::new(line_no, reason))?
        };

        // A closing brace already delimits the value.
        if !cursor.skip_blank() && labels_absent {
            return Err(ParseError::new(line_no, "expected float as value"));
        }
        let value = cursor.take_while(|b| b != b' ' && b != b'\t');
        if !is_float(value) {
            return Err(ParseError::new(
                line_no,
                format!("expected float as value, got {value:?}"),
            ));
        }

        cursor.skip_blank();
        let timestamp_ms = match cursor.take_while(|b| b != b' ' && b != b'\t') {
            "" => None,
            raw => Some(raw.parse::<i64>().map_err(|_| {
                ParseError::new(
                    line_no,
                    format!("expected integer as timestamp, got {raw:?}"),
                )
            })?),
        };
        cursor.skip_blank();
        if !cursor.rest().is_empty() {
            return Err(ParseError::new(line_no, "spurious string after timestamp"));
        }

        let family_name = self.family_for(name);
        let family = self.families.entry(family_name.clone()).or_default();
        check_kind(&family_name, family.kind, name, &labels)
            .map_err(|reason| ParseError::new(line_no, reason))?;

        if self.current.as_deref() != Some(family_name.as_str()) && !family.samples.is_empty() {
            return Err(ParseError::new(
                line_no,
                format!("samples for metric family {family_name:?} are not contiguous"),
            ));
        }

        family.samples.push(Sample {
            name: name.to_string(),
            labels,
            value: value.to_string(),
            timestamp_ms,
        });
        self.current = Some(family_name);
        Ok(())
    }

    /// Resolves which family a sample name belongs to.
    fn family_for(&self, sample_name: &str) -> String {
        if self.families.contains_key(sample_name) {
            return sample_name.to_string();
        }
        for suffix in ["_bucket", "_sum", "_count"] {
            let Some(base) = sample_name.strip_suffix(suffix) else {
                continue;
            };
            let owns = match self.families.get(base).and_then(|f| f.kind) {
                Some(MetricKind::Histogram) => true,
                Some(MetricKind::Summary) => suffix != "_bucket",
                _ => false,
            };
            if owns {
                return base.to_string();
            }
        }
        sample_name.to_string()
    }

    fn finish(self) -> MetricFamilies {
        self.families
            .into_iter()
            .filter(|(_, family)| !family.samples.is_empty())
            .map(|(name, family)| {
                let family = MetricFamily {
                    name: name.clone(),
                    help: family.help.unwrap_or_default(),
                    kind: family.kind.unwrap_or(MetricKind::Untyped),
                    samples: family.samples,
                };
                (name, family)
            })
            .collect()
    }
}

fn check_kind(
    family: &str,
    kind: Option<MetricKind>,
    sample_name: &str,
    labels: &[(String, String)],
) -> Result<(), String> {
    let label = |wanted: &str| labels.iter().find(|(k, _)| k == wanted).map(|(_, v)| v.as_str());
    let suffix = sample_name.strip_prefix(family).unwrap_or_default();
    match (kind, suffix) {
        (Some(MetricKind::Histogram), "_bucket") => match label("le") {
            None => Err(format!(
                "type mismatch: histogram bucket {sample_name:?} is missing the le label"
            )),
            Some(le) if !is_float(le) => Err(format!(
                "type mismatch: expected float as value for 'le' label, got {le:?}"
            )),
            Some(_) => Ok(()),
        },
        (Some(MetricKind::Histogram), "") => Err(format!(
            "type mismatch: sample {sample_name:?} in histogram family needs a _bucket, _sum or _count suffix"
        )),
        (Some(MetricKind::Summary), "") => match label("quantile") {
            None => Err(format!(
                "type mismatch: summary sample {sample_name:?} is missing the quantile label"
            )),
            Some(quantile) if !is_float(quantile) => Err(format!(
                "type mismatch: expected float as value for 'quantile' label, got {quantile:?}"
            )),
            Some(_) => Ok(()),
        },
        _ => Ok(()),
    }
}

fn parse_labels(cursor: &mut Cursor<'_>) -> Result<Vec<(String, String)>, String> {
    let mut labels: Vec<(String, String)> = Vec::new();
    loop {
        cursor.skip_blank();
        match cursor.peek() {
            None => return Err("unterminated label set".to_string()),
            Some(b'}') => {
                cursor.bump();
                return Ok(labels);
            }
            Some(_) => {}
        }

        let name = cursor.take_while(is_label_name_byte);
        if !is_label_name(name) {
            return Err("invalid label name".to_string());
        }
        cursor.skip_blank();
        if cursor.peek() != Some(b'=') {
            return Err(format!("expected '=' after label name {name:?}"));
        }
        cursor.bump();
        cursor.skip_blank();
        if cursor.peek() != Some(b'"') {
            return Err(format!("expected '\"' at start of value for label {name:?}"));
        }
        cursor.bump();
        let value = cursor
            .take_quoted()
            .map_err(|reason| format!("{reason} for label {name:?}"))?;

        if labels.iter().any(|(k, _)| k == name) {
            return Err(format!("duplicate label name {name:?}"));
        }
        labels.push((name.to_string(), value));

        cursor.skip_blank();
        match cursor.peek() {
            Some(b',') => cursor.bump(),
            Some(b'}') => {
                cursor.bump();
                return Ok(labels);
            }
            None => return Err("unterminated label set".to_string()),
            Some(other) => {
                return Err(format!(
                    "unexpected character {:?} after label value",
                    other as char
                ))
            }
        }
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Returns whether any blank was skipped.
    fn skip_blank(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.bump();
        }
        self.pos > start
    }

    /// Only ever stops on ASCII bytes, so the slice stays on char boundaries.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii() && pred(b)) {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    /// Reads up to and past the closing quote, resolving escapes.
    fn take_quoted(&mut self) -> Result<String, String> {
        const UNTERMINATED: &str = "unexpected end of value";
        let mut out = String::new();
        let mut chunk_start = self.pos;
        loop {
            match self.peek().ok_or(UNTERMINATED)? {
                b'"' => {
                    out.push_str(&self.text[chunk_start..self.pos]);
                    self.bump();
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.text[chunk_start..self.pos]);
                    self.bump();
                    let unescaped = match self.peek().ok_or(UNTERMINATED)? {
                        b'n' => '\n',
                        b'\\' => '\\',
                        b'"' => '"',
                        other => {
                            return Err(format!(
                                "invalid escape sequence '\\{}'",
                                (other as char).escape_default()
                            ))
                        }
                    };
                    out.push(unescaped);
                    self.bump();
                    chunk_start = self.pos;
                }
                _ => self.bump(),
            }
        }
    }
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find([' ', '\t']) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

/// Accepts the float spellings allowed for sample values and le/quantile labels.
fn is_float(text: &str) -> bool {
    !text.is_empty() && text.parse::<f64>().is_ok()
}

fn is_metric_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':'
}

fn is_label_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_metric_name(name: &str) -> bool {
    match name.as_bytes().first() {
        Some(first) if !first.is_ascii_digit() => name.bytes().all(is_metric_name_byte),
        _ => false,
    }
}

fn is_label_name(name: &str) -> bool {
    match name.as_bytes().first() {
        Some(first) if !first.is_ascii_digit() => name.bytes().all(is_label_name_byte),
        _ => false,
    }
}

fn unescape_help(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
