//! Reader and writer for the benchmark instance table.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use csnd_core::{Arc, Commodity, CsndError, CsndResult, Instance, NodeId, Record};
use tracing::debug;

const HEADER_FIELDS: [&str; 3] = ["num_nodes", "num_arcs", "num_commodities"];
const ARC_FIELDS: [&str; 6] = [
    "tail",
    "head",
    "flow_cost",
    "capacity",
    "fixed_cost",
    "travel_time",
];
const COMMODITY_FIELDS: [&str; 5] = ["source", "sink", "quantity", "release", "deadline"];

/// Read and validate an instance file.
pub fn read_instance(path: impl AsRef<Path>) -> CsndResult<Instance> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let instance = parse_instance(&content)?;
    debug!(
        path = %path.display(),
        nodes = instance.num_nodes(),
        arcs = instance.arcs().len(),
        commodities = instance.commodities().len(),
        "instance loaded"
    );
    Ok(instance)
}

/// Parse instance content. The title line becomes the instance name.
pub fn parse_instance(content: &str) -> CsndResult<Instance> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()));

    let title = match lines.next() {
        Some((_, title)) => title.to_string(),
        None => {
            return Err(CsndError::malformed(Record::Header, "title", "empty input").at_line(1))
        }
    };

    // Blank lines carry no data anywhere after the title.
    let mut data = lines.filter(|(_, line)| !line.is_empty());

    let (header_line, header) = data.next().ok_or_else(|| {
        CsndError::malformed(Record::Header, "counts", "missing counts line").at_line(2)
    })?;
    let (num_nodes, num_arcs, num_commodities) =
        parse_counts(header).map_err(|e| e.at_line(header_line))?;

    let mut arcs = Vec::new();
    let mut arc_lines = Vec::new();
    for i in 0..num_arcs {
        let record = Record::Arc(i);
        let (line_no, line) = data.next().ok_or_else(|| {
            CsndError::malformed(record, "tail", format!("expected {num_arcs} arc lines"))
        })?;
        let arc = parse_arc(line, record).map_err(|e| e.at_line(line_no))?;
        arcs.push(arc);
        arc_lines.push(line_no);
    }

    let mut commodities = Vec::new();
    let mut commodity_lines = Vec::new();
    for k in 0..num_commodities {
        let record = Record::Commodity(k);
        let (line_no, line) = data.next().ok_or_else(|| {
            CsndError::malformed(
                record,
                "source",
                format!("expected {num_commodities} commodity lines"),
            )
        })?;
        let commodity = parse_commodity(line, record).map_err(|e| e.at_line(line_no))?;
        commodities.push(commodity);
        commodity_lines.push(line_no);
    }

    if let Some((line_no, _)) = data.next() {
        return Err(CsndError::malformed(
            Record::Trailing,
            "line",
            "unexpected data after the last commodity",
        )
        .at_line(line_no));
    }

    Instance::new(num_nodes, arcs, commodities)
        .map(|instance| instance.with_name(title))
        .map_err(|err| match err {
            CsndError::MalformedInstance {
                record: Record::Arc(i),
                ..
            } => err.at_line(arc_lines[i]),
            CsndError::MalformedInstance {
                record: Record::Commodity(k),
                ..
            } => err.at_line(commodity_lines[k]),
            CsndError::MalformedInstance {
                record: Record::Header,
                ..
            } => err.at_line(header_line),
            other => other,
        })
}

fn parse_counts(line: &str) -> CsndResult<(usize, usize, usize)> {
    let v = tokens(line, HEADER_FIELDS.len(), Record::Header, &HEADER_FIELDS)?;
    Ok((
        field(&v, 0, Record::Header, "num_nodes")?,
        field(&v, 1, Record::Header, "num_arcs")?,
        field(&v, 2, Record::Header, "num_commodities")?,
    ))
}

fn tokens<'a>(
    line: &'a str,
    expected: usize,
    record: Record,
    fields: &[&'static str],
) -> CsndResult<Vec<&'a str>> {
    let values: Vec<&str> = line.split_whitespace().collect();
    if values.len() != expected {
        let field = fields.get(values.len().min(expected - 1)).copied().unwrap_or("line");
        return Err(CsndError::malformed(
            record,
            field,
            format!("expected {expected} columns, found {}", values.len()),
        ));
    }
    Ok(values)
}

fn field<T: FromStr>(
    values: &[&str],
    idx: usize,
    record: Record,
    name: &'static str,
) -> CsndResult<T> {
    values[idx]
        .parse()
        .map_err(|_| CsndError::malformed(record, name, format!("cannot parse `{}`", values[idx])))
}

fn parse_arc(line: &str, record: Record) -> CsndResult<Arc> {
    let v = tokens(line, ARC_FIELDS.len(), record, &ARC_FIELDS)?;
    Ok(Arc {
        tail: NodeId::new(field(&v, 0, record, "tail")?),
        head: NodeId::new(field(&v, 1, record, "head")?),
        flow_cost: field(&v, 2, record, "flow_cost")?,
        capacity: field(&v, 3, record, "capacity")?,
        fixed_cost: field(&v, 4, record, "fixed_cost")?,
        travel_time: field(&v, 5, record, "travel_time")?,
    })
}

fn parse_commodity(line: &str, record: Record) -> CsndResult<Commodity> {
    let v = tokens(line, COMMODITY_FIELDS.len(), record, &COMMODITY_FIELDS)?;
    Ok(Commodity {
        source: NodeId::new(field(&v, 0, record, "source")?),
        sink: NodeId::new(field(&v, 1, record, "sink")?),
        quantity: field(&v, 2, record, "quantity")?,
        release: field(&v, 3, record, "release")?,
        deadline: field(&v, 4, record, "deadline")?,
    })
}

/// Title written for instances without a name.
pub const DEFAULT_TITLE: &str = "modified according to Boland et al. 2017";

/// Render an instance in the file format. The first line of the name becomes
/// the title line, or [`DEFAULT_TITLE`] when the name is blank.
pub fn format_instance(instance: &Instance) -> String {
    let title = instance
        .name()
        .lines()
        .next()
        .filter(|line| !line.trim().is_empty())
        .unwrap_or(DEFAULT_TITLE);
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(
        out,
        "{} {} {}",
        instance.num_nodes(),
        instance.arcs().len(),
        instance.commodities().len()
    );
    for a in instance.arcs() {
        let _ = writeln!(
            out,
            "{} {} {} {} {} {}",
            a.tail, a.head, a.flow_cost, a.capacity, a.fixed_cost, a.travel_time
        );
    }
    for c in instance.commodities() {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            c.source, c.sink, c.quantity, c.release, c.deadline
        );
    }
    out
}

pub fn write_instance(instance: &Instance, path: impl AsRef<Path>) -> CsndResult<()> {
    fs::write(path, format_instance(instance))?;
    Ok(())
}
