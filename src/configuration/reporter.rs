use std::fmt::Write;

const MANUAL: &str = "MANUAL";
const MISSING: &str = "MISSING";

#[derive(Clone, Debug, PartialEq, Eq)]
struct Row {
    key: String,
    source: String,
    value: String,
    keys: String,
    looked_up: bool,
}

/// Records where each configuration value came from and renders the
/// record as a table.
///
/// ```text
///
///   key  source     value   keys
/// ------------------------------------
///   key3 MANUAL     value
/// R key1 MapSource  MISSING key1, KEY1
/// R key2 MapSource  value   KEY2
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConfigurationReporter {
    rows: Vec<Row>,
}

impl ConfigurationReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_manual(&mut self, key: &str, value: &str) {
        self.rows.push(Row {
            key: key.to_string(),
            source: MANUAL.to_string(),
            value: value.to_string(),
            keys: String::new(),
            looked_up: false,
        });
    }

    pub fn add_value(&mut self, key: &str, source: &str, value: &str, accepted_key: &str) {
        self.rows.push(Row {
            key: key.to_string(),
            source: source.to_string(),
            value: value.to_string(),
            keys: accepted_key.to_string(),
            looked_up: true,
        });
    }

    pub fn add_missing(&mut self, key: &str, source: &str, attempted_keys: &[String]) {
        self.rows.push(Row {
            key: key.to_string(),
            source: source.to_string(),
            value: MISSING.to_string(),
            keys: attempted_keys.join(", "),
            looked_up: true,
        });
    }

    pub fn report(&self) -> String {
        let header = [" ", "key", "source", "value", "keys"];
        let rows: Vec<[&str; 5]> = self
            .rows
            .iter()
            .map(|row| {
                [
                    if row.looked_up { "R" } else { " " },
                    row.key.as_str(),
                    row.source.as_str(),
                    row.value.as_str(),
                    row.keys.as_str(),
                ]
            })
            .collect();

        let mut widths = [0usize; 5];
        for cells in std::iter::once(&header).chain(rows.iter()) {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::from("\n");
        write_row(&mut out, &header, &widths);
        out.push_str(&"-".repeat(widths.iter().sum::<usize>() + widths.len() - 1));
        out.push('\n');
        for cells in &rows {
            write_row(&mut out, cells, &widths);
        }
        out
    }
}

fn write_row(out: &mut String, cells: &[&str; 5], widths: &[usize; 5]) {
    let last = cells.len() - 1;
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i < last {
            let _ = write!(out, "{:<width$} ", cell, width = width);
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}
