//! Tabular attachments: CSV and XLSX parsed into a [`Table`] and rendered as
//! fixed-width text.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;
use zip::ZipArchive;

use super::text::decode_utf8_dropping_invalid;

/// Excel's sheet bounds: columns `A..=XFD`, rows `1..=1048576`.
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// Upper bound on the dense grid built from a sparse sheet.
const MAX_GRID_CELLS: usize = 4_000_000;

/// Rows of cells; the first row is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Render with right-aligned, space-padded columns separated by two
    /// spaces. Ragged rows are padded with empty cells.
    pub fn render(&self) -> String {
        let width = self.width();
        let mut col_widths = vec![0usize; width];
        for row in &self.rows {
            for (idx, cell) in row.iter().enumerate() {
                col_widths[idx] = col_widths[idx].max(cell.chars().count());
            }
        }

        self.rows
            .iter()
            .map(|row| {
                (0..width)
                    .map(|idx| {
                        let cell = row.get(idx).map(String::as_str).unwrap_or("");
                        format!("{:>w$}", cell, w = col_widths[idx])
                    })
                    .collect::<Vec<_>>()
                    .join("  ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse RFC 4180-style CSV: quoted fields may contain commas, newlines and
/// doubled quotes. Blank lines are skipped.
pub fn parse_csv(bytes: &[u8]) -> Result<Table, String> {
    let text = decode_utf8_dropping_invalid(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => finish_row(&mut rows, &mut row, &mut field),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    finish_row(&mut rows, &mut row, &mut field);

    if rows.is_empty() {
        return Err("no rows".to_string());
    }
    Ok(Table { rows })
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String) {
    row.push(std::mem::take(field));
    let record = std::mem::take(row);
    if !(record.len() == 1 && record[0].is_empty()) {
        rows.push(record);
    }
}

fn shared_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<si>(.*?)</si>").expect("valid regex"))
}

fn text_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").expect("valid regex"))
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<row\b[^>]*?(?:/>|>(.*?)</row>)").expect("valid regex"))
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").expect("valid regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("valid regex"))
}

fn value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<v>(.*?)</v>").expect("valid regex"))
}

/// Parse the first worksheet of an XLSX workbook.
pub fn parse_xlsx(bytes: &[u8]) -> Result<Table, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("Failed to open xlsx archive: {}", e))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    let shared_strings = if names.iter().any(|n| n == "xl/sharedStrings.xml") {
        parse_shared_strings(&read_entry(&mut archive, "xl/sharedStrings.xml")?)
    } else {
        Vec::new()
    };

    let sheet_name = first_sheet(&names).ok_or_else(|| "workbook has no worksheets".to_string())?;
    let sheet = read_entry(&mut archive, &sheet_name)?;

    let table = parse_sheet(&sheet, &shared_strings)?;
    if table.rows.is_empty() {
        return Err(format!("{} has no rows", sheet_name));
    }
    Ok(table)
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| format!("Failed to open entry {}: {}", name, e))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| format!("Failed to read entry {}: {}", name, e))?;
    Ok(xml)
}

/// `xl/worksheets/sheetN.xml` with the lowest N.
fn first_sheet(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| {
            let number = name
                .strip_prefix("xl/worksheets/sheet")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name))
        })
        .min_by_key(|(number, _)| *number)
        .map(|(_, name)| name.clone())
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    shared_string_re()
        .captures_iter(xml)
        .map(|si| {
            let item = si.get(1).map(|m| m.as_str()).unwrap_or("");
            text_runs(item)
        })
        .collect()
}

/// Concatenate every `<t>` run (rich text splits one string across runs).
fn text_runs(xml: &str) -> String {
    text_run_re()
        .captures_iter(xml)
        .filter_map(|t| t.get(1))
        .map(|m| decode_xml_entities(m.as_str()))
        .collect()
}

fn parse_sheet(xml: &str, shared_strings: &[String]) -> Result<Table, String> {
    let mut grid: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
    let mut next_row = 0usize;

    for row in row_re().captures_iter(xml) {
        let row_xml = row.get(1).map(|m| m.as_str()).unwrap_or("");
        let row_idx = next_row;
        next_row += 1;

        let mut next_col = 0usize;
        for cell in cell_re().captures_iter(row_xml) {
            let attrs = parse_attrs(cell.get(1).map(|m| m.as_str()).unwrap_or(""));
            let body = cell.get(2).map(|m| m.as_str()).unwrap_or("");

            let (row_ref, col) = match attrs.get("r") {
                Some(reference) => {
                    let (r, c) = parse_cell_ref(reference)
                        .ok_or_else(|| format!("invalid cell reference '{}'", reference))?;
                    (Some(r), c)
                }
                None => (None, next_col),
            };
            next_col = col + 1;

            let target_row = match row_ref {
                Some(r) => {
                    next_row = next_row.max(r + 1);
                    r
                }
                None => row_idx,
            };

            let value = cell_value(attrs.get("t").map(String::as_str), body, shared_strings);
            grid.entry(target_row).or_default().insert(col, value);
        }
    }

    let width = grid
        .values()
        .filter_map(|cols| cols.keys().next_back())
        .max()
        .map(|last| last + 1)
        .unwrap_or(0);

    if width.saturating_mul(grid.len()) > MAX_GRID_CELLS {
        return Err(format!(
            "sheet too large: {} rows x {} columns",
            grid.len(),
            width
        ));
    }

    let rows = grid
        .into_values()
        .map(|cols| {
            let mut row = vec![String::new(); width];
            for (col, value) in cols {
                row[col] = value;
            }
            row
        })
        .collect();

    Ok(Table { rows })
}

fn parse_attrs(raw: &str) -> BTreeMap<String, String> {
    attr_re()
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn cell_value(cell_type: Option<&str>, body: &str, shared_strings: &[String]) -> String {
    let raw = value_re()
        .captures(body)
        .and_then(|v| v.get(1))
        .map(|m| decode_xml_entities(m.as_str()))
        .unwrap_or_default();

    match cell_type {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx).cloned())
            .unwrap_or_default(),
        Some("inlineStr") => text_runs(body),
        Some("b") => match raw.trim() {
            "1" => "True".to_string(),
            _ => "False".to_string(),
        },
        _ => raw,
    }
}

/// Zero-based (row, column) of an `A1`-style reference. References outside
/// the sheet bounds yield `None`.
fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut col = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(ch.to_ascii_uppercase() as usize - 'A' as usize + 1)?;
        if col > MAX_COLUMNS {
            return None;
        }
    }
    let row: usize = digits.parse().ok()?;
    if row > MAX_ROWS {
        return None;
    }
    Some((row.checked_sub(1)?, col - 1))
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
