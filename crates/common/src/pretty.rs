use crate::{NULL_OFFSET, Offset};
use tabled::{Table, builder::Builder, settings};
use types::Value;

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render arbitrary string rows with the provided style.
pub fn render_string_table(
    headers: &[&str],
    rows: Vec<Vec<String>>,
    style: TableStyleKind,
) -> String {
    if headers.is_empty() && rows.is_empty() {
        return "<empty>".into();
    }

    let mut builder = Builder::default();

    if !headers.is_empty() {
        builder.push_record(headers.iter().copied());
    }

    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Format a list of values into a comma-separated string.
pub fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a single value for display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Text(text) => format!("'{}'", text),
    }
}

/// Format an offset, showing the null sentinel as `-`.
pub fn format_offset(offset: Offset) -> String {
    if offset == NULL_OFFSET {
        "-".into()
    } else {
        offset.to_string()
    }
}

/// Hex dump of a byte payload, trailing zero padding elided.
pub fn format_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let mut out: String = bytes[..end].iter().map(|b| format!("{b:02x}")).collect();
    if end < bytes.len() {
        out.push('…');
    }
    out
}
