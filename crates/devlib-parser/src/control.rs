//! Pass-one control lines: `.model`, `.options` and `.table`.

use num_complex::Complex64;

use devlib_core::units::parse_value;
use devlib_core::{AcTable, Circuit, Cursor, DeckLine};
use devlib_devices::{ModelCard, ModelTable};

/// Apply a control line. Unsupported commands are ignored with a warning.
pub fn apply(line: &mut DeckLine, ckt: &mut Circuit, models: &mut ModelTable) {
    let text = line.text.clone();
    let mut cur = Cursor::new(&text);
    let command = cur.next_token().unwrap_or_default().to_ascii_lowercase();
    match command.as_str() {
        ".model" => model(line, cur.rest(), models),
        ".options" | ".option" | ".opt" => options(line, &mut cur, ckt),
        ".table" => table(line, &mut cur, ckt),
        _ => line
            .diag
            .warn(format!("line {}: {} ignored", line.number, command)),
    }
}

/// `.model <name> <type> [(] key=value ... [)]`
fn model(line: &mut DeckLine, rest: &str, models: &mut ModelTable) {
    let body = rest.replace(['(', ')'], " ");
    let mut cur = Cursor::new(&body);
    let (Some(name), Some(kind)) = (cur.next_token(), cur.next_token()) else {
        let msg = format!("line {}: .model needs a name and a type", line.number);
        line.diag.warn(msg);
        return;
    };
    let mut params = Vec::new();
    while let Some(key) = cur.next_token() {
        match cur.next_token() {
            Some(value) => params.push((key.to_ascii_lowercase(), value.to_string())),
            None => line
                .diag
                .warn(format!("{}: missing value for '{}'", name, key)),
        }
    }
    let level = params
        .iter()
        .find(|(k, _)| k == "level")
        .and_then(|(_, v)| parse_value(v))
        .map_or(1, |v| v as usize);
    log::debug!("model card {} ({}, level {})", name, kind, level);
    models.add_card(ModelCard {
        name: name.to_ascii_lowercase(),
        kind: kind.to_ascii_lowercase(),
        level,
        params,
        line: line.number,
    });
}

/// `.options key=value ... flag ...`
fn options(line: &mut DeckLine, cur: &mut Cursor<'_>, ckt: &mut Circuit) {
    while let Some(key) = cur.next_token() {
        let value = if cur.peek_is_value() {
            cur.next_token().unwrap_or_default()
        } else {
            ""
        };
        if !ckt.options.set(key, value) {
            line.diag
                .warn(format!("line {}: unknown option '{}'", line.number, key));
        }
    }
}

/// `.table <name> ac f1 re1 im1 f2 re2 im2 ...`
fn table(line: &mut DeckLine, cur: &mut Cursor<'_>, ckt: &mut Circuit) {
    let Some(name) = cur.next_token() else {
        let msg = format!("line {}: .table needs a name", line.number);
        line.diag.warn(msg);
        return;
    };
    if !cur.accept("ac") {
        line.diag
            .warn(format!("{}: only AC tables are supported", name));
        return;
    }
    let mut values = Vec::new();
    while let Some(v) = cur.next_value() {
        values.push(v);
    }
    if !cur.at_end() || values.is_empty() || values.len() % 3 != 0 {
        line.diag
            .warn(format!("{}: expected frequency, real, imaginary triples", name));
        return;
    }
    let points = values
        .chunks(3)
        .map(|p| (p[0], Complex64::new(p[1], p[2])))
        .collect();
    ckt.add_ac_table(AcTable::new(name.to_ascii_lowercase(), points));
}
