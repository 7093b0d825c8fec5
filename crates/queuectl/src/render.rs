pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(idx) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    push_row(&mut out, &widths, headers.iter().map(|h| h.to_string()));
    push_row(&mut out, &widths, widths.iter().map(|w| "-".repeat(*w)));
    for row in rows {
        push_row(&mut out, &widths, row.iter().cloned());
    }
    out
}

fn push_row(out: &mut String, widths: &[usize], cells: impl Iterator<Item = String>) {
    let cells: Vec<String> = cells.collect();
    let last = cells.len().saturating_sub(1);
    for (idx, cell) in cells.iter().enumerate() {
        if idx == last {
            // No trailing padding on the last column.
            out.push_str(cell);
        } else {
            let width = widths.get(idx).copied().unwrap_or(0);
            out.push_str(&format!("{cell:<width$}"));
            out.push_str("  ");
        }
    }
    out.push('\n');
}

// Collapse control characters so multi-line errors stay on one table row.
pub fn single_line(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
