use scraper::ElementRef;

use super::{Ctx, Renderer};
use crate::dom::{flatten_text, normalize_whitespace};
use crate::highlight::{TABLE_BORDER, TABLE_HEADER};

/// Cell text of one table, split into an optional header row and body rows.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct TableModel {
    pub caption: Option<String>,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl TableModel {
    pub fn from_element(table: &ElementRef<'_>, link_icon: Option<&str>) -> Self {
        let mut model = TableModel::default();
        for child in table.children().filter_map(ElementRef::wrap) {
            match child.value().name().to_ascii_lowercase().as_str() {
                "caption" => {
                    let text = normalize_whitespace(&flatten_text(&child, link_icon));
                    if !text.is_empty() {
                        model.caption = Some(text);
                    }
                }
                "thead" => {
                    for row in rows_of(&child) {
                        model.push_row(cells_of(&row, link_icon), true);
                    }
                }
                "tbody" | "tfoot" => {
                    for row in rows_of(&child) {
                        let header = is_header_row(&row);
                        model.push_row(cells_of(&row, link_icon), header);
                    }
                }
                "tr" => {
                    let header = is_header_row(&child);
                    model.push_row(cells_of(&child, link_icon), header);
                }
                _ => {}
            }
        }
        model
    }

    // Only the first row may become the header; later all-`th` rows stay in
    // the body.
    fn push_row(&mut self, cells: Vec<String>, header: bool) {
        if cells.is_empty() {
            return;
        }
        if header && self.header.is_none() && self.rows.is_empty() {
            self.header = Some(cells);
        } else {
            self.rows.push(cells);
        }
    }

    pub fn column_count(&self) -> usize {
        self.header
            .iter()
            .chain(self.rows.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }

    /// Widest cell per column, in characters.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.column_count()];
        for row in self.header.iter().chain(self.rows.iter()) {
            for (idx, cell) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }
        widths
    }
}

fn rows_of<'a>(section: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    section
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case("tr"))
        .collect()
}

fn cells_of(row: &ElementRef<'_>, link_icon: Option<&str>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| {
            let name = el.value().name();
            name.eq_ignore_ascii_case("td") || name.eq_ignore_ascii_case("th")
        })
        .map(|cell| flatten_text(&cell, link_icon).replace('\n', " "))
        .collect()
}

fn is_header_row(row: &ElementRef<'_>) -> bool {
    let mut cells = row.children().filter_map(ElementRef::wrap).peekable();
    cells.peek().is_some() && cells.all(|c| c.value().name().eq_ignore_ascii_case("th"))
}

fn border(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{left}{}{right}", segments.join(mid))
}

pub(super) fn render_table(renderer: &mut Renderer<'_>, table: ElementRef<'_>, ctx: &Ctx) {
    let model = TableModel::from_element(&table, renderer.link_icon(ctx));
    let widths = model.column_widths();
    let out = &mut renderer.out;
    out.break_line();
    if let Some(caption) = &model.caption {
        out.append(caption, &ctx.groups_with(TABLE_HEADER));
        out.newline();
    }
    if widths.is_empty() {
        out.ensure_blank_line();
        return;
    }
    let border_groups = ctx.groups_with(TABLE_BORDER);
    let write_border = |out: &mut super::TextBuilder, left: &str, mid: &str, right: &str| {
        out.append(&border(&widths, left, mid, right), &border_groups);
        out.newline();
    };
    let header_groups = ctx.groups_with(TABLE_HEADER);
    let write_row = |out: &mut super::TextBuilder, row: &[String], groups: &[String]| {
        out.append("│", &border_groups);
        for (idx, width) in widths.iter().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            let pad = width - cell.chars().count();
            out.append(" ", &[]);
            out.append(cell, groups);
            out.append(&" ".repeat(pad + 1), &[]);
            out.append("│", &border_groups);
        }
        out.newline();
    };

    write_border(out, "┌", "┬", "┐");
    if let Some(header) = &model.header {
        write_row(out, header, &header_groups);
        write_border(out, "├", "┼", "┤");
    }
    for (idx, row) in model.rows.iter().enumerate() {
        if idx > 0 {
            write_border(out, "├", "┼", "┤");
        }
        write_row(out, row, &ctx.ambient);
    }
    write_border(out, "└", "┴", "┘");
    out.ensure_blank_line();
}
