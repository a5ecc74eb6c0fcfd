//! Terminal tables for compiled mappers and mapping runs.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use rowmap_map::{CompiledMapper, FieldError, LevelPlan};

use crate::pipeline::MapSummary;

/// One line per input column: where it lands and how its cells are read.
pub fn column_table(mapper: &CompiledMapper) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Column"),
        header_cell("Property"),
        header_cell("Routing"),
        header_cell("Level"),
        header_cell("Pipeline"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for plan in mapper.columns() {
        table.add_row(vec![
            Cell::new(plan.key().index()),
            Cell::new(plan.key().name()),
            Cell::new(plan.path()),
            routing_cell(plan.routing().as_str()),
            Cell::new(level_name(&mapper.levels()[plan.level()])),
            dim_cell(plan.pipeline().describe()),
        ]);
    }
    table
}

/// One line per object level with its break keys.
pub fn level_table(mapper: &CompiledMapper) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Level"),
        header_cell("Element"),
        header_cell("Parent"),
        header_cell("Keys"),
        header_cell("Columns"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    let levels = mapper.levels();
    for level in levels {
        let parent = level
            .parent()
            .map_or_else(|| dim_cell("-"), |p| Cell::new(level_name(&levels[p])));
        let keys = if level.keys().is_empty() {
            if level.breaks_without_keys() {
                dim_cell("(every row)")
            } else {
                dim_cell("(none)")
            }
        } else {
            Cell::new(
                level
                    .keys()
                    .iter()
                    .map(|k| k.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };
        table.add_row(vec![
            Cell::new(level_name(level)).add_attribute(Attribute::Bold),
            Cell::new(level.element_type()),
            parent,
            keys,
            Cell::new(level.columns().len()),
        ]);
    }
    table
}

/// Recorded field errors of a run.
pub fn error_table(summary: &MapSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Row"), header_cell("Column"), header_cell("Error")]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for FieldError {
        column, row, error, ..
    } in &summary.field_errors
    {
        table.add_row(vec![
            Cell::new(row),
            Cell::new(column),
            Cell::new(error).fg(Color::Yellow),
        ]);
    }
    table
}

fn level_name(level: &LevelPlan) -> &str {
    if level.path().is_empty() {
        "(root)"
    } else {
        level.path()
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn routing_cell(routing: &str) -> Cell {
    match routing {
        "element" => Cell::new(routing).fg(Color::Blue),
        "constructor" => Cell::new(routing).fg(Color::Green),
        _ => Cell::new(routing),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
