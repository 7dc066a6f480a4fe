//! Table formatting using comfy-table.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use tessera::AttributeMap;

/// Creates a two-column table of attribute ids and their values.
pub fn attribute_table(attributes: &AttributeMap) -> Table {
    let mut table = Table::new();

    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Attribute").add_attribute(Attribute::Bold),
            Cell::new("Values").add_attribute(Attribute::Bold),
        ]);

    for (id, attribute) in attributes {
        let values: Vec<String> = attribute.values().iter().map(ToString::to_string).collect();
        table.add_row(vec![Cell::new(id), Cell::new(values.join("\n"))]);
    }

    table
}

/// Prints attributes as a table, followed by a count.
pub fn print_attribute_table(attributes: &AttributeMap) {
    if attributes.is_empty() {
        println!("No attributes.");
        return;
    }

    println!("{}", attribute_table(attributes));

    let count = attributes.len();
    let word = if count == 1 { "attribute" } else { "attributes" };
    println!("({count} {word})");
}
