use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::trends::stats::TrendDirection;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Seconds as `45s` below a minute, `3.2min` above.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else {
        format!("{:.1}min", seconds / 60.0)
    }
}

pub fn color_coded_success_cell(rate: f64) -> Cell {
    let text = format!("{rate:.1}%");
    if rate > 80.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if rate >= 50.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn color_coded_duration_cell(seconds: f64) -> Cell {
    let minutes = seconds / 60.0;
    let text = format_duration(seconds);
    if minutes <= 10.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if minutes <= 15.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn color_coded_flakiness_cell(rate: f64) -> Cell {
    let text = format!("{rate:.1}%");
    if rate >= 25.0 {
        Cell::new(text).fg(TableColor::Red)
    } else {
        Cell::new(text).fg(TableColor::Yellow)
    }
}

/// Signed percent change coloured by trend direction.
pub fn trend_cell(direction: TrendDirection, percent_change: f64) -> Cell {
    let text = format!("{direction} ({percent_change:+.1}%)");
    match direction {
        TrendDirection::Improving => Cell::new(text).fg(TableColor::Green),
        TrendDirection::Stable => Cell::new(text).fg(TableColor::DarkGrey),
        TrendDirection::Degrading => Cell::new(text).fg(TableColor::Red),
    }
}
