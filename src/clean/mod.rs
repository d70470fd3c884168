//! Cleaning, typing and derivation of backup tables

mod cleaner;
mod coerce;
mod derived;

pub use cleaner::{
    CleanedTable, DATE_RENAMES, TableCleaner, WorkingRecord, clean_records, clean_table,
    derived_date_column,
};
pub use coerce::{coerce_cell, coerce_json, from_epoch_millis, parse_datetime_str, to_timestamp};
pub use derived::{
    CALENDAR_TABLE, build_calendar, build_entry_tags, calendar_schema, load_mood_groups,
    prefs_schema, prefs_snapshot,
};
