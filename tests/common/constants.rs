//! Shared names used across the end-to-end tests.

pub const APP: &str = "App";
pub const CATALOG: &str = "Catalog";
pub const SHOP: &str = "Shop";

pub const CATALOG_PATH: &str = "modules/catalog";
pub const SHOP_PATH: &str = "modules/shop";

pub const LEDGER_TABLE: &str = "fixture_data";

/// Creates the table the country fixtures insert into.
pub const COUNTRIES_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS countries (code TEXT PRIMARY KEY, name TEXT NOT NULL);";
