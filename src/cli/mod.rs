//! CLI command implementations.
//!
//! Each submodule implements one command group. Commands write to a caller
//! supplied writer so the binary passes stdout and tests pass a buffer.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resync` | Rebuild the search index from the database |
//! | `health` | Show composite database and search health |
//! | `search` | Query a search collection |
//! | `category` | Add, update, delete, or list categories |
//! | `product` | Add, update, delete, list, or show products |
//! | `attribute` | Add, update, or delete product attributes |
//!
//! # Example Usage
//!
//! ```bash
//! rapidstock category add "Hand Tools"
//! rapidstock product add "Claw Hammer" --category 1 --attr weight=600g --attr grip=rubber
//! rapidstock search products hammer
//! rapidstock health --json
//! ```
//!
//! Every invocation runs the startup resync first. A search outage does not
//! stop catalog commands.

mod catalog;
mod health;
mod resync;
mod search;

pub use catalog::{
    cmd_attribute_add, cmd_attribute_delete, cmd_attribute_update, cmd_category_add,
    cmd_category_delete, cmd_category_list, cmd_category_update, cmd_product_add,
    cmd_product_delete, cmd_product_list, cmd_product_show, cmd_product_update, parse_attributes,
};
pub use health::cmd_health;
pub use resync::{cmd_resync, run_startup_resync};
pub use search::cmd_search;
