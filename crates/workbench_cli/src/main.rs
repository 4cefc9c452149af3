//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `workbench_core` linkage
//!   and migration health.
//! - Keep output deterministic for quick local sanity checks.

use workbench_core::db::migrations::latest_version;
use workbench_core::db::open_db_in_memory;

fn main() {
    println!("workbench_core version={}", workbench_core::core_version());
    println!("schema latest_version={}", latest_version());

    match open_db_in_memory() {
        Ok(_conn) => println!("db_open status=ok mode=memory"),
        Err(err) => {
            eprintln!("db_open status=error mode=memory error={err}");
            std::process::exit(1);
        }
    }
}
