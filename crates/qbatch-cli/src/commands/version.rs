//! Version command implementation.

use console::style;
use qbatch_core::MIN_ENGINE_VERSION;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - batch execution of quantum experiments",
        style("qbatch").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qbatch-core             Job orchestration and result aggregation");
    println!("  qbatch-adapter-http     Engine transport over HTTP");
    println!("  qbatch-adapter-process  Engine transport over a local executable");
    println!("  qbatch-cli              Command-line interface");
    println!();
    println!("Minimum engine version: {}", style(MIN_ENGINE_VERSION).yellow());
    println!("License:                {}", style("Apache-2.0").dim());
}
