//! CLI module for gitdb
//!
//! Read-only browsing and maintenance:
//! - datasets: list datasets
//! - show: list blocks of a dataset or render one block
//! - reindex: rebuild indexes from block contents

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{datasets, open, reindex, run, run_command, show};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
