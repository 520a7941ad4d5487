//! `pst-lmcd`: control daemon for a simulated pulsar timing receive node.

use std::process::ExitCode;

fn main() -> ExitCode {
    match pst_lmc::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("pst-lmcd: {error}");
            ExitCode::FAILURE
        }
    }
}
