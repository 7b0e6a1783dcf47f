//! Plan introspection: a `describe()` renderer for a job list, used by tests
//! and available for a future `-driver-print-jobs`-style CLI layer. Grounded
//! on the teacher's reliance on `Debug`-derived types for direct test
//! assertions (`lib.rs`, `compile/project.rs` tests).

use std::fmt::Write as _;

use crate::job::Job;

/// Renders one line per job: kind, primary inputs (if any), outputs.
pub fn describe(jobs: &[Job]) -> String {
    let mut out = String::new();
    for (idx, job) in jobs.iter().enumerate() {
        let primaries: Vec<String> = job.primary_inputs.iter().map(|p| p.key()).collect();
        let outputs: Vec<String> = job.outputs.iter().map(|p| p.key()).collect();
        let _ = writeln!(
            out,
            "[{idx}] {:?} primaries=[{}] outputs=[{}]",
            job.kind,
            primaries.join(", "),
            outputs.join(", ")
        );
    }
    out
}
