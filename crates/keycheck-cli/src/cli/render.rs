//! Terminal output for live events and stored Run State.

use keycheck_core::events::CheckerEvent;
use keycheck_core::model::ResultTally;
use keycheck_core::relay::RunState;
use std::io::Write;

pub fn print_event(event: &CheckerEvent) {
    match event {
        CheckerEvent::Started { total } => println!("Checking {total} key(s)..."),
        CheckerEvent::Progress {
            current,
            total,
            current_key,
        } => {
            print!("[{current}/{total}] {current_key} ");
            let _ = std::io::stdout().flush();
        }
        CheckerEvent::KeyChecked { result, .. } => match &result.error_detail {
            Some(detail) => println!("{} ({})", result.status, detail),
            None => println!("{}", result.status),
        },
        CheckerEvent::Completed { results } => println!("Completed: {} key(s) checked.", results.len()),
        CheckerEvent::Stopped { results } => println!("\nStopped after {} key(s).", results.len()),
        CheckerEvent::Error { message } => eprintln!("\nRun failed: {message}"),
    }
}

pub fn print_tally(tally: &ResultTally) {
    println!(
        "Activated: {}  Not activated: {}  Other: {}  Total: {}",
        tally.activated,
        tally.not_activated,
        tally.other,
        tally.total()
    );
}

/// One-word run status; `interrupted` when the state claims a run but no
/// process is serving it.
pub fn run_label(state: &RunState, live: bool) -> &'static str {
    match (state.is_running, live) {
        (true, true) => "running",
        (true, false) => "interrupted",
        (false, _) if state.last_error.is_some() => "failed",
        (false, _) if state.started_at.is_none() => "idle",
        (false, _) if state.processed_count < state.total_keys => "stopped",
        (false, _) => "completed",
    }
}

pub fn print_state(state: &RunState, live: bool) {
    println!("Status:   {}", run_label(state, live));
    println!(
        "Progress: {}/{} ({}%)",
        state.processed_count,
        state.total_keys,
        state.percent()
    );
    if state.is_running && !state.current_key_preview.is_empty() {
        println!("Current:  {}", state.current_key_preview);
    }
    if let Some(input) = &state.input {
        println!("Input:    {}", input.source_name);
    }
    if let Some(err) = &state.last_error {
        println!("Error:    {err}");
    }
    print_tally(&state.tally());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_state_and_liveness() {
        let mut s = RunState::default();
        assert_eq!(run_label(&s, false), "idle");

        s.started_at = Some(1);
        s.is_running = true;
        s.total_keys = 3;
        assert_eq!(run_label(&s, true), "running");
        assert_eq!(run_label(&s, false), "interrupted");

        s.is_running = false;
        s.processed_count = 1;
        assert_eq!(run_label(&s, false), "stopped");
        s.processed_count = 3;
        assert_eq!(run_label(&s, false), "completed");
        s.last_error = Some("boom".into());
        assert_eq!(run_label(&s, false), "failed");
    }
}
