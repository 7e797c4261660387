use crate::output::print_json;
use anyhow::Result;
use hostd_core::shed_state::read_state;
use std::path::Path;

pub fn run(state_file: &Path, json: bool) -> Result<()> {
    let state = read_state(state_file);
    if json {
        return print_json(&state);
    }

    if !state.state_file_exists {
        println!("No shed state at {}", state.state_file.display());
        return Ok(());
    }
    println!(
        "{} consumer(s) shed (restore {}):",
        state.stopped_count,
        if state.can_restore { "available" } else { "not needed" }
    );
    for name in &state.stopped {
        println!("  {name}");
    }
    Ok(())
}
