use std::process::ExitCode;

use planner_stream::GenerationStatus;

/// Exit code for a run stopped by Ctrl-C or timeout.
const EXIT_CANCELLED: u8 = 130;

pub fn progress(percent: u8, message: Option<&str>) {
    println!("{}", format_progress(percent, message));
}

fn format_progress(percent: u8, message: Option<&str>) -> String {
    match message {
        Some(message) => format!("[{percent:>3}%] {message}"),
        None => format!("[{percent:>3}%]"),
    }
}

/// Prints the final display and picks the exit code.
pub fn status(status: &GenerationStatus) -> anyhow::Result<ExitCode> {
    match status {
        GenerationStatus::Succeeded {
            payload: Some(plan),
        } => {
            println!("{}", serde_json::to_string_pretty(plan)?);
            Ok(ExitCode::SUCCESS)
        }
        GenerationStatus::Succeeded { payload: None } => {
            eprintln!("generation finished without a plan");
            Ok(ExitCode::SUCCESS)
        }
        GenerationStatus::Cancelled => {
            eprintln!("{status}");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        GenerationStatus::Failed { .. } => {
            eprintln!("{status}");
            Ok(ExitCode::FAILURE)
        }
        GenerationStatus::InProgress { .. } => {
            anyhow::bail!("generation ended without a final status")
        }
    }
}
