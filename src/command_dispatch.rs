//! Purpose: Hold top-level CLI command dispatch for `halite`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command output envelopes and exit code semantics stay unchanged.
//! Invariants: Helpers in `main.rs` remain the source of shared emission logic.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "halite", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Inspect { file, json } => {
            let document = read_document(file.as_deref())?;
            let summary = inspect::summarize(&document)?;
            if json {
                emit_json(inspect::summary_json(&summary));
            } else {
                print!("{}", inspect::render_summary(&summary));
            }
            Ok(RunOutcome::ok())
        }
        Command::Strip { file, embedded } => {
            let mut document = read_document(file.as_deref())?;
            inspect::strip_reserved(&mut document, embedded);
            emit_json(document);
            Ok(RunOutcome::ok())
        }
        Command::Get {
            url,
            json,
            token,
            timeout_secs,
        } => {
            let mut client = HalClient::new(&url)?;
            if let Some(token) = token {
                client = client.with_token(token);
            }
            if let Some(secs) = timeout_secs {
                client = client.with_timeout(Duration::from_secs(secs));
            }
            let fetched = client.fetch_document(&url)?;
            if json {
                emit_json(json!({
                    "url": fetched.url,
                    "status": fetched.status,
                    "fetched_at": fetched.fetched_at,
                    "document": fetched.document,
                }));
            } else {
                emit_json(fetched.document);
            }
            Ok(RunOutcome::ok())
        }
    }
}
