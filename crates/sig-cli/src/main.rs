//! `sigtrack` — electronic-signature tracker CLI.
//!
//! Reads the audit stream from stdin, a signature configuration file,
//! and an optional exclusion table; writes a DRF, a SQLite write-back,
//! and/or a priority listing depending on which flags are present.

use std::fs;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use sig_adapters::{DelimitedSiteLookup, RowReportSink, SqliteSigningSink};
use sig_cli::cli::Cli;
use sig_cli::{finalize, load_config, load_exclusions, priority_text, run_audit_stream};
use sig_domain::{RunConfig, SignatureError};
use sig_ports::{NullSigningSink, ReportSink, SigningSink};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "sig_cli=info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    ExitCode::from(run(&cli))
}

/// Exit-code values: `0` success, `2` usage or I/O
/// setup error. Returns a plain `u8` rather than `ExitCode` so the
/// pipeline can be asserted on directly in tests (`ExitCode` itself
/// carries no `PartialEq`).
fn run(cli: &Cli) -> u8 {
    let config_source = match fs::read_to_string(&cli.config) {
        Ok(s) => s,
        Err(source) => {
            let err = SignatureError::IoOpen { path: cli.config.clone(), source };
            error!(%err, "failed to open configuration file");
            return 2;
        }
    };

    let parsed = load_config(&config_source);
    if !parsed.errors.is_empty() {
        for e in &parsed.errors {
            let err = SignatureError::ConfigSyntax {
                line: e.line,
                message: e.message.clone(),
            };
            error!(%err, "configuration syntax error");
        }
        let err = SignatureError::ConfigAborted {
            error_count: parsed.errors.len(),
        };
        error!(%err, "configuration aborted");
        return 2;
    }

    if let Some(priority_path) = &cli.priority_file {
        let text = priority_text(&parsed.configs);
        if let Err(e) = fs::write(priority_path, text) {
            error!(path = %priority_path.display(), error = %e, "failed to open priority-file target");
            return 2;
        }
        return 0;
    }

    let exclusion_source = match &cli.exclusion {
        Some(path) => match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                // Not in the fatal-open list (only config/db/drf abort the run);
                // fall back to an empty table and continue.
                error!(path = %path.display(), error = %e, "exclusion file unreadable, continuing without it");
                String::new()
            }
        },
        None => String::new(),
    };
    let (exclusions, _warnings) = load_exclusions(&exclusion_source);

    let mut sink: Box<dyn SigningSink> = match &cli.db {
        Some(path) => match SqliteSigningSink::open(path) {
            Ok(s) => Box::new(s),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open db target");
                return 2;
            }
        },
        None => Box::new(NullSigningSink),
    };

    let stdin = io::stdin();
    let input = BufReader::new(stdin.lock());
    let mut engine = run_audit_stream(parsed.configs, &exclusions, input, sink.as_mut());

    if let Err(e) = sink.commit() {
        error!(error = %e, "signing sink commit failed");
    }

    let run_config = RunConfig {
        allow_signer_changes: cli.allow_signer_changes,
        arrived_only: cli.arrived_only,
        resign_when_final: cli.resign_when_final,
        sdv: cli.sdv,
    };
    let drf_text = finalize(&mut engine, &run_config);

    if let Some(drf_path) = &cli.drf {
        if let Err(e) = write_target(drf_path, &drf_text) {
            error!(path = %drf_path.display(), error = %e, "failed to open drf target");
            return 2;
        }
    }

    let site_lookup = cli.studydir.as_ref().map(|studydir| {
        let centres = fs::read_to_string(studydir.join("centres.txt")).unwrap_or_default();
        let countries = fs::read_to_string(studydir.join("countries.txt")).unwrap_or_default();
        let lookup = DelimitedSiteLookup::parse(&centres, &countries);
        debug!(
            centres = centres.lines().count(),
            countries = countries.lines().count(),
            "site lookups loaded"
        );
        lookup
    });

    if let Some(xls_path) = &cli.xls {
        let sink = RowReportSink;
        let rows = sink.render(
            engine.nodes(),
            cli.sdv,
            site_lookup.as_ref().map(|l| l as &dyn sig_ports::SiteLookup),
        );
        let json = serde_json::to_string_pretty(&rows).unwrap_or_default();
        if let Err(e) = write_target(xls_path, &json) {
            error!(path = %xls_path.display(), error = %e, "failed to open xls target");
            return 2;
        }
    }

    0
}

fn write_target(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborts_on_missing_config() {
        let cli = Cli {
            config: "/nonexistent/path.cfg".into(),
            drf: None,
            xls: None,
            allow_signer_changes: false,
            arrived_only: false,
            resign_when_final: false,
            sdv: false,
            studydir: None,
            db: None,
            exclusion: None,
            priority_file: None,
        };
        assert_eq!(run(&cli), 2);
    }

    #[test]
    fn priority_file_flag_writes_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("sig.cfg");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(f, r#"signature "A" plate 10 visit * fields 5 {{ plate 10; plate 11; }}"#).unwrap();
        let priority_path = dir.path().join("priority.txt");

        let cli = Cli {
            config: config_path,
            drf: None,
            xls: None,
            allow_signer_changes: false,
            arrived_only: false,
            resign_when_final: false,
            sdv: false,
            studydir: None,
            db: None,
            exclusion: None,
            priority_file: Some(priority_path.clone()),
        };
        assert_eq!(run(&cli), 0);
        let text = std::fs::read_to_string(priority_path).unwrap();
        assert_eq!(text, "10|5|signature\n11|5|data\n");
    }
}
