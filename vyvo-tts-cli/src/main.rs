use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vyvo_tts::{BatchSummary, DecodeError, DecodedRow, TokenLayout, decode_batch};

const LOG_ENV: &str = "VYVO_TTS_LOG";
const LAYOUT_ENV: &str = "VYVO_TTS_LAYOUT";

fn usage() -> String {
    [
        "usage:",
        "  vyvo-tts decode <tokens.json> [--layout <layout.json>] [--out <codes.json>]",
        "  vyvo-tts layout [--layout <layout.json>]",
        "",
        "tokens.json is a JSON array of generated token rows, e.g. [[64403, 1, ...], ...].",
        "",
        "env:",
        "  VYVO_TTS_LAYOUT    layout.json used when --layout is absent",
        "  VYVO_TTS_LOG       tracing filter (default: warn)",
    ]
    .join("\n")
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Failed(String),
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(env::args().skip(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}\n\n{}", usage());
            ExitCode::from(2)
        }
        Err(CliError::Failed(msg)) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Default)]
struct Flags {
    positional: Vec<String>,
    layout: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_flags(mut args: impl Iterator<Item = String>) -> Result<Flags, CliError> {
    let mut flags = Flags::default();
    while let Some(a) = args.next() {
        match a.as_str() {
            "--layout" => {
                let v = args
                    .next()
                    .ok_or_else(|| CliError::Usage("--layout requires a value".into()))?;
                flags.layout = Some(PathBuf::from(v));
            }
            "--out" => {
                let v = args
                    .next()
                    .ok_or_else(|| CliError::Usage("--out requires a value".into()))?;
                flags.out = Some(PathBuf::from(v));
            }
            other if other.starts_with("--") => {
                return Err(CliError::Usage(format!("unknown flag: {other}")));
            }
            _ => flags.positional.push(a),
        }
    }
    Ok(flags)
}

fn run(mut args: impl Iterator<Item = String>) -> Result<(), CliError> {
    let Some(cmd) = args.next() else {
        return Err(CliError::Usage("missing command".into()));
    };

    match cmd.as_str() {
        "decode" => {
            let flags = parse_flags(args)?;
            let [input] = flags.positional.as_slice() else {
                return Err(CliError::Usage("decode takes exactly one <tokens.json>".into()));
            };
            let layout = resolve_layout(flags.layout)?;
            decode(PathBuf::from(input), flags.out, &layout)
        }
        "layout" => {
            let flags = parse_flags(args)?;
            if let Some(extra) = flags.positional.first() {
                return Err(CliError::Usage(format!("layout takes no arguments, got {extra}")));
            }
            let layout = resolve_layout(flags.layout)?;
            let table: serde_json::Map<String, serde_json::Value> = layout
                .markers()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect();
            print_json(&table)
        }
        "-h" | "--help" | "help" => {
            println!("{}", usage());
            Ok(())
        }
        other => Err(CliError::Usage(format!("unknown command: {other}"))),
    }
}

fn resolve_layout(flag: Option<PathBuf>) -> Result<TokenLayout, CliError> {
    let path = flag.or_else(|| {
        env::var(LAYOUT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });
    match path {
        Some(p) => TokenLayout::load(&p)
            .map_err(|e| CliError::Failed(format!("failed to load layout {}: {e}", p.display()))),
        None => Ok(TokenLayout::default()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowOk<'a> {
    layer1: &'a [u32],
    layer2: &'a [u32],
    layer3: &'a [u32],
    discarded_tail: usize,
    marker_found: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum RowOutcome<'a> {
    Ok(RowOk<'a>),
    Error(String),
}

#[derive(Serialize)]
struct RowReport<'a> {
    row: usize,
    #[serde(flatten)]
    outcome: RowOutcome<'a>,
}

fn row_ok(d: &DecodedRow) -> RowOk<'_> {
    RowOk {
        layer1: &d.codes.layer1,
        layer2: &d.codes.layer2,
        layer3: &d.codes.layer3,
        discarded_tail: d.diagnostics.discarded_tail,
        marker_found: d.diagnostics.start_marker.is_some(),
    }
}

fn build_report(results: &[Result<DecodedRow, DecodeError>]) -> Vec<RowReport<'_>> {
    results
        .iter()
        .enumerate()
        .map(|(row, r)| RowReport {
            row,
            outcome: match r {
                Ok(d) => RowOutcome::Ok(row_ok(d)),
                Err(e) => RowOutcome::Error(e.to_string()),
            },
        })
        .collect()
}

fn decode(input: PathBuf, out: Option<PathBuf>, layout: &TokenLayout) -> Result<(), CliError> {
    let bytes = std::fs::read(&input)
        .map_err(|e| CliError::Failed(format!("failed to read {}: {e}", input.display())))?;
    let rows: Vec<Vec<u32>> = serde_json::from_slice(&bytes)
        .map_err(|e| CliError::Failed(format!("{} is not a token row array: {e}", input.display())))?;

    let results = decode_batch(&rows, layout);
    let summary = BatchSummary::from_results(&results);
    tracing::info!(
        input = %input.display(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        frames = summary.frames,
        "decode finished"
    );

    let report = build_report(&results);
    match out {
        Some(path) => {
            let json = serde_json::to_vec_pretty(&report)
                .map_err(|e| CliError::Failed(format!("failed to encode report: {e}")))?;
            std::fs::write(&path, json)
                .map_err(|e| CliError::Failed(format!("failed to write {}: {e}", path.display())))
        }
        None => print_json(&report),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let s = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Failed(format!("failed to encode json: {e}")))?;
    println!("{s}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> impl Iterator<Item = String> {
        v.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn flags_are_parsed_in_any_order() {
        let f = parse_flags(strs(&["--out", "o.json", "in.json", "--layout", "l.json"])).unwrap();
        assert_eq!(f.positional, vec!["in.json".to_string()]);
        assert_eq!(f.out, Some(PathBuf::from("o.json")));
        assert_eq!(f.layout, Some(PathBuf::from("l.json")));
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        assert!(matches!(parse_flags(strs(&["--nope"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_flags(strs(&["--out"])), Err(CliError::Usage(_))));
    }

    #[test]
    fn report_rows_serialize_ok_and_error() {
        let layout = TokenLayout::JENNY;
        let mut good = vec![layout.start_of_speech()];
        good.extend([64420, 68514, 72618, 76714, 80898, 85010, 89196]);
        let bad = vec![layout.start_of_speech(), 1, 2, 3, 4, 5, 6, 7];
        let results = decode_batch(&[good, bad], &layout);

        let v = serde_json::to_value(build_report(&results)).unwrap();
        assert_eq!(v[0]["row"], 0);
        assert_eq!(v[0]["ok"]["layer2"], serde_json::json!([8, 104]));
        assert_eq!(v[0]["ok"]["markerFound"], true);
        assert_eq!(v[1]["row"], 1);
        assert!(v[1]["error"].as_str().unwrap().contains("out of range"));
    }

    #[test]
    fn commands_reject_stray_arguments() {
        assert!(matches!(run(strs(&["layout", "extra.json"])), Err(CliError::Usage(_))));
        assert!(matches!(run(strs(&["decode"])), Err(CliError::Usage(_))));
        assert!(matches!(run(strs(&["decode", "a.json", "b.json"])), Err(CliError::Usage(_))));
        assert!(matches!(run(strs(&[])), Err(CliError::Usage(_))));
    }

    #[test]
    fn decode_writes_a_report_even_when_rows_fail() {
        let layout = TokenLayout::JENNY;
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("tokens.json");
        let out = tmp.path().join("codes.json");

        let mut good = vec![layout.start_of_human(), 42, layout.start_of_speech()];
        good.extend([64420, 68514, 72618, 76714, 80898, 85010, 89196, layout.end_of_speech()]);
        let bad = vec![layout.start_of_speech(), 1, 2, 3, 4, 5, 6, 7];
        std::fs::write(&input, serde_json::to_vec(&[good, bad]).unwrap()).unwrap();

        decode(input, Some(out.clone()), &layout).unwrap();

        let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        let rows = v.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ok"]["layer1"], serde_json::json!([10]));
        assert_eq!(rows[0]["ok"]["layer3"], serde_json::json!([16, 16, 120, 210]));
        assert_eq!(rows[0]["ok"]["discardedTail"], 0);
        assert!(rows[1]["error"].is_string());
    }

    #[test]
    fn decode_fails_on_malformed_input() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("tokens.json");
        std::fs::write(&input, br#"{"not": "rows"}"#).unwrap();
        assert!(matches!(
            decode(input, None, &TokenLayout::JENNY),
            Err(CliError::Failed(_))
        ));
        assert!(matches!(
            decode(tmp.path().join("missing.json"), None, &TokenLayout::JENNY),
            Err(CliError::Failed(_))
        ));
    }
}
