//! Runs every fixture under `fixtures/` through plan assembly and the runtime.
//!
//! Usage: `dev-test-runner [FILTER_REGEX] [FIXTURE_DIR]`
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tagplan::{EnumValue, SumTypeDecl, assemble, decode, encode};

#[derive(Debug, Deserialize)]
struct Fixture {
    decl: Value,
    /// Expected diagnostic kinds, sorted.
    #[serde(default)]
    diagnostics: Vec<String>,
    #[serde(default)]
    round_trips: Vec<RoundTrip>,
    #[serde(default)]
    decodes: Vec<RoundTrip>,
    #[serde(default)]
    decode_errors: Vec<DecodeFailure>,
}

#[derive(Debug, Deserialize)]
struct RoundTrip {
    value: EnumValue,
    document: Value,
}

#[derive(Debug, Deserialize)]
struct DecodeFailure {
    document: Value,
    error: String,
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let filter = match args.next().map(|src| Regex::new(&src)).transpose() {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("invalid filter: {error}");
            return ExitCode::FAILURE;
        }
    };
    let dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures"));

    let mut paths = match std::fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>(),
        Err(error) => {
            eprintln!("cannot read {}: {error}", dir.display());
            return ExitCode::FAILURE;
        }
    };
    paths.sort();

    let mut failures = 0;
    let mut ran = 0;
    for path in paths {
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        if filter.as_ref().is_some_and(|re| !re.is_match(&name)) {
            continue;
        }
        ran += 1;
        match run_fixture(&path) {
            Ok(checks) => eprintln!("✅ {name} ({checks} checks)"),
            Err(problems) => {
                failures += 1;
                eprintln!("❌ {name}");
                for problem in problems {
                    eprintln!("    {problem}");
                }
            }
        }
    }
    eprintln!("—— {ran} fixture(s), {failures} failed ——");
    if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn load(path: &Path) -> Result<Fixture, String> {
    let source = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let de = &mut serde_json::Deserializer::from_str(&source);
    serde_path_to_error::deserialize(de).map_err(|e| format!("at JSON path {} → {}", e.path(), e.inner()))
}

fn run_fixture(path: &Path) -> Result<usize, Vec<String>> {
    let fixture = load(path).map_err(|e| vec![e])?;
    let decl = SumTypeDecl::from_json_value(fixture.decl).map_err(|e| vec![e.to_string()])?;
    let assembly = assemble(&decl);

    let mut problems = Vec::new();
    let mut kinds: Vec<String> = assembly
        .diagnostics
        .iter()
        .map(|d| format!("{:?}", d.kind).chars().take_while(|c| c.is_alphanumeric()).collect())
        .collect();
    kinds.sort();
    if kinds != fixture.diagnostics {
        problems.push(format!("diagnostics: expected {:?}, got {kinds:?}", fixture.diagnostics));
    }
    let plan = match assembly.plan {
        Some(plan) => plan,
        None if problems.is_empty() => return Ok(1),
        None => return Err(problems),
    };

    let mut checks = 1;
    for case in &fixture.round_trips {
        checks += 1;
        match encode(&plan, &case.value) {
            Ok(doc) if doc == case.document => {}
            Ok(doc) => problems.push(format!("encode {}: expected {}, got {doc}", case.value.case, case.document)),
            Err(error) => problems.push(format!("encode {}: {error}", case.value.case)),
        }
    }
    for case in fixture.round_trips.iter().chain(&fixture.decodes) {
        checks += 1;
        match decode(&plan, &case.document) {
            Ok(value) if value == case.value => {}
            Ok(value) => problems.push(format!("decode {}: expected {:?}, got {value:?}", case.document, case.value)),
            Err(error) => problems.push(format!("decode {}: {error}", case.document)),
        }
    }
    for case in &fixture.decode_errors {
        checks += 1;
        match decode(&plan, &case.document) {
            Err(error) if error.to_string() == case.error => {}
            Err(error) => problems.push(format!("decode {}: expected `{}`, got `{error}`", case.document, case.error)),
            Ok(value) => problems.push(format!("decode {}: expected failure, got {value:?}", case.document)),
        }
    }
    if problems.is_empty() { Ok(checks) } else { Err(problems) }
}
