//! CLI: declarations → (plan | encode | decode)
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use crate::decl::SumTypeDecl;
use crate::error::{Diagnostic, Severity};
use crate::plan::{Assembly, Plan, assemble};
use crate::runtime::{self, EnumValue};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build decode/encode plans for tagged sum types and run them against JSON documents
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// assemble plans from declaration files and print them
    Plan(PlanOut),
    /// encode `{ "case": .., "fields": {..} }` values into wire documents
    Encode(RunOut),
    /// decode wire documents into `{ "case": .., "fields": {..} }` values
    Decode(RunOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct PlanOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// only report diagnostics
    #[arg(long)]
    check: bool,
}

#[derive(clap::Parser, Debug)]
struct RunOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// sum type declaration the plan is built from
    #[arg(long)]
    decl: PathBuf,

    /// pretty-print each output document
    #[arg(long)]
    pretty: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(&Path, Value) -> anyhow::Result<()>) -> anyhow::Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        for source_path in source_paths {
            for value in self.load_file(&source_path)? {
                apply(&source_path, value)?;
            }
        }
        Ok(())
    }

    fn load_file(&self, source_path: &Path) -> anyhow::Result<Vec<Value>> {
        let source = std::fs::read_to_string(source_path)
            .with_context(|| format!("failed to read source file {}", source_path.display()))?;
        let documents = if self.ndjson {
            source
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(ix, line)| {
                    serde_json::from_str::<Value>(line).with_context(|| {
                        format!("failed to parse NDJSON line {} of {}", ix + 1, source_path.display())
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?
        } else {
            let value = serde_json::from_str::<Value>(&source)
                .with_context(|| format!("failed to parse JSON source file {}", source_path.display()))?;
            vec![value]
        };
        match self.json_pointer.as_deref() {
            None => Ok(documents),
            Some(pointer) => documents
                .into_iter()
                .map(|doc| {
                    doc.pointer(pointer).cloned().with_context(|| {
                        format!("JSON pointer {pointer} matched nothing in {}", source_path.display())
                    })
                })
                .collect(),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Plan(target) => target.run(),
            Command::Encode(target) => target.run(|plan, value| {
                let value: EnumValue = serde_json::from_value(value).context("not an enum value")?;
                Ok(runtime::encode(plan, &value)?)
            }),
            Command::Decode(target) => target.run(|plan, value| {
                let decoded = runtime::decode(plan, &value)?;
                Ok(serde_json::to_value(decoded)?)
            }),
        }
    }
}

impl PlanOut {
    fn run(&self) -> anyhow::Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input_settings.input)?;
        tracing::info!(files = source_paths.len(), "assembling plans");

        // independent per declaration; results keep input order
        let results = source_paths
            .par_iter()
            .map(|path| -> anyhow::Result<Vec<(String, Assembly)>> {
                self.input_settings
                    .load_file(path)?
                    .into_iter()
                    .map(|value| {
                        let decl = SumTypeDecl::from_json_value(value)
                            .with_context(|| format!("invalid declaration in {}", path.display()))?;
                        Ok((decl.name.clone(), assemble(&decl)))
                    })
                    .collect()
            })
            .collect::<Vec<_>>();

        let mut rendered = String::new();
        let mut failed = 0usize;
        for (path, result) in source_paths.iter().zip(results) {
            for (type_name, assembly) in result? {
                print_diagnostics(path, &assembly.diagnostics);
                match assembly.into_result(&type_name) {
                    Ok(plan) => rendered.push_str(&format!("{plan}\n")),
                    Err(err) => {
                        eprintln!("{} {err}", "✗".red());
                        failed += 1;
                    }
                }
            }
        }
        if !self.check {
            write_output(self.out.as_deref(), &rendered)?;
        }
        if failed > 0 {
            bail!("{failed} declaration(s) failed to assemble");
        }
        Ok(())
    }
}

impl RunOut {
    fn run(&self, apply: impl Fn(&Plan, Value) -> anyhow::Result<Value>) -> anyhow::Result<()> {
        let plan = load_plan(&self.decl)?;
        let mut rendered = String::new();
        self.input_settings.load_process(|path, value| {
            let output = apply(&plan, value).with_context(|| format!("in {}", path.display()))?;
            let line = if self.pretty { serde_json::to_string_pretty(&output)? } else { serde_json::to_string(&output)? };
            rendered.push_str(&line);
            rendered.push('\n');
            Ok(())
        })?;
        write_output(self.out.as_deref(), &rendered)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_plan(path: &Path) -> anyhow::Result<Plan> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read declaration {}", path.display()))?;
    let decl = SumTypeDecl::from_json_str(&source)
        .with_context(|| format!("invalid declaration in {}", path.display()))?;
    let assembly = assemble(&decl);
    print_diagnostics(path, &assembly.diagnostics);
    Ok(assembly.into_result(&decl.name)?)
}

fn print_diagnostics(path: &Path, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let level = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        eprintln!("{level}: {}: {}: {}", path.display().to_string().dimmed(), diagnostic.subject, diagnostic.kind);
    }
}

fn write_output(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            print!("{contents}");
            Ok(())
        }
    }
}

pub fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched = glob::glob(pattern)
                .with_context(|| format!("invalid glob pattern: {pattern}"))?
                .collect::<Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                bail!("glob pattern matched no files: {pattern}");
            }
            matched.sort();
            out.append(&mut matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
