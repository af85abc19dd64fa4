//! Minimal CLI: decode JSON documents against a type configuration, or inspect the schemas.
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use dson::{Dson, Value, resolver};

use crate::path_de::{TypeConfig, load_config};
use crate::registry::TypeRegistry;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode JSON/NDJSON into typed records described by constructor signatures
#[derive(Parser, Debug)]
#[command(name = "dson")]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// decode every input document as the root type and print the records
    Decode(DecodeOut),
    /// parse the configured signatures and print each schema
    Schema(SchemaOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// type configuration (.json): signatures, nested strategies, aliases, resolvers
    #[arg(long, short)]
    config: PathBuf,

    /// type id each document is decoded as
    #[arg(long)]
    root: String,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    /// type configuration (.json)
    #[arg(long, short)]
    config: PathBuf,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(serde_json::Value) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            for document in self.documents(&source, &source_path_str)? {
                let document = self.select(document, &source_path_str)?;
                match self.jq_expr.as_ref() {
                    None => apply(document)?,
                    Some(jq_expr) => {
                        let outputs = crate::jq_exec::apply_filter(jq_expr, &document)
                            .with_context(|| {
                                format!(
                                    "failed to apply jq expression to source file \
                                     ({source_path_str})"
                                )
                            })?;
                        for output in outputs {
                            apply(output)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn documents(&self, source: &str, source_path_str: &str) -> Result<Vec<serde_json::Value>> {
        let parse = |text: &str| {
            serde_json::from_str::<serde_json::Value>(text)
                .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))
        };
        if self.ndjson {
            source.lines().filter(|l| !l.trim().is_empty()).map(parse).collect()
        } else {
            Ok(vec![parse(source)?])
        }
    }

    fn select(
        &self,
        document: serde_json::Value,
        source_path_str: &str,
    ) -> Result<serde_json::Value> {
        match self.json_pointer.as_deref() {
            None => Ok(document),
            Some(pointer) => document.pointer(pointer).cloned().ok_or_else(|| {
                anyhow!("JSON pointer {pointer} selects nothing in {source_path_str}")
            }),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Decode(target) => {
                let config = load_config(&target.config)?;
                let registry = TypeRegistry::from_config(&config)?;
                let engine = build_engine(&config)?;

                let mut rendered = Vec::new();
                target.input_settings.load_process(|json| {
                    let decoded = registry
                        .decode(&engine, &target.root, &Value::from(json))
                        .with_context(|| {
                            format!("failed to decode document as `{}`", target.root)
                        })?;
                    rendered.push(decoded.to_json()?);
                    Ok(())
                })?;
                tracing::info!(documents = rendered.len(), root = %target.root, "decoded");

                let mut output = String::new();
                for record in &rendered {
                    if target.input_settings.ndjson {
                        output.push_str(&serde_json::to_string(record)?);
                    } else {
                        output.push_str(&serde_json::to_string_pretty(record)?);
                    }
                    output.push('\n');
                }
                write_output(target.out.as_ref(), &output)
            }
            Command::Schema(target) => {
                let config = load_config(&target.config)?;
                let registry = TypeRegistry::from_config(&config)?;
                let mut output = String::new();
                for schema in registry.schemas() {
                    output.push_str(&format!("{}\n", schema.type_id));
                    for field in &schema.fields {
                        let key = registry.aliases().key_for(&schema.type_id, &field.name);
                        if key == field.name {
                            output.push_str(&format!("    {field}\n"));
                        } else {
                            output.push_str(&format!("    {field}  <- \"{key}\"\n"));
                        }
                    }
                }
                write_output(None, &output)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Default resolvers from the config are composed into one step, so a resolver meant for
/// one declared type does not trip the per-step type check on fields of another type.
fn build_engine(config: &TypeConfig) -> Result<Dson> {
    let resolvers = config
        .resolvers
        .iter()
        .map(|name| resolver::builtin(name).ok_or_else(|| anyhow!("unknown resolver `{name}`")))
        .collect::<Result<Vec<_>>>()?;
    let mut builder = Dson::builder().strict_default_resolvers(config.strict_default_resolvers);
    if !resolvers.is_empty() {
        builder = builder.resolver(resolver::compose(resolvers));
    }
    Ok(builder.build())
}

fn write_output(out: Option<&PathBuf>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents)
                .with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            std::io::stdout().write_all(contents.as_bytes())?;
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
