//! jq pre-filtering of input documents (via jaq) before decoding.
use anyhow::{Result, anyhow};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

/// Run `filter_src` on `input`, returning every output as a JSON value.
pub fn apply_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader
        .load(&arena, program)
        .map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    outputs
        .map(|item| {
            let val = item.map_err(|e| anyhow!("jq error: {e:?}"))?;
            // Val renders as JSON text; round-trip it back into serde_json
            serde_json::from_str::<Value>(&val.to_string())
                .map_err(|e| anyhow!("jq produced invalid JSON: {e}"))
        })
        .collect()
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let message = errs
        .iter()
        .map(|(file, err)| format!("parse error: {err:?} in `{}`", file.code))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow!(message)
}

fn format_undefined_errors(
    errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>,
) -> anyhow::Error {
    let message = errs
        .iter()
        .flat_map(|(file, list)| {
            list.iter().map(move |(name, undef)| {
                format!("undefined `{name}`: {undef:?} in `{}`", file.code)
            })
        })
        .collect::<Vec<_>>()
        .join("\n");
    anyhow!(message)
}
