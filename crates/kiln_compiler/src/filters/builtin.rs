//! Built-in filters.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use kiln_model::FilterParams;
use kiln_rules::FilterKind;
use serde_json::Value;

use super::{Filter, FilterContext, FilterInput, FilterOutput};
use crate::error::FilterError;

/// Passes text through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityFilter;

impl Filter for IdentityFilter {
    fn name(&self) -> &str {
        "identity"
    }

    fn run(
        &self,
        input: FilterInput<'_>,
        _params: &FilterParams,
        _ctx: &mut FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        Ok(FilterOutput::Text(text_input(input)?.to_string()))
    }
}

/// Substitutes `{{ ... }}` tags.
///
/// A tag is either a dotted assign lookup such as `{{ content }}`,
/// `{{ item.title }}` or `{{ config.site_name }}`, or one of the directives
///
/// - `{{ content_of /id [rep] [snapshot] }}`
/// - `{{ raw_content_of /id }}`
/// - `{{ path_of /id [rep] }}`
/// - `{{ attribute_of /id key }}`
///
/// Strings are inserted as-is and other values as JSON. A lookup that finds
/// nothing renders empty, or fails when the `strict` param is true.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateFilter;

impl Filter for TemplateFilter {
    fn name(&self) -> &str {
        "template"
    }

    fn run(
        &self,
        input: FilterInput<'_>,
        params: &FilterParams,
        ctx: &mut FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let template = text_input(input)?;
        let strict = params.get("strict").and_then(Value::as_bool).unwrap_or(false);

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| FilterError::failed("unterminated '{{' tag"))?;
            let tag = after[..end].trim();
            match evaluate(tag, ctx)? {
                Some(value) => out.push_str(&value),
                None if strict => {
                    return Err(FilterError::failed(format!("'{tag}' is not defined")))
                }
                None => {}
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(FilterOutput::Text(out))
    }
}

fn evaluate(tag: &str, ctx: &mut FilterContext<'_>) -> Result<Option<String>, FilterError> {
    let words: Vec<&str> = tag.split_whitespace().collect();
    match words.as_slice() {
        ["content_of", id] => ctx.compiled_content_of(id, "default", None).map(Some),
        ["content_of", id, rep] => ctx.compiled_content_of(id, rep, None).map(Some),
        ["content_of", id, rep, snapshot] => {
            ctx.compiled_content_of(id, rep, Some(*snapshot)).map(Some)
        }
        ["raw_content_of", id] => ctx.raw_content_of(id).map(Some),
        ["path_of", id] => ctx.path_of(id, "default"),
        ["path_of", id, rep] => ctx.path_of(id, rep),
        ["attribute_of", id, key] => Ok(ctx.attributes_of(id)?.get(*key).map(render)),
        [path] => {
            let mut segments = path.split('.');
            let Some(root) = segments.next() else {
                return Ok(None);
            };
            let mut value = ctx.get(root);
            for segment in segments {
                value = value.and_then(|v| v.get(segment).cloned());
            }
            Ok(value.filter(|v| !v.is_null()).as_ref().map(render))
        }
        _ => Err(FilterError::failed(format!("cannot parse tag '{tag}'"))),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copies a binary file.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyFilter;

impl Filter for CopyFilter {
    fn name(&self) -> &str {
        "copy"
    }

    fn input_kind(&self) -> FilterKind {
        FilterKind::Binary
    }

    fn output_kind(&self) -> FilterKind {
        FilterKind::Binary
    }

    fn run(
        &self,
        input: FilterInput<'_>,
        _params: &FilterParams,
        ctx: &mut FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let FilterInput::Binary(source) = input else {
            return Err(FilterError::failed("copy needs a binary file"));
        };
        let target = ctx.output_path().to_path_buf();
        std::fs::copy(source, &target).map_err(|source| FilterError::Io {
            path: target.clone(),
            source,
        })?;
        Ok(FilterOutput::Binary(target))
    }
}

/// Pipes text through an external command.
///
/// Params: `command` (required) and `args` (array of strings). The command's
/// output depends on things Kiln does not track, so reps using this filter
/// are recompiled on every run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellFilter;

impl Filter for ShellFilter {
    fn name(&self) -> &str {
        "shell"
    }

    fn always_outdated(&self) -> bool {
        true
    }

    fn run(
        &self,
        input: FilterInput<'_>,
        params: &FilterParams,
        _ctx: &mut FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let text = text_input(input)?;
        let command = params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| FilterError::failed("shell needs a 'command' param"))?;
        let args: Vec<&str> = params
            .get("args")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let io_error = |source: std::io::Error| FilterError::Io {
            path: command.into(),
            source,
        };
        let mut child = Command::new(command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_error)?;
        // The child may fill its stdout pipe before it drains stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            let owned = text.to_owned();
            thread::spawn(move || stdin.write_all(owned.as_bytes()))
        });
        let output = child.wait_with_output().map_err(io_error)?;
        let written = match writer {
            Some(writer) => writer
                .join()
                .map_err(|_| FilterError::failed(format!("'{command}' stdin writer panicked")))?,
            None => Ok(()),
        };
        if !output.status.success() {
            return Err(FilterError::failed(format!(
                "'{command}' exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written.map_err(io_error)?;
        String::from_utf8(output.stdout)
            .map(FilterOutput::Text)
            .map_err(|_| FilterError::failed(format!("'{command}' printed invalid UTF-8")))
    }
}

fn text_input<'a>(input: FilterInput<'a>) -> Result<&'a str, FilterError> {
    match input {
        FilterInput::Text(s) => Ok(s),
        FilterInput::Binary(path) => Err(FilterError::failed(format!(
            "expected text but got binary file {}",
            path.display()
        ))),
    }
}
