//! `kiln show-outdated` and `kiln show-rules`: inspect a site without compiling it.

use kiln_compiler::OutdatednessReason;
use kiln_model::{ActionSequence, Reference};
use serde_json::json;

use crate::pipeline::{load_compiler, resolve_site_root};
use crate::{GlobalArgs, ReportFormat, ShowArgs};

/// Runs the `kiln show-outdated` command.
pub fn outdated(args: &ShowArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let root = resolve_site_root(global)?;
    let compiler = load_compiler(&root)?;
    let outdated = compiler.outdatedness()?;
    match args.format {
        ReportFormat::Text => print!("{}", outdated_text(&outdated)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&outdated_json(&outdated))?),
    }
    Ok(0)
}

/// Runs the `kiln show-rules` command.
pub fn rules(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let root = resolve_site_root(global)?;
    let compiler = load_compiler(&root)?;
    print!("{}", rules_text(&compiler.action_sequences()?));
    Ok(0)
}

fn outdated_text(outdated: &[(Reference, Vec<OutdatednessReason>)]) -> String {
    if outdated.is_empty() {
        return "Nothing is outdated.\n".to_string();
    }
    let mut out = String::new();
    for (reference, reasons) in outdated {
        out.push_str(&format!("{reference}\n"));
        for reason in reasons {
            out.push_str(&format!("  {reason}: {}\n", reason.message()));
        }
    }
    out
}

fn outdated_json(outdated: &[(Reference, Vec<OutdatednessReason>)]) -> serde_json::Value {
    outdated
        .iter()
        .map(|(reference, reasons)| {
            let reasons: Vec<serde_json::Value> = reasons
                .iter()
                .map(|r| match r {
                    OutdatednessReason::AttributesModified { keys } => {
                        json!({ "reason": r.name(), "keys": keys })
                    }
                    _ => json!({ "reason": r.name() }),
                })
                .collect();
            json!({ "object": reference.to_string(), "reasons": reasons })
        })
        .collect()
}

fn rules_text(sequences: &[(Reference, ActionSequence)]) -> String {
    let mut out = String::new();
    for (reference, sequence) in sequences {
        out.push_str(&format!("{reference}\n"));
        for action in sequence.actions() {
            out.push_str(&format!("  {action}\n"));
        }
        out.push('\n');
    }
    out
}
