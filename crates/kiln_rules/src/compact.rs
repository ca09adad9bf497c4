//! Merging adjacent snapshot actions.

use kiln_model::ProcessingAction;

/// Merges every run of adjacent snapshot actions into one.
///
/// Names and paths are concatenated in order. Filter and layout actions
/// separate runs and are kept in place.
pub fn compact_snapshots(actions: Vec<ProcessingAction>) -> Vec<ProcessingAction> {
    let mut out: Vec<ProcessingAction> = Vec::with_capacity(actions.len());
    for action in actions {
        match (out.last_mut(), action) {
            (
                Some(ProcessingAction::Snapshot { names, paths }),
                ProcessingAction::Snapshot {
                    names: more_names,
                    paths: more_paths,
                },
            ) => {
                names.extend(more_names);
                paths.extend(more_paths);
            }
            (_, action) => out.push(action),
        }
    }
    out
}
