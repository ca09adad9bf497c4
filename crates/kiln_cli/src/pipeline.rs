//! Shared steps of every command: locating the site and loading it.

use std::path::{Path, PathBuf};

use kiln_compiler::{Compiler, TracingListener};
use kiln_config::CONFIG_FILE_NAME;
use kiln_model::{Configuration, DataSource, FilesystemDataSource, Site};
use tracing::debug;

use crate::GlobalArgs;

/// Walks up from `start` to the first directory containing `kiln.toml`.
pub fn find_site_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the site root from global CLI args.
///
/// `--site` may name the directory or its `kiln.toml`. Without it, the
/// current directory and its parents are searched.
pub fn resolve_site_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &global.site {
        Some(site) => {
            let p = PathBuf::from(site);
            if p.is_file() {
                Ok(p.parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")))
            } else {
                Ok(p)
            }
        }
        None => find_site_root(&std::env::current_dir()?),
    }
}

/// Loads the configuration, rules and objects of the site at `root`.
pub fn load_compiler(root: &Path) -> Result<Compiler, Box<dyn std::error::Error>> {
    let config = kiln_config::load_config(root)?;
    let rules = kiln_rules::load_rules(&config.rules_path(root), config.string_pattern_type)?;
    let data = FilesystemDataSource::new(root, config.clone()).load()?;
    debug!(
        items = data.items.len(),
        layouts = data.layouts.len(),
        code_snippets = data.code_snippets.len(),
        rules = rules.len(),
        "loaded site"
    );
    let site = Site::new(
        Configuration::new(config),
        data.items,
        data.layouts,
        data.code_snippets,
    )?;
    let mut compiler = Compiler::new(root, site, rules);
    compiler.subscribe(Box::new(TracingListener));
    Ok(compiler)
}
