//! `provision add-node`: register a custom-node repository.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Input};

use provision_registry::{AddOutcome, NodeRegistry};

use crate::config::Project;

/// Run `provision add-node [URL] [--category C]`.
pub fn run(project: &Project, url: Option<String>, category: &str) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => prompt()?,
    };

    let outcome = add(&project.nodes_registry(), &url, category)?;
    if outcome == AddOutcome::Added {
        println!("Tip: run `provision download-nodes` to clone it.");
    }
    Ok(())
}

/// Load the registry at `path`, add one repository, and save it back.
/// A plain text list only gains a line.
///
/// Re-adding a known repository is not an error and leaves the file alone.
pub fn add(path: &Path, url: &str, category: &str) -> Result<AddOutcome> {
    let mut registry = NodeRegistry::load(path)?;
    let (outcome, entry) = registry.add(url, category)?;

    match outcome {
        AddOutcome::AlreadyPresent => {
            println!("{} is already registered ({})", entry.url, entry.category);
        }
        _ => {
            registry
                .save_added(path, &entry)
                .with_context(|| format!("saving {}", path.display()))?;
            let repo = entry.dir_name().unwrap_or_else(|| entry.url.clone());
            tracing::info!(
                repo = %repo,
                category = %entry.category,
                registry = %path.display(),
                "node added"
            );
        }
    }
    Ok(outcome)
}

fn prompt() -> Result<String> {
    if !super::interactive() {
        bail!("no URL given and stdin is not a terminal");
    }
    println!("Paste the git URL of the custom node repository. The .git suffix is optional, e.g.");
    println!("  https://github.com/ltdrdata/ComfyUI-Manager");
    println!("  https://github.com/cubiq/ComfyUI_essentials.git");
    let url: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Repository URL")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("a URL is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(url.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_registry::NodeCategory;

    #[test]
    fn adds_to_yaml_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup/nodes.yaml");
        let outcome = add(&path, "https://github.com/cubiq/ComfyUI_essentials", "essentials").unwrap();
        assert_eq!(outcome, AddOutcome::Added);

        let registry = NodeRegistry::load(&path).unwrap();
        let entry = registry
            .find("https://github.com/cubiq/ComfyUI_essentials.git")
            .unwrap();
        assert_eq!(entry.category, NodeCategory::Essentials);
    }

    #[test]
    fn re_adding_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        add(&path, "https://github.com/o/repo/", "other").unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let outcome = add(&path, "https://github.com/o/repo.git", "video").unwrap();
        assert_eq!(outcome, AddOutcome::AlreadyPresent);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn legacy_list_keeps_hand_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        let curated = "# Core nodes\nhttps://github.com/a/b.git\n# disabled: https://github.com/c/d.git\n";
        std::fs::write(&path, curated).unwrap();

        let outcome = add(&path, "https://github.com/e/f", "other").unwrap();
        assert_eq!(outcome, AddOutcome::Added);
        let saved = std::fs::read_to_string(&path).unwrap();
        assert_eq!(saved, format!("{curated}https://github.com/e/f.git\n"));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.yaml");
        assert!(add(&path, "ComfyUI-Manager", "manager").is_err());
        assert!(!path.exists());
    }
}
