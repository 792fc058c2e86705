//! `provision add-model`: register a model file for download.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use provision_registry::{AddOutcome, AssetEntry, ModelFolder, ModelRegistry};

use crate::config::Project;

/// Positional arguments as given on the command line.
pub struct AddModelArgs {
    pub url: Option<String>,
    pub folder: Option<String>,
    pub name: Option<String>,
    /// Confirm duplicates without asking.
    pub yes: bool,
}

/// Run `provision add-model [URL FOLDER [NAME]] [--yes]`.
///
/// With no positionals the values are prompted for. A URL without a folder
/// is a usage error.
pub fn run(project: &Project, args: AddModelArgs) -> Result<()> {
    let (url, folder, name) = match (args.url, args.folder) {
        (Some(url), Some(folder)) => (url, folder, args.name),
        (None, None) => prompt()?,
        _ => bail!("usage: provision add-model <URL> <FOLDER> [NAME], or no arguments to be prompted"),
    };

    let yes = args.yes;
    let registry_path = project.models_registry();
    let outcome = add(&registry_path, &url, &folder, name.as_deref(), |existing| {
        yes || confirm_duplicate(existing)
    })?;

    if outcome == AddOutcome::Added {
        println!("Tip: run `provision download-models` to download it.");
    }
    Ok(())
}

/// Load the registry at `path`, add one model, and save it back.
pub fn add(
    path: &Path,
    url: &str,
    folder: &str,
    name: Option<&str>,
    confirm: impl FnOnce(&AssetEntry) -> bool,
) -> Result<AddOutcome> {
    let mut registry = ModelRegistry::load(path)?;
    let (outcome, entry) = registry.add(url, folder, name, confirm).map_err(|e| match e {
        provision_registry::RegistryError::FilenameUnderivable { .. } => {
            anyhow::Error::new(e).context("pass a file name as the third argument")
        }
        other => other.into(),
    })?;

    match outcome {
        AddOutcome::Added => {
            registry
                .save(path)
                .with_context(|| format!("saving {}", path.display()))?;
            tracing::info!(
                folder = %entry.folder,
                name = %entry.display_name(),
                registry = %path.display(),
                "model added"
            );
        }
        AddOutcome::Declined | AddOutcome::AlreadyPresent => {
            tracing::info!(name = %entry.display_name(), "cancelled, registry unchanged");
        }
    }
    Ok(outcome)
}

fn confirm_duplicate(existing: &AssetEntry) -> bool {
    if !super::interactive() {
        tracing::warn!("not a terminal; refusing to add a duplicate without --yes");
        return false;
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "{}/{} is already registered. Add anyway?",
            existing.folder,
            existing.display_name()
        ))
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn prompt() -> Result<(String, String, Option<String>)> {
    if !super::interactive() {
        bail!("no arguments given and stdin is not a terminal");
    }
    let theme = ColorfulTheme::default();

    println!("Paste the direct download URL for the model file, for example");
    println!("  https://huggingface.co/stabilityai/sdxl-turbo/resolve/main/sd_xl_turbo_1.0.safetensors");
    let url: String = Input::with_theme(&theme)
        .with_prompt("Model URL")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("a URL is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let folders: Vec<&str> = ModelFolder::ALL.iter().map(|f| f.as_str()).collect();
    let selection = Select::with_theme(&theme)
        .with_prompt("Target folder")
        .items(&folders)
        .default(0)
        .interact()?;

    let name: String = Input::with_theme(&theme)
        .with_prompt("New file name (empty keeps the name from the URL)")
        .allow_empty(true)
        .interact_text()?;

    let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
    Ok((url.trim().to_string(), folders[selection].to_string(), name))
}
