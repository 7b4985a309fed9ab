//! Interactive editing support
//!
//! Resolves the user's preferred editor and round-trips entry text through
//! the store's scratch file. The preference is persisted by `--editor` and
//! falls back to `$EDITOR` / `$VISUAL`, then to whatever common editor is
//! on the PATH.

use std::env;
use std::fs;
use std::process::Command;

use anyhow::{bail, Context, Result};
use quill_core::Paths;

/// Editors the `--editor` option accepts
const SUPPORTED: &[&str] = &["vim", "nano", "emacs", "micro"];

/// Persist the preferred editor name
pub fn set_editor(paths: &Paths, name: &str) -> Result<()> {
    let name = name.trim().to_lowercase();
    if !SUPPORTED.contains(&name.as_str()) {
        bail!(
            "'{}' is not supported. Supported editors: {}",
            name,
            SUPPORTED.join(", ")
        );
    }
    fs::write(paths.editor_file(), &name)
        .with_context(|| format!("Failed to write {:?}", paths.editor_file()))?;
    Ok(())
}

/// Resolve the editor to launch
///
/// Order: persisted preference, `$EDITOR`, `$VISUAL`, first common editor
/// found on the PATH.
fn find_editor(paths: &Paths) -> Result<String> {
    if let Ok(saved) = fs::read_to_string(paths.editor_file()) {
        let saved = saved.trim().to_string();
        if !saved.is_empty() {
            return Ok(saved);
        }
    }

    for var in ["EDITOR", "VISUAL"] {
        if let Ok(editor) = env::var(var) {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
    }

    for editor in SUPPORTED {
        if command_exists(editor) {
            return Ok((*editor).to_string());
        }
    }

    bail!(
        "No editor found. Set one with --editor or the $EDITOR environment variable.\n\
         Example: quill --editor vim"
    )
}

fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Open `initial_content` in the editor via the scratch file
///
/// Returns the edited text, or `None` when nothing changed. The scratch
/// file lives in the store's temp directory and is shredded at exit.
pub fn edit_text(paths: &Paths, initial_content: &str) -> Result<Option<String>> {
    let editor = find_editor(paths)?;
    let scratch = paths.scratch_file();

    fs::write(&scratch, initial_content)
        .with_context(|| format!("Failed to write scratch file {scratch:?}"))?;

    let status = Command::new(&editor)
        .arg(&scratch)
        .status()
        .with_context(|| format!("Failed to launch editor '{editor}'"))?;
    if !status.success() {
        bail!("Editor '{}' exited with non-zero status.", editor);
    }

    let edited = fs::read_to_string(&scratch)
        .with_context(|| format!("Failed to read scratch file {scratch:?}"))?;

    if edited == initial_content {
        Ok(None)
    } else {
        Ok(Some(edited))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_editor_validates_name() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::under(tmp.path());
        paths.ensure().unwrap();

        assert!(set_editor(&paths, "notepad").is_err());
        set_editor(&paths, "VIM").unwrap();
        assert_eq!(fs::read_to_string(paths.editor_file()).unwrap(), "vim");
    }

    #[test]
    fn saved_preference_wins() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::under(tmp.path());
        paths.ensure().unwrap();

        set_editor(&paths, "nano").unwrap();
        assert_eq!(find_editor(&paths).unwrap(), "nano");
    }

    #[test]
    fn command_exists_sanity() {
        #[cfg(unix)]
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }
}
