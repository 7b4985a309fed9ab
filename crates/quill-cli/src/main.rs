//! Quill CLI
//!
//! Thin frontend over `quill-core`: opens a document or entry in the
//! user's editor, plus housekeeping options (dump, import, standalone file
//! crypto, config, cleanup). All store semantics live in the core crate.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quill_core::{Paths, Repository, Resolved};

mod editor;

#[derive(Parser)]
#[command(name = "quill")]
#[command(version)]
#[command(about = "quill - synchronized editing of encrypted notes\n\n\
EXAMPLE USAGE:\n   \
quill journal    # create or edit the document 'journal'\n   \
quill Entry123   # edit the entry 'Entry123'")]
struct Cli {
    /// Document or entry to open
    name: Option<String>,

    /// Turn on debug logging
    #[arg(long)]
    debug: bool,

    /// Delete all quill files
    #[arg(long)]
    clean: bool,

    /// Re-run configuration
    #[arg(long)]
    config: bool,

    /// Export all documents to an encrypted snapshot
    #[arg(long)]
    dump: bool,

    /// Select the editor (vim|nano|emacs|micro)
    #[arg(long, value_name = "EDITOR")]
    editor: Option<String>,

    /// Decrypt a standalone file in place
    #[arg(long, value_name = "FILE")]
    decrypt: Option<PathBuf>,

    /// Encrypt a standalone file in place
    #[arg(long, value_name = "FILE")]
    encrypt: Option<PathBuf>,

    /// Import a plaintext snapshot
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Show a summary of all documents
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("quill_core=debug,quill_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let paths = Paths::new()?;
    paths.ensure()?;

    // shred temp files on interrupt, then exit nonzero
    let cleanup_paths = paths.clone();
    ctrlc::set_handler(move || {
        cleanup_paths.clean_up();
        std::process::exit(1);
    })
    .context("Failed to install signal handler")?;

    let result = run(&cli, &paths);
    paths.clean_up();
    result
}

fn run(cli: &Cli, paths: &Paths) -> Result<()> {
    if let Some(ref file) = cli.decrypt {
        return decrypt_file(file);
    }
    if let Some(ref file) = cli.encrypt {
        return encrypt_file(file);
    }

    if let Some(ref name) = cli.editor {
        editor::set_editor(paths, name)?;
        println!("Editor set to {}", name.trim().to_lowercase());
        return Ok(());
    }

    if cli.clean {
        paths.erase_all();
        println!("All quill files cleared");
        return Ok(());
    }

    // first use (or --config): ask who this is and where to sync
    let mut username = None;
    let mut method = None;
    if cli.config || !paths.config_file().exists() {
        let (u, m) = prompt_configuration()?;
        username = Some(u);
        method = Some(m);
    }

    let mut repo = Repository::init(paths.clone(), username.as_deref(), method.as_deref())?;
    if cli.config {
        if let Some(m) = method.filter(|m| !m.is_empty()) {
            if m != repo.method() {
                repo.set_method(&m)?;
            }
        }
    }

    let password = acquire_password(&repo)?;
    repo.open(&password).context("Could not open repository")?;

    if cli.config {
        offer_pin(&repo)?;
    }

    if let Some(ref file) = cli.import {
        repo.import(file)
            .with_context(|| format!("Failed to import {file:?}"))?;
        println!("Imported {}", file.display());
        return finish(&mut repo);
    }

    if cli.dump {
        let filename = repo.dump_all()?;
        println!("Dumped to {filename}");
        return finish(&mut repo);
    }

    if cli.summary {
        print_summary(&mut repo)?;
        return finish(&mut repo);
    }

    match cli.name {
        Some(ref name) => edit(&mut repo, paths, name)?,
        None => {
            for document in repo.list_documents()? {
                println!("{document}");
            }
        }
    }

    finish(&mut repo)
}

/// Open a document or entry in the editor and store the result
fn edit(repo: &mut Repository, paths: &Paths, name: &str) -> Result<()> {
    match repo.get_document_or_entry(name) {
        Ok(Resolved::Entry { document, entry }) => {
            if let Some(text) = editor::edit_text(paths, &entry.text)? {
                // keep the created timestamp; the store bumps modified
                repo.update(&text, &document, &entry.entry, &entry.timestamp)?;
                println!("Updated entry {} in {}", entry.entry, document);
            } else {
                println!("No changes.");
            }
        }
        Ok(Resolved::Document { name, entries }) => {
            for entry in &entries {
                println!("{} | {}", entry.timestamp, entry.entry);
            }
            if let Some(text) = editor::edit_text(paths, "")? {
                repo.update(&text, &name, "", "")?;
                println!("Added entry to {name}");
            } else {
                println!("No changes.");
            }
        }
        Err(quill_core::Error::NotFound(_)) => {
            // a fresh name starts a new document
            if let Some(text) = editor::edit_text(paths, "")? {
                repo.update(&text, name, "", "")?;
                println!("Created document {name}");
            } else {
                println!("No changes.");
            }
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Documents with entry counts and their latest modification
fn print_summary(repo: &mut Repository) -> Result<()> {
    let documents = repo.list_documents()?;
    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for document in documents {
        let entries = repo.get_document(&document)?;
        let last = entries
            .iter()
            .map(|e| e.modified_timestamp.as_str())
            .max()
            .unwrap_or("-");
        println!("{} ({} entries, last {})", document, entries.len(), last);
    }
    Ok(())
}

/// Close the repository and report the sync outcome
fn finish(repo: &mut Repository) -> Result<()> {
    match repo.close() {
        Ok(()) => {
            println!("Changes uploaded.");
            Ok(())
        }
        Err(err) if err.is_close_report() => {
            println!("{err}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Get the session password, via the PIN shortcut when one exists
fn acquire_password(repo: &Repository) -> Result<String> {
    if repo.has_pin_file() {
        let pin = rpassword::prompt_password("PIN: ").context("Failed to read PIN")?;
        match repo.get_password_from_pin(&pin) {
            Ok(password) => return Ok(password),
            Err(err) => println!("PIN rejected ({err}); the shortcut has been removed."),
        }
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

/// Optionally store the password under a short PIN
fn offer_pin(repo: &Repository) -> Result<()> {
    if repo.has_pin_file() {
        return Ok(());
    }
    let answer = prompt_line("Set a PIN for faster unlocking? [y/N] ")?;
    if answer.eq_ignore_ascii_case("y") {
        let pin = rpassword::prompt_password("PIN: ").context("Failed to read PIN")?;
        repo.set_pin_from_password(&pin)?;
        println!("PIN set. A wrong PIN removes the shortcut.");
    }
    Ok(())
}

fn prompt_configuration() -> Result<(String, String)> {
    let username = prompt_line("Username: ")?;
    if username.is_empty() {
        bail!("A username is required.");
    }
    let method = prompt_line("Sync server (http://..., empty for none): ")?;
    Ok((username, method))
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Standalone file encryption, independent of any repository
fn encrypt_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    let password = rpassword::prompt_password("Password: ")?;
    let plaintext = fs::read(path)?;
    quill_core::crypto::encrypt_to_file(&plaintext, &password, path)?;
    println!("Encrypted as {}", path.display());
    Ok(())
}

/// Standalone file decryption, independent of any repository
fn decrypt_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    let password = rpassword::prompt_password("Password: ")?;
    match quill_core::crypto::decrypt_from_file(&password, path) {
        Ok(plaintext) => {
            fs::write(path, plaintext)?;
            println!("{} decrypted", path.display());
            Ok(())
        }
        Err(_) => bail!("Incorrect password"),
    }
}
