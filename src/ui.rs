// UI layer: a small interactive menu over `ApiBase` using `dialoguer`,
// handy for poking a dev server by hand with the same client the tests use.

use crate::api::ApiBase;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Main interactive menu. Runs until the user chooses "Exit".
pub fn main_menu(mut api: ApiBase) -> Result<()> {
    loop {
        let items = vec!["Login", "Register", "Download file", "Upload file", "Exit"];
        let selection = Select::new()
            .with_prompt(format!("{} '{}'", api.login_type(), api.login_name()))
            .items(&items)
            .default(0)
            .interact()?;
        match selection {
            0 => match api.authenticate().map(|_| ()) {
                Ok(_) => println!("Logged in as {}", api.login_name()),
                Err(e) => println!("Login failed: {}", e),
            },
            1 => handle_register(&mut api)?,
            2 | 3 if !api.is_authenticated() => {
                println!("You should login first.");
            }
            2 => handle_download(&api)?,
            3 => handle_upload(&api)?,
            4 => break,
            _ => {}
        }
    }
    Ok(())
}

/// Ask for the login name when the environment did not supply one.
pub fn prompt_login_name(login_type: &str) -> Result<String> {
    let name: String = Input::new()
        .with_prompt(format!("{} name", login_type))
        .interact_text()?;
    Ok(name)
}

fn handle_register(api: &mut ApiBase) -> Result<()> {
    let group: String = Input::new()
        .with_prompt("Group (blank for none)")
        .allow_empty(true)
        .interact_text()?;
    match api.register(Some(&group)).map(|_| ()) {
        Ok(_) => println!("Registered and logged in as {}", api.login_name()),
        Err(e) => println!("Register failed: {}", e),
    }
    Ok(())
}

/// Stream a file to disk, one chunk at a time, with a progress bar.
fn handle_download(api: &ApiBase) -> Result<()> {
    let file_id: String = Input::new().with_prompt("File id").interact_text()?;
    let default_dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
    let target: String = Input::new()
        .with_prompt("Save to")
        .default(default_dir.join(&file_id).display().to_string())
        .interact_text()?;

    let chunks = match api.download_file(&file_id) {
        Ok(chunks) => chunks,
        Err(e) => {
            println!("Download failed: {}", e);
            return Ok(());
        }
    };

    let bar = match chunks.content_length() {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };
    bar.set_style(
        ProgressStyle::with_template("{spinner} {bytes}/{total_bytes} {msg}")
            .context("Invalid progress template")?,
    );

    let mut out = BufWriter::new(File::create(&target).with_context(|| format!("Failed to create {}", target))?);
    for chunk in chunks {
        match chunk {
            Ok(chunk) => {
                out.write_all(&chunk)?;
                bar.inc(chunk.len() as u64);
            }
            Err(e) => {
                bar.abandon_with_message("failed");
                println!("Download failed: {}", e);
                return Ok(());
            }
        }
    }
    out.flush()?;
    bar.finish_with_message(format!("saved to {}", target));
    Ok(())
}

fn handle_upload(api: &ApiBase) -> Result<()> {
    let path: String = Input::new().with_prompt("File path").interact_text()?;
    let url: String = Input::new()
        .with_prompt("Upload URL")
        .default("/api/v1/files".into())
        .interact_text()?;
    let props: String = Input::new()
        .with_prompt("Properties (JSON)")
        .default("{}".into())
        .interact_text()?;
    let props: Value = match serde_json::from_str(&props) {
        Ok(props) => props,
        Err(e) => {
            println!("Properties are not valid JSON: {}", e);
            return Ok(());
        }
    };
    if !Confirm::new()
        .with_prompt(format!("Upload {} to {}?", path, url))
        .default(true)
        .interact()?
    {
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Uploading...");
    match api.upload(&url, PathBuf::from(&path), &props) {
        Ok(id) => spinner.finish_with_message(format!("Uploaded, recording id {}", id)),
        Err(e) => spinner.abandon_with_message(format!("Upload failed: {}", e)),
    }
    Ok(())
}
