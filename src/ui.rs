// UI layer: an interactive menu built on `dialoguer`. Each entry runs one
// flow against the API (or the manifest generator) and prints the result.
// A failed flow is reported and the menu keeps going.

use crate::api::ApiClient;
use crate::batch::{BatchOptions, BatchRunner, DEFAULT_ANSWERS, DEFAULT_INPUT};
use crate::config::{persist_token, Config};
use crate::download::{download_file_name, now_nanos};
use crate::manifest::{write_manifest, DEFAULT_OUTPUT};
use crate::model::{ChatRequest, ChatResponse, UploadType};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MESSAGE: &str = "Are you gpt-3 or gpt-4?";
const DEFAULT_PROMPT: &str = "Tell me!";

/// Main interactive menu; returns when the user picks "Exit".
pub fn main_menu(mut api: ApiClient, config: Config) -> Result<()> {
    let items = vec![
        "Chat",
        "Upload file",
        "Upload file (chat endpoint)",
        "Upload file and chat",
        "Generate image manifest",
        "Run batch",
        "Download file",
        "Set access token",
        "Exit",
    ];
    loop {
        let selection = Select::new().items(&items).default(0).interact()?;
        let outcome = match selection {
            0 => with_token(&mut api).and_then(|_| handle_chat(&api, &config)),
            1 => with_token(&mut api).and_then(|_| handle_upload(&api)),
            2 => with_token(&mut api).and_then(|_| handle_chat_upload(&api)),
            3 => with_token(&mut api).and_then(|_| handle_upload_then_chat(&api, &config)),
            4 => handle_manifest(),
            5 => with_token(&mut api).and_then(|_| handle_batch(&api, &config)),
            6 => handle_download(&api),
            7 => ask_token(&mut api),
            _ => break,
        };
        if let Err(e) = outcome {
            println!("{} {:#}", "Failed:".red(), e);
        }
    }
    Ok(())
}

/// Spinner shown while a blocking request is in flight.
fn spinner(msg: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(msg);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn with_token(api: &mut ApiClient) -> Result<()> {
    if api.has_token() {
        return Ok(());
    }
    println!("No access token configured.");
    ask_token(api)
}

fn ask_token(api: &mut ApiClient) -> Result<()> {
    let token: String = Password::new().with_prompt("Access token").interact()?;
    let token = token.trim();
    api.set_token(token);
    if Confirm::new().with_prompt("Remember this token?").default(true).interact()? {
        persist_token(token)?;
    }
    Ok(())
}

fn input_path(prompt: &str) -> Result<PathBuf> {
    let path: String = Input::new().with_prompt(prompt).interact_text()?;
    Ok(PathBuf::from(path))
}

fn chat_request(config: &Config) -> Result<ChatRequest> {
    let message: String = Input::new()
        .with_prompt("Message")
        .default(DEFAULT_MESSAGE.into())
        .interact_text()?;
    Ok(ChatRequest::new(message, config.model.clone()).with_gizmo(config.gizmo_id.clone()))
}

fn handle_chat(api: &ApiClient, config: &Config) -> Result<()> {
    let req = chat_request(config)?;

    let spinner = spinner("Waiting for the model...")?;
    let result = api.chat_value(&req);
    spinner.finish_and_clear();

    let value = result?;
    println!("{} {}", "<ChatResponse>:".green(), serde_json::to_string_pretty(&value)?);

    // Links in `downloads` can be saved right away.
    if let Some(resp) = typed_response(value) {
        save_downloads(api, &resp)?;
    }
    Ok(())
}

fn typed_response(value: serde_json::Value) -> Option<ChatResponse> {
    match serde_json::from_value::<ChatResponse>(value) {
        Ok(resp) => Some(resp),
        Err(e) => {
            debug!(error = %e, "chat response not decodable, downloads skipped");
            None
        }
    }
}

fn handle_upload(api: &ApiClient) -> Result<()> {
    let path = input_path("File path")?;
    let kinds = [UploadType::MyFiles, UploadType::Multimodal];
    let labels: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
    let kind = kinds[Select::new().items(&labels).default(0).interact()?];

    let spinner = spinner("Uploading...")?;
    let result = api.upload(&path, "", kind);
    spinner.finish_and_clear();

    println!("{} {}", "<Upload>:".green(), serde_json::to_string_pretty(&result?)?);
    Ok(())
}

fn handle_chat_upload(api: &ApiClient) -> Result<()> {
    let path = input_path("File path")?;

    let spinner = spinner("Uploading...")?;
    let result = api.upload_to_chat(&path);
    spinner.finish_and_clear();

    println!("{}", result?);
    Ok(())
}

fn handle_upload_then_chat(api: &ApiClient, config: &Config) -> Result<()> {
    let path = input_path("File path")?;
    let req = chat_request(config)?;

    let spinner = spinner("Uploading and waiting for the model...")?;
    let result = api.upload_then_chat(&path, req);
    spinner.finish_and_clear();

    let resp = result?;
    println!("{} {}", "<ChatResponse>:".green(), serde_json::to_string_pretty(&resp)?);
    save_downloads(api, &resp)
}

fn handle_manifest() -> Result<()> {
    let root = input_path("Image directory")?;
    let prompt: String = Input::new()
        .with_prompt("Prompt")
        .default(DEFAULT_PROMPT.into())
        .interact_text()?;
    let out: String = Input::new()
        .with_prompt("Output file")
        .default(DEFAULT_OUTPUT.into())
        .interact_text()?;

    let count = write_manifest(&root, &prompt, Path::new(&out))?;
    println!("{} {} record(s) in {}", "<Manifest>:".green(), count, out);
    Ok(())
}

fn handle_batch(api: &ApiClient, config: &Config) -> Result<()> {
    let input: String = Input::new()
        .with_prompt("Input file")
        .default(DEFAULT_INPUT.into())
        .interact_text()?;
    let output: String = Input::new()
        .with_prompt("Output file")
        .default(DEFAULT_ANSWERS.into())
        .interact_text()?;
    let asset_dir: String = Input::new()
        .with_prompt("Directory image and file paths are relative to")
        .default(".".into())
        .interact_text()?;
    let fix = Confirm::new()
        .with_prompt("Only rerun records that failed?")
        .default(false)
        .interact()?;
    let enable_download = Confirm::new()
        .with_prompt("Save files linked from answers?")
        .default(true)
        .interact()?;

    let options = BatchOptions {
        input: PathBuf::from(input),
        output: PathBuf::from(&output),
        model: config.model.clone(),
        gizmo_id: config.gizmo_id.clone(),
        fix,
        enable_download,
        asset_dir: Some(PathBuf::from(asset_dir)),
        ..Default::default()
    };

    let progress = ProgressBar::new(0);
    progress.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    let stats = BatchRunner::new(api, options).with_progress(progress).run()?;
    println!(
        "{} {} done, {} ok, {} failed, written to {}",
        "<Batch>:".green(),
        stats.complete,
        stats.success,
        stats.failed,
        output
    );
    Ok(())
}

fn handle_download(api: &ApiClient) -> Result<()> {
    let url: String = Input::new().with_prompt("Download URL").interact_text()?;
    let dir = input_path("Save into directory")?;
    let name = match download_file_name(&url, "download", "manual", "0", now_nanos()) {
        Some(name) => name,
        None => Input::new().with_prompt("File name").interact_text()?,
    };

    let spinner = spinner("Downloading...")?;
    let result = api.download(&url, &dir, &name);
    spinner.finish_and_clear();

    println!("Saved {}", result?.display());
    Ok(())
}

fn save_downloads(api: &ApiClient, resp: &ChatResponse) -> Result<()> {
    if resp.downloads.is_empty() {
        return Ok(());
    }
    let prompt = format!("Save {} linked file(s) to the current directory?", resp.downloads.len());
    if !Confirm::new().with_prompt(prompt).default(false).interact()? {
        return Ok(());
    }

    for link in &resp.downloads {
        let Some(name) = download_file_name(link, "chat", &resp.message_id, &resp.conversation_id, now_nanos()) else {
            println!("Skipping {}: no file name in link", link);
            continue;
        };
        match api.download(link, Path::new("."), &name) {
            Ok(path) => println!("Saved {}", path.display()),
            Err(e) => println!("Download failed: {}", e),
        }
    }
    Ok(())
}
