// Batch runner: reads a JSON-lines file of records, asks every question of a
// record in order within one conversation, and writes the records back with
// their answers or the error that stopped them. Records run one after the
// other; a failed record does not stop the batch.

use crate::api::{ApiClient, ApiError};
use crate::download::{download_file_name, now_nanos};
use crate::manifest::DEFAULT_OUTPUT;
use crate::model::{Ask, BatchRecord, ChatRequest, ChatResponse, IErr, SpecDownload, UploadType};
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Batches read the manifest by default.
pub const DEFAULT_INPUT: &str = DEFAULT_OUTPUT;
pub const DEFAULT_ANSWERS: &str = "answers.jsonl";
pub const DEFAULT_DOWNLOAD_PREFIX: &str = "GPT4API";

/// `iErr.code` of a record whose run failed.
pub const FAILED_CODE: u16 = 501;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub model: String,
    pub gizmo_id: String,
    pub history_and_training_disabled: bool,
    /// Only rerun records that carry an `iErr`.
    pub fix: bool,
    pub enable_download: bool,
    /// Where linked files are saved; the directory of `input` when unset.
    pub download_dir: Option<PathBuf>,
    pub download_prefix: String,
    /// Base for relative `images` and `files`; the working directory when unset.
    pub asset_dir: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_ANSWERS),
            model: "gpt-4-gizmo".into(),
            gizmo_id: String::new(),
            history_and_training_disabled: true,
            fix: false,
            enable_download: false,
            download_dir: None,
            download_prefix: DEFAULT_DOWNLOAD_PREFIX.into(),
            asset_dir: None,
        }
    }
}

impl BatchOptions {
    fn download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.download_dir {
            return dir.clone();
        }
        match self.input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.asset_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub total: u64,
    pub complete: u64,
    pub success: u64,
    pub failed: u64,
}

/// Read one record per line. Blank lines are ignored; a line that is not a
/// record fails the whole read.
pub fn read_records(path: &Path) -> Result<Vec<BatchRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: BatchRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), idx + 1))?;
        records.push(rec);
    }
    Ok(records)
}

/// Write records one per line, replacing `path`, and sync to disk.
pub fn write_records(path: &Path, records: &[BatchRecord]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for rec in records {
        serde_json::to_writer(&mut writer, rec).context("Failed to encode record")?;
        writer.write_all(b"\n").context("Failed to write records")?;
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all().context("Failed to sync records")?;
    Ok(())
}

pub struct BatchRunner<'a> {
    api: &'a ApiClient,
    options: BatchOptions,
    progress: ProgressBar,
}

impl<'a> BatchRunner<'a> {
    pub fn new(api: &'a ApiClient, options: BatchOptions) -> Self {
        BatchRunner {
            api,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Read `input`, run every record and write the result to `output`.
    pub fn run(&self) -> Result<BatchStats> {
        let mut records = read_records(&self.options.input)?;
        info!(input = %self.options.input.display(), records = records.len(), fix = self.options.fix, "batch loaded");

        let stats = self.run_records(&mut records);
        write_records(&self.options.output, &records)?;
        Ok(stats)
    }

    /// Run records in place. In fix mode records without an `iErr` are
    /// left alone and counted as successes.
    pub fn run_records(&self, records: &mut [BatchRecord]) -> BatchStats {
        let mut stats = BatchStats {
            total: records.len() as u64,
            ..Default::default()
        };
        self.progress.set_length(stats.total);

        for rec in records.iter_mut() {
            if self.options.fix && rec.ierr.is_none() {
                stats.success += 1;
            } else {
                match self.chat_record(rec) {
                    Ok(answers) => {
                        rec.answers = answers;
                        rec.ierr = None;
                        stats.success += 1;
                    }
                    Err(e) => {
                        error!(id = %rec.id, error = %format!("{:#}", e), "record failed");
                        rec.ierr = Some(IErr {
                            code: FAILED_CODE,
                            message: format!("{:#}", e),
                        });
                        stats.failed += 1;
                    }
                }
            }
            stats.complete += 1;
            self.progress.inc(1);
        }

        self.progress.finish();
        info!(total = stats.total, success = stats.success, failed = stats.failed, "batch done");
        stats
    }

    /// Ask every question of `rec`, threading the conversation from one
    /// answer into the next question.
    fn chat_record(&self, rec: &BatchRecord) -> Result<Vec<ChatResponse>> {
        if rec.asks.is_empty() {
            bail!("chat answer is required");
        }

        let mut conversation_id = String::new();
        let mut parent_message_id = String::new();
        let mut answers = Vec::with_capacity(rec.asks.len());

        for ask in &rec.asks {
            info!(id = %rec.id, pid = %ask.id, "asking");
            let mut req = ChatRequest::new(ask.content.clone(), self.options.model.clone())
                .with_gizmo(self.options.gizmo_id.clone());
            req.parent_message_id = parent_message_id.clone();
            req.conversation_id = conversation_id.clone();
            req.history_and_training_disabled = self.options.history_and_training_disabled;

            for image in &ask.images {
                let uploaded = self
                    .api
                    .upload(&self.options.resolve(image), &conversation_id, UploadType::Multimodal)
                    .with_context(|| format!("{}: upload {}", ask.id, image))?;
                req.parts.push(uploaded.part.ok_or(ApiError::MissingField("part"))?);
            }
            for file in &ask.files {
                let uploaded = self
                    .api
                    .upload(&self.options.resolve(file), &conversation_id, UploadType::MyFiles)
                    .with_context(|| format!("{}: upload {}", ask.id, file))?;
                req.attachments
                    .push(uploaded.attachment.ok_or(ApiError::MissingField("attachment"))?);
            }

            let mut resp = self.api.chat(&req).with_context(|| format!("{}: chat", ask.id))?;
            if self.options.enable_download {
                self.save_downloads(rec, ask, &mut resp);
            }

            parent_message_id = resp.message_id.clone();
            conversation_id = resp.conversation_id.clone();
            answers.push(resp);
        }
        Ok(answers)
    }

    /// Name and fetch the files linked from `resp`. A failed download is
    /// logged; its name is still recorded.
    fn save_downloads(&self, rec: &BatchRecord, ask: &Ask, resp: &mut ChatResponse) {
        let dir = self.options.download_dir();
        for link in &resp.downloads {
            let Some(local) = download_file_name(link, &self.options.download_prefix, &rec.id, &ask.id, now_nanos()) else {
                continue;
            };
            if let Err(e) = self.api.download(link, &dir, &local) {
                warn!(%link, error = %e, "download failed");
            }
            resp.spec_downloads.push(SpecDownload {
                origin: link.clone(),
                local,
            });
        }
    }
}
