//! Fetches the ONNX models on first use.
//!
//! Downloads stream into `<name>.download` next to the target and are renamed
//! into place only once complete, so an interrupted download never leaves a
//! truncated model behind.

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

pub const MODEL_DIR: &str = "models";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub label: &'static str,
    pub file_name: &'static str,
    pub url: &'static str,
}

pub const PALM_DETECTOR: ModelSpec = ModelSpec {
    label: "palm detector",
    file_name: "palm_detection_mediapipe_2023feb.onnx",
    url: "https://github.com/opencv/opencv_zoo/raw/main/models/palm_detection_mediapipe/palm_detection_mediapipe_2023feb.onnx",
};

pub const HAND_LANDMARKS: ModelSpec = ModelSpec {
    label: "hand landmark",
    file_name: "handpose_estimation_mediapipe_2023feb.onnx",
    url: "https://github.com/opencv/opencv_zoo/raw/main/models/handpose_estimation_mediapipe/handpose_estimation_mediapipe_2023feb.onnx",
};

impl ModelSpec {
    pub fn default_path(&self) -> PathBuf {
        PathBuf::from(MODEL_DIR).join(self.file_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadEvent {
    AlreadyPresent,
    Started { total: Option<u64> },
    Progress { downloaded: u64, total: Option<u64> },
    Finished,
}

/// Makes sure `path` holds the model, downloading it with a terminal progress
/// bar if it does not exist yet.
pub fn ensure_model_ready<F>(spec: &ModelSpec, path: &Path, mut on_event: F) -> Result<()>
where
    F: FnMut(DownloadEvent),
{
    if path.exists() {
        log::debug!("{} model present at {}", spec.label, path.display());
        on_event(DownloadEvent::AlreadyPresent);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    let mut progress: Option<ProgressBar> = None;
    download_to_path(spec, path, &mut |event| {
        match &event {
            DownloadEvent::Started { total } => progress = Some(create_progress_bar(*total)),
            DownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            DownloadEvent::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message(format!("{} model ready", spec.label));
                }
            }
            DownloadEvent::AlreadyPresent => {}
        }
        on_event(event);
    })
    .with_context(|| format!("failed to download {} model to {}", spec.label, path.display()))
}

fn download_to_path<F>(spec: &ModelSpec, dest: &Path, on_event: &mut F) -> Result<()>
where
    F: FnMut(DownloadEvent),
{
    log::info!(
        "downloading {} model from {} to {}",
        spec.label,
        spec.url,
        dest.display()
    );

    let client = Client::new();
    let mut response = client
        .get(spec.url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total = response.content_length();
    on_event(DownloadEvent::Started { total });

    let tmp_path = partial_path(dest);
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .context("failed while writing model to disk")?;
        downloaded += read as u64;
        on_event(DownloadEvent::Progress { downloaded, total });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(DownloadEvent::Finished);
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    dest.with_extension("download")
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading model") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
