pub mod collections;
pub mod ingest;
pub mod search;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use agriqa::config::{default_agriqa_dir, QaConfig};

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Where the model files go: `embedding.model_path`, or `~/.agriqa/models/`
/// when it is unset.
fn model_dir(config: &QaConfig) -> PathBuf {
    if config.embedding.model_path.trim().is_empty() {
        default_agriqa_dir().join("models")
    } else {
        config.resolved_model_path()
    }
}

/// Download the ONNX encoder and its tokenizer.
pub async fn model_download(config: &QaConfig) -> Result<()> {
    let dir = model_dir(config);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create model dir: {}", dir.display()))?;

    for (url, name) in [(MODEL_URL, "model.onnx"), (TOKENIZER_URL, "tokenizer.json")] {
        let dest = dir.join(name);
        if dest.exists() {
            println!("{name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {name}...");
        download_file(url, &dest).await?;
        println!("Saved to {}", dest.display());
    }

    if config.embedding.model_path.trim().is_empty() {
        println!(
            "Set embedding.model_path (or AGRIQA_MODEL_PATH) to {}",
            dir.display()
        );
    }
    println!("Model download complete.");
    Ok(())
}

/// Stream `url` into `dest`, writing to a temp file first and renaming on success.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::with_template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
