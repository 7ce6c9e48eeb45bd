//! Tesseract OCR engine (CLI wrapper).

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::OcrEngine;
use crate::error::{RedactError, Result};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Tesseract invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Path to the tesseract executable; `tesseract` on PATH when unset.
    pub binary_path: Option<String>,
    /// tessdata directory, exported as TESSDATA_PREFIX when set.
    pub tessdata_path: Option<String>,
    /// Language spec such as `eng` or `por+eng`.
    pub lang: Option<String>,
    /// Page segmentation mode (0-13).
    pub psm: Option<u8>,
    /// Engine mode (0-3).
    pub oem: Option<u8>,
}

impl TesseractConfig {
    pub fn lang_or_default(&self) -> &str {
        self.lang.as_deref().unwrap_or("eng")
    }

    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(6)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(1)
    }
}

/// OCR engine backed by the tesseract CLI.
pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
}

impl TesseractEngine {
    /// Probes the binary before accepting the configuration.
    pub fn new(config: TesseractConfig) -> Result<Self> {
        let binary = config.binary_path.as_deref().unwrap_or("tesseract");
        let version = probe_version(binary)?;
        log::info!("[Tesseract] using version {}", version);
        Ok(Self { config, version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn binary_path(&self) -> &str {
        self.config.binary_path.as_deref().unwrap_or("tesseract")
    }

    fn temp_input_path() -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "blackout_ocr_{}_{}.png",
            std::process::id(),
            seq
        ))
    }
}

impl OcrEngine for TesseractEngine {
    fn transcribe(&mut self, image: &DynamicImage) -> Result<String> {
        let start = Instant::now();
        let input = Self::temp_input_path();

        image
            .save(&input)
            .map_err(|e| RedactError::Ocr(format!("failed to write temp image: {}", e)))?;

        let mut cmd = Command::new(self.binary_path());
        cmd.arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(self.config.lang_or_default())
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string());

        if let Some(tessdata) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }

        let output = cmd.output();
        let _ = std::fs::remove_file(&input);

        let output =
            output.map_err(|e| RedactError::Ocr(format!("failed to run tesseract: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RedactError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).into_owned();
        log::debug!(
            "[Tesseract] transcribed {} chars in {} ms",
            transcript.len(),
            start.elapsed().as_millis()
        );

        Ok(transcript)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

fn probe_version(binary: &str) -> Result<String> {
    let output = Command::new(binary)
        .arg("--version")
        .output()
        .map_err(|e| RedactError::Ocr(format!("tesseract not available at `{}`: {}", binary, e)))?;

    // Version banner goes to stderr on some builds, stdout on others.
    let banner = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };

    parse_version(&banner)
        .ok_or_else(|| RedactError::Ocr(format!("unrecognized tesseract version output: {}", banner)))
}

fn parse_version(banner: &str) -> Option<String> {
    let first = banner.lines().next()?.trim();
    let rest = first.strip_prefix("tesseract")?.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.trim_start_matches('v').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = TesseractConfig::default();
        assert_eq!(config.lang_or_default(), "eng");
        assert_eq!(config.psm_or_default(), 6);
        assert_eq!(config.oem_or_default(), 1);
    }

    #[test]
    fn parses_version_banner() {
        assert_eq!(
            parse_version("tesseract 5.3.4\n libgif 5.2.1 ...").as_deref(),
            Some("5.3.4")
        );
        assert_eq!(parse_version("tesseract v4.1.1").as_deref(), Some("4.1.1"));
        assert_eq!(parse_version("command not found"), None);
        assert_eq!(parse_version(""), None);
    }
}
