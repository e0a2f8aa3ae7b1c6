// ============================================================
// OPTICAL RECOGNITION
// ============================================================
// Shells out to the external `tesseract` binary (env-overridable via
// configuration), rasterizing PDFs with `pdftoppm` first. Low-contrast
// images are preprocessed before recognition.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::PipelineConfig;
use crate::shared::log::PipelineLog;

/// Recover text from a scanned document (PDF page images or a single
/// raster image). Returns an empty string when nothing is recognizable;
/// only infrastructure failures (no temp dir) surface as errors.
pub fn recover_text(bytes: &[u8], is_pdf: bool, config: &PipelineConfig, log: &PipelineLog) -> Result<String> {
    let workdir = tempfile::tempdir()
        .map_err(|e| AppError::IoError(format!("Cannot create OCR temp dir: {}", e)))?;

    if is_pdf {
        let pdf_path = workdir.path().join("input.pdf");
        fs::write(&pdf_path, bytes)?;
        let pages = rasterize_pdf(&pdf_path, workdir.path(), config, log);
        if pages.is_empty() {
            return Ok(String::new());
        }
        let mut text = String::new();
        for page in pages {
            let page_text = ocr_image(&page, config, log);
            if !page_text.trim().is_empty() {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(page_text.trim());
            }
        }
        Ok(text)
    } else {
        let image_path = workdir.path().join("input.png");
        let ocr_path = match preprocess_image(bytes, &image_path, config) {
            Ok(path) => path,
            Err(err) => {
                log.add("WARN", "ocr", &format!("Image preprocessing skipped: {}", err));
                fs::write(&image_path, bytes)?;
                image_path.clone()
            }
        };
        Ok(ocr_image(&ocr_path, config, log))
    }
}

fn rasterize_pdf(
    pdf_path: &Path,
    workdir: &Path,
    config: &PipelineConfig,
    log: &PipelineLog,
) -> Vec<PathBuf> {
    let prefix = workdir.join("page");
    let output = Command::new(&config.pdftoppm_command)
        .arg("-png")
        .arg("-r")
        .arg("200")
        .arg(pdf_path.as_os_str())
        .arg(prefix.as_os_str())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let mut pages: Vec<PathBuf> = fs::read_dir(workdir)
                .map(|dir| {
                    dir.filter_map(|entry| entry.ok())
                        .map(|entry| entry.path())
                        .filter(|path| {
                            path.extension().and_then(|e| e.to_str()) == Some("png")
                        })
                        .collect()
                })
                .unwrap_or_default();
            pages.sort();
            pages
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log.add("WARN", "ocr", &format!("pdftoppm failed: {}", stderr.trim()));
            Vec::new()
        }
        Err(err) => {
            log.add("ERROR", "ocr", &format!("pdftoppm failed to start: {}", err));
            Vec::new()
        }
    }
}

fn ocr_image(image_path: &Path, config: &PipelineConfig, log: &PipelineLog) -> String {
    let output = Command::new(&config.ocr_command)
        .arg(image_path.as_os_str())
        .arg("stdout")
        .arg("-l")
        .arg(&config.ocr_languages)
        .output();

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).to_string()
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log.add("WARN", "ocr", &format!("Tesseract failed: {}", stderr.trim()));
            String::new()
        }
        Err(err) => {
            log.add("ERROR", "ocr", &format!("Tesseract failed to start: {}", err));
            String::new()
        }
    }
}

/// Decode the image and, when contrast looks poor, write a
/// contrast-stretched grayscale copy for recognition.
fn preprocess_image(bytes: &[u8], target: &Path, config: &PipelineConfig) -> Result<PathBuf> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AppError::ParseError(format!("Unreadable image: {}", e)))?;

    if !config.ocr_preprocessing || !needs_preprocessing(&decoded) {
        decoded
            .save(target)
            .map_err(|e| AppError::IoError(format!("Cannot write OCR input: {}", e)))?;
        return Ok(target.to_path_buf());
    }

    let adjusted = decoded.grayscale().adjust_contrast(32.0);
    adjusted
        .save(target)
        .map_err(|e| AppError::IoError(format!("Cannot write OCR input: {}", e)))?;
    Ok(target.to_path_buf())
}

fn needs_preprocessing(decoded: &image::DynamicImage) -> bool {
    let gray = decoded.to_luma8();
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return false;
    }
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
    let variance = pixels
        .iter()
        .map(|&p| (p as f64 - mean).powi(2))
        .sum::<f64>()
        / pixels.len() as f64;
    variance.sqrt() < 40.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binaries_degrade_to_empty_text() {
        let config = PipelineConfig {
            ocr_command: "tesseract-binary-that-does-not-exist".to_string(),
            pdftoppm_command: "pdftoppm-binary-that-does-not-exist".to_string(),
            ..Default::default()
        };
        let log = PipelineLog::new();

        // A tiny valid 1x1 PNG.
        let mut png = Vec::new();
        let img = image::DynamicImage::new_rgb8(1, 1);
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let text = recover_text(&png, false, &config, &log).unwrap();
        assert_eq!(text, "");
        assert!(log.len() >= 1);
    }

    #[test]
    fn test_unreadable_image_still_attempts_ocr_on_raw_bytes() {
        let config = PipelineConfig {
            ocr_command: "tesseract-binary-that-does-not-exist".to_string(),
            ..Default::default()
        };
        let log = PipelineLog::new();
        let text = recover_text(b"not an image", false, &config, &log).unwrap();
        assert_eq!(text, "");
    }
}
