//! Conversion adapter: office documents to PDF via a LibreOffice subprocess,
//! and PDF pages to images via pdfium.
//!
//! Both paths degrade to an error value rather than a crash when the external
//! tool or library is unavailable; callers turn that into a user-displayable
//! failure notice.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use pdfium_render::prelude::*;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum ConvertError {
    /// The external conversion tool is not installed.
    ToolMissing,
    /// The conversion process ran but failed.
    Failed(String),
    /// The conversion process exceeded the wall-clock deadline.
    Timeout,
    /// The PDF rasterisation library could not be loaded or used.
    Rasterize(String),
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::ToolMissing => write!(f, "conversion tool is not installed"),
            ConvertError::Failed(msg) => write!(f, "conversion failed: {msg}"),
            ConvertError::Timeout => write!(f, "conversion timed out"),
            ConvertError::Rasterize(msg) => write!(f, "rasterisation error: {msg}"),
        }
    }
}

impl std::error::Error for ConvertError {}

/// Convert an office document to PDF with `libreoffice --headless`.
///
/// The input bytes are written to a temporary file carrying the original
/// extension (LibreOffice picks its import filter from it); the produced PDF
/// is read back from a temporary output directory. Exit status decides
/// success; the process is killed if it outlives `timeout`.
pub async fn office_to_pdf(
    data: &[u8],
    original_name: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ConvertError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");

    let mut input = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .map_err(|e| ConvertError::Failed(e.to_string()))?;
    input
        .write_all(data)
        .map_err(|e| ConvertError::Failed(e.to_string()))?;

    let out_dir = tempfile::tempdir().map_err(|e| ConvertError::Failed(e.to_string()))?;

    let child = Command::new("libreoffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(out_dir.path())
        .arg(input.path())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("libreoffice is not installed, office conversion unavailable");
            return Err(ConvertError::ToolMissing);
        }
        Ok(Err(e)) => return Err(ConvertError::Failed(e.to_string())),
        Err(_) => {
            warn!(original_name, "office conversion exceeded deadline");
            return Err(ConvertError::Timeout);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConvertError::Failed(format!(
            "libreoffice exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    // LibreOffice names the output after the input file's stem.
    let stem = input
        .path()
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| ConvertError::Failed("input path has no stem".to_string()))?;
    let produced = out_dir.path().join(format!("{stem}.pdf"));
    let pdf = std::fs::read(&produced)
        .map_err(|e| ConvertError::Failed(format!("missing converted output: {e}")))?;

    info!(
        original_name,
        pdf_bytes = pdf.len(),
        "office document converted to PDF"
    );
    Ok(pdf)
}

/// Longest rendered edge for rasterised PDF pages.
const MAX_RENDERED_PIXELS: i32 = 1024;

/// Rasterise every page of a PDF into a PNG image.
///
/// pdfium is a blocking C library with thread-local state, so the whole
/// operation runs on the blocking thread pool.
pub async fn pdf_to_page_images(data: Vec<u8>) -> Result<Vec<Vec<u8>>, ConvertError> {
    tokio::task::spawn_blocking(move || pdf_to_page_images_blocking(&data))
        .await
        .map_err(|e| ConvertError::Rasterize(format!("rasterise task panicked: {e}")))?
}

fn pdf_to_page_images_blocking(data: &[u8]) -> Result<Vec<Vec<u8>>, ConvertError> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| ConvertError::Rasterize(format!("pdfium unavailable: {e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| ConvertError::Failed(format!("invalid PDF: {e:?}")))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(MAX_RENDERED_PIXELS)
        .set_maximum_height(MAX_RENDERED_PIXELS);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ConvertError::Rasterize(format!("page {}: {e:?}", index + 1)))?;
        let image = bitmap.as_image();

        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ConvertError::Rasterize(format!("page {} encode: {e}", index + 1)))?;
        debug!(
            page = index + 1,
            width = image.width(),
            height = image.height(),
            "rasterised PDF page"
        );
        pages.push(png);
    }
    Ok(pages)
}
