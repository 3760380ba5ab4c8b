use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

pub trait PageRenderer {
    /// Renders 1-based `page` of `pdf` to the PNG file `output`.
    fn render_page(&self, pdf: &Path, page: u32, dpi: u32, output: &Path) -> Result<(), String>;
}

/// Poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    binary: PathBuf,
}

impl PdftoppmRenderer {
    #[must_use]
    pub fn new(binary: Option<&Path>) -> Self {
        Self {
            binary: binary.map_or_else(|| PathBuf::from("pdftoppm"), Path::to_path_buf),
        }
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_page(&self, pdf: &Path, page: u32, dpi: u32, output: &Path) -> Result<(), String> {
        // pdftoppm appends ".png" to the prefix it is given.
        let prefix = output.with_extension("");
        let page = page.to_string();
        debug!(binary = %self.binary.display(), pdf = %pdf.display(), page = %page, dpi, "rendering page");

        let result = Command::new(&self.binary)
            .args(["-png", "-singlefile"])
            .args(["-r", &dpi.to_string()])
            .args(["-f", &page, "-l", &page])
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|error| format!("failed to run {}: {error}", self.binary.display()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                result.status,
                stderr.trim()
            ));
        }

        if !output.is_file() {
            return Err(format!("{} produced no image", self.binary.display()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{PageRenderer, PdftoppmRenderer};

    #[test]
    fn missing_binary_is_reported_not_panicked() {
        let renderer = PdftoppmRenderer::new(Some(Path::new("/nonexistent/pdftoppm-binary")));
        let err = renderer
            .render_page(Path::new("in.pdf"), 1, 100, Path::new("out.png"))
            .expect_err("binary does not exist");
        assert!(err.contains("failed to run"));
    }
}
