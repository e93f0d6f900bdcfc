use std::path::Path;

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::dispatch::DispatchReport;
use crate::error::ExportError;

use super::summary::ReportView;

/// Writes the summary plus every per-call outcome as pretty JSON.
pub(super) async fn export_json(path: &Path, report: &DispatchReport) -> Result<(), ExportError> {
    let payload = ReportView::with_outcomes(report);
    let json = serde_json::to_vec_pretty(&payload)
        .map_err(|err| ExportError::Serialize { source: err })?;
    write_file(path, &json).await.map_err(|err| ExportError::Write {
        path: path.to_path_buf(),
        source: err,
    })
}

async fn write_file(path: &Path, json: &[u8]) -> Result<(), std::io::Error> {
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(json).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
