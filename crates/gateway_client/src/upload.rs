use std::{path::PathBuf, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{error::RpcResult, protocol::GatewayResponse, protocol::UploadCadChunk};
use tokio::{fs::File, io::AsyncReadExt, sync::broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{transport::GatewayTransport, GatewayEvent};

pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// Stream a CAD model file to the gateway in fixed-size chunks, emitting
/// coalesced progress along the way and exactly one completion event.
pub(crate) async fn run_upload(
    transport: Arc<dyn GatewayTransport>,
    path: PathBuf,
    events: broadcast::Sender<GatewayEvent>,
) {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut file = match File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            let _ = events.send(GatewayEvent::UploadCadFinished {
                result: RpcResult::invalid_argument(format!(
                    "cannot open {}: {err}",
                    path.display()
                )),
                model_id: String::new(),
            });
            return;
        }
    };
    let total_bytes = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(_) => 0,
    };

    let mut sink = match transport.open_upload().await {
        Ok(sink) => sink,
        Err(err) => {
            let _ = events.send(GatewayEvent::UploadCadFinished {
                result: err.into(),
                model_id: String::new(),
            });
            return;
        }
    };

    let upload_id = Uuid::new_v4().to_string();
    info!(%upload_id, %filename, total_bytes, "starting CAD upload");

    let mut sent_bytes: u64 = 0;
    let mut chunk_index: u32 = 0;
    let mut last_percent: Option<u8> = None;

    // Read one chunk ahead so the in-flight chunk can carry the eof marker.
    let mut pending = match read_chunk(&mut file).await {
        Ok(chunk) => chunk,
        Err(err) => {
            let _ = events.send(GatewayEvent::UploadCadFinished {
                result: RpcResult::internal(format!("read failed: {err}")),
                model_id: String::new(),
            });
            return;
        }
    };

    while let Some(data) = pending {
        let next = match read_chunk(&mut file).await {
            Ok(next) => next,
            Err(err) => {
                let _ = events.send(GatewayEvent::UploadCadFinished {
                    result: RpcResult::internal(format!("read failed: {err}")),
                    model_id: String::new(),
                });
                return;
            }
        };
        let chunk = UploadCadChunk {
            upload_id: upload_id.clone(),
            filename: filename.clone(),
            data_b64: STANDARD.encode(&data),
            chunk_index,
            eof: next.is_none(),
        };
        if let Err(err) = sink.write_chunk(chunk).await {
            let _ = events.send(GatewayEvent::UploadCadFinished {
                result: RpcResult::internal(format!(
                    "stream write failed at chunk {chunk_index}: {err}"
                )),
                model_id: String::new(),
            });
            return;
        }
        sent_bytes += data.len() as u64;
        chunk_index += 1;
        if total_bytes > 0 {
            let percent = progress_percent(sent_bytes, total_bytes);
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                let _ = events.send(GatewayEvent::UploadCadProgress(percent));
            }
        }
        pending = next;
    }

    debug!(%upload_id, chunks = chunk_index, "upload drained, awaiting acknowledgement");
    match sink.finish().await {
        Ok(GatewayResponse::UploadCad { result, model_id }) => {
            let _ = events.send(GatewayEvent::UploadCadFinished { result, model_id });
        }
        Ok(other) => {
            let _ = events.send(GatewayEvent::UploadCadFinished {
                result: RpcResult::internal(format!("unexpected upload acknowledgement: {other:?}")),
                model_id: String::new(),
            });
        }
        Err(err) => {
            let _ = events.send(GatewayEvent::UploadCadFinished {
                result: err.into(),
                model_id: String::new(),
            });
        }
    }
}

/// Integer percent complete, saturating at 100: `total_bytes` is a snapshot
/// taken at open time and the source may have grown since.
pub(crate) fn progress_percent(sent_bytes: u64, total_bytes: u64) -> u8 {
    ((sent_bytes * 100) / total_bytes).min(100) as u8
}

/// Read up to one full chunk, retrying short reads. `None` at end of file.
async fn read_chunk(file: &mut File) -> std::io::Result<Option<Vec<u8>>> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut filled = 0;
    while filled < CHUNK_SIZE {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    if filled == 0 {
        return Ok(None);
    }
    buffer.truncate(filled);
    Ok(Some(buffer))
}
