//! Streaming request bodies to disk.

use std::io;
use std::path::Path;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Write `stream` to `path` without buffering it in memory.
///
/// Bytes go to a sibling `.part` file that is renamed into place on success
/// and removed on failure. Returns the number of bytes written.
pub async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let part = path.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()));

    let result = async {
        let body_with_io_error = stream.map_err(io::Error::other);
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(&part).await?);
        let written = tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;
        file.into_inner().sync_all().await?;
        Ok::<_, io::Error>(written)
    }
    .await;

    match result {
        Ok(written) => {
            tokio::fs::rename(&part, path).await?;
            Ok(written)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(e)
        }
    }
}
