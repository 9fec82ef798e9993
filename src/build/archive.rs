// ABOUTME: Packs a project directory into the tar stream the engine builds from.
// ABOUTME: Runs on the blocking pool since tar walks the filesystem synchronously.

use std::io;
use std::path::{Path, PathBuf};

/// Tar `dir` with entries relative to its root.
pub fn pack_directory(dir: &Path) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut buffer);
        builder.follow_symlinks(false);
        builder.append_dir_all(".", dir)?;
        builder.finish()?;
    }
    Ok(buffer)
}

pub async fn pack_directory_async(dir: PathBuf) -> io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || pack_directory(&dir))
        .await
        .map_err(io::Error::other)?
}
