use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use goswitch_backend::BackendError;
use goswitch_platform::{ArchiveKind, executable_name};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("no Go toolchain found in extracted archive at {}", .0.display())]
    MissingToolchain(PathBuf),
}

impl ExtractError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }
}

impl From<ExtractError> for BackendError {
    fn from(error: ExtractError) -> Self {
        let kind = match &error {
            ExtractError::Io { source, .. } => source.kind(),
            ExtractError::Zip { .. } => std::io::ErrorKind::InvalidData,
            ExtractError::MissingToolchain(_) => std::io::ErrorKind::NotFound,
        };
        BackendError::IoError {
            kind,
            message: error.to_string(),
        }
    }
}

/// Unpack `archive` into `dest`. Entries that would land outside `dest` are
/// skipped.
///
/// # Errors
/// Returns an error when the archive is corrupt or cannot be written out.
pub fn extract_archive(kind: ArchiveKind, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(dest)
        .map_err(|error| ExtractError::io("failed to create extraction directory", dest, error))?;
    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
    }
}

fn extract_zip(zip_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(zip_path)
        .map_err(|error| ExtractError::io("failed to open zip file", zip_path, error))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| ExtractError::zip("failed to read zip archive", error))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| ExtractError::zip("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.join(name);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                ExtractError::io("failed to create extraction directory", &out_path, error)
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                ExtractError::io("failed to create extraction parent directory", parent, error)
            })?;
        }
        let mut outfile = File::create(&out_path)
            .map_err(|error| ExtractError::io("failed to create extracted file", &out_path, error))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|error| ExtractError::io("failed to extract archive entry", &out_path, error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                    .map_err(|error| {
                        ExtractError::io("failed to set file permissions", &out_path, error)
                    })?;
            }
        }
    }

    debug!("Extracted zip to {}", dest.display());
    Ok(())
}

fn extract_tar_gz(tarball: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(tarball)
        .map_err(|error| ExtractError::io("failed to open tarball", tarball, error))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    let entries = archive
        .entries()
        .map_err(|error| ExtractError::io("failed to read tarball", tarball, error))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|error| ExtractError::io("failed to read tarball entry", tarball, error))?;
        // unpack_in refuses entries that escape `dest`
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|error| ExtractError::io("failed to extract tarball entry", dest, error))?;
        if !unpacked {
            warn!("Skipping tar entry with unsafe path");
        }
    }

    debug!("Extracted tarball to {}", dest.display());
    Ok(())
}

/// Whether `dir` looks like a Go SDK, i.e. contains `bin/go`.
#[must_use]
pub fn has_go_binary(dir: &Path) -> bool {
    dir.join("bin").join(executable_name("go")).is_file()
}

/// Locate the SDK root inside an extraction directory. Upstream archives wrap
/// everything in a single top-level `go/`; a bare layout is accepted too.
///
/// # Errors
/// Returns `MissingToolchain` when no directory with `bin/go` is found.
pub fn toolchain_root(extracted: &Path) -> Result<PathBuf, ExtractError> {
    let wrapped = extracted.join("go");
    if has_go_binary(&wrapped) {
        return Ok(wrapped);
    }
    if has_go_binary(extracted) {
        return Ok(extracted.to_path_buf());
    }

    let entries = std::fs::read_dir(extracted)
        .map_err(|error| ExtractError::io("failed to read extraction directory", extracted, error))?;
    let mut dirs = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir());
    match (dirs.next(), dirs.next()) {
        (Some(only), None) if has_go_binary(&only) => Ok(only),
        _ => Err(ExtractError::MissingToolchain(extracted.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use goswitch_backend::ErrorKind;

    use super::*;

    fn go_binary_name() -> String {
        format!("go/bin/{}", executable_name("go"))
    }

    fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).expect("tarball should be created");
        let encoder = GzEncoder::new(file, Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, *contents)
                .expect("entry should be appended");
        }
        builder
            .into_inner()
            .expect("tar should finish")
            .finish()
            .expect("gzip should finish");
    }

    #[cfg(unix)]
    #[test]
    fn extract_zip_keeps_the_go_binary_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir should be created");
        let zip_path = temp.path().join("go.zip");
        let extract_dir = temp.path().join("extract");

        let mut writer =
            zip::ZipWriter::new(File::create(&zip_path).expect("zip file should be created"));
        let executable = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        let plain = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
        writer
            .start_file(go_binary_name(), executable)
            .expect("binary entry should be started");
        writer.write_all(b"#!/bin/sh\n").expect("binary should be written");
        writer
            .start_file("go/VERSION", plain)
            .expect("VERSION entry should be started");
        writer.write_all(b"go1.22.0\n").expect("VERSION should be written");
        writer.finish().expect("zip archive should be finalized");

        extract_archive(ArchiveKind::Zip, &zip_path, &extract_dir).expect("zip should extract");

        let mode = |path: &str| {
            std::fs::metadata(extract_dir.join(path))
                .expect("extracted entry should exist")
                .permissions()
                .mode()
                & 0o777
        };
        assert_eq!(mode(&go_binary_name()), 0o755);
        assert_eq!(mode("go/VERSION"), 0o644);
    }

    #[test]
    fn extract_zip_expands_files_and_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let zip_path = temp.path().join("go.zip");
        let extract_dir = temp.path().join("extract");

        let zip_file = File::create(&zip_path).expect("zip file should be created");
        let mut writer = zip::ZipWriter::new(zip_file);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        writer
            .add_directory("go/bin/", options)
            .expect("directory entry should be written");
        writer
            .start_file(go_binary_name(), options)
            .expect("file entry should be started");
        writer
            .write_all(b"binary-content")
            .expect("file entry should be written");
        writer.finish().expect("zip archive should be finalized");

        extract_archive(ArchiveKind::Zip, &zip_path, &extract_dir).expect("zip should extract");

        let extracted = std::fs::read(extract_dir.join(go_binary_name()))
            .expect("extracted file should exist and be readable");
        assert_eq!(extracted, b"binary-content");
        assert_eq!(
            toolchain_root(&extract_dir).expect("go/ root"),
            extract_dir.join("go")
        );
    }

    #[test]
    fn extract_zip_skips_unsafe_paths() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let zip_path = temp.path().join("unsafe.zip");
        let extract_dir = temp.path().join("extract");

        let zip_file = File::create(&zip_path).expect("zip file should be created");
        let mut writer = zip::ZipWriter::new(zip_file);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
        writer
            .start_file("../outside.txt", options)
            .expect("unsafe file entry should be started");
        writer
            .write_all(b"should not be extracted")
            .expect("unsafe file entry should be written");
        writer.finish().expect("zip archive should be finalized");

        extract_archive(ArchiveKind::Zip, &zip_path, &extract_dir)
            .expect("zip extraction should not fail");

        assert!(!temp.path().join("outside.txt").exists());
    }

    #[test]
    fn extract_tar_gz_keeps_layout() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let tarball = temp.path().join("go.tar.gz");
        let extract_dir = temp.path().join("extract");
        let binary = go_binary_name();
        write_tar_gz(
            &tarball,
            &[
                (binary.as_str(), &b"#!/bin/sh\n"[..]),
                ("go/VERSION", &b"go1.22.0\n"[..]),
            ],
        );

        extract_archive(ArchiveKind::TarGz, &tarball, &extract_dir).expect("tarball should extract");

        assert_eq!(
            std::fs::read_to_string(extract_dir.join("go/VERSION")).expect("VERSION exists"),
            "go1.22.0\n"
        );
        assert!(has_go_binary(&extract_dir.join("go")));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(extract_dir.join(&binary))
                .expect("binary exists")
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn corrupt_tarball_is_io_error() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let tarball = temp.path().join("broken.tar.gz");
        std::fs::write(&tarball, b"definitely not gzip").expect("file should be written");

        let error = extract_archive(ArchiveKind::TarGz, &tarball, &temp.path().join("out"))
            .expect_err("garbage is not a tarball");

        assert_eq!(BackendError::from(error).kind(), ErrorKind::Io);
    }

    #[test]
    fn toolchain_root_accepts_single_renamed_directory() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let sdk = temp.path().join("go1.22.0");
        std::fs::create_dir_all(sdk.join("bin")).expect("bin dir");
        std::fs::write(sdk.join("bin").join(executable_name("go")), b"").expect("go binary");

        assert_eq!(toolchain_root(temp.path()).expect("single dir"), sdk);
    }

    #[test]
    fn toolchain_root_without_binary_is_missing() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::create_dir_all(temp.path().join("go/src")).expect("src dir");

        let error = toolchain_root(temp.path()).expect_err("no bin/go");
        assert!(matches!(error, ExtractError::MissingToolchain(_)));
    }
}
