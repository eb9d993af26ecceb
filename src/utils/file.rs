use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use flate2::read::GzDecoder;

/// Plain or gzip-compressed input, chosen by magic bytes.
pub enum FileReader {
    Uncompressed(BufReader<File>),
    Gzipped(GzDecoder<File>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileReader::Uncompressed(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn file_reader(path: &Path) -> io::Result<FileReader> {
    let is_gz = is_gzipped(path)?;
    let file = File::open(path)?;
    Ok(if is_gz {
        FileReader::Gzipped(GzDecoder::new(file))
    } else {
        FileReader::Uncompressed(BufReader::new(file))
    })
}


/// Builds an output path from a file name.
///
/// # Arguments
///
/// * `file` - File name (only its last component is used when `dir` is given).
/// * `dir` - Optional directory to place the file in.
/// * `prefix` - Optional prefix, joined to the name with `delimiter`.
/// * `suffix` - Optional suffix, joined to the name with `delimiter`.
/// * `delimiter` - Separator between prefix, name and suffix.
///
/// # Returns
/// PathBuf of the manipulated path.
pub fn file_path_manipulator(
    file: &Path,
    dir: Option<&Path>,
    prefix: Option<&str>,
    suffix: Option<&str>,
    delimiter: &str,
) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut new_name = String::new();
    if let Some(p) = prefix {
        new_name.push_str(p);
        new_name.push_str(delimiter);
    }
    new_name.push_str(&name);
    if let Some(s) = suffix {
        new_name.push_str(delimiter);
        new_name.push_str(s);
    }

    match dir {
        Some(d) => d.join(new_name),
        None => match file.parent() {
            Some(parent) => parent.join(new_name),
            None => PathBuf::from(new_name),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    #[test]
    fn test_file_path_manipulator_prefix() {
        let path = file_path_manipulator(Path::new("SCDSx-R1.fastq"), Some(Path::new("/data")), Some("trimmed"), None, "_");
        assert_eq!(path, PathBuf::from("/data/trimmed_SCDSx-R1.fastq"));
    }

    #[test]
    fn test_file_path_manipulator_keeps_parent() {
        let path = file_path_manipulator(Path::new("runs/x1.bam"), None, Some("sorted_aln"), None, "_");
        assert_eq!(path, PathBuf::from("runs/sorted_aln_x1.bam"));
    }

    #[test]
    fn test_file_path_manipulator_suffix() {
        let path = file_path_manipulator(Path::new("x1.bam"), Some(Path::new("out")), None, Some("bai"), ".");
        assert_eq!(path, PathBuf::from("out/x1.bam.bai"));
    }

    #[test]
    fn test_gzip_detection() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let plain = dir.path().join("plain.fa");
        std::fs::write(&plain, b">hsa-mir-1\nUGGA\n")?;
        let gz = dir.path().join("packed.fa.gz");
        let mut encoder = GzEncoder::new(File::create(&gz)?, Compression::default());
        encoder.write_all(b">hsa-mir-1\nUGGA\n")?;
        encoder.finish()?;
        let empty = dir.path().join("empty.fa");
        std::fs::write(&empty, b"")?;

        assert!(!is_gzipped(&plain)?);
        assert!(is_gzipped(&gz)?);
        assert!(!is_gzipped(&empty)?);

        let mut text = String::new();
        file_reader(&gz)?.read_to_string(&mut text)?;
        assert_eq!(text, ">hsa-mir-1\nUGGA\n");
        Ok(())
    }
}
