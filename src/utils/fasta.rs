use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use anyhow::{anyhow, Result};
use tempfile::NamedTempFile;
use crate::config::defs::FASTA_HEADER;
use crate::utils::file::file_reader;


/// Rewrites the RNA alphabet to DNA. Only uppercase `U` is touched.
pub fn rna_to_dna(line: &[u8]) -> Vec<u8> {
    line.iter()
        .map(|&b| if b == b'U' { b'T' } else { b })
        .collect()
}

/// Copies the records whose header starts with `species` from `reader` to `writer`,
/// converting their sequence lines to the DNA alphabet.
///
/// Works line by line: a `><species>` header turns copying on, any other header turns
/// it off, and lines before the first header are dropped. Kept lines, blank ones and
/// their line endings included, are written unchanged apart from `U` -> `T`.
///
/// # Arguments
///
/// * `reader` - FASTA input (miRBase hairpin.fa / mature.fa).
/// * `writer` - Destination for the kept records.
/// * `species` - Header prefix, e.g. `hsa`.
///
/// # Returns
/// Number of records kept.
pub fn filter_species<R: BufRead, W: Write>(mut reader: R, writer: &mut W, species: &str) -> Result<u64> {
    let mut species_header = vec![FASTA_HEADER];
    species_header.extend_from_slice(species.as_bytes());

    let mut line = Vec::new();
    let mut keep = false;
    let mut kept = 0u64;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line.starts_with(&species_header) {
            keep = true;
            kept += 1;
            writer.write_all(&line)?;
        } else if line.first() == Some(&FASTA_HEADER) {
            keep = false;
        } else if keep {
            writer.write_all(&rna_to_dna(&line))?;
        }
    }
    writer.flush()?;
    Ok(kept)
}

/// File-to-file wrapper around `filter_species`. The source may be gzipped.
/// Output goes to a temporary file next to `dest` that is renamed into place only after
/// the whole source was read, so `dest` never exists half-written.
pub fn write_species_fasta(source: &Path, dest: &Path, species: &str) -> Result<u64> {
    let reader = BufReader::new(
        file_reader(source).map_err(|e| anyhow!("Cannot open {}: {}", source.display(), e))?,
    );
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)
        .map_err(|e| anyhow!("Cannot create a temporary file in {}: {}", dir.display(), e))?;

    let mut writer = BufWriter::new(tmp);
    let kept = filter_species(reader, &mut writer, species)
        .map_err(|e| anyhow!("{}: {}", source.display(), e))?;
    let tmp = writer
        .into_inner()
        .map_err(|e| anyhow!("Cannot write {}: {}", dest.display(), e.error()))?;
    tmp.persist(dest)
        .map_err(|e| anyhow!("Cannot create {}: {}", dest.display(), e.error))?;
    Ok(kept)
}
