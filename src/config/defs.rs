use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use crate::cli::{Arguments, ReferenceKind};
use lazy_static::lazy_static;
use std::collections::HashMap;

// External software
pub const CUTADAPT_TAG: &str = "cutadapt";
pub const BOWTIE2_TAG: &str = "bowtie2";
pub const BOWTIE2_BUILD_TAG: &str = "bowtie2-build";
pub const SAMTOOLS_TAG: &str = "samtools";


lazy_static! {
    /// Oldest versions the argument templates are known to work with.
    pub static ref TOOL_VERSIONS: HashMap<&'static str, (u32, u32)> = {
        let mut m = HashMap::new();
        m.insert(CUTADAPT_TAG, (1, 18));
        m.insert(BOWTIE2_TAG, (2, 3));
        m.insert(BOWTIE2_BUILD_TAG, (2, 3));
        m.insert(SAMTOOLS_TAG, (1, 9));

        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamtoolsSubcommand {
    View,
    Sort,
    Index,
    Flagstat,
    Idxstats,
}

impl SamtoolsSubcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamtoolsSubcommand::View => "view",
            SamtoolsSubcommand::Sort => "sort",
            SamtoolsSubcommand::Index => "index",
            SamtoolsSubcommand::Flagstat => "flagstat",
            SamtoolsSubcommand::Idxstats => "idxstats",
        }
    }
}


// Static Parameters

// NEB small RNA adapters
pub const ADAPTER_3P: &str = "AGATCGGAAGAGCACACGTCT";
pub const ADAPTER_5P: &str = "GTTCAGAGTTCTACAGTCCGACGATC";
pub const CUTADAPT_ERROR_RATE: f64 = 0.15;
pub const CUTADAPT_MIN_OVERLAP: usize = 10;
pub const CUTADAPT_MIN_LENGTH: usize = 14;

pub const BOWTIE2_EFFORT: usize = 20;
pub const BOWTIE2_RESEED: usize = 3;
pub const BOWTIE2_SEED_MISMATCHES: usize = 0;
pub const BOWTIE2_SEED_LENGTH: usize = 8;
pub const BOWTIE2_SEED_INTERVAL: &str = "S,1,0.50";

pub const SAMPLE_NAME_OFFSET: usize = 4;
pub const SAMPLE_NAME_DELIMITER: char = '-';

// Static Filenames
pub const TRIMMED_PREFIX: &str = "trimmed_";
pub const ALIGNMENT_PREFIX: &str = "aln_";
pub const SORTED_PREFIX: &str = "sorted_";
pub const SAM_EXT: &str = "sam";
pub const BAM_EXT: &str = "bam";
pub const BAI_EXT: &str = "bai";
pub const FLAGSTAT_DIR: &str = "Samtools_flagstat";
pub const FLAGSTAT_SUFFIX: &str = "_report.txt";
pub const RAW_COUNTS_DIR: &str = "Raw_counts";
pub const RAW_COUNTS_SUFFIX: &str = "_raw_count.txt";

pub const FASTA_HEADER: u8 = b'>';


/// Fatal conditions of a pipeline run. None of them are retried.
#[derive(Debug)]
pub enum PipelineError {
    InvalidConfig(String),
    InvalidSampleName(String),
    MissingInput(PathBuf),
    InvalidFasta(String),
    ToolNotFound { tool: String, error: String },
    ToolExecution { tool: String, error: String },
    IOError(String),
    Other(anyhow::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            PipelineError::InvalidSampleName(file) => write!(
                f,
                "Cannot derive a sample name from {:?}: expected at least {} characters before the first '{}'",
                file, SAMPLE_NAME_OFFSET + 1, SAMPLE_NAME_DELIMITER
            ),
            PipelineError::MissingInput(path) => write!(f, "Input file not found: {}", path.display()),
            PipelineError::InvalidFasta(msg) => write!(f, "Invalid FASTA: {}", msg),
            PipelineError::ToolNotFound { tool, error } => write!(f, "Failed to spawn {}: {}. Is {} installed?", tool, error, tool),
            PipelineError::ToolExecution { tool, error } => write!(f, "{} failed: {}", tool, error),
            PipelineError::IOError(msg) => write!(f, "I/O error: {}", msg),
            PipelineError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        PipelineError::Other(e)
    }
}

impl From<io::Error> for PipelineError {
    fn from(e: io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}


/// Run-wide settings shared by every stage.
#[derive(Debug)]
pub struct RunConfig {
    pub cwd: PathBuf,
    /// Reads, references and intermediate files.
    pub base_dir: PathBuf,
    /// Parent of `Samtools_flagstat/` and `Raw_counts/`.
    pub out_dir: PathBuf,
    pub args: Arguments,
}

impl RunConfig {
    /// Resolves the base and output directories against `cwd`.
    /// Neither directory is created; both must already exist.
    pub fn new(args: Arguments, cwd: PathBuf) -> Result<RunConfig, PipelineError> {
        let base_dir = resolve_dir(args.base_dir.as_deref(), &cwd)?;
        let out_dir = resolve_dir(args.out_dir.as_deref(), &cwd)?;
        Ok(RunConfig { cwd, base_dir, out_dir, args })
    }

    /// Executable configured for a tool tag.
    pub fn tool_exe<'a>(&'a self, tool: &'a str) -> &'a str {
        match tool {
            CUTADAPT_TAG => &self.args.cutadapt,
            BOWTIE2_TAG => &self.args.bowtie2,
            BOWTIE2_BUILD_TAG => &self.args.bowtie2_build,
            SAMTOOLS_TAG => &self.args.samtools,
            other => other,
        }
    }

    pub fn source_fasta(&self, kind: ReferenceKind) -> PathBuf {
        self.base_dir.join(format!("{}.fa", kind.as_str()))
    }

    pub fn filtered_fasta(&self, kind: ReferenceKind) -> PathBuf {
        self.base_dir.join(format!("{}_miRNA_{}.fa", self.args.species, kind.as_str()))
    }

    pub fn index_prefix(&self, kind: ReferenceKind) -> PathBuf {
        self.base_dir.join(format!("{}_miRNA_{}_index", self.args.species, kind.as_str()))
    }

    /// Prefix bowtie2 aligns against: `--bt2-index` if given, else the `--align-index` miRBase index.
    pub fn alignment_index(&self) -> PathBuf {
        match &self.args.bt2_index {
            Some(prefix) => {
                let path = PathBuf::from(prefix);
                if path.is_absolute() { path } else { self.base_dir.join(path) }
            }
            None => self.index_prefix(self.args.align_index),
        }
    }

    pub fn flagstat_report(&self, sample_name: &str) -> PathBuf {
        self.out_dir.join(FLAGSTAT_DIR).join(format!("{}{}", sample_name, FLAGSTAT_SUFFIX))
    }

    pub fn raw_count_file(&self, sample_name: &str) -> PathBuf {
        self.out_dir.join(RAW_COUNTS_DIR).join(format!("{}{}", sample_name, RAW_COUNTS_SUFFIX))
    }
}

fn resolve_dir(dir: Option<&str>, cwd: &Path) -> Result<PathBuf, PipelineError> {
    let path = match dir {
        Some(d) => {
            let path = PathBuf::from(d);
            if path.is_absolute() { path } else { cwd.join(path) }
        }
        None => cwd.to_path_buf(),
    };
    if !path.is_dir() {
        return Err(PipelineError::InvalidConfig(format!("{} is not a directory", path.display())));
    }
    Ok(path)
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(extra: &[&str]) -> RunConfig {
        let dir = std::env::temp_dir();
        let mut argv = vec!["mirna-counts", "SCDSa-R1.fastq"];
        argv.extend_from_slice(extra);
        let args = Arguments::parse_from(argv);
        RunConfig::new(args, dir).unwrap()
    }

    #[test]
    fn test_reference_paths_follow_species() {
        let config = config(&["--species", "mmu"]);
        let base = std::env::temp_dir();
        assert_eq!(config.source_fasta(ReferenceKind::Hairpin), base.join("hairpin.fa"));
        assert_eq!(config.filtered_fasta(ReferenceKind::Mature), base.join("mmu_miRNA_mature.fa"));
        assert_eq!(config.index_prefix(ReferenceKind::Hairpin), base.join("mmu_miRNA_hairpin_index"));
    }

    #[test]
    fn test_alignment_index() {
        let base = std::env::temp_dir();
        assert_eq!(config(&[]).alignment_index(), base.join("hsa_miRNA_mature_index"));
        assert_eq!(config(&["--align-index", "hairpin"]).alignment_index(), base.join("hsa_miRNA_hairpin_index"));
        assert_eq!(config(&["--bt2-index", "hg19/hg19"]).alignment_index(), base.join("hg19/hg19"));
        assert_eq!(config(&["--bt2-index", "/refs/hg19/hg19"]).alignment_index(), PathBuf::from("/refs/hg19/hg19"));
    }

    #[test]
    fn test_output_paths() {
        let config = config(&[]);
        let base = std::env::temp_dir();
        assert_eq!(config.flagstat_report("x1"), base.join("Samtools_flagstat/x1_report.txt"));
        assert_eq!(config.raw_count_file("x1"), base.join("Raw_counts/x1_raw_count.txt"));
    }

    #[test]
    fn test_tool_exe_override() {
        let config = config(&["--samtools", "/opt/samtools/bin/samtools"]);
        assert_eq!(config.tool_exe(SAMTOOLS_TAG), "/opt/samtools/bin/samtools");
        assert_eq!(config.tool_exe(BOWTIE2_TAG), "bowtie2");
    }

    #[test]
    fn test_missing_base_dir_is_rejected() {
        let args = Arguments::parse_from(["mirna-counts", "-b", "does/not/exist", "SCDSa-R1.fastq"]);
        let err = RunConfig::new(args, std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }
}
