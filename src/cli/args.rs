use clap::{Parser, ValueEnum};
use crate::config::defs::{BOWTIE2_BUILD_TAG, BOWTIE2_TAG, CUTADAPT_TAG, SAMTOOLS_TAG};

/// miRBase reference the reads are aligned against.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum ReferenceKind {
    Hairpin,
    #[default]
    Mature,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Hairpin => "hairpin",
            ReferenceKind::Mature => "mature",
        }
    }

    /// Every reference kind, in build order.
    pub fn all() -> &'static [ReferenceKind] {
        &[ReferenceKind::Hairpin, ReferenceKind::Mature]
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mirna-counts", version, about = "Trim, align and count small-RNA reads against miRBase")]
pub struct Arguments {

    #[arg(required = true, num_args = 1.., help = "Raw FASTQ file names, relative to the base directory. The sample name is taken from the 5th character up to the first '-'.")]
    pub fastq_files: Vec<String>,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'b', long = "base-dir", help = "Directory holding raw reads, hairpin.fa/mature.fa and all intermediate files. Defaults to the current directory.")]
    pub base_dir: Option<String>,

    #[arg(short = 'o', long = "out", help = "Directory containing the Samtools_flagstat/ and Raw_counts/ output directories. Defaults to the current directory.")]
    pub out_dir: Option<String>,

    #[arg(long, default_value = "hsa", help = "FASTA header prefix of the species kept from the miRBase references")]
    pub species: String,

    #[arg(long = "align-index", default_value = "mature", value_enum)]
    pub align_index: ReferenceKind,

    #[arg(long = "bt2-index", help = "Existing bowtie2 index prefix (e.g. hg19/hg19), relative to the base directory. Skips the miRBase index builds.")]
    pub bt2_index: Option<String>,

    #[arg(short = 't', long, default_value_t = 8)]
    pub threads: usize,

    #[arg(long, default_value = CUTADAPT_TAG)]
    pub cutadapt: String,

    #[arg(long, default_value = BOWTIE2_TAG)]
    pub bowtie2: String,

    #[arg(long = "bowtie2-build", default_value = BOWTIE2_BUILD_TAG)]
    pub bowtie2_build: String,

    #[arg(long, default_value = SAMTOOLS_TAG)]
    pub samtools: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Arguments::parse_from(["mirna-counts", "SCDSa-R1.fastq", "SCDSb-R1.fastq"]);
        assert_eq!(args.fastq_files, vec!["SCDSa-R1.fastq", "SCDSb-R1.fastq"]);
        assert_eq!(args.species, "hsa");
        assert_eq!(args.align_index, ReferenceKind::Mature);
        assert_eq!(args.threads, 8);
        assert_eq!(args.bowtie2_build, "bowtie2-build");
        assert!(args.base_dir.is_none());
    }

    #[test]
    fn test_requires_a_read_file() {
        assert!(Arguments::try_parse_from(["mirna-counts"]).is_err());
    }

    #[test]
    fn test_hairpin_index() {
        let args = Arguments::try_parse_from(["mirna-counts", "--align-index", "hairpin", "SCDSa-R1.fastq"]).unwrap();
        assert_eq!(args.align_index, ReferenceKind::Hairpin);
    }

    #[test]
    fn test_custom_bt2_index() {
        let args = Arguments::try_parse_from(["mirna-counts", "--bt2-index", "hg19/hg19", "SCDSa-R1.fastq"]).unwrap();
        assert_eq!(args.bt2_index.as_deref(), Some("hg19/hg19"));
        let args = Arguments::try_parse_from(["mirna-counts", "SCDSa-R1.fastq"]).unwrap();
        assert!(args.bt2_index.is_none());
    }
}
