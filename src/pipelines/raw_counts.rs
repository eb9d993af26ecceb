use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{debug, info};
use crate::cli::ReferenceKind;
use crate::config::defs::{PipelineError, RunConfig, SamtoolsSubcommand, CUTADAPT_TAG, BOWTIE2_TAG, BOWTIE2_BUILD_TAG, SAMTOOLS_TAG, SAMPLE_NAME_OFFSET, SAMPLE_NAME_DELIMITER, TRIMMED_PREFIX, ALIGNMENT_PREFIX, SORTED_PREFIX, SAM_EXT, BAM_EXT, BAI_EXT};
use crate::utils::command::{check_versions, generate_cli, run_tool, ToolStdout};
use crate::utils::command::cutadapt::CutadaptConfig;
use crate::utils::command::bowtie2::Bowtie2Config;
use crate::utils::command::bowtie2_build::Bowtie2BuildConfig;
use crate::utils::command::samtools::SamtoolsConfig;
use crate::utils::fasta::write_species_fasta;
use crate::utils::file::file_path_manipulator;
use crate::utils::sambam::idxstats_to_raw_counts;

const BANNER: &str = "============================================================================";


/// Derives the sample name from a raw read file name: characters 4 up to the first '-'.
/// `SCDS12T-R1.fastq` yields `12T`.
///
/// # Arguments
///
/// * `fastq_file` - Read file as given on the command line; only its file name is used.
///
/// # Returns
/// The sample name, or InvalidSampleName when there is no '-' or nothing between offset and '-'.
pub fn sample_name(fastq_file: &str) -> Result<String, PipelineError> {
    let file_name = Path::new(fastq_file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PipelineError::InvalidSampleName(fastq_file.to_string()))?;

    let delimiter = file_name
        .chars()
        .position(|c| c == SAMPLE_NAME_DELIMITER)
        .ok_or_else(|| PipelineError::InvalidSampleName(fastq_file.to_string()))?;
    if delimiter <= SAMPLE_NAME_OFFSET {
        return Err(PipelineError::InvalidSampleName(fastq_file.to_string()));
    }

    Ok(file_name
        .chars()
        .skip(SAMPLE_NAME_OFFSET)
        .take(delimiter - SAMPLE_NAME_OFFSET)
        .collect())
}

/// Per-sample context handed to every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Read file as given on the command line.
    pub fastq_file: String,
    pub name: String,
}

impl Sample {
    pub fn new(fastq_file: &str) -> Result<Sample, PipelineError> {
        Ok(Sample {
            fastq_file: fastq_file.to_string(),
            name: sample_name(fastq_file)?,
        })
    }

    pub fn raw_reads(&self, config: &RunConfig) -> PathBuf {
        config.base_dir.join(&self.fastq_file)
    }

    pub fn trimmed_reads(&self, config: &RunConfig) -> PathBuf {
        file_path_manipulator(Path::new(&self.fastq_file), Some(&config.base_dir), Some(TRIMMED_PREFIX), None, "")
    }

    pub fn sam(&self, config: &RunConfig) -> PathBuf {
        self.alignment_file(config, ALIGNMENT_PREFIX, SAM_EXT)
    }

    pub fn bam(&self, config: &RunConfig) -> PathBuf {
        self.alignment_file(config, ALIGNMENT_PREFIX, BAM_EXT)
    }

    pub fn sorted_bam(&self, config: &RunConfig) -> PathBuf {
        self.alignment_file(config, &format!("{}{}", SORTED_PREFIX, ALIGNMENT_PREFIX), BAM_EXT)
    }

    fn alignment_file(&self, config: &RunConfig, prefix: &str, ext: &str) -> PathBuf {
        let file = PathBuf::from(format!("{}.{}", self.name, ext));
        file_path_manipulator(&file, Some(&config.base_dir), Some(prefix), None, "")
    }
}

/// Files written by the conversion stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedBam {
    pub bam: PathBuf,
    pub sorted_bam: PathBuf,
    pub bai: PathBuf,
}

fn print_banner(sample: &Sample) {
    println!();
    println!("{}", BANNER);
    println!("Sample in analyzing: {}", sample.name);
}

fn write_output(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    std::fs::write(path, contents)
        .map_err(|e| PipelineError::IOError(format!("Cannot write {}: {}", path.display(), e)))
}


/// Removes the NEB small RNA adapters with cutadapt and prints its report.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `sample` - Current sample.
///
/// # Returns
/// Path of the trimmed FASTQ.
pub async fn trim_adapters(config: &RunConfig, sample: &Sample) -> Result<PathBuf, PipelineError> {
    let raw_reads = sample.raw_reads(config);
    if !raw_reads.is_file() {
        return Err(PipelineError::MissingInput(raw_reads));
    }
    let trimmed = sample.trimmed_reads(config);

    let cutadapt_config = CutadaptConfig {
        input: raw_reads,
        output: trimmed.clone(),
    };
    let cutadapt_args = generate_cli(CUTADAPT_TAG, config, Some(&cutadapt_config))?;
    let report = run_tool(config, CUTADAPT_TAG, &cutadapt_args, ToolStdout::Capture).await?;

    print_banner(sample);
    println!("{}", String::from_utf8_lossy(&report));
    Ok(trimmed)
}


/// Filters one miRBase reference to the configured species and builds its bowtie2 index.
/// Skipped entirely when the filtered FASTA already exists. Existence is the only check:
/// a stale or half-written FASTA, or a missing index next to it, is never rebuilt.
///
/// # Returns
/// true if the index was built by this call.
pub async fn prepare_reference(config: &RunConfig, kind: ReferenceKind) -> Result<bool, PipelineError> {
    let filtered = config.filtered_fasta(kind);
    if filtered.is_file() {
        debug!("{} exists, reusing {} index", filtered.display(), kind.as_str());
        return Ok(false);
    }

    let source = config.source_fasta(kind);
    if !source.is_file() {
        return Err(PipelineError::MissingInput(source));
    }

    info!("Building {} {} index from {}", config.args.species, kind.as_str(), source.display());
    let species = config.args.species.clone();
    let dest = filtered.clone();
    let kept = tokio::task::spawn_blocking(move || write_species_fasta(&source, &dest, &species))
        .await
        .map_err(|e| PipelineError::Other(e.into()))?
        .map_err(|e| PipelineError::InvalidFasta(e.to_string()))?;
    info!("Kept {} {} records", kept, kind.as_str());

    let build_config = Bowtie2BuildConfig {
        fasta: filtered,
        bt2_index_path: config.index_prefix(kind),
    };
    let build_args = generate_cli(BOWTIE2_BUILD_TAG, config, Some(&build_config))?;
    run_tool(config, BOWTIE2_BUILD_TAG, &build_args, ToolStdout::Capture).await?;
    Ok(true)
}

/// Makes sure the hairpin and mature indices exist. With `--bt2-index` nothing is built
/// and the given prefix is used as is.
///
/// # Returns
/// Index prefix of the reference selected for alignment.
pub async fn prepare_bowtie2_indices(config: &RunConfig) -> Result<PathBuf, PipelineError> {
    if config.args.bt2_index.is_none() {
        for kind in ReferenceKind::all() {
            prepare_reference(config, *kind).await?;
        }
    } else {
        debug!("Using prebuilt bowtie2 index {}", config.alignment_index().display());
    }
    Ok(config.alignment_index())
}


/// Aligns trimmed reads with bowtie2 in local mode.
///
/// # Returns
/// Path of the SAM file.
pub async fn align_to_index(
    config: &RunConfig,
    sample: &Sample,
    trimmed: &Path,
    bt2_index_path: &Path,
) -> Result<PathBuf, PipelineError> {
    let sam = sample.sam(config);
    let bt2_config = Bowtie2Config {
        bt2_index_path: bt2_index_path.to_path_buf(),
        reads: trimmed.to_path_buf(),
        sam_out: sam.clone(),
    };
    let bt2_args = generate_cli(BOWTIE2_TAG, config, Some(&bt2_config))?;
    run_tool(config, BOWTIE2_TAG, &bt2_args, ToolStdout::Capture).await?;

    print_banner(sample);
    println!("Alignment is done! The result is in {}", sam.display());
    Ok(sam)
}


/// Writes `samtools flagstat` of the alignment to `Samtools_flagstat/<sample>_report.txt`.
pub async fn flagstat_report(config: &RunConfig, sample: &Sample, sam: &Path) -> Result<PathBuf, PipelineError> {
    print_banner(sample);

    let flagstat_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Flagstat,
        subcommand_fields: vec![(sam.to_string_lossy().into_owned(), None)],
    };
    let flagstat_args = generate_cli(SAMTOOLS_TAG, config, Some(&flagstat_config))?;
    let report = run_tool(config, SAMTOOLS_TAG, &flagstat_args, ToolStdout::Capture).await?;

    let report_path = config.flagstat_report(&sample.name);
    write_output(&report_path, &report)?;
    Ok(report_path)
}


/// SAM -> BAM, sort, index. Each step reads the previous step's file.
pub async fn sam_to_sorted_bam(config: &RunConfig, sample: &Sample, sam: &Path) -> Result<SortedBam, PipelineError> {
    let bam = sample.bam(config);
    let view_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::View,
        subcommand_fields: vec![
            ("-S".to_string(), None),
            ("-b".to_string(), None),
            (sam.to_string_lossy().into_owned(), None),
        ],
    };
    let view_args = generate_cli(SAMTOOLS_TAG, config, Some(&view_config))?;
    run_tool(config, SAMTOOLS_TAG, &view_args, ToolStdout::File(&bam)).await?;

    let sorted_bam = sample.sorted_bam(config);
    let sort_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Sort,
        subcommand_fields: vec![
            ("-o".to_string(), Some(sorted_bam.to_string_lossy().into_owned())),
            (bam.to_string_lossy().into_owned(), None),
        ],
    };
    let sort_args = generate_cli(SAMTOOLS_TAG, config, Some(&sort_config))?;
    run_tool(config, SAMTOOLS_TAG, &sort_args, ToolStdout::Capture).await?;

    let index_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Index,
        subcommand_fields: vec![(sorted_bam.to_string_lossy().into_owned(), None)],
    };
    let index_args = generate_cli(SAMTOOLS_TAG, config, Some(&index_config))?;
    run_tool(config, SAMTOOLS_TAG, &index_args, ToolStdout::Capture).await?;

    let bai = file_path_manipulator(&sorted_bam, None, None, Some(BAI_EXT), ".");
    Ok(SortedBam { bam, sorted_bam, bai })
}


/// Per-miRNA mapped read counts: `samtools idxstats` reduced to name and mapped columns.
pub async fn raw_counts(config: &RunConfig, sample: &Sample, sorted_bam: &Path) -> Result<PathBuf, PipelineError> {
    let idxstats_config = SamtoolsConfig {
        subcommand: SamtoolsSubcommand::Idxstats,
        subcommand_fields: vec![(sorted_bam.to_string_lossy().into_owned(), None)],
    };
    let idxstats_args = generate_cli(SAMTOOLS_TAG, config, Some(&idxstats_config))?;
    let idxstats = run_tool(config, SAMTOOLS_TAG, &idxstats_args, ToolStdout::Capture).await?;

    let counts = idxstats_to_raw_counts(&String::from_utf8_lossy(&idxstats));
    let count_path = config.raw_count_file(&sample.name);
    write_output(&count_path, counts.as_bytes())?;

    print_banner(sample);
    println!("Raw counts file has been generated");
    Ok(count_path)
}


/// Runs all stages for one sample, strictly in order.
///
/// # Returns
/// Path of the raw count file.
pub async fn process_sample(config: &RunConfig, sample: &Sample) -> Result<PathBuf, PipelineError> {
    let trimmed = trim_adapters(config, sample).await?;
    let bt2_index_path = prepare_bowtie2_indices(config).await?;
    let sam = align_to_index(config, sample, &trimmed, &bt2_index_path).await?;
    let report = flagstat_report(config, sample, &sam).await?;
    debug!("Flagstat report: {}", report.display());
    let sorted = sam_to_sorted_bam(config, sample, &sam).await?;
    debug!("Sorted BAM: {} ({})", sorted.sorted_bam.display(), sorted.bai.display());
    raw_counts(config, sample, &sorted.sorted_bam).await
}


/// Processes every read file in argument order. The first failure aborts the run;
/// outputs of finished samples stay on disk and later samples are not started.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    println!("\n-------------\n miRNA raw counts\n-------------\n");
    info!("Base directory: {}", config.base_dir.display());
    info!("Output directory: {}", config.out_dir.display());

    check_versions(&config, &[CUTADAPT_TAG, BOWTIE2_BUILD_TAG, BOWTIE2_TAG, SAMTOOLS_TAG]).await?;

    for fastq_file in &config.args.fastq_files {
        let sample = Sample::new(fastq_file)?;
        info!("Processing sample {} from {}", sample.name, fastq_file);
        let count_path = process_sample(&config, &sample).await?;
        info!("Sample {} counts written to {}", sample.name, count_path.display());
    }

    println!("Finished raw counts for {} sample(s).", config.args.fastq_files.len());
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crate::cli::Arguments;

    fn config(base: &str) -> RunConfig {
        let args = Arguments::parse_from(["mirna-counts", "SCDS12T-R1.fastq"]);
        let mut config = RunConfig::new(args, std::env::temp_dir()).unwrap();
        config.base_dir = PathBuf::from(base);
        config
    }

    #[test]
    fn test_sample_name() -> Result<(), PipelineError> {
        assert_eq!(sample_name("SCDS12T-R1.fastq")?, "12T");
        assert_eq!(sample_name("SCDSsamp1-R1_001-lane2.fastq")?, "samp1");
        assert_eq!(sample_name("reads/SCDSmv3-R1.fastq")?, "mv3");
        Ok(())
    }

    #[test]
    fn test_sample_name_errors() {
        assert!(matches!(sample_name("SCDS12T_R1.fastq"), Err(PipelineError::InvalidSampleName(_))));
        assert!(matches!(sample_name("samp-R1.fastq"), Err(PipelineError::InvalidSampleName(_))));
        assert!(matches!(sample_name("ab-cdefg.fastq"), Err(PipelineError::InvalidSampleName(_))));
        assert!(matches!(sample_name("SCDS-R1.fastq"), Err(PipelineError::InvalidSampleName(_))));
        assert!(matches!(sample_name(""), Err(PipelineError::InvalidSampleName(_))));
    }

    #[test]
    fn test_sample_paths() -> Result<(), PipelineError> {
        let config = config("/data");
        let sample = Sample::new("SCDS12T-R1.fastq")?;
        assert_eq!(sample.raw_reads(&config), PathBuf::from("/data/SCDS12T-R1.fastq"));
        assert_eq!(sample.trimmed_reads(&config), PathBuf::from("/data/trimmed_SCDS12T-R1.fastq"));
        assert_eq!(sample.sam(&config), PathBuf::from("/data/aln_12T.sam"));
        assert_eq!(sample.bam(&config), PathBuf::from("/data/aln_12T.bam"));
        assert_eq!(sample.sorted_bam(&config), PathBuf::from("/data/sorted_aln_12T.bam"));
        Ok(())
    }
}
