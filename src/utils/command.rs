//! Functions and structs for creating command-line arguments and running external tools

use std::any::Any;
use std::path::Path;
use std::process::Stdio;
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use tokio::process::{Child, Command};
use crate::config::defs::{PipelineError, RunConfig, CUTADAPT_TAG, BOWTIE2_TAG, BOWTIE2_BUILD_TAG, SAMTOOLS_TAG, TOOL_VERSIONS};


pub mod cutadapt {
    use std::any::Any;
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use crate::config::defs::{RunConfig, ADAPTER_3P, ADAPTER_5P, CUTADAPT_ERROR_RATE, CUTADAPT_MIN_OVERLAP, CUTADAPT_MIN_LENGTH};

    #[derive(Debug)]
    pub struct CutadaptConfig {
        pub input: PathBuf,
        pub output: PathBuf,
    }

    pub fn arg_generator(_config: &RunConfig, additional_config: Option<&dyn Any>) -> Result<Vec<String>> {
        let cutadapt_config = additional_config
            .and_then(|c| c.downcast_ref::<CutadaptConfig>())
            .ok_or_else(|| anyhow!("cutadapt requires a CutadaptConfig"))?;

        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-f".to_string());
        args_vec.push("fastq".to_string());
        args_vec.push("-a".to_string());
        args_vec.push(ADAPTER_3P.to_string());
        args_vec.push("-g".to_string());
        args_vec.push(ADAPTER_5P.to_string());
        args_vec.push("-e".to_string());
        args_vec.push(CUTADAPT_ERROR_RATE.to_string());
        args_vec.push("-O".to_string());
        args_vec.push(CUTADAPT_MIN_OVERLAP.to_string());
        args_vec.push("-m".to_string());
        args_vec.push(CUTADAPT_MIN_LENGTH.to_string());
        args_vec.push(cutadapt_config.input.to_string_lossy().into_owned());
        args_vec.push("-o".to_string());
        args_vec.push(cutadapt_config.output.to_string_lossy().into_owned());
        Ok(args_vec)
    }
}

pub mod bowtie2 {
    use std::any::Any;
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use crate::config::defs::{RunConfig, BOWTIE2_EFFORT, BOWTIE2_RESEED, BOWTIE2_SEED_MISMATCHES, BOWTIE2_SEED_LENGTH, BOWTIE2_SEED_INTERVAL};

    #[derive(Debug)]
    pub struct Bowtie2Config {
        pub bt2_index_path: PathBuf,
        pub reads: PathBuf,
        pub sam_out: PathBuf,
    }

    /// Sensitive local alignment tuned for ~22 nt reads.
    pub fn arg_generator(config: &RunConfig, additional_config: Option<&dyn Any>) -> Result<Vec<String>> {
        let bt2_config = additional_config
            .and_then(|c| c.downcast_ref::<Bowtie2Config>())
            .ok_or_else(|| anyhow!("bowtie2 requires a Bowtie2Config"))?;

        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-q".to_string());
        args_vec.push("--phred33".to_string());
        args_vec.push("-p".to_string());
        args_vec.push(config.args.threads.to_string());
        args_vec.push("-D".to_string());
        args_vec.push(BOWTIE2_EFFORT.to_string());
        args_vec.push("--local".to_string());
        args_vec.push("-R".to_string());
        args_vec.push(BOWTIE2_RESEED.to_string());
        args_vec.push("-N".to_string());
        args_vec.push(BOWTIE2_SEED_MISMATCHES.to_string());
        args_vec.push("-L".to_string());
        args_vec.push(BOWTIE2_SEED_LENGTH.to_string());
        args_vec.push("-i".to_string());
        args_vec.push(BOWTIE2_SEED_INTERVAL.to_string());
        args_vec.push("-x".to_string());
        args_vec.push(bt2_config.bt2_index_path.to_string_lossy().into_owned());
        args_vec.push(bt2_config.reads.to_string_lossy().into_owned());
        args_vec.push("-S".to_string());
        args_vec.push(bt2_config.sam_out.to_string_lossy().into_owned());
        Ok(args_vec)
    }
}

pub mod bowtie2_build {
    use std::any::Any;
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use crate::config::defs::RunConfig;

    #[derive(Debug)]
    pub struct Bowtie2BuildConfig {
        pub fasta: PathBuf,
        pub bt2_index_path: PathBuf,
    }

    pub fn arg_generator(_config: &RunConfig, additional_config: Option<&dyn Any>) -> Result<Vec<String>> {
        let build_config = additional_config
            .and_then(|c| c.downcast_ref::<Bowtie2BuildConfig>())
            .ok_or_else(|| anyhow!("bowtie2-build requires a Bowtie2BuildConfig"))?;

        Ok(vec![
            build_config.fasta.to_string_lossy().into_owned(),
            build_config.bt2_index_path.to_string_lossy().into_owned(),
        ])
    }
}

pub mod samtools {
    use std::any::Any;
    use anyhow::{anyhow, Result};
    use crate::config::defs::{RunConfig, SamtoolsSubcommand};

    /// `subcommand_fields` keeps insertion order: a `(flag, Some(value))` pair emits both,
    /// `(arg, None)` emits a bare flag or positional.
    #[derive(Debug)]
    pub struct SamtoolsConfig {
        pub subcommand: SamtoolsSubcommand,
        pub subcommand_fields: Vec<(String, Option<String>)>,
    }

    pub fn arg_generator(_config: &RunConfig, additional_config: Option<&dyn Any>) -> Result<Vec<String>> {
        let samtools_config = additional_config
            .and_then(|c| c.downcast_ref::<SamtoolsConfig>())
            .ok_or_else(|| anyhow!("samtools requires a SamtoolsConfig"))?;

        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push(samtools_config.subcommand.as_str().to_string());
        for (key, value) in &samtools_config.subcommand_fields {
            args_vec.push(key.clone());
            if let Some(v) = value {
                args_vec.push(v.clone());
            }
        }
        Ok(args_vec)
    }
}


pub fn generate_cli(tool: &str, config: &RunConfig, additional_config: Option<&dyn Any>) -> Result<Vec<String>> {
    let cmd = match tool {
        CUTADAPT_TAG => cutadapt::arg_generator(config, additional_config)?,
        BOWTIE2_TAG => bowtie2::arg_generator(config, additional_config)?,
        BOWTIE2_BUILD_TAG => bowtie2_build::arg_generator(config, additional_config)?,
        SAMTOOLS_TAG => samtools::arg_generator(config, additional_config)?,
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };

    Ok(cmd)
}


/// Where a tool's standard output goes. Standard error is always inherited.
#[derive(Debug, Clone, Copy)]
pub enum ToolStdout<'a> {
    Capture,
    File(&'a Path),
}

/// Starts a tool with stdin closed, stderr inherited and stdout piped or redirected.
///
/// # Arguments
///
/// * `config` - RunConfig, used to resolve the tool's executable.
/// * `tool` - Tool tag (e.g. SAMTOOLS_TAG).
/// * `args` - Full argument vector.
/// * `stdout` - Capture stdout or redirect it to a file.
///
/// # Returns
/// The running child. A spawn failure is ToolNotFound.
pub fn spawn_tool(
    config: &RunConfig,
    tool: &str,
    args: &[String],
    stdout: ToolStdout<'_>,
) -> Result<Child, PipelineError> {
    let exe = config.tool_exe(tool);
    debug!("{} {}", exe, args.join(" "));

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit());
    match stdout {
        ToolStdout::Capture => {
            cmd.stdout(Stdio::piped());
        }
        ToolStdout::File(path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| PipelineError::IOError(format!("Cannot create {}: {}", path.display(), e)))?;
            cmd.stdout(Stdio::from(file));
        }
    }

    cmd.spawn().map_err(|e| PipelineError::ToolNotFound {
        tool: exe.to_string(),
        error: e.to_string(),
    })
}

/// Runs a tool to completion.
///
/// # Returns
/// Captured stdout (empty when redirected). A spawn failure or a non-zero exit is an error.
pub async fn run_tool(
    config: &RunConfig,
    tool: &str,
    args: &[String],
    stdout: ToolStdout<'_>,
) -> Result<Vec<u8>, PipelineError> {
    let child = spawn_tool(config, tool, args, stdout)?;
    let wait_error = |e: std::io::Error| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!("failed to wait for process: {}", e),
    };

    // Only a piped stdout is read back; stderr stays inherited.
    let (status, captured) = match stdout {
        ToolStdout::Capture => {
            let output = child.wait_with_output().await.map_err(wait_error)?;
            (output.status, output.stdout)
        }
        ToolStdout::File(_) => {
            let mut child = child;
            (child.wait().await.map_err(wait_error)?, Vec::new())
        }
    };

    if !status.success() {
        return Err(PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: format!("exited with {}", status),
        });
    }
    Ok(captured)
}


/// Version token of a `--version` banner: the last word of its first line.
/// Covers `samtools 1.17`, `4.4` (cutadapt) and `/usr/bin/bowtie2-align-s version 2.5.1`.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .last()
        .map(|v| v.trim_start_matches('v').to_string())
}

/// (major, minor) of a dotted version string.
pub fn version_tuple(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts
        .next()
        .map(|m| m.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    Some((major, minor))
}

pub async fn check_version(config: &RunConfig, tool: &str) -> Result<String, PipelineError> {
    let stdout = run_tool(config, tool, &["--version".to_string()], ToolStdout::Capture).await?;
    let text = String::from_utf8_lossy(&stdout);
    let version = parse_version(&text).ok_or_else(|| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: "no output from --version".to_string(),
    })?;

    if let (Some(found), Some(minimum)) = (version_tuple(&version), TOOL_VERSIONS.get(tool)) {
        if found < *minimum {
            warn!("{} version {} is older than the tested {}.{}", tool, version, minimum.0, minimum.1);
        }
    }
    Ok(version)
}

/// Confirms every tool can be spawned before any sample is touched.
pub async fn check_versions(config: &RunConfig, tools: &[&str]) -> Result<(), PipelineError> {
    for tool in tools {
        let version = check_version(config, tool).await?;
        info!("{}: {}", tool, version);
    }
    Ok(())
}
