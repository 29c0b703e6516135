use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chippy::{Assembler, AssemblerOptions, Vm};

const ROM_EXTENSION: &str = "chip";

#[derive(Parser)]
#[command(name = "chippy")]
#[command(about = "Assembler and virtual machine for the chippy ISA")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file into a ROM image
    Assemble {
        #[arg(help = "Assembly source file")]
        source: PathBuf,

        #[arg(help = "Output path without extension; `.chip` is appended")]
        output_base: PathBuf,

        #[arg(short, long, help = "Print the label relocation table as JSON")]
        symbols: bool,

        #[arg(
            short,
            long,
            value_parser = parse_address,
            help = "Load address labels are relocated against (default 0x200)"
        )]
        base: Option<u16>,
    },
    /// Load a ROM image and run it until HLT
    Run {
        #[arg(help = "ROM image")]
        rom: PathBuf,
    },
    /// Print a listing of a ROM image
    Disassemble {
        #[arg(help = "ROM image")]
        rom: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble {
            source,
            output_base,
            symbols,
            base,
        } => assemble(&source, &output_base, symbols, base),
        Commands::Run { rom } => {
            let rom = read_rom(&rom)?;
            let mut vm = Vm::new();
            vm.load(&rom).context("Failed to load ROM")?;
            vm.run().context("Execution failed")?;
            tracing::debug!(steps = vm.steps(), pc = vm.pc(), "halted");
            Ok(())
        }
        Commands::Disassemble { rom } => {
            let rom = read_rom(&rom)?;
            print!("{}", chippy::disassemble(&rom));
            Ok(())
        }
    }
}

fn assemble(source: &Path, output_base: &Path, symbols: bool, base: Option<u16>) -> Result<()> {
    let text = fs::read_to_string(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let mut options = AssemblerOptions::default();
    if let Some(base) = base {
        options.base_address = base;
    }

    let program = Assembler::new()
        .with_options(options)
        .assemble(&text)
        .map_err(|err| anyhow::anyhow!("{}", render_diagnostic(source, &text, &err)))
        .context("Assembly failed")?;

    let output = rom_path(output_base);
    let mut file = fs::File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let written = io::copy(&mut program.encoder(), &mut file)
        .with_context(|| format!("Failed to write output to {}", output.display()))?;
    file.flush()
        .with_context(|| format!("Failed to write output to {}", output.display()))?;

    println!(
        "Assembled {} -> {} ({} instructions, {written} bytes)",
        source.display(),
        output.display(),
        program.instruction_count(),
    );

    if symbols {
        let relocations = program.relocations();
        let labels: serde_json::Map<String, serde_json::Value> = relocations
            .entries()
            .into_iter()
            .map(|(name, address)| (name.to_string(), serde_json::json!(address)))
            .collect();
        let table = serde_json::json!({
            "base": relocations.base(),
            "labels": labels,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&table).context("Failed to serialize symbols")?
        );
    }

    Ok(())
}

/// `<output-base>.chip`, appended rather than replacing any existing extension.
fn rom_path(output_base: &Path) -> PathBuf {
    let mut name = output_base.as_os_str().to_owned();
    name.push(".");
    name.push(ROM_EXTENSION);
    PathBuf::from(name)
}

fn read_rom(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Error message followed by the offending source line and a caret.
fn render_diagnostic(path: &Path, source: &str, err: &chippy::Error) -> String {
    let Some(location) = err.location() else {
        return err.to_string();
    };
    let Some(line) = source.lines().nth(location.line.saturating_sub(1)) else {
        return format!("{}: {err}", path.display());
    };
    let gutter = location.line.to_string().len();
    format!(
        "{}: {err}\n{:gutter$} |\n{} | {line}\n{:gutter$} | {:>column$}",
        path.display(),
        "",
        location.line,
        "",
        "^",
        column = location.column + 1,
    )
}

fn parse_address(text: &str) -> Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{text}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_path_appends_extension() {
        assert_eq!(rom_path(Path::new("out/prog")), PathBuf::from("out/prog.chip"));
        assert_eq!(rom_path(Path::new("prog.v2")), PathBuf::from("prog.v2.chip"));
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x100"), Ok(0x100));
        assert_eq!(parse_address("512"), Ok(512));
        assert!(parse_address("0x10000").is_err());
    }

    #[test]
    fn test_render_diagnostic_points_at_token() {
        let source = "MOV r1, #1\n  JMP .end\n";
        let err = chippy::assemble(source).unwrap_err();
        let rendered = render_diagnostic(Path::new("prog.s"), source, &err);
        assert_eq!(
            rendered,
            "prog.s: line 2, column 6: undefined label `end`\n  |\n2 |   JMP .end\n  |       ^"
        );
    }
}
