use std::process::ExitCode;

use cfawind::{DebugData, Image};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Computes the canonical frame address for a pc from `.debug_frame`.
#[derive(Debug, Parser)]
struct Args {
    /// Object file to read the call frame information from. Defaults to the
    /// probe itself.
    #[arg(long)]
    binary: Option<std::path::PathBuf>,
    /// Program counter, in hex. Defaults to wherever the probe is right now.
    #[arg(long, value_parser = parse_hex)]
    pc: Option<u64>,
    /// Stack pointer, in hex. Defaults to the probe's own stack pointer.
    #[arg(long, value_parser = parse_hex)]
    sp: Option<u64>,
    /// Location expression to evaluate against the CFA, as hex bytes
    /// (`9c116822`: DW_OP_call_frame_cfa DW_OP_consts -24 DW_OP_plus).
    #[arg(long, value_parser = parse_hex_bytes)]
    expr: Option<HexBytes>,
}

#[derive(Debug, Clone)]
struct HexBytes(Vec<u8>);

fn parse_hex(s: &str) -> Result<u64, String> {
    let digits = s.trim_start_matches("0x");
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex number {s:?}: {e}"))
}

fn parse_hex_bytes(s: &str) -> Result<HexBytes, String> {
    let digits = s.trim_start_matches("0x");
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(format!("expected pairs of hex digits, got {s:?}"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("invalid hex byte in {s:?}: {e}"))
        })
        .collect::<Result<_, _>>()
        .map(HexBytes)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let registry = tracing_subscriber::Registry::default().with(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env_lossy(),
    );

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    registry.with(tree_layer).init();

    let image = match &args.binary {
        Some(path) => Image::open(path),
        None => Image::open_self(),
    };
    let image = match image {
        Ok(image) => image,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let data = match image.debug_data() {
        Ok(data) => data,
        Err(err) => {
            error!("{}: {err}", image.path().display());
            return ExitCode::FAILURE;
        }
    };

    match probe(&data, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err} ({:?})", err.kind());
            ExitCode::FAILURE
        }
    }
}

fn probe(data: &DebugData<'_>, args: &Args) -> cfawind::Result<()> {
    let here = current_frame();
    let pc = args.pc.or(here.map(|(pc, _)| pc)).unwrap_or_default();
    let sp = args.sp.or(here.map(|(_, sp)| sp)).unwrap_or_default();

    info!(
        ".debug_frame is {} bytes, .debug_info is {} bytes",
        data.frame_region().data().len(),
        data.info().len()
    );

    let cfa = data.canonical_frame_address(pc, sp)?;
    match symbol_name(pc) {
        Some(name) => println!("pc={pc:#x} ({name}) sp={sp:#x} cfa={cfa:#x}"),
        None => println!("pc={pc:#x} sp={sp:#x} cfa={cfa:#x}"),
    }

    if let Some(HexBytes(expr)) = &args.expr {
        let address = data.evaluate_location(expr, cfa)?;
        println!("location={address:#x}");
    }
    Ok(())
}

#[cfg(target_arch = "x86_64")]
fn current_frame() -> Option<(u64, u64)> {
    let frame = cfawind::arch::capture();
    Some((frame.pc, frame.sp))
}

#[cfg(not(target_arch = "x86_64"))]
fn current_frame() -> Option<(u64, u64)> {
    None
}

#[cfg(unix)]
fn symbol_name(pc: u64) -> Option<String> {
    cfawind::identify::symbol_name(pc as usize).map(|name| name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn symbol_name(_pc: u64) -> Option<String> {
    None
}
