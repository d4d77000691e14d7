use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use bpaf::Bpaf;
use vcs_frame::{
  config::MachineConfig,
  console::Console,
  error::{EmuError, EmuResult},
  frame::DisplaySink,
  tia::TickCount,
};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version, generate(cli_args))]
struct CmdLineArgs {
  /// TOML machine configuration
  #[bpaf(long, argument("FILE"))]
  config: Option<PathBuf>,

  /// Frames to run before presenting
  #[bpaf(long, argument("N"), fallback(1))]
  frames: u32,

  /// Run this many ticks instead of whole frames
  #[bpaf(long, argument("TICKS"))]
  ticks: Option<i64>,

  /// Override the configured load address (decimal)
  #[bpaf(long, argument("ADDR"))]
  base: Option<u16>,

  /// PNG file receiving the last frame
  #[bpaf(long, argument("FILE"), fallback(PathBuf::from("frame.png")))]
  output: PathBuf,

  /// Print the console state as JSON after running
  #[bpaf(long, switch)]
  dump_state: bool,

  /// Assembled program binary
  #[bpaf(positional("PROGRAM"))]
  program: PathBuf,
}

struct PngSink<'a> {
  path: &'a Path,
}

impl DisplaySink for PngSink<'_> {
  fn present(&mut self, pixels: &[u8], width: usize, height: usize) -> EmuResult<()> {
    image::save_buffer(self.path, pixels, width as u32, height as u32, image::ColorType::Rgba8)
      .map_err(|e| EmuError::Display(e.to_string()))
  }
}

fn load_config(args: &CmdLineArgs) -> Result<MachineConfig> {
  let mut config = match &args.config {
    Some(path) => MachineConfig::from_file(path)?,
    None => MachineConfig::default(),
  };

  if let Some(base) = args.base {
    config.layout.base = base;
  }

  config.validate()?;
  Ok(config)
}

fn main() -> Result<()> {
  env_logger::init();

  let args = cli_args().run();
  let config = load_config(&args)?;

  let program = fs::read(&args.program)
    .with_context(|| format!("reading {}", args.program.display()))?;

  let mut console = Console::new(config)?;
  console.boot(&program)?;

  match args.ticks {
    Some(ticks) => console.run_ticks(TickCount::try_from(ticks)?)?,
    None => {
      for _ in 0..args.frames {
        console.run_frame()?;
      }
    }
  }

  console.present(&mut PngSink { path: &args.output })?;
  log::info!("wrote {}", args.output.display());

  if args.dump_state {
    println!("{}", console.state_json()?);
  }

  Ok(())
}
