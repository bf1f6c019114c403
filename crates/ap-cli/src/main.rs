//! astroprof CLI

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ap_core::{DataSource, FieldInfo};
use ap_fields::{ColumnSource, MovingMeshGas};
use ap_profile::{
    DepositGrid, DepositKernel, Domain, LogScale, Profile, ProfileRequest, create_profile, deposit,
};
use ap_viz::{ArtifactMeta, PhasePlot, PhasePlotOptions, ProfilePlot, requested_field_info};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "astroprof")]
#[command(about = "astroprof - binned profiles and phase diagrams of simulation data")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 1D profile of one or more fields against a binning field
    Profile(ProfileArgs),
    /// 2D phase diagram of one or more fields
    Phase(PhaseArgs),
    /// Deposit a particle field onto a uniform mesh
    Deposit(DepositArgs),
}

#[derive(Args)]
struct ProfileArgs {
    /// Input column file (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Request file (JSON `ProfileRequest`); replaces the binning flags.
    #[arg(long, conflicts_with_all = ["x", "y"])]
    config: Option<PathBuf>,

    /// Binning field
    #[arg(long, required_unless_present = "config")]
    x: Option<String>,

    /// Profiled fields
    #[arg(long, num_args = 1.., required_unless_present = "config")]
    y: Vec<String>,

    /// Weight field for weighted means
    #[arg(long, default_value = "cell_mass", conflicts_with = "no_weight")]
    weight: String,

    /// Plot per-bin sums instead of weighted means
    #[arg(long)]
    no_weight: bool,

    /// Number of bins
    #[arg(long, default_value = "64")]
    n_bins: usize,

    /// Plot cumulative sums
    #[arg(long)]
    accumulation: bool,

    /// Logarithmic bins along x
    #[arg(long, conflicts_with = "x_linear")]
    x_log: bool,

    /// Linear bins along x
    #[arg(long)]
    x_linear: bool,

    /// Explicit x range
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_hyphen_values = true)]
    range: Option<Vec<f64>>,

    /// Aggregate in parallel chunks of this many elements
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Output file (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PhaseArgs {
    /// Input column file (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// X binning field
    #[arg(long)]
    x: String,

    /// Y binning field
    #[arg(long)]
    y: String,

    /// Colour-mapped fields
    #[arg(long, num_args = 1.., required = true)]
    z: Vec<String>,

    /// Bins along x
    #[arg(long, default_value = "128")]
    x_bins: usize,

    /// Bins along y
    #[arg(long, default_value = "128")]
    y_bins: usize,

    /// Weight field for weighted means
    #[arg(long, default_value = "cell_mass", conflicts_with = "no_weight")]
    weight: String,

    /// Plot per-bin sums instead of weighted means
    #[arg(long)]
    no_weight: bool,

    /// Colormap for every panel
    #[arg(long)]
    cmap: Option<String>,

    /// Output file (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct DepositArgs {
    /// Input column file (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Cells per axis
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"], required = true)]
    dims: Vec<usize>,

    /// Grid lower corner
    #[arg(long, num_args = 3, allow_hyphen_values = true, required = true)]
    left: Vec<f64>,

    /// Grid upper corner
    #[arg(long, num_args = 3, allow_hyphen_values = true, required = true)]
    right: Vec<f64>,

    /// Field to deposit
    #[arg(long)]
    field: String,

    /// Position vector field; components are read as `<name>_0 .. <name>_2`.
    #[arg(long, default_value = "Coordinates")]
    positions: String,

    /// Deposition kernel
    #[arg(long, value_enum, default_value = "ngp")]
    kernel: KernelArg,

    /// Domain lower corner
    #[arg(long, num_args = 3, allow_hyphen_values = true, default_values_t = [0.0, 0.0, 0.0])]
    domain_left: Vec<f64>,

    /// Domain upper corner
    #[arg(long, num_args = 3, allow_hyphen_values = true, default_values_t = [1.0, 1.0, 1.0])]
    domain_right: Vec<f64>,

    /// Largest allowed ratio of the widest to the narrowest cell dimension
    #[arg(long, default_value = "64")]
    max_cell_aspect: f64,

    /// Output file (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KernelArg {
    /// Nearest grid point
    Ngp,
    /// Cloud in cell
    Cic,
}

impl From<KernelArg> for DepositKernel {
    fn from(k: KernelArg) -> Self {
        match k {
            KernelArg::Ngp => DepositKernel::NearestGridPoint,
            KernelArg::Cic => DepositKernel::CloudInCell,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Profile(args) => cmd_profile(&args),
        Commands::Phase(args) => cmd_phase(&args),
        Commands::Deposit(args) => cmd_deposit(&args),
    }
}

fn load_source(path: &Path) -> Result<ColumnSource> {
    let mut src = ColumnSource::from_path(path)
        .with_context(|| format!("failed to load column file {}", path.display()))?;
    let summary = MovingMeshGas::default().register(src.registry_mut())?;
    tracing::info!(
        elements = src.len(),
        derived = summary.registered.len(),
        species = summary.species.len(),
        "column file loaded"
    );
    Ok(src)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn weight_field(weight: &str, no_weight: bool) -> Option<String> {
    if no_weight { None } else { Some(weight.to_string()) }
}

fn profile_request(args: &ProfileArgs) -> Result<ProfileRequest> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("invalid request file {}", path.display()));
    }

    let x = args.x.as_deref().context("--x is required without --config")?;
    let mut request = ProfileRequest::new([x], args.y.iter().cloned())
        .n_bins(args.n_bins)
        .accumulate(args.accumulation);
    request.weight_field = weight_field(&args.weight, args.no_weight);
    if args.x_log || args.x_linear {
        request.log_scale = LogScale::PerField(BTreeMap::from([(x.to_string(), args.x_log)]));
    }
    if let Some(range) = &args.range {
        request = request.range(x, range[0], range[1]);
    }
    if let Some(n) = args.chunk_size {
        request = request.chunk_size(n);
    }
    Ok(request)
}

fn field_infos<'a>(src: &ColumnSource, names: impl Iterator<Item = &'a String>) -> Vec<FieldInfo> {
    names.filter_map(|name| requested_field_info(src, name)).collect()
}

fn cmd_profile(args: &ProfileArgs) -> Result<()> {
    let src = load_source(&args.input)?;
    let request = profile_request(args)?;
    let profile = create_profile(&src, &request).context("failed to build profile")?;
    tracing::info!(
        bins = profile.n_bins(),
        dropped = profile.dropped(),
        weight = ?profile.weight_field(),
        "profile built"
    );

    let infos = field_infos(&src, request.bin_fields.iter().chain(&request.fields));
    let value = if profile.ndim() == 1 {
        let plot = ProfilePlot::from_profiles(vec![profile], None, None)?;
        let mut plot = infos.into_iter().fold(plot, ProfilePlot::with_field_info);
        serde_json::to_value(plot.artifact()?)?
    } else {
        let mut plot = phase_plot(profile, infos)?;
        serde_json::to_value(plot.artifact()?)?
    };
    write_json(args.output.as_ref(), value)
}

fn phase_plot(profile: Profile, infos: Vec<FieldInfo>) -> Result<PhasePlot> {
    let plot = PhasePlot::from_profile(profile)?;
    Ok(infos.into_iter().fold(plot, PhasePlot::with_field_info))
}

fn cmd_phase(args: &PhaseArgs) -> Result<()> {
    let src = load_source(&args.input)?;
    let options = PhasePlotOptions {
        x_bins: args.x_bins,
        y_bins: args.y_bins,
        weight_field: weight_field(&args.weight, args.no_weight),
    };
    let mut plot = PhasePlot::new(&src, &args.x, &args.y, args.z.iter().cloned(), options)
        .context("failed to build phase plot")?;
    if let Some(cmap) = &args.cmap {
        for z in &args.z {
            plot.set_cmap(z, cmap.as_str())?;
        }
    }
    tracing::info!(
        x_bins = args.x_bins,
        y_bins = args.y_bins,
        dropped = plot.profile().dropped(),
        "phase plot built"
    );
    write_json(args.output.as_ref(), serde_json::to_value(plot.artifact()?)?)
}

#[derive(Debug, Serialize)]
struct DepositArtifact {
    schema_version: String,
    meta: ArtifactMeta,
    field: String,
    kernel: DepositKernel,
    grid: DepositGrid,
    total: f64,
    values: Vec<f64>,
}

fn triple<T: Copy>(values: &[T], flag: &str) -> Result<[T; 3]> {
    values.try_into().map_err(|_| anyhow::anyhow!("{flag} takes exactly 3 values"))
}

fn cmd_deposit(args: &DepositArgs) -> Result<()> {
    let src = load_source(&args.input)?;
    let domain = Domain::new(
        triple(&args.domain_left, "--domain-left")?,
        triple(&args.domain_right, "--domain-right")?,
    )
    .with_max_cell_aspect(args.max_cell_aspect);
    let grid = DepositGrid::new(
        triple(&args.left, "--left")?,
        triple(&args.right, "--right")?,
        triple(&args.dims, "--dims")?,
        &domain,
    )?;

    let columns = (0..3)
        .map(|a| src.field(&format!("{}_{a}", args.positions)))
        .collect::<ap_core::Result<Vec<_>>>()
        .with_context(|| format!("missing position components for '{}'", args.positions))?;
    let values = src.field(&args.field)?;
    let kernel = DepositKernel::from(args.kernel);
    let deposited = deposit(&grid, [&*columns[0], &*columns[1], &*columns[2]], &values, kernel)?;
    let total: f64 = deposited.iter().sum();
    tracing::info!(cells = grid.n_cells(), total, "deposit done");

    let artifact = DepositArtifact {
        schema_version: "astroprof_deposit_v1".to_string(),
        meta: ArtifactMeta::now()?,
        field: args.field.clone(),
        kernel,
        grid,
        total,
        values: deposited,
    };
    write_json(args.output.as_ref(), serde_json::to_value(artifact)?)
}
