use std::path::PathBuf;

use clap::Parser;

/// Chart construction parameters.
///
/// Weights feed the per-face growth cost; see [`crate::charting`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    /// Don't grow charts beyond this 3D surface area. 0 = unbounded.
    pub max_chart_area: f32,
    /// Don't grow charts beyond this boundary length. 0 = unbounded.
    pub max_boundary_length: f32,
    pub normal_deviation_weight: f32,
    pub roundness_weight: f32,
    pub straightness_weight: f32,
    pub normal_seam_weight: f32,
    pub texture_seam_weight: f32,
    /// Faces whose growth cost exceeds this are not annexed.
    pub max_cost: f32,
    /// Number of seed relocation passes over each mesh.
    pub max_iterations: u32,
    /// Treat input UV seams as chart boundaries and reuse the input UVs.
    pub use_input_mesh_uvs: bool,
    /// Flip inconsistently wound faces while growing charts.
    pub fix_winding: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_chart_area: 0.0,
            max_boundary_length: 0.0,
            normal_deviation_weight: 2.0,
            roundness_weight: 0.01,
            straightness_weight: 6.0,
            normal_seam_weight: 4.0,
            texture_seam_weight: 0.5,
            max_cost: 2.0,
            max_iterations: 1,
            use_input_mesh_uvs: false,
            fix_winding: false,
        }
    }
}

/// Atlas packing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PackConfig {
    /// Largest chart extent in texels. Bigger charts are scaled down. 0 = unconstrained.
    pub max_chart_size: u32,
    /// Align chart positions and sizes to 4x4 texel blocks.
    pub block_align: bool,
    /// Texels per 3D unit. 0 = derived from the total chart area.
    pub texels_per_unit: f32,
    /// Page width and height in texels. 0 = a single auto-sized page.
    pub resolution: u32,
    /// Empty texels between charts.
    pub padding: u32,
    /// Reserve one more texel around each chart for bilinear sampling.
    pub bilinear: bool,
    /// Evaluate every block-aligned column instead of skyline segment starts only.
    pub brute_force: bool,
    /// Allow 90 degree rotation during placement.
    pub rotate_charts: bool,
    /// Rotate each chart to its minimum-area bounding rectangle before packing.
    pub rotate_charts_to_axis: bool,
    /// Render a diagnostic image per page.
    pub create_image: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            max_chart_size: 0,
            block_align: false,
            texels_per_unit: 0.0,
            resolution: 0,
            padding: 1,
            bilinear: true,
            brute_force: false,
            rotate_charts: true,
            rotate_charts_to_axis: true,
            create_image: false,
        }
    }
}

/// Fully resolved command-line run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub chart: ChartConfig,
    pub pack: PackConfig,
    /// Treat every object as already unwrapped.
    pub pre_unwrapped: bool,
    pub verbose: bool,
    pub threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            chart: ChartConfig::default(),
            pack: PackConfig::default(),
            pre_unwrapped: false,
            verbose: false,
            threads: None,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "uv-atlas",
    about = "Chart, unwrap and pack OBJ meshes into a shared UV atlas",
    version
)]
pub struct CliArgs {
    /// Input OBJ file
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Keep the input UVs: every object is packed as pre-unwrapped islands
    #[arg(long)]
    pub pre_unwrapped: bool,

    /// Max chart surface area (0 = unbounded)
    #[arg(long, default_value_t = 0.0)]
    pub max_chart_area: f32,

    /// Max chart boundary length (0 = unbounded)
    #[arg(long, default_value_t = 0.0)]
    pub max_boundary_length: f32,

    /// Cost weight of deviating from the chart's average normal
    #[arg(long, default_value_t = 2.0)]
    pub normal_deviation_weight: f32,

    /// Cost weight of making the chart less round
    #[arg(long, default_value_t = 0.01)]
    pub roundness_weight: f32,

    /// Cost weight of a jagged chart boundary
    #[arg(long, default_value_t = 6.0)]
    pub straightness_weight: f32,

    /// Cost weight of crossing a normal seam
    #[arg(long, default_value_t = 4.0)]
    pub normal_seam_weight: f32,

    /// Cost weight of crossing a texture seam
    #[arg(long, default_value_t = 0.5)]
    pub texture_seam_weight: f32,

    /// Max chart growth cost
    #[arg(long, default_value_t = 2.0)]
    pub max_cost: f32,

    /// Chart seed relocation passes
    #[arg(long, default_value_t = 1)]
    pub max_iterations: u32,

    /// Use input UVs as chart hints
    #[arg(long)]
    pub use_input_uvs: bool,

    /// Flip inconsistently wound faces
    #[arg(long)]
    pub fix_winding: bool,

    /// Page resolution in texels (0 = auto-size)
    #[arg(short = 'r', long, default_value_t = 0)]
    pub resolution: u32,

    /// Texels per 3D unit (0 = auto)
    #[arg(long, default_value_t = 0.0)]
    pub texels_per_unit: f32,

    /// Padding between charts in texels
    #[arg(long, default_value_t = 1)]
    pub padding: u32,

    /// Max chart extent in texels (0 = unconstrained)
    #[arg(long, default_value_t = 0)]
    pub max_chart_size: u32,

    /// Align charts to 4x4 texel blocks
    #[arg(long)]
    pub block_align: bool,

    /// Exhaustive placement search
    #[arg(long)]
    pub brute_force: bool,

    /// Don't reserve an extra texel of margin for bilinear filtering
    #[arg(long)]
    pub no_bilinear: bool,

    /// Disable 90 degree chart rotation during placement
    #[arg(long)]
    pub no_rotate: bool,

    /// Keep each chart's unwrap orientation instead of aligning it to the axes
    #[arg(long)]
    pub no_rotate_to_axis: bool,

    /// Write a diagnostic PNG per page
    #[arg(long)]
    pub images: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for RunConfig {
    fn from(args: CliArgs) -> Self {
        RunConfig {
            input: args.input,
            output: args.output,
            chart: ChartConfig {
                max_chart_area: args.max_chart_area,
                max_boundary_length: args.max_boundary_length,
                normal_deviation_weight: args.normal_deviation_weight,
                roundness_weight: args.roundness_weight,
                straightness_weight: args.straightness_weight,
                normal_seam_weight: args.normal_seam_weight,
                texture_seam_weight: args.texture_seam_weight,
                max_cost: args.max_cost,
                max_iterations: args.max_iterations,
                use_input_mesh_uvs: args.use_input_uvs,
                fix_winding: args.fix_winding,
            },
            pack: PackConfig {
                max_chart_size: args.max_chart_size,
                block_align: args.block_align,
                texels_per_unit: args.texels_per_unit,
                resolution: args.resolution,
                padding: args.padding,
                bilinear: !args.no_bilinear,
                brute_force: args.brute_force,
                rotate_charts: !args.no_rotate,
                rotate_charts_to_axis: !args.no_rotate_to_axis,
                create_image: args.images,
            },
            pre_unwrapped: args.pre_unwrapped,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}
