use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use media_toolkit::camera::synthetic::SyntheticHost;
use media_toolkit::camera::{AspectRatio, CameraLifecycle, MediaHost, Orientation, StillFormat};
use media_toolkit::capability::Capabilities;
use media_toolkit::codec::barcode::{self, Rotation, Symbology};
use media_toolkit::codec::bulk::{self, BulkOutcome};
use media_toolkit::codec::{OutputFormat, qr, scan};
use media_toolkit::config::{QualityPreset, ToolkitConfig, parse_size};
use media_toolkit::export::{Asset, archive_asset};
use media_toolkit::imagegen::ImageGenClient;
use media_toolkit::imaging::compress::{self, format_bytes};
use media_toolkit::imaging::crop::{
    self, AspectPreset, CropRequest, CropShape, Flip, PixelCrop, QuarterTurn,
};
use media_toolkit::imaging::{load_image, size_of};
use media_toolkit::session::CaptureSession;
use media_toolkit::error::{HasRecoverySuggestion, ToolkitError, classify};
use media_toolkit::{proxy, run_blocking};

/// Camera capture, barcode and QR tools, image compression and cropping,
/// and an image-generation proxy.
#[derive(Parser, Debug)]
#[command(name = "toolkit")]
#[command(about = "📷 Camera, barcode, QR and image tools from the command line")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, help = "Path to a JSON config file")]
    config: Option<PathBuf>,

    /// Use the synthetic camera even when a native backend is compiled in
    #[arg(long, global = true, help = "Use a synthetic test camera instead of real hardware")]
    synthetic: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List video inputs
    Devices,
    /// Capture a still from a camera
    Capture(CaptureArgs),
    /// Encode text as a QR code
    Qr(QrArgs),
    /// Encode every entry of a JSON array as a QR code
    QrBulk(BulkArgs),
    /// Encode text as a barcode
    Barcode(BarcodeArgs),
    /// Encode every entry of a JSON array as a barcode
    BarcodeBulk(BarcodeBulkArgs),
    /// Decode a barcode or QR code from a file, URL or camera
    Scan(ScanArgs),
    /// Compress images to a size budget
    Compress(CompressArgs),
    /// Crop, rotate and flip an image
    Crop(CropArgs),
    /// Generate an image from a prompt through the proxy
    Generate(GenerateArgs),
    /// Run the image-generation proxy
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct CaptureArgs {
    #[arg(short, long, default_value = ".", help = "Directory to write the still into")]
    out: PathBuf,
    #[arg(long, help = "Device id (see `toolkit devices`)")]
    device: Option<String>,
    #[arg(long, help = "landscape or portrait")]
    orientation: Option<Orientation>,
    #[arg(long, help = "Displayed aspect ratio, e.g. 4:3")]
    aspect: Option<AspectRatio>,
    #[arg(long, help = "png or jpeg")]
    format: Option<StillFormat>,
    #[arg(long, help = "Also hand the still to the share target")]
    share: bool,
}

#[derive(Args, Debug)]
struct QrArgs {
    text: String,
    #[arg(short, long, help = "Output file; defaults to qrcode-<millis>.<ext>")]
    out: Option<PathBuf>,
    #[arg(long, default_value = "png", help = "png or svg")]
    format: OutputFormat,
    #[arg(long, help = "Image width in pixels")]
    width: Option<u32>,
    #[arg(long, help = "Quiet zone in modules")]
    margin: Option<u32>,
    #[arg(long, help = "Error correction level: L, M, Q, H")]
    ec: Option<qr::QrErrorCorrection>,
}

#[derive(Args, Debug)]
struct BulkArgs {
    #[arg(short, long, help = "JSON array file, or - for stdin")]
    input: PathBuf,
    #[arg(short, long, default_value = ".", help = "Directory for the zip archive")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct BarcodeArgs {
    text: String,
    #[arg(short = 't', long = "type", help = "Symbology, e.g. code128, ean13, qrcode")]
    symbology: Option<Symbology>,
    #[arg(short, long, help = "Output file; defaults to <type>-<text>.<ext>")]
    out: Option<PathBuf>,
    #[arg(long, default_value = "png", help = "png or svg")]
    format: OutputFormat,
    #[arg(long)]
    scale: Option<u32>,
    #[arg(long, help = "Bar height in millimetres (1D only)")]
    height: Option<f32>,
    #[arg(long, help = "Print the text under the bars (SVG)")]
    include_text: bool,
    #[arg(long, help = "N, R, I or L")]
    rotate: Option<Rotation>,
}

#[derive(Args, Debug)]
struct BarcodeBulkArgs {
    #[command(flatten)]
    bulk: BulkArgs,
    #[arg(short = 't', long = "type", help = "Symbology for every entry")]
    symbology: Option<Symbology>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[arg(long, help = "Decode an image file")]
    file: Option<PathBuf>,
    #[arg(long, conflicts_with = "file", help = "Decode an image URL")]
    url: Option<String>,
    #[arg(long, conflicts_with_all = ["file", "url"], help = "Decode from the camera")]
    camera: bool,
}

#[derive(Args, Debug)]
struct CompressArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(short, long, default_value = ".", help = "Output directory")]
    out: PathBuf,
    #[arg(long, help = "Size budget in MB")]
    max_size_mb: Option<f64>,
    #[arg(long, help = "Longest side in pixels")]
    max_side: Option<u32>,
    #[arg(short, long, help = "Starting quality: low, medium, high, max")]
    quality: Option<QualityPreset>,
    #[arg(long, help = "Never downscale")]
    keep_resolution: bool,
    #[arg(long, help = "Write one zip instead of separate files")]
    zip: bool,
}

#[derive(Args, Debug)]
struct CropArgs {
    file: PathBuf,
    #[arg(short, long, default_value = ".", help = "Output directory")]
    out: PathBuf,
    #[arg(long, default_value = "16:9", help = "16:9, 4:3, 1:1 or free (used without --rect)")]
    aspect: AspectPreset,
    #[arg(long, help = "Crop rectangle x,y,w,h in displayed pixels")]
    rect: Option<String>,
    #[arg(long, help = "Size the image was displayed at, e.g. 800x600")]
    displayed: Option<String>,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true, help = "Rotation in degrees (multiples of 90)")]
    rotate: i32,
    #[arg(long)]
    flip_horizontal: bool,
    #[arg(long)]
    flip_vertical: bool,
    #[arg(long, default_value = "rect", help = "rect or circle")]
    shape: CropShape,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    prompt: String,
    #[arg(long, default_value = "http://127.0.0.1:8787", help = "Proxy origin")]
    proxy: String,
    #[arg(short, long, default_value = ".", help = "Output directory")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, help = "Listen address, e.g. 127.0.0.1:8787")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "media_toolkit=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ToolkitConfig::load(cli.config.as_deref())?;
    config.apply_process_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let outcome = match cli.command {
        Command::Devices => devices(&config, cli.synthetic).await,
        Command::Capture(args) => capture(config, cli.synthetic, args).await,
        Command::Qr(args) => qr_single(&config, args).await,
        Command::QrBulk(args) => qr_bulk(&config, args).await,
        Command::Barcode(args) => barcode_single(&config, args).await,
        Command::BarcodeBulk(args) => barcode_bulk(&config, args).await,
        Command::Scan(args) => scan_cmd(&config, cli.synthetic, args).await,
        Command::Compress(args) => compress_cmd(&config, args).await,
        Command::Crop(args) => crop_cmd(args).await,
        Command::Generate(args) => generate(args).await,
        Command::Serve(args) => serve(config, args).await,
    };

    // Toolkit errors get their user-facing message and a classified exit status.
    if let Err(err) = &outcome {
        if let Some(error) = err.downcast_ref::<ToolkitError>() {
            tracing::debug!(category = error.category(), priority = classify::priority(error), error = %error, "Command failed");
            eprintln!("Error: {}", error.user_message());
            if let Some(suggestion) = error.recovery_suggestion() {
                eprintln!("Hint: {suggestion}");
            }
            std::process::exit(classify::exit_code(error));
        }
    }
    outcome
}

fn media_host(synthetic: bool) -> Arc<dyn MediaHost> {
    #[cfg(feature = "native-camera")]
    if !synthetic {
        return Arc::new(media_toolkit::camera::native::NativeHost::default());
    }
    let _ = synthetic;
    Arc::new(SyntheticHost::single())
}

async fn devices(config: &ToolkitConfig, synthetic: bool) -> Result<()> {
    let mut camera = CameraLifecycle::new(media_host(synthetic), config.camera.clone())?;
    let devices = camera.list_devices().await?;
    for (i, device) in devices.iter().enumerate() {
        println!("{}\t{}", device.id, device.display_label(i));
    }
    Ok(())
}

async fn capture(mut config: ToolkitConfig, synthetic: bool, args: CaptureArgs) -> Result<()> {
    if let Some(device) = args.device {
        config.camera.device_id = Some(device);
    }
    if let Some(orientation) = args.orientation {
        config.camera.orientation = orientation;
    }
    if args.aspect.is_some() {
        config.camera.aspect = args.aspect;
    }
    if let Some(format) = args.format {
        config.camera.still_format = format;
    }

    let mut session = CaptureSession::builder()
        .with_host(media_host(synthetic))
        .with_camera_config(config.camera)
        .with_capabilities(Capabilities::detect())
        .build()?;
    session.open().await?;
    session.capture().await?;

    let path = session.download(&args.out).await?;
    if let Some(still) = session.captured() {
        println!("Captured {}x{} from {}", still.size.w, still.size.h, still.device_id);
    }
    println!("Saved {}", path.display());
    if args.share {
        println!("Shared to {}", session.share().await?);
    }
    session.close();
    Ok(())
}

async fn qr_single(config: &ToolkitConfig, args: QrArgs) -> Result<()> {
    let mut options = config.qr.to_qr_options(false);
    if let Some(width) = args.width {
        options.width = width;
    }
    if let Some(margin) = args.margin {
        options.margin = margin;
    }
    if let Some(ec) = args.ec {
        options.error_correction = ec;
    }
    let format = args.format;
    let text = args.text;
    let image = run_blocking("encode qr", move || qr::encode_qr(&text, &options, format)).await?;

    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(media_toolkit::export::timestamped_name("qrcode", image.extension())));
    write_file(&path, &image.bytes).await?;
    println!("Wrote {} ({}x{})", path.display(), image.size.w, image.size.h);
    Ok(())
}

async fn qr_bulk(config: &ToolkitConfig, args: BulkArgs) -> Result<()> {
    let input = read_input(&args.input).await?;
    let outcomes = bulk::generate_qr_bulk(&input, &config.qr.to_qr_options(true)).await?;
    write_bulk(outcomes, "qrcodes", &args.out).await
}

async fn barcode_single(config: &ToolkitConfig, args: BarcodeArgs) -> Result<()> {
    let mut options = config.barcode.to_barcode_options(false);
    if let Some(symbology) = args.symbology {
        options.symbology = symbology;
    }
    if let Some(scale) = args.scale {
        options.scale = scale;
    }
    if let Some(height) = args.height {
        options.height = height;
    }
    if let Some(rotate) = args.rotate {
        options.rotate = rotate;
    }
    options.include_text |= args.include_text;

    let format = args.format;
    let symbology = options.symbology;
    let text = args.text.clone();
    let image = run_blocking("encode barcode", move || barcode::encode_barcode(&text, &options, format)).await?;

    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(barcode::barcode_filename(symbology, &args.text, format)));
    write_file(&path, &image.bytes).await?;
    println!("Wrote {} ({}x{})", path.display(), image.size.w, image.size.h);
    Ok(())
}

async fn barcode_bulk(config: &ToolkitConfig, args: BarcodeBulkArgs) -> Result<()> {
    let mut options = config.barcode.to_barcode_options(true);
    if let Some(symbology) = args.symbology {
        options.symbology = symbology;
    }
    let input = read_input(&args.bulk.input).await?;
    let outcomes = bulk::generate_barcode_bulk(&input, &options).await?;
    write_bulk(outcomes, "barcodes", &args.bulk.out).await
}

async fn scan_cmd(config: &ToolkitConfig, synthetic: bool, args: ScanArgs) -> Result<()> {
    let result = if let Some(file) = args.file {
        scan::scan_file(&file).await?
    } else if let Some(url) = args.url {
        scan::scan_url(&reqwest::Client::new(), &config.scanner, &url).await?
    } else if args.camera {
        let mut camera = CameraLifecycle::new(media_host(synthetic), config.camera.clone())?;
        camera.list_devices().await?;
        scan::scan_camera(&mut camera, &config.scanner).await?
    } else {
        anyhow::bail!("Choose one of --file, --url or --camera");
    };
    println!("{}\t{}", result.format, result.text);
    Ok(())
}

async fn compress_cmd(config: &ToolkitConfig, args: CompressArgs) -> Result<()> {
    let mut options = config.compression.to_compression_options();
    if let Some(mb) = args.max_size_mb {
        options.max_size_mb = mb;
    }
    if let Some(side) = args.max_side {
        options.max_width_or_height = side;
    }
    if let Some(preset) = args.quality {
        options.initial_quality = preset.initial_quality();
    }
    options.always_keep_resolution |= args.keep_resolution;
    options.validate().map_err(anyhow::Error::msg)?;

    let mut inputs = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        inputs.push(Bytes::from(bytes));
    }

    let results = compress::compress_many(inputs, &options).await;
    let mut assets = Vec::new();
    for (file, result) in args.files.iter().zip(results) {
        match result {
            Ok(image) => {
                let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
                let name = format!("compressed-{}.{}", stem, image.format.extension());
                println!(
                    "{}: {} -> {} (-{:.1}%)",
                    file.display(),
                    format_bytes(image.original_bytes as u64),
                    format_bytes(image.compressed_bytes() as u64),
                    image.reduction_percent()
                );
                assets.push(Asset::new(name, image.format.mime(), image.bytes));
            }
            Err(e) => eprintln!("{}: {}", file.display(), e.user_message()),
        }
    }

    save_assets(assets, "compressed-images", &args.out, args.zip).await
}

async fn crop_cmd(args: CropArgs) -> Result<()> {
    let input = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let natural = size_of(&load_image(&input)?.to_rgba8());

    let displayed = match args.displayed.as_deref() {
        Some(s) => parse_size(s).map_err(anyhow::Error::msg)?,
        None => natural,
    };
    let crop_rect = match args.rect.as_deref() {
        Some(s) => parse_rect(s)?,
        None => crop::centered_aspect_crop(args.aspect, displayed.w as f64, displayed.h as f64),
    };
    let request = CropRequest {
        crop: crop_rect,
        displayed,
        rotation: QuarterTurn::from_degrees(args.rotate),
        flip: Flip {
            horizontal: args.flip_horizontal,
            vertical: args.flip_vertical,
        },
        shape: args.shape,
    };

    let cropped = run_blocking("crop", move || crop::crop_image(&input, &request)).await?;
    let path = args.out.join(&cropped.filename);
    write_file(&path, &cropped.bytes).await?;
    println!("Wrote {} ({}x{})", path.display(), cropped.size.w, cropped.size.h);
    Ok(())
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let client = ImageGenClient::new(reqwest::Client::new(), &args.proxy);
    let image = client.generate(&args.prompt).await?;
    let asset = client.download(&image).await?;
    let path = asset.save_to(&args.out).await?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn serve(mut config: ToolkitConfig, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.proxy.bind = bind;
    }
    config.proxy.validate().map_err(anyhow::Error::msg)?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    proxy::serve(&config.proxy, shutdown).await?;
    Ok(())
}

fn parse_rect(s: &str) -> Result<PixelCrop> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("Invalid rectangle: {}. Use x,y,w,h", s))?;
    match parts.as_slice() {
        [x, y, width, height] => Ok(PixelCrop {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => Err(anyhow::anyhow!("Invalid rectangle: {}. Use x,y,w,h", s)),
    }
}

async fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        use tokio::io::AsyncReadExt;
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        return Ok(input);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// Report each outcome and zip the successes.
async fn write_bulk(outcomes: Vec<BulkOutcome>, prefix: &str, out: &Path) -> Result<()> {
    let total = outcomes.len();
    let mut assets = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(image) => assets.push(Asset::from_encoded(outcome.item.filename, &image)),
            Err(e) => eprintln!("#{} {:?}: {}", outcome.item.index + 1, outcome.item.text, e.user_message()),
        }
    }
    println!("Generated {} of {}", assets.len(), total);
    if assets.is_empty() {
        return Ok(());
    }
    save_assets(assets, prefix, out, true).await
}

async fn save_assets(assets: Vec<Asset>, prefix: &str, out: &Path, zip: bool) -> Result<()> {
    if zip {
        let archive = archive_asset(prefix, &assets)?;
        let path = archive.save_to(out).await?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    for asset in assets {
        let path = asset.save_to(out).await?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
