mod progress_window;

use structopt::StructOpt;

use neural_style::{
    image::ImageOutputFormat as ImgFmt, Dims, Error, LayerConfig, Session, VggConfig,
};
use progress_window::ProgressWindow;
use std::path::PathBuf;

#[cfg(not(feature = "wgpu"))]
type Backend = neural_style::burn::backend::Autodiff<neural_style::burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
type Backend = neural_style::burn::backend::Autodiff<neural_style::burn::backend::Wgpu>;

fn parse_size(input: &str) -> Result<Dims, std::num::ParseIntError> {
    let mut i = input.splitn(2, 'x');

    let x: u32 = i.next().unwrap_or("").parse()?;
    let y: u32 = match i.next() {
        Some(num) => num.parse()?,
        None => x,
    };
    Ok(Dims::new(x, y))
}

fn parse_img_fmt(input: &str) -> Result<ImgFmt, String> {
    let fmt = match input {
        "png" => ImgFmt::Png,
        "jpg" => ImgFmt::Jpeg(75),
        "bmp" => ImgFmt::Bmp,
        other => {
            return Err(format!(
                "image format `{}` not one of: 'png', 'jpg', 'bmp'",
                other
            ))
        }
    };

    Ok(fmt)
}

/// A comma separated list of layer indices
struct Layers(Vec<usize>);

fn parse_layers(input: &str) -> Result<Layers, std::num::ParseIntError> {
    let layers = input
        .split(',')
        .map(|l| l.trim().parse())
        .collect::<Result<_, _>>()?;
    Ok(Layers(layers))
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Tweaks {
    /// The number of optimization steps, the run always performs all of them
    #[structopt(long, default_value = "500")]
    epochs: u32,
    /// The initial learning rate of the Adam optimizer
    #[structopt(long = "lr", default_value = "0.9")]
    learning_rate: f64,
    /// The learning rate is multiplied by 0.8 after every this many epochs
    #[structopt(long, default_value = "50")]
    lr_decay_epoch: u32,
    /// Weight of the content term, higher values keep more of the content's structure
    #[structopt(long, default_value = "1")]
    content_weight: f32,
    /// Weight of the style terms
    #[structopt(long, default_value = "1000")]
    style_weight: f32,
    /// Weight of the total variation term, higher values give a smoother image
    #[structopt(long, default_value = "10")]
    tv_weight: f32,
    /// Comma separated indices of the network layers used as content features
    #[structopt(long, default_value = "25", parse(try_from_str = parse_layers))]
    content_layers: Layers,
    /// Comma separated indices of the network layers used as style features
    #[structopt(long, default_value = "0,5,10,19,28", parse(try_from_str = parse_layers))]
    style_layers: Layers,
    /// Don't show the progress bars
    #[structopt(long)]
    no_progress: bool,
}

#[derive(StructOpt)]
#[structopt(
    name = "neural-style",
    about = "Transfers the style of one image onto the content of another",
    rename_all = "kebab-case"
)]
struct Opt {
    /// The image whose structure is kept
    #[structopt(long, parse(from_os_str))]
    content: PathBuf,
    /// The image whose texture and colors are painted onto the content
    #[structopt(long, parse(from_os_str))]
    style: PathBuf,
    /// Pretrained VGG-19 feature weights, recorded with burn's named message pack recorder
    #[structopt(long, parse(from_os_str))]
    weights: PathBuf,
    /// Size of the generated image, in `width x height`, or a single number for both dimensions
    #[structopt(
        long,
        default_value = "450x300",
        parse(try_from_str = parse_size)
    )]
    out_size: Dims,
    /// The format to save the generated image as.
    ///
    /// NOTE: this will only apply when stdout is specified via `-o -`, otherwise the image
    /// format is determined by the file extension of the path provided to `-o`
    #[structopt(
        long,
        default_value = "png",
        parse(try_from_str = parse_img_fmt)
    )]
    out_fmt: ImgFmt,
    /// The path to save the generated image to, the file extensions of the path determines
    /// the image format used. You may use `-` for stdout.
    #[structopt(long = "out", short, parse(from_os_str))]
    output_path: PathBuf,
    #[structopt(flatten)]
    tweaks: Tweaks,
}

fn main() {
    env_logger::init();

    if let Err(e) = real_main() {
        if atty::is(atty::Stream::Stderr) {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
        } else {
            eprintln!("error: {}", e);
        }

        std::process::exit(1);
    }
}

fn real_main() -> Result<(), Error> {
    let args = Opt::from_args();

    // Check that the extension for the path supplied by the user is one of the ones we support
    {
        match args.output_path.extension().and_then(|ext| ext.to_str()) {
            Some("png") | Some("jpg") | Some("bmp") => {}
            None => {}
            Some(other) => return Err(Error::UnsupportedOutputFormat(other.to_owned())),
        }
    }

    let device = Default::default();

    log::info!("loading network weights from {}", args.weights.display());
    let network = VggConfig::vgg19()
        .init::<Backend>(&device)
        .load_weights(&args.weights, &device)?;

    let tweaks = &args.tweaks;
    let session = Session::<Backend>::builder()
        .content(&args.content)
        .style(&args.style)
        .network(network)
        .device(device)
        .output_size(args.out_size)
        .layers(LayerConfig {
            content_layers: tweaks.content_layers.0.clone(),
            style_layers: tweaks.style_layers.0.clone(),
        })
        .content_weight(tweaks.content_weight)
        .style_weight(tweaks.style_weight)
        .tv_weight(tweaks.tv_weight)
        .learning_rate(tweaks.learning_rate)
        .epochs(tweaks.epochs)
        .lr_decay_epoch(tweaks.lr_decay_epoch)
        .build()?;

    let progress: Option<Box<dyn neural_style::TrainingProgress>> = if !tweaks.no_progress {
        Some(Box::new(ProgressWindow::new(tweaks.epochs)))
    } else {
        None
    };

    let stylized = session.run(progress)?;

    if let Some(losses) = stylized.last_loss() {
        log::info!(
            "final loss {} (content {}, style {}, tv {})",
            losses.total,
            losses.content,
            losses.style,
            losses.tv
        );
    }

    if args.output_path.to_str() == Some("-") {
        let out = std::io::stdout();
        let mut out = out.lock();
        stylized.write(&mut out, args.out_fmt)?;
    } else {
        // This won't respect the output format specified by the user,
        // only the extension on the path they specify
        stylized.save(&args.output_path)?;
    }

    Ok(())
}
