use neural_style as ns;
use ns::burn::backend::{Autodiff, NdArray};

type Backend = Autodiff<NdArray>;

fn main() -> Result<(), ns::Error> {
    env_logger::init();

    let device = Default::default();
    let size = ns::Dims::new(300, 200);
    let norm = ns::Normalization::IMAGENET;

    let network = ns::VggConfig::vgg19()
        .init::<Backend>(&device)
        .load_weights("weights/vgg19.mpk", &device)?;

    // a deeper content layer and only the first three style layers, which
    // keeps the style to fine brush strokes
    let extractor = ns::FeatureExtractor::new(
        network,
        &ns::LayerConfig {
            content_layers: vec![28],
            style_layers: vec![0, 5, 10],
        },
    )?;

    let content = ns::image::open("imgs/tom.jpg")?.to_rgb8();
    let style = ns::image::open("imgs/multiexample/4.jpg")?.to_rgb8();

    let content_x = ns::preprocess::<Backend>(&content, size, &norm, &device)?;
    let style_x = ns::preprocess::<Backend>(&style, size, &norm, &device)?;

    let targets = ns::Targets {
        contents: extractor.extract(content_x.clone()).detach().content,
    };
    let styles = extractor.extract(style_x).detach().style;

    let synthesis = ns::init_synthesis(content_x, styles, 0.5);

    let outcome = ns::train(
        &extractor,
        synthesis,
        &targets,
        &ns::TrainParams {
            weights: ns::LossWeights {
                content: 1.0,
                style: 5e3,
                tv: 1.0,
            },
            num_epochs: 200,
            lr_decay_epoch: 40,
        },
        None,
    )?;

    if let Some(losses) = outcome.last_loss {
        println!("final loss {:.3}", losses.total);
    }

    let img = ns::postprocess(outcome.image, &norm)?;
    std::fs::create_dir_all("out")?;
    img.save("out/02.png")?;
    Ok(())
}
