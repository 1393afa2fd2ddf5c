use neural_style as ns;
use ns::burn::backend::{Autodiff, NdArray};

type Backend = Autodiff<NdArray>;

fn main() -> Result<(), ns::Error> {
    let device = Default::default();

    // the pretrained VGG-19 feature weights, converted to burn's record format
    let network = ns::VggConfig::vgg19()
        .init::<Backend>(&device)
        .load_weights("weights/vgg19.mpk", &device)?;

    let session = ns::Session::<Backend>::builder()
        // the content image, whose structure is kept
        .content(&"imgs/tom.jpg")
        // the style image, whose texture is painted over the content
        .style(&"imgs/multiexample/4.jpg")
        .network(network)
        .build()?;

    // runs the full 500 iterations, reporting every 50th
    let stylized = session.run(Some(Box::new(|update: ns::ProgressUpdate<'_>| {
        if update.epoch % 50 == 0 {
            println!(
                "epoch {}/{}: loss {:.3}, learning rate {:.4}",
                update.epoch, update.total, update.losses.total, update.learning_rate
            );
        }
    })))?;

    // save the result to the disk
    stylized.save("out/01.jpg")
}
