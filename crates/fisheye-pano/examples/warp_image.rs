use fisheye_pano::{build_map, resample, LensConfig, PixelBuffer, RadialTangentialDistortion};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output>", args[0]);
        std::process::exit(2);
    }

    let image = image::open(&args[1])?.into_rgb8();
    let src = PixelBuffer::from_rgb_image(image)?;

    // Milder than the default lens; replace with your own coefficients.
    let lens = LensConfig {
        distortion: RadialTangentialDistortion {
            k1: 0.25,
            k2: 0.05,
            p1: 0.0,
            p2: 0.0,
        },
        ..LensConfig::default()
    };

    let map = build_map(src.width(), src.height(), &lens)?;
    let out = resample(&src, &map)?;
    out.to_rgb_image().save(&args[2])?;
    println!("Wrote {}x{} to {}", out.width(), out.height(), args[2]);
    Ok(())
}
