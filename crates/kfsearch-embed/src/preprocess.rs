use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;

use kfsearch_core::types::ImageInput;
use kfsearch_core::{Error, Result};

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_1];

pub fn load_image(input: &ImageInput) -> Result<DynamicImage> {
    match input {
        ImageInput::Path(path) => image::open(path)
            .map_err(|e| Error::Encode(format!("cannot read image {}: {}", path.display(), e))),
        ImageInput::Bytes(bytes) => image::load_from_memory(bytes)
            .map_err(|e| Error::Encode(format!("cannot decode image bytes: {}", e))),
    }
}

/// `[1, 3, size, size]` pixel tensor, centre-cropped and CLIP-normalised.
pub fn image_to_tensor(img: &DynamicImage, size: usize, device: &Device) -> candle_core::Result<Tensor> {
    let side = u32::try_from(size).unwrap_or(u32::MAX);
    let rgb = img.resize_to_fill(side, side, FilterType::Triangle).to_rgb8().into_raw();
    let mean = Tensor::new(&CLIP_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&CLIP_STD, device)?.reshape((3, 1, 1))?;
    Tensor::from_vec(rgb, (size, size, 3), device)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(1.0 / 255.0, 0.0)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?
        .unsqueeze(0)
}
