use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

/// Texture format for sketch images.
///
/// Threshold maps are data, not colour, so texels are sampled raw in every
/// surface colour space.
pub(crate) const SKETCH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct SketchTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

/// Decodes an image file into tightly packed RGBA8 rows, top row first.
pub(crate) fn decode_rgba(path: &Path, max_dimension: u32) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image at {}", path.display()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("image at {} is empty", path.display());
    }
    if width > max_dimension || height > max_dimension {
        anyhow::bail!(
            "image at {} is {width}x{height}, larger than the GPU limit of {max_dimension}",
            path.display()
        );
    }
    Ok(rgba)
}

pub(crate) fn load_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
    max_dimension: u32,
) -> Result<SketchTexture> {
    let rgba = decode_rgba(path, max_dimension)?;
    let (width, height) = rgba.dimensions();
    let label = format!("sketch texture {}", path.display());
    Ok(upload(device, queue, &label, width, height, &rgba))
}

/// Opaque white 1x1 texture bound to samplers the sketch never sets.
pub(crate) fn create_placeholder_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> SketchTexture {
    upload(
        device,
        queue,
        "placeholder sketch texture",
        1,
        1,
        &[255u8, 255, 255, 255],
    )
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> SketchTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SKETCH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    // Nearest + repeat: threshold maps are tiled across the canvas and must
    // never be blended between cells.
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    SketchTexture {
        _texture: texture,
        view,
        sampler,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn decodes_grayscale_into_rgba_without_flipping() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ramp.png");
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(0, 0, Luma([10]));
        gray.put_pixel(1, 1, Luma([200]));
        gray.save(&path).unwrap();

        let rgba = decode_rgba(&path, 64).unwrap();
        assert_eq!(rgba.dimensions(), (2, 2));
        assert_eq!(rgba.get_pixel(0, 0).0, [10, 10, 10, 255]);
        assert_eq!(rgba.get_pixel(1, 1).0, [200, 200, 200, 255]);
    }

    #[test]
    fn rejects_missing_and_oversized_images() {
        let temp = tempfile::tempdir().unwrap();
        assert!(decode_rgba(&temp.path().join("absent.png"), 64).is_err());

        let path = temp.path().join("big.png");
        GrayImage::new(8, 4).save(&path).unwrap();
        let err = decode_rgba(&path, 4).unwrap_err();
        assert!(err.to_string().contains("8x4"), "{err}");
    }

    #[test]
    fn rejects_undecodable_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("fake.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(decode_rgba(&path, 64).is_err());
    }
}
