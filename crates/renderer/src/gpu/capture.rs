use anyhow::{bail, Context, Result};
use image::RgbaImage;

/// Byte order of a capturable 8-bit, four-channel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChannelOrder {
    Rgba,
    Bgra,
}

pub(crate) fn channel_order(format: wgpu::TextureFormat) -> Result<ChannelOrder> {
    use wgpu::TextureFormat as F;
    match format {
        F::Rgba8Unorm | F::Rgba8UnormSrgb => Ok(ChannelOrder::Rgba),
        F::Bgra8Unorm | F::Bgra8UnormSrgb => Ok(ChannelOrder::Bgra),
        other => bail!("snapshots are not supported for canvas format {other:?}"),
    }
}

/// Row pitch for a texture-to-buffer copy of `width` RGBA8 texels.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strips copy padding from mapped rows and normalises to RGBA.
pub(crate) fn unpad_rows(
    data: &[u8],
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
    order: ChannelOrder,
) -> Vec<u8> {
    let row_bytes = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in data
        .chunks(padded_bytes_per_row as usize)
        .take(height as usize)
    {
        pixels.extend_from_slice(&row[..row_bytes]);
    }
    if order == ChannelOrder::Bgra {
        for texel in pixels.chunks_exact_mut(4) {
            texel.swap(0, 2);
        }
    }
    pixels
}

/// Reads a single-sampled texture back into an RGBA image.
///
/// Blocks until the GPU has finished every submitted command.
pub(crate) fn capture_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<RgbaImage> {
    let order = channel_order(texture.format())?;
    let width = texture.width();
    let height = texture.height();
    let bytes_per_row = padded_bytes_per_row(width);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("snapshot staging buffer"),
        size: u64::from(bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("snapshot encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .context("failed waiting for snapshot readback")?;
    receiver
        .recv()
        .context("snapshot readback was never completed")?
        .context("failed to map snapshot buffer")?;

    let pixels = {
        let mapped = slice.get_mapped_range();
        unpad_rows(&mapped, width, height, bytes_per_row, order)
    };
    staging.unmap();

    RgbaImage::from_raw(width, height, pixels)
        .context("snapshot buffer does not match canvas dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_rows_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(800), 3328);
    }

    #[test]
    fn unpads_and_swizzles_bgra() {
        let pitch = padded_bytes_per_row(2) as usize;
        let mut data = vec![0xAAu8; pitch * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 255, 4, 5, 6, 255]);
        data[pitch..pitch + 8].copy_from_slice(&[7, 8, 9, 255, 10, 11, 12, 255]);

        let rgba = unpad_rows(&data, 2, 2, pitch as u32, ChannelOrder::Rgba);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[8..12], &[7, 8, 9, 255]);

        let bgra = unpad_rows(&data, 2, 2, pitch as u32, ChannelOrder::Bgra);
        assert_eq!(&bgra[..4], &[3, 2, 1, 255]);
        assert_eq!(&bgra[12..], &[12, 11, 10, 255]);
    }

    #[test]
    fn only_eight_bit_four_channel_formats_are_capturable() {
        assert_eq!(
            channel_order(wgpu::TextureFormat::Bgra8UnormSrgb).unwrap(),
            ChannelOrder::Bgra
        );
        assert_eq!(
            channel_order(wgpu::TextureFormat::Rgba8Unorm).unwrap(),
            ChannelOrder::Rgba
        );
        assert!(channel_order(wgpu::TextureFormat::Rgba16Float).is_err());
    }
}
