//! Pixel-source abstraction for `Renderer::add_texture`, grounded verbatim
//! on the teacher's `image_data.rs` -- an implementation is provided for the
//! [`image`] crate's `DynamicImage`, and a `Monocolor` helper for tests and
//! placeholder/default textures.
pub trait ImageData {
  /// Returns r8g8b8a8 32-bit (4 byte) packed pixels.
  fn into_rgba_32(self) -> Vec<u8>;

  /// Returns `(width, height)` of the image.
  fn dimensions(&self) -> (u32, u32);
}

impl ImageData for image::DynamicImage {
  fn into_rgba_32(self) -> Vec<u8> {
    self.into_rgba().into_vec()
  }

  fn dimensions(&self) -> (u32, u32) {
    match self {
      image::DynamicImage::ImageBgr8(img) => img.dimensions(),
      image::DynamicImage::ImageLuma8(img) => img.dimensions(),
      image::DynamicImage::ImageLumaA8(img) => img.dimensions(),
      image::DynamicImage::ImageRgb8(img) => img.dimensions(),
      image::DynamicImage::ImageRgba8(img) => img.dimensions(),
      image::DynamicImage::ImageBgra8(img) => img.dimensions(),
      image::DynamicImage::ImageLuma16(img) => img.dimensions(),
      image::DynamicImage::ImageLumaA16(img) => img.dimensions(),
      image::DynamicImage::ImageRgb16(img) => img.dimensions(),
      image::DynamicImage::ImageRgba16(img) => img.dimensions(),
    }
  }
}

/// A single solid-color 1x1 image. Useful as a default/placeholder texture
/// and in tests that don't want to depend on real pixel data.
pub struct Monocolor {
  inner: [u8; 4],
}
impl Monocolor {
  pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
    Monocolor {
      inner: [r, g, b, a],
    }
  }

  pub fn clear() -> Self {
    Self::new(0, 0, 0, 0)
  }
}
impl ImageData for Monocolor {
  fn into_rgba_32(self) -> Vec<u8> {
    self.inner.to_vec()
  }

  fn dimensions(&self) -> (u32, u32) {
    (1, 1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn monocolor_is_one_pixel_rgba() {
    let pixel = Monocolor::new(10, 20, 30, 255);
    assert_eq!(pixel.dimensions(), (1, 1));
    assert_eq!(pixel.into_rgba_32(), vec![10, 20, 30, 255]);
  }
}
