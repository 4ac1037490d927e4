//! Perceptual embedding wrapper: a fixed-size feature vector per image and a
//! normalized distance between two embeddings (lower = more similar).

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

use crate::errors::ScrollCullResult;

/// A perceptual feature embedding. Deterministic for identical input pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    hash: ImageHash,
}

impl Embedding {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        ImageHash::from_bytes(bytes).ok().map(|hash| Self { hash })
    }

    /// Normalized Hamming distance in [0,1]; 0.0 means identical hashes.
    pub fn distance(&self, other: &Embedding) -> f32 {
        let bits = (self.hash.as_bytes().len() * 8).max(1);
        self.hash.dist(&other.hash) as f32 / bits as f32
    }
}

/// Whole-image similarity in [0,1], used by the scroll-termination check.
pub fn frame_similarity(a: &Embedding, b: &Embedding) -> f32 {
    1.0 - a.distance(b)
}

pub trait Embedder: Send + Sync {
    fn embed(&self, image: &DynamicImage) -> ScrollCullResult<Embedding>;
}

/// Gradient-hash embedder. 16×16 gives a 256-bit embedding, fine-grained
/// enough to separate different photos of the same person at the default
/// 0.4 distance threshold.
pub struct PerceptualEmbedder {
    hash_size: u32,
}

impl PerceptualEmbedder {
    pub fn new() -> Self {
        Self { hash_size: 16 }
    }
}

impl Default for PerceptualEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for PerceptualEmbedder {
    fn embed(&self, image: &DynamicImage) -> ScrollCullResult<Embedding> {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(self.hash_size, self.hash_size)
            .to_hasher();
        let hash = hasher.hash_image(image);
        Ok(Embedding { hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn patterned(seed: u32) -> DynamicImage {
        let mut img = RgbImage::new(64, 64);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let v = ((x * 7 + y * 13) * (seed + 1)) % 256;
            *px = Rgb([v as u8, (v / 2) as u8, (255 - v) as u8]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_pixels_embed_identically() {
        let e = PerceptualEmbedder::new();
        let a = e.embed(&patterned(3)).unwrap();
        let b = e.embed(&patterned(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.distance(&b), 0.0);
        assert_eq!(frame_similarity(&a, &b), 1.0);
    }

    #[test]
    fn distance_is_symmetric_and_bounded() {
        let e = PerceptualEmbedder::new();
        let a = e.embed(&patterned(1)).unwrap();
        let b = e.embed(&patterned(9)).unwrap();
        let d = a.distance(&b);
        assert_eq!(d, b.distance(&a));
        assert!((0.0..=1.0).contains(&d));
    }

    #[test]
    fn from_bytes_distance_is_hamming() {
        let a = Embedding::from_bytes(&[0x00]).unwrap();
        let b = Embedding::from_bytes(&[0xFF]).unwrap();
        assert_eq!(a.distance(&b), 1.0);
        assert_eq!(a.distance(&a), 0.0);
    }
}
