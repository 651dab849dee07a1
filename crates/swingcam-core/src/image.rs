#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` on a length mismatch.
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.data[y * self.width + x])
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Copy `src` into `self`, reusing the existing allocation when it is large enough.
    pub fn copy_from(&mut self, src: &GrayImageView<'_>) {
        self.width = src.width;
        self.height = src.height;
        self.data.clear();
        self.data.extend_from_slice(src.data);
    }

    pub fn to_image(&self) -> Option<::image::GrayImage> {
        ::image::GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
    }

    pub fn from_image(img: &::image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().clone(),
        }
    }
}

impl GrayImageView<'_> {
    pub fn to_owned_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }

    /// Mean intensity over the whole raster (0 for an empty view).
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f32 / self.data.len() as f32
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample with zero padding outside the raster.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear sample clamped to the raster border instead of zero padding.
#[inline]
pub fn sample_bilinear_clamped(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.width == 0 || src.height == 0 {
        return 0.0;
    }
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;
    sample_bilinear_inner(src, x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

#[inline]
fn sample_bilinear_inner(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let row0 = y0 * src.width;
    let row1 = y1 * src.width;

    let p00 = src.data[row0 + x0] as f32;
    let p10 = src.data[row0 + x1] as f32;
    let p01 = src.data[row1 + x0] as f32;
    let p11 = src.data[row1 + x1] as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Summed-area table over a gray raster, one extra row/column of zeros.
#[derive(Clone, Debug)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(src: &GrayImageView<'_>) -> Self {
        let w = src.width + 1;
        let mut sums = vec![0u64; w * (src.height + 1)];
        for y in 0..src.height {
            let mut row = 0u64;
            for x in 0..src.width {
                row += src.data[y * src.width + x] as u64;
                sums[(y + 1) * w + x + 1] = sums[y * w + x + 1] + row;
            }
        }
        Self {
            width: src.width,
            height: src.height,
            sums,
        }
    }

    /// Sum over the half-open box `[x0, x1) x [y0, y1)`, clipped to the raster.
    pub fn box_sum(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> (u64, u64) {
        let cx0 = x0.clamp(0, self.width as i64) as usize;
        let cy0 = y0.clamp(0, self.height as i64) as usize;
        let cx1 = x1.clamp(0, self.width as i64) as usize;
        let cy1 = y1.clamp(0, self.height as i64) as usize;
        if cx1 <= cx0 || cy1 <= cy0 {
            return (0, 0);
        }
        let w = self.width + 1;
        let s = self.sums[cy1 * w + cx1] + self.sums[cy0 * w + cx0]
            - self.sums[cy0 * w + cx1]
            - self.sums[cy1 * w + cx0];
        (s, ((cx1 - cx0) * (cy1 - cy0)) as u64)
    }

    /// Mean over a clipped box; `None` when the box is empty.
    pub fn box_mean(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> Option<f32> {
        let (sum, count) = self.box_sum(x0, y0, x1, y1);
        (count > 0).then(|| sum as f32 / count as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.put(x, y, (x * 10 + y) as u8);
            }
        }
        img
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = ramp(8, 8);
        let v = sample_bilinear(&img.view(), 2.5, 3.0);
        assert!((v - 28.0).abs() < 1e-4, "got {v}");
    }

    #[test]
    fn clamped_sampling_stays_on_border() {
        let img = ramp(4, 4);
        let v = sample_bilinear_clamped(&img.view(), -5.0, 0.0);
        assert_eq!(v, 0.0);
        let v = sample_bilinear_clamped(&img.view(), 10.0, 0.0);
        assert_eq!(v, 30.0);
    }

    #[test]
    fn integral_box_sum_matches_brute_force() {
        let img = ramp(9, 7);
        let ii = IntegralImage::new(&img.view());
        let (sum, count) = ii.box_sum(2, 1, 6, 5);
        let mut expected = 0u64;
        for y in 1..5 {
            for x in 2..6 {
                expected += img.get(x, y).unwrap() as u64;
            }
        }
        assert_eq!(count, 16);
        assert_eq!(sum, expected);
    }

    #[test]
    fn integral_box_is_clipped() {
        let img = ramp(4, 4);
        let ii = IntegralImage::new(&img.view());
        let (_, count) = ii.box_sum(-3, -3, 2, 2);
        assert_eq!(count, 4);
        assert!(ii.box_mean(10, 10, 12, 12).is_none());
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(GrayImage::from_vec(3, 3, vec![0; 8]).is_none());
        assert!(GrayImage::from_vec(3, 3, vec![0; 9]).is_some());
    }
}
