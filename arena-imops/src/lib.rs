//! Pixel operations for the arena vision pipeline.
//!
//! Everything operates on [`machine_vision_formats`] strided images so the
//! same functions work on owned buffers and views. Allocating operations
//! return [`OImage`] with minimal stride.

use machine_vision_formats::{
    owned::OImage,
    pixel_format::{pixfmt, Mono8, RGB8},
    ImageMutData, ImageStride, PixelFormat,
};

/// Allocate a zero-filled image with minimal stride.
pub fn zeros<F: PixelFormat>(width: u32, height: u32) -> OImage<F> {
    let fmt = pixfmt::<F>().unwrap();
    let stride = fmt.bits_per_pixel() as usize * width as usize / 8;
    OImage::new(width, height, stride, vec![0u8; stride * height as usize]).unwrap()
}

/// Convert an RGB image to grayscale with the usual Rec.601 luma weights.
pub fn rgb_to_gray<IM>(im: &IM) -> OImage<Mono8>
where
    IM: ImageStride<RGB8>,
{
    let width = im.width() as usize;
    let height = im.height() as usize;
    let stride = im.stride();
    let data = im.image_data();

    let mut out = Vec::with_capacity(width * height);
    for row in data.chunks_exact(stride).take(height) {
        for px in row[..width * 3].chunks_exact(3) {
            let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            out.push(luma.round().min(255.0) as u8);
        }
    }
    OImage::new(im.width(), im.height(), width, out).unwrap()
}

/// Comparison operator for [`threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    LessThan,
    LessEqual,
    Equal,
    GreaterEqual,
    GreaterThan,
}

impl CmpOp {
    #[inline]
    fn eval(&self, lhs: u8, rhs: u8) -> bool {
        match self {
            CmpOp::LessThan => lhs < rhs,
            CmpOp::LessEqual => lhs <= rhs,
            CmpOp::Equal => lhs == rhs,
            CmpOp::GreaterEqual => lhs >= rhs,
            CmpOp::GreaterThan => lhs > rhs,
        }
    }
}

/// Threshold the image in place: pixels comparing true with `op` against
/// `thresh` become `a`, all others `b`.
///
/// Panics: panics if the image data is smaller than stride×height or if
/// stride is smaller than width.
#[inline]
pub fn threshold<IM>(mut im: IM, op: CmpOp, thresh: u8, a: u8, b: u8) -> IM
where
    IM: ImageStride<Mono8> + ImageMutData<Mono8>,
{
    let stride = im.stride();
    let width = im.width() as usize;
    let datalen = im.height() as usize * stride;

    let full_data = im.buffer_mut_ref();
    let data = &mut full_data.data[..datalen];
    for rowdata in data.chunks_exact_mut(stride) {
        for element in rowdata[..width].iter_mut() {
            *element = if op.eval(*element, thresh) { a } else { b };
        }
    }
    im
}

/// Classic binary threshold: pixels strictly above `thresh` become 255,
/// everything else 0.
#[inline]
pub fn binary_threshold<IM>(im: IM, thresh: u8) -> IM
where
    IM: ImageStride<Mono8> + ImageMutData<Mono8>,
{
    threshold(im, CmpOp::GreaterThan, thresh, 255, 0)
}

/// Copy the `w × h` sub-rectangle at `(x, y)` into a new minimally-strided
/// image.
///
/// Panics: panics if the requested rectangle extends beyond the image.
pub fn crop<F, IM>(im: &IM, x: u32, y: u32, w: u32, h: u32) -> OImage<F>
where
    F: PixelFormat,
    IM: ImageStride<F>,
{
    assert!(x + w <= im.width() && y + h <= im.height());
    let fmt = pixfmt::<F>().unwrap();
    let bpp = fmt.bits_per_pixel() as usize / 8;
    let src_stride = im.stride();
    let dst_stride = w as usize * bpp;
    let data = im.image_data();

    let mut out = Vec::with_capacity(dst_stride * h as usize);
    for row in y..y + h {
        let start = row as usize * src_stride + x as usize * bpp;
        out.extend_from_slice(&data[start..start + dst_stride]);
    }
    OImage::new(w, h, dst_stride, out).unwrap()
}

/// Copy all of `src` into `dst` with its top-left corner at `(x, y)`.
///
/// Panics: panics if `src` does not fit inside `dst` at that offset.
pub fn blit<SRC, DST>(src: &SRC, dst: &mut DST, x: u32, y: u32)
where
    SRC: ImageStride<Mono8>,
    DST: ImageStride<Mono8> + ImageMutData<Mono8>,
{
    assert!(x + src.width() <= dst.width() && y + src.height() <= dst.height());
    let src_stride = src.stride();
    let dst_stride = dst.stride();
    let src_w = src.width() as usize;
    let src_rows = src.height() as usize;

    let src_data = src.image_data();
    let dst_data = dst.buffer_mut_ref().data;
    for (i, src_row) in src_data.chunks_exact(src_stride).take(src_rows).enumerate() {
        let start = (y as usize + i) * dst_stride + x as usize;
        dst_data[start..start + src_w].copy_from_slice(&src_row[..src_w]);
    }
}

/// Canny edge detection: Sobel gradients, non-maximum suppression along the
/// gradient direction, then double threshold with hysteresis linking.
///
/// The result is a binary image: 255 on edges, 0 elsewhere. The outermost
/// one-pixel border is never an edge.
pub fn canny<IM>(im: &IM, low: f32, high: f32) -> OImage<Mono8>
where
    IM: ImageStride<Mono8>,
{
    let w = im.width() as usize;
    let h = im.height() as usize;
    let stride = im.stride();
    let data = im.image_data();

    let mut out = zeros::<Mono8>(im.width(), im.height());
    if w < 3 || h < 3 {
        return out;
    }

    let px = |x: usize, y: usize| -> f32 { data[y * stride + x] as f32 };

    let mut mag = vec![0f32; w * h];
    let mut dir = vec![0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = -px(x - 1, y - 1) + px(x + 1, y - 1) - 2.0 * px(x - 1, y)
                + 2.0 * px(x + 1, y)
                - px(x - 1, y + 1)
                + px(x + 1, y + 1);
            let gy = -px(x - 1, y - 1) - 2.0 * px(x, y - 1) - px(x + 1, y - 1)
                + px(x - 1, y + 1)
                + 2.0 * px(x, y + 1)
                + px(x + 1, y + 1);
            mag[y * w + x] = (gx * gx + gy * gy).sqrt();
            dir[y * w + x] = gy.atan2(gx);
        }
    }

    // non-maximum suppression into a fresh buffer
    let mut thin = vec![0f32; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = mag[y * w + x];
            if m == 0.0 {
                continue;
            }
            let mut angle = dir[y * w + x].to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            // the two neighbours along the gradient direction
            let (a, b) = if !(22.5..157.5).contains(&angle) {
                (mag[y * w + x - 1], mag[y * w + x + 1])
            } else if angle < 67.5 {
                (mag[(y - 1) * w + x - 1], mag[(y + 1) * w + x + 1])
            } else if angle < 112.5 {
                (mag[(y - 1) * w + x], mag[(y + 1) * w + x])
            } else {
                (mag[(y - 1) * w + x + 1], mag[(y + 1) * w + x - 1])
            };
            if m >= a && m >= b {
                thin[y * w + x] = m;
            }
        }
    }

    // hysteresis: grow from strong pixels through weak ones (8-connected)
    let mut stack = Vec::new();
    {
        let out_data = out.buffer_mut_ref().data;
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                if thin[y * w + x] >= high && out_data[y * w + x] == 0 {
                    out_data[y * w + x] = 255;
                    stack.push((x, y));
                }
            }
        }
        while let Some((x, y)) = stack.pop() {
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = (x as i32 + dx) as usize;
                    let ny = (y as i32 + dy) as usize;
                    if nx == 0 || ny == 0 || nx >= w - 1 || ny >= h - 1 {
                        continue;
                    }
                    if thin[ny * w + nx] >= low && out_data[ny * w + nx] == 0 {
                        out_data[ny * w + nx] = 255;
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}
