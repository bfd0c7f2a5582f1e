//! Scene overlay drawing: outlines, guide lines, and text.

use arena_types::Rgb;
use machine_vision_formats::{pixel_format::RGB8, ImageMutData, ImageStride};
use nalgebra::Point2;
use rusttype::{point, Scale};

lazy_static::lazy_static! {
    static ref FONT: rusttype::Font<'static> =
        rusttype::Font::try_from_bytes(ttf_firacode::REGULAR).expect("parsing embedded font");
}

fn put_pixel<IM>(im: &mut IM, x: i64, y: i64, color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    if x < 0 || y < 0 || x >= im.width() as i64 || y >= im.height() as i64 {
        return;
    }
    let stride = im.stride();
    let at = y as usize * stride + x as usize * 3;
    let data = im.buffer_mut_ref().data;
    data[at] = color.0;
    data[at + 1] = color.1;
    data[at + 2] = color.2;
}

fn blend_pixel<IM>(im: &mut IM, x: i64, y: i64, color: Rgb, alpha: f64)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    if x < 0 || y < 0 || x >= im.width() as i64 || y >= im.height() as i64 {
        return;
    }
    let stride = im.stride();
    let at = y as usize * stride + x as usize * 3;
    let p = 1.0 - alpha;
    let data = im.buffer_mut_ref().data;
    data[at] = (data[at] as f64 * p + color.0 as f64 * alpha).round() as u8;
    data[at + 1] = (data[at + 1] as f64 * p + color.1 as f64 * alpha).round() as u8;
    data[at + 2] = (data[at + 2] as f64 * p + color.2 as f64 * alpha).round() as u8;
}

/// Bresenham line from `a` to `b`, clipped at the image bounds.
pub fn draw_line<IM>(im: &mut IM, a: (i64, i64), b: (i64, i64), color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    let (mut x, mut y) = a;
    let (x1, y1) = b;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(im, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Connect the points in order; `closed` joins the last back to the first.
pub fn draw_polyline<IM>(im: &mut IM, points: &[Point2<f64>], closed: bool, color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    if points.len() < 2 {
        return;
    }
    let as_px = |p: &Point2<f64>| (p.x.round() as i64, p.y.round() as i64);
    for pair in points.windows(2) {
        draw_line(im, as_px(&pair[0]), as_px(&pair[1]), color);
    }
    if closed {
        draw_line(im, as_px(&points[points.len() - 1]), as_px(&points[0]), color);
    }
}

/// Axis-aligned rectangle outline with corners `tl` and `br`.
pub fn draw_rect<IM>(im: &mut IM, tl: (i64, i64), br: (i64, i64), color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    let (x0, y0) = tl;
    let (x1, y1) = br;
    draw_line(im, (x0, y0), (x1, y0), color);
    draw_line(im, (x1, y0), (x1, y1), color);
    draw_line(im, (x1, y1), (x0, y1), color);
    draw_line(im, (x0, y1), (x0, y0), color);
}

/// Circle outline.
pub fn draw_circle<IM>(im: &mut IM, centre: (i64, i64), radius: i64, color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    if radius <= 0 {
        put_pixel(im, centre.0, centre.1, color);
        return;
    }
    let steps = (radius * 8).max(16);
    for k in 0..steps {
        let a = k as f64 * std::f64::consts::TAU / steps as f64;
        let x = centre.0 + (radius as f64 * a.cos()).round() as i64;
        let y = centre.1 + (radius as f64 * a.sin()).round() as i64;
        put_pixel(im, x, y, color);
    }
}

/// Horizontal plus vertical line through the image centre.
pub fn draw_crosshairs<IM>(im: &mut IM, color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    let w = im.width() as i64;
    let h = im.height() as i64;
    draw_line(im, (0, h / 2), (w - 1, h / 2), color);
    draw_line(im, (w / 2, 0), (w / 2, h - 1), color);
}

/// Render `text` with its top-left corner near `(x, y)` at the given pixel
/// height, alpha-blended onto the scene.
pub fn draw_text<IM>(im: &mut IM, text: &str, pos: (f64, f64), height: f32, color: Rgb)
where
    IM: ImageStride<RGB8> + ImageMutData<RGB8>,
{
    let scale = Scale::uniform(height);
    let v_metrics = FONT.v_metrics(scale);
    let glyphs: Vec<_> = FONT
        .layout(
            text,
            scale,
            point(pos.0 as f32, pos.1 as f32 + v_metrics.ascent),
        )
        .collect();

    for glyph in glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                blend_pixel(
                    im,
                    gx as i64 + bb.min.x as i64,
                    gy as i64 + bb.min.y as i64,
                    color,
                    coverage as f64,
                );
            });
        }
    }
}
