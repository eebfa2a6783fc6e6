use image::{GrayImage, Luma};
use imageproc::distance_transform::{euclidean_squared_distance_transform, Norm};
use imageproc::filter::box_filter;
use imageproc::morphology;

/// Mask value for ink; background is 0.
pub const INK: u8 = 255;

/// Adaptive mean threshold.
///
/// A pixel is ink when it is at least `offset` darker than the mean of its `block × block`
/// neighbourhood and darker than light pencil grey, or when it is at or below `floor`.
pub fn binarize(gray: &GrayImage, block: u32, offset: f32, floor: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }
    let radius = block / 2;
    let mean = box_filter(gray, radius, radius);
    GrayImage::from_fn(w, h, |x, y| {
        let value = gray.get_pixel(x, y).0[0];
        let local = mean.get_pixel(x, y).0[0] as f32;
        let ink = value <= floor || ((value as f32) < local - offset && value < 200);
        Luma([if ink { INK } else { 0 }])
    })
}

/// Closing with a 3×3 cross, bridging pinholes and one-pixel gaps in a stroke.
///
/// No opening follows: it would erase strokes thinner than the cross.
pub fn smooth(mask: &GrayImage) -> GrayImage {
    morphology::close(mask, Norm::L1, 1)
}

/// Fraction of pixels darker than 200.
pub fn dark_fraction(gray: &GrayImage) -> f64 {
    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let dark = gray.pixels().filter(|p| p.0[0] < 200).count();
    dark as f64 / total as f64
}

/// Euclidean distance from every ink pixel to the nearest background pixel, row-major.
/// Everything outside the canvas counts as background.
pub fn distance_transform(mask: &GrayImage) -> Vec<f64> {
    let (w, h) = mask.dimensions();
    // background is the foreground of the transform, framed by one pixel of it
    let mut background = GrayImage::from_pixel(w + 2, h + 2, Luma([255]));
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > 0 {
            background.put_pixel(x + 1, y + 1, Luma([0]));
        }
    }
    let squared = euclidean_squared_distance_transform(&background);

    let mut distances = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            distances.push(squared.get_pixel(x + 1, y + 1).0[0].sqrt());
        }
    }
    distances
}

/// Local stroke widths: twice the distance transform at ridge pixels, i.e. ink pixels
/// whose distance is not exceeded by any of their eight neighbours.
pub fn stroke_widths(mask: &GrayImage) -> Vec<f64> {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    let dist = distance_transform(mask);
    let at = |x: i64, y: i64| -> f64 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0.0
        } else {
            dist[(y * w + x) as usize]
        }
    };

    let mut widths = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let d = at(x, y);
            if d <= 0.0 {
                continue;
            }
            let ridge = (-1..=1).all(|dy| (-1..=1).all(|dx| at(x + dx, y + dy) <= d));
            if ridge {
                widths.push(2.0 * d);
            }
        }
    }
    widths
}
