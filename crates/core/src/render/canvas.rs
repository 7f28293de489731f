use vello_cpu::{
    kurbo::{Affine, BezPath, Circle, Point, Rect, Shape, Stroke},
    peniko::Color,
    Pixmap, RenderContext,
};

use super::{Raster, Rgba};
use crate::{BeatscapeError, Result};

const CIRCLE_TOLERANCE: f64 = 0.1;

/// Vector drawing surface for one module layer, rasterised with `vello_cpu`.
///
/// Every drawing call validates its geometry; a non-finite coordinate is a
/// render error rather than a silently dropped primitive.
pub struct Canvas {
    ctx: RenderContext,
    width: u16,
    height: u16,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(BeatscapeError::render(format!(
                "canvas size {width}x{height} exceeds 65535 pixels"
            )));
        };
        if w == 0 || h == 0 {
            return Err(BeatscapeError::render("canvas size must be non-zero"));
        }
        let mut ctx = RenderContext::new(w, h);
        ctx.set_transform(Affine::IDENTITY);
        Ok(Self {
            ctx,
            width: w,
            height: h,
        })
    }

    pub fn width(&self) -> f64 {
        f64::from(self.width)
    }

    pub fn height(&self) -> f64 {
        f64::from(self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.width() * 0.5, self.height() * 0.5)
    }

    /// Length of the shorter side; modules size their geometry against it.
    pub fn unit(&self) -> f64 {
        self.width().min(self.height())
    }

    pub fn fill(&mut self, color: Rgba) {
        self.ctx.set_paint(paint(color));
        self.ctx
            .fill_rect(&Rect::new(0.0, 0.0, self.width(), self.height()));
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba) -> Result<()> {
        check_values(&[x, y, w, h])?;
        self.ctx.set_paint(paint(color));
        self.ctx.fill_rect(&Rect::new(x, y, x + w, y + h));
        Ok(())
    }

    pub fn fill_circle(&mut self, center: Point, radius: f64, color: Rgba) -> Result<()> {
        check_points(&[center])?;
        check_values(&[radius])?;
        if radius <= 0.0 {
            return Ok(());
        }
        self.ctx.set_paint(paint(color));
        self.ctx
            .fill_path(&Circle::new(center, radius).to_path(CIRCLE_TOLERANCE));
        Ok(())
    }

    pub fn stroke_circle(
        &mut self,
        center: Point,
        radius: f64,
        width: f64,
        color: Rgba,
    ) -> Result<()> {
        check_points(&[center])?;
        check_values(&[radius, width])?;
        if radius <= 0.0 {
            return Ok(());
        }
        self.ctx.set_paint(paint(color));
        self.ctx.set_stroke(Stroke::new(width.max(0.1)));
        self.ctx
            .stroke_path(&Circle::new(center, radius).to_path(CIRCLE_TOLERANCE));
        Ok(())
    }

    pub fn fill_polygon(&mut self, points: &[Point], color: Rgba) -> Result<()> {
        if points.len() < 3 {
            return Ok(());
        }
        let path = polyline(points, true)?;
        self.ctx.set_paint(paint(color));
        self.ctx.fill_path(&path);
        Ok(())
    }

    pub fn stroke_polyline(
        &mut self,
        points: &[Point],
        closed: bool,
        width: f64,
        color: Rgba,
    ) -> Result<()> {
        if points.len() < 2 {
            return Ok(());
        }
        check_values(&[width])?;
        let path = polyline(points, closed)?;
        self.ctx.set_paint(paint(color));
        self.ctx.set_stroke(Stroke::new(width.max(0.1)));
        self.ctx.stroke_path(&path);
        Ok(())
    }

    pub fn stroke_line(&mut self, from: Point, to: Point, width: f64, color: Rgba) -> Result<()> {
        self.stroke_polyline(&[from, to], false, width, color)
    }

    /// Rasterises everything drawn so far into a premultiplied raster.
    pub fn finish(mut self) -> Result<Raster> {
        let mut pixmap = Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        Raster::from_parts(
            u32::from(self.width),
            u32::from(self.height),
            pixmap.data_as_u8_slice().to_vec(),
        )
    }
}

fn paint(color: Rgba) -> Color {
    Color::from_rgba8(color[0], color[1], color[2], color[3])
}

fn polyline(points: &[Point], closed: bool) -> Result<BezPath> {
    check_points(points)?;
    let mut path = BezPath::new();
    path.move_to(points[0]);
    for p in &points[1..] {
        path.line_to(*p);
    }
    if closed {
        path.close_path();
    }
    Ok(path)
}

fn check_points(points: &[Point]) -> Result<()> {
    if points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
        Ok(())
    } else {
        Err(BeatscapeError::render("non-finite coordinate in module geometry"))
    }
}

fn check_values(values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(BeatscapeError::render("non-finite size in module geometry"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_pixels_premultiplied() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        canvas.fill_rect(0.0, 0.0, 8.0, 8.0, [255, 0, 0, 255]).unwrap();
        let raster = canvas.finish().unwrap();
        assert_eq!(raster.pixel(4, 4), [255, 0, 0, 255]);
    }

    #[test]
    fn empty_canvas_is_transparent() {
        let raster = Canvas::new(4, 2).unwrap().finish().unwrap();
        assert!(raster.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn rejects_non_finite_geometry() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        let err = canvas
            .stroke_line(Point::new(0.0, 0.0), Point::new(f64::NAN, 1.0), 1.0, [255; 4])
            .unwrap_err();
        assert!(matches!(err, BeatscapeError::Render(_)));
        assert!(canvas.fill_circle(Point::ZERO, f64::INFINITY, [255; 4]).is_err());
    }

    #[test]
    fn rejects_oversized_canvas() {
        assert!(Canvas::new(70_000, 10).is_err());
        assert!(Canvas::new(0, 10).is_err());
    }
}
