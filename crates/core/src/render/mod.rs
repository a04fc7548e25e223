//! Drawing primitives and the surface abstraction the visualizer paints on.

mod color;

pub use color::{Color, Rgba};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, to: Point },
}

/// Open polyline/curve description handed to [`DrawSurface::stroke_path`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, to: Point) -> &mut Self {
        self.segments.push(PathSegment::MoveTo(to));
        self
    }

    pub fn line_to(&mut self, to: Point) -> &mut Self {
        self.segments.push(PathSegment::LineTo(to));
        self
    }

    pub fn quad_to(&mut self, control: Point, to: Point) -> &mut Self {
        self.segments.push(PathSegment::QuadTo { control, to });
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Smooth curve through `points`: each segment bends at a sample and ends
    /// halfway to the next one, finishing with a straight run to the last
    /// point.
    pub fn smooth_through(points: &[Point]) -> Self {
        let mut path = Path::new();
        let Some((first, rest)) = points.split_first() else {
            return path;
        };

        path.move_to(*first);
        let mut previous = *first;
        for point in rest {
            path.quad_to(previous, previous.midpoint(*point));
            previous = *point;
        }
        if !rest.is_empty() {
            path.line_to(previous);
        }
        path
    }

    /// Every end point in order, useful for inspecting rendered output.
    pub fn end_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.segments.iter().map(|segment| match *segment {
            PathSegment::MoveTo(to) | PathSegment::LineTo(to) => to,
            PathSegment::QuadTo { to, .. } => to,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgba,
}

/// Horizontal linear gradient from `x0` to `x1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub x0: f32,
    pub x1: f32,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    /// Three-stop edge/middle/edge gradient across `width`.
    pub fn symmetric(width: f32, edge: Rgba, middle: Rgba) -> Self {
        Self {
            x0: 0.0,
            x1: width,
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: edge,
                },
                GradientStop {
                    offset: 0.5,
                    color: middle,
                },
                GradientStop {
                    offset: 1.0,
                    color: edge,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Gradient(LinearGradient),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub blur: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub paint: Paint,
    pub width: f32,
    pub shadow: Option<Shadow>,
}

/// Canvas-like target. Coordinates are logical pixels; implementations apply
/// the device pixel ratio given to [`DrawSurface::resize`].
pub trait DrawSurface {
    fn resize(&mut self, physical_width: u32, physical_height: u32, scale: f32);
    fn clear(&mut self);
    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Stroke { path: Path, style: StrokeStyle },
}

/// Surface that records calls instead of rasterising them.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub physical_width: u32,
    pub physical_height: u32,
    pub scale: f32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Strokes issued since the most recent clear.
    pub fn current_strokes(&self) -> Vec<(&Path, &StrokeStyle)> {
        let start = self
            .commands
            .iter()
            .rposition(|command| *command == DrawCommand::Clear)
            .map(|index| index + 1)
            .unwrap_or(0);

        self.commands[start..]
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Stroke { path, style } => Some((path, style)),
                DrawCommand::Clear => None,
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl DrawSurface for RecordingSurface {
    fn resize(&mut self, physical_width: u32, physical_height: u32, scale: f32) {
        self.physical_width = physical_width;
        self.physical_height = physical_height;
        self.scale = scale;
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle) {
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            style: style.clone(),
        });
    }
}
