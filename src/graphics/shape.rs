use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use super::vertex::{Mesh, Topology, Vertex};
use crate::audio::{BarFrame, Channel};
use crate::config::Config;

/// Canvas never shrinks below this in either direction.
pub const MIN_CANVAS: u32 = 10;

/// Triangles per rounded corner.
const CORNER_SEGMENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMode {
    /// One-pixel line strip through the bar tops.
    #[default]
    Thin,
    /// Ribbon of `wire_thickness` below the tops.
    Thick,
    /// Area between the tops and the baseline.
    Fill,
    /// Area between the tops and the far edge of the canvas.
    FillInverted,
}

/// How bar magnitudes are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualShape {
    Bars { rounded: bool },
    /// Bars standing on a circle. `padding` is the fraction of the circle
    /// left empty, `offset_deg` rotates the whole ring.
    CircleBars { padding: f64, offset_deg: f64 },
    Wire(WireMode),
}

impl Default for VisualShape {
    fn default() -> Self {
        VisualShape::Bars { rounded: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    RoundedRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
    },
    /// A bar of `width` x `length` whose inner edge sits `radius` away from
    /// `center`, rotated by `angle` radians.
    RotatedRect {
        center: [f32; 2],
        radius: f32,
        angle: f32,
        width: f32,
        length: f32,
    },
    Strip(Mesh),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl VisualShape {
    fn circle_radius(cfg: &Config, padding: f64) -> f32 {
        let spectrum_width = (cfg.bar_width as f32 + cfg.bar_space as f32) * cfg.detail as f32;
        spectrum_width * (1.0 + padding as f32) / TAU
    }

    pub fn canvas(&self, cfg: &Config) -> Canvas {
        match self {
            VisualShape::CircleBars { padding, .. } => {
                let side = Self::circle_radius(cfg, *padding) * 2.0 + cfg.bar_height as f32 * 2.0;
                // float to int casts saturate
                let side = (side.ceil() as u32).max(MIN_CANVAS);
                Canvas {
                    width: side,
                    height: side,
                }
            }
            VisualShape::Bars { .. } | VisualShape::Wire(_) => {
                let detail = u32::try_from(cfg.detail).unwrap_or(u32::MAX);
                let span = detail.saturating_mul(cfg.bar_width.saturating_add(cfg.bar_space));
                let height = if cfg.stereo {
                    cfg.bar_height.saturating_add(cfg.stereo_space)
                } else {
                    cfg.bar_height
                };
                Canvas {
                    width: span.saturating_sub(cfg.bar_space).max(MIN_CANVAS),
                    height: height.max(MIN_CANVAS),
                }
            }
        }
    }

    /// Turn one frame of bars into drawable primitives.
    pub fn layout(&self, frame: &BarFrame, cfg: &Config) -> Vec<Primitive> {
        match self {
            VisualShape::Bars { rounded } => layout_bars(frame, cfg, *rounded),
            VisualShape::CircleBars {
                padding,
                offset_deg,
            } => layout_circle(frame, cfg, *padding, *offset_deg),
            VisualShape::Wire(mode) => layout_wire(frame, cfg, *mode, self.canvas(cfg)),
        }
    }
}

fn bar_x(i: usize, cfg: &Config) -> f32 {
    i as f32 * (cfg.bar_width as f32 + cfg.bar_space as f32)
}

/// Whole-pixel height, at least one pixel and at most `limit`.
fn pixel_height(value: f64, limit: u32) -> f32 {
    let limit = limit.max(1) as f64;
    value.max(1.0).round().min(limit) as f32
}

fn bar_rect(x: f32, y: f32, width: f32, height: f32, rounded: bool) -> Primitive {
    if rounded {
        Primitive::RoundedRect {
            x,
            y,
            width,
            height,
            radius: (width / 2.0).min(height / 2.0),
        }
    } else {
        Primitive::Rect {
            x,
            y,
            width,
            height,
        }
    }
}

fn layout_bars(frame: &BarFrame, cfg: &Config, rounded: bool) -> Vec<Primitive> {
    let width = cfg.bar_width as f32;
    let mut out = Vec::new();

    if frame.is_stereo() {
        let half = cfg.bar_height / 2;
        let top = half as f32;
        let bottom = half as f32 + cfg.stereo_space as f32;
        let left = frame.channel(Channel::Left).unwrap_or(&[]);
        let right = frame.channel(Channel::Right).unwrap_or(&[]);

        for (i, (l, r)) in left.iter().zip(right).enumerate() {
            let x = bar_x(i, cfg);
            let hl = pixel_height(*l, half);
            let hr = pixel_height(*r, half);
            out.push(bar_rect(x, top - hl, width, hl, rounded));
            out.push(bar_rect(x, bottom, width, hr, rounded));
        }
    } else {
        let base = cfg.bar_height as f32;
        for (i, value) in frame.channel(Channel::Left).unwrap_or(&[]).iter().enumerate() {
            let h = pixel_height(*value, cfg.bar_height);
            out.push(bar_rect(bar_x(i, cfg), base - h, width, h, rounded));
        }
    }
    out
}

fn layout_circle(frame: &BarFrame, cfg: &Config, padding: f64, offset_deg: f64) -> Vec<Primitive> {
    let bars = frame.channel(Channel::Left).unwrap_or(&[]);
    if bars.is_empty() {
        return Vec::new();
    }

    let radius = VisualShape::circle_radius(cfg, padding);
    let side = radius * 2.0 + cfg.bar_height as f32 * 2.0;
    let center = [side / 2.0, side / 2.0];
    let sweep = TAU - padding as f32 * TAU;
    let offset = (offset_deg as f32).to_radians();
    let count = bars.len() as f32;

    bars.iter()
        .enumerate()
        .map(|(i, value)| Primitive::RotatedRect {
            center,
            radius,
            angle: i as f32 / count * sweep + offset,
            width: cfg.bar_width as f32,
            length: value.max(1.0) as f32,
        })
        .collect()
}

fn layout_wire(frame: &BarFrame, cfg: &Config, mode: WireMode, canvas: Canvas) -> Vec<Primitive> {
    let thickness = cfg.wire_thickness as f32;
    let topology = match mode {
        WireMode::Thin => Topology::LineStrip,
        _ => Topology::TriangleStrip,
    };

    // (baseline, direction bars grow in, far edge for inverted fill)
    let channels: Vec<(Channel, f32, f32, f32)> = if frame.is_stereo() {
        let half = (cfg.bar_height / 2) as f32;
        vec![
            (Channel::Left, half, -1.0, 0.0),
            (
                Channel::Right,
                half + cfg.stereo_space as f32,
                1.0,
                canvas.height as f32,
            ),
        ]
    } else {
        vec![(Channel::Left, cfg.bar_height as f32, -1.0, 0.0)]
    };

    let mut out = Vec::new();
    for (channel, baseline, dir, far_edge) in channels {
        let Some(bars) = frame.channel(channel) else {
            continue;
        };

        let mut mesh = Mesh::new(topology);
        for (i, value) in bars.iter().enumerate() {
            let x = bar_x(i, cfg);
            let tip = baseline + dir * value.max(1.0).round() as f32;
            mesh.vertices.push(Vertex::new(x, tip));
            match mode {
                WireMode::Thin => {}
                WireMode::Thick => mesh.vertices.push(Vertex::new(x, tip - dir * thickness)),
                WireMode::Fill => mesh.vertices.push(Vertex::new(x, baseline)),
                WireMode::FillInverted => mesh.vertices.push(Vertex::new(x, far_edge)),
            }
        }
        out.push(Primitive::Strip(mesh));
    }
    out
}

impl Primitive {
    /// Triangulate into canvas-space vertices. Strips are returned as-is.
    pub fn tessellate(&self) -> Mesh {
        match self {
            Primitive::Rect {
                x,
                y,
                width,
                height,
            } => {
                let mut mesh = Mesh::new(Topology::TriangleList);
                push_rect(&mut mesh, *x, *y, *width, *height);
                mesh
            }
            Primitive::RoundedRect {
                x,
                y,
                width,
                height,
                radius,
            } => rounded_rect(*x, *y, *width, *height, *radius),
            Primitive::RotatedRect {
                center,
                radius,
                angle,
                width,
                length,
            } => {
                let (sin, cos) = angle.sin_cos();
                let place = |lx: f32, ly: f32| {
                    Vertex::new(center[0] + lx * cos - ly * sin, center[1] + lx * sin + ly * cos)
                };
                let mut mesh = Mesh::new(Topology::TriangleList);
                mesh.push_quad(
                    place(0.0, *radius),
                    place(*width, *radius),
                    place(*width, radius + length),
                    place(0.0, radius + length),
                );
                mesh
            }
            Primitive::Strip(mesh) => mesh.clone(),
        }
    }
}

fn push_rect(mesh: &mut Mesh, x: f32, y: f32, width: f32, height: f32) {
    mesh.push_quad(
        Vertex::new(x, y),
        Vertex::new(x + width, y),
        Vertex::new(x + width, y + height),
        Vertex::new(x, y + height),
    );
}

fn rounded_rect(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Mesh {
    let r = radius.clamp(0.0, (width / 2.0).min(height / 2.0));
    let mut mesh = Mesh::new(Topology::TriangleList);
    if r <= 0.0 {
        push_rect(&mut mesh, x, y, width, height);
        return mesh;
    }

    // cross of two rectangles, then a fan in each corner
    push_rect(&mut mesh, x + r, y, width - 2.0 * r, height);
    push_rect(&mut mesh, x, y + r, r, height - 2.0 * r);
    push_rect(&mut mesh, x + width - r, y + r, r, height - 2.0 * r);

    let corners = [
        (x + r, y + r, PI),
        (x + width - r, y + r, -FRAC_PI_2),
        (x + width - r, y + height - r, 0.0),
        (x + r, y + height - r, FRAC_PI_2),
    ];
    for (cx, cy, start) in corners {
        let center = Vertex::new(cx, cy);
        for s in 0..CORNER_SEGMENTS {
            let a0 = start + FRAC_PI_2 * s as f32 / CORNER_SEGMENTS as f32;
            let a1 = start + FRAC_PI_2 * (s + 1) as f32 / CORNER_SEGMENTS as f32;
            mesh.push_triangle(
                center,
                Vertex::new(cx + r * a0.cos(), cy + r * a0.sin()),
                Vertex::new(cx + r * a1.cos(), cy + r * a1.sin()),
            );
        }
    }
    mesh
}
