// Tile state and the ISP stage: 32x32 buffers for depth, stencil, tags and
// color accumulation, the FPU parameter cache, half-space triangle
// rasterization and the per-mode depth/tag rules.

use crate::lists::decode_param_block;
use crate::regs::Registers;
use crate::types::{
    DrawParameters, ParamTag, RenderMode, Vertex, TAG_MAX, TAG_SORT_MASK,
};
use crate::vram::Vram;

pub const TILE_SIZE: usize = 32;
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

// Depth plane roles.
pub const DEPTH_TEST: usize = 0;
pub const DEPTH_REF: usize = 1;
pub const DEPTH_SAVE: usize = 2;

// Tag plane roles.
pub const TAG_CURRENT: usize = 0;
pub const TAG_PREV: usize = 1;

// Accumulator roles.
pub const ACCUM_OUT: usize = 0;
pub const ACCUM_AUX: usize = 1;

// Stencil bits.
pub const STENCIL_IN_VOLUME: u8 = 0b001;
pub const STENCIL_OR: u8 = 0b010;
pub const STENCIL_AND: u8 = 0b100;

/// Screen-space rectangle of the tile being rendered.
#[derive(Copy, Clone, Debug)]
pub struct TileRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Per-pixel shading state. `valid` marks a tag awaiting the TSP pass,
/// `rendered` marks a punch-through pixel whose color is locked in.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct PixelStatus {
    pub valid: bool,
    pub rendered: bool,
}

const STATUS_CLEAR: PixelStatus = PixelStatus {
    valid: false,
    rendered: false,
};

pub struct TileBuffers {
    pub depth: [[f32; TILE_PIXELS]; 3],
    pub tag: [[u32; TILE_PIXELS]; 2],
    pub status: [PixelStatus; TILE_PIXELS],
    pub stencil: [u8; TILE_PIXELS],
    pub accum: [[u32; TILE_PIXELS]; 2],
    /// Set by the ISP whenever a peel pass finds work for another iteration.
    pub more_to_draw: bool,
    /// Whether an AND fold has run for the current stencil phase.
    and_folded: bool,
}

impl TileBuffers {
    pub fn new() -> Self {
        Self {
            depth: [[0.0; TILE_PIXELS]; 3],
            tag: [[0; TILE_PIXELS]; 2],
            status: [STATUS_CLEAR; TILE_PIXELS],
            stencil: [0; TILE_PIXELS],
            accum: [[0; TILE_PIXELS]; 2],
            more_to_draw: false,
            and_folded: false,
        }
    }

    /// Full tile reset: background tag and depth everywhere, accumulator
    /// seeded with the border color.
    pub fn clear(&mut self, bg_tag: u32, bg_depth: f32, border_color: u32) {
        self.depth[DEPTH_TEST].fill(bg_depth);
        self.stencil.fill(0);
        self.and_folded = false;
        self.tag[TAG_CURRENT].fill(bg_tag);
        self.status.fill(PixelStatus {
            valid: true,
            rendered: false,
        });
        self.accum[ACCUM_OUT].fill(border_color);
        self.accum[ACCUM_AUX].fill(0);
    }

    /// z-keep reset: depth, tags and accumulated color survive.
    pub fn clear_status(&mut self) {
        self.status.fill(STATUS_CLEAR);
    }

    /// Entering the punch-through phase: snapshot the depth for alpha-test
    /// feedback and reset shading state.
    pub fn peel_punchthrough_initial(&mut self) {
        self.depth[DEPTH_SAVE] = self.depth[DEPTH_TEST];
        self.status.fill(STATUS_CLEAR);
        self.stencil.fill(0);
        self.and_folded = false;
    }

    /// Latch the punch-through reference layer for the next peel iteration.
    pub fn peel_punchthrough(&mut self) {
        self.depth[DEPTH_REF] = self.depth[DEPTH_TEST];
        self.tag[TAG_PREV] = self.tag[TAG_CURRENT];
    }

    /// Start a translucent auto-sort peel iteration: the depth test buffer
    /// becomes the reference, then opens back up to the far plane.
    pub fn peel_translucent(&mut self) {
        self.depth[DEPTH_REF] = self.depth[DEPTH_TEST];
        self.tag[TAG_PREV] = self.tag[TAG_CURRENT];
        self.depth[DEPTH_TEST].fill(f32::MAX);
        self.status.fill(STATUS_CLEAR);
        self.stencil.fill(0);
        self.and_folded = false;
    }

    pub fn set_tag_to_max(&mut self) {
        self.tag[TAG_CURRENT].fill(TAG_MAX);
    }

    /// OR-fold the current modifier volume into the accumulator bit.
    pub fn summarize_stencil_or(&mut self) {
        for st in self.stencil.iter_mut() {
            if *st & STENCIL_IN_VOLUME != 0 {
                *st |= STENCIL_OR;
            }
            *st &= !STENCIL_IN_VOLUME;
        }
    }

    /// AND-fold the current modifier volume. The first fold of a phase seeds
    /// the accumulator, later folds intersect with it.
    pub fn summarize_stencil_and(&mut self) {
        let first = !self.and_folded;
        for st in self.stencil.iter_mut() {
            let inside = *st & STENCIL_IN_VOLUME != 0;
            if first {
                if inside {
                    *st |= STENCIL_AND;
                }
            } else if !inside {
                *st &= !STENCIL_AND;
            }
            *st &= !STENCIL_IN_VOLUME;
        }
        self.and_folded = true;
    }

    /// Final inside-the-volume test after all folds.
    #[inline]
    pub fn in_volume(&self, index: usize) -> bool {
        let st = self.stencil[index];
        st & STENCIL_OR != 0 && (!self.and_folded || st & STENCIL_AND != 0)
    }
}

/// Triangle geometry shared by every interpolated attribute: edge deltas and
/// the inverse determinant, with vertex 1 rebased to the tile origin.
#[derive(Copy, Clone, Default)]
pub struct PlaneSetup {
    dx1: f32,
    dx2: f32,
    dy1: f32,
    dy2: f32,
    det_inv: f32,
    x1: f32,
    y1: f32,
}

impl PlaneSetup {
    pub fn new(rect: &TileRect, v1: &Vertex, v2: &Vertex, v3: &Vertex) -> Self {
        let dx1 = v2.x - v1.x;
        let dx2 = v3.x - v1.x;
        let dy1 = v2.y - v1.y;
        let dy2 = v3.y - v1.y;

        let det = dx1 * dy2 - dx2 * dy1;
        let det_inv = if det.abs() < 0.0001 { 0.0 } else { 1.0 / det };

        Self {
            dx1,
            dx2,
            dy1,
            dy2,
            det_inv,
            x1: v1.x - rect.left as f32,
            y1: v1.y - rect.top as f32,
        }
    }

    /// The depth plane carries no meaning on a degenerate triangle; such
    /// primitives are skipped by the rasterizer.
    #[inline]
    pub fn degenerate(&self) -> bool {
        self.det_inv == 0.0
    }
}

/// Interpolation plane for one scalar attribute over a triangle.
#[derive(Copy, Clone, Default)]
pub struct PlaneStepper {
    pub ddx: f32,
    pub ddy: f32,
    pub c: f32,
}

impl PlaneStepper {
    pub fn setup(geom: &PlaneSetup, val1: f32, val2: f32, val3: f32) -> Self {
        let dv1 = val2 - val1;
        let dv2 = val3 - val1;

        let ddx = (dv1 * geom.dy2 - dv2 * geom.dy1) * geom.det_inv;
        let ddy = (dv2 * geom.dx1 - dv1 * geom.dx2) * geom.det_inv;
        let c = val1 - ddx * geom.x1 - ddy * geom.y1;

        Self { ddx, ddy, c }
    }

    #[inline]
    pub fn ip(&self, x: f32, y: f32) -> f32 {
        self.c + self.ddx * x + self.ddy * y
    }

    /// Perspective-corrected interpolation clamped to a color channel.
    #[inline]
    pub fn ip_u8(&self, x: f32, y: f32, w: f32) -> u8 {
        (self.ip(x, y) * w).clamp(0.0, 255.0) as u8
    }
}

/// Per-primitive interpolators, set up once per FPU cache fill. Attribute
/// values are premultiplied by 1/w for perspective correction.
#[derive(Copy, Clone, Default)]
pub struct InterpolatedParams {
    pub inv_w: PlaneStepper,
    pub col: [[PlaneStepper; 4]; 2],
    pub ofs: [[PlaneStepper; 4]; 2],
    pub u: [PlaneStepper; 2],
    pub v: [PlaneStepper; 2],
}

impl InterpolatedParams {
    pub fn setup(
        &mut self,
        rect: &TileRect,
        params: &DrawParameters,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
        two_volumes: bool,
    ) {
        let geom = PlaneSetup::new(rect, v1, v2, v3);

        self.inv_w = PlaneStepper::setup(&geom, v1.z, v2.z, v3.z);

        self.u[0] = PlaneStepper::setup(&geom, v1.u * v1.z, v2.u * v2.z, v3.u * v3.z);
        self.v[0] = PlaneStepper::setup(&geom, v1.v * v1.z, v2.v * v2.z, v3.v * v3.z);

        // Flat shading latches the colors of the last strip vertex.
        let gouraud = params.isp.gouraud();
        for i in 0..4 {
            let (c1, c2, c3) = if gouraud {
                (v1.col[i], v2.col[i], v3.col[i])
            } else {
                (v3.col[i], v3.col[i], v3.col[i])
            };
            self.col[0][i] = PlaneStepper::setup(
                &geom,
                c1 as f32 * v1.z,
                c2 as f32 * v2.z,
                c3 as f32 * v3.z,
            );

            let (s1, s2, s3) = if gouraud {
                (v1.spc[i], v2.spc[i], v3.spc[i])
            } else {
                (v3.spc[i], v3.spc[i], v3.spc[i])
            };
            self.ofs[0][i] = PlaneStepper::setup(
                &geom,
                s1 as f32 * v1.z,
                s2 as f32 * v2.z,
                s3 as f32 * v3.z,
            );
        }

        if two_volumes {
            self.u[1] = PlaneStepper::setup(&geom, v1.u1 * v1.z, v2.u1 * v2.z, v3.u1 * v3.z);
            self.v[1] = PlaneStepper::setup(&geom, v1.v1 * v1.z, v2.v1 * v2.z, v3.v1 * v3.z);

            for i in 0..4 {
                let (c1, c2, c3) = if gouraud {
                    (v1.col1[i], v2.col1[i], v3.col1[i])
                } else {
                    (v3.col1[i], v3.col1[i], v3.col1[i])
                };
                self.col[1][i] = PlaneStepper::setup(
                    &geom,
                    c1 as f32 * v1.z,
                    c2 as f32 * v2.z,
                    c3 as f32 * v3.z,
                );

                let (s1, s2, s3) = if gouraud {
                    (v1.spc1[i], v2.spc1[i], v3.spc1[i])
                } else {
                    (v3.spc1[i], v3.spc1[i], v3.spc1[i])
                };
                self.ofs[1][i] = PlaneStepper::setup(
                    &geom,
                    s1 as f32 * v1.z,
                    s2 as f32 * v2.z,
                    s3 as f32 * v3.z,
                );
            }
        }
    }
}

/// Decoded parameters plus interpolators for one tagged primitive.
#[derive(Copy, Clone, Default)]
pub struct FpuEntry {
    pub params: DrawParameters,
    pub ips: InterpolatedParams,
}

#[derive(Copy, Clone, Default)]
struct FpuSlot {
    valid: bool,
    tag: u32,
    entry: FpuEntry,
}

/// Direct-mapped cache from parameter tag to decoded draw state, reset per
/// tile. Tags with the cache-bypass bit decode fresh every lookup.
pub struct FpuCache {
    slots: [FpuSlot; 32],
}

impl FpuCache {
    pub fn new() -> Self {
        Self {
            slots: [FpuSlot::default(); 32],
        }
    }

    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.valid = false;
        }
    }

    /// Resolve a tag to its draw state, filling the slot on a miss.
    pub fn entry(
        &mut self,
        vram: &Vram,
        regs: Registers,
        rect: &TileRect,
        tag: ParamTag,
    ) -> &FpuEntry {
        let index = (tag.param_offs_in_words() & 31) as usize;
        let slot = &mut self.slots[index];

        if slot.valid && slot.tag == tag.full() {
            return &slot.entry;
        }

        let param_base = regs.param_base() & 0xF0_0000;
        let param_addr = param_base + tag.param_offs_in_words() * 4;
        let two_volumes = tag.shadow() && !regs.fpu_shad_scale().intensity_shadow();

        let mut vtx = [Vertex::default(); 3];
        decode_param_block(
            vram,
            &mut slot.entry.params,
            param_addr,
            tag.skip(),
            two_volumes,
            &mut vtx,
            tag.tag_offset(),
        );

        slot.entry
            .ips
            .setup(rect, &slot.entry.params, &vtx[0], &vtx[1], &vtx[2], two_volumes);

        slot.valid = !tag.cache_bypass();
        slot.tag = tag.full();

        &slot.entry
    }
}

#[inline]
fn flush_nan(a: f32) -> f32 {
    if a.is_nan() {
        0.0
    } else {
        a
    }
}

/// Fill rule: edges on the top or left of the primitive own their pixels.
#[inline]
fn is_top_left(dx: f32, dy: f32) -> bool {
    let is_top = dy == 0.0 && dx > 0.0;
    let is_left = dy < 0.0;
    is_top || is_left
}

/// Depth test, depth/tag write and stencil update for one covered pixel.
/// Dispatch over the render mode implements the per-pass rules of the pass
/// driver, including the peel tie-breaks on tag order.
#[allow(clippy::too_many_arguments)]
fn pixel_flush_isp(
    tile: &mut TileBuffers,
    render_mode: RenderMode,
    depth_mode: u32,
    z_write_dis: bool,
    inv_w: f32,
    index: usize,
    tag: u32,
) {
    let depth_prev = tile.depth[DEPTH_REF][index];
    let tag_prev = tile.tag[TAG_PREV][index];

    // Peel passes and modifier volumes override the primitive's depth mode.
    let mode = match render_mode {
        RenderMode::PunchthroughPass0 | RenderMode::PunchthroughPassN => 6,
        RenderMode::TranslucentAutosort => 3,
        RenderMode::Modifier => 6,
        _ => depth_mode,
    };

    // Depth values are 1/w: greater is nearer.
    let depth_test = tile.depth[DEPTH_TEST][index];
    let passed = match mode {
        0 => return,
        1 => inv_w < depth_test,
        2 => inv_w == depth_test,
        3 => {
            if inv_w > depth_test {
                if render_mode == RenderMode::TranslucentAutosort {
                    tile.more_to_draw = true;
                }
                return;
            }
            true
        }
        4 => inv_w > depth_test,
        5 => inv_w != depth_test,
        6 => inv_w >= depth_test,
        7 => true,
        _ => return,
    };

    if !passed {
        return;
    }

    match render_mode {
        RenderMode::Opaque | RenderMode::TranslucentPresort => {
            if !z_write_dis {
                tile.depth[DEPTH_TEST][index] = inv_w;
            }
            tile.tag[TAG_CURRENT][index] = tag;
            tile.status[index].valid = true;
        }

        RenderMode::Modifier => {
            tile.stencil[index] ^= STENCIL_IN_VOLUME;
        }

        RenderMode::PunchthroughPass0 => {
            tile.depth[DEPTH_TEST][index] = inv_w;
            tile.tag[TAG_CURRENT][index] = tag;
            tile.status[index].valid = true;
        }

        RenderMode::PunchthroughPassN => {
            if tile.status[index].rendered {
                return;
            }
            if inv_w > depth_prev {
                return;
            }
            if (inv_w == depth_prev || inv_w == tile.depth[DEPTH_TEST][index])
                && tag & TAG_SORT_MASK <= tag_prev & TAG_SORT_MASK
            {
                return;
            }
            tile.more_to_draw = true;
            tile.depth[DEPTH_TEST][index] = inv_w;
            tile.tag[TAG_CURRENT][index] = tag;
        }

        RenderMode::TranslucentAutosort => {
            // Only depths strictly inside the current peel window qualify;
            // coplanar layers are ordered by tag, greater tag on top.
            if inv_w < depth_prev {
                return;
            }
            if inv_w == depth_prev
                && tag & TAG_SORT_MASK <= tag_prev & TAG_SORT_MASK
                && tag_prev != TAG_MAX
            {
                return;
            }
            if inv_w == tile.depth[DEPTH_TEST][index] {
                if tag & TAG_SORT_MASK <= tag_prev & TAG_SORT_MASK && tag_prev != TAG_MAX {
                    return;
                }
                if tile.status[index].valid {
                    let tag_pending = tile.tag[TAG_CURRENT][index];
                    if tag & TAG_SORT_MASK > tag_pending & TAG_SORT_MASK {
                        tile.more_to_draw = true;
                        return;
                    }
                }
            }
            tile.depth[DEPTH_TEST][index] = inv_w;
            if tile.status[index].valid {
                tile.more_to_draw = true;
            }
            tile.status[index].valid = true;
            tile.tag[TAG_CURRENT][index] = tag;
        }

        RenderMode::PunchthroughMv => {}
    }
}

/// Half-space rasterization of one triangle or quad over the tile. Quads
/// share the v1-v3 diagonal and contribute a fourth edge; coverage is tested
/// at pixel centers biased by the configured half offset.
#[allow(clippy::too_many_arguments)]
pub fn rasterize_triangle(
    regs: Registers,
    tile: &mut TileBuffers,
    render_mode: RenderMode,
    params: &DrawParameters,
    tag: ParamTag,
    v1: &Vertex,
    v2: &Vertex,
    v3: &Vertex,
    v4: Option<&Vertex>,
    rect: &TileRect,
) {
    let x1 = flush_nan(v1.x);
    let x2 = flush_nan(v2.x);
    let x3 = flush_nan(v3.x);
    let x4 = v4.map_or(0.0, |v| flush_nan(v.x));

    let y1 = flush_nan(v1.y);
    let y2 = flush_nan(v2.y);
    let y3 = flush_nan(v3.y);
    let y4 = v4.map_or(0.0, |v| flush_nan(v.y));

    let tri_area = (x1 - x3) * (y2 - y3) - (y1 - y3) * (x2 - x3);
    let sgn = if tri_area > 0.0 { -1.0 } else { 1.0 };

    let cull_mode = params.isp.cull_mode();
    if cull_mode != 0 {
        if tri_area.abs() < regs.fpu_cull_val() {
            return;
        }

        if cull_mode >= 2 {
            let flip = cull_mode & 1;
            if (flip == 0 && tri_area < 0.0) || (flip == 1 && tri_area > 0.0) {
                return;
            }
        }
    }

    let geom = PlaneSetup::new(rect, v1, v2, v3);
    if geom.degenerate() {
        log::trace!("degenerate depth plane, primitive skipped (tag {:#010X})", tag.full());
        return;
    }
    let z_plane = PlaneStepper::setup(&geom, v1.z, v2.z, v3.z);

    // Half-edge constants, wound by the area sign so inside is positive.
    let dx12 = sgn * (x1 - x2);
    let dx23 = sgn * (x2 - x3);
    let dx31 = if v4.is_some() { sgn * (x3 - x4) } else { sgn * (x3 - x1) };
    let dx41 = if v4.is_some() { sgn * (x4 - x1) } else { 0.0 };

    let dy12 = sgn * (y1 - y2);
    let dy23 = sgn * (y2 - y3);
    let dy31 = if v4.is_some() { sgn * (y3 - y4) } else { sgn * (y3 - y1) };
    let dy41 = if v4.is_some() { sgn * (y4 - y1) } else { 0.0 };

    let left = rect.left as f32;
    let top = rect.top as f32;
    let c1 = dy12 * (x1 - left) - dx12 * (y1 - top);
    let c2 = dy23 * (x2 - left) - dx23 * (y2 - top);
    let c3 = dy31 * (x3 - left) - dx31 * (y3 - top);
    let c4 = if v4.is_some() {
        dy41 * (x4 - left) - dx41 * (y4 - top)
    } else {
        1.0
    };

    let t1 = is_top_left(x2 - x1, y2 - y1);
    let t2 = is_top_left(x3 - x2, y3 - y2);
    let (t3, t4) = if v4.is_some() {
        (is_top_left(x4 - x3, y4 - y3), is_top_left(x1 - x4, y1 - y4))
    } else {
        (is_top_left(x1 - x3, y1 - y3), true)
    };

    let halfpixel = if regs.half_offset().fpu_pixel_half_offset() {
        0.5
    } else {
        0.0
    };

    let depth_mode = params.isp.depth_mode();
    let z_write_dis = params.isp.z_write_dis();
    let tag = tag.full();

    let mut y_ps = halfpixel;
    for y in 0..TILE_SIZE {
        // Reject the scanline when any edge excludes both of its ends.
        let span = TILE_SIZE as f32 + 0.5;
        let l12 = c1 + dx12 * y_ps;
        let l23 = c2 + dx23 * y_ps;
        let l31 = c3 + dx31 * y_ps;
        let l41 = c4 + dx41 * y_ps;
        if (l12 < 0.0 && l12 - dy12 * span < 0.0)
            || (l23 < 0.0 && l23 - dy23 * span < 0.0)
            || (l31 < 0.0 && l31 - dy31 * span < 0.0)
            || (l41 < 0.0 && l41 - dy41 * span < 0.0)
        {
            y_ps += 1.0;
            continue;
        }

        let mut x_ps = halfpixel;
        for x in 0..TILE_SIZE {
            let e12 = l12 - dy12 * x_ps;
            let e23 = l23 - dy23 * x_ps;
            let e31 = l31 - dy31 * x_ps;
            let e41 = l41 - dy41 * x_ps;

            let inside = (e12 > 0.0 || (t1 && e12 == 0.0))
                && (e23 > 0.0 || (t2 && e23 == 0.0))
                && (e31 > 0.0 || (t3 && e31 == 0.0))
                && (e41 > 0.0 || (t4 && e41 == 0.0));

            if inside {
                let index = y * TILE_SIZE + x;
                let inv_w = z_plane.ip(x_ps, y_ps);
                pixel_flush_isp(
                    tile,
                    render_mode,
                    depth_mode,
                    z_write_dis,
                    inv_w,
                    index,
                    tag,
                );
            }

            x_ps += 1.0;
        }

        y_ps += 1.0;
    }
}
