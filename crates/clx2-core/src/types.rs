// Wire-format words shared by the display-list decoder and the pixel
// pipeline. All layouts are little-endian 32-bit words read out of VRAM;
// bit positions are explicit, nothing relies on compiler struct layout.

use bitfield::bitfield;

bitfield! {
    /// ISP/TSP instruction word of a parameter block.
    #[derive(Copy, Clone)]
    pub struct Isp(u32);
    impl Debug;

    pub dcalc_ctrl, set_dcalc_ctrl: 20;
    pub cache_bypass, set_cache_bypass: 21;
    pub uv_16b, set_uv_16b: 22;
    pub gouraud, set_gouraud: 23;
    pub offset, set_offset: 24;
    pub texture, set_texture: 25;
    pub z_write_dis, set_z_write_dis: 26;
    pub cull_mode, set_cull_mode: 28, 27;
    pub depth_mode, set_depth_mode: 31, 29;
    // Modifier-volume instructions reuse the depth-mode bits:
    // 0 = boundary, 1 = inside-last (OR fold), 2 = outside-last (AND fold).
    pub volume_mode, set_volume_mode: 31, 29;
}

impl Isp {
    #[inline]
    pub const fn full(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn set_full(&mut self, val: u32) {
        self.0 = val;
    }
}

bitfield! {
    /// TSP instruction word.
    #[derive(Copy, Clone)]
    pub struct Tsp(u32);
    impl Debug;

    pub tex_v, set_tex_v: 2, 0;
    pub tex_u, set_tex_u: 5, 3;
    pub shad_instr, set_shad_instr: 7, 6;
    pub mip_map_d, set_mip_map_d: 11, 8;
    pub sup_sample, set_sup_sample: 12;
    pub filter_mode, set_filter_mode: 14, 13;
    pub clamp_v, set_clamp_v: 15;
    pub clamp_u, set_clamp_u: 16;
    pub flip_v, set_flip_v: 17;
    pub flip_u, set_flip_u: 18;
    pub ignore_tex_a, set_ignore_tex_a: 19;
    pub use_alpha, set_use_alpha: 20;
    pub color_clamp, set_color_clamp: 21;
    pub fog_ctrl, set_fog_ctrl: 23, 22;
    pub dst_select, set_dst_select: 24;
    pub src_select, set_src_select: 25;
    pub dst_instr, set_dst_instr: 28, 26;
    pub src_instr, set_src_instr: 31, 29;
}

impl Tsp {
    #[inline]
    pub const fn full(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn set_full(&mut self, val: u32) {
        self.0 = val;
    }
}

bitfield! {
    /// Texture control word.
    #[derive(Copy, Clone)]
    pub struct Tcw(u32);
    impl Debug;

    pub tex_addr, set_tex_addr: 20, 0;
    pub stride_sel, set_stride_sel: 25;
    pub scan_order, set_scan_order: 26;
    pub pixel_fmt, set_pixel_fmt: 29, 27;
    pub vq_comp, set_vq_comp: 30;
    pub mip_mapped, set_mip_mapped: 31;

    // Palettized formats store the palette bank over the reserved/stride bits.
    pub pal_select, set_pal_select: 26, 21;
}

impl Tcw {
    #[inline]
    pub const fn full(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn set_full(&mut self, val: u32) {
        self.0 = val;
    }
}

bitfield! {
    /// Per-pixel parameter tag. Shares its layout with the ISP_BACKGND_T
    /// register, so the background plane is tagged like any other primitive.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct ParamTag(u32);
    impl Debug;

    pub tag_offset, set_tag_offset: 2, 0;
    pub param_offs_in_words, set_param_offs_in_words: 23, 3;
    pub skip, set_skip: 26, 24;
    pub shadow, set_shadow: 27;
    pub cache_bypass, set_cache_bypass: 28;
}

impl ParamTag {
    #[inline]
    pub const fn full(&self) -> u32 {
        self.0
    }

    pub fn from_desc(
        cache_bypass: bool,
        shadow: bool,
        skip: u32,
        param_offs_in_words: u32,
        tag_offset: u32,
    ) -> Self {
        let mut rv = ParamTag(0);
        rv.set_tag_offset(tag_offset);
        rv.set_param_offs_in_words(param_offs_in_words);
        rv.set_skip(skip);
        rv.set_shadow(shadow);
        rv.set_cache_bypass(cache_bypass);
        rv
    }
}

/// Mask applied when tags break depth ties. Drops the tag offset and the low
/// parameter-offset bits so the triangles of one strip compare equal instead
/// of fighting over coplanar pixels.
pub const TAG_SORT_MASK: u32 = 0xFFFF_FFC0;

/// Tag value no primitive can produce; marks untouched pixels during the
/// translucent auto-sort peel.
pub const TAG_MAX: u32 = 0xFFFF_FFFF;

// Texture pixel formats (TCW.pixel_fmt).
pub const PIXEL_1555: u32 = 0;
pub const PIXEL_565: u32 = 1;
pub const PIXEL_4444: u32 = 2;
pub const PIXEL_YUV: u32 = 3;
pub const PIXEL_BUMPMAP: u32 = 4;
pub const PIXEL_PAL4: u32 = 5;
pub const PIXEL_PAL8: u32 = 6;
pub const PIXEL_RESERVED: u32 = 7;

/// Decoded vertex. The second color/UV set is only populated in two-volume
/// mode.
#[derive(Copy, Clone, Debug, Default)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,

    pub col: [u8; 4],
    pub spc: [u8; 4],

    pub u: f32,
    pub v: f32,

    pub col1: [u8; 4],
    pub spc1: [u8; 4],

    pub u1: f32,
    pub v1: f32,
}

/// ISP/TSP/TCW words of one parameter block. The second TSP/TCW set is live
/// only for two-volume primitives.
#[derive(Copy, Clone, Debug)]
pub struct DrawParameters {
    pub isp: Isp,
    pub tsp: [Tsp; 2],
    pub tcw: [Tcw; 2],
}

impl Default for DrawParameters {
    fn default() -> Self {
        Self {
            isp: Isp(0),
            tsp: [Tsp(0), Tsp(0)],
            tcw: [Tcw(0), Tcw(0)],
        }
    }
}

/// Render modes of the pass driver. Closed set; each selects the ISP
/// depth-test/tag-write rules for one traversal of an object list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Opaque,
    PunchthroughPass0,
    PunchthroughPassN,
    PunchthroughMv,
    TranslucentAutosort,
    TranslucentPresort,
    Modifier,
}

impl RenderMode {
    /// Punch-through traversals run the TSP alpha test and feed the result
    /// back into the depth buffers.
    #[inline]
    pub fn alpha_tests(self) -> bool {
        matches!(
            self,
            RenderMode::PunchthroughPass0 | RenderMode::PunchthroughPassN
        )
    }
}
